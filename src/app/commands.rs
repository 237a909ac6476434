//! Inbound commands to the engine.
//!
//! These are what a transport adapter (simulator connection, controller
//! driver, or the line-based console in `main.rs`) feeds into the
//! [`Engine`](super::service::Engine).  The text form is one command per
//! line:
//!
//! ```text
//! value <handle> <number>     telemetry update
//! press <button>              button down (1-based)
//! release <button>            button up
//! display <line> <text…>      write a display line (0-based)
//! poll                        end of polling cycle
//! quit
//! ```

use core::fmt;
use core::str::FromStr;

use crate::telemetry::Handle;

#[derive(Debug, Clone, PartialEq)]
pub enum InputCommand {
    /// A subscribed variable changed.
    Value { handle: Handle, value: f64 },
    /// A controller button went down (or auto-repeated).
    Press(u8),
    /// A controller button went up.
    Release(u8),
    /// Show text on a display line.
    Display { line: usize, text: String },
    /// End of a polling cycle: re-derive the modal context.
    Poll,
    /// Stop the engine.
    Quit,
}

/// Why a command line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCommandError {
    Empty,
    UnknownVerb(String),
    MissingArgument(&'static str),
    BadArgument { name: &'static str, value: String },
}

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::UnknownVerb(v) => write!(f, "unknown command '{v}'"),
            Self::MissingArgument(name) => write!(f, "missing argument <{name}>"),
            Self::BadArgument { name, value } => write!(f, "bad <{name}> '{value}'"),
        }
    }
}

impl std::error::Error for ParseCommandError {}

impl FromStr for InputCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim_start();
        let mut args = rest.split_whitespace();

        match verb {
            "" => Err(ParseCommandError::Empty),
            "value" => Ok(Self::Value {
                handle: Handle(arg(&mut args, "handle")?),
                value: arg(&mut args, "value")?,
            }),
            "press" => Ok(Self::Press(arg(&mut args, "button")?)),
            "release" => Ok(Self::Release(arg(&mut args, "button")?)),
            "display" => {
                let (line, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                Ok(Self::Display {
                    line: parse("line", line)?,
                    text: text.to_owned(),
                })
            }
            "poll" => Ok(Self::Poll),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(ParseCommandError::UnknownVerb(other.to_owned())),
        }
    }
}

fn arg<'a, T: FromStr>(
    args: &mut impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<T, ParseCommandError> {
    let raw = args.next().ok_or(ParseCommandError::MissingArgument(name))?;
    parse(name, raw)
}

fn parse<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ParseCommandError> {
    if raw.is_empty() {
        return Err(ParseCommandError::MissingArgument(name));
    }
    raw.parse().map_err(|_| ParseCommandError::BadArgument {
        name,
        value: raw.to_owned(),
    })
}
