//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements   | Connects to                  |
//! |-------------|--------------|------------------------------|
//! | `console`   | OutputPort   | Log output (controller stub) |
//! |             | SimPort      | Log output (simulator stub)  |
//! | `log_sink`  | EventSink    | Log output                   |
//! | `time`      | Clock        | `Instant` / manual test time |

pub mod console;
pub mod log_sink;
pub mod time;
