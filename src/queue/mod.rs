//! Serial execution of session work.
//!
//! All capture-session state lives on one dedicated worker thread. Other
//! threads hand it work items through a FIFO channel and receive results
//! through one-shot completions.

mod completion;
mod serial;

pub use completion::{completion, Completer, Completion};
pub use serial::{QueueError, QueueHandle, SerialQueue};
