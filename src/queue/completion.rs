//! One-shot result delivery from the session queue back to a caller.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use crate::error::CameraError;

/// Creates a linked completer/completion pair.
pub fn completion<T>() -> (Completer<T>, Completion<T>) {
    let (tx, rx) = bounded(1);
    (Completer { tx }, Completion { rx })
}

/// Sending half, moved into the work item.
#[derive(Debug)]
pub struct Completer<T> {
    tx: Sender<Result<T, CameraError>>,
}

impl<T> Completer<T> {
    /// Resolves the completion. Ignored when the receiver is gone.
    pub fn complete(self, result: Result<T, CameraError>) {
        let _ = self.tx.send(result);
    }
}

/// Receiving half handed back to the caller.
///
/// Resolves exactly once. If the work item is dropped without completing
/// (queue shut down), the completion resolves to [`CameraError::QueueClosed`].
#[derive(Debug)]
pub struct Completion<T> {
    rx: Receiver<Result<T, CameraError>>,
}

impl<T> Completion<T> {
    /// An already resolved completion.
    pub fn ready(result: Result<T, CameraError>) -> Self {
        let (completer, completion) = completion();
        completer.complete(result);
        completion
    }

    /// Blocks until the result arrives.
    pub fn wait(self) -> Result<T, CameraError> {
        self.rx.recv().unwrap_or(Err(CameraError::QueueClosed))
    }

    /// Blocks for at most `timeout`; `Err(self)` when nothing arrived yet.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Result<T, CameraError>, Self> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Disconnected) => Ok(Err(CameraError::QueueClosed)),
            Err(RecvTimeoutError::Timeout) => Err(self),
        }
    }

    /// Non-blocking poll.
    pub fn try_result(&self) -> Option<Result<T, CameraError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Disconnected) => Some(Err(CameraError::QueueClosed)),
            Err(TryRecvError::Empty) => None,
        }
    }
}
