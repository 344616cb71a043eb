//! Runtime error observation and single-shot recovery.
//!
//! Each `start_session` arms a fresh observer generation. The platform calls
//! the handler on its own thread; the handler only re-submits the error to
//! the session queue, tagged with the generation it was armed for. Errors
//! for a revoked or replaced generation are dropped.
//!
//! The first error of an arming restarts the session in place. A second
//! error of the same arming is fatal: the observer is revoked and the
//! session stays stopped until the host starts it again.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{SessionController, SessionEvent, SessionState};
use crate::error::{CameraError, HostError};
use crate::platform::{ObserverToken, PlatformError, RuntimeErrorHandler};

#[derive(Debug)]
pub(super) struct ObserverArming {
    pub(super) token: ObserverToken,
    pub(super) generation: u64,
    pub(super) restarts: u32,
}

impl SessionController {
    pub(super) fn arm_observer(&mut self) -> Result<(), CameraError> {
        self.revoke_observer();
        self.next_generation += 1;
        let generation = self.next_generation;

        let queue = self.queue.clone();
        let handler: RuntimeErrorHandler = Arc::new(move |error: PlatformError| {
            let submitted = queue.submit(move |controller: &mut SessionController| {
                controller.handle_runtime_error(generation, error);
            });
            if submitted.is_err() {
                debug!(generation, "Runtime error arrived after queue shutdown");
            }
        });

        let token = self.session_mut()?.add_runtime_error_observer(handler);
        self.observer = Some(ObserverArming {
            token,
            generation,
            restarts: 0,
        });
        debug!(generation, "Runtime error observer armed");
        Ok(())
    }

    pub(super) fn revoke_observer(&mut self) {
        let Some(arming) = self.observer.take() else {
            return;
        };
        if let Some(session) = self.session.as_deref_mut() {
            session.remove_runtime_error_observer(arming.token);
        }
        debug!(generation = arming.generation, "Runtime error observer revoked");
    }

    pub(crate) fn handle_runtime_error(&mut self, generation: u64, error: PlatformError) {
        let first = match self.observer.as_mut() {
            Some(arming) if arming.generation == generation => {
                arming.restarts += 1;
                arming.restarts == 1
            }
            _ => {
                debug!(generation, %error, "Ignoring runtime error for revoked observer");
                return;
            }
        };

        self.stats.runtime_errors += 1;
        self.emit(SessionEvent::RuntimeError {
            message: error.to_string(),
        });

        if first {
            warn!(%error, generation, "Capture session runtime error; restarting");
            self.transition(SessionState::Stopped);
            if let Some(session) = self.session.as_deref_mut() {
                session.start_running();
            }
            self.transition(SessionState::Running);
            self.stats.recoveries += 1;
            self.emit(SessionEvent::Recovered);
            info!(generation, "Capture session recovered");
        } else {
            let fatal = CameraError::Fatal(error.to_string());
            error!(%error, generation, "Repeated runtime error; stopping capture session");
            self.revoke_observer();
            if let Some(session) = self.session.as_deref_mut() {
                if session.is_running() {
                    session.stop_running();
                }
            }
            self.transition(SessionState::Stopped);
            self.stats.fatal_errors += 1;
            self.fail_pending_captures(&fatal);
            self.emit(SessionEvent::Fatal {
                error: HostError::from(&fatal),
            });
        }

        self.publish();
    }
}
