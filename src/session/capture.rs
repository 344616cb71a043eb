use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::picture::{assemble_picture, jpeg_quality, PictureOptions, PictureResult};
use super::{SessionController, SessionState};
use crate::error::CameraError;
use crate::platform::{EncodedImage, PlatformError, StillImageOutput, StillSettings};
use crate::queue::Completer;

/// A still capture waiting for the framework's callback.
pub(super) struct PendingCapture {
    options: PictureOptions,
    reply: Completer<PictureResult>,
    requested_at: Instant,
}

impl SessionController {
    /// Requests one still frame; `reply` resolves when the frame has been
    /// assembled, the request fails, or the capture timeout expires.
    pub fn capture_still(&mut self, options: PictureOptions, reply: Completer<PictureResult>) {
        let (settings, output) = match self.prepare_capture(&options) {
            Ok(prepared) => prepared,
            Err(error) => {
                self.stats.captures_failed += 1;
                debug!(%error, "Still capture refused");
                reply.complete(Err(error));
                return;
            }
        };

        self.next_capture += 1;
        let id = self.next_capture;
        self.pending.insert(
            id,
            PendingCapture {
                options,
                reply,
                requested_at: Instant::now(),
            },
        );
        self.stats.captures_requested += 1;
        debug!(
            id,
            flash = ?settings.flash,
            quality = settings.jpeg_quality,
            "Still capture requested"
        );

        let queue = self.queue.clone();
        output.capture_still(
            settings,
            Box::new(move |result: Result<EncodedImage, PlatformError>| {
                let submitted = queue.submit(move |controller: &mut SessionController| {
                    controller.finish_capture(id, result);
                });
                if submitted.is_err() {
                    debug!(id, "Still capture finished after queue shutdown");
                }
            }),
        );

        let timeout = self.config.capture_timeout();
        let armed = self
            .queue
            .submit_after(timeout, move |controller: &mut SessionController| {
                controller.expire_capture(id, timeout);
            });
        if armed.is_err() {
            debug!(id, "Capture timeout not armed; queue closed");
        }
    }

    fn prepare_capture(
        &self,
        options: &PictureOptions,
    ) -> Result<(StillSettings, Arc<dyn StillImageOutput>), CameraError> {
        self.ensure_live()?;
        options.validate()?;
        if self.state != SessionState::Running {
            return Err(CameraError::NotRunning);
        }

        let output = self.still_output()?;
        let quality = options.quality.unwrap_or(self.config.default_quality);
        let settings = StillSettings {
            flash: self.effective_still_flash(),
            jpeg_quality: jpeg_quality(quality),
        };
        Ok((settings, output))
    }

    fn finish_capture(&mut self, id: u64, result: Result<EncodedImage, PlatformError>) {
        let Some(pending) = self.pending.remove(&id) else {
            debug!(id, "Discarding late still capture result");
            return;
        };

        let elapsed_ms = pending.requested_at.elapsed().as_millis() as u64;
        let outcome = result.map_err(CameraError::from).and_then(|image| {
            assemble_picture(image, &pending.options, self.config.photo_dir.as_deref())
        });

        match &outcome {
            Ok(picture) => {
                self.stats.captures_completed += 1;
                info!(
                    id,
                    elapsed_ms,
                    width = picture.width,
                    height = picture.height,
                    uri = picture.uri.as_deref().unwrap_or("-"),
                    "Still capture completed"
                );
            }
            Err(error) => {
                self.stats.captures_failed += 1;
                warn!(id, elapsed_ms, %error, "Still capture failed");
            }
        }
        pending.reply.complete(outcome);
        self.publish();
    }

    fn expire_capture(&mut self, id: u64, timeout: Duration) {
        let Some(pending) = self.pending.remove(&id) else {
            return;
        };
        self.stats.capture_timeouts += 1;
        warn!(id, timeout_ms = timeout.as_millis() as u64, "Still capture timed out");
        pending.reply.complete(Err(CameraError::CaptureTimeout(timeout)));
        self.publish();
    }

    /// Resolves every in-flight capture with `error`.
    pub(super) fn fail_pending_captures(&mut self, error: &CameraError) {
        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        warn!(count = pending.len(), %error, "Failing in-flight still captures");
        for (_, capture) in pending {
            self.stats.captures_failed += 1;
            capture.reply.complete(Err(error.clone()));
        }
    }
}
