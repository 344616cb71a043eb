use std::sync::Arc;

use crate::platform::PreviewSurface;

/// Stable handle to the preview layer created by the manager.
///
/// Cloning shares the same underlying surface. The handle never changes for
/// the lifetime of a manager and may be read from any thread.
#[derive(Clone)]
pub struct PreviewLayer {
    surface: Arc<dyn PreviewSurface>,
}

impl PreviewLayer {
    pub(crate) fn new(surface: Arc<dyn PreviewSurface>) -> Self {
        Self { surface }
    }

    pub fn surface(&self) -> &Arc<dyn PreviewSurface> {
        &self.surface
    }

    /// Label of the capture session currently feeding the layer.
    pub fn connected_session(&self) -> Option<String> {
        self.surface.connected_session()
    }

    pub fn is_connected(&self) -> bool {
        self.connected_session().is_some()
    }

    /// True when both handles refer to the same surface.
    pub fn same_layer(&self, other: &PreviewLayer) -> bool {
        Arc::ptr_eq(&self.surface, &other.surface)
    }
}

impl std::fmt::Debug for PreviewLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewLayer")
            .field("session", &self.connected_session())
            .finish()
    }
}
