//! Weak relation between the manager and the views showing its preview.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use super::PreviewLayer;

/// A host view that renders the preview layer.
pub trait CameraView: Send + Sync {
    fn set_preview_layer(&self, layer: PreviewLayer);

    /// Called when the view is detached from the manager.
    fn clear_preview_layer(&self) {}
}

/// Views keyed by host tag. The registry never keeps a view alive.
#[derive(Default)]
pub struct ViewRegistry {
    views: RwLock<HashMap<i64, Weak<dyn CameraView>>>,
}

impl ViewRegistry {
    pub fn attach(&self, tag: i64, view: &Arc<dyn CameraView>, layer: PreviewLayer) {
        view.set_preview_layer(layer);
        let mut views = self.views.write();
        views.retain(|_, weak| weak.strong_count() > 0);
        views.insert(tag, Arc::downgrade(view));
        tracing::debug!(tag, views = views.len(), "Camera view attached");
    }

    /// Returns false if no live view was attached under `tag`.
    pub fn detach(&self, tag: i64) -> bool {
        let removed = self.views.write().remove(&tag);
        match removed.and_then(|weak| weak.upgrade()) {
            Some(view) => {
                view.clear_preview_layer();
                tracing::debug!(tag, "Camera view detached");
                true
            }
            None => false,
        }
    }

    pub fn get(&self, tag: i64) -> Option<Arc<dyn CameraView>> {
        self.views.read().get(&tag).and_then(Weak::upgrade)
    }

    /// Number of attached views still alive.
    pub fn len(&self) -> usize {
        self.views
            .read()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewRegistry")
            .field("views", &self.len())
            .finish()
    }
}
