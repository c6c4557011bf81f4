use crate::error::registry::RegistryError;
use crate::registry::InstanceRegistry;

use std::sync::Arc;

/// Lets a native backend report readiness without knowing which handle is active.
///
/// Cloned freely into probe threads; each call resolves the active server at the
/// time it fires.
#[derive(Debug, Clone)]
pub struct LaunchedNotifier {
    registry: Arc<InstanceRegistry>,
}

impl LaunchedNotifier {
    pub fn new(registry: Arc<InstanceRegistry>) -> Self {
        Self { registry }
    }

    /// Forward to [`InstanceRegistry::notify_launched`].
    #[track_caller]
    pub fn notify(&self) -> Result<u64, RegistryError> {
        self.registry.notify_launched()
    }
}
