use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stop request for one launch, shared by a handle and its server thread.
///
/// Once requested it stays requested; a new launch gets a new token.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    requested: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
