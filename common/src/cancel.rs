use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag shared between whoever requests a stop and
/// the loop that polls it.
///
/// Cancelling never interrupts work in flight; the owning loop checks the flag
/// at its own boundaries (once per row for the enrichment pipeline, once per
/// received chunk for the uploader).
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let handle = CancelHandle::new();
        let observer = handle.clone();
        assert!(!observer.is_cancelled());
        handle.cancel();
        assert!(observer.is_cancelled());
    }
}
