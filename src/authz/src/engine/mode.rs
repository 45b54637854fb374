//! Process-wide enforcement mode

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::config::EnforcementMode;

/// Enforcement mode shared between an [`Engine`](super::Engine) and every
/// handle that can change it
///
/// Stored as a single byte so reads and writes are never torn. A request
/// already in flight may still observe the previous mode.
#[derive(Debug, Clone, Default)]
pub struct SharedEnforcementMode(Arc<AtomicU8>);

impl SharedEnforcementMode {
    pub fn new(mode: EnforcementMode) -> Self {
        Self(Arc::new(AtomicU8::new(mode as u8)))
    }

    pub fn get(&self) -> EnforcementMode {
        EnforcementMode::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, mode: EnforcementMode) {
        self.0.store(mode as u8, Ordering::Release);
    }
}
