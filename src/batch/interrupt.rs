//! User-initiated cancellation.
//!
//! An [`Interrupt`] is a shared flag. Once triggered, every batch entry point
//! stops at its next check and returns [`BatchError::Interrupted`]; the error
//! is never turned into a partial result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::BatchError;

/// Cancellation handle. Clones share one flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// A fresh, untriggered handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every batch sharing this handle.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag so the same handle can guard another batch.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// `Err(BatchError::Interrupted)` if the flag is set.
    pub fn check(&self, completed: usize) -> Result<()> {
        if self.is_triggered() {
            return Err(BatchError::Interrupted { completed }.into());
        }
        Ok(())
    }

    /// Trigger on Ctrl-C. Must be called from within a tokio runtime.
    pub fn on_ctrl_c(&self) -> JoinHandle<()> {
        let interrupt = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, interrupting batch");
                interrupt.trigger();
            }
        })
    }
}
