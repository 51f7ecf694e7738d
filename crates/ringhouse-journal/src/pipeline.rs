//! Two-Phase Write Pipeline
//!
//! Every submission passes through two named phases, each admitting one
//! caller at a time:
//!
//! 1. **device_submission**: held while the record's device writes run;
//!    a submission keeps it until its bytes are durable
//! 2. **finalize**: held while cursors are advanced and the caller's
//!    `LogicalPosition` is produced
//!
//! A submission enters `finalize` before releasing `device_submission`, so
//! even if the device completes writes out of order, no two submissions can
//! reorder their finalize steps. tokio's queue-fair mutexes give FIFO
//! admission at each phase, which is the ordering external observers rely
//! on: commit order equals device-submission admission order.

use tokio::sync::{Mutex, MutexGuard};

/// The two serialization points every submission passes through
#[derive(Debug, Default)]
pub struct WritePipeline {
    device_submission: Mutex<()>,
    finalize: Mutex<()>,
}

impl WritePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a handle for one submission's passage through the pipeline
    pub fn handle(&self) -> OrderingHandle<'_> {
        OrderingHandle { pipeline: self }
    }
}

/// One submission's entry ticket into the pipeline phases
#[derive(Debug, Clone, Copy)]
pub struct OrderingHandle<'a> {
    pipeline: &'a WritePipeline,
}

/// Occupancy of a phase; the phase re-admits when this is dropped
#[derive(Debug)]
pub struct PhaseGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl<'a> OrderingHandle<'a> {
    /// Enter the device-submission phase (FIFO admission)
    pub async fn enter_device_submission(&self) -> PhaseGuard<'a> {
        PhaseGuard {
            _guard: self.pipeline.device_submission.lock().await,
        }
    }

    /// Enter the finalize phase (FIFO admission)
    pub async fn enter_finalize(&self) -> PhaseGuard<'a> {
        PhaseGuard {
            _guard: self.pipeline.finalize.lock().await,
        }
    }
}
