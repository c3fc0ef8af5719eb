//! Inference execution and resource accounting controller for the Kestrel
//! KN100 edge NPU.
//!
//! The controller drives the accelerator runtime through a model's epoch
//! graph, accounts for the physical memory a loaded model occupies, brackets
//! each run with explicit cache maintenance, and attributes cycles to epochs
//! through the hardware event-counter block.
//!
//! # Quick start
//!
//! ```
//! use kestrel_npu::prelude::*;
//! use kestrel_npu::sim::{SimCache, SimCounters, SimRuntime};
//!
//! # fn main() -> kestrel_npu::Result<()> {
//! let mut ctrl = ExecutionController::new(
//!     SimRuntime::synthetic(),
//!     SimCache::new(),
//!     SimCounters::new(),
//!     CounterMode::ActiveCycles,
//! )?;
//!
//! let id = ctrl.instance(0)?;
//! let outcome = ctrl.run(id)?;
//! println!(
//!     "{} epochs in {} ticks",
//!     ctrl.model_info().epoch_count,
//!     outcome.elapsed_ticks
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ExecutionController        state machine, run loop, timing source choice
//!   ├── model::describe      buffer tables, epoch count, footprints
//!   │     └── accounting     region-coverage byte accounting
//!   ├── coherency            cache maintenance around a run
//!   └── EpochProfiler        four-phase counter dispatch
//!
//! below everything: AcceleratorRuntime / CacheMaintenance / CounterBlock
//! boundary traits, with a deterministic software runtime in `sim`
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod accounting;
pub mod coherency;
mod controller;
mod error;
mod model;
mod profiler;
pub mod runtime;
pub mod sim;

pub use controller::{
    ExecState, ExecutionController, InitMode, InstanceId, RunOutcome, MAX_RUN_STEPS,
    TICK_TRUST_THRESHOLD,
};
pub use error::{KestrelError, Result};
pub use model::{ModelInfo, MAX_EPOCH_BLOCKS, MAX_IO_BUFFERS};
pub use profiler::{CounterMode, EpochCallback, EpochCounters, EpochProfiler};
pub use runtime::{
    AcceleratorRuntime, BufferDescriptor, CacheMaintenance, CounterBlock, EpochBlock, Phase,
    RuntimeIdentity, Step,
};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        CounterMode, EpochCounters, ExecState, ExecutionController, InitMode, InstanceId,
        KestrelError, ModelInfo, Result, RunOutcome,
    };
}
