//! Hardware boundary traits.
//!
//! The controller never touches silicon directly. Everything below the
//! controller is reached through three seams, one per hardware concern:
//!
//! - [`AcceleratorRuntime`] — the external engine that loads, steps through,
//!   and tears down a model's epoch graph.
//! - [`CacheMaintenance`] — explicit clean/invalidate primitives for the
//!   (non-coherent) CPU and accelerator caches.
//! - [`CounterBlock`] — the event-counter hardware plus the free-running
//!   cycle and tick sources.
//!
//! Implementations are injected into the controller, which makes every run
//! reproducible under the software runtime in [`crate::sim`].

use crate::error::Result;
use crate::profiler::CounterMode;
use kestrel_chip::ports::{PortMask, MAX_COUNTER_PORTS};

/// One memory buffer declared by a loaded model.
///
/// Owned by the accelerator runtime; the controller only reads it. Valid for
/// the lifetime of the loaded model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescriptor {
    /// Buffer name from the model metadata.
    pub name: String,
    /// First physical byte of the buffer.
    pub start_address: u64,
    /// Length in bytes.
    pub length: u64,
    /// Element width in bits.
    pub element_bits: u8,
    /// Whether the buffer holds model parameters (weights) rather than
    /// live input data.
    pub is_parameter: bool,
}

impl BufferDescriptor {
    /// Last byte covered by the buffer (inclusive).
    ///
    /// # Panics
    ///
    /// Panics if the buffer is zero-length.
    #[must_use]
    pub const fn last(&self) -> u64 {
        self.start_address + self.length - 1
    }
}

/// Accelerator runtime identity, reported once per model load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeIdentity {
    /// Runtime version string.
    pub version: String,
    /// Build descriptor (toolchain, commit, target).
    pub build: String,
}

/// One entry in the model's epoch-block list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochBlock {
    /// Ports carrying this epoch's input streams.
    pub input_ports: PortMask,
    /// Ports carrying this epoch's output streams.
    pub output_ports: PortMask,
    /// Terminal sentinel: set on the final block of the list.
    pub last: bool,
}

/// Lifecycle phase raised around each epoch's execution.
///
/// Phases arrive strictly in this order for every epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before the epoch is dispatched to the hardware.
    PreStart,
    /// Immediately after dispatch.
    PostStart,
    /// Before the epoch's completion is retired.
    PreEnd,
    /// After the epoch has fully retired.
    PostEnd,
}

/// Result of one [`AcceleratorRuntime::step`] invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A lifecycle phase for the given epoch index.
    Lifecycle(Phase, u32),
    /// More work pending; call `step` again.
    More,
    /// Nothing to do until the accelerator raises an interrupt.
    WaitForEvent,
    /// The model run is complete.
    Done,
}

/// The external engine that executes a model's epoch graph.
///
/// The controller drives it one step at a time and reacts to the lifecycle
/// phases it reports. Instruction semantics stay on the other side of this
/// trait.
pub trait AcceleratorRuntime {
    /// Runtime version and build descriptor.
    fn identity(&self) -> RuntimeIdentity;

    /// Bring up the runtime. Called once at the start of every run.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be initialized.
    fn init(&mut self) -> Result<()>;

    /// Tear the runtime down. Called once at the end of every run.
    ///
    /// # Errors
    ///
    /// Returns an error if teardown fails.
    fn deinit(&mut self) -> Result<()>;

    /// Initialize the target model instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be activated.
    fn model_init(&mut self) -> Result<()>;

    /// Tear down the model instance.
    ///
    /// # Errors
    ///
    /// Returns an error if teardown fails.
    fn model_deinit(&mut self) -> Result<()>;

    /// Input buffers declared by the loaded model (parameters included).
    fn input_buffers(&self) -> &[BufferDescriptor];

    /// Output buffers declared by the loaded model.
    fn output_buffers(&self) -> &[BufferDescriptor];

    /// Epoch block at `idx`, or `None` past the end of the list.
    ///
    /// A well-formed list terminates with a block whose `last` flag is set;
    /// the controller bounds its scan rather than trusting that.
    fn epoch_block(&self, idx: usize) -> Option<EpochBlock>;

    /// Advance execution by one step.
    ///
    /// # Errors
    ///
    /// Returns an error on a hardware fault; fatal for the run.
    fn step(&mut self) -> Result<Step>;

    /// Block in a low-power state until any accelerator interrupt fires.
    ///
    /// The wake is not selective: spurious wakeups are expected and the
    /// caller re-polls [`step`](Self::step) regardless of wake cause.
    fn wait_for_event(&mut self);

    /// Read a 32-bit control-block register.
    fn read_reg(&self, offset: u32) -> u32;

    /// Write a 32-bit control-block register.
    fn write_reg(&mut self, offset: u32, value: u32);
}

/// Explicit cache maintenance for a cached CPU and a non-coherent NPU.
pub trait CacheMaintenance {
    /// Commit dirty CPU cache lines for the range, then drop them.
    fn clean_invalidate_range(&mut self, addr: u64, len: u64);

    /// Drop CPU cache lines for the range without committing.
    fn invalidate_range(&mut self, addr: u64, len: u64);

    /// Whole-cache clean-and-invalidate on the CPU side.
    fn clean_invalidate_all(&mut self);

    /// Invalidate the accelerator's own cache, if present.
    fn invalidate_accelerator_cache(&mut self);
}

/// Event-counter hardware plus cycle/tick sources.
pub trait CounterBlock {
    /// Configure the counter block for `mode` against the given ports.
    fn configure(&mut self, mode: CounterMode, ports: PortMask);

    /// Start counting.
    fn start(&mut self);

    /// Stop counting.
    fn stop(&mut self);

    /// Read back per-port raw samples. Returns the number of valid entries.
    fn read_samples(&mut self, out: &mut [u32; MAX_COUNTER_PORTS]) -> usize;

    /// Reset the free-running host cycle counter.
    fn reset_cpu_cycles(&mut self);

    /// Host cycles elapsed since the last reset.
    ///
    /// Non-suspendable and monotonic; wraps at the hardware width. The
    /// controller does not correct for wraparound.
    fn cpu_cycles(&mut self) -> u64;

    /// Free-running accelerator-side cycle counter.
    fn accelerator_cycles(&mut self) -> u64;

    /// System tick counter (see [`kestrel_chip::timing::TICK_RATE_HZ`]).
    fn ticks(&mut self) -> u64;
}
