//! Software runtime.
//!
//! Deterministic implementations of the three hardware boundary traits, so
//! the whole controller runs without silicon. Every unit and integration
//! test drives the controller through these; the CLI uses them as a demo
//! target. Behavior is scripted, not simulated: epochs emit their four
//! lifecycle phases in order, counters advance by configured amounts, and
//! the cache records every maintenance call for later assertion.

use std::collections::VecDeque;

use bytes::Bytes;
use kestrel_chip::mem::{sram_bank, CACHE_CARVE};
use kestrel_chip::ports::{PortMask, MAX_COUNTER_PORTS};
use kestrel_chip::regs;

use crate::error::Result;
use crate::profiler::CounterMode;
use crate::runtime::{
    AcceleratorRuntime, BufferDescriptor, CacheMaintenance, CounterBlock, EpochBlock, Phase,
    RuntimeIdentity, Step,
};

// ── Runtime ──────────────────────────────────────────────────────────────

/// Builder for a [`SimRuntime`] with a synthetic model.
#[derive(Debug, Clone)]
pub struct SimRuntimeBuilder {
    param_inputs: usize,
    data_inputs: usize,
    outputs: usize,
    epochs: u32,
    missing_sentinel: bool,
    endless_steps: bool,
    program: Bytes,
}

impl Default for SimRuntimeBuilder {
    fn default() -> Self {
        Self {
            param_inputs: 2,
            data_inputs: 1,
            outputs: 1,
            epochs: 3,
            missing_sentinel: false,
            endless_steps: false,
            program: Bytes::from_static(&[0u8; 64]),
        }
    }
}

impl SimRuntimeBuilder {
    /// Number of parameter (weight) input buffers.
    #[must_use]
    pub fn param_inputs(mut self, n: usize) -> Self {
        self.param_inputs = n;
        self
    }

    /// Number of true (non-parameter) input buffers.
    #[must_use]
    pub fn data_inputs(mut self, n: usize) -> Self {
        self.data_inputs = n;
        self
    }

    /// Number of output buffers.
    #[must_use]
    pub fn outputs(mut self, n: usize) -> Self {
        self.outputs = n;
        self
    }

    /// Number of epochs in the execution graph.
    #[must_use]
    pub fn epochs(mut self, n: u32) -> Self {
        self.epochs = n;
        self
    }

    /// Drop the terminal sentinel from the epoch-block list.
    #[must_use]
    pub fn missing_sentinel(mut self, yes: bool) -> Self {
        self.missing_sentinel = yes;
        self
    }

    /// Make `step` report more work forever (never `Done`).
    #[must_use]
    pub fn endless_steps(mut self, yes: bool) -> Self {
        self.endless_steps = yes;
        self
    }

    /// Attach a model program blob.
    #[must_use]
    pub fn program(mut self, program: Bytes) -> Self {
        self.program = program;
        self
    }

    /// Build the runtime.
    #[must_use]
    pub fn build(self) -> SimRuntime {
        // Lay the synthetic model out the way the compiler does on real
        // silicon: weights in bank 0, live inputs in bank 1, outputs in the
        // cache-carve region.
        let bank0 = sram_bank(0);
        let bank1 = sram_bank(1);
        let mut inputs = Vec::new();
        for i in 0..self.param_inputs {
            inputs.push(BufferDescriptor {
                name: format!("weights{i}"),
                start_address: bank0.base + (i as u64) * 0x1000,
                length: 0x1000,
                element_bits: 8,
                is_parameter: true,
            });
        }
        for i in 0..self.data_inputs {
            inputs.push(BufferDescriptor {
                name: format!("input{i}"),
                start_address: bank1.base + (i as u64) * 0x400,
                length: 0x400,
                element_bits: 8,
                is_parameter: false,
            });
        }
        let outputs = (0..self.outputs)
            .map(|i| BufferDescriptor {
                name: format!("output{i}"),
                start_address: CACHE_CARVE.base + (i as u64) * 0x100,
                length: 0x100,
                element_bits: 16,
                is_parameter: false,
            })
            .collect();

        let blocks = (0..self.epochs as usize)
            .map(|i| EpochBlock {
                input_ports: kestrel_chip::ports::INPUT_PORTS,
                output_ports: kestrel_chip::ports::DATA_STREAM_PORTS,
                last: !self.missing_sentinel && i == (self.epochs as usize).saturating_sub(1),
            })
            .collect();

        SimRuntime {
            inputs,
            outputs,
            blocks,
            epochs: self.epochs,
            script: make_script(self.epochs),
            endless_steps: self.endless_steps,
            program: self.program,
            control_reg: regs::control::CLK_ENABLE,
            reg_writes: Vec::new(),
            init_calls: 0,
            deinit_calls: 0,
            model_init_calls: 0,
            model_deinit_calls: 0,
            wait_calls: 0,
        }
    }
}

// The step sequence one run produces: four lifecycle phases per epoch with
// a poll and a blocking wait between dispatch and retirement.
fn make_script(epochs: u32) -> VecDeque<Step> {
    let mut script = VecDeque::new();
    for epoch in 0..epochs {
        script.push_back(Step::Lifecycle(Phase::PreStart, epoch));
        script.push_back(Step::Lifecycle(Phase::PostStart, epoch));
        script.push_back(Step::More);
        script.push_back(Step::WaitForEvent);
        script.push_back(Step::Lifecycle(Phase::PreEnd, epoch));
        script.push_back(Step::Lifecycle(Phase::PostEnd, epoch));
    }
    script.push_back(Step::Done);
    script
}

/// Scripted accelerator runtime.
#[derive(Debug)]
pub struct SimRuntime {
    inputs: Vec<BufferDescriptor>,
    outputs: Vec<BufferDescriptor>,
    blocks: Vec<EpochBlock>,
    epochs: u32,
    script: VecDeque<Step>,
    endless_steps: bool,
    program: Bytes,
    control_reg: u32,
    reg_writes: Vec<(u32, u32)>,
    init_calls: u32,
    deinit_calls: u32,
    model_init_calls: u32,
    model_deinit_calls: u32,
    wait_calls: u32,
}

impl SimRuntime {
    /// Builder with the default synthetic model (2 weight buffers, 1 input,
    /// 1 output, 3 epochs).
    #[must_use]
    pub fn builder() -> SimRuntimeBuilder {
        SimRuntimeBuilder::default()
    }

    /// The default synthetic model.
    #[must_use]
    pub fn synthetic() -> Self {
        Self::builder().build()
    }

    /// Register writes observed so far, in order.
    #[must_use]
    pub fn reg_writes(&self) -> &[(u32, u32)] {
        &self.reg_writes
    }

    /// How many times `init`/`deinit` were called.
    #[must_use]
    pub const fn init_balance(&self) -> (u32, u32) {
        (self.init_calls, self.deinit_calls)
    }

    /// How many times the model instance was brought up and torn down.
    #[must_use]
    pub const fn model_balance(&self) -> (u32, u32) {
        (self.model_init_calls, self.model_deinit_calls)
    }

    /// How many times the controller blocked on wait-for-event.
    #[must_use]
    pub const fn wait_calls(&self) -> u32 {
        self.wait_calls
    }

    /// The model program blob.
    #[must_use]
    pub const fn program(&self) -> &Bytes {
        &self.program
    }
}

impl AcceleratorRuntime for SimRuntime {
    fn identity(&self) -> RuntimeIdentity {
        RuntimeIdentity {
            version: "sim-1.2.0".into(),
            build: format!("software runtime, {}-byte program", self.program.len()),
        }
    }

    fn init(&mut self) -> Result<()> {
        self.init_calls += 1;
        Ok(())
    }

    fn deinit(&mut self) -> Result<()> {
        self.deinit_calls += 1;
        Ok(())
    }

    fn model_init(&mut self) -> Result<()> {
        self.model_init_calls += 1;
        // Re-arm the step script so every run replays the full epoch graph.
        self.script = make_script(self.epochs);
        Ok(())
    }

    fn model_deinit(&mut self) -> Result<()> {
        self.model_deinit_calls += 1;
        Ok(())
    }

    fn input_buffers(&self) -> &[BufferDescriptor] {
        &self.inputs
    }

    fn output_buffers(&self) -> &[BufferDescriptor] {
        &self.outputs
    }

    fn epoch_block(&self, idx: usize) -> Option<EpochBlock> {
        self.blocks.get(idx).copied()
    }

    fn step(&mut self) -> Result<Step> {
        if self.endless_steps {
            return Ok(Step::More);
        }
        // A drained script keeps reporting Done, matching hardware that has
        // already retired the final epoch.
        Ok(self.script.pop_front().unwrap_or(Step::Done))
    }

    fn wait_for_event(&mut self) {
        self.wait_calls += 1;
    }

    fn read_reg(&self, offset: u32) -> u32 {
        match offset {
            regs::DEVICE_ID => 0x4B4E_0100,
            regs::CONTROL => self.control_reg,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u32, value: u32) {
        self.reg_writes.push((offset, value));
        if offset == regs::CONTROL {
            // PIPE_CLEAR is self-clearing on real silicon.
            self.control_reg = value & !regs::control::PIPE_CLEAR;
        }
    }
}

// ── Cache ────────────────────────────────────────────────────────────────

/// One recorded cache maintenance operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOp {
    /// Clean-and-invalidate over a range.
    CleanInvalidateRange {
        /// Range base.
        addr: u64,
        /// Range length.
        len: u64,
    },
    /// Invalidate over a range.
    InvalidateRange {
        /// Range base.
        addr: u64,
        /// Range length.
        len: u64,
    },
    /// Whole-cache CPU clean-and-invalidate.
    CleanInvalidateAll,
    /// Accelerator-side cache invalidate.
    InvalidateAcceleratorCache,
}

/// Cache that records every maintenance call.
#[derive(Debug, Default)]
pub struct SimCache {
    ops: Vec<CacheOp>,
}

impl SimCache {
    /// Empty recording cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations recorded so far, in order.
    #[must_use]
    pub fn ops(&self) -> &[CacheOp] {
        &self.ops
    }

    /// Count of whole-cache clean-and-invalidate calls.
    #[must_use]
    pub fn full_resets(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, CacheOp::CleanInvalidateAll))
            .count()
    }
}

impl CacheMaintenance for SimCache {
    fn clean_invalidate_range(&mut self, addr: u64, len: u64) {
        self.ops.push(CacheOp::CleanInvalidateRange { addr, len });
    }

    fn invalidate_range(&mut self, addr: u64, len: u64) {
        self.ops.push(CacheOp::InvalidateRange { addr, len });
    }

    fn clean_invalidate_all(&mut self) {
        self.ops.push(CacheOp::CleanInvalidateAll);
    }

    fn invalidate_accelerator_cache(&mut self) {
        self.ops.push(CacheOp::InvalidateAcceleratorCache);
    }
}

// ── Counters ─────────────────────────────────────────────────────────────

/// Deterministic counter block.
///
/// Each `cpu_cycles` read reports a fixed per-window cost; each
/// `accelerator_cycles` read advances the free-running counter by the
/// configured per-epoch amount (two reads bracket one epoch, so each
/// bracketed difference equals one epoch); each `ticks` read advances the
/// tick counter by the configured run cost.
#[derive(Debug)]
pub struct SimCounters {
    cpu_cost_per_window: u64,
    accel_now: u64,
    accel_cycles_per_epoch: u64,
    samples: [u32; MAX_COUNTER_PORTS],
    sample_count: usize,
    tick_now: u64,
    ticks_per_read: u64,
    configure_calls: u32,
    start_calls: u32,
    stop_calls: u32,
    last_mode: Option<(CounterMode, PortMask)>,
}

impl Default for SimCounters {
    fn default() -> Self {
        Self {
            cpu_cost_per_window: 100,
            accel_now: 0,
            accel_cycles_per_epoch: 5000,
            samples: [0; MAX_COUNTER_PORTS],
            sample_count: 4,
            tick_now: 0,
            ticks_per_read: 120,
            configure_calls: 0,
            start_calls: 0,
            stop_calls: 0,
            last_mode: None,
        }
    }
}

impl SimCounters {
    /// Counter block with the default costs (120 ticks per run, 100 host
    /// cycles per measurement window, 5000 accelerator cycles per epoch).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw samples returned by `read_samples`.
    #[must_use]
    pub fn with_samples(mut self, samples: &[u32]) -> Self {
        self.samples = [0; MAX_COUNTER_PORTS];
        let n = samples.len().min(MAX_COUNTER_PORTS);
        self.samples[..n].copy_from_slice(&samples[..n]);
        self.sample_count = n;
        self
    }

    /// Set accelerator cycles consumed per epoch.
    #[must_use]
    pub const fn with_accelerator_cycles_per_epoch(mut self, cycles: u64) -> Self {
        self.accel_cycles_per_epoch = cycles;
        self
    }

    /// Set ticks elapsed per `ticks()` read (controls run duration).
    #[must_use]
    pub const fn with_run_ticks(mut self, ticks: u64) -> Self {
        self.ticks_per_read = ticks;
        self
    }

    /// Set host cycles reported per measurement window.
    #[must_use]
    pub const fn with_cpu_cost(mut self, cycles: u64) -> Self {
        self.cpu_cost_per_window = cycles;
        self
    }

    /// How many times `configure` was called.
    #[must_use]
    pub const fn configure_calls(&self) -> u32 {
        self.configure_calls
    }

    /// How many times `start` was called.
    #[must_use]
    pub const fn start_calls(&self) -> u32 {
        self.start_calls
    }

    /// How many times `stop` was called.
    #[must_use]
    pub const fn stop_calls(&self) -> u32 {
        self.stop_calls
    }

    /// The most recent `configure` arguments.
    #[must_use]
    pub const fn last_mode(&self) -> Option<(CounterMode, PortMask)> {
        self.last_mode
    }
}

impl CounterBlock for SimCounters {
    fn configure(&mut self, mode: CounterMode, ports: PortMask) {
        self.configure_calls += 1;
        self.last_mode = Some((mode, ports));
    }

    fn start(&mut self) {
        self.start_calls += 1;
    }

    fn stop(&mut self) {
        self.stop_calls += 1;
    }

    fn read_samples(&mut self, out: &mut [u32; MAX_COUNTER_PORTS]) -> usize {
        *out = self.samples;
        self.sample_count
    }

    fn reset_cpu_cycles(&mut self) {}

    fn cpu_cycles(&mut self) -> u64 {
        self.cpu_cost_per_window
    }

    fn accelerator_cycles(&mut self) -> u64 {
        // Two reads bracket one epoch, so advancing by the per-epoch amount
        // on every read makes each bracketed difference exactly one epoch.
        let now = self.accel_now;
        self.accel_now += self.accel_cycles_per_epoch;
        now
    }

    fn ticks(&mut self) -> u64 {
        let now = self.tick_now;
        self.tick_now += self.ticks_per_read;
        now
    }
}
