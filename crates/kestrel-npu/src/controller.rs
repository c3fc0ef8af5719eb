//! Top-level execution state machine.
//!
//! Single entry point for callers: obtain an instance handle, optionally
//! register an epoch callback, `init`, `run`. The controller owns its
//! execution context (accumulators and callback) — there is no process-wide
//! state, so two controllers over two devices are independent. A single
//! controller is still not reentrant: `run` takes `&mut self` and the borrow
//! checker serializes callers.

use kestrel_chip::regs::{self, control};
use kestrel_chip::timing::CYCLES_PER_TICK;
use tracing::{debug, info};

use crate::coherency;
use crate::error::{KestrelError, Result};
use crate::model::{self, ModelInfo};
use crate::profiler::{CounterMode, EpochCallback, EpochCounters, EpochProfiler};
use crate::runtime::{AcceleratorRuntime, CacheMaintenance, CounterBlock, Step};

/// Elapsed-tick threshold above which cycle counters are no longer trusted.
///
/// Below this, the run was short enough that the free-running cycle counter
/// cannot have wrapped, so its value is used directly (it is the more
/// precise source). Above it, without a callback keeping per-epoch cycle
/// bookkeeping, ticks are converted to cycles via the known clock frequency
/// instead. The value is inherited from the original firmware; whether it is
/// a derived overflow bound or an empirical choice is not recorded there.
pub const TICK_TRUST_THRESHOLD: u64 = 3000;

/// Upper bound on step-loop iterations for one run. Hitting it means the
/// accelerator never reported completion; the run fails with
/// [`KestrelError::Desynchronized`] instead of hanging forever.
pub const MAX_RUN_STEPS: usize = 100_000;

/// Controller state. `SoftReset` is a caller-visible init mode, not a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    /// Logically disabled; `run` will activate ephemerally.
    Disabled,
    /// Ready to run.
    Ready,
}

/// Caller-selectable init modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitMode {
    /// Mark the instance disabled. Logical only — clock gating is the
    /// caller's responsibility.
    Disable,
    /// Full bring-up: coherency reset, host timer reset, pipeline clear
    /// pulse, mark ready.
    Enable,
    /// Force a coherency reset without touching configuration. No-op
    /// unless the instance is ready.
    SoftReset,
}

/// Opaque handle to a model instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceId(usize);

/// Result of one `run`.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Populated profiling counters.
    pub counters: EpochCounters,
    /// Wall time of the run in system ticks.
    pub elapsed_ticks: u64,
}

/// The inference execution controller.
///
/// Generic over the three hardware boundaries so the software runtime can
/// stand in for silicon. Single-model build: exactly one instance, index 0.
pub struct ExecutionController<R, C, P>
where
    R: AcceleratorRuntime,
    C: CacheMaintenance,
    P: CounterBlock,
{
    runtime: R,
    cache: C,
    counter_hw: P,
    info: ModelInfo,
    state: ExecState,
    callback: Option<EpochCallback>,
    counter_mode: CounterMode,
}

impl<R, C, P> ExecutionController<R, C, P>
where
    R: AcceleratorRuntime,
    C: CacheMaintenance,
    P: CounterBlock,
{
    /// Build a controller over a loaded model.
    ///
    /// Describes the model up front; the resulting [`ModelInfo`] is fixed
    /// for the controller's lifetime.
    ///
    /// # Errors
    ///
    /// Propagates model description failures (capacity or sentinel errors).
    pub fn new(runtime: R, cache: C, counter_hw: P, counter_mode: CounterMode) -> Result<Self> {
        let info = model::describe(&runtime)?;
        info!(
            "controller up: runtime {} ({} epochs, {}+{} bytes)",
            info.version, info.epoch_count, info.params_bytes, info.activations_bytes
        );
        Ok(Self {
            runtime,
            cache,
            counter_hw,
            info,
            state: ExecState::Disabled,
            callback: None,
            counter_mode,
        })
    }

    /// Handle for the model instance at `index`.
    ///
    /// # Errors
    ///
    /// Single-model build: any index other than 0 returns
    /// [`KestrelError::InvalidIndex`].
    pub fn instance(&self, index: usize) -> Result<InstanceId> {
        if index != 0 {
            return Err(KestrelError::InvalidIndex { index, count: 1 });
        }
        Ok(InstanceId(index))
    }

    /// The model description computed at construction.
    #[must_use]
    pub const fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    /// Current controller state.
    #[must_use]
    pub const fn state(&self) -> ExecState {
        self.state
    }

    /// Register an epoch callback, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::InvalidHandle`] for a stale handle.
    pub fn set_callback(&mut self, id: InstanceId, callback: EpochCallback) -> Result<()> {
        self.check(id)?;
        self.callback = Some(callback);
        Ok(())
    }

    /// Remove the registered epoch callback, if any.
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::InvalidHandle`] for a stale handle.
    pub fn clear_callback(&mut self, id: InstanceId) -> Result<()> {
        self.check(id)?;
        self.callback = None;
        Ok(())
    }

    /// Change the instance state. See [`InitMode`] for the three modes.
    ///
    /// Calling `Enable` twice is idempotent apart from re-incurring the
    /// coherency reset cost.
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::InvalidHandle`] for a stale handle.
    pub fn init(&mut self, id: InstanceId, mode: InitMode) -> Result<()> {
        self.check(id)?;
        match mode {
            InitMode::Disable => {
                debug!("init: disable (logical)");
                self.state = ExecState::Disabled;
            }
            InitMode::Enable => {
                debug!("init: enable");
                coherency::full_reset(&mut self.cache);
                self.counter_hw.reset_cpu_cycles();
                // Pulse the pipeline clear via read-modify-write; the bit
                // self-clears in hardware.
                let ctl = self.runtime.read_reg(regs::CONTROL);
                self.runtime.write_reg(regs::CONTROL, ctl | control::PIPE_CLEAR);
                self.state = ExecState::Ready;
            }
            InitMode::SoftReset => {
                if self.state == ExecState::Ready {
                    debug!("init: soft reset");
                    coherency::full_reset(&mut self.cache);
                }
            }
        }
        Ok(())
    }

    /// Execute the model once: every epoch in order, to completion.
    ///
    /// A disabled instance is activated ephemerally and returned to
    /// `Disabled` before this returns; the caller-visible state is always
    /// restored. Blocks (via the runtime's wait-for-event) until the
    /// accelerator reports completion — there is no cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::InvalidHandle`] for a stale handle,
    /// [`KestrelError::Desynchronized`] if the step loop exceeds
    /// [`MAX_RUN_STEPS`], or any runtime failure (fatal, no rollback).
    pub fn run(&mut self, id: InstanceId) -> Result<RunOutcome> {
        self.check(id)?;

        let mut profiler = EpochProfiler::new(self.counter_mode);
        let callback_active = self.callback.is_some();

        let ephemeral = self.state == ExecState::Disabled;
        if ephemeral {
            debug!("run: ephemeral activation");
            self.init(id, InitMode::Enable)?;
        }

        let tick_start = self.counter_hw.ticks();
        self.counter_hw.reset_cpu_cycles();

        self.runtime.init()?;
        self.runtime.model_init()?;

        coherency::prepare_run(
            &mut self.cache,
            self.runtime.input_buffers(),
            self.runtime.output_buffers(),
        );

        let mut completed = false;
        for _ in 0..MAX_RUN_STEPS {
            match self.runtime.step()? {
                Step::Done => {
                    completed = true;
                    break;
                }
                Step::More => {}
                Step::WaitForEvent => {
                    // Woken by any interrupt; spurious wakeups just re-poll.
                    self.runtime.wait_for_event();
                }
                Step::Lifecycle(phase, epoch) => {
                    if callback_active {
                        profiler.on_phase(
                            phase,
                            epoch,
                            &mut self.counter_hw,
                            self.callback.as_mut(),
                        );
                    }
                }
            }
        }

        self.runtime.model_deinit()?;
        self.runtime.deinit()?;

        if ephemeral {
            self.init(id, InitMode::Disable)?;
        }

        if !completed {
            return Err(KestrelError::desynchronized(format!(
                "accelerator did not complete within {MAX_RUN_STEPS} steps"
            )));
        }

        let elapsed_ticks = self.counter_hw.ticks().wrapping_sub(tick_start);
        let mut counters = profiler.into_counters();

        // Timing source selection: cycle counters are more precise but can
        // overflow over long runs. With a callback the per-phase bookkeeping
        // already resets the counter every epoch and the accumulated sum is
        // kept; without one, a short run trusts the cycle counter directly
        // and a long run falls back to tick conversion.
        if !callback_active {
            counters.cpu_cycles_total = if elapsed_ticks < TICK_TRUST_THRESHOLD {
                self.counter_hw.cpu_cycles()
            } else {
                elapsed_ticks * CYCLES_PER_TICK
            };
        }

        info!(
            "run complete: {} ticks, {} host cycles, {} accelerator cycles",
            elapsed_ticks, counters.cpu_cycles_total, counters.accelerator_cycles_total
        );

        Ok(RunOutcome {
            counters,
            elapsed_ticks,
        })
    }

    fn check(&self, id: InstanceId) -> Result<()> {
        if id.0 != 0 {
            return Err(KestrelError::InvalidHandle);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{CacheOp, SimCache, SimCounters, SimRuntime};

    type SimController = ExecutionController<SimRuntime, SimCache, SimCounters>;

    fn controller(mode: CounterMode) -> SimController {
        ExecutionController::new(
            SimRuntime::synthetic(),
            SimCache::new(),
            SimCounters::new(),
            mode,
        )
        .unwrap()
    }

    #[test]
    fn instance_zero_exists() {
        let ctrl = controller(CounterMode::Off);
        assert!(ctrl.instance(0).is_ok());
    }

    #[test]
    fn out_of_range_index_is_invalid_index_not_a_crash() {
        let ctrl = controller(CounterMode::Off);
        match ctrl.instance(5) {
            Err(KestrelError::InvalidIndex { index: 5, count: 1 }) => {}
            other => panic!("expected InvalidIndex, got {other:?}"),
        }
    }

    #[test]
    fn enable_is_idempotent() {
        let mut ctrl = controller(CounterMode::Off);
        let id = ctrl.instance(0).unwrap();
        ctrl.init(id, InitMode::Enable).unwrap();
        assert_eq!(ctrl.state(), ExecState::Ready);
        ctrl.init(id, InitMode::Enable).unwrap();
        assert_eq!(ctrl.state(), ExecState::Ready);
    }

    #[test]
    fn enable_pulses_pipeline_clear() {
        let mut ctrl = controller(CounterMode::Off);
        let id = ctrl.instance(0).unwrap();
        ctrl.init(id, InitMode::Enable).unwrap();
        let writes = ctrl.runtime.reg_writes();
        assert_eq!(writes.len(), 1);
        let (offset, value) = writes[0];
        assert_eq!(offset, kestrel_chip::regs::CONTROL);
        assert_ne!(value & control::PIPE_CLEAR, 0);
        // Read-modify-write preserves the other control bits.
        assert_ne!(value & control::CLK_ENABLE, 0);
    }

    #[test]
    fn soft_reset_is_noop_when_disabled() {
        let mut ctrl = controller(CounterMode::Off);
        let id = ctrl.instance(0).unwrap();
        ctrl.init(id, InitMode::SoftReset).unwrap();
        assert_eq!(ctrl.state(), ExecState::Disabled);
        assert!(ctrl.cache.ops().is_empty());
    }

    #[test]
    fn soft_reset_resets_coherency_when_ready() {
        let mut ctrl = controller(CounterMode::Off);
        let id = ctrl.instance(0).unwrap();
        ctrl.init(id, InitMode::Enable).unwrap();
        let before = ctrl.cache.full_resets();
        ctrl.init(id, InitMode::SoftReset).unwrap();
        assert_eq!(ctrl.cache.full_resets(), before + 1);
        assert_eq!(ctrl.state(), ExecState::Ready);
    }

    #[test]
    fn run_restores_disabled_state() {
        let mut ctrl = controller(CounterMode::Off);
        let id = ctrl.instance(0).unwrap();
        assert_eq!(ctrl.state(), ExecState::Disabled);
        ctrl.run(id).unwrap();
        assert_eq!(ctrl.state(), ExecState::Disabled);
    }

    #[test]
    fn run_preserves_ready_state() {
        let mut ctrl = controller(CounterMode::Off);
        let id = ctrl.instance(0).unwrap();
        ctrl.init(id, InitMode::Enable).unwrap();
        ctrl.run(id).unwrap();
        assert_eq!(ctrl.state(), ExecState::Ready);
    }

    #[test]
    fn run_balances_runtime_and_model_lifecycles() {
        let mut ctrl = controller(CounterMode::Off);
        let id = ctrl.instance(0).unwrap();
        ctrl.run(id).unwrap();
        assert_eq!(ctrl.runtime.init_balance(), (1, 1));
        assert_eq!(ctrl.runtime.model_balance(), (1, 1));
    }

    #[test]
    fn run_blocks_on_wait_for_event() {
        let mut ctrl = controller(CounterMode::Off);
        let id = ctrl.instance(0).unwrap();
        ctrl.run(id).unwrap();
        // One WaitForEvent per scripted epoch.
        assert_eq!(ctrl.runtime.wait_calls(), 3);
    }

    #[test]
    fn run_prepares_buffer_coherency() {
        let mut ctrl = controller(CounterMode::Off);
        let id = ctrl.instance(0).unwrap();
        ctrl.run(id).unwrap();
        let ranges_cleaned = ctrl
            .cache
            .ops()
            .iter()
            .filter(|op| matches!(op, CacheOp::CleanInvalidateRange { .. }))
            .count();
        let ranges_invalidated = ctrl
            .cache
            .ops()
            .iter()
            .filter(|op| matches!(op, CacheOp::InvalidateRange { .. }))
            .count();
        assert_eq!(ranges_cleaned, 3); // 2 weight buffers + 1 input
        assert_eq!(ranges_invalidated, 1);
    }

    #[test]
    fn endless_stepping_hits_the_bound() {
        let mut ctrl = ExecutionController::new(
            SimRuntime::builder().endless_steps(true).build(),
            SimCache::new(),
            SimCounters::new(),
            CounterMode::Off,
        )
        .unwrap();
        let id = ctrl.instance(0).unwrap();
        assert!(matches!(
            ctrl.run(id),
            Err(KestrelError::Desynchronized { .. })
        ));
    }

    #[test]
    fn short_run_without_callback_trusts_cycle_counter() {
        let mut ctrl = ExecutionController::new(
            SimRuntime::synthetic(),
            SimCache::new(),
            SimCounters::new().with_run_ticks(120).with_cpu_cost(777),
            CounterMode::Off,
        )
        .unwrap();
        let id = ctrl.instance(0).unwrap();
        let outcome = ctrl.run(id).unwrap();
        assert_eq!(outcome.elapsed_ticks, 120);
        // Cycle counter value, not ticks × cycles-per-tick.
        assert_eq!(outcome.counters.cpu_cycles_total, 777);
    }

    #[test]
    fn long_run_without_callback_converts_ticks() {
        let mut ctrl = ExecutionController::new(
            SimRuntime::synthetic(),
            SimCache::new(),
            SimCounters::new().with_run_ticks(5000),
            CounterMode::Off,
        )
        .unwrap();
        let id = ctrl.instance(0).unwrap();
        let outcome = ctrl.run(id).unwrap();
        assert_eq!(outcome.elapsed_ticks, 5000);
        assert_eq!(outcome.counters.cpu_cycles_total, 5000 * CYCLES_PER_TICK);
    }

    #[test]
    fn stale_handle_is_invalid_handle() {
        let mut ctrl = controller(CounterMode::Off);
        let stale = InstanceId(3);
        assert!(matches!(ctrl.run(stale), Err(KestrelError::InvalidHandle)));
    }
}
