//! Per-epoch cycle profiling.
//!
//! The accelerator runtime raises four lifecycle phases around every epoch:
//! `PreStart → PostStart → PreEnd → PostEnd`. The profiler hangs counter
//! work off each phase and splits elapsed host cycles into three buckets —
//! the time spent starting an epoch, the time the accelerator core was
//! running, and the time spent retiring it. The free-running host cycle
//! counter is reset between every phase; wraparound is not corrected for.

use crate::runtime::{CounterBlock, Phase};
use kestrel_chip::ports::{self, PortMask, MAX_COUNTER_PORTS};
use tracing::trace;

/// Hardware event-counting mode for a run.
///
/// The counter block supports exactly one mode at a time; the mode is chosen
/// per controller instance at construction, not per build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterMode {
    /// No event counting; accelerator cycles come from the free-running
    /// counter alone.
    #[default]
    Off,
    /// Count cycles each data-stream port was active.
    ActiveCycles,
    /// Count high-enable pulses on the input ports.
    HighEnablePulses,
    /// Count burst lengths on the read/write ports.
    BurstLength,
}

impl CounterMode {
    /// Ports this mode samples.
    #[must_use]
    pub const fn ports(self) -> PortMask {
        match self {
            Self::Off => 0,
            Self::ActiveCycles => ports::DATA_STREAM_PORTS,
            Self::HighEnablePulses => ports::INPUT_PORTS,
            Self::BurstLength => ports::READ_WRITE_PORTS,
        }
    }

    /// Whether raw samples under-report against the free-running counter
    /// (back-pressure stalls the port but not the core). Such modes take
    /// the maximum sample across ports as the corrected core-cycle count.
    #[must_use]
    pub const fn needs_max_correction(self) -> bool {
        matches!(self, Self::ActiveCycles | Self::HighEnablePulses)
    }
}

/// Per-run profiling accumulators.
///
/// Reset at `run` entry, returned to the caller by value at exit. A snapshot
/// is also handed to the user callback after every completed epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EpochCounters {
    /// Host cycles spent between epoch dispatch phases.
    pub cpu_cycles_start: u64,
    /// Host cycles spent while the accelerator core was executing.
    pub cpu_cycles_core: u64,
    /// Host cycles spent retiring epochs.
    pub cpu_cycles_end: u64,
    /// Total host cycles attributed to the run.
    pub cpu_cycles_total: u64,
    /// Corrected accelerator core cycles, summed over all epochs.
    pub accelerator_cycles_total: u64,
    /// Index of the current (or last completed) epoch.
    pub epoch_index: u32,
    /// Counting mode active for this run.
    pub counter_mode: CounterMode,
    /// Raw per-port samples from the last completed epoch.
    pub samples: [u32; MAX_COUNTER_PORTS],
    /// Number of valid entries in `samples`.
    pub sample_count: usize,
}

/// Callback invoked around each epoch: at `PreStart` with the new epoch
/// index and no counters (none are available yet), and at `PostEnd` with the
/// completed epoch's full counter snapshot.
pub type EpochCallback = Box<dyn FnMut(u32, Option<&EpochCounters>) + Send>;

/// Four-phase dispatcher state for one run.
#[derive(Debug)]
pub struct EpochProfiler {
    mode: CounterMode,
    counters: EpochCounters,
    /// Accelerator cycle counter snapshot taken at `PostStart`.
    epoch_start_cycles: u64,
}

impl EpochProfiler {
    /// Create a profiler with zeroed accumulators.
    #[must_use]
    pub fn new(mode: CounterMode) -> Self {
        Self {
            mode,
            counters: EpochCounters {
                counter_mode: mode,
                ..EpochCounters::default()
            },
            epoch_start_cycles: 0,
        }
    }

    /// Current accumulator values.
    #[must_use]
    pub const fn counters(&self) -> &EpochCounters {
        &self.counters
    }

    /// Consume the profiler, yielding the final accumulators.
    #[must_use]
    pub fn into_counters(self) -> EpochCounters {
        self.counters
    }

    /// Handle one lifecycle phase for `epoch`.
    ///
    /// Phases must arrive in order; the accelerator runtime guarantees that
    /// for each epoch it steps through.
    pub fn on_phase<P: CounterBlock>(
        &mut self,
        phase: Phase,
        epoch: u32,
        hw: &mut P,
        mut callback: Option<&mut EpochCallback>,
    ) {
        trace!("epoch {epoch}: {phase:?}");
        match phase {
            Phase::PreStart => {
                self.counters.epoch_index = epoch;
                if self.mode != CounterMode::Off {
                    hw.configure(self.mode, self.mode.ports());
                    hw.start();
                }
                if let Some(cb) = callback.as_deref_mut() {
                    cb(epoch, None);
                }
            }
            Phase::PostStart => {
                self.epoch_start_cycles = hw.accelerator_cycles();
                self.counters.cpu_cycles_start += hw.cpu_cycles();
            }
            Phase::PreEnd => {
                // Free-running difference is the fallback core-cycle count;
                // event-counting modes refine it below.
                let mut core_cycles = hw
                    .accelerator_cycles()
                    .wrapping_sub(self.epoch_start_cycles);

                if self.mode != CounterMode::Off {
                    hw.stop();
                    self.counters.sample_count = hw.read_samples(&mut self.counters.samples);
                    if self.mode.needs_max_correction() {
                        core_cycles = self.counters.samples
                            [..self.counters.sample_count]
                            .iter()
                            .copied()
                            .max()
                            .map_or(core_cycles, u64::from);
                    }
                }

                self.counters.accelerator_cycles_total += core_cycles;
                self.counters.cpu_cycles_core += hw.cpu_cycles();
            }
            Phase::PostEnd => {
                self.counters.cpu_cycles_end += hw.cpu_cycles();
                self.counters.cpu_cycles_total = self.counters.cpu_cycles_start
                    + self.counters.cpu_cycles_core
                    + self.counters.cpu_cycles_end;
                if let Some(cb) = callback.as_deref_mut() {
                    cb(epoch, Some(&self.counters));
                }
            }
        }
        // Every phase closes one host-side measurement window.
        hw.reset_cpu_cycles();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimCounters;

    fn drive_epoch(profiler: &mut EpochProfiler, epoch: u32, hw: &mut SimCounters) {
        for phase in [
            Phase::PreStart,
            Phase::PostStart,
            Phase::PreEnd,
            Phase::PostEnd,
        ] {
            profiler.on_phase(phase, epoch, hw, None);
        }
    }

    #[test]
    fn cpu_total_is_sum_of_buckets() {
        let mut hw = SimCounters::new();
        let mut profiler = EpochProfiler::new(CounterMode::ActiveCycles);
        drive_epoch(&mut profiler, 0, &mut hw);
        drive_epoch(&mut profiler, 1, &mut hw);

        let c = profiler.counters();
        assert_eq!(
            c.cpu_cycles_total,
            c.cpu_cycles_start + c.cpu_cycles_core + c.cpu_cycles_end
        );
        assert!(c.cpu_cycles_total > 0);
    }

    #[test]
    fn max_of_samples_corrects_core_cycles() {
        let mut hw = SimCounters::new().with_samples(&[120, 340, 90, 211]);
        let mut profiler = EpochProfiler::new(CounterMode::ActiveCycles);
        drive_epoch(&mut profiler, 0, &mut hw);
        assert_eq!(profiler.counters().accelerator_cycles_total, 340);
    }

    #[test]
    fn burst_mode_uses_free_running_difference() {
        let mut hw = SimCounters::new()
            .with_samples(&[5, 5, 5, 5])
            .with_accelerator_cycles_per_epoch(7000);
        let mut profiler = EpochProfiler::new(CounterMode::BurstLength);
        drive_epoch(&mut profiler, 0, &mut hw);
        // Burst samples are lengths, not cycles; the counter difference wins.
        assert_eq!(profiler.counters().accelerator_cycles_total, 7000);
    }

    #[test]
    fn off_mode_never_touches_the_counter_block() {
        let mut hw = SimCounters::new();
        let mut profiler = EpochProfiler::new(CounterMode::Off);
        drive_epoch(&mut profiler, 0, &mut hw);
        assert_eq!(hw.configure_calls(), 0);
        assert_eq!(hw.start_calls(), 0);
    }

    #[test]
    fn accelerator_cycles_accumulate_across_epochs() {
        let mut hw = SimCounters::new().with_accelerator_cycles_per_epoch(1000);
        let mut profiler = EpochProfiler::new(CounterMode::Off);
        drive_epoch(&mut profiler, 0, &mut hw);
        drive_epoch(&mut profiler, 1, &mut hw);
        drive_epoch(&mut profiler, 2, &mut hw);
        assert_eq!(profiler.counters().accelerator_cycles_total, 3000);
        assert_eq!(profiler.counters().epoch_index, 2);
    }

    #[test]
    fn callback_sees_no_counters_at_prestart_and_snapshot_at_postend() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let pre = Arc::new(AtomicU32::new(0));
        let post = Arc::new(AtomicU32::new(0));
        let (p, q) = (Arc::clone(&pre), Arc::clone(&post));

        let mut cb: EpochCallback = Box::new(move |epoch, counters| match counters {
            None => p.store(epoch + 1, Ordering::Relaxed),
            Some(c) => {
                assert_eq!(c.epoch_index, epoch);
                q.store(epoch + 1, Ordering::Relaxed);
            }
        });

        let mut hw = SimCounters::new();
        let mut profiler = EpochProfiler::new(CounterMode::HighEnablePulses);
        for phase in [
            Phase::PreStart,
            Phase::PostStart,
            Phase::PreEnd,
            Phase::PostEnd,
        ] {
            profiler.on_phase(phase, 4, &mut hw, Some(&mut cb));
        }

        assert_eq!(pre.load(Ordering::Relaxed), 5);
        assert_eq!(post.load(Ordering::Relaxed), 5);
    }
}
