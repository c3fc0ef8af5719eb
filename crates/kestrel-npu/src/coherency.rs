//! Buffer coherency around a run.
//!
//! The CPU is cached; the accelerator is not cache-coherent with it. Before
//! a run every input buffer is cleaned-and-invalidated (dirty data committed
//! to memory, cache copy dropped — so the accelerator reads fresh bytes and
//! no dirty line is evicted over them later) and every output buffer is
//! invalidated (stale cached data must not be read back after the
//! accelerator writes). Nothing is done on the output side after a run;
//! the pre-run invalidate already guarantees the host re-reads from memory.

use crate::runtime::{BufferDescriptor, CacheMaintenance};
use tracing::debug;

/// Per-buffer cache preparation before a run.
pub fn prepare_run<C: CacheMaintenance>(
    cache: &mut C,
    inputs: &[BufferDescriptor],
    outputs: &[BufferDescriptor],
) {
    for buf in inputs {
        debug!("clean+invalidate input '{}' ({} bytes)", buf.name, buf.length);
        cache.clean_invalidate_range(buf.start_address, buf.length);
    }
    for buf in outputs {
        debug!("invalidate output '{}' ({} bytes)", buf.name, buf.length);
        cache.invalidate_range(buf.start_address, buf.length);
    }
}

/// Coarse whole-cache reset, used when per-buffer precision is not yet
/// available (cold start or model re-load): drop the accelerator's own
/// cache, then clean-and-invalidate the entire CPU cache.
pub fn full_reset<C: CacheMaintenance>(cache: &mut C) {
    debug!("full coherency reset");
    cache.invalidate_accelerator_cache();
    cache.clean_invalidate_all();
}
