//! Static model introspection.
//!
//! Populates a [`ModelInfo`] once per model load by reading the accelerator
//! runtime's buffer tables and epoch-block list. Pure read; no hardware side
//! effects.

use crate::accounting;
use crate::error::{KestrelError, Result};
use crate::runtime::{AcceleratorRuntime, BufferDescriptor};
use tracing::{debug, warn};

/// Per-direction buffer capacity. A hard cap: models declaring more inputs
/// or outputs are rejected with an explicit error rather than truncated.
pub const MAX_IO_BUFFERS: usize = 5;

/// Upper bound on the epoch-block scan. A well-formed list terminates with
/// a `last` sentinel long before this; hitting the bound means the host and
/// runtime disagree about the model layout.
pub const MAX_EPOCH_BLOCKS: usize = 1024;

/// Everything the controller knows about a loaded model.
///
/// Created once per model load; read-only thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Accelerator runtime version.
    pub version: String,
    /// Runtime build descriptor.
    pub build: String,
    /// Weight footprint in bytes (plain sum over parameter buffers).
    pub params_bytes: u64,
    /// Activation footprint in bytes (region-coverage scan).
    pub activations_bytes: u64,
    /// True (non-parameter) input buffers, at most [`MAX_IO_BUFFERS`].
    pub inputs: Vec<BufferDescriptor>,
    /// Output buffers, at most [`MAX_IO_BUFFERS`].
    pub outputs: Vec<BufferDescriptor>,
    /// Number of epoch blocks in the model's execution graph.
    pub epoch_count: u32,
}

/// Build a [`ModelInfo`] from a live runtime.
///
/// # Errors
///
/// Returns [`KestrelError::CapacityExceeded`] if the model declares more
/// than [`MAX_IO_BUFFERS`] true inputs or outputs, and
/// [`KestrelError::Desynchronized`] if the epoch-block list has no terminal
/// sentinel within [`MAX_EPOCH_BLOCKS`] entries.
pub fn describe<R: AcceleratorRuntime>(runtime: &R) -> Result<ModelInfo> {
    let identity = runtime.identity();
    let declared_inputs = runtime.input_buffers();
    let declared_outputs = runtime.output_buffers();

    let inputs: Vec<BufferDescriptor> = declared_inputs
        .iter()
        .filter(|b| !b.is_parameter)
        .cloned()
        .collect();
    if inputs.len() > MAX_IO_BUFFERS {
        return Err(KestrelError::CapacityExceeded {
            kind: "input",
            capacity: MAX_IO_BUFFERS,
        });
    }
    if declared_outputs.len() > MAX_IO_BUFFERS {
        return Err(KestrelError::CapacityExceeded {
            kind: "output",
            capacity: MAX_IO_BUFFERS,
        });
    }
    let outputs = declared_outputs.to_vec();

    let epoch_count = count_epochs(runtime)?;

    // Footprints are computed over everything the model maps, inputs and
    // outputs alike; the parameter/activation split happens inside the
    // accountant.
    let mut all: Vec<BufferDescriptor> = declared_inputs.to_vec();
    all.extend_from_slice(declared_outputs);
    let params_bytes = accounting::parameter_bytes(&all);
    let activations_bytes = accounting::activation_bytes(&all);

    debug!(
        "model: {} inputs, {} outputs, {} epochs, {} param bytes, {} activation bytes",
        inputs.len(),
        outputs.len(),
        epoch_count,
        params_bytes,
        activations_bytes
    );

    Ok(ModelInfo {
        version: identity.version,
        build: identity.build,
        params_bytes,
        activations_bytes,
        inputs,
        outputs,
        epoch_count,
    })
}

/// Walk the epoch-block list up to the `last` sentinel, bounded.
fn count_epochs<R: AcceleratorRuntime>(runtime: &R) -> Result<u32> {
    for idx in 0..MAX_EPOCH_BLOCKS {
        match runtime.epoch_block(idx) {
            Some(block) if block.last => return Ok(u32::try_from(idx + 1).unwrap_or(u32::MAX)),
            Some(_) => {}
            None => {
                warn!("epoch-block list ended at {idx} without a last sentinel");
                return Err(KestrelError::desynchronized(
                    "epoch-block list ended without a terminal sentinel",
                ));
            }
        }
    }
    Err(KestrelError::desynchronized(format!(
        "no terminal sentinel within {MAX_EPOCH_BLOCKS} epoch blocks"
    )))
}
