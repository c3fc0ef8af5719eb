//! Memory footprint accounting.
//!
//! Answers one question per region: of the bytes in this physical region,
//! how many does the loaded model actually occupy? Buffer descriptors may
//! overlap each other and may straddle region edges, so a plain sum of
//! lengths would double-count; coverage is computed instead.

use crate::runtime::BufferDescriptor;
use kestrel_chip::mem::{activation_regions, AddressRange};
use tracing::debug;

/// Bytes of `region` covered by at least one descriptor range.
///
/// Coverage is tracked as a single running `[min, max]` envelope rather than
/// a true multi-interval union. This is exact when the covering descriptors
/// are contiguous or nested — the case for every model observed so far — but
/// **over-reports** when a region contains two covered sub-ranges separated
/// by an uncovered gap, because the gap is swallowed by the envelope.
/// Downstream footprint reporting depends on this exact (approximate) value;
/// do not change it to a true union without flagging the behavioral change.
pub fn covered_bytes<'a, I>(region: AddressRange, descriptors: I) -> u64
where
    I: IntoIterator<Item = &'a BufferDescriptor>,
{
    let lo = region.base;
    let hi = region.last();
    let mut envelope: Option<(u64, u64)> = None;

    for desc in descriptors {
        if desc.length == 0 {
            continue;
        }
        let start = desc.start_address;
        let end = desc.last();

        // Descriptor swallows the whole region: nothing can add to that.
        if start <= lo && end >= hi {
            return region.len;
        }
        // Disjoint from the region.
        if end < lo || start > hi {
            continue;
        }

        let clamped = (start.max(lo), end.min(hi));
        envelope = Some(match envelope {
            None => clamped,
            Some((min, max)) => (min.min(clamped.0), max.max(clamped.1)),
        });
    }

    envelope.map_or(0, |(min, max)| max - min + 1)
}

/// Total activation-memory footprint across the fixed physical partition
/// (SRAM banks, cache carve, external window).
///
/// Parameter buffers are excluded; their footprint is reported separately by
/// [`parameter_bytes`] so the two never double-count a physical byte.
#[must_use]
pub fn activation_bytes(descriptors: &[BufferDescriptor]) -> u64 {
    let mut total = 0u64;
    for region in activation_regions() {
        let covered = covered_bytes(region, descriptors.iter().filter(|d| !d.is_parameter));
        if covered != 0 {
            debug!(
                "region {:#x}+{:#x}: {} bytes covered",
                region.base, region.len, covered
            );
        }
        total += covered;
    }
    total
}

/// Parameter (weight) footprint: plain sum over descriptors flagged
/// `is_parameter`. Weights never alias, so no coverage scan is needed.
#[must_use]
pub fn parameter_bytes(descriptors: &[BufferDescriptor]) -> u64 {
    descriptors
        .iter()
        .filter(|d| d.is_parameter)
        .map(|d| d.length)
        .sum()
}
