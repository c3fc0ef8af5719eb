//! Event-counter port assignments.
//!
//! The KN100 event-counter block samples up to [`MAX_COUNTER_PORTS`] hardware
//! ports at a time. Which ports are meaningful depends on the counting mode:
//! active-cycle counting watches the data-stream ports, high-enable pulse
//! counting watches the input ports, and burst-length counting watches the
//! read/write ports.

/// Maximum ports the counter block can sample concurrently.
pub const MAX_COUNTER_PORTS: usize = 8;

/// A bitmask of counter ports (bit `n` = port `n`).
pub type PortMask = u32;

/// Data-stream ports (active-cycle counting).
pub const DATA_STREAM_PORTS: PortMask = 0b0000_1111;

/// Input ports (high-enable pulse counting).
pub const INPUT_PORTS: PortMask = 0b0011_0000;

/// Read/write ports (burst-length counting).
pub const READ_WRITE_PORTS: PortMask = 0b1100_0000;

/// Number of ports set in `mask`, capped at [`MAX_COUNTER_PORTS`].
#[must_use]
pub const fn port_count(mask: PortMask) -> usize {
    let n = mask.count_ones() as usize;
    if n > MAX_COUNTER_PORTS {
        MAX_COUNTER_PORTS
    } else {
        n
    }
}
