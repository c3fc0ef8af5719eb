//! KN100 control register map.
//!
//! Only the registers the execution controller touches are modelled; the
//! instruction-stream registers belong to the accelerator runtime and are
//! deliberately absent.

/// Device ID / version register. Reads `0x4B4E_0100` ("KN", v1.0).
pub const DEVICE_ID: u32 = 0x0000;

/// Main status register.
pub const STATUS: u32 = 0x0004;

/// Control register. Read-modify-write; see [`control`] for bits.
pub const CONTROL: u32 = 0x0008;

/// Interrupt status register.
pub const IRQ_STATUS: u32 = 0x0010;
/// Interrupt enable register.
pub const IRQ_ENABLE: u32 = 0x0014;

/// Free-running accelerator cycle counter, low word.
pub const CYCLE_COUNT_LO: u32 = 0x0020;
/// Free-running accelerator cycle counter, high word.
pub const CYCLE_COUNT_HI: u32 = 0x0024;

/// Event-counter configuration register.
pub const EVT_CFG: u32 = 0x0030;
/// Event-counter sample registers, one per port; see [`crate::ports`].
pub const EVT_SAMPLE_BASE: u32 = 0x0040;
/// Stride between per-port sample registers.
pub const EVT_SAMPLE_STRIDE: u32 = 0x4;

/// Status register bits.
pub mod status {
    /// Accelerator ready to accept work.
    pub const READY: u32 = 1 << 0;
    /// An epoch is in flight.
    pub const BUSY: u32 = 1 << 1;
    /// Error latched during the last epoch.
    pub const ERROR: u32 = 1 << 2;
}

/// Control register bits.
pub mod control {
    /// Pulse the internal pipeline clear. Self-clearing.
    pub const PIPE_CLEAR: u32 = 1 << 0;
    /// Enable the accelerator clock domain.
    pub const CLK_ENABLE: u32 = 1 << 1;
    /// Gate the event-counter block.
    pub const EVT_GATE: u32 = 1 << 2;
}
