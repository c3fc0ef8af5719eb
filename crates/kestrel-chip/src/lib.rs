//! Silicon model for the Kestrel KN100 edge NPU.
//!
//! This crate has **no dependencies** and **no hardware access** — it is a
//! pure model of the silicon: register offsets, the physical memory map the
//! accelerator can reach, profiling-counter port assignments, and clock
//! constants.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | Control/status register map — offsets and bit definitions |
//! | [`mem`] | Physical memory map (SRAM banks, cache carve, external window) |
//! | [`ports`] | Event-counter port bitmasks for the three counting modes |
//! | [`timing`] | Core clock and system tick constants |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod mem;
pub mod ports;
pub mod regs;
pub mod timing;

pub use mem::AddressRange;
