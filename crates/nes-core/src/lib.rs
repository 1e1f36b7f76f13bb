//! Core bus and interrupt types for NES emulation.
//!
//! The CPU sees the rest of the console only through the [`Bus`] trait:
//! byte reads and writes, interrupt requests, and DMA stall cycles. The
//! machine crate provides the concrete implementation that routes
//! addresses to RAM, PPU registers, APU registers and the cartridge.

mod bus;

pub use bus::{Bus, Irq, RamBus};
