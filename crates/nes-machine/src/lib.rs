//! Deterministic NES console emulation.
//!
//! [`Nes`] wires a 6502 CPU, scanline PPU, APU, mapper and input
//! devices into a complete machine driven one frame at a time. Given
//! the same ROM and the same inputs, every frame, framebuffer and
//! snapshot comes out byte for byte identical.

mod apu;
mod bus;
mod controller;
mod mapper;
mod nes;
mod palette;
mod ppu;
mod rom;
mod snapshot;
mod tile;

pub use controller::{Button, Controller, Zapper};
pub use mapper::Mapper;
pub use nes::{Nes, NesConfig};
pub use ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};
pub use rom::{mapper_name, Mirroring, Rom};
pub use snapshot::{CpuState, IrqState, PpuState, Snapshot, SNAPSHOT_VERSION};
