//! Instruction-stepped 6502 CPU emulator.
//!
//! Each call to [`Cpu::emulate`] dispatches any pending interrupt, then
//! executes exactly one instruction and returns the number of cycles it
//! consumed, including page-cross and taken-branch penalties. The
//! scheduler multiplies that count out to the other chips.

mod cpu;
pub mod opcodes;

pub use cpu::Cpu;
