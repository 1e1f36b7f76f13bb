//! Memory and I/O bus interface.

/// Interrupt kinds a component can assert on the bus.
///
/// A maskable IRQ never overrides a pending NMI or reset; the CPU keeps
/// whichever request is already latched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Irq {
    /// Maskable interrupt, honoured only when the I flag is clear.
    Normal,
    /// Non-maskable interrupt (vertical blank).
    NonMaskable,
    /// Reset, vectors through $FFFC without pushing state.
    Reset,
}

/// Memory and I/O bus interface.
///
/// Components access memory and peripherals through this trait. The bus
/// handles address decoding and routing to the appropriate device, and
/// carries interrupt and DMA-stall requests back toward the CPU.
pub trait Bus {
    /// Read a byte from the given address.
    fn cpu_read(&mut self, address: u16) -> u8;

    /// Write a byte to the given address.
    fn cpu_write(&mut self, address: u16, value: u8);

    /// Assert an interrupt toward the CPU.
    fn request_irq(&mut self, kind: Irq);

    /// Stall the CPU for the given number of cycles (DMA transfers).
    fn halt_cycles(&mut self, cycles: u32);

    /// Read a little-endian 16-bit word.
    fn cpu_read_word(&mut self, address: u16) -> u16 {
        let lo = u16::from(self.cpu_read(address));
        let hi = u16::from(self.cpu_read(address.wrapping_add(1)));
        lo | (hi << 8)
    }
}

/// Flat 64K RAM bus for tests and tooling.
///
/// Interrupt and stall requests are recorded so tests can assert on them.
pub struct RamBus {
    /// Backing memory, addressed directly with no mirroring.
    pub mem: Vec<u8>,
    /// Last interrupt requested, if any.
    pub irq: Option<Irq>,
    /// Accumulated stall cycles.
    pub stalled: u32,
}

impl RamBus {
    /// Create a zero-filled 64K bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mem: vec![0; 0x10000],
            irq: None,
            stalled: 0,
        }
    }
}

impl Default for RamBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for RamBus {
    fn cpu_read(&mut self, address: u16) -> u8 {
        self.mem[address as usize]
    }

    fn cpu_write(&mut self, address: u16, value: u8) {
        self.mem[address as usize] = value;
    }

    fn request_irq(&mut self, kind: Irq) {
        self.irq = Some(kind);
    }

    fn halt_cycles(&mut self, cycles: u32) {
        self.stalled += cycles;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_reads_are_little_endian() {
        let mut bus = RamBus::new();
        bus.mem[0x1234] = 0xCD;
        bus.mem[0x1235] = 0xAB;
        assert_eq!(bus.cpu_read_word(0x1234), 0xABCD);
    }

    #[test]
    fn word_read_wraps_at_top_of_memory() {
        let mut bus = RamBus::new();
        bus.mem[0xFFFF] = 0x34;
        bus.mem[0x0000] = 0x12;
        assert_eq!(bus.cpu_read_word(0xFFFF), 0x1234);
    }
}
