//! CPU-side address decoding and interrupt plumbing.
//!
//! [`SystemBus`] borrows the console pieces for the duration of a CPU
//! step and routes reads and writes to RAM, PPU registers, APU
//! registers, the input ports and the mapper. Interrupt and DMA-stall
//! requests land in [`Signals`] and are drained into the CPU by the
//! frame loop.

use nes_core::{Bus, Irq};

use crate::apu::Apu;
use crate::controller::{Controller, Zapper};
use crate::mapper::Mapper;
use crate::ppu::Ppu;
use crate::rom::Rom;

/// Pending interrupt and stall requests raised during a bus access.
#[derive(Debug, Default, Clone, Copy)]
pub struct Signals {
    /// Latched interrupt request, if any.
    pub irq: Option<Irq>,
    /// CPU cycles to burn before the next instruction.
    pub halt_cycles: u32,
}

impl Signals {
    /// Latch an interrupt. A maskable IRQ never replaces a request
    /// that is already pending.
    pub fn request_irq(&mut self, kind: Irq) {
        if kind == Irq::Normal && self.irq.is_some() {
            return;
        }
        self.irq = Some(kind);
    }

    /// Add DMA stall cycles.
    pub fn halt_cycles(&mut self, cycles: u32) {
        self.halt_cycles += cycles;
    }
}

/// The console's memory map, borrowed for one CPU step.
pub struct SystemBus<'a> {
    pub mem: &'a mut [u8],
    pub ppu: &'a mut Ppu,
    pub apu: &'a mut Apu,
    pub mapper: &'a mut Mapper,
    pub rom: &'a Rom,
    pub controllers: &'a mut [Controller; 2],
    pub zapper: &'a mut Zapper,
    pub signals: &'a mut Signals,
    /// Set when $6000-$7FFF is written, so battery RAM can be saved.
    pub battery_ram_dirty: &'a mut bool,
    /// Last value written to $4016, for strobe edge detection.
    pub joypad_last_write: &'a mut u8,
}

impl SystemBus<'_> {
    fn reg_load(&mut self, address: u16) -> u8 {
        match address >> 12 {
            2 | 3 => match address & 0x7 {
                // $2000 and $2001 read back the last written value.
                0x0 => self.mem[0x2000],
                0x1 => self.mem[0x2001],
                0x2 => self.ppu.read_status_register(),
                0x4 => self.ppu.sram_load(),
                0x7 => self.ppu.vram_load(),
                _ => 0,
            },
            4 => match address {
                0x4015 => self.apu.read_status(),
                0x4016 => self.controllers[0].read(),
                0x4017 => {
                    // Zapper light sense is active-low on bit 3.
                    let mut w = 0x8;
                    if let Some((x, y)) = self.zapper.pos {
                        if self.ppu.is_pixel_white(x, y) {
                            w = 0;
                        }
                    }
                    if self.zapper.fired {
                        w |= 0x10;
                    }
                    self.controllers[1].read() | w
                }
                _ => 0,
            },
            _ => 0,
        }
    }

    fn reg_write(&mut self, address: u16, value: u8) {
        match address {
            0x2000 => {
                self.mem[0x2000] = value;
                self.ppu.update_control_reg1(value);
            }
            0x2001 => {
                self.mem[0x2001] = value;
                self.ppu.update_control_reg2(value);
            }
            0x2003 => self.ppu.write_sram_address(value),
            0x2004 => self.ppu.sram_write(value),
            0x2005 => self.ppu.scroll_write(value),
            0x2006 => self.ppu.write_vram_address(value),
            0x2007 => self.ppu.vram_write(value),
            0x4014 => self.ppu.sram_dma(value, self.mem, self.signals),
            0x4016 => {
                // Strobe on the falling edge of bit 0.
                if value & 1 == 0 && *self.joypad_last_write & 1 == 1 {
                    self.controllers[0].reset_strobe();
                    self.controllers[1].reset_strobe();
                }
                *self.joypad_last_write = value;
            }
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.apu.write_reg(address, value),
            _ => {}
        }
    }
}

impl Bus for SystemBus<'_> {
    fn cpu_read(&mut self, address: u16) -> u8 {
        if address > 0x4017 {
            // ROM window, SaveRAM and expansion area.
            return self.mem[usize::from(address)];
        }
        if address >= 0x2000 {
            self.reg_load(address)
        } else {
            // 2K internal RAM, mirrored four times.
            self.mem[usize::from(address & 0x7ff)]
        }
    }

    fn cpu_write(&mut self, address: u16, value: u8) {
        if self.mapper.intercepts(address) {
            self.mapper.write(address, value, self.rom, self.mem, self.ppu);
            return;
        }

        if address < 0x2000 {
            self.mem[usize::from(address & 0x7ff)] = value;
        } else if address > 0x4017 {
            self.mem[usize::from(address)] = value;
            if (0x6000..0x8000).contains(&address) {
                *self.battery_ram_dirty = true;
            }
        } else if address > 0x2007 && address < 0x4000 {
            // PPU register mirrors up to $3FFF.
            self.reg_write(0x2000 + (address & 0x7), value);
        } else {
            self.reg_write(address, value);
        }
    }

    fn request_irq(&mut self, kind: Irq) {
        self.signals.request_irq(kind);
    }

    fn halt_cycles(&mut self, cycles: u32) {
        self.signals.halt_cycles(cycles);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Button;

    struct Parts {
        mem: Vec<u8>,
        ppu: Ppu,
        apu: Apu,
        mapper: Mapper,
        rom: Rom,
        controllers: [Controller; 2],
        zapper: Zapper,
        signals: Signals,
        battery_ram_dirty: bool,
        joypad_last_write: u8,
    }

    impl Parts {
        fn new() -> Self {
            let mut data = vec![0u8; 16 + 16384];
            data[0..4].copy_from_slice(b"NES\x1a");
            data[4] = 1;
            Self {
                mem: vec![0u8; 0x10000],
                ppu: Ppu::new(),
                apu: Apu::new(44100.0, 60.0),
                mapper: Mapper::Nrom,
                rom: Rom::load(&data).expect("parse failed"),
                controllers: [Controller::new(), Controller::new()],
                zapper: Zapper::new(),
                signals: Signals::default(),
                battery_ram_dirty: false,
                joypad_last_write: 0,
            }
        }

        fn bus(&mut self) -> SystemBus<'_> {
            SystemBus {
                mem: &mut self.mem,
                ppu: &mut self.ppu,
                apu: &mut self.apu,
                mapper: &mut self.mapper,
                rom: &self.rom,
                controllers: &mut self.controllers,
                zapper: &mut self.zapper,
                signals: &mut self.signals,
                battery_ram_dirty: &mut self.battery_ram_dirty,
                joypad_last_write: &mut self.joypad_last_write,
            }
        }
    }

    #[test]
    fn internal_ram_is_mirrored_every_2k() {
        let mut parts = Parts::new();
        let mut bus = parts.bus();
        bus.cpu_write(0x0005, 0xAA);
        assert_eq!(bus.cpu_read(0x0805), 0xAA);
        assert_eq!(bus.cpu_read(0x1805), 0xAA);
    }

    #[test]
    fn ppu_registers_mirror_up_to_3fff() {
        let mut parts = Parts::new();
        let mut bus = parts.bus();
        bus.cpu_write(0x3FF8, 0x90); // mirrors $2000
        assert_eq!(bus.cpu_read(0x2000), 0x90);
    }

    #[test]
    fn controller_strobe_falling_edge_rewinds_both_pads() {
        let mut parts = Parts::new();
        parts.controllers[0].button_down(Button::A);
        let mut bus = parts.bus();

        bus.cpu_read(0x4016);
        bus.cpu_read(0x4016);
        bus.cpu_write(0x4016, 1);
        bus.cpu_write(0x4016, 0);
        assert_eq!(bus.cpu_read(0x4016), 0x41); // back at button A
    }

    #[test]
    fn sram_writes_mark_battery_ram_dirty() {
        let mut parts = Parts::new();
        let mut bus = parts.bus();
        bus.cpu_write(0x6123, 0x55);
        assert_eq!(bus.cpu_read(0x6123), 0x55);
        assert!(parts.battery_ram_dirty);
    }

    #[test]
    fn zapper_reports_no_light_and_trigger_on_4017() {
        let mut parts = Parts::new();
        parts.zapper.fired = true;
        let mut bus = parts.bus();
        // No position set: bit 3 high (no light), bit 4 high (trigger).
        assert_eq!(bus.cpu_read(0x4017) & 0x18, 0x18);
    }

    #[test]
    fn oam_dma_stalls_the_cpu() {
        let mut parts = Parts::new();
        let mut bus = parts.bus();
        bus.cpu_write(0x0200, 0x77);
        bus.cpu_write(0x4014, 0x02);
        assert_eq!(parts.signals.halt_cycles, 513);
        assert_eq!(parts.ppu.sprite_mem[0], 0x77);
    }

    #[test]
    fn maskable_irq_does_not_replace_pending_nmi() {
        let mut signals = Signals::default();
        signals.request_irq(Irq::NonMaskable);
        signals.request_irq(Irq::Normal);
        assert_eq!(signals.irq, Some(Irq::NonMaskable));
    }
}
