//! Cartridge mapper hardware.
//!
//! Banking works by copying: selecting a bank copies its bytes into the
//! fixed CPU window ($8000-$FFFF) or into pattern memory (with the
//! decoded tile cache refreshed alongside). Bank numbers wrap modulo
//! the bank count, so undersized images never index out of range.

use nes_core::Irq;
use serde::{Deserialize, Serialize};

use crate::bus::Signals;
use crate::ppu::Ppu;
use crate::rom::{mapper_name, Mirroring, Rom};

/// Mapper state for the supported boards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Mapper {
    Nrom,
    Mmc1 {
        reg_buffer: u8,
        reg_buffer_counter: u8,
        mirroring: u8,
        prg_switching_area: u8,
        prg_switching_size: u8,
        vrom_switching_size: u8,
        rom_selection_reg0: u8,
        rom_selection_reg1: u8,
    },
    UxRom,
    CnRom,
    Mmc3 {
        command: u8,
        prg_address_select: u8,
        chr_address_select: u8,
        irq_counter: i32,
        irq_latch_value: i32,
        irq_enable: u8,
        prg_address_changed: bool,
    },
    AoRom,
    ColorDreams,
    BnRom,
    Mapper038,
    GxRom,
    Un1Rom,
    Mapper140,
    Mapper180,
}

impl Mapper {
    /// Pick the mapper for a parsed image.
    pub fn for_rom(rom: &Rom) -> Result<Self, String> {
        if rom.rom_count < 1 {
            return Err("ROM has no PRG banks".to_string());
        }
        match rom.mapper_type {
            0 => Ok(Self::Nrom),
            1 => Ok(Self::mmc1()),
            2 => Ok(Self::UxRom),
            3 => Ok(Self::CnRom),
            4 => Ok(Self::mmc3()),
            7 => Ok(Self::AoRom),
            11 => Ok(Self::ColorDreams),
            34 => Ok(Self::BnRom),
            38 => Ok(Self::Mapper038),
            66 => Ok(Self::GxRom),
            94 => Ok(Self::Un1Rom),
            140 => Ok(Self::Mapper140),
            180 => Ok(Self::Mapper180),
            n => Err(format!("Unsupported mapper: {n} ({})", mapper_name(n))),
        }
    }

    fn mmc1() -> Self {
        Self::Mmc1 {
            reg_buffer: 0,
            reg_buffer_counter: 0,
            mirroring: 0,
            prg_switching_area: 1,
            prg_switching_size: 1,
            vrom_switching_size: 0,
            rom_selection_reg0: 0,
            rom_selection_reg1: 0,
        }
    }

    fn mmc3() -> Self {
        Self::Mmc3 {
            command: 0,
            prg_address_select: 0,
            chr_address_select: 0,
            irq_counter: 0,
            irq_latch_value: 0,
            irq_enable: 0,
            prg_address_changed: false,
        }
    }

    pub fn reset(&mut self) {
        match self {
            Self::Mmc1 { .. } => *self = Self::mmc1(),
            Self::Mmc3 { .. } => *self = Self::mmc3(),
            _ => {}
        }
    }

    /// Set up the power-on bank layout and request the reset interrupt.
    pub fn load_rom(
        &mut self,
        rom: &Rom,
        mem: &mut [u8],
        ppu: &mut Ppu,
        signals: &mut Signals,
        battery: Option<&[u8]>,
    ) -> Result<(), String> {
        if rom.rom_count < 1 {
            return Err("ROM has no PRG banks".to_string());
        }

        match self {
            Self::Mmc1 { .. } | Self::UxRom | Self::Un1Rom | Self::Mapper180 => {
                load_rom_bank(rom, mem, 0, 0x8000);
                load_rom_bank(rom, mem, rom.rom_count - 1, 0xc000);
            }
            Self::Mmc3 { .. } => {
                // Hardwired banks at $C000/$E000, swappable at $8000/$A000:
                load_8k_rom_bank(rom, mem, (rom.rom_count - 1) * 2, 0xc000);
                load_8k_rom_bank(rom, mem, (rom.rom_count - 1) * 2 + 1, 0xe000);
                load_8k_rom_bank(rom, mem, 0, 0x8000);
                load_8k_rom_bank(rom, mem, 1, 0xa000);
            }
            _ => load_prg_rom(rom, mem),
        }

        load_chr_rom(rom, ppu);

        // UN1ROM boards carry no battery RAM.
        if !matches!(self, Self::Un1Rom) {
            load_battery_ram(mem, battery);
        }

        signals.request_irq(Irq::Reset);
        Ok(())
    }

    /// Whether a CPU write to `address` is a mapper register access
    /// rather than a plain memory write.
    #[must_use]
    pub fn intercepts(&self, address: u16) -> bool {
        match self {
            Self::Nrom => false,
            Self::Mapper038 => (0x7000..=0x7fff).contains(&address),
            Self::Mapper140 => (0x6000..=0x7fff).contains(&address),
            _ => address >= 0x8000,
        }
    }

    /// Handle a write to a mapper register.
    pub fn write(&mut self, address: u16, value: u8, rom: &Rom, mem: &mut [u8], ppu: &mut Ppu) {
        match self {
            Self::Nrom => {}
            Self::Mmc1 { .. } => self.mmc1_write(address, value, rom, mem, ppu),
            Self::UxRom => load_rom_bank(rom, mem, usize::from(value), 0x8000),
            Self::CnRom => load_8k_vrom_bank(rom, ppu, usize::from(value) * 2, 0x0000),
            Self::Mmc3 { .. } => self.mmc3_write(address, value, rom, mem, ppu),
            Self::AoRom => {
                load_32k_rom_bank(rom, mem, usize::from(value & 0x7), 0x8000);
                if value & 0x10 != 0 {
                    ppu.set_mirroring(Mirroring::SingleScreen2);
                } else {
                    ppu.set_mirroring(Mirroring::SingleScreen);
                }
            }
            Self::ColorDreams => {
                let prgbank1 = (usize::from(value & 0xf) * 2) % rom.rom_count;
                let prgbank2 = (usize::from(value & 0xf) * 2 + 1) % rom.rom_count;
                load_rom_bank(rom, mem, prgbank1, 0x8000);
                load_rom_bank(rom, mem, prgbank2, 0xc000);

                if rom.vrom_count > 0 {
                    let bank = (usize::from(value >> 4) * 2) % rom.vrom_count;
                    load_vrom_bank(rom, ppu, bank, 0x0000);
                    load_vrom_bank(rom, ppu, bank + 1, 0x1000);
                }
            }
            Self::BnRom => load_32k_rom_bank(rom, mem, usize::from(value), 0x8000),
            Self::Mapper038 => {
                load_32k_rom_bank(rom, mem, usize::from(value & 3), 0x8000);
                load_8k_vrom_bank(rom, ppu, usize::from((value >> 2) & 3) * 2, 0x0000);
            }
            Self::GxRom => {
                load_32k_rom_bank(rom, mem, usize::from((value >> 4) & 3), 0x8000);
                load_8k_vrom_bank(rom, ppu, usize::from(value & 3) * 2, 0x0000);
            }
            Self::Un1Rom => load_rom_bank(rom, mem, usize::from(value >> 2), 0x8000),
            Self::Mapper140 => {
                load_8k_vrom_bank(rom, ppu, usize::from(value & 0xf) * 2, 0x0000);
                load_32k_rom_bank(rom, mem, usize::from((value >> 4) & 0xf), 0x8000);
            }
            Self::Mapper180 => load_rom_bank(rom, mem, usize::from(value), 0xc000),
        }
    }

    /// Scanline tick for the MMC3 IRQ counter; no-op elsewhere.
    pub fn clock_irq_counter(&mut self, signals: &mut Signals) {
        if let Self::Mmc3 {
            irq_counter,
            irq_latch_value,
            irq_enable,
            ..
        } = self
        {
            if *irq_enable == 1 {
                *irq_counter -= 1;
                if *irq_counter < 0 {
                    signals.request_irq(Irq::Normal);
                    *irq_counter = *irq_latch_value;
                }
            }
        }
    }

    fn mmc1_write(&mut self, address: u16, value: u8, rom: &Rom, mem: &mut [u8], ppu: &mut Ppu) {
        let Self::Mmc1 {
            reg_buffer,
            reg_buffer_counter,
            prg_switching_area,
            prg_switching_size,
            ..
        } = self
        else {
            return;
        };

        if value & 0x80 != 0 {
            // Reset the shift buffer:
            *reg_buffer_counter = 0;
            *reg_buffer = 0;

            if mmc1_reg_number(address) == 0 {
                *prg_switching_area = 1;
                *prg_switching_size = 1;
            }
            return;
        }

        // Shift in one bit; the fifth write commits the register.
        *reg_buffer = (*reg_buffer & !(1 << *reg_buffer_counter)) | ((value & 1) << *reg_buffer_counter);
        *reg_buffer_counter += 1;

        if *reg_buffer_counter == 5 {
            let committed = *reg_buffer;
            *reg_buffer = 0;
            *reg_buffer_counter = 0;
            self.mmc1_set_reg(mmc1_reg_number(address), committed, rom, mem, ppu);
        }
    }

    fn mmc1_set_reg(&mut self, reg: u8, value: u8, rom: &Rom, mem: &mut [u8], ppu: &mut Ppu) {
        let Self::Mmc1 {
            mirroring,
            prg_switching_area,
            prg_switching_size,
            vrom_switching_size,
            rom_selection_reg0,
            rom_selection_reg1,
            ..
        } = self
        else {
            return;
        };

        match reg {
            0 => {
                let tmp = value & 3;
                if tmp != *mirroring {
                    *mirroring = tmp;
                    if *mirroring & 2 == 0 {
                        // One-screen mirroring overrides the other bit:
                        ppu.set_mirroring(Mirroring::SingleScreen);
                    } else if *mirroring & 1 != 0 {
                        ppu.set_mirroring(Mirroring::Horizontal);
                    } else {
                        ppu.set_mirroring(Mirroring::Vertical);
                    }
                }

                *prg_switching_area = (value >> 2) & 1;
                *prg_switching_size = (value >> 3) & 1;
                *vrom_switching_size = (value >> 4) & 1;
            }
            1 => {
                *rom_selection_reg0 = (value >> 4) & 1;

                if rom.vrom_count > 0 {
                    // Select the CHR bank at $0000:
                    let half = if *rom_selection_reg0 == 0 {
                        0
                    } else {
                        rom.vrom_count / 2
                    };
                    if *vrom_switching_size == 0 {
                        load_8k_vrom_bank(rom, ppu, half + usize::from(value & 0xf), 0x0000);
                    } else {
                        load_vrom_bank(rom, ppu, half + usize::from(value & 0xf), 0x0000);
                    }
                }
            }
            2 => {
                *rom_selection_reg1 = (value >> 4) & 1;

                if rom.vrom_count > 0 && *vrom_switching_size == 1 {
                    // Select the CHR bank at $1000:
                    let half = if *rom_selection_reg1 == 0 {
                        0
                    } else {
                        rom.vrom_count / 2
                    };
                    load_vrom_bank(rom, ppu, half + usize::from(value & 0xf), 0x1000);
                }
            }
            _ => {
                // PRG bank select.
                let mut base_bank = 0;
                if rom.rom_count >= 32 {
                    // 1024 kB cart
                    if *vrom_switching_size == 0 {
                        if *rom_selection_reg0 == 1 {
                            base_bank = 16;
                        }
                    } else {
                        base_bank =
                            usize::from(*rom_selection_reg0 | (*rom_selection_reg1 << 1)) << 3;
                    }
                } else if rom.rom_count >= 16 && *rom_selection_reg0 == 1 {
                    // 512 kB cart
                    base_bank = 8;
                }

                if *prg_switching_size == 0 {
                    // 32 kB switching:
                    let bank = base_bank + usize::from(value & 0xf);
                    load_32k_rom_bank(rom, mem, bank, 0x8000);
                } else {
                    // 16 kB switching:
                    let bank = base_bank * 2 + usize::from(value & 0xf);
                    if *prg_switching_area == 0 {
                        load_rom_bank(rom, mem, bank, 0xc000);
                    } else {
                        load_rom_bank(rom, mem, bank, 0x8000);
                    }
                }
            }
        }
    }

    fn mmc3_write(&mut self, address: u16, value: u8, rom: &Rom, mem: &mut [u8], ppu: &mut Ppu) {
        let Self::Mmc3 {
            command,
            prg_address_select,
            chr_address_select,
            irq_counter,
            irq_latch_value,
            irq_enable,
            prg_address_changed,
        } = self
        else {
            return;
        };

        match address {
            0x8000 => {
                *command = value & 7;
                let tmp = (value >> 6) & 1;
                if tmp != *prg_address_select {
                    *prg_address_changed = true;
                }
                *prg_address_select = tmp;
                *chr_address_select = (value >> 7) & 1;
            }
            0x8001 => {
                let cmd = *command;
                self.mmc3_execute_command(cmd, value, rom, mem, ppu);
            }
            0xa000 => {
                if value & 1 != 0 {
                    ppu.set_mirroring(Mirroring::Horizontal);
                } else {
                    ppu.set_mirroring(Mirroring::Vertical);
                }
            }
            0xa001 => {
                // SaveRAM write protect toggle; unimplemented on
                // purpose, writes through $6000 always stick.
            }
            0xc000 => *irq_counter = i32::from(value),
            0xc001 => *irq_latch_value = i32::from(value),
            0xe000 => *irq_enable = 0,
            0xe001 => *irq_enable = 1,
            _ => {
                // Not an MMC3 register; ignore the stray ROM write.
            }
        }
    }

    fn mmc3_execute_command(&mut self, cmd: u8, arg: u8, rom: &Rom, mem: &mut [u8], ppu: &mut Ppu) {
        let Self::Mmc3 {
            prg_address_select,
            chr_address_select,
            prg_address_changed,
            ..
        } = self
        else {
            return;
        };

        let arg = usize::from(arg);
        let chr_flip = *chr_address_select != 0;

        match cmd {
            0 => {
                // Two 1K CHR pages at $0000 (or $1000 when flipped):
                let base = if chr_flip { 0x1000 } else { 0x0000 };
                load_1k_vrom_bank(rom, ppu, arg, base);
                load_1k_vrom_bank(rom, ppu, arg + 1, base + 0x400);
            }
            1 => {
                let base = if chr_flip { 0x1800 } else { 0x0800 };
                load_1k_vrom_bank(rom, ppu, arg, base);
                load_1k_vrom_bank(rom, ppu, arg + 1, base + 0x400);
            }
            2 => load_1k_vrom_bank(rom, ppu, arg, if chr_flip { 0x0000 } else { 0x1000 }),
            3 => load_1k_vrom_bank(rom, ppu, arg, if chr_flip { 0x0400 } else { 0x1400 }),
            4 => load_1k_vrom_bank(rom, ppu, arg, if chr_flip { 0x0800 } else { 0x1800 }),
            5 => load_1k_vrom_bank(rom, ppu, arg, if chr_flip { 0x0c00 } else { 0x1c00 }),
            6 => {
                if *prg_address_changed {
                    // Re-seat the hardwired bank:
                    let fixed = (rom.rom_count - 1) * 2;
                    if *prg_address_select == 0 {
                        load_8k_rom_bank(rom, mem, fixed, 0xc000);
                    } else {
                        load_8k_rom_bank(rom, mem, fixed, 0x8000);
                    }
                    *prg_address_changed = false;
                }

                if *prg_address_select == 0 {
                    load_8k_rom_bank(rom, mem, arg, 0x8000);
                } else {
                    load_8k_rom_bank(rom, mem, arg, 0xc000);
                }
            }
            7 => {
                load_8k_rom_bank(rom, mem, arg, 0xa000);

                if *prg_address_changed {
                    let fixed = (rom.rom_count - 1) * 2;
                    if *prg_address_select == 0 {
                        load_8k_rom_bank(rom, mem, fixed, 0xc000);
                    } else {
                        load_8k_rom_bank(rom, mem, fixed, 0x8000);
                    }
                    *prg_address_changed = false;
                }
            }
            _ => {}
        }
    }
}

fn mmc1_reg_number(address: u16) -> u8 {
    match address {
        0x8000..=0x9fff => 0,
        0xa000..=0xbfff => 1,
        0xc000..=0xdfff => 2,
        _ => 3,
    }
}

/// Copy a 16K PRG bank into the CPU window at `address`.
pub fn load_rom_bank(rom: &Rom, mem: &mut [u8], bank: usize, address: usize) {
    let bank = bank % rom.rom_count;
    mem[address..address + 16384].copy_from_slice(&rom.rom[bank]);
}

pub fn load_32k_rom_bank(rom: &Rom, mem: &mut [u8], bank: usize, address: usize) {
    load_rom_bank(rom, mem, (bank * 2) % rom.rom_count, address);
    load_rom_bank(rom, mem, (bank * 2 + 1) % rom.rom_count, address + 16384);
}

pub fn load_8k_rom_bank(rom: &Rom, mem: &mut [u8], bank_8k: usize, address: usize) {
    let bank_16k = (bank_8k / 2) % rom.rom_count;
    let offset = (bank_8k % 2) * 8192;
    mem[address..address + 8192].copy_from_slice(&rom.rom[bank_16k][offset..offset + 8192]);
}

/// Copy a 4K CHR bank into pattern memory, refreshing the tile cache.
pub fn load_vrom_bank(rom: &Rom, ppu: &mut Ppu, bank: usize, address: usize) {
    if rom.vrom_count == 0 {
        return;
    }
    ppu.trigger_rendering();

    let bank = bank % rom.vrom_count;
    ppu.vram_mem[address..address + 4096].copy_from_slice(&rom.vrom[bank]);
    ppu.pt_tile[address >> 4..(address >> 4) + 256].clone_from_slice(&rom.vrom_tile[bank]);
}

pub fn load_8k_vrom_bank(rom: &Rom, ppu: &mut Ppu, bank_4k_start: usize, address: usize) {
    if rom.vrom_count == 0 {
        return;
    }
    ppu.trigger_rendering();

    load_vrom_bank(rom, ppu, bank_4k_start % rom.vrom_count, address);
    load_vrom_bank(rom, ppu, (bank_4k_start + 1) % rom.vrom_count, address + 4096);
}

pub fn load_1k_vrom_bank(rom: &Rom, ppu: &mut Ppu, bank_1k: usize, address: usize) {
    if rom.vrom_count == 0 {
        return;
    }
    ppu.trigger_rendering();

    let bank_4k = (bank_1k / 4) % rom.vrom_count;
    let bank_offset = (bank_1k % 4) * 1024;
    ppu.vram_mem[address..address + 1024]
        .copy_from_slice(&rom.vrom[bank_4k][bank_offset..bank_offset + 1024]);

    let base_index = address >> 4;
    for i in 0..64 {
        ppu.pt_tile[base_index + i] = rom.vrom_tile[bank_4k][((bank_1k % 4) << 6) + i].clone();
    }
}

pub fn load_2k_vrom_bank(rom: &Rom, ppu: &mut Ppu, bank_2k: usize, address: usize) {
    if rom.vrom_count == 0 {
        return;
    }
    ppu.trigger_rendering();

    let bank_4k = (bank_2k / 2) % rom.vrom_count;
    let bank_offset = (bank_2k % 2) * 2048;
    ppu.vram_mem[address..address + 2048]
        .copy_from_slice(&rom.vrom[bank_4k][bank_offset..bank_offset + 2048]);

    let base_index = address >> 4;
    for i in 0..128 {
        ppu.pt_tile[base_index + i] = rom.vrom_tile[bank_4k][((bank_2k % 2) << 7) + i].clone();
    }
}

fn load_prg_rom(rom: &Rom, mem: &mut [u8]) {
    if rom.rom_count > 1 {
        load_rom_bank(rom, mem, 0, 0x8000);
        load_rom_bank(rom, mem, 1, 0xc000);
    } else {
        load_rom_bank(rom, mem, 0, 0x8000);
        load_rom_bank(rom, mem, 0, 0xc000);
    }
}

fn load_chr_rom(rom: &Rom, ppu: &mut Ppu) {
    if rom.vrom_count > 0 {
        if rom.vrom_count == 1 {
            load_vrom_bank(rom, ppu, 0, 0x0000);
            load_vrom_bank(rom, ppu, 0, 0x1000);
        } else {
            load_vrom_bank(rom, ppu, 0, 0x0000);
            load_vrom_bank(rom, ppu, 1, 0x1000);
        }
    }
}

fn load_battery_ram(mem: &mut [u8], battery: Option<&[u8]>) {
    if let Some(ram) = battery {
        if ram.len() == 0x2000 {
            mem[0x6000..0x8000].copy_from_slice(ram);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ines(prg_banks: u8, chr_banks: u8, mapper: u8) -> Vec<u8> {
        let prg_size = usize::from(prg_banks) * 16384;
        let chr_size = usize::from(chr_banks) * 8192;
        let mut data = vec![0u8; 16 + prg_size + chr_size];
        data[0..4].copy_from_slice(b"NES\x1a");
        data[4] = prg_banks;
        data[5] = chr_banks;
        data[6] = (mapper & 0x0F) << 4;
        data[7] = mapper & 0xF0;
        // Tag every 16K PRG bank with its index:
        for bank in 0..usize::from(prg_banks) {
            data[16 + bank * 16384] = bank as u8;
        }
        // Tag every 4K CHR bank likewise:
        for bank in 0..usize::from(chr_banks) * 2 {
            data[16 + prg_size + bank * 4096] = 0x80 + bank as u8;
        }
        data
    }

    fn setup(prg_banks: u8, chr_banks: u8, mapper: u8) -> (Rom, Vec<u8>, Ppu, Mapper, Signals) {
        let rom = Rom::load(&make_ines(prg_banks, chr_banks, mapper)).expect("parse failed");
        let mut mem = vec![0u8; 0x10000];
        let mut ppu = Ppu::new();
        let mut mapper = Mapper::for_rom(&rom).expect("mapper");
        let mut signals = Signals::default();
        mapper
            .load_rom(&rom, &mut mem, &mut ppu, &mut signals, None)
            .expect("load failed");
        (rom, mem, ppu, mapper, signals)
    }

    #[test]
    fn rejects_unsupported_mapper() {
        let rom = Rom::load(&make_ines(1, 0, 9)).expect("parse failed");
        let err = Mapper::for_rom(&rom).unwrap_err();
        assert_eq!(err, "Unsupported mapper: 9 (Nintendo MMC2)");
    }

    #[test]
    fn nrom_power_on_layout() {
        let (_, mem, ppu, _, signals) = setup(2, 1, 0);
        assert_eq!(mem[0x8000], 0); // bank 0
        assert_eq!(mem[0xc000], 1); // bank 1
        assert_eq!(ppu.vram_mem[0x0000], 0x80); // CHR bank 0
        assert_eq!(ppu.vram_mem[0x1000], 0x81); // CHR bank 1
        assert_eq!(signals.irq, Some(Irq::Reset));
    }

    #[test]
    fn single_prg_bank_is_doubled_up() {
        let (_, mem, _, _, _) = setup(1, 0, 0);
        assert_eq!(mem[0x8000], 0);
        assert_eq!(mem[0xc000], 0);
    }

    #[test]
    fn uxrom_switches_8000_and_wraps_bank_numbers() {
        let (rom, mut mem, mut ppu, mut mapper, _) = setup(4, 0, 2);
        assert_eq!(mem[0xc000], 3); // last bank hardwired

        mapper.write(0x8000, 6, &rom, &mut mem, &mut ppu);
        assert_eq!(mem[0x8000], 2); // 6 % 4
        assert_eq!(mem[0xc000], 3); // untouched
    }

    #[test]
    fn cnrom_swaps_8k_chr() {
        let (rom, mut mem, mut ppu, mut mapper, _) = setup(1, 2, 3);
        mapper.write(0x8000, 1, &rom, &mut mem, &mut ppu);
        assert_eq!(ppu.vram_mem[0x0000], 0x82);
        assert_eq!(ppu.vram_mem[0x1000], 0x83);
        // The tile cache follows the copy:
        assert_eq!(ppu.pt_tile[0].pix[0], 1);
    }

    #[test]
    fn mmc1_commits_after_five_serial_writes() {
        let (rom, mut mem, mut ppu, mut mapper, _) = setup(8, 0, 1);
        assert_eq!(mem[0x8000], 0);
        assert_eq!(mem[0xc000], 7);

        // Shift bank number 3 into register 3 (PRG select), LSB first:
        for bit in [1, 1, 0, 0, 0] {
            mapper.write(0xe000, bit, &rom, &mut mem, &mut ppu);
        }
        assert_eq!(mem[0x8000], 3);
    }

    #[test]
    fn mmc1_reset_bit_clears_shift_buffer() {
        let (rom, mut mem, mut ppu, mut mapper, _) = setup(8, 0, 1);
        mapper.write(0xe000, 1, &rom, &mut mem, &mut ppu);
        mapper.write(0xe000, 0x80, &rom, &mut mem, &mut ppu);
        // Five fresh bits select bank 1:
        for bit in [1, 0, 0, 0, 0] {
            mapper.write(0xe000, bit, &rom, &mut mem, &mut ppu);
        }
        assert_eq!(mem[0x8000], 1);
    }

    #[test]
    fn mmc3_scanline_counter_fires_irq() {
        let (rom, mut mem, mut ppu, mut mapper, mut signals) = setup(2, 1, 4);
        signals.irq = None;

        mapper.write(0xc000, 2, &rom, &mut mem, &mut ppu); // counter
        mapper.write(0xc001, 2, &rom, &mut mem, &mut ppu); // latch
        mapper.write(0xe001, 0, &rom, &mut mem, &mut ppu); // enable

        mapper.clock_irq_counter(&mut signals);
        mapper.clock_irq_counter(&mut signals);
        assert_eq!(signals.irq, None);
        mapper.clock_irq_counter(&mut signals);
        assert_eq!(signals.irq, Some(Irq::Normal));
    }

    #[test]
    fn mmc3_power_on_layout() {
        let (_, mem, _, _, _) = setup(4, 1, 4);
        assert_eq!(mem[0x8000], 0); // 8K bank 0
        assert_eq!(mem[0xa000], 0); // 8K bank 1 (second half of 16K bank 0)
        assert_eq!(mem[0xc000], 3); // fixed: first half of last 16K bank
    }

    #[test]
    fn aorom_write_sets_one_screen_mirroring() {
        let (rom, mut mem, mut ppu, mut mapper, _) = setup(4, 0, 7);
        mapper.write(0x8000, 0x11, &rom, &mut mem, &mut ppu);
        assert_eq!(mem[0x8000], 2); // 32K bank 1
        assert_eq!(ppu.vram_mirror_table[0x2400], 0x2400); // second nametable everywhere

        mapper.write(0x8000, 0x00, &rom, &mut mem, &mut ppu);
        assert_eq!(ppu.vram_mirror_table[0x2400], 0x2000);
    }

    #[test]
    fn gxrom_write_selects_prg_and_chr() {
        let (rom, mut mem, mut ppu, mut mapper, _) = setup(4, 2, 66);
        mapper.write(0x8000, 0x11, &rom, &mut mem, &mut ppu);
        assert_eq!(mem[0x8000], 2); // PRG 32K bank 1
        assert_eq!(ppu.vram_mem[0x0000], 0x82); // CHR 8K bank 1
    }

    #[test]
    fn nrom_ignores_register_writes() {
        let (_, _, _, mapper, _) = setup(1, 0, 0);
        assert!(!mapper.intercepts(0x8000));
    }
}
