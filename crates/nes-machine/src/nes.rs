//! Top-level NES system.
//!
//! One CPU cycle corresponds to three PPU dots. A frame runs the CPU an
//! instruction at a time (or burns DMA stall cycles in 8-cycle slices),
//! clocks the APU by the same CPU cycles, then feeds the tripled count
//! to the PPU until it reports the start of VBlank.

use nes_core::Irq;
use tracing::{error, info};

use cpu_6502::Cpu;

use crate::apu::Apu;
use crate::bus::{Signals, SystemBus};
use crate::controller::{Button, Controller, Zapper};
use crate::mapper::Mapper;
use crate::ppu::Ppu;
use crate::rom::Rom;
use crate::snapshot::{self, CpuState, IrqState, Snapshot, SNAPSHOT_VERSION};

/// Machine configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct NesConfig {
    /// Host audio sample rate in Hz.
    pub sample_rate: f64,
    /// Target frame rate; scales the APU's sampling and sequencer.
    pub frame_rate: f64,
    /// Clock the APU during frames. Disabling skips all audio work.
    pub emulate_sound: bool,
}

impl Default for NesConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            frame_rate: 60.0,
            emulate_sound: true,
        }
    }
}

/// NES system: CPU, PPU, APU, cartridge and input devices.
pub struct Nes {
    config: NesConfig,
    cpu: Cpu,
    /// 64K CPU address space: RAM, SaveRAM and the banked ROM windows.
    mem: Vec<u8>,
    ppu: Ppu,
    apu: Apu,
    mapper: Option<Mapper>,
    rom: Option<Rom>,
    controllers: [Controller; 2],
    zapper: Zapper,
    signals: Signals,
    joypad_last_write: u8,
    battery_ram_dirty: bool,
    frame_count: u64,
}

impl Default for Nes {
    fn default() -> Self {
        Self::new(NesConfig::default())
    }
}

impl Nes {
    #[must_use]
    pub fn new(config: NesConfig) -> Self {
        let apu = Apu::new(config.sample_rate, config.frame_rate);
        let mut nes = Self {
            config,
            cpu: Cpu::new(),
            mem: vec![0; 0x10000],
            ppu: Ppu::new(),
            apu,
            mapper: None,
            rom: None,
            controllers: [Controller::new(), Controller::new()],
            zapper: Zapper::new(),
            signals: Signals::default(),
            joypad_last_write: 0,
            battery_ram_dirty: false,
            frame_count: 0,
        };
        nes.reset();
        nes
    }

    /// Reset the machine to power-on state. The loaded cartridge (if
    /// any) keeps its banks mapped in.
    pub fn reset(&mut self) {
        self.fill_power_on_memory();
        self.cpu.reset();
        self.ppu.reset();
        self.apu.reset();
        self.signals = Signals::default();
        self.joypad_last_write = 0;
    }

    /// The power-on RAM pattern: the 2K internal RAM pages read back
    /// $FF with a few scattered low bytes; everything above is zero.
    fn fill_power_on_memory(&mut self) {
        self.mem.fill(0);
        for byte in &mut self.mem[0..0x2000] {
            *byte = 0xff;
        }
        for page in 0..4 {
            let base = page * 0x800;
            self.mem[base + 0x008] = 0xf7;
            self.mem[base + 0x009] = 0xef;
            self.mem[base + 0x00a] = 0xdf;
            self.mem[base + 0x00f] = 0xbf;
        }
    }

    /// Parse an iNES image, reset the machine and map in the cartridge.
    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), String> {
        self.load_rom_with_battery(data, None)
    }

    /// Like [`Nes::load_rom`], seeding SaveRAM from an 8K battery image.
    pub fn load_rom_with_battery(
        &mut self,
        data: &[u8],
        battery: Option<&[u8]>,
    ) -> Result<(), String> {
        // Validate everything before touching the running session: a
        // failed load must leave prior state intact.
        let rom = Rom::load(data)?;
        let mut mapper = Mapper::for_rom(&rom)?;

        self.rom = None;
        self.mapper = None;
        self.reset();

        mapper.load_rom(&rom, &mut self.mem, &mut self.ppu, &mut self.signals, battery)?;
        self.ppu.set_mirroring(rom.mirroring_type());
        self.drain_signals();

        info!(
            mapper = rom.mapper_type,
            prg_banks = rom.rom_count,
            chr_banks = rom.vrom_count,
            battery = rom.battery_ram,
            "loaded ROM"
        );

        self.mapper = Some(mapper);
        self.rom = Some(rom);
        self.frame_count = 0;
        self.battery_ram_dirty = false;
        Ok(())
    }

    /// Run one frame: from the top of the picture to the start of
    /// VBlank.
    pub fn frame(&mut self) -> Result<(), String> {
        let Self {
            config,
            cpu,
            mem,
            ppu,
            apu,
            mapper,
            rom,
            controllers,
            zapper,
            signals,
            joypad_last_write,
            battery_ram_dirty,
            ..
        } = self;
        let (Some(rom), Some(mapper)) = (rom.as_ref(), mapper.as_mut()) else {
            return Err("No ROM loaded".to_string());
        };

        ppu.start_frame();

        loop {
            let cycles;
            if cpu.cycles_to_halt == 0 {
                // Execute one instruction:
                let mut bus = SystemBus {
                    mem: &mut mem[..],
                    ppu: &mut *ppu,
                    apu: &mut *apu,
                    mapper: &mut *mapper,
                    rom,
                    controllers: &mut *controllers,
                    zapper: &mut *zapper,
                    signals: &mut *signals,
                    battery_ram_dirty: &mut *battery_ram_dirty,
                    joypad_last_write: &mut *joypad_last_write,
                };
                let instr_cycles = cpu.emulate(&mut bus);

                if let Some(msg) = &cpu.halt_message {
                    error!("CPU halted: {msg}");
                    return Err(msg.clone());
                }

                if config.emulate_sound {
                    apu.clock_frame_counter(instr_cycles as i32, mem, signals);
                }
                cycles = instr_cycles * 3;
            } else if cpu.cycles_to_halt > 8 {
                // Burn DMA stall cycles in 8-cycle slices:
                cycles = 24;
                if config.emulate_sound {
                    apu.clock_frame_counter(8, mem, signals);
                }
                cpu.cycles_to_halt -= 8;
            } else {
                cycles = cpu.cycles_to_halt * 3;
                if config.emulate_sound {
                    apu.clock_frame_counter(cpu.cycles_to_halt as i32, mem, signals);
                }
                cpu.cycles_to_halt = 0;
            }

            let frame_done = ppu.do_cycles(cycles, mapper, signals);

            if let Some(kind) = signals.irq.take() {
                cpu.request_irq(kind);
            }
            if signals.halt_cycles > 0 {
                cpu.halt_cycles(signals.halt_cycles);
                signals.halt_cycles = 0;
            }

            if frame_done {
                break;
            }
        }

        self.frame_count += 1;
        Ok(())
    }

    fn drain_signals(&mut self) {
        if let Some(kind) = self.signals.irq.take() {
            self.cpu.request_irq(kind);
        }
        if self.signals.halt_cycles > 0 {
            self.cpu.halt_cycles(self.signals.halt_cycles);
            self.signals.halt_cycles = 0;
        }
    }

    // ------------------------------------------------------------------
    // Input

    /// Press a button on controller 0 or 1.
    pub fn button_down(&mut self, controller: usize, button: Button) {
        if let Some(pad) = self.controllers.get_mut(controller) {
            pad.button_down(button);
        }
    }

    /// Release a button on controller 0 or 1.
    pub fn button_up(&mut self, controller: usize, button: Button) {
        if let Some(pad) = self.controllers.get_mut(controller) {
            pad.button_up(button);
        }
    }

    /// Point the Zapper at a screen pixel.
    pub fn zapper_move(&mut self, x: usize, y: usize) {
        self.zapper.pos = Some((x, y));
    }

    pub fn zapper_fire_down(&mut self) {
        self.zapper.fired = true;
    }

    pub fn zapper_fire_up(&mut self) {
        self.zapper.fired = false;
    }

    // ------------------------------------------------------------------
    // Output

    /// The rendered picture (RGB32, 256x240), valid after [`Nes::frame`].
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        &self.ppu.buffer
    }

    /// Take all stereo samples mixed since the last call.
    pub fn drain_audio_samples(&mut self) -> Vec<(f32, f32)> {
        std::mem::take(&mut self.apu.samples)
    }

    /// The 8K SaveRAM window, if the cartridge is battery backed.
    #[must_use]
    pub fn battery_ram(&self) -> Option<&[u8]> {
        self.rom
            .as_ref()
            .filter(|rom| rom.battery_ram)
            .map(|_| &self.mem[0x6000..0x8000])
    }

    /// Whether SaveRAM changed since the last call; clears the flag.
    pub fn take_battery_ram_dirty(&mut self) -> bool {
        std::mem::take(&mut self.battery_ram_dirty)
    }

    /// Completed frames since the ROM was loaded.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// The CPU, for inspection.
    #[must_use]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    // ------------------------------------------------------------------
    // Snapshots

    /// Capture the full machine state.
    pub fn snapshot(&self) -> Result<Snapshot, String> {
        let rom = self.rom.as_ref().ok_or_else(|| "No ROM loaded".to_string())?;
        let mapper = self
            .mapper
            .clone()
            .ok_or_else(|| "No ROM loaded".to_string())?;

        Ok(Snapshot {
            version: SNAPSHOT_VERSION,
            rom_data: rom.raw.clone(),
            cpu: CpuState {
                mem: self.mem.clone(),
                a: self.cpu.a,
                x: self.cpu.x,
                y: self.cpu.y,
                sp: self.cpu.sp,
                pc: self.cpu.pc,
                status: self.cpu.status_byte(),
                cycles_to_halt: self.cpu.cycles_to_halt,
                irq_requested: self.cpu.irq_requested.map(IrqState::from),
            },
            mapper,
            ppu: snapshot::capture_ppu(&self.ppu),
            controllers: self.controllers.clone(),
            zapper: self.zapper.clone(),
            joypad_last_write: self.joypad_last_write,
        })
    }

    /// Restore a previously captured state, including the ROM it
    /// embeds. Audio restarts from silence.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), String> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(format!(
                "Unsupported snapshot version: {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            ));
        }
        if snapshot.cpu.mem.len() != 0x10000 {
            return Err("Snapshot CPU memory must be 64K".to_string());
        }
        if snapshot.ppu.vram_mem.len() != 0x8000 {
            return Err("Snapshot VRAM must be 32K".to_string());
        }
        if snapshot.ppu.sprite_mem.len() != 256 {
            return Err("Snapshot sprite RAM must be 256 bytes".to_string());
        }

        let rom = Rom::load(&snapshot.rom_data)?;

        self.rom = None;
        self.mapper = None;
        self.reset();

        self.mem.clone_from(&snapshot.cpu.mem);
        self.cpu.a = snapshot.cpu.a;
        self.cpu.x = snapshot.cpu.x;
        self.cpu.y = snapshot.cpu.y;
        self.cpu.sp = snapshot.cpu.sp;
        self.cpu.pc = snapshot.cpu.pc;
        self.cpu.set_status_byte(snapshot.cpu.status);
        self.cpu.cycles_to_halt = snapshot.cpu.cycles_to_halt;
        self.cpu.irq_requested = snapshot.cpu.irq_requested.map(Irq::from);

        snapshot::apply_ppu(&snapshot.ppu, &mut self.ppu);
        self.mapper = Some(snapshot.mapper.clone());
        self.controllers = snapshot.controllers.clone();
        self.zapper = snapshot.zapper.clone();
        self.joypad_last_write = snapshot.joypad_last_write;
        self.rom = Some(rom);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_rom() -> Vec<u8> {
        let mut data = vec![0u8; 16 + 16384];
        data[0..4].copy_from_slice(b"NES\x1a");
        data[4] = 1;
        // $8000: JMP $8000
        data[16] = 0x4c;
        data[17] = 0x00;
        data[18] = 0x80;
        // Reset vector.
        data[16 + 0x3ffc] = 0x00;
        data[16 + 0x3ffd] = 0x80;
        data
    }

    #[test]
    fn frame_without_rom_is_an_error() {
        let mut nes = Nes::default();
        assert_eq!(nes.frame().unwrap_err(), "No ROM loaded");
    }

    #[test]
    fn load_rom_rejects_garbage() {
        let mut nes = Nes::default();
        assert!(nes.load_rom(&[0u8; 64]).is_err());
    }

    #[test]
    fn failed_load_leaves_running_session_intact() {
        let mut nes = Nes::default();
        nes.load_rom(&idle_rom()).expect("load failed");
        nes.frame().expect("frame failed");

        // Mapper 9 (MMC2) is unsupported; the load must fail without
        // disturbing the running session.
        let mut unsupported = idle_rom();
        unsupported[6] = 0x90;
        assert!(nes.load_rom(&unsupported).is_err());

        // Zero PRG banks is rejected the same way.
        let mut empty = idle_rom();
        empty[4] = 0;
        assert!(nes.load_rom(&empty).is_err());

        nes.frame().expect("frame failed");
        assert_eq!(nes.frame_count(), 2);
    }

    #[test]
    fn power_on_memory_pattern() {
        let nes = Nes::default();
        assert_eq!(nes.mem[0x0000], 0xff);
        assert_eq!(nes.mem[0x0008], 0xf7);
        assert_eq!(nes.mem[0x0009], 0xef);
        assert_eq!(nes.mem[0x000a], 0xdf);
        assert_eq!(nes.mem[0x000f], 0xbf);
        assert_eq!(nes.mem[0x0808], 0xf7);
        assert_eq!(nes.mem[0x2000], 0x00);
        assert_eq!(nes.mem[0x4020], 0x00);
    }

    #[test]
    fn frame_runs_to_vblank() {
        let mut nes = Nes::default();
        nes.load_rom(&idle_rom()).expect("load failed");
        nes.frame().expect("frame failed");
        assert_eq!(nes.frame_count(), 1);
        assert_eq!(nes.framebuffer().len(), 256 * 240);
    }

    #[test]
    fn sound_can_be_disabled() {
        let mut nes = Nes::new(NesConfig {
            emulate_sound: false,
            ..NesConfig::default()
        });
        nes.load_rom(&idle_rom()).expect("load failed");
        nes.frame().expect("frame failed");
        assert!(nes.drain_audio_samples().is_empty());
    }

    #[test]
    fn audio_samples_accumulate_per_frame() {
        let mut nes = Nes::default();
        nes.load_rom(&idle_rom()).expect("load failed");
        nes.frame().expect("frame failed");
        let samples = nes.drain_audio_samples();
        assert!(!samples.is_empty());
        assert!(nes.drain_audio_samples().is_empty()); // drained
    }

    #[test]
    fn battery_ram_window_requires_battery_flag() {
        let mut nes = Nes::default();
        nes.load_rom(&idle_rom()).expect("load failed");
        assert!(nes.battery_ram().is_none());

        let mut data = idle_rom();
        data[6] = 0x02; // battery bit
        nes.load_rom(&data).expect("load failed");
        assert_eq!(nes.battery_ram().map(<[u8]>::len), Some(0x2000));
    }

    #[test]
    fn restore_rejects_wrong_version() {
        let mut nes = Nes::default();
        nes.load_rom(&idle_rom()).expect("load failed");
        let mut snap = nes.snapshot().expect("snapshot failed");
        snap.version = 99;
        let err = nes.restore(&snap).unwrap_err();
        assert!(err.contains("version"));
    }
}
