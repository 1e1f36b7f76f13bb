//! Versioned machine snapshots.
//!
//! A snapshot embeds the original ROM image plus the raw state of the
//! CPU, mapper and PPU. Derived PPU structures (tile caches, mirror
//! tables, palettes) are not stored; they are rebuilt on restore from
//! the raw memories. APU state does not travel: audio restarts from
//! silence after a restore.

use serde::{Deserialize, Serialize};

use nes_core::Irq;

use crate::controller::{Controller, Zapper};
use crate::mapper::Mapper;
use crate::ppu::Ppu;
use crate::rom::Mirroring;
use crate::tile::Tile;

/// Bumped whenever the snapshot layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable stand-in for [`Irq`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrqState {
    Normal,
    NonMaskable,
    Reset,
}

impl From<Irq> for IrqState {
    fn from(kind: Irq) -> Self {
        match kind {
            Irq::Normal => Self::Normal,
            Irq::NonMaskable => Self::NonMaskable,
            Irq::Reset => Self::Reset,
        }
    }
}

impl From<IrqState> for Irq {
    fn from(kind: IrqState) -> Self {
        match kind {
            IrqState::Normal => Self::Normal,
            IrqState::NonMaskable => Self::NonMaskable,
            IrqState::Reset => Self::Reset,
        }
    }
}

/// A complete machine state at a frame boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// The iNES image the machine was running.
    pub rom_data: Vec<u8>,
    pub cpu: CpuState,
    pub mapper: Mapper,
    pub ppu: PpuState,
    pub controllers: [Controller; 2],
    pub zapper: Zapper,
    pub joypad_last_write: u8,
}

/// CPU registers plus the full 64K CPU address space (RAM, SaveRAM and
/// the currently banked-in ROM windows).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuState {
    pub mem: Vec<u8>,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u16,
    pub pc: u16,
    pub status: u8,
    pub cycles_to_halt: u32,
    pub irq_requested: Option<IrqState>,
}

/// Raw PPU state; everything derivable is rebuilt on restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PpuState {
    pub vram_mem: Vec<u8>,
    pub sprite_mem: Vec<u8>,

    pub cnt_fv: i32,
    pub cnt_v: i32,
    pub cnt_h: i32,
    pub cnt_vt: i32,
    pub cnt_ht: i32,
    pub reg_fv: i32,
    pub reg_v: i32,
    pub reg_h: i32,
    pub reg_vt: i32,
    pub reg_ht: i32,
    pub reg_fh: i32,
    pub reg_s: i32,

    pub vram_address: i32,
    pub vram_tmp_address: i32,
    pub vram_buffered_read_value: u8,
    pub first_write: bool,
    pub sram_address: usize,
    pub current_mirroring: Option<Mirroring>,
    pub status: u8,

    pub f_nmi_on_vblank: u8,
    pub f_sprite_size: u8,
    pub f_bg_pattern_table: u8,
    pub f_sp_pattern_table: u8,
    pub f_addr_inc: u8,
    pub f_ntbl_address: u8,
    pub f_color: u8,
    pub f_sp_visibility: u8,
    pub f_bg_visibility: u8,
    pub f_sp_clipping: u8,
    pub f_bg_clipping: u8,
    pub f_disp_type: u8,

    pub cur_x: i32,
    pub scanline: i32,
    pub last_rendered_scanline: i32,
    pub cur_nt: usize,
    pub scantile: [usize; 32],
    pub attrib: [u32; 32],
    pub buffer: Vec<u32>,
    pub bgbuffer: Vec<u32>,
    pub pix_rendered: Vec<i32>,

    pub spr0_hit_x: i32,
    pub spr0_hit_y: i32,
    pub hit_spr0: bool,

    pub request_end_frame: bool,
    pub nmi_ok: bool,
    pub dummy_cycle_toggle: bool,
    pub nmi_counter: i32,
    pub valid_tile_data: bool,
    pub scanline_already_rendered: bool,
}

pub(crate) fn capture_ppu(ppu: &Ppu) -> PpuState {
    PpuState {
        vram_mem: ppu.vram_mem.clone(),
        sprite_mem: ppu.sprite_mem.to_vec(),
        cnt_fv: ppu.cnt_fv,
        cnt_v: ppu.cnt_v,
        cnt_h: ppu.cnt_h,
        cnt_vt: ppu.cnt_vt,
        cnt_ht: ppu.cnt_ht,
        reg_fv: ppu.reg_fv,
        reg_v: ppu.reg_v,
        reg_h: ppu.reg_h,
        reg_vt: ppu.reg_vt,
        reg_ht: ppu.reg_ht,
        reg_fh: ppu.reg_fh,
        reg_s: ppu.reg_s,
        vram_address: ppu.vram_address,
        vram_tmp_address: ppu.vram_tmp_address,
        vram_buffered_read_value: ppu.vram_buffered_read_value,
        first_write: ppu.first_write,
        sram_address: ppu.sram_address,
        current_mirroring: ppu.current_mirroring,
        status: ppu.status,
        f_nmi_on_vblank: ppu.f_nmi_on_vblank,
        f_sprite_size: ppu.f_sprite_size,
        f_bg_pattern_table: ppu.f_bg_pattern_table,
        f_sp_pattern_table: ppu.f_sp_pattern_table,
        f_addr_inc: ppu.f_addr_inc,
        f_ntbl_address: ppu.f_ntbl_address,
        f_color: ppu.f_color,
        f_sp_visibility: ppu.f_sp_visibility,
        f_bg_visibility: ppu.f_bg_visibility,
        f_sp_clipping: ppu.f_sp_clipping,
        f_bg_clipping: ppu.f_bg_clipping,
        f_disp_type: ppu.f_disp_type,
        cur_x: ppu.cur_x,
        scanline: ppu.scanline,
        last_rendered_scanline: ppu.last_rendered_scanline,
        cur_nt: ppu.cur_nt,
        scantile: ppu.scantile,
        attrib: ppu.attrib,
        buffer: ppu.buffer.clone(),
        bgbuffer: ppu.bgbuffer.clone(),
        pix_rendered: ppu.pix_rendered.clone(),
        spr0_hit_x: ppu.spr0_hit_x,
        spr0_hit_y: ppu.spr0_hit_y,
        hit_spr0: ppu.hit_spr0,
        request_end_frame: ppu.request_end_frame,
        nmi_ok: ppu.nmi_ok,
        dummy_cycle_toggle: ppu.dummy_cycle_toggle,
        nmi_counter: ppu.nmi_counter,
        valid_tile_data: ppu.valid_tile_data,
        scanline_already_rendered: ppu.scanline_already_rendered,
    }
}

pub(crate) fn apply_ppu(state: &PpuState, ppu: &mut Ppu) {
    ppu.vram_mem.clone_from(&state.vram_mem);
    ppu.sprite_mem.copy_from_slice(&state.sprite_mem);
    ppu.cnt_fv = state.cnt_fv;
    ppu.cnt_v = state.cnt_v;
    ppu.cnt_h = state.cnt_h;
    ppu.cnt_vt = state.cnt_vt;
    ppu.cnt_ht = state.cnt_ht;
    ppu.reg_fv = state.reg_fv;
    ppu.reg_v = state.reg_v;
    ppu.reg_h = state.reg_h;
    ppu.reg_vt = state.reg_vt;
    ppu.reg_ht = state.reg_ht;
    ppu.reg_fh = state.reg_fh;
    ppu.reg_s = state.reg_s;
    ppu.vram_address = state.vram_address;
    ppu.vram_tmp_address = state.vram_tmp_address;
    ppu.vram_buffered_read_value = state.vram_buffered_read_value;
    ppu.first_write = state.first_write;
    ppu.sram_address = state.sram_address;
    ppu.current_mirroring = state.current_mirroring;
    ppu.status = state.status;
    ppu.f_nmi_on_vblank = state.f_nmi_on_vblank;
    ppu.f_sprite_size = state.f_sprite_size;
    ppu.f_bg_pattern_table = state.f_bg_pattern_table;
    ppu.f_sp_pattern_table = state.f_sp_pattern_table;
    ppu.f_addr_inc = state.f_addr_inc;
    ppu.f_ntbl_address = state.f_ntbl_address;
    ppu.f_color = state.f_color;
    ppu.f_sp_visibility = state.f_sp_visibility;
    ppu.f_bg_visibility = state.f_bg_visibility;
    ppu.f_sp_clipping = state.f_sp_clipping;
    ppu.f_bg_clipping = state.f_bg_clipping;
    ppu.f_disp_type = state.f_disp_type;
    ppu.cur_x = state.cur_x;
    ppu.scanline = state.scanline;
    ppu.last_rendered_scanline = state.last_rendered_scanline;
    ppu.cur_nt = state.cur_nt;
    ppu.scantile = state.scantile;
    ppu.attrib = state.attrib;
    ppu.buffer.clone_from(&state.buffer);
    ppu.bgbuffer.clone_from(&state.bgbuffer);
    ppu.pix_rendered.clone_from(&state.pix_rendered);
    ppu.spr0_hit_x = state.spr0_hit_x;
    ppu.spr0_hit_y = state.spr0_hit_y;
    ppu.hit_spr0 = state.hit_spr0;
    ppu.request_end_frame = state.request_end_frame;
    ppu.nmi_ok = state.nmi_ok;
    ppu.dummy_cycle_toggle = state.dummy_cycle_toggle;
    ppu.nmi_counter = state.nmi_counter;
    ppu.valid_tile_data = state.valid_tile_data;
    ppu.scanline_already_rendered = state.scanline_already_rendered;

    // The mirror table, pattern tiles, nametables and palettes all
    // derive from what was just restored.
    ppu.pal_table.set_emphasis(i32::from(state.f_color));
    ppu.pt_tile = vec![Tile::new(); 512];
    ppu.rebuild_derived_data();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::Mirroring;

    #[test]
    fn ppu_state_round_trips_through_capture() {
        let mut ppu = Ppu::new();
        ppu.set_mirroring(Mirroring::Vertical);
        ppu.update_control_reg1(0x90);
        ppu.scroll_write(0x35);
        ppu.scroll_write(0x12);
        ppu.write_vram_address(0x21);
        ppu.write_vram_address(0x08);
        ppu.vram_write(0x42);
        ppu.write_sram_address(4);
        ppu.sram_write(0x33);

        let state = capture_ppu(&ppu);
        let mut restored = Ppu::new();
        apply_ppu(&state, &mut restored);

        assert_eq!(restored.reg_fh, ppu.reg_fh);
        assert_eq!(restored.reg_vt, ppu.reg_vt);
        assert_eq!(restored.vram_address, ppu.vram_address);
        assert_eq!(restored.first_write, ppu.first_write);
        assert_eq!(restored.sprite_mem[4], 0x33);
        assert_eq!(restored.vram_mem[0x2108], 0x42);
        // Derived nametable cache rebuilt from VRAM:
        assert_eq!(restored.current_mirroring, Some(Mirroring::Vertical));
    }

    #[test]
    fn capture_after_restore_is_identical() {
        let mut ppu = Ppu::new();
        ppu.set_mirroring(Mirroring::Horizontal);
        ppu.update_control_reg1(0x10);
        ppu.write_vram_address(0x24);
        ppu.write_vram_address(0x40);
        for value in [7u8, 9, 11] {
            ppu.vram_write(value);
        }

        let state = capture_ppu(&ppu);
        let mut restored = Ppu::new();
        apply_ppu(&state, &mut restored);
        let state2 = capture_ppu(&restored);

        assert_eq!(
            serde_json::to_string(&state).expect("serialize"),
            serde_json::to_string(&state2).expect("serialize")
        );
    }

    #[test]
    fn full_sprite_memory_survives_json_round_trip() {
        let mut ppu = Ppu::new();
        ppu.set_mirroring(Mirroring::Vertical);
        for i in 0..256 {
            ppu.write_sram_address(i as u8);
            ppu.sram_write(i as u8);
        }

        let state = capture_ppu(&ppu);
        let json = serde_json::to_string(&state).expect("serialize");
        let back: PpuState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.sprite_mem.len(), 256);
        assert_eq!(back.sprite_mem[0xFF], 0xFF);

        let mut restored = Ppu::new();
        apply_ppu(&back, &mut restored);
        assert_eq!(restored.sprite_mem[0x80], 0x80);
    }

    #[test]
    fn snapshot_serializes_with_version() {
        let ppu = Ppu::new();
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            rom_data: vec![0x4e, 0x45, 0x53, 0x1a],
            cpu: CpuState {
                mem: vec![0; 0x10000],
                a: 1,
                x: 2,
                y: 3,
                sp: 0x1fd,
                pc: 0x8000,
                status: 0x24,
                cycles_to_halt: 0,
                irq_requested: Some(IrqState::NonMaskable),
            },
            mapper: Mapper::Nrom,
            ppu: capture_ppu(&ppu),
            controllers: [Controller::new(), Controller::new()],
            zapper: Zapper::new(),
            joypad_last_write: 0,
        };

        let json = serde_json::to_string(&snapshot).expect("serialize");
        let back: Snapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.version, SNAPSHOT_VERSION);
        assert_eq!(back.cpu.a, 1);
        assert_eq!(back.cpu.irq_requested, Some(IrqState::NonMaskable));
    }
}
