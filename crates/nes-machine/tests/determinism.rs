//! Determinism and snapshot tests.
//!
//! Builds a small NROM test ROM as a byte array. The code strobes the
//! controller port, shifts the eight button bits into $0010-$0017,
//! then idles. Two machines fed the same ROM and the same inputs must
//! produce byte-identical snapshots, and restoring a snapshot must
//! replay the exact same frames.

use nes_machine::{Button, Nes, Snapshot, SNAPSHOT_VERSION};
use pretty_assertions::assert_eq;

/// Build an NROM ROM (16K PRG) that latches pad 1 into $0010-$0017.
fn build_pad_reader_rom() -> Vec<u8> {
    let prg_size = 16384usize;
    let mut rom = vec![0u8; 16 + prg_size];

    // iNES header
    rom[0..4].copy_from_slice(b"NES\x1a");
    rom[4] = 1; // 1 x 16K PRG bank
    rom[5] = 0; // CHR RAM
    rom[6] = 0; // Mapper 0, horizontal mirroring
    rom[7] = 0;

    // Code at $8000 (file offset 16):
    // $8000: 78       SEI
    // $8001: D8       CLD
    // $8002: A2 FF    LDX #$FF
    // $8004: 9A       TXS
    // $8005: A9 01    LDA #$01      (strobe high)
    // $8007: 8D 16 40 STA $4016
    // $800A: A9 00    LDA #$00      (strobe low, latch buttons)
    // $800C: 8D 16 40 STA $4016
    // $800F: A2 00    LDX #$00
    // $8011: AD 16 40 loop: LDA $4016
    // $8014: 95 10    STA $10,X
    // $8016: E8       INX
    // $8017: E0 08    CPX #$08
    // $8019: D0 F6    BNE loop
    // $801B: 4C 1B 80 JMP $801B     (idle loop)
    let code: &[u8] = &[
        0x78, // SEI
        0xD8, // CLD
        0xA2, 0xFF, // LDX #$FF
        0x9A, // TXS
        // Strobe $4016 high then low to latch the buttons
        0xA9, 0x01, // LDA #$01
        0x8D, 0x16, 0x40, // STA $4016
        0xA9, 0x00, // LDA #$00
        0x8D, 0x16, 0x40, // STA $4016
        // Shift the eight button bits into $0010-$0017
        0xA2, 0x00, // LDX #$00
        0xAD, 0x16, 0x40, // loop: LDA $4016
        0x95, 0x10, //       STA $10,X
        0xE8, //             INX
        0xE0, 0x08, //       CPX #$08
        0xD0, 0xF6, //       BNE loop
        // Idle loop
        0x4C, 0x1B, 0x80, // idle: JMP $801B
    ];
    rom[16..16 + code.len()].copy_from_slice(code);

    // Reset, NMI and IRQ vectors all point at $8000.
    rom[16 + 0x3FFA] = 0x00;
    rom[16 + 0x3FFB] = 0x80;
    rom[16 + 0x3FFC] = 0x00;
    rom[16 + 0x3FFD] = 0x80;
    rom[16 + 0x3FFE] = 0x00;
    rom[16 + 0x3FFF] = 0x80;

    rom
}

fn snapshot_json(snapshot: &Snapshot) -> String {
    serde_json::to_string(snapshot).expect("serialize failed")
}

/// Build a minimal NROM ROM (1 PRG bank, no CHR) that is all NOPs
/// except one LDA #$5A / STA $0234 pair at the reset target.
fn build_nop_sled_rom() -> Vec<u8> {
    let prg_size = 16384usize;
    let mut rom = vec![0u8; 16 + prg_size];

    rom[0..4].copy_from_slice(b"NES\x1a");
    rom[4] = 1;

    rom[16..16 + prg_size].fill(0xEA); // NOP
    // $8000: A9 5A    LDA #$5A
    // $8002: 8D 34 02 STA $0234
    rom[16] = 0xA9;
    rom[17] = 0x5A;
    rom[18] = 0x8D;
    rom[19] = 0x34;
    rom[20] = 0x02;

    // Reset, NMI and IRQ vectors all point at $8000.
    rom[16 + 0x3FFA] = 0x00;
    rom[16 + 0x3FFB] = 0x80;
    rom[16 + 0x3FFC] = 0x00;
    rom[16 + 0x3FFD] = 0x80;
    rom[16 + 0x3FFE] = 0x00;
    rom[16 + 0x3FFF] = 0x80;

    rom
}

#[test]
fn same_rom_and_inputs_give_identical_snapshots() {
    let rom = build_pad_reader_rom();

    let mut a = Nes::default();
    let mut b = Nes::default();
    a.load_rom(&rom).expect("load failed");
    b.load_rom(&rom).expect("load failed");

    let mut audio = Vec::new();
    for nes in [&mut a, &mut b] {
        nes.button_down(0, Button::A);
        nes.button_down(0, Button::Start);
        for _ in 0..3 {
            nes.frame().expect("frame failed");
        }
        audio.push(nes.drain_audio_samples());
    }

    assert_eq!(a.framebuffer(), b.framebuffer());
    assert_eq!(audio[0], audio[1]);
    assert_eq!(
        snapshot_json(&a.snapshot().expect("snapshot failed")),
        snapshot_json(&b.snapshot().expect("snapshot failed"))
    );
}

#[test]
fn nop_sled_program_stores_to_ram() {
    let mut nes = Nes::default();
    nes.load_rom(&build_nop_sled_rom()).expect("load failed");
    nes.frame().expect("frame failed");

    assert_eq!(nes.frame_count(), 1);
    assert_eq!(nes.framebuffer().len(), 256 * 240);

    let snap = nes.snapshot().expect("snapshot failed");
    assert_eq!(snap.cpu.mem[0x0234], 0x5A);
}

#[test]
fn program_reads_pressed_buttons_through_4016() {
    let mut nes = Nes::default();
    nes.load_rom(&build_pad_reader_rom()).expect("load failed");
    nes.button_down(0, Button::A);
    nes.button_down(0, Button::Start);
    nes.frame().expect("frame failed");

    // The serial port reports $41 for a pressed button, $40 for a
    // released one. Read order is A, B, Select, Start, Up, Down,
    // Left, Right.
    let snap = nes.snapshot().expect("snapshot failed");
    let bits = &snap.cpu.mem[0x10..0x18];
    assert_eq!(bits, [0x41, 0x40, 0x40, 0x41, 0x40, 0x40, 0x40, 0x40]);
}

#[test]
fn restored_snapshot_replays_the_same_frames() {
    let rom = build_pad_reader_rom();

    let mut nes = Nes::default();
    nes.load_rom(&rom).expect("load failed");
    nes.button_down(0, Button::B);
    for _ in 0..2 {
        nes.frame().expect("frame failed");
    }

    let snap = nes.snapshot().expect("snapshot failed");
    assert_eq!(snap.version, SNAPSHOT_VERSION);

    nes.frame().expect("frame failed");
    let ahead = nes.framebuffer().to_vec();
    let pc_ahead = nes.cpu().pc;

    // Restore into a brand new machine; the snapshot embeds the ROM.
    let mut other = Nes::default();
    other.restore(&snap).expect("restore failed");
    other.frame().expect("frame failed");

    assert_eq!(other.cpu().pc, pc_ahead);
    assert_eq!(other.framebuffer(), &ahead[..]);
}

#[test]
fn snapshot_of_restored_machine_is_identical() {
    let mut nes = Nes::default();
    nes.load_rom(&build_pad_reader_rom()).expect("load failed");
    nes.frame().expect("frame failed");

    let snap = nes.snapshot().expect("snapshot failed");
    let mut other = Nes::default();
    other.restore(&snap).expect("restore failed");
    let again = other.snapshot().expect("snapshot failed");

    assert_eq!(snapshot_json(&snap), snapshot_json(&again));
}

#[test]
fn snapshot_round_trips_through_json() {
    let mut nes = Nes::default();
    nes.load_rom(&build_pad_reader_rom()).expect("load failed");
    nes.frame().expect("frame failed");

    let snap = nes.snapshot().expect("snapshot failed");
    let decoded: Snapshot =
        serde_json::from_str(&snapshot_json(&snap)).expect("deserialize failed");

    let mut other = Nes::default();
    other.restore(&decoded).expect("restore failed");
    nes.frame().expect("frame failed");
    other.frame().expect("frame failed");
    assert_eq!(nes.framebuffer(), other.framebuffer());
}
