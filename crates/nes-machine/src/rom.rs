//! iNES image parsing.
//!
//! Splits an iNES file into 16K PRG banks and 4K CHR banks, decodes the
//! CHR data into [`Tile`]s up front, and exposes the header flags the
//! mapper and PPU need. The raw image is kept so snapshots can embed it.

use serde::{Deserialize, Serialize};

use crate::tile::Tile;

/// Nametable mirroring arrangements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mirroring {
    Vertical,
    Horizontal,
    FourScreen,
    /// Single screen, first nametable.
    SingleScreen,
    /// Single screen, second nametable.
    SingleScreen2,
}

/// A parsed cartridge image.
#[derive(Debug, Clone)]
pub struct Rom {
    /// The complete file, kept for snapshot embedding.
    pub raw: Vec<u8>,
    /// 16K PRG ROM banks.
    pub rom: Vec<Vec<u8>>,
    /// 4K CHR ROM banks (the header counts 8K units; we halve them).
    pub vrom: Vec<Vec<u8>>,
    /// 256 decoded tiles per 4K CHR bank.
    pub vrom_tile: Vec<Vec<Tile>>,
    /// Number of 16K PRG banks.
    pub rom_count: usize,
    /// Number of 4K CHR banks.
    pub vrom_count: usize,
    /// Header mirroring bit (0 = horizontal, 1 = vertical).
    pub mirroring: u8,
    /// Cartridge has battery-backed RAM at $6000-$7FFF.
    pub battery_ram: bool,
    /// Cartridge carries a 512-byte trainer before PRG data.
    pub trainer: bool,
    /// Four-screen VRAM arrangement.
    pub four_screen: bool,
    /// Resolved mapper number.
    pub mapper_type: u8,
}

impl Rom {
    /// Parse an iNES image.
    pub fn load(data: &[u8]) -> Result<Self, String> {
        if data.len() < 16 {
            return Err("iNES file too short (< 16 bytes)".to_string());
        }
        if &data[0..4] != b"NES\x1a" {
            return Err("Invalid iNES magic (expected NES\\x1A)".to_string());
        }

        let rom_count = usize::from(data[4]);
        // The header counts 8K CHR banks; bank loading works in 4K units.
        let vrom_count = usize::from(data[5]) * 2;
        let mirroring = data[6] & 1;
        let battery_ram = data[6] & 2 != 0;
        let trainer = data[6] & 4 != 0;
        let four_screen = data[6] & 8 != 0;
        let mut mapper_type = (data[6] >> 4) | (data[7] & 0xF0);

        // Some old dumps carry garbage in bytes 8-15; if so the upper
        // mapper nibble in byte 7 cannot be trusted.
        if data[8..16].iter().any(|&b| b != 0) {
            mapper_type &= 0x0F;
        }

        let mut offset = if trainer { 16 + 512 } else { 16 };

        // Truncated files are tolerated: missing tail bytes read as zero.
        let read_bank = |offset: usize, size: usize| -> Vec<u8> {
            let mut bank = vec![0u8; size];
            if offset < data.len() {
                let available = (data.len() - offset).min(size);
                bank[..available].copy_from_slice(&data[offset..offset + available]);
            }
            bank
        };

        let mut rom = Vec::with_capacity(rom_count);
        for _ in 0..rom_count {
            rom.push(read_bank(offset, 16384));
            offset += 16384;
        }

        let mut vrom = Vec::with_capacity(vrom_count);
        for _ in 0..vrom_count {
            vrom.push(read_bank(offset, 4096));
            offset += 4096;
        }

        let vrom_tile = vrom.iter().map(|bank| decode_tiles(bank)).collect();

        Ok(Self {
            raw: data.to_vec(),
            rom,
            vrom,
            vrom_tile,
            rom_count,
            vrom_count,
            mirroring,
            battery_ram,
            trainer,
            four_screen,
            mapper_type,
        })
    }

    /// Mirroring arrangement from the header flags.
    #[must_use]
    pub fn mirroring_type(&self) -> Mirroring {
        if self.four_screen {
            Mirroring::FourScreen
        } else if self.mirroring == 0 {
            Mirroring::Horizontal
        } else {
            Mirroring::Vertical
        }
    }
}

/// Decode a 4K CHR bank into 256 tiles.
fn decode_tiles(bank: &[u8]) -> Vec<Tile> {
    let mut tiles = vec![Tile::new(); 256];
    for i in 0..4096 {
        let tile_index = i >> 4;
        let left_over = i % 16;
        if left_over < 8 {
            tiles[tile_index].set_scanline(left_over, bank[i], bank[i + 8]);
        } else {
            tiles[tile_index].set_scanline(left_over - 8, bank[i - 8], bank[i]);
        }
    }
    tiles
}

/// Board name used in unsupported-mapper errors.
#[must_use]
pub fn mapper_name(mapper_type: u8) -> &'static str {
    match mapper_type {
        0 => "Direct Access",
        1 => "Nintendo MMC1",
        2 => "UNROM",
        3 => "CNROM",
        4 => "Nintendo MMC3",
        5 => "Nintendo MMC5",
        7 => "AOROM",
        9 => "Nintendo MMC2",
        10 => "Nintendo MMC4",
        11 => "Color Dreams Chip",
        34 => "32kB ROM switch",
        66 => "GNROM switch",
        71 => "Camerica chip",
        _ => "Unknown Mapper",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn make_ines(prg_banks: u8, chr_banks: u8, flags6: u8) -> Vec<u8> {
        let prg_size = usize::from(prg_banks) * 16384;
        let chr_size = usize::from(chr_banks) * 8192;
        let mut data = vec![0u8; 16 + prg_size + chr_size];
        data[0..4].copy_from_slice(b"NES\x1a");
        data[4] = prg_banks;
        data[5] = chr_banks;
        data[6] = flags6;
        for i in 0..prg_size {
            data[16 + i] = (i & 0xFF) as u8;
        }
        for i in 0..chr_size {
            data[16 + prg_size + i] = ((i + 0x80) & 0xFF) as u8;
        }
        data
    }

    #[test]
    fn rejects_missing_magic() {
        let err = Rom::load(&[0u8; 32]).unwrap_err();
        assert!(err.contains("magic"));
    }

    #[test]
    fn rejects_short_file() {
        let err = Rom::load(b"NES\x1a").unwrap_err();
        assert!(err.contains("too short"));
    }

    #[test]
    fn parses_bank_counts_and_flags() {
        let data = make_ines(2, 1, 0x03);
        let rom = Rom::load(&data).expect("parse failed");
        assert_eq!(rom.rom_count, 2);
        assert_eq!(rom.vrom_count, 2); // one 8K unit = two 4K banks
        assert_eq!(rom.mirroring_type(), Mirroring::Vertical);
        assert!(rom.battery_ram);
        assert_eq!(rom.mapper_type, 0);
    }

    #[test]
    fn four_screen_wins_over_mirroring_bit() {
        let data = make_ines(1, 1, 0x09);
        let rom = Rom::load(&data).expect("parse failed");
        assert_eq!(rom.mirroring_type(), Mirroring::FourScreen);
    }

    #[test]
    fn dirty_reserved_bytes_drop_high_mapper_nibble() {
        let mut data = make_ines(1, 1, 0x40); // low nibble 4
        data[7] = 0x10; // would make mapper 20
        data[9] = b'!'; // garbage in reserved area
        let rom = Rom::load(&data).expect("parse failed");
        assert_eq!(rom.mapper_type, 4);
    }

    #[test]
    fn clean_reserved_bytes_keep_high_mapper_nibble() {
        let mut data = make_ines(1, 1, 0x40);
        data[7] = 0x10;
        let rom = Rom::load(&data).expect("parse failed");
        assert_eq!(rom.mapper_type, 20);
    }

    #[test]
    fn truncated_file_pads_with_zeroes() {
        let mut data = make_ines(1, 1, 0x00);
        data.truncate(16 + 16384 + 100); // cut most of CHR
        let rom = Rom::load(&data).expect("parse failed");
        assert_eq!(rom.vrom[0][99], ((99 + 0x80) & 0xFF) as u8);
        assert_eq!(rom.vrom[0][100], 0);
    }

    #[test]
    fn trainer_offsets_prg_data() {
        let prg_size = 16384;
        let mut data = vec![0u8; 16 + 512 + prg_size];
        data[0..4].copy_from_slice(b"NES\x1a");
        data[4] = 1;
        data[6] = 0x04; // trainer present
        data[16 + 512] = 0xAB; // first PRG byte after the trainer
        let rom = Rom::load(&data).expect("parse failed");
        assert_eq!(rom.rom[0][0], 0xAB);
    }

    #[test]
    fn chr_tiles_decode_on_load() {
        let mut data = make_ines(1, 1, 0x00);
        let chr_start = 16 + 16384;
        // First tile: plane 0 row 0 = 0xFF, plane 1 row 0 = 0x00.
        for b in &mut data[chr_start..chr_start + 16] {
            *b = 0;
        }
        data[chr_start] = 0xFF;
        let rom = Rom::load(&data).expect("parse failed");
        assert_eq!(&rom.vrom_tile[0][0].pix[0..8], &[1; 8]);
        assert!(rom.vrom_tile[0][0].opaque[0]);
    }
}
