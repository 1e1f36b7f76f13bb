//! NTSC colour palette with emphasis tables.
//!
//! The 64 base colours are expanded into eight pre-computed tables, one
//! per emphasis bit combination from PPUMASK. Switching emphasis swaps
//! the active table instead of recomputing colours per pixel.

const NTSC_PALETTE: [u32; 64] = [
    0x0052_5252, 0x00B4_0000, 0x00A0_0000, 0x00B1_003D, 0x0074_0069, 0x0000_005B, 0x0000_005F,
    0x0000_1840, 0x0000_2F10, 0x0008_4A08, 0x0000_6700, 0x0012_4200, 0x006D_2800, 0x0000_0000,
    0x0000_0000, 0x0000_0000, 0x00C4_D5E7, 0x00FF_4000, 0x00DC_0E22, 0x00FF_476B, 0x00D7_009F,
    0x0068_0AD7, 0x0000_19BC, 0x0000_54B1, 0x0000_6A5B, 0x0000_8C03, 0x0000_AB00, 0x002C_8800,
    0x00A4_7200, 0x0000_0000, 0x0000_0000, 0x0000_0000, 0x00F8_F8F8, 0x00FF_AB3C, 0x00FF_7981,
    0x00FF_5BC5, 0x00FF_48F2, 0x00DF_49FF, 0x0047_6DFF, 0x0000_B4F7, 0x0000_E0FF, 0x0000_E375,
    0x0003_F42B, 0x0078_B82E, 0x00E5_E218, 0x0078_7878, 0x0000_0000, 0x0000_0000, 0x00FF_FFFF,
    0x00FF_F2BE, 0x00F8_B8B8, 0x00F8_B8D8, 0x00FF_B6FF, 0x00FF_C3FF, 0x00C7_D1FF, 0x009A_DAFF,
    0x0088_EDF8, 0x0083_FFDD, 0x00B8_F8B8, 0x00F5_F8AC, 0x00FF_FFB0, 0x00F8_D8F8, 0x0000_0000,
    0x0000_0000,
];

/// The active palette plus the eight emphasis variants it was built from.
#[derive(Debug, Clone)]
pub struct PaletteTable {
    cur_table: [u32; 64],
    emph_table: [[u32; 64]; 8],
    current_emph: i32,
}

impl Default for PaletteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PaletteTable {
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self {
            cur_table: NTSC_PALETTE,
            emph_table: [[0; 64]; 8],
            current_emph: -1,
        };
        table.make_tables();
        table.set_emphasis(0);
        table
    }

    fn make_tables(&mut self) {
        for emph in 0..8 {
            let mut r_factor = 1.0;
            let mut g_factor = 1.0;
            let mut b_factor = 1.0;

            if emph & 1 != 0 {
                r_factor = 0.75;
                b_factor = 0.75;
            }
            if emph & 2 != 0 {
                r_factor = 0.75;
                g_factor = 0.75;
            }
            if emph & 4 != 0 {
                g_factor = 0.75;
                b_factor = 0.75;
            }

            for i in 0..64 {
                let col = NTSC_PALETTE[i];
                let r = (f64::from((col >> 16) & 0xFF) * r_factor) as u32;
                let g = (f64::from((col >> 8) & 0xFF) * g_factor) as u32;
                let b = (f64::from(col & 0xFF) * b_factor) as u32;
                self.emph_table[emph][i] = (r << 16) | (g << 8) | b;
            }
        }
    }

    /// Activate the table for the given emphasis bits (0-7).
    pub fn set_emphasis(&mut self, emph: i32) {
        if emph != self.current_emph {
            self.current_emph = emph;
            self.cur_table = self.emph_table[emph as usize & 7];
        }
    }

    /// Look up an RGB colour by its 6-bit palette index.
    #[must_use]
    pub fn get_entry(&self, yiq: usize) -> u32 {
        self.cur_table[yiq & 63]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_emphasis_keeps_base_colours() {
        let table = PaletteTable::new();
        assert_eq!(table.get_entry(0x20), 0x00F8_F8F8);
        assert_eq!(table.get_entry(0x30), 0x00FF_FFFF);
    }

    #[test]
    fn red_emphasis_dims_green_and_blue() {
        let mut table = PaletteTable::new();
        table.set_emphasis(4);
        // 0x30 is pure white; green and blue drop to 0xBF.
        assert_eq!(table.get_entry(0x30), 0x00FF_BFBF);
    }

    #[test]
    fn index_wraps_at_64() {
        let table = PaletteTable::new();
        assert_eq!(table.get_entry(64), table.get_entry(0));
    }
}
