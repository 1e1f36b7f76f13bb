//! Decoded 2bpp pattern tiles.
//!
//! The PPU keeps every 16-byte pattern as a pre-decoded 8x8 block of
//! 2-bit pixel values so scanline rendering never re-reads pattern
//! memory. Tiles are rebuilt whenever pattern table bytes change.

/// An 8x8 tile decoded from two bitplanes.
#[derive(Debug, Clone)]
pub struct Tile {
    /// 2-bit colour indices, row-major.
    pub pix: [u8; 64],
    /// Per-row flag: true when no pixel in the row is transparent.
    pub opaque: [bool; 8],
}

impl Default for Tile {
    fn default() -> Self {
        Self::new()
    }
}

impl Tile {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pix: [0; 64],
            opaque: [false; 8],
        }
    }

    /// Decode one row from its two bitplane bytes.
    pub fn set_scanline(&mut self, sline: usize, b1: u8, b2: u8) {
        let t_index = sline << 3;
        let mut all_opaque = true;
        for x in 0..8 {
            let value = (b1 >> (7 - x) & 1) + ((b2 >> (7 - x) & 1) << 1);
            self.pix[t_index + x] = value;
            if value == 0 {
                all_opaque = false;
            }
        }
        self.opaque[sline] = all_opaque;
    }

    /// Whether the pixel at (x, y) is colour 0.
    #[must_use]
    pub fn is_transparent(&self, x: usize, y: usize) -> bool {
        self.pix[(y << 3) + x] == 0
    }

    /// Blit the tile into the frame buffer with clipping, flips and the
    /// sprite priority table.
    ///
    /// A pixel is written only when it is non-transparent and its
    /// priority value does not lose to what is already in `pri_table`;
    /// the table keeps the background-marker bits (0xF00) and records
    /// the winning sprite priority in the low byte.
    pub fn render(
        &self,
        buffer: &mut [u32],
        mut srcx1: i32,
        mut srcy1: i32,
        mut srcx2: i32,
        mut srcy2: i32,
        dx: i32,
        dy: i32,
        pal_add: usize,
        palette: &[u32],
        flip_horizontal: bool,
        flip_vertical: bool,
        pri: i32,
        pri_table: &mut [i32],
    ) {
        if dx < -7 || dx >= 256 || dy < -7 || dy >= 240 {
            return;
        }

        if dx < 0 {
            srcx1 -= dx;
        }
        if dx + srcx2 >= 256 {
            srcx2 = 256 - dx;
        }
        if dy < 0 {
            srcy1 -= dy;
        }
        if dy + srcy2 >= 240 {
            srcy2 = 240 - dy;
        }

        let mut fb_index = ((dy << 8) + dx) as isize;
        let (mut t_index, x_step, row_adjust): (isize, isize, isize) =
            match (flip_horizontal, flip_vertical) {
                (false, false) => (0, 1, 0),
                (true, false) => (7, -1, 16),
                (false, true) => (56, 1, -16),
                (true, true) => (63, -1, 0),
            };

        for y in 0..8 {
            for x in 0..8 {
                if x >= srcx1 && x < srcx2 && y >= srcy1 && y < srcy2 {
                    let pal_index = self.pix[t_index as usize];
                    let fb = fb_index as usize;
                    let tpri = pri_table[fb];
                    if pal_index != 0 && pri <= (tpri & 0xFF) {
                        buffer[fb] = palette[pal_index as usize + pal_add];
                        pri_table[fb] = (tpri & 0xF00) | pri;
                    }
                }
                fb_index += 1;
                t_index += x_step;
            }
            fb_index += 256 - 8;
            t_index += row_adjust;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_both_bitplanes() {
        let mut tile = Tile::new();
        // Plane 0 = 0b1010_1010, plane 1 = 0b1100_1100.
        tile.set_scanline(0, 0xAA, 0xCC);
        assert_eq!(&tile.pix[0..8], &[3, 2, 1, 0, 3, 2, 1, 0]);
        assert!(!tile.opaque[0]);
    }

    #[test]
    fn fully_set_row_is_opaque() {
        let mut tile = Tile::new();
        tile.set_scanline(3, 0xFF, 0x00);
        assert!(tile.opaque[3]);
        assert!(!tile.is_transparent(0, 3));
    }

    #[test]
    fn render_skips_transparent_pixels() {
        let mut tile = Tile::new();
        tile.set_scanline(0, 0b1000_0000, 0);
        let mut buffer = vec![0u32; 256 * 240];
        let mut pri_table = vec![-1i32; 256 * 240];
        let palette = [0xAABBCC_u32; 16];
        tile.render(
            &mut buffer, 0, 0, 8, 8, 0, 0, 0, &palette, false, false, 0, &mut pri_table,
        );
        assert_eq!(buffer[0], 0xAABBCC);
        assert_eq!(buffer[1], 0); // transparent pixel untouched
    }

    #[test]
    fn horizontal_flip_mirrors_row() {
        let mut tile = Tile::new();
        tile.set_scanline(0, 0b1000_0000, 0);
        let mut buffer = vec![0u32; 256 * 240];
        let mut pri_table = vec![-1i32; 256 * 240];
        let palette = [7u32; 16];
        tile.render(
            &mut buffer, 0, 0, 8, 8, 0, 0, 0, &palette, true, false, 0, &mut pri_table,
        );
        assert_eq!(buffer[7], 7);
        assert_eq!(buffer[0], 0);
    }

    #[test]
    fn lower_priority_sprite_does_not_overdraw() {
        let mut tile = Tile::new();
        tile.set_scanline(0, 0xFF, 0);
        let mut buffer = vec![0u32; 256 * 240];
        let mut pri_table = vec![0i32; 256 * 240]; // priority 0 already won
        let palette = [9u32; 16];
        tile.render(
            &mut buffer, 0, 0, 8, 8, 0, 0, 0, &palette, false, false, 5, &mut pri_table,
        );
        assert_eq!(buffer[0], 0); // 5 loses to 0
    }
}
