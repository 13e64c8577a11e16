//! Raster tile rendering
//!
//! Turns the coverage masks of one ancestor tile into a 256×256 RGBA image.
//! Each of the `n²` leaf cells (`n = 2^(leaf_zoom - zoom)`) maps to a square
//! of `256 / n` pixels; cell `i` sits at column `i % n`, row `i / n`.

use std::io::Cursor;

use bitvec::prelude::*;
use image::{ImageFormat, Rgba, RgbaImage};

use crate::coverage::CoverageRecord;
use crate::error::Result;

/// Width and height of a rendered tile in pixels
pub const TILE_SIZE: u32 = 256;

/// Overlay of a covered leaf tile
pub const COVERED_COLOR: Rgba<u8> = Rgba([0, 0, 255, 80]);

/// Overlay of a covered leaf tile inside a maximal covered square
pub const MAX_SQUARE_COLOR: Rgba<u8> = Rgba([0, 0, 255, 160]);

/// Fully transparent tile
pub fn transparent_tile() -> RgbaImage {
    RgbaImage::new(TILE_SIZE, TILE_SIZE)
}

/// Render a pair of masks for a tile at `zoom` whose leaves are at `leaf_zoom`.
///
/// Requests finer than the leaf level produce a transparent tile. When
/// `TILE_SIZE` is not a multiple of `n` the cell size is rounded down and
/// the bottom/right border stays transparent. Bits past the end of a mask
/// read as unset.
pub fn render(
    tiles: &BitSlice<u8, Lsb0>,
    max_square: &BitSlice<u8, Lsb0>,
    zoom: u8,
    leaf_zoom: u8,
) -> RgbaImage {
    let mut image = transparent_tile();
    if zoom > leaf_zoom {
        return image;
    }
    let gap = u32::from(leaf_zoom - zoom);
    let Some(n) = 1u64.checked_shl(gap).filter(|&n| n <= u64::from(TILE_SIZE)) else {
        return image;
    };
    let n = n as usize;
    let cell = TILE_SIZE / n as u32;

    for idx in tiles.iter_ones().take_while(|&idx| idx < n * n) {
        let color = if max_square.get(idx).is_some_and(|bit| *bit) {
            MAX_SQUARE_COLOR
        } else {
            COVERED_COLOR
        };
        let x0 = (idx % n) as u32 * cell;
        let y0 = (idx / n) as u32 * cell;
        for y in y0..y0 + cell {
            for x in x0..x0 + cell {
                image.put_pixel(x, y, color);
            }
        }
    }
    image
}

/// Render a cached record; `None` renders a transparent tile
pub fn render_record(record: Option<&CoverageRecord>, zoom: u8, leaf_zoom: u8) -> RgbaImage {
    match record {
        Some(record) => render(record.tiles(), record.max_square(), zoom, leaf_zoom),
        None => transparent_tile(),
    }
}

/// Encode an image as PNG
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, ImageFormat::Png)?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_transparent(image: &RgbaImage) -> bool {
        image.pixels().all(|p| p.0[3] == 0)
    }

    #[test]
    fn test_empty_mask_is_transparent() {
        let empty = bitvec![u8, Lsb0; 0; 4096];
        let image = render(&empty, &empty, 8, 14);
        assert_eq!(image.dimensions(), (TILE_SIZE, TILE_SIZE));
        assert!(is_transparent(&image));
    }

    #[test]
    fn test_single_leaf_fills_whole_tile() {
        let tiles = bitvec![u8, Lsb0; 1];
        let max_square = bitvec![u8, Lsb0; 0];
        let image = render(&tiles, &max_square, 14, 14);
        assert!(image.pixels().all(|p| *p == COVERED_COLOR));
    }

    #[test]
    fn test_finer_than_leaf_is_transparent() {
        let tiles = bitvec![u8, Lsb0; 1];
        let image = render(&tiles, &tiles, 15, 14);
        assert!(is_transparent(&image));
    }

    #[test]
    fn test_cell_placement_is_row_major() {
        // n = 4 -> 64px cells; bit 6 is column 2, row 1
        let mut tiles = bitvec![u8, Lsb0; 0; 16];
        tiles.set(6, true);
        let max_square = bitvec![u8, Lsb0; 0; 16];
        let image = render(&tiles, &max_square, 8, 10);

        assert_eq!(*image.get_pixel(128, 64), COVERED_COLOR);
        assert_eq!(*image.get_pixel(191, 127), COVERED_COLOR);
        assert_eq!(image.get_pixel(127, 64).0[3], 0);
        assert_eq!(image.get_pixel(192, 64).0[3], 0);
        assert_eq!(image.get_pixel(128, 128).0[3], 0);
        assert_eq!(
            image.pixels().filter(|p| p.0[3] != 0).count(),
            64 * 64
        );
    }

    #[test]
    fn test_max_square_cells_are_emphasised() {
        let tiles = bitvec![u8, Lsb0; 1, 1, 0, 0];
        let max_square = bitvec![u8, Lsb0; 0, 1, 0, 0];
        let image = render(&tiles, &max_square, 9, 10);

        assert_eq!(*image.get_pixel(0, 0), COVERED_COLOR);
        assert_eq!(*image.get_pixel(200, 0), MAX_SQUARE_COLOR);
        assert_eq!(image.get_pixel(0, 200).0[3], 0);
    }

    #[test]
    fn test_short_mask_reads_as_unset() {
        let tiles = bitvec![u8, Lsb0; 1];
        let image = render(&tiles, &BitVec::<u8, Lsb0>::new(), 8, 9);
        assert_eq!(*image.get_pixel(0, 0), COVERED_COLOR);
        assert_eq!(image.pixels().filter(|p| p.0[3] != 0).count(), 128 * 128);
    }

    #[test]
    fn test_render_record_none_is_transparent() {
        assert!(is_transparent(&render_record(None, 8, 14)));
    }

    #[test]
    fn test_encode_png_signature() {
        let png = encode_png(&transparent_tile()).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
