//! `<user>.kachel` format - Per-user coverage cache
//!
//! Format (little-endian):
//!
//! Header (8 bytes):
//!   magic:       u32 = 0x4B43484C  // "KCHL"
//!   version:     u16 = 1
//!   n_levels:    u16
//!
//! Per level (ascending leaf zoom):
//!   leaf_zoom:   u8
//!   pad:         [3]u8
//!   n_records:   u32
//!
//! Per record (ascending (x, y, zoom)):
//!   x:           u32
//!   y:           u32
//!   zoom:        u8
//!   pad:         [3]u8
//!   tiles:       [ceil(n²/8)]u8   // n = 2^(leaf_zoom - zoom), bit i = leaf i row-major
//!   max_square:  [ceil(n²/8)]u8
//!
//! Footer (8 bytes):
//!   file_crc64:  u64  // over header and body

use bitvec::prelude::*;

use super::crc::checksum;
use crate::config::MAX_ZOOM_GAP;
use crate::coverage::{Bitmask, CoverageRecord, LevelCache, UserCache};
use crate::error::{Error, Result};
use crate::tile::{TileCoordinate, MAX_ZOOM};

const MAGIC: u32 = 0x4B43484C; // "KCHL"
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 8;
const FOOTER_SIZE: usize = 8;

/// Serialize a user cache
pub fn save(cache: &UserCache) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + FOOTER_SIZE);
    buf.extend_from_slice(&MAGIC.to_le_bytes());
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.extend_from_slice(&(cache.leaf_zooms().len() as u16).to_le_bytes());

    for level in cache.levels() {
        buf.push(level.leaf_zoom());
        buf.extend_from_slice(&[0u8; 3]);
        buf.extend_from_slice(&(level.len() as u32).to_le_bytes());

        for (tile, record) in level.records() {
            buf.extend_from_slice(&tile.x.to_le_bytes());
            buf.extend_from_slice(&tile.y.to_le_bytes());
            buf.push(tile.zoom);
            buf.extend_from_slice(&[0u8; 3]);
            buf.extend_from_slice(&mask_bytes(record.tiles()));
            buf.extend_from_slice(&mask_bytes(record.max_square()));
        }
    }

    let file_crc64 = checksum(&buf);
    buf.extend_from_slice(&file_crc64.to_le_bytes());
    buf
}

/// Deserialize a user cache written by [`save`]
pub fn load(data: &[u8]) -> Result<UserCache> {
    if data.len() < HEADER_SIZE + FOOTER_SIZE {
        return Err(corrupt(format!("truncated: {} bytes", data.len())));
    }

    let (body, footer) = data.split_at(data.len() - FOOTER_SIZE);
    let mut stored = [0u8; FOOTER_SIZE];
    stored.copy_from_slice(footer);
    let stored = u64::from_le_bytes(stored);
    let actual = checksum(body);
    if stored != actual {
        return Err(corrupt(format!(
            "checksum mismatch: expected 0x{stored:016x}, got 0x{actual:016x}"
        )));
    }

    let mut reader = Reader::new(body);

    let magic = reader.u32()?;
    if magic != MAGIC {
        return Err(corrupt(format!(
            "invalid magic: expected 0x{MAGIC:08x}, got 0x{magic:08x}"
        )));
    }
    let version = reader.u16()?;
    if version != VERSION {
        return Err(corrupt(format!("unsupported version: {version}")));
    }
    let n_levels = reader.u16()?;

    let mut cache = UserCache::new();
    let mut previous_leaf = None;
    for _ in 0..n_levels {
        let leaf_zoom = reader.u8()?;
        reader.take(3)?;
        if leaf_zoom > MAX_ZOOM {
            return Err(corrupt(format!("leaf zoom {leaf_zoom} out of range")));
        }
        if previous_leaf.is_some_and(|prev| prev >= leaf_zoom) {
            return Err(corrupt(format!("leaf zoom {leaf_zoom} out of order")));
        }
        previous_leaf = Some(leaf_zoom);

        let n_records = reader.u32()?;
        cache.insert(read_level(&mut reader, leaf_zoom, n_records)?);
    }

    if !reader.is_empty() {
        return Err(corrupt(format!("{} trailing bytes", reader.remaining())));
    }
    Ok(cache)
}

fn read_level(reader: &mut Reader<'_>, leaf_zoom: u8, n_records: u32) -> Result<LevelCache> {
    let mut level = LevelCache::new(leaf_zoom);
    let mut previous: Option<TileCoordinate> = None;

    for _ in 0..n_records {
        let x = reader.u32()?;
        let y = reader.u32()?;
        let zoom = reader.u8()?;
        reader.take(3)?;

        let tile = TileCoordinate::new(x, y, zoom);
        if zoom > leaf_zoom || leaf_zoom - zoom > MAX_ZOOM_GAP || !tile.is_valid() {
            return Err(corrupt(format!(
                "record {tile} out of range for leaf zoom {leaf_zoom}"
            )));
        }
        if previous.is_some_and(|prev| prev >= tile) {
            return Err(corrupt(format!("record {tile} out of order")));
        }
        previous = Some(tile);

        let side = 1u32 << (leaf_zoom - zoom);
        let bits = side as usize * side as usize;
        let tiles = read_mask(reader, bits)?;
        let max_square = read_mask(reader, bits)?;
        let record = CoverageRecord::from_parts(side, tiles, max_square).ok_or_else(|| {
            corrupt(format!("record {tile}: max_square is not a subset of tiles"))
        })?;
        level.insert(tile, record);
    }
    Ok(level)
}

/// Packed bytes of a mask with the unused high bits of the last byte zeroed
fn mask_bytes(bits: &BitSlice<u8, Lsb0>) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    bytes.view_bits_mut::<Lsb0>()[..bits.len()].copy_from_bitslice(bits);
    bytes
}

fn read_mask(reader: &mut Reader<'_>, bits: usize) -> Result<Bitmask> {
    let bytes = reader.take(bits.div_ceil(8))?;
    let mut mask = Bitmask::from_slice(bytes);
    if mask[bits..].any() {
        return Err(corrupt("non-zero padding bits in mask".to_string()));
    }
    mask.truncate(bits);
    Ok(mask)
}

fn corrupt(msg: String) -> Error {
    Error::CorruptCache(msg)
}

/// Bounds-checked cursor over the artifact body
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                corrupt(format!(
                    "unexpected end of data at offset {} (wanted {len} bytes)",
                    self.pos
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cache() -> UserCache {
        let mut cache = UserCache::new();

        let mut level14 = LevelCache::new(14);
        level14.record_mut(TileCoordinate::new(128, 128, 8), 64).mark(0, true);
        let wide = level14.record_mut(TileCoordinate::new(130, 85, 8), 64);
        wide.mark(4095, false);
        wide.mark(63, true);
        level14.record_mut(TileCoordinate::new(8192, 8192, 14), 1).mark(0, true);
        cache.insert(level14);

        let mut level16 = LevelCache::new(16);
        // 256x256 grid: 65536 bits, far wider than any machine word
        let record = level16.record_mut(TileCoordinate::new(128, 128, 8), 256);
        record.mark(65535, true);
        record.mark(12345, false);
        cache.insert(level16);

        cache
    }

    #[test]
    fn test_round_trip_is_exact() {
        let cache = sample_cache();
        let bytes = save(&cache);
        let loaded = load(&bytes).unwrap();
        assert_eq!(loaded, cache);
        assert_eq!(save(&loaded), bytes);
    }

    #[test]
    fn test_round_trip_empty_cache() {
        let cache = UserCache::new();
        assert_eq!(load(&save(&cache)).unwrap(), cache);
    }

    #[test]
    fn test_checksum_mismatch_is_corrupt() {
        let mut bytes = save(&sample_cache());
        bytes[HEADER_SIZE + 10] ^= 0xFF;
        let err = load(&bytes).unwrap_err();
        assert!(matches!(err, Error::CorruptCache(_)));
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_truncated_is_corrupt() {
        let bytes = save(&sample_cache());
        assert!(matches!(load(&bytes[..4]), Err(Error::CorruptCache(_))));
        assert!(matches!(
            load(&bytes[..bytes.len() - 1]),
            Err(Error::CorruptCache(_))
        ));
    }

    /// Re-seal a hand-edited body with a valid checksum
    fn seal(mut body: Vec<u8>) -> Vec<u8> {
        let crc = checksum(&body);
        body.extend_from_slice(&crc.to_le_bytes());
        body
    }

    #[test]
    fn test_bad_magic_is_corrupt() {
        let bytes = save(&sample_cache());
        let mut body = bytes[..bytes.len() - FOOTER_SIZE].to_vec();
        body[0] = b'X';
        let err = load(&seal(body)).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_trailing_bytes_are_corrupt() {
        let bytes = save(&sample_cache());
        let mut body = bytes[..bytes.len() - FOOTER_SIZE].to_vec();
        body.push(0);
        let err = load(&seal(body)).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn test_max_square_outside_tiles_is_corrupt() {
        let mut cache = UserCache::new();
        let mut level = LevelCache::new(9);
        level.record_mut(TileCoordinate::new(0, 0, 8), 2).mark(0, false);
        cache.insert(level);

        let bytes = save(&cache);
        let mut body = bytes[..bytes.len() - FOOTER_SIZE].to_vec();
        // header 8 + level 8 + record header 12 + tiles 1 byte -> max_square byte
        let max_square_offset = HEADER_SIZE + 8 + 12 + 1;
        body[max_square_offset] = 0b0000_0010;
        let err = load(&seal(body)).unwrap_err();
        assert!(err.to_string().contains("subset"));
    }

    #[test]
    fn test_padding_bits_must_be_zero() {
        let mut cache = UserCache::new();
        let mut level = LevelCache::new(9);
        level.record_mut(TileCoordinate::new(0, 0, 8), 2).mark(0, false);
        cache.insert(level);

        let bytes = save(&cache);
        let mut body = bytes[..bytes.len() - FOOTER_SIZE].to_vec();
        // 2x2 grid uses 4 of the 8 bits in the tiles byte
        body[HEADER_SIZE + 8 + 12] |= 0b1000_0000;
        let err = load(&seal(body)).unwrap_err();
        assert!(err.to_string().contains("padding"));
    }
}
