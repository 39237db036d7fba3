//! On-disk 4 KiB block and volume header formats, stripe geometry, and
//! the payload/shard interleave (`spread`/`unspread`).
//!
//! `Block` and `VolumeHeader` are explicit-layout structs with manual
//! little-endian `to_bytes`/`from_bytes`, matching the teacher's
//! preference for explicit byte-level control over on-disk data seen in
//! `spdk::dma_buf::DmaBuf` (no `serde` involvement in the wire format).
//! Checksums use the `crc32c` crate — the same dependency
//! `anuejn-ext4-image-writer` uses for its own on-disk checksums — rather
//! than a hand-rolled PCLMULQDQ CRC fold.

mod spread;

pub use spread::{spread, unspread};

use crate::error::{Error, Result};

/// Total size of a block or the volume header, in bytes.
pub const BLOCK_SIZE: usize = 4096;

/// Fixed 32-byte magic stamped at the start of every volume header.
pub const HEADER_MAGIC: [u8; 32] = *b"RSBLOCKv1-CORE-VOLUME-HEADER\0\0\0\0";

/// Current on-disk format version.
pub const HEADER_VERSION: u32 = 1;

const BLOCK_CHECKSUM_LEN: usize = 4;
const BLOCK_SEQUENCE_LEN: usize = 4;
const BLOCK_STRIPE_SHARD_LEN: usize = 8;
const BLOCK_HEADER_LEN: usize = BLOCK_CHECKSUM_LEN + BLOCK_SEQUENCE_LEN + BLOCK_STRIPE_SHARD_LEN;

/// Payload bytes available per block once the fixed header is subtracted
/// (4096 - 16 = 4080, per the on-disk layout).
pub const BLOCK_PAYLOAD_LEN: usize = BLOCK_SIZE - BLOCK_HEADER_LEN;

const SHARD_IDS_LEN: usize = 8;
// magic(32) + version(4) + volume_prefix_id(4) + primary_index_offset(8)
// + secondary_index_offset(8) + tail_offset(8) + shard_ids(8) = 72.
const HEADER_NAMED_FIXED_LEN: usize = 32 + 4 + 4 + 8 + 8 + 8 + SHARD_IDS_LEN;
const HEADER_CRC_LEN: usize = 4;
// The wire layout only names 24 bytes of "reserved / extended" at offset
// 72; the remainder of the 4 KiB header up to the trailing CRC is
// unnamed padding, reserved the same way.
const HEADER_RESERVED_LEN: usize = BLOCK_SIZE - HEADER_NAMED_FIXED_LEN - HEADER_CRC_LEN;

/// Packs a 56-bit stripe number and 8-bit shard id into the on-disk
/// `stripe_number_and_shard` field.
pub fn pack_stripe_and_shard(stripe_no: u64, shard_id: u8) -> u64 {
    debug_assert!(stripe_no < (1u64 << 56), "stripe number exceeds 56 bits");
    (stripe_no << 8) | shard_id as u64
}

/// Unpacks `stripe_number_and_shard` back into `(stripe_no, shard_id)`.
pub fn unpack_stripe_and_shard(packed: u64) -> (u64, u8) {
    (packed >> 8, (packed & 0xFF) as u8)
}

/// A single self-describing 4 KiB block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// CRC32C over every other field, computed on encode and verified on
    /// decode.
    pub checksum: u32,
    /// Monotonically increasing per-shard write sequence number.
    pub sequence: u32,
    /// Packed stripe number and shard id (see [`pack_stripe_and_shard`]).
    pub stripe_and_shard: u64,
    /// Exactly [`BLOCK_PAYLOAD_LEN`] bytes of payload.
    pub payload: Vec<u8>,
}

impl Block {
    pub fn new(sequence: u32, stripe_no: u64, shard_id: u8, payload: Vec<u8>) -> Self {
        assert_eq!(payload.len(), BLOCK_PAYLOAD_LEN, "payload must be block-sized");
        let mut b = Self {
            checksum: 0,
            sequence,
            stripe_and_shard: pack_stripe_and_shard(stripe_no, shard_id),
            payload,
        };
        b.checksum = b.compute_checksum();
        b
    }

    pub fn stripe_no(&self) -> u64 {
        unpack_stripe_and_shard(self.stripe_and_shard).0
    }

    pub fn shard_id(&self) -> u8 {
        unpack_stripe_and_shard(self.stripe_and_shard).1
    }

    fn compute_checksum(&self) -> u32 {
        let mut buf = Vec::with_capacity(BLOCK_SIZE - BLOCK_CHECKSUM_LEN);
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.stripe_and_shard.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        crc32c::crc32c(&buf)
    }

    /// Encodes this block into exactly [`BLOCK_SIZE`] bytes, little-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BLOCK_SIZE);
        out.extend_from_slice(&self.checksum.to_le_bytes());
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out.extend_from_slice(&self.stripe_and_shard.to_le_bytes());
        out.extend_from_slice(&self.payload);
        debug_assert_eq!(out.len(), BLOCK_SIZE);
        out
    }

    /// Decodes and validates a block from exactly [`BLOCK_SIZE`] bytes.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != BLOCK_SIZE {
            return Err(Error::InvalidBlock {
                stripe_no: 0,
                shard_id: 0,
                reason: format!("expected {BLOCK_SIZE} bytes, got {}", buf.len()),
            });
        }
        let checksum = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let sequence = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let stripe_and_shard = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        let payload = buf[16..].to_vec();

        let block = Self {
            checksum,
            sequence,
            stripe_and_shard,
            payload,
        };
        validate_block(&block)?;
        Ok(block)
    }
}

/// Verifies a block's checksum matches its contents.
pub fn validate_block(block: &Block) -> Result<()> {
    let expect = block.compute_checksum();
    if expect != block.checksum {
        let (stripe_no, shard_id) = unpack_stripe_and_shard(block.stripe_and_shard);
        return Err(Error::InvalidBlock {
            stripe_no,
            shard_id,
            reason: format!("checksum mismatch: expected {expect:#010x}, got {:#010x}", block.checksum),
        });
    }
    Ok(())
}

/// Minimum legal `volume_prefix_id`: prefixes below 2^24 are reserved.
pub const MIN_VOLUME_PREFIX_ID: u32 = 1 << 24;

/// The volume header: one per volume, stored in block 0 of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeHeader {
    pub version: u32,
    pub volume_prefix_id: u32,
    /// Byte offset (from the start of the file) of the volume's primary
    /// index structure; owned and interpreted by the collaborator that
    /// manages free space, not by this core.
    pub primary_index_offset: u64,
    /// Byte offset of the secondary (replica/backup) index structure.
    pub secondary_index_offset: u64,
    /// Byte offset of the append/rollback tail region (see crate docs on
    /// the rollback area). Always page-aligned.
    pub tail_offset: u64,
    /// Shard ids participating in this volume's stripes, in placement
    /// order, non-decreasing. When fewer than 8 shards are configured,
    /// the unused trailing entries repeat the last real shard id — see
    /// [`k_blocks_in_stripe`].
    pub shard_ids: [u8; SHARD_IDS_LEN],
    reserved: Vec<u8>,
    pub header_crc32c: u32,
}

impl VolumeHeader {
    pub fn new(
        volume_prefix_id: u32,
        primary_index_offset: u64,
        secondary_index_offset: u64,
        tail_offset: u64,
        shard_ids: [u8; SHARD_IDS_LEN],
    ) -> Self {
        let mut h = Self {
            version: HEADER_VERSION,
            volume_prefix_id,
            primary_index_offset,
            secondary_index_offset,
            tail_offset,
            shard_ids,
            reserved: vec![0u8; HEADER_RESERVED_LEN],
            header_crc32c: 0,
        };
        h.header_crc32c = h.compute_checksum();
        h
    }

    fn compute_checksum(&self) -> u32 {
        let mut buf = Vec::with_capacity(BLOCK_SIZE - HEADER_CRC_LEN);
        buf.extend_from_slice(&HEADER_MAGIC);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.volume_prefix_id.to_le_bytes());
        buf.extend_from_slice(&self.primary_index_offset.to_le_bytes());
        buf.extend_from_slice(&self.secondary_index_offset.to_le_bytes());
        buf.extend_from_slice(&self.tail_offset.to_le_bytes());
        buf.extend_from_slice(&self.shard_ids);
        buf.extend_from_slice(&self.reserved);
        crc32c::crc32c(&buf)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BLOCK_SIZE);
        out.extend_from_slice(&HEADER_MAGIC);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.volume_prefix_id.to_le_bytes());
        out.extend_from_slice(&self.primary_index_offset.to_le_bytes());
        out.extend_from_slice(&self.secondary_index_offset.to_le_bytes());
        out.extend_from_slice(&self.tail_offset.to_le_bytes());
        out.extend_from_slice(&self.shard_ids);
        out.extend_from_slice(&self.reserved);
        out.extend_from_slice(&self.header_crc32c.to_le_bytes());
        debug_assert_eq!(out.len(), BLOCK_SIZE);
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != BLOCK_SIZE {
            return Err(Error::InvalidHeader(format!(
                "expected {BLOCK_SIZE} bytes, got {}",
                buf.len()
            )));
        }
        let magic = &buf[0..32];
        if magic != HEADER_MAGIC {
            return Err(Error::InvalidHeader("bad magic".into()));
        }
        let version = u32::from_le_bytes(buf[32..36].try_into().unwrap());
        let volume_prefix_id = u32::from_le_bytes(buf[36..40].try_into().unwrap());
        let primary_index_offset = u64::from_le_bytes(buf[40..48].try_into().unwrap());
        let secondary_index_offset = u64::from_le_bytes(buf[48..56].try_into().unwrap());
        let tail_offset = u64::from_le_bytes(buf[56..64].try_into().unwrap());
        let mut shard_ids = [0u8; SHARD_IDS_LEN];
        shard_ids.copy_from_slice(&buf[64..64 + SHARD_IDS_LEN]);
        let reserved_start = 64 + SHARD_IDS_LEN;
        let reserved = buf[reserved_start..reserved_start + HEADER_RESERVED_LEN].to_vec();
        let header_crc32c = u32::from_le_bytes(
            buf[reserved_start + HEADER_RESERVED_LEN..BLOCK_SIZE]
                .try_into()
                .unwrap(),
        );

        let header = Self {
            version,
            volume_prefix_id,
            primary_index_offset,
            secondary_index_offset,
            tail_offset,
            shard_ids,
            reserved,
            header_crc32c,
        };
        validate_header(&header)?;
        Ok(header)
    }
}

/// Verifies a volume header's magic, version, shard-id ordering,
/// prefix-id range, and checksum.
pub fn validate_header(header: &VolumeHeader) -> Result<()> {
    if header.version != HEADER_VERSION {
        return Err(Error::InvalidHeader(format!(
            "unsupported version {}",
            header.version
        )));
    }
    if header.volume_prefix_id < MIN_VOLUME_PREFIX_ID {
        return Err(Error::InvalidHeader(format!(
            "volume_prefix_id {} is below the minimum {MIN_VOLUME_PREFIX_ID}",
            header.volume_prefix_id
        )));
    }
    if !header.shard_ids.windows(2).all(|w| w[0] <= w[1]) {
        return Err(Error::InvalidHeader(format!(
            "shard_ids {:?} are not non-decreasing",
            header.shard_ids
        )));
    }
    let expect = header.compute_checksum();
    if expect != header.header_crc32c {
        return Err(Error::InvalidHeader(format!(
            "checksum mismatch: expected {expect:#010x}, got {:#010x}",
            header.header_crc32c
        )));
    }
    Ok(())
}

/// Recovers the number of blocks per stripe (`k + m`) from the header's
/// fixed-size `shard_ids` array by collapsing trailing repeats: unused
/// slots beyond the real shard count repeat the last real shard id, so
/// the real count is the index of the last value change, plus one.
pub fn k_blocks_in_stripe(shard_ids: &[u8; SHARD_IDS_LEN]) -> usize {
    let mut n = SHARD_IDS_LEN;
    while n > 1 && shard_ids[n - 1] == shard_ids[n - 2] {
        n -= 1;
    }
    n
}

/// Computes the byte offset of `(stripe_no, shard_id)`'s block within the
/// volume file. Header-inclusive: block 0 is the volume header, so the
/// first stripe's blocks start at byte [`BLOCK_SIZE`].
pub fn offset_to_block(header: &VolumeHeader, stripe_no: u64, shard_id: u8) -> Result<u64> {
    let n = k_blocks_in_stripe(&header.shard_ids);
    let pos = header.shard_ids[..n]
        .iter()
        .position(|&s| s == shard_id)
        .ok_or(Error::UnknownShard { shard_id })?;
    Ok(BLOCK_SIZE as u64 + (stripe_no * n as u64 + pos as u64) * BLOCK_SIZE as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(shard_ids: [u8; SHARD_IDS_LEN]) -> VolumeHeader {
        VolumeHeader::new(
            MIN_VOLUME_PREFIX_ID,
            BLOCK_SIZE as u64,
            2 * BLOCK_SIZE as u64,
            3 * BLOCK_SIZE as u64,
            shard_ids,
        )
    }

    #[test]
    fn header_round_trips() {
        let h = sample_header([0, 1, 2, 3, 4, 5, 6, 7]);
        let bytes = h.to_bytes();
        let back = VolumeHeader::from_bytes(&bytes).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn header_rejects_bad_magic() {
        let h = sample_header([0, 1, 2, 3, 4, 5, 6, 7]);
        let mut bytes = h.to_bytes();
        bytes[0] ^= 0xFF;
        assert!(matches!(VolumeHeader::from_bytes(&bytes), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn header_rejects_corrupted_checksum() {
        let h = sample_header([0, 1, 2, 3, 4, 5, 6, 7]);
        let mut bytes = h.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(VolumeHeader::from_bytes(&bytes), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn block_round_trips() {
        let payload = vec![7u8; BLOCK_PAYLOAD_LEN];
        let b = Block::new(1, 100, 3, payload);
        let bytes = b.to_bytes();
        let back = Block::from_bytes(&bytes).unwrap();
        assert_eq!(b, back);
        assert_eq!(back.stripe_no(), 100);
        assert_eq!(back.shard_id(), 3);
    }

    #[test]
    fn block_rejects_corrupted_payload() {
        let payload = vec![7u8; BLOCK_PAYLOAD_LEN];
        let b = Block::new(1, 100, 3, payload);
        let mut bytes = b.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = Block::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::InvalidBlock { .. }));
    }

    #[test]
    fn stripe_and_shard_pack_unpack_round_trips() {
        for stripe in [0u64, 1, 12345, (1u64 << 56) - 1] {
            for shard in [0u8, 1, 255] {
                let packed = pack_stripe_and_shard(stripe, shard);
                assert_eq!(unpack_stripe_and_shard(packed), (stripe, shard));
            }
        }
    }

    #[test]
    fn k_blocks_in_stripe_collapses_padding() {
        assert_eq!(k_blocks_in_stripe(&[0, 1, 2, 3, 4, 5, 6, 7]), 8);
        assert_eq!(k_blocks_in_stripe(&[0, 1, 2, 3, 3, 3, 3, 3]), 4);
        assert_eq!(k_blocks_in_stripe(&[0, 0, 0, 0, 0, 0, 0, 0]), 1);
    }

    #[test]
    fn offset_to_block_is_header_inclusive() {
        let h = sample_header([0, 1, 2, 3, 3, 3, 3, 3]);
        // k+m = 4 for this header.
        assert_eq!(offset_to_block(&h, 0, 0).unwrap(), BLOCK_SIZE as u64);
        assert_eq!(offset_to_block(&h, 0, 1).unwrap(), 2 * BLOCK_SIZE as u64);
        assert_eq!(offset_to_block(&h, 0, 3).unwrap(), 4 * BLOCK_SIZE as u64);
        assert_eq!(offset_to_block(&h, 1, 0).unwrap(), 5 * BLOCK_SIZE as u64);
    }

    #[test]
    fn offset_to_block_rejects_unknown_shard() {
        let h = sample_header([0, 1, 2, 3, 3, 3, 3, 3]);
        assert!(matches!(
            offset_to_block(&h, 0, 9),
            Err(Error::UnknownShard { shard_id: 9 })
        ));
    }

    #[test]
    fn header_rejects_prefix_id_below_minimum() {
        let h = sample_header([0, 1, 2, 3, 4, 5, 6, 7]);
        let mut bytes = h.to_bytes();
        // volume_prefix_id lives at offset 36..40; zero it out (below the
        // 2^24 minimum) without touching the trailing CRC bytes directly.
        bytes[36..40].copy_from_slice(&0u32.to_le_bytes());
        assert!(matches!(VolumeHeader::from_bytes(&bytes), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn header_rejects_non_decreasing_shard_ids() {
        let h = sample_header([0, 1, 2, 3, 4, 5, 6, 7]);
        let mut bytes = h.to_bytes();
        // shard_ids lives at offset 64..72; break the ordering invariant
        // (index 1 becomes 9, which is greater than index 2's value 2).
        bytes[65] = 9;
        assert!(matches!(VolumeHeader::from_bytes(&bytes), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn zeroed_header_with_minimum_prefix_id_validates() {
        let h = VolumeHeader::new(MIN_VOLUME_PREFIX_ID, 0, 0, 0, [0u8; SHARD_IDS_LEN]);
        assert!(validate_header(&h).is_ok());
    }
}
