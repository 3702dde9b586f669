use crate::error::{PackError, PackResult};

/// Magic bytes at offset zero of every container.
pub const MAGIC: &[u8; 4] = b"MTRY";

/// Current container format version.
pub const VERSION: u32 = 1;

/// Size of the fixed header. Chunk data starts right behind it.
pub const HEADER_LEN: u64 = 64;

const CRC_OFFSET: usize = 56;

/// Fixed-size container header.
///
/// Layout (big-endian):
/// - `0..4`   magic `MTRY`
/// - `4..8`   format version
/// - `8..16`  offset of the live index snapshot
/// - `16..24` length of the live index snapshot
/// - `24..56` BLAKE3 hash of the index snapshot bytes
/// - `56..60` CRC32 of bytes `0..56`
/// - `60..64` reserved, zero
///
/// Rewriting the header is the commit point of every mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub index_offset: u64,
    pub index_len: u64,
    pub index_checksum: [u8; 32],
}

impl Header {
    /// Header describing an index snapshot stored at `index_offset`.
    pub fn for_index(index_offset: u64, index_bytes: &[u8]) -> Self {
        Self {
            index_offset,
            index_len: index_bytes.len() as u64,
            index_checksum: *blake3::hash(index_bytes).as_bytes(),
        }
    }

    /// One past the last byte of the live index snapshot.
    pub fn index_end(&self) -> u64 {
        self.index_offset + self.index_len
    }

    /// Check snapshot bytes against the recorded hash.
    pub fn verify_index(&self, index_bytes: &[u8]) -> PackResult<()> {
        if blake3::hash(index_bytes).as_bytes() != &self.index_checksum {
            return Err(PackError::IndexChecksumMismatch);
        }
        Ok(())
    }

    /// Serialize to the fixed on-disk form.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN as usize] {
        let mut buf = [0u8; HEADER_LEN as usize];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4..8].copy_from_slice(&VERSION.to_be_bytes());
        buf[8..16].copy_from_slice(&self.index_offset.to_be_bytes());
        buf[16..24].copy_from_slice(&self.index_len.to_be_bytes());
        buf[24..56].copy_from_slice(&self.index_checksum);
        let crc = crc32fast::hash(&buf[..CRC_OFFSET]);
        buf[CRC_OFFSET..CRC_OFFSET + 4].copy_from_slice(&crc.to_be_bytes());
        buf
    }

    /// Parse and verify the on-disk form.
    pub fn from_bytes(data: &[u8]) -> PackResult<Self> {
        if data.len() < HEADER_LEN as usize {
            return Err(PackError::TruncatedHeader(data.len() as u64));
        }
        if &data[0..4] != MAGIC {
            return Err(PackError::InvalidMagic {
                expected: String::from_utf8_lossy(MAGIC).into(),
                actual: String::from_utf8_lossy(&data[0..4]).into(),
            });
        }
        let version = read_u32(&data[4..8]);
        if version != VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }
        let stored_crc = read_u32(&data[CRC_OFFSET..CRC_OFFSET + 4]);
        if crc32fast::hash(&data[..CRC_OFFSET]) != stored_crc {
            return Err(PackError::HeaderChecksumMismatch);
        }

        let mut index_checksum = [0u8; 32];
        index_checksum.copy_from_slice(&data[24..56]);
        Ok(Self {
            index_offset: read_u64(&data[8..16]),
            index_len: read_u64(&data[16..24]),
            index_checksum,
        })
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_be_bytes(buf)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_be_bytes(buf)
}
