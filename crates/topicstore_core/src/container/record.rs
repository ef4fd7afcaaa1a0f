//! Journal record types and framing.

use crate::error::{CoreError, CoreResult};

/// Magic bytes identifying a journal record.
pub const JOURNAL_MAGIC: [u8; 4] = *b"TSJR";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;

/// Type of journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JournalRecordType {
    /// A new entry.
    Put = 1,
    /// Replacement body for an existing entry.
    Update = 2,
    /// Removal of an entry.
    Remove = 3,
    /// Removal of every entry.
    Clear = 4,
    /// Container metadata written at the head of a compacted journal.
    Meta = 5,
}

impl JournalRecordType {
    /// Converts a byte to a record type.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Put),
            2 => Some(Self::Update),
            3 => Some(Self::Remove),
            4 => Some(Self::Clear),
            5 => Some(Self::Meta),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A single mutation of a container.
///
/// Bodies are opaque to the journal; containers fill them with codec bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalRecord {
    /// A new entry under a freshly assigned handle.
    Put {
        /// Handle of the entry.
        handle: u64,
        /// Encoded entry.
        body: Vec<u8>,
    },
    /// Replacement of an existing entry's body.
    Update {
        /// Handle of the entry.
        handle: u64,
        /// Encoded entry.
        body: Vec<u8>,
    },
    /// Removal of an entry.
    Remove {
        /// Handle of the entry.
        handle: u64,
    },
    /// Removal of every entry. Handles are not reset.
    Clear,
    /// Handle counter, so compaction never lets a handle be reused.
    Meta {
        /// Next handle the container will assign.
        next_handle: u64,
    },
}

impl JournalRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> JournalRecordType {
        match self {
            Self::Put { .. } => JournalRecordType::Put,
            Self::Update { .. } => JournalRecordType::Update,
            Self::Remove { .. } => JournalRecordType::Remove,
            Self::Clear => JournalRecordType::Clear,
            Self::Meta { .. } => JournalRecordType::Meta,
        }
    }

    /// Serializes the record payload (without envelope).
    #[must_use]
    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            Self::Put { handle, body } | Self::Update { handle, body } => {
                let mut buf = Vec::with_capacity(8 + body.len());
                buf.extend_from_slice(&handle.to_le_bytes());
                buf.extend_from_slice(body);
                buf
            }
            Self::Remove { handle } => handle.to_le_bytes().to_vec(),
            Self::Clear => Vec::new(),
            Self::Meta { next_handle } => next_handle.to_le_bytes().to_vec(),
        }
    }

    /// Deserializes a record from its type and payload.
    pub fn decode_payload(record_type: JournalRecordType, payload: &[u8]) -> CoreResult<Self> {
        let read_handle = || -> CoreResult<u64> {
            let bytes: [u8; 8] = payload
                .get(..8)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| CoreError::journal_corruption("", "payload shorter than handle"))?;
            Ok(u64::from_le_bytes(bytes))
        };

        let expect_len = |len: usize| -> CoreResult<()> {
            if payload.len() == len {
                Ok(())
            } else {
                Err(CoreError::journal_corruption(
                    "",
                    format!(
                        "{record_type:?} record payload is {} bytes, expected {len}",
                        payload.len()
                    ),
                ))
            }
        };

        match record_type {
            JournalRecordType::Put => Ok(Self::Put {
                handle: read_handle()?,
                body: payload[8..].to_vec(),
            }),
            JournalRecordType::Update => Ok(Self::Update {
                handle: read_handle()?,
                body: payload[8..].to_vec(),
            }),
            JournalRecordType::Remove => {
                expect_len(8)?;
                Ok(Self::Remove {
                    handle: read_handle()?,
                })
            }
            JournalRecordType::Clear => {
                expect_len(0)?;
                Ok(Self::Clear)
            }
            JournalRecordType::Meta => {
                expect_len(8)?;
                Ok(Self::Meta {
                    next_handle: read_handle()?,
                })
            }
        }
    }

    /// Frames the record with magic, version, type, length and CRC32.
    ///
    /// ```text
    /// | magic (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
    /// ```
    pub fn frame(&self) -> CoreResult<Vec<u8>> {
        let payload = self.encode_payload();
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::journal_corruption("", "record payload exceeds 4 GiB"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&JOURNAL_MAGIC);
        data.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        data.push(self.record_type().as_byte());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);

        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }
}

/// Parsed header of a framed record.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RecordHeader {
    pub record_type: JournalRecordType,
    pub payload_len: usize,
}

impl RecordHeader {
    /// Parses and validates a header. Any failure here is corruption.
    pub(crate) fn parse(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < HEADER_SIZE || bytes[0..4] != JOURNAL_MAGIC {
            return Err(CoreError::journal_corruption("", "invalid record magic"));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version > JOURNAL_VERSION {
            return Err(CoreError::journal_corruption(
                "",
                format!("unsupported journal version: {version}"),
            ));
        }
        let record_type = JournalRecordType::from_byte(bytes[6]).ok_or_else(|| {
            CoreError::journal_corruption("", format!("unknown record type: {}", bytes[6]))
        })?;
        let payload_len = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]) as usize;
        Ok(Self {
            record_type,
            payload_len,
        })
    }

    /// Total framed size of the record this header starts.
    pub(crate) fn framed_len(&self) -> usize {
        HEADER_SIZE + self.payload_len + CRC_SIZE
    }
}

/// Verifies the trailing CRC of a complete framed record.
pub(crate) fn verify_crc(framed: &[u8]) -> CoreResult<()> {
    let split = framed.len() - CRC_SIZE;
    let stored = u32::from_le_bytes([
        framed[split],
        framed[split + 1],
        framed[split + 2],
        framed[split + 3],
    ]);
    let computed = compute_crc32(&framed[..split]);
    if stored != computed {
        return Err(CoreError::ChecksumMismatch {
            expected: stored,
            actual: computed,
        });
    }
    Ok(())
}

/// CRC32 (IEEE polynomial, reflected).
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut n = 0;
        while n < 256 {
            let mut c = n as u32;
            let mut k = 0;
            while k < 8 {
                c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
                k += 1;
            }
            table[n] = c;
            n += 1;
        }
        table
    };

    !data.iter().fold(!0u32, |crc, &byte| {
        TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8)
    })
}
