use thiserror::Error;

/// Fatal volume-level errors abort the run; everything else is recovered
/// at the per-record or per-attribute scope by the caller (see `record.rs`,
/// `attribute.rs`, `path.rs`) and never surfaces this type.
#[derive(Debug, Error)]
pub enum NtfsError {
    #[error("not an NTFS volume (no \"NTFS    \" signature at 0x03 or 0x102003)")]
    NotAnNtfsVolume,

    #[error("unsupported MFT record size: clusters_per_record={0} implies a size other than 1024 bytes")]
    UnsupportedRecordSize(i8),

    #[error("$MFT truncated: materialized stream ({materialized} bytes) shorter than provisional window ({provisional} bytes)")]
    MftTruncated { materialized: u64, provisional: u64 },

    #[error("malformed record at offset {offset}: {reason}")]
    MalformedRecord { offset: u64, reason: String },

    #[error("attribute overflow in record at offset {offset}: {reason}")]
    AttributeOverflow { offset: u64, reason: String },

    #[error("malformed runlist at offset {offset}: {reason}")]
    MalformedRunlist { offset: u64, reason: String },

    #[error("bad USA number in sector {sector} of record at offset {record_offset}")]
    BadUsaNumber { record_offset: u64, sector: usize },

    #[error("cyclic parent chain detected starting at record {0}")]
    CyclicPath(u64),

    #[error("orphaned path: record {record} has no usable $FILE_NAME ({reason})")]
    OrphanedPath { record: u64, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("output collision: exhausted suffix attempts for {0}")]
    OutputCollision(String),
}
