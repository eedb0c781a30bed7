//! Self-bootstrap of the Master File Table: the MFT's own record (index
//! 0) describes the `$DATA` stream that holds the MFT's full contents.

use std::io::{Read, Seek};

use log::{info, warn};

use crate::boot_sector::BootSector;
use crate::byte_reader::ByteReader;
use crate::error::NtfsError;
use crate::record::{self, RECORD_SIZE};

/// Reads the full `$MFT` byte image from the volume.
///
/// The boot sector's `clusters_per_record` byte is reused here as an
/// unsigned cluster count sizing the provisional bootstrap window,
/// distinct from its signed use in `BootSector::record_size` for the
/// record size itself.
pub fn load_mft<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    boot: &BootSector,
) -> Result<Vec<u8>, NtfsError> {
    let bytes_per_cluster = boot.bytes_per_cluster();
    let provisional_clusters = boot.clusters_per_record as u8 as u64;
    let provisional_len = provisional_clusters * bytes_per_cluster as u64;
    let mft_offset = boot.mft_cluster * bytes_per_cluster as u64;

    info!(
        "loading $MFT from cluster {} (offset {}), provisional window {} bytes",
        boot.mft_cluster, mft_offset, provisional_len
    );

    let provisional = reader.read_at(mft_offset, provisional_len as usize)?;

    let own_record = record::parse_record(&provisional[0..RECORD_SIZE], mft_offset)?;
    let data = record::primary_data(&own_record).ok_or_else(|| NtfsError::MalformedRecord {
        offset: mft_offset,
        reason: "$MFT's own record has no $DATA attribute".to_string(),
    })?;

    let materialized = data.materialize(reader, bytes_per_cluster)?;

    if (materialized.len() as u64) < provisional.len() as u64 {
        warn!(
            "$MFT truncated: materialized {} bytes, provisional window was {} bytes; falling back to provisional window",
            materialized.len(),
            provisional.len()
        );
        return Ok(provisional);
    }

    info!("$MFT materialized: {} bytes", materialized.len());
    Ok(materialized)
}
