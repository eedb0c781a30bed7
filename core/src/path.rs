//! Reconstructs a record's full path by walking `$FILE_NAME` parent
//! references up to the root.

use crate::attribute::{self, AttributeValue};
use crate::error::NtfsError;
use crate::record::Record;

/// Defends against cyclic parent references in a corrupt MFT.
pub const MAX_DEPTH: usize = 4096;

/// Mask stripping the sequence number from a 64-bit file reference.
const RECORD_INDEX_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

/// `$FILE_NAME` is always resident in practice; a non-resident value
/// here is itself treated as a decode failure (an orphan).
fn file_name_of(record: &Record) -> Result<attribute::FileNameAttr, String> {
    let attr = record
        .attribute("FILE_NAME", None)
        .ok_or_else(|| "no $FILE_NAME attribute".to_string())?;
    match &attr.value {
        AttributeValue::Resident(bytes) => {
            attribute::decode_file_name(bytes).map_err(|e| e.to_string())
        }
        AttributeValue::NonResident { .. } => {
            Err("$FILE_NAME is non-resident, cannot decode without a reader".to_string())
        }
    }
}

/// Walks parent references from `index` up to the root (a self-referential
/// `$FILE_NAME` entry named `"."`), returning path components root-first.
/// The caller falls back to `__ORPHANED__/<basename>` on either error.
pub fn reconstruct_path(records: &[Option<Record>], index: u64) -> Result<Vec<String>, NtfsError> {
    let mut components = Vec::new();
    let mut current = index;

    for _ in 0..MAX_DEPTH {
        let record = records
            .get(current as usize)
            .and_then(|r| r.as_ref())
            .ok_or_else(|| NtfsError::OrphanedPath {
                record: current,
                reason: format!("record {current} is absent"),
            })?;

        let file_name = file_name_of(record).map_err(|reason| NtfsError::OrphanedPath {
            record: current,
            reason,
        })?;

        if file_name.name == "." {
            return Ok(components.into_iter().rev().collect());
        }

        components.push(file_name.name);
        current = file_name.parent_ref & RECORD_INDEX_MASK;
    }

    Err(NtfsError::CyclicPath(index))
}

/// Joins path components with `/`.
pub fn join_path(components: &[String]) -> String {
    components.join("/")
}
