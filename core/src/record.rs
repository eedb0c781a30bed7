//! File record parsing: USA fix-up and the attribute walk that builds a
//! record's grouped attribute map.

use byteorder::{ByteOrder, LittleEndian};
use log::warn;

use crate::attribute::{self, Attribute, AttributeValue, ATTR_LIST_TERMINATOR};
use crate::error::NtfsError;

pub const RECORD_SIZE: usize = 1024;
pub const MAGIC: &[u8; 4] = b"FILE";
const SECTOR_SIZE: usize = 512;

/// A parsed 1024-byte MFT record: a flat list of (kind, name) -> value.
/// A small linear-scan vector beats a nested map for the typical handful
/// of attributes per record.
#[derive(Debug, Clone)]
pub struct Record {
    pub offset: u64,
    pub used_size: u32,
    pub attrs_offset: u16,
    attributes: Vec<Attribute>,
}

impl Record {
    /// All attributes of the given kind (e.g. multiple `$DATA` entries:
    /// the unnamed primary stream plus any named alternate streams).
    pub fn attributes_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Attribute> {
        self.attributes.iter().filter(move |a| a.kind == kind)
    }

    /// The single attribute of `kind` with the given name (`None` for
    /// the unnamed/primary attribute).
    pub fn attribute(&self, kind: &str, name: Option<&str>) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.kind == kind && a.name.as_deref() == name)
    }

    pub fn has_attribute(&self, kind: &str) -> bool {
        self.attributes.iter().any(|a| a.kind == kind)
    }
}

/// Applies the Update Sequence Array fix-up in place. A sector whose
/// stamped tail doesn't match the USA number is left unchanged and
/// logged; the record is still usable, just missing that sector's fix-up.
fn apply_usa_fixup(record: &mut [u8], record_offset: u64) {
    let usa_offset = LittleEndian::read_u16(&record[4..6]) as usize;
    let usa_count = LittleEndian::read_u16(&record[6..8]) as usize;
    if usa_offset == 0 || usa_count == 0 {
        return;
    }
    if usa_offset + usa_count * 2 > record.len() {
        warn!(
            "record at offset {}: USA block extends beyond record, skipping fix-up",
            record_offset
        );
        return;
    }

    let usa_number = [record[usa_offset], record[usa_offset + 1]];
    let sectors = record.len() / SECTOR_SIZE;

    for i in 0..sectors {
        let tail = i * SECTOR_SIZE + SECTOR_SIZE - 2;
        let replacement_pos = usa_offset + 2 + i * 2;
        if replacement_pos + 2 > record.len() {
            break;
        }
        if record[tail] != usa_number[0] || record[tail + 1] != usa_number[1] {
            warn!(
                "record at offset {}: bad USA number in sector {} (byte offset {})",
                record_offset,
                i,
                record_offset + tail as u64
            );
            continue;
        }
        record[tail] = record[replacement_pos];
        record[tail + 1] = record[replacement_pos + 1];
    }
}

/// Parses a 1024-byte file record: applies the USA fix-up, then walks
/// the attribute list until the terminator. Returns `None` (logged) if
/// the record is too corrupt to use at all; `MalformedRecord` covers a
/// bad `attrs_offset` or a runaway `record_length` mid-walk.
pub fn parse_record(data: &[u8], offset: u64) -> Result<Record, NtfsError> {
    if data.len() != RECORD_SIZE || &data[0..4] != MAGIC {
        return Err(NtfsError::MalformedRecord {
            offset,
            reason: "missing FILE signature".to_string(),
        });
    }

    let mut record = data.to_vec();
    apply_usa_fixup(&mut record, offset);

    let attrs_offset = LittleEndian::read_u16(&record[20..22]);
    let used_size = LittleEndian::read_u32(&record[24..28]);

    if attrs_offset < 42 || attrs_offset as usize >= RECORD_SIZE {
        return Err(NtfsError::MalformedRecord {
            offset,
            reason: format!("attrs_offset {attrs_offset} out of range"),
        });
    }

    let mut attributes = Vec::new();
    let mut pos = attrs_offset as usize;

    loop {
        if pos + 12 > record.len() {
            break;
        }
        let attr_type = LittleEndian::read_i32(&record[pos..pos + 4]);
        if attr_type == ATTR_LIST_TERMINATOR {
            break;
        }
        let record_length = LittleEndian::read_u32(&record[pos + 4..pos + 8]) as usize;
        if record_length == 0 || pos + record_length > record.len() {
            return Err(NtfsError::MalformedRecord {
                offset,
                reason: format!("invalid attribute record_length {record_length} at {pos}"),
            });
        }

        match attribute::parse_attribute(&record[pos..pos + record_length], offset) {
            Ok(attr) => attributes.push(attr),
            Err(err) => warn!("record at offset {offset}: skipping attribute: {err}"),
        }

        pos += record_length;
    }

    Ok(Record {
        offset,
        used_size,
        attrs_offset,
        attributes,
    })
}

/// Convenience: the unnamed `$DATA` stream's `materialize`-able value,
/// used by both the MFT bootstrap and the recovery driver.
pub fn primary_data(record: &Record) -> Option<&AttributeValue> {
    record.attribute("DATA", None).map(|a| &a.value)
}
