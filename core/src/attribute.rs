//! Attribute record parsing: resident/non-resident values, attribute
//! names (for alternate data streams), and `$FILE_NAME` decoding.

use std::io::{Read, Seek};

use byteorder::{ByteOrder, LittleEndian};

use crate::byte_reader::ByteReader;
use crate::error::NtfsError;
use crate::runlist::{self, DataRun};

/// Human-readable attribute kind. Unknown codes are retained as
/// `unknown_<code>` rather than dropped.
pub fn kind_name(attr_type: i32) -> String {
    match attr_type {
        0x10 => "STANDARD_INFO".to_string(),
        0x20 => "ATTR_LIST".to_string(),
        0x30 => "FILE_NAME".to_string(),
        0x40 => "OBJECT_ID".to_string(),
        0x50 => "SECURITY".to_string(),
        0x60 => "VOLUME_NAME".to_string(),
        0x70 => "VOLUME_INFO".to_string(),
        0x80 => "DATA".to_string(),
        0x90 => "INDEX_ROOT".to_string(),
        0xA0 => "INDEX_ALLOC".to_string(),
        0xB0 => "BITMAP".to_string(),
        0xC0 => "SYMLINK".to_string(),
        other => format!("unknown_{other}"),
    }
}

/// Sentinel attribute type marking the end of an attribute list.
pub const ATTR_LIST_TERMINATOR: i32 = -1;

/// A lazily-materialized attribute value. Resident bytes are embedded in
/// the record; non-resident bytes live elsewhere on the volume and are
/// only read when the caller asks, via `materialize`.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    Resident(Vec<u8>),
    NonResident { runs: Vec<DataRun>, real_size: u64 },
}

impl AttributeValue {
    pub fn materialize<R: Read + Seek>(
        &self,
        reader: &mut ByteReader<R>,
        bytes_per_cluster: u32,
    ) -> Result<Vec<u8>, NtfsError> {
        match self {
            AttributeValue::Resident(bytes) => Ok(bytes.clone()),
            AttributeValue::NonResident { runs, real_size } => {
                runlist::materialize(reader, runs, bytes_per_cluster, *real_size)
            }
        }
    }
}

/// One parsed attribute: its kind, optional name (non-empty only for
/// alternate data streams / named attributes), and lazy value.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub kind: String,
    pub name: Option<String>,
    pub value: AttributeValue,
}

/// Parses a single attribute record starting at `attr[0]`. `attr` must
/// span at least `record_length` bytes (the caller slices the record
/// accordingly before calling).
pub fn parse_attribute(attr: &[u8], record_offset: u64) -> Result<Attribute, NtfsError> {
    let overflow = |reason: &str| NtfsError::AttributeOverflow {
        offset: record_offset,
        reason: reason.to_string(),
    };

    if attr.len() < 24 {
        return Err(overflow("attribute header shorter than 24 bytes"));
    }

    let attr_type = LittleEndian::read_i32(&attr[0..4]);
    let record_length = LittleEndian::read_u32(&attr[4..8]) as usize;
    let non_resident = attr[8];
    let name_length = attr[9] as usize;
    let name_offset = LittleEndian::read_u16(&attr[10..12]) as usize;

    if record_length > attr.len() {
        return Err(overflow("record_length exceeds available bytes"));
    }

    let name = if name_length > 0 {
        let end = name_offset + 2 * name_length;
        if end > attr.len() {
            return Err(overflow("attribute name extends beyond record"));
        }
        Some(decode_utf16le(&attr[name_offset..end]))
    } else {
        None
    };

    let kind = kind_name(attr_type);

    let value = if non_resident == 0 {
        if attr.len() < 24 {
            return Err(overflow("resident header shorter than 24 bytes"));
        }
        let value_length = LittleEndian::read_u32(&attr[16..20]) as usize;
        let value_offset = LittleEndian::read_u16(&attr[20..22]) as usize;
        let end = value_offset + value_length;
        if end > attr.len() {
            return Err(overflow("resident value extends beyond record"));
        }
        AttributeValue::Resident(attr[value_offset..end].to_vec())
    } else {
        if attr.len() < 56 {
            return Err(overflow("non-resident header shorter than 56 bytes"));
        }
        let run_list_offset = LittleEndian::read_u16(&attr[32..34]) as usize;
        let real_size = LittleEndian::read_u64(&attr[48..56]);
        if run_list_offset > record_length {
            return Err(overflow("run_list_offset beyond record_length"));
        }
        let runs = runlist::decode_data_runs(&attr[run_list_offset..record_length], record_offset);
        AttributeValue::NonResident { runs, real_size }
    };

    Ok(Attribute { kind, name, value })
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Decoded `$FILE_NAME` payload: the parent's file reference and the
/// UTF-16LE filename. The filename length (in code units) is a single
/// byte at value-offset 64; the name begins at value-offset 66.
#[derive(Debug, Clone)]
pub struct FileNameAttr {
    pub parent_ref: u64,
    pub name: String,
}

pub fn decode_file_name(value: &[u8]) -> Result<FileNameAttr, NtfsError> {
    if value.len() < 66 {
        return Err(NtfsError::AttributeOverflow {
            offset: 0,
            reason: "FILE_NAME value shorter than 66 bytes".to_string(),
        });
    }
    let parent_ref = LittleEndian::read_u64(&value[0..8]);
    let flen = value[64] as usize;
    let end = 66 + 2 * flen;
    if end > value.len() {
        return Err(NtfsError::AttributeOverflow {
            offset: 0,
            reason: "FILE_NAME length byte overruns value".to_string(),
        });
    }
    let name = decode_utf16le(&value[66..end]);
    Ok(FileNameAttr { parent_ref, name })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resident_attr(attr_type: i32, value: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; 24 + value.len()];
        LittleEndian::write_i32(&mut buf[0..4], attr_type);
        let buf_len = buf.len() as u32;
        LittleEndian::write_u32(&mut buf[4..8], buf_len);
        buf[8] = 0; // resident
        buf[9] = 0; // no name
        LittleEndian::write_u32(&mut buf[16..20], value.len() as u32);
        LittleEndian::write_u16(&mut buf[20..22], 24);
        buf[24..].copy_from_slice(value);
        buf
    }

    #[test]
    fn parses_resident_data_attribute() {
        let attr = resident_attr(0x80, b"Hello\n");
        let parsed = parse_attribute(&attr, 0).unwrap();
        assert_eq!(parsed.kind, "DATA");
        assert!(parsed.name.is_none());
        match parsed.value {
            AttributeValue::Resident(bytes) => assert_eq!(bytes, b"Hello\n"),
            _ => panic!("expected resident value"),
        }
    }

    #[test]
    fn unknown_kind_is_retained() {
        let attr = resident_attr(0x1234, b"");
        let parsed = parse_attribute(&attr, 0).unwrap();
        assert_eq!(parsed.kind, "unknown_4660");
    }

    #[test]
    fn parses_named_attribute_for_ads() {
        let name_utf16: Vec<u8> = "meta".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let value = b"m".to_vec();
        let name_offset = 24;
        let value_offset = name_offset + name_utf16.len();
        let mut buf = vec![0u8; value_offset + value.len()];
        LittleEndian::write_i32(&mut buf[0..4], 0x80);
        let buf_len = buf.len() as u32;
        LittleEndian::write_u32(&mut buf[4..8], buf_len);
        buf[8] = 0;
        buf[9] = 4; // "meta" is 4 UTF-16 code units
        LittleEndian::write_u16(&mut buf[10..12], name_offset as u16);
        LittleEndian::write_u32(&mut buf[16..20], value.len() as u32);
        LittleEndian::write_u16(&mut buf[20..22], value_offset as u16);
        buf[name_offset..value_offset].copy_from_slice(&name_utf16);
        buf[value_offset..].copy_from_slice(&value);

        let parsed = parse_attribute(&buf, 0).unwrap();
        assert_eq!(parsed.name.as_deref(), Some("meta"));
    }

    #[test]
    fn rejects_value_beyond_record() {
        let mut attr = resident_attr(0x80, b"x");
        LittleEndian::write_u32(&mut attr[16..20], 9999);
        assert!(matches!(
            parse_attribute(&attr, 0),
            Err(NtfsError::AttributeOverflow { .. })
        ));
    }

    #[test]
    fn decodes_file_name() {
        let mut value = vec![0u8; 66];
        LittleEndian::write_u64(&mut value[0..8], 5);
        let name_utf16: Vec<u8> = "hello.txt".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        value[64] = "hello.txt".encode_utf16().count() as u8;
        value.extend_from_slice(&name_utf16);

        let decoded = decode_file_name(&value).unwrap();
        assert_eq!(decoded.parent_ref, 5);
        assert_eq!(decoded.name, "hello.txt");
    }
}
