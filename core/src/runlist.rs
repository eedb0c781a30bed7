//! Data run (runlist) decoding for non-resident attributes, and
//! materialization of the extents they describe into bytes.

use std::io::{Read, Seek};

use log::warn;

use crate::byte_reader::ByteReader;
use crate::error::NtfsError;

/// One extent of a non-resident stream: `length` clusters starting at
/// `lcn`, or a sparse (zero-filled) run when `lcn` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRun {
    pub lcn: Option<u64>,
    pub length: u64,
}

/// Decodes a packed runlist. A `length_len` of zero or an operand that
/// overruns `data` is malformed; this logs and stops, returning the runs
/// decoded so far rather than failing the whole attribute.
pub fn decode_data_runs(data: &[u8], record_offset: u64) -> Vec<DataRun> {
    let mut runs = Vec::new();
    let mut pos = 0usize;
    let mut prev_lcn: i64 = 0;

    while pos < data.len() {
        let header = data[pos];
        if header == 0 {
            break;
        }

        let length_len = (header & 0x0F) as usize;
        let offset_len = ((header >> 4) & 0x0F) as usize;
        pos += 1;

        if length_len == 0 || pos + length_len + offset_len > data.len() {
            warn!(
                "malformed runlist at record offset {}: header={:#04x} length_len={} offset_len={} pos={} buf_len={}",
                record_offset, header, length_len, offset_len, pos, data.len()
            );
            break;
        }

        let length = read_unsigned(&data[pos..pos + length_len]);
        pos += length_len;

        if offset_len == 0 {
            // Sparse: delta is zero, LCN does not advance.
            runs.push(DataRun { lcn: None, length });
            continue;
        }

        let delta = read_signed(&data[pos..pos + offset_len]);
        pos += offset_len;
        prev_lcn += delta;

        if prev_lcn < 0 {
            warn!(
                "malformed runlist at record offset {}: negative absolute LCN {}",
                record_offset, prev_lcn
            );
            break;
        }

        runs.push(DataRun {
            lcn: Some(prev_lcn as u64),
            length,
        });
    }

    runs
}

/// Reads an unsigned little-endian integer of arbitrary byte width.
fn read_unsigned(bytes: &[u8]) -> u64 {
    let mut value = 0u64;
    for (i, &byte) in bytes.iter().enumerate() {
        value |= (byte as u64) << (i * 8);
    }
    value
}

/// Reads a two's-complement little-endian integer, sign-extended from
/// the top bit of the last byte: an LCN delta can be negative when a
/// run moves to an earlier cluster than the previous one.
fn read_signed(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }
    let mut value = 0i64;
    for (i, &byte) in bytes.iter().enumerate() {
        value |= (byte as i64) << (i * 8);
    }
    let bits = bytes.len() * 8;
    if bits < 64 && (value & (1 << (bits - 1))) != 0 {
        value |= !((1i64 << bits) - 1);
    }
    value
}

/// Reads each non-sparse extent from `reader` and concatenates them with
/// sparse extents zero-filled, then truncates to `real_size`.
pub fn materialize<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    runs: &[DataRun],
    bytes_per_cluster: u32,
    real_size: u64,
) -> Result<Vec<u8>, NtfsError> {
    let mut out = Vec::new();
    for run in runs {
        let len = run.length as usize * bytes_per_cluster as usize;
        match run.lcn {
            Some(lcn) => {
                let bytes = reader.read_at(lcn * bytes_per_cluster as u64, len)?;
                out.extend_from_slice(&bytes);
            }
            None => out.resize(out.len() + len, 0),
        }
    }
    out.truncate(real_size as usize);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn decode_simple_run() {
        let data = vec![0x21, 0x10, 0x64, 0x00, 0x00];
        let runs = decode_data_runs(&data, 0);
        assert_eq!(runs, vec![DataRun { lcn: Some(100), length: 16 }]);
    }

    #[test]
    fn decode_multiple_runs() {
        let data = vec![0x21, 0x0A, 0x64, 0x00, 0x21, 0x14, 0x64, 0x00, 0x00];
        let runs = decode_data_runs(&data, 0);
        assert_eq!(
            runs,
            vec![
                DataRun { lcn: Some(100), length: 10 },
                DataRun { lcn: Some(200), length: 20 },
            ]
        );
    }

    #[test]
    fn decode_sparse_run() {
        let data = vec![0x01, 0x20, 0x00];
        let runs = decode_data_runs(&data, 0);
        assert_eq!(runs, vec![DataRun { lcn: None, length: 32 }]);
    }

    #[test]
    fn decode_negative_offset() {
        // First run at LCN 1000, second at LCN 900 (delta -100).
        let data = vec![
            0x22, 0x0A, 0x00, 0xE8, 0x03, // 10 clusters at LCN 1000
            0x11, 0x05, 0x9C, // 5 clusters at LCN 1000 + (-100) = 900
            0x00,
        ];
        let runs = decode_data_runs(&data, 0);
        assert_eq!(
            runs,
            vec![
                DataRun { lcn: Some(1000), length: 10 },
                DataRun { lcn: Some(900), length: 5 },
            ]
        );
    }

    #[test]
    fn decode_stops_at_truncated_operand() {
        let data = vec![0x21, 0x10]; // claims 1-byte length + 2-byte offset, only 1 byte follows
        let runs = decode_data_runs(&data, 0);
        assert!(runs.is_empty());
    }

    #[test]
    fn materialize_concatenates_and_zero_fills_sparse() {
        let mut volume = vec![0xAAu8; 4096];
        volume[0..4].copy_from_slice(b"DATA");
        let mut reader = ByteReader::new(Cursor::new(volume));

        let runs = vec![
            DataRun { lcn: Some(0), length: 1 }, // cluster 0, 4096 bytes starting "DATA"
            DataRun { lcn: None, length: 1 },    // sparse: 4096 zero bytes
        ];

        let bytes = materialize(&mut reader, &runs, 4096, 8192).unwrap();
        assert_eq!(bytes.len(), 8192);
        assert_eq!(&bytes[0..4], b"DATA");
        assert!(bytes[4096..].iter().all(|&b| b == 0));
    }

    #[test]
    fn materialize_truncates_to_real_size() {
        let volume = vec![0x42u8; 4096];
        let mut reader = ByteReader::new(Cursor::new(volume));
        let runs = vec![DataRun { lcn: Some(0), length: 1 }];
        let bytes = materialize(&mut reader, &runs, 4096, 10).unwrap();
        assert_eq!(bytes.len(), 10);
        assert!(bytes.iter().all(|&b| b == 0x42));
    }
}
