//! Slices the materialized MFT image into 1024-byte windows and parses
//! each, producing a dense, index-stable sequence where invalid or
//! corrupt records are `None`.

use log::warn;

use crate::record::{self, Record, RECORD_SIZE};

pub fn parse_record_stream(mft: &[u8]) -> Vec<Option<Record>> {
    let mut records = Vec::with_capacity(mft.len() / RECORD_SIZE);

    for (index, window) in mft.chunks(RECORD_SIZE).enumerate() {
        if window.len() < RECORD_SIZE || &window[0..4] != record::MAGIC {
            records.push(None);
            continue;
        }
        match record::parse_record(window, (index * RECORD_SIZE) as u64) {
            Ok(rec) => records.push(Some(rec)),
            Err(err) => {
                warn!("record {} at offset {}: {}", index, index * RECORD_SIZE, err);
                records.push(None);
            }
        }
    }

    records
}
