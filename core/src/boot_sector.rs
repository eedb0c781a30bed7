//! Boot sector decoding: volume geometry and the cloned-image format
//! detection rule.

use std::io::{Read, Seek};

use byteorder::{ByteOrder, LittleEndian};
use log::debug;

use crate::byte_reader::ByteReader;
use crate::error::NtfsError;

const NTFS_OEM_ID: &[u8; 8] = b"NTFS    ";
const OEM_ID_OFFSET: u64 = 0x03;
/// Offset of the OEM ID inside a "cloned image": a fixed pre-partition
/// wrapper of this many bytes precedes the real NTFS volume.
pub const CLONED_IMAGE_OEM_OFFSET: u64 = 0x102003;
/// Number of leading bytes to strip when a cloned image is detected.
pub const CLONED_IMAGE_PREFIX_LEN: u64 = 0x102000;

/// NTFS volume geometry extracted from the boot sector.
#[derive(Debug, Clone, Copy)]
pub struct BootSector {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub mft_cluster: u64,
    pub mft_mirror_cluster: u64,
    pub clusters_per_record: i8,
}

impl BootSector {
    pub fn bytes_per_cluster(&self) -> u32 {
        self.bytes_per_sector as u32 * self.sectors_per_cluster as u32
    }

    /// Resolves `clusters_per_record` to a byte size and rejects anything
    /// but the standard 1024-byte record; non-default record sizes are
    /// unsupported.
    pub fn record_size(&self) -> Result<u32, NtfsError> {
        let size = if self.clusters_per_record < 0 {
            1u32 << (-(self.clusters_per_record as i32))
        } else {
            self.clusters_per_record as u32 * self.bytes_per_cluster()
        };
        if size != 1024 {
            return Err(NtfsError::UnsupportedRecordSize(self.clusters_per_record));
        }
        Ok(size)
    }

    /// Parses geometry out of a decoded boot sector. `sector` must be at
    /// least 512 bytes, already positioned at the start of the real NTFS
    /// volume (i.e. past any cloned-image prefix).
    pub fn parse(sector: &[u8]) -> Result<Self, NtfsError> {
        if sector.len() < 0x48 || &sector[0x03..0x0B] != NTFS_OEM_ID {
            return Err(NtfsError::NotAnNtfsVolume);
        }

        let bytes_per_sector = LittleEndian::read_u16(&sector[0x0B..0x0D]);
        let sectors_per_cluster = sector[0x0D];
        let mft_cluster = LittleEndian::read_u64(&sector[0x30..0x38]);
        let mft_mirror_cluster = LittleEndian::read_u64(&sector[0x38..0x40]);
        let clusters_per_record = sector[0x40] as i8;

        debug!(
            "boot sector: bytes_per_sector={} sectors_per_cluster={} mft_cluster={} mft_mirror_cluster={} clusters_per_record={}",
            bytes_per_sector, sectors_per_cluster, mft_cluster, mft_mirror_cluster, clusters_per_record
        );

        Ok(Self {
            bytes_per_sector,
            sectors_per_cluster,
            mft_cluster,
            mft_mirror_cluster,
            clusters_per_record,
        })
    }
}

/// Result of probing a volume for the NTFS signature.
pub enum VolumeFormat {
    /// A direct NTFS partition; the reader is already positioned correctly.
    Direct,
    /// A "cloned image": strip `CLONED_IMAGE_PREFIX_LEN` bytes and re-open.
    ClonedImage,
}

/// Probes offsets 0x03 and 0x102003 for the NTFS OEM ID.
pub fn detect_format<R: Read + Seek>(
    reader: &mut ByteReader<R>,
) -> Result<VolumeFormat, NtfsError> {
    if reader.read_at(OEM_ID_OFFSET, 8)?.as_slice() == NTFS_OEM_ID {
        return Ok(VolumeFormat::Direct);
    }
    if reader.read_at(CLONED_IMAGE_OEM_OFFSET, 8)?.as_slice() == NTFS_OEM_ID {
        return Ok(VolumeFormat::ClonedImage);
    }
    Err(NtfsError::NotAnNtfsVolume)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_boot_sector() -> Vec<u8> {
        let mut s = vec![0u8; 512];
        s[0..3].copy_from_slice(&[0xEB, 0x52, 0x90]);
        s[0x03..0x0B].copy_from_slice(NTFS_OEM_ID);
        LittleEndian::write_u16(&mut s[0x0B..0x0D], 512);
        s[0x0D] = 8;
        LittleEndian::write_u64(&mut s[0x30..0x38], 4);
        LittleEndian::write_u64(&mut s[0x38..0x40], 1000);
        s[0x40] = 0xF6; // -10 -> 2^10 = 1024
        s
    }

    #[test]
    fn parses_geometry() {
        let boot = BootSector::parse(&minimal_boot_sector()).unwrap();
        assert_eq!(boot.bytes_per_sector, 512);
        assert_eq!(boot.sectors_per_cluster, 8);
        assert_eq!(boot.bytes_per_cluster(), 4096);
        assert_eq!(boot.mft_cluster, 4);
        assert_eq!(boot.mft_mirror_cluster, 1000);
        assert_eq!(boot.record_size().unwrap(), 1024);
    }

    #[test]
    fn rejects_missing_signature() {
        let sector = vec![0u8; 512];
        assert!(matches!(
            BootSector::parse(&sector),
            Err(NtfsError::NotAnNtfsVolume)
        ));
    }

    #[test]
    fn rejects_non_standard_record_size() {
        let mut s = minimal_boot_sector();
        s[0x40] = 2; // positive -> 2 * bytes_per_cluster(4096) = 8192
        let boot = BootSector::parse(&s).unwrap();
        assert!(matches!(
            boot.record_size(),
            Err(NtfsError::UnsupportedRecordSize(2))
        ));
    }

    #[test]
    fn positive_clusters_per_record_uses_cluster_multiple() {
        let mut s = minimal_boot_sector();
        LittleEndian::write_u16(&mut s[0x0B..0x0D], 512);
        s[0x0D] = 2; // bytes_per_cluster = 1024
        s[0x40] = 1; // 1 * 1024 = 1024
        let boot = BootSector::parse(&s).unwrap();
        assert_eq!(boot.record_size().unwrap(), 1024);
    }

    #[test]
    fn detect_format_direct() {
        use std::io::Cursor;
        let mut s = minimal_boot_sector();
        s.resize(CLONED_IMAGE_OEM_OFFSET as usize + 8, 0);
        let mut reader = ByteReader::new(Cursor::new(s));
        assert!(matches!(detect_format(&mut reader), Ok(VolumeFormat::Direct)));
    }

    #[test]
    fn detect_format_cloned() {
        use std::io::Cursor;
        let mut wrapper = vec![0u8; CLONED_IMAGE_OEM_OFFSET as usize + 8];
        wrapper[CLONED_IMAGE_OEM_OFFSET as usize..CLONED_IMAGE_OEM_OFFSET as usize + 8]
            .copy_from_slice(NTFS_OEM_ID);
        let mut reader = ByteReader::new(Cursor::new(wrapper));
        assert!(matches!(
            detect_format(&mut reader),
            Ok(VolumeFormat::ClonedImage)
        ));
    }

    #[test]
    fn detect_format_rejects_neither() {
        use std::io::Cursor;
        let data = vec![0u8; CLONED_IMAGE_OEM_OFFSET as usize + 8];
        let mut reader = ByteReader::new(Cursor::new(data));
        assert!(matches!(
            detect_format(&mut reader),
            Err(NtfsError::NotAnNtfsVolume)
        ));
    }
}
