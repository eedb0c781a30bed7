pub mod attribute;
pub mod boot_sector;
pub mod byte_reader;
pub mod error;
pub mod mft;
pub mod path;
pub mod record;
pub mod record_stream;
pub mod runlist;

pub use attribute::{Attribute, AttributeValue, FileNameAttr};
pub use boot_sector::{BootSector, VolumeFormat};
pub use byte_reader::ByteReader;
pub use error::NtfsError;
pub use path::MAX_DEPTH;
pub use record::Record;
pub use runlist::DataRun;
