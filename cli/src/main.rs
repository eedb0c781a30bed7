use std::fs::{self, File};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{error, info, warn};

use ntfsalvage_core::attribute::AttributeValue;
use ntfsalvage_core::boot_sector::{self, BootSector, VolumeFormat, CLONED_IMAGE_PREFIX_LEN};
use ntfsalvage_core::byte_reader::ByteReader;
use ntfsalvage_core::error::NtfsError;
use ntfsalvage_core::record::Record;
use ntfsalvage_core::{mft, path as path_reconstructor, record_stream};

/// Recovers files from a raw NTFS volume without OS driver support.
#[derive(Parser)]
#[command(name = "ntfsalvage")]
#[command(about = "Recovers files from a raw NTFS volume by parsing the MFT directly", long_about = None)]
struct Cli {
    /// Path to the partition or image to recover from
    disk: PathBuf,

    /// Override the boot sector's bytes_per_sector
    #[arg(long)]
    sector_size: Option<u16>,

    /// Override the boot sector's sectors_per_cluster
    #[arg(long)]
    cluster_size: Option<u8>,

    /// Skip on-disk MFT bootstrap; use this file's content as the MFT
    #[arg(long)]
    mft: Option<PathBuf>,

    /// Write the materialized MFT to this file
    #[arg(long)]
    save_mft: Option<PathBuf>,

    /// Glob pattern to match against basename and full path (repeatable).
    /// Without any pattern, the tool only lists what it finds.
    #[arg(short = 'p', long = "pattern")]
    pattern: Vec<String>,

    /// Output root; created if absent. Required when --pattern is given.
    #[arg(short = 'o', long = "outdir")]
    outdir: Option<PathBuf>,
}

const ORPHAN_DIR: &str = "__ORPHANED__";

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if !cli.pattern.is_empty() && cli.outdir.is_none() {
        error!("-p/--pattern requires -o/--outdir");
        std::process::exit(2);
    }

    match run(&cli) {
        Ok(()) => {}
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut reader = open_volume(&cli.disk)?;

    let boot_bytes = reader.read_at(0, 512)?;
    let mut boot = BootSector::parse(&boot_bytes)?;
    if let Some(sector_size) = cli.sector_size {
        info!("overriding bytes_per_sector: {sector_size}");
        boot.bytes_per_sector = sector_size;
    }
    if let Some(cluster_size) = cli.cluster_size {
        info!("overriding sectors_per_cluster: {cluster_size}");
        boot.sectors_per_cluster = cluster_size;
    }
    boot.record_size()?;

    let mft_bytes = if let Some(mft_path) = &cli.mft {
        info!("[*] using {} as the MFT, skipping on-disk bootstrap", mft_path.display());
        fs::read(mft_path)?
    } else {
        mft::load_mft(&mut reader, &boot)?
    };

    if let Some(save_path) = &cli.save_mft {
        fs::write(save_path, &mft_bytes)?;
        info!("[+] saved $MFT to {}", save_path.display());
    }

    let records = record_stream::parse_record_stream(&mft_bytes);
    info!("[*] parsed {} MFT records", records.len());

    let patterns = cli
        .pattern
        .iter()
        .map(|p| glob::Pattern::new(&p.to_lowercase()))
        .collect::<Result<Vec<_>, _>>()?;

    let bytes_per_cluster = boot.bytes_per_cluster();
    let mut recovered = 0usize;

    for (index, slot) in records.iter().enumerate() {
        let Some(record) = slot else { continue };
        let Some(basename) = primary_basename(record) else {
            continue;
        };

        let full_path = match path_reconstructor::reconstruct_path(&records, index as u64) {
            Ok(components) => path_reconstructor::join_path(&components),
            Err(err) => {
                warn!("[!] record {index}: {err}, placing under {ORPHAN_DIR}/");
                format!("{ORPHAN_DIR}/{basename}")
            }
        };

        let ads_names: Vec<&str> = record
            .attributes_of_kind("DATA")
            .filter_map(|a| a.name.as_deref())
            .collect();

        if patterns.is_empty() {
            if ads_names.is_empty() {
                println!("{full_path}");
            } else {
                let markers: Vec<String> = ads_names.iter().map(|n| format!("ADS:{n}")).collect();
                println!("{full_path} {}", markers.join(" "));
            }
            continue;
        }

        let basename_lower = basename.to_lowercase();
        let path_lower = full_path.to_lowercase();
        let matched = patterns
            .iter()
            .any(|p| p.matches(&basename_lower) || p.matches(&path_lower));
        if !matched {
            continue;
        }

        let outdir = cli.outdir.as_ref().expect("validated at startup");
        let dest = to_local_path(outdir, &full_path);

        if let Some(data) = record.attribute("DATA", None) {
            match write_stream(&dest, &data.value, &mut reader, bytes_per_cluster) {
                Ok(written) => {
                    info!("[+] recovered {}", written.display());
                    recovered += 1;
                }
                Err(err) => warn!("[!] failed to recover {}: {err}", dest.display()),
            }
        }

        for ads in &ads_names {
            let ads_attr = record.attribute("DATA", Some(ads)).expect("name came from this record");
            let ads_dest = append_to_file_name(&dest, &format!("~{ads}"));
            match write_stream(&ads_dest, &ads_attr.value, &mut reader, bytes_per_cluster) {
                Ok(written) => info!("[+] recovered {}", written.display()),
                Err(err) => warn!("[!] failed to recover {}: {err}", ads_dest.display()),
            }
        }
    }

    if !patterns.is_empty() {
        info!("[*] recovered {recovered} file(s)");
    }

    Ok(())
}

fn primary_basename(record: &Record) -> Option<String> {
    let attr = record.attribute("FILE_NAME", None)?;
    match &attr.value {
        AttributeValue::Resident(bytes) => ntfsalvage_core::attribute::decode_file_name(bytes)
            .ok()
            .map(|fna| fna.name),
        AttributeValue::NonResident { .. } => None,
    }
}

/// Opens the volume at `path`, transparently stripping the
/// `0x102000`-byte wrapper prefix and re-emitting a sibling
/// `_modified.img` file when a cloned image is detected.
fn open_volume(path: &Path) -> Result<ByteReader<File>, NtfsError> {
    let mut reader = ByteReader::new(File::open(path)?);
    match boot_sector::detect_format(&mut reader)? {
        VolumeFormat::Direct => Ok(reader),
        VolumeFormat::ClonedImage => {
            let total_len = fs::metadata(path)?.len();
            let remaining = (total_len - CLONED_IMAGE_PREFIX_LEN) as usize;
            let stripped = reader.read_at(CLONED_IMAGE_PREFIX_LEN, remaining)?;

            let modified_path = modified_image_path(path);
            fs::write(&modified_path, &stripped)?;
            info!(
                "[*] cloned image detected; wrote stripped copy to {}",
                modified_path.display()
            );

            Ok(ByteReader::new(File::open(&modified_path)?))
        }
    }
}

fn modified_image_path(path: &Path) -> PathBuf {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("volume.img");
    let new_name = match name.strip_suffix(".img") {
        Some(stem) => format!("{stem}_modified.img"),
        None => format!("{name}_modified.img"),
    };
    path.with_file_name(new_name)
}

/// Maps a forward-slash-joined recovered path onto the host filesystem.
fn to_local_path(outdir: &Path, full_path: &str) -> PathBuf {
    let mut dest = outdir.to_path_buf();
    for part in full_path.split('/') {
        dest.push(part);
    }
    dest
}

fn append_to_file_name(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().and_then(|n| n.to_str()).unwrap_or("file").to_string();
    name.push_str(suffix);
    path.with_file_name(name)
}

/// Finds a free destination, appending `_0000`, `_0001`, ... on collision.
fn unique_destination(dest: &Path) -> Result<PathBuf, NtfsError> {
    if !dest.exists() {
        return Ok(dest.to_path_buf());
    }
    for n in 0..10_000u32 {
        let candidate = append_to_file_name(dest, &format!("_{n:04}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(NtfsError::OutputCollision(dest.display().to_string()))
}

fn write_stream(
    dest: &Path,
    value: &AttributeValue,
    reader: &mut ByteReader<File>,
    bytes_per_cluster: u32,
) -> anyhow::Result<PathBuf> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let unique = unique_destination(dest)?;
    let bytes = value.materialize(reader, bytes_per_cluster)?;
    fs::write(&unique, &bytes)?;
    Ok(unique)
}
