use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::record::ListingRecord;

/// File set one harvest run produces, sharing a single timestamp stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
    pub html: PathBuf,
}

/// Sibling artifact paths for one run. Purely path math; nothing is created.
pub fn artifact_paths(dir: &Path, stamp: &str) -> ExportPaths {
    let file = |ext: &str| dir.join(format!("listing_products_{}.{}", stamp, ext));
    ExportPaths {
        csv: file("csv"),
        json: file("json"),
        html: file("html"),
    }
}

const CSV_HEADER: [&str; 5] = ["thumbnail", "seller", "title", "price", "shipping_fee"];

pub fn write_csv(path: &Path, records: &[ListingRecord]) -> crate::Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.write_record([
            record.thumbnail_url.as_str(),
            record.seller.as_str(),
            record.title.as_str(),
            record.price.as_str(),
            record.shipping_fee.as_str(),
        ])?;
    }
    writer.flush()?;
    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Full records including match annotations, pretty-printed for diffing.
pub fn write_json(path: &Path, records: &[ListingRecord]) -> crate::Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json)?;
    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

pub fn write_html(path: &Path, html: &str) -> crate::Result<()> {
    ensure_parent(path)?;
    fs::write(path, html)?;
    info!("Wrote report to {}", path.display());
    Ok(())
}

fn ensure_parent(path: &Path) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
