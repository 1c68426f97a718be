use anyhow::{anyhow, Context};
use chrono::Utc;
use serde_json::json;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::persist::digest;
use crate::store::{Collection, CollectionData, Collections};

const MANIFEST_ENTRY: &str = "manifest.json";
pub const BUNDLE_FORMAT_V1: &str = "iesportal-backup-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub users: usize,
    pub grades: usize,
    pub attendance: usize,
    pub messages: usize,
}

fn entry_name(c: Collection) -> String {
    format!("data/{}.json", c.key())
}

pub fn export_bundle(data: &Collections, out_path: &Path) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut digests = serde_json::Map::new();
    let mut payloads = Vec::new();
    for c in Collection::ALL {
        let value = data
            .to_json(c)
            .with_context(|| format!("failed to serialize {}", c.key()))?;
        digests.insert(c.key().to_string(), json!(digest(&value)));
        payloads.push((c, value));
    }

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": Utc::now().to_rfc3339(),
        "sha256": digests,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for (c, value) in &payloads {
        zip.start_file(entry_name(*c), opts)
            .with_context(|| format!("failed to start {} entry", c.key()))?;
        zip.write_all(value.as_bytes())
            .with_context(|| format!("failed to write {} entry", c.key()))?;
    }

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 1 + payloads.len(),
    })
}

/// Read a bundle back into collections. Nothing is applied here; a bundle
/// that fails any check is rejected as a whole.
pub fn import_bundle(in_path: &Path) -> anyhow::Result<(Collections, ImportSummary)> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut data = Collections::default();
    for c in Collection::ALL {
        let name = entry_name(c);
        let mut value = String::new();
        archive
            .by_name(&name)
            .with_context(|| format!("bundle missing {}", name))?
            .read_to_string(&mut value)
            .with_context(|| format!("failed to read {}", name))?;

        let expected = manifest
            .get("sha256")
            .and_then(|d| d.get(c.key()))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        if expected != digest(&value) {
            return Err(anyhow!("checksum mismatch for {}", name));
        }
        let parsed = CollectionData::parse(c, &value)
            .with_context(|| format!("{} is not a valid {} collection", name, c.key()))?;
        data.replace(parsed);
    }

    let summary = ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        users: data.users.len(),
        grades: data.grades.len(),
        attendance: data.attendance.len(),
        messages: data.messages.len(),
    };
    Ok((data, summary))
}
