
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors from rewriting a .bim variant table
#[derive(thiserror::Error, Debug)]
pub enum BimError {
    /// the file was missing or unreadable
    #[error("I/O error on \"{}\": {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error
    },
    /// the file was readable but a row did not parse as a .bim record
    #[error("malformed .bim record in \"{}\": {}", .path.display(), .message)]
    Malformed {
        path: PathBuf,
        message: String
    }
}

/// A single row of a PLINK .bim variant table (tab-delimited, no header).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct BimRecord {
    /// chromosome code
    pub chromosome: String,
    /// variant identifier; the dosage conversion emits `chrom:pos:ref:alt` composites here
    pub variant_id: String,
    /// position in centimorgans, kept verbatim
    pub centimorgans: String,
    /// base-pair coordinate
    pub position: u64,
    /// first allele
    pub allele1: String,
    /// second allele
    pub allele2: String
}

/// Trims a composite `chrom:pos:ref:alt` identifier down to `chrom:pos`.
/// Identifiers with fewer than two colon-separated fields are left untouched.
pub fn trim_variant_id(variant_id: &str) -> String {
    let mut parts = variant_id.split(':');
    match (parts.next(), parts.next()) {
        (Some(chromosome), Some(position)) => format!("{chromosome}:{position}"),
        _ => variant_id.to_string()
    }
}

/// Sorts a csv-layer error into the I/O and malformed-record buckets.
fn classify_error(path: &Path, error: csv::Error) -> BimError {
    let message: String = error.to_string();
    match error.into_kind() {
        csv::ErrorKind::Io(source) => BimError::Io {
            path: path.to_path_buf(),
            source
        },
        _ => BimError::Malformed {
            path: path.to_path_buf(),
            message
        }
    }
}

/// Rewrites a .bim file in place, splitting the allele labels out of each composite
/// variant identifier so only `chrom:pos` remains. Returns the number of records rewritten.
/// # Arguments
/// * `bim_path` - the .bim file to rewrite
/// # Errors
/// * if the file is missing, unreadable, or holds rows that are not .bim records
pub fn rewrite_variant_ids(bim_path: &Path) -> Result<usize, BimError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(bim_path)
        .map_err(|e| classify_error(bim_path, e))?;

    let mut records: Vec<BimRecord> = vec![];
    for row in reader.deserialize() {
        let mut record: BimRecord = row.map_err(|e| classify_error(bim_path, e))?;
        record.variant_id = trim_variant_id(&record.variant_id);
        records.push(record);
    }
    // close the reader before truncating the same file for the rewrite
    drop(reader);

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(bim_path)
        .map_err(|e| classify_error(bim_path, e))?;
    for record in records.iter() {
        writer.serialize(record).map_err(|e| classify_error(bim_path, e))?;
    }
    writer.flush().map_err(|e| BimError::Io {
        path: bim_path.to_path_buf(),
        source: e
    })?;

    Ok(records.len())
}
