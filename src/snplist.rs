
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Scans a plink2 snplist (one variant identifier per line) and writes every identifier
/// that appears more than once to a duplicate list, one per line in sorted order.
/// Each duplicated identifier is written exactly once, regardless of how often it repeats.
/// Returns the number of duplicated identifiers.
/// # Arguments
/// * `snplist_path` - the `_allsnps.snplist` inventory to scan
/// * `duplicate_path` - the `_duplicatedsnps.snplist` output
/// # Errors
/// * if the snplist is missing or either file is unreadable/unwritable
pub fn write_duplicate_ids(snplist_path: &Path, duplicate_path: &Path) -> std::io::Result<usize> {
    let contents: String = std::fs::read_to_string(snplist_path)?;

    // BTreeMap keeps the output sorted, matching the old sort|uniq -d plumbing
    let mut id_counts: BTreeMap<&str, u64> = BTreeMap::new();
    for line in contents.lines() {
        if line.is_empty() {
            continue;
        }
        *id_counts.entry(line).or_insert(0) += 1;
    }

    let mut writer = BufWriter::new(File::create(duplicate_path)?);
    let mut num_duplicates: usize = 0;
    for (variant_id, count) in id_counts.iter() {
        if *count > 1 {
            writeln!(writer, "{variant_id}")?;
            num_duplicates += 1;
        }
    }
    writer.flush()?;
    Ok(num_duplicates)
}
