
use crate::bim;
use crate::cli::Settings;
use crate::commands;
use crate::commands::{CHROMOSOMES, DOSAGE_CERTAINTY, RENAME_MAP_FILENAME};
use crate::run_log::RunLog;
use crate::snplist;

use log::warn;
use simple_error::bail;
use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use threadpool::ThreadPool;

/// Runs the full pipeline: Convert -> Split -> Dedup/Rename, then Cleanup unless
/// TEMPORARY files are kept. There is no rollback; the first stage error aborts the run
/// and whatever artifacts exist at that point stay on disk.
/// # Arguments
/// * `settings` - the checked CLI settings
/// * `log` - the shared run log
/// # Errors
/// * if any stage fails; external command failures are logged but do not count as stage failures
pub fn run_pipeline(settings: &Settings, log: &Arc<RunLog>) -> Result<(), Box<dyn std::error::Error>> {
    if !settings.post_imput_dir.is_dir() {
        bail!("Post-imputation directory does not exist: \"{}\"", settings.post_imput_dir.display());
    }

    convert_dosage_vcfs(settings, log);
    split_allele_labels(settings, log)?;
    remove_duplicates_and_rename(settings, log)?;

    if settings.keep_temp {
        log.log("Keeping TEMPORARY files");
    } else {
        remove_temporary_files(settings, log)?;
    }
    Ok(())
}

/// Converts each per-chromosome dosage VCF into a TEMPORARY PLINK fileset.
/// Conversion failures are warnings only; a chromosome that fails here surfaces
/// in the split stage when its .bim file is missing.
fn convert_dosage_vcfs(settings: &Settings, log: &RunLog) {
    log.log(&format!("Converting dosage VCFs to PLINK filesets using best guess (certainty > {DOSAGE_CERTAINTY})"));
    for chromosome in CHROMOSOMES {
        let command = commands::best_guess_conversion(&settings.plink2, &settings.post_imput_dir, chromosome);
        match commands::run_command(log, command, None) {
            Ok(status) if !status.success() => {
                warn!("plink2 conversion for chromosome {chromosome} exited with {status}");
            },
            Ok(_) => {},
            Err(e) => {
                warn!("Failed to launch plink2 conversion for chromosome {chromosome}: {e}");
            }
        };
    }
}

/// Strips the allele labels out of the composite variant identifiers in every
/// TEMPORARY .bim file. A missing .bim is a hard error.
fn split_allele_labels(settings: &Settings, log: &RunLog) -> Result<(), Box<dyn std::error::Error>> {
    log.log("Splitting allele labels from the coordinate identifiers in .bim files");
    for chromosome in CHROMOSOMES {
        log.log(&format!("Processing chromosome {chromosome}"));
        let bim_path: PathBuf = commands::with_suffix(
            &commands::temporary_prefix(&settings.post_imput_dir, chromosome),
            ".bim"
        );
        let num_variants = bim::rewrite_variant_ids(&bim_path)?;
        log.log(&format!("Rewrote {} variant identifiers in {}", num_variants, bim_path.display()));
    }
    Ok(())
}

/// For each chromosome: inventory the variant identifiers, compute duplicates in-process,
/// re-derive a duplicate-free fileset, and rename identifiers to RSIDs. The rename commands
/// run on a worker pool; the channel drain below is the join barrier, so every rename has
/// finished before the driver moves on to cleanup.
fn remove_duplicates_and_rename(settings: &Settings, log: &Arc<RunLog>) -> Result<(), Box<dyn std::error::Error>> {
    log.log("Removing duplicate variants and renaming identifiers to RSIDs");
    let rename_map: PathBuf = settings.snp_dir.join(RENAME_MAP_FILENAME);

    let pool = ThreadPool::new(settings.threads);
    let (tx, rx) = mpsc::channel();
    let mut jobs_queued: usize = 0;

    for chromosome in CHROMOSOMES {
        let temporary_prefix = commands::temporary_prefix(&settings.post_imput_dir, chromosome);
        log.log(&format!("Processing {}", temporary_prefix.display()));

        // full variant inventory for this chromosome
        let allsnps_prefix = commands::with_suffix(&temporary_prefix, "_allsnps");
        let snplist_command = commands::write_snplist(&settings.plink2, &temporary_prefix, &allsnps_prefix);
        match commands::run_command(log, snplist_command, None) {
            Ok(status) if !status.success() => {
                warn!("plink2 --write-snplist for chromosome {chromosome} exited with {status}");
            },
            Ok(_) => {},
            Err(e) => {
                warn!("Failed to launch plink2 --write-snplist for chromosome {chromosome}: {e}");
            }
        };

        let snplist_path = commands::with_suffix(&allsnps_prefix, ".snplist");
        let duplicate_path = commands::with_suffix(&temporary_prefix, "_duplicatedsnps.snplist");
        let num_duplicates = match snplist::write_duplicate_ids(&snplist_path, &duplicate_path) {
            Ok(n) => n,
            Err(e) => {
                bail!("Error while scanning {} for duplicates: {}", snplist_path.display(), e);
            }
        };
        log.log(&format!("Found {num_duplicates} duplicated variant identifiers for chromosome {chromosome}"));

        let nodup_prefix = commands::with_suffix(&temporary_prefix, "_NoDuplicates");
        let exclude_command = commands::exclude_duplicates(&settings.plink2, &temporary_prefix, &duplicate_path, &nodup_prefix);
        match commands::run_command(log, exclude_command, None) {
            Ok(status) if !status.success() => {
                warn!("plink2 --exclude for chromosome {chromosome} exited with {status}");
            },
            Ok(_) => {},
            Err(e) => {
                warn!("Failed to launch plink2 --exclude for chromosome {chromosome}: {e}");
            }
        };

        // final rename, dispatched to the pool
        let rename_command = commands::update_names(
            &settings.plink2,
            &nodup_prefix,
            &rename_map,
            &commands::rsid_prefix(&settings.post_imput_dir, chromosome)
        );
        let tx = tx.clone();
        let pool_log = log.clone();
        pool.execute(move || {
            let result = commands::run_command(&pool_log, rename_command, None);
            tx.send((chromosome, result)).expect("channel will be there waiting for the pool");
        });
        jobs_queued += 1;
    }
    drop(tx);

    for (chromosome, result) in rx.iter().take(jobs_queued) {
        match result {
            Ok(status) if !status.success() => {
                warn!("plink2 rename for chromosome {chromosome} exited with {status}");
            },
            Ok(_) => {},
            Err(e) => {
                warn!("Failed to launch plink2 rename for chromosome {chromosome}: {e}");
            }
        };
    }
    pool.join();
    Ok(())
}

/// Deletes every TEMPORARY artifact in the output directory except the .log files,
/// which are retained for post-mortems.
fn remove_temporary_files(settings: &Settings, log: &RunLog) -> Result<(), Box<dyn std::error::Error>> {
    log.log("Removing TEMPORARY files");
    for entry in std::fs::read_dir(&settings.post_imput_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if file_name.contains("TEMPORARY") && !file_name.ends_with(".log") {
            log.log(&format!("Removing {}", entry.path().display()));
            std::fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
