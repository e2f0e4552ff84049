
use crate::run_log::{RunLog, format_elapsed, timestamp};

use log::warn;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{Duration, Instant};

/// Chromosome labels covered by the pipeline; 23 is the X chromosome.
pub const CHROMOSOMES: RangeInclusive<u8> = 1..=23;

/// Dosage-certainty threshold for the best-guess hard-call conversion.
pub const DOSAGE_CERTAINTY: &str = "0.9";

/// File name of the chromosome:position to RSID rename mapping inside the SNP directory.
pub const RENAME_MAP_FILENAME: &str = "AllChr_Sorted_Tabdelim.txt";

/// Returns the expected dosage VCF path for a chromosome.
/// The imputation server labels the sex chromosome `chrX`, not `chr23`.
pub fn dose_vcf_path(post_imput_dir: &Path, chromosome: u8) -> PathBuf {
    if chromosome == 23 {
        post_imput_dir.join("chrX.dose.vcf.gz")
    } else {
        post_imput_dir.join(format!("chr{chromosome}.dose.vcf.gz"))
    }
}

/// Returns the TEMPORARY fileset prefix for a chromosome.
pub fn temporary_prefix(post_imput_dir: &Path, chromosome: u8) -> PathBuf {
    post_imput_dir.join(format!("chr{chromosome}_imputed_plink_TEMPORARY"))
}

/// Returns the final RSID fileset prefix for a chromosome.
pub fn rsid_prefix(post_imput_dir: &Path, chromosome: u8) -> PathBuf {
    post_imput_dir.join(format!("chr{chromosome}_imputed_plink_RSID"))
}

/// Appends a raw suffix to a fileset prefix without treating it as an extension,
/// e.g. `chr1_imputed_plink_TEMPORARY` + `.bim` or `_allsnps`.
pub fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut extension_path = prefix.to_owned()
        .into_os_string();
    extension_path.push(suffix);
    PathBuf::from(extension_path)
}

/// Builds the best-guess dosage-to-PLINK conversion command for one chromosome.
/// # Arguments
/// * `plink2` - path to the plink2 executable
/// * `post_imput_dir` - directory holding the dosage VCFs, also receives the outputs
/// * `chromosome` - chromosome label, 1-23
pub fn best_guess_conversion(plink2: &Path, post_imput_dir: &Path, chromosome: u8) -> Command {
    let mut command = Command::new(plink2);
    command.arg("--vcf").arg(dose_vcf_path(post_imput_dir, chromosome))
        .arg("--double-id")
        .arg("--import-dosage-certainty").arg(DOSAGE_CERTAINTY)
        .arg("--make-bed")
        .arg("--recode")
        .arg("--out").arg(temporary_prefix(post_imput_dir, chromosome));
    command
}

/// Builds the command that extracts the full variant-identifier list from a fileset.
pub fn write_snplist(plink2: &Path, bfile_prefix: &Path, out_prefix: &Path) -> Command {
    let mut command = Command::new(plink2);
    command.arg("--bfile").arg(bfile_prefix)
        .arg("--write-snplist")
        .arg("--out").arg(out_prefix);
    command
}

/// Builds the command that re-derives a fileset excluding the listed duplicate identifiers.
pub fn exclude_duplicates(plink2: &Path, bfile_prefix: &Path, duplicate_list: &Path, out_prefix: &Path) -> Command {
    let mut command = Command::new(plink2);
    command.arg("--bfile").arg(bfile_prefix)
        .arg("--exclude").arg(duplicate_list)
        .arg("--make-bed")
        .arg("--out").arg(out_prefix);
    command
}

/// Builds the command that renames variant identifiers to reference RSIDs.
pub fn update_names(plink2: &Path, bfile_prefix: &Path, rename_map: &Path, out_prefix: &Path) -> Command {
    let mut command = Command::new(plink2);
    command.arg("--bfile").arg(bfile_prefix)
        .arg("--update-name").arg(rename_map)
        .arg("--make-bed")
        .arg("--out").arg(out_prefix);
    command
}

/// Renders a command as a single line for the run log.
fn render_command(command: &Command) -> String {
    let mut rendered: String = command.get_program().to_string_lossy().into_owned();
    for arg in command.get_args() {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}

/// Runs an external command, logging the command line plus start, elapsed, and end times.
/// The exit status is returned to the caller but completion is logged unconditionally;
/// this pipeline is best-effort and callers decide how loud a nonzero exit should be.
/// # Arguments
/// * `log` - the run log receiving the timing records
/// * `command` - the fully built command to execute
/// * `timeout` - optional wall-clock limit; the child is killed on expiry
/// # Errors
/// * if the command cannot be spawned (e.g. the executable is missing)
pub fn run_command(log: &RunLog, mut command: Command, timeout: Option<Duration>) -> std::io::Result<ExitStatus> {
    let start_time: Instant = Instant::now();
    log.log(&format!(">command start time: {}", timestamp()));
    log.log(&render_command(&command));

    let status: ExitStatus = match timeout {
        None => command.status()?,
        Some(limit) => {
            let mut child = command.spawn()?;
            loop {
                if let Some(status) = child.try_wait()? {
                    break status;
                }
                if start_time.elapsed() >= limit {
                    warn!("Command exceeded the {} limit, killing it", format_elapsed(limit.as_secs_f64()));
                    child.kill()?;
                    break child.wait()?;
                }
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    };

    log.log(&format!("=command elapsed time: {}", format_elapsed(start_time.elapsed().as_secs_f64())));
    log.log(&format!("<command end time: {}", timestamp()));
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered_args(command: &Command) -> Vec<String> {
        command.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_best_guess_conversion_args() {
        let command = best_guess_conversion(Path::new("plink2"), Path::new("/data/run1"), 7);
        assert_eq!(command.get_program().to_string_lossy(), "plink2");
        assert_eq!(rendered_args(&command), vec![
            "--vcf", "/data/run1/chr7.dose.vcf.gz",
            "--double-id",
            "--import-dosage-certainty", "0.9",
            "--make-bed",
            "--recode",
            "--out", "/data/run1/chr7_imputed_plink_TEMPORARY"
        ]);
    }

    #[test]
    fn test_sex_chromosome_mapping() {
        // the chrX input lands in the chr23 output prefix
        let command = best_guess_conversion(Path::new("plink2"), Path::new("/data/run1"), 23);
        let args = rendered_args(&command);
        assert_eq!(args[1], "/data/run1/chrX.dose.vcf.gz");
        assert_eq!(args[args.len() - 1], "/data/run1/chr23_imputed_plink_TEMPORARY");
    }

    #[test]
    fn test_dedup_rename_args() {
        let prefix = PathBuf::from("/data/run1/chr2_imputed_plink_TEMPORARY");
        let snplist_cmd = write_snplist(Path::new("plink2"), &prefix, &with_suffix(&prefix, "_allsnps"));
        assert_eq!(rendered_args(&snplist_cmd), vec![
            "--bfile", "/data/run1/chr2_imputed_plink_TEMPORARY",
            "--write-snplist",
            "--out", "/data/run1/chr2_imputed_plink_TEMPORARY_allsnps"
        ]);

        let exclude_cmd = exclude_duplicates(
            Path::new("plink2"),
            &prefix,
            &with_suffix(&prefix, "_duplicatedsnps.snplist"),
            &with_suffix(&prefix, "_NoDuplicates")
        );
        assert_eq!(rendered_args(&exclude_cmd), vec![
            "--bfile", "/data/run1/chr2_imputed_plink_TEMPORARY",
            "--exclude", "/data/run1/chr2_imputed_plink_TEMPORARY_duplicatedsnps.snplist",
            "--make-bed",
            "--out", "/data/run1/chr2_imputed_plink_TEMPORARY_NoDuplicates"
        ]);

        let rename_cmd = update_names(
            Path::new("plink2"),
            &with_suffix(&prefix, "_NoDuplicates"),
            Path::new("TOPMED/AllChr_Sorted_Tabdelim.txt"),
            &rsid_prefix(Path::new("/data/run1"), 2)
        );
        assert_eq!(rendered_args(&rename_cmd), vec![
            "--bfile", "/data/run1/chr2_imputed_plink_TEMPORARY_NoDuplicates",
            "--update-name", "TOPMED/AllChr_Sorted_Tabdelim.txt",
            "--make-bed",
            "--out", "/data/run1/chr2_imputed_plink_RSID"
        ]);
    }

    #[test]
    fn test_run_command_records_timing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("commands.log");
        let run_log = RunLog::new(Some(log_path.as_path())).unwrap();

        let mut command = Command::new("sh");
        command.arg("-c").arg("exit 3");
        let status = run_command(&run_log, command, None).unwrap();
        assert_eq!(status.code(), Some(3));

        let log_contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(log_contents.contains(">command start time:"));
        assert!(log_contents.contains("sh -c exit 3"));
        assert!(log_contents.contains("=command elapsed time:"));
        assert!(log_contents.contains("<command end time:"));
    }

    #[test]
    fn test_run_command_spawn_failure() {
        let run_log = RunLog::new(None).unwrap();
        let command = Command::new("/nonexistent/plink2-binary");
        assert!(run_command(&run_log, command, None).is_err());
    }

    #[test]
    fn test_run_command_timeout_kills_child() {
        let run_log = RunLog::new(None).unwrap();
        let mut command = Command::new("sh");
        command.arg("-c").arg("sleep 30");

        let start = Instant::now();
        let status = run_command(&run_log, command, Some(Duration::from_millis(200))).unwrap();
        assert!(!status.success());
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
