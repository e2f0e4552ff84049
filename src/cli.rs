
use clap::Parser;
use flate2::bufread::MultiGzDecoder;
use log::{error, info, trace, warn};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::commands::{CHROMOSOMES, DOSAGE_CERTAINTY, RENAME_MAP_FILENAME, dose_vcf_path};

#[derive(Clone, Parser)]
#[clap(author, version, about)]
pub struct Settings {
    /// Directory containing per-chromosome dosage VCFs (chr<N>.dose.vcf.gz) downloaded from the imputation server; outputs are written here as well
    #[clap(required = true)]
    #[clap(short = 'd')]
    #[clap(long = "post-imput-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub post_imput_dir: PathBuf,

    /// Directory containing the chromosome:position to RSID rename mapping (AllChr_Sorted_Tabdelim.txt)
    #[clap(short = 's')]
    #[clap(long = "snp-dir")]
    #[clap(value_name = "DIR")]
    #[clap(default_value = "TOPMED")]
    #[clap(help_heading = Some("Input/Output"))]
    pub snp_dir: PathBuf,

    /// Keep the TEMPORARY filesets after the run; uses disk space, mostly useful for debugging
    #[clap(long = "keep-temp")]
    #[clap(help_heading = Some("Input/Output"))]
    pub keep_temp: bool,

    /// Path to the plink2 executable
    #[clap(long = "plink2")]
    #[clap(value_name = "PATH")]
    #[clap(default_value = "plink2")]
    #[clap(help_heading = Some("External Tools"))]
    pub plink2: PathBuf,

    /// Number of threads for the per-chromosome RSID rename fan-out
    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "4")]
    pub threads: usize,

    /// Enable verbose output
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8
}

/// Checks that a dosage VCF exists and looks gzip-compressed.
/// Problems are only warned about; the pipeline is best-effort and a missing
/// chromosome simply produces no output for that chromosome.
/// # Arguments
/// * `filename` - the dosage VCF path to check
fn check_dose_vcf(filename: &Path) {
    if !filename.exists() {
        warn!("Dosage VCF does not exist: \"{}\"", filename.display());
        return;
    }

    // sniff a few bytes through the decoder to catch uncompressed files early
    let vcf_file: File = match File::open(filename) {
        Ok(f) => f,
        Err(e) => {
            warn!("Error while opening {filename:?}: {e}");
            return;
        }
    };
    let file_reader = BufReader::new(vcf_file);
    let mut gz_decoder = MultiGzDecoder::new(file_reader);
    let mut small_buffer: [u8; 10] = [0; 10];
    match gz_decoder.read(&mut small_buffer) {
        Ok(bytes_read) => {
            trace!("Successfully read {bytes_read} bytes from {filename:?}.")
        },
        Err(e) => {
            if e.to_string() == "invalid gzip header" {
                warn!("Error while checking {filename:?}: {e}; is the VCF gzipped?");
            } else {
                warn!("Error while checking {filename:?}: {e}");
            }
        }
    };
}

pub fn get_raw_settings() -> Settings {
    Settings::parse()
}

/// Do some additional checks here, we may increase these as we go.
/// Also can modify settings if needed since we're passing it around.
/// # Arguments
/// * `settings` - the raw settings, nothing has been checked other than what clap does for us.
pub fn check_settings(mut settings: Settings) -> Settings {
    // the output directory is the one thing we cannot work without
    if !settings.post_imput_dir.is_dir() {
        error!("Post-imputation directory does not exist: \"{}\"", settings.post_imput_dir.display());
        std::process::exit(exitcode::NOINPUT);
    }
    info!("Post-imputation directory: \"{}\"", settings.post_imput_dir.display());

    for chromosome in CHROMOSOMES {
        check_dose_vcf(&dose_vcf_path(&settings.post_imput_dir, chromosome));
    }

    let rename_map: PathBuf = settings.snp_dir.join(RENAME_MAP_FILENAME);
    if rename_map.exists() {
        info!("RSID rename mapping: \"{}\"", rename_map.display());
    } else {
        warn!("RSID rename mapping does not exist, the rename stage will not produce RSID filesets: \"{}\"", rename_map.display());
    }

    // 0 doesn't make sense, so lets just error proof it up to 1
    if settings.threads == 0 {
        settings.threads = 1;
    }

    info!("plink2 executable: \"{}\"", settings.plink2.display());
    info!("Dosage certainty threshold: {}", DOSAGE_CERTAINTY);
    info!("Keep TEMPORARY files: {}", if settings.keep_temp { "ENABLED" } else { "DISABLED" });
    info!("Rename threads: {}", settings.threads);

    //send the settings back
    settings
}

/// Builds the call header echoed at the top of the run log, one option per line.
pub fn call_header(settings: &Settings) -> String {
    let mut header: String = String::from("Call:\npostimpute \\\n");
    header.push_str(&format!("\t--post-imput-dir {} \\\n", settings.post_imput_dir.display()));
    header.push_str(&format!("\t--snp-dir {} \\\n", settings.snp_dir.display()));
    header.push_str(&format!("\t--plink2 {} \\\n", settings.plink2.display()));
    header.push_str(&format!("\t--threads {}", settings.threads));
    if settings.keep_temp {
        header.push_str(" \\\n\t--keep-temp");
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings(dir: &Path) -> Settings {
        Settings {
            post_imput_dir: dir.to_path_buf(),
            snp_dir: PathBuf::from("TOPMED"),
            keep_temp: false,
            plink2: PathBuf::from("plink2"),
            threads: 4,
            verbosity: 0
        }
    }

    #[test]
    fn test_call_header() {
        let settings = test_settings(Path::new("/data/run1"));
        let header = call_header(&settings);
        assert!(header.starts_with("Call:\npostimpute \\\n"));
        assert!(header.contains("--post-imput-dir /data/run1"));
        assert!(header.contains("--snp-dir TOPMED"));
        assert!(!header.contains("--keep-temp"));
    }

    #[test]
    fn test_call_header_with_keep_temp() {
        let mut settings = test_settings(Path::new("/data/run1"));
        settings.keep_temp = true;
        assert!(call_header(&settings).ends_with("--keep-temp"));
    }
}
