
use postimpute::cli::{Settings, call_header, check_settings, get_raw_settings};
use postimpute::pipeline::run_pipeline;
use postimpute::run_log::{RunLog, format_elapsed, timestamp};

use log::{LevelFilter, error};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

fn main() {
    // get the settings
    let settings: Settings = get_raw_settings();
    let filter_level: LevelFilter = match settings.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };

    // immediately setup logging first
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();

    // okay, now we can check all the other settings
    let cli_settings: Settings = check_settings(settings);

    let start_time: Instant = Instant::now();
    let log_path: PathBuf = cli_settings.post_imput_dir.join("plink_conversion.log");
    let run_log: Arc<RunLog> = match RunLog::new(Some(log_path.as_path())) {
        Ok(rl) => Arc::new(rl),
        Err(e) => {
            error!("Error while creating log file {:?}: {}", log_path, e);
            std::process::exit(exitcode::IOERR);
        }
    };

    run_log.log(&call_header(&cli_settings));

    let pipeline_failed: bool = match run_pipeline(&cli_settings, &run_log) {
        Ok(()) => false,
        Err(e) => {
            // persist the failure before the finalization lines below
            run_log.error(&format!("Pipeline failed: {e}"));
            true
        }
    };

    // finalization always runs, success or not
    run_log.log(&format!("Analysis finished at {}", timestamp()));
    run_log.log(&format!("Total time elapsed: {}", format_elapsed(start_time.elapsed().as_secs_f64())));

    if pipeline_failed {
        std::process::exit(exitcode::SOFTWARE);
    }
}
