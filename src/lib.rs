
/// PLINK .bim variant-table rewriting, including the composite-identifier splitter
pub mod bim;
/// CLI functionality and checks
pub mod cli;
/// Builders and the runner for external plink2 invocations
pub mod commands;
/// Organizes the primary workflow: Convert -> Split -> Dedup/Rename -> Cleanup
pub mod pipeline;
/// Run-scoped log file handling and elapsed-time formatting
pub mod run_log;
/// In-process duplicate detection over plink2 variant inventories
pub mod snplist;
