//! Diagnostics go through `log` into tui-logger, which writes them to the log
//! file. Console progress is printed directly and never goes through here.

use std::{path::Path, str::FromStr};

use color_eyre::{Result, eyre::eyre};
use tui_logger::{
    LevelFilter, TuiLoggerFile, TuiLoggerLevelOutput, init_logger, move_events,
    set_default_level, set_log_file,
};

pub fn init(log_file: &Path, level: &str) -> Result<()> {
    let level =
        LevelFilter::from_str(level).map_err(|_| eyre!("Unknown log level {:?}", level))?;
    init_logger(LevelFilter::Trace)?;
    let path = log_file
        .to_str()
        .ok_or_else(|| eyre!("Log file path {:?} is not valid UTF-8", log_file))?;
    let file_options = TuiLoggerFile::new(path)
        .output_level(Some(TuiLoggerLevelOutput::Abbreviated))
        .output_file(false)
        .output_separator(':');
    set_log_file(file_options);
    set_default_level(level);
    log::info!(target: "App", "Logging started");
    flush();
    Ok(())
}

/// Hand buffered records to the file writer. Without a widget draining the
/// logger this has to be called from the main loop.
pub fn flush() {
    move_events();
}
