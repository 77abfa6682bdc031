use std::path::PathBuf;

use arg::{parse_args, Args};

// -------------------------------------------------------------------------------------------------

const DEFAULT_LOG_LEVEL: log::Level = if cfg!(debug_assertions) {
    log::Level::Debug
} else {
    log::Level::Warn
};

// -------------------------------------------------------------------------------------------------

/// Default program arguments for grainscope demo applications.
#[derive(Args, Debug, Default)]
#[allow(unused)]
pub struct Arguments {
    #[arg(short = "o", long = "output")]
    /// Write rendered audio into the given wav file. By default \"render-grains.wav\".
    pub output_path: Option<PathBuf>,
    #[arg(short = "i", long = "input")]
    /// Granulate the given wav file instead of a synthesized test signal.
    pub input_path: Option<PathBuf>,
    #[arg(short = "l", long = "log-level")]
    /// Set logging level to \"debug\", \"info\", \"warn\" or \"error\".
    /// By default \"debug\" in dev builds and \"warn\" in release builds.
    pub log_level: Option<log::Level>,
}

/// Parse common demo arguments and apply the log-level arg to the logger
#[allow(unused)]
pub fn parse() -> Arguments {
    let args = parse_args::<Arguments>();

    create_logger(args.log_level);
    args
}

// -------------------------------------------------------------------------------------------------

/// Create default logger from arguments. Invoked from `parse`.
#[allow(unused)]
pub fn create_logger(log_level: Option<log::Level>) {
    simple_logger::SimpleLogger::new()
        .with_level(log_level.unwrap_or(DEFAULT_LOG_LEVEL).to_level_filter())
        .init()
        .expect("Failed to set logger");
}
