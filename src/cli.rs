use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use crate::config::PathConfig;

// Build version with target info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Headless slide and timeline driver for presentation documents
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Presentation document (JSON)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Start on this slide of the top-level deck (index or name)
    #[arg(short = 's', long = "slide", value_name = "SLIDE")]
    pub slide: Option<String>,

    /// Simulated run time in seconds
    #[arg(short = 'd', long = "duration", value_name = "SECONDS", default_value_t = 5.0)]
    pub duration: f64,

    /// Tick rate (overrides the config file)
    #[arg(long = "fps", value_name = "N")]
    pub fps: Option<f32>,

    /// Start the top-level player even if the slide says Stop
    #[arg(short = 'a', long = "autoplay")]
    pub autoplay: bool,

    /// Stop the top-level player after entering the first slide
    #[arg(long = "no-autoplay", conflicts_with = "autoplay")]
    pub no_autoplay: bool,

    /// Print every delivered event
    #[arg(short = 'e', long = "events")]
    pub events: bool,

    /// Runtime settings file (default: platform config dir)
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Enable logging to file (default: scenedeck.log in the data dir)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

impl Args {
    pub fn path_config(&self) -> PathConfig {
        self.config_dir.clone().map(PathConfig::with_dir).unwrap_or_default()
    }
}

/// 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
pub fn log_level(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Console logging honours RUST_LOG; `--log` writes to a file at the
/// requested verbosity instead.
pub fn init_logger(args: &Args, paths: &PathConfig) -> Result<()> {
    let level = log_level(args.verbosity);

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| paths.data_file("scenedeck.log"));
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
        let file = fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), level);
    } else {
        let default_level = level.as_str().to_lowercase();
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}
