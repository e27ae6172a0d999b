//! Terminal logging initialization for sampler_app.

use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// Initialize the terminal logger. Each `-v` raises the level one step.
pub fn initialize(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build();
    let _ = TermLogger::init(level, config, TerminalMode::Mixed, ColorChoice::Auto);
}
