use log::LevelFilter;

/// Logs go to stderr; `RUST_LOG` overrides the `-v` derived level.
pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_level(true)
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .ok();
}
