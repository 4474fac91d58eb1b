//! Opt-in log4rs initialization. Engine code itself only ever depends on
//! the `log` facade; this module is the one place `log4rs` is named.

/// Initialize logging to a store-scoped folder: `{store_name}_logs`.
/// Creates the folder if missing and writes rolling log files.
///
/// # Errors
/// Returns an error if the log directory or appender cannot be created.
pub fn init_for_store(store_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    use log::LevelFilter;
    use log4rs::append::file::FileAppender;
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;
    use std::fs;

    let log_dir = format!("{store_name}_logs");
    fs::create_dir_all(&log_dir)?;
    let logfile = format!("{log_dir}/onion.log");
    let encoder = Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}"));
    let file_appender = FileAppender::builder().encoder(encoder).build(logfile)?;
    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(file_appender)))
        .build(Root::builder().appender("file").build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    Ok(())
}
