//! log4rs setup. Library code only ever logs through the `log` facade; the embedding
//! process (or the `tiercache` binary) picks one of these initializers.

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_RETENTION: u32 = 7;
const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";

pub const METRICS_TARGET: &str = "tiercache::metrics";
pub const DEV6_TARGET: &str = "tiercache::dev6";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Initializes logging from `log4rs.yaml` in the working directory.
///
/// # Errors
/// Returns an error if the file is missing or invalid, or a logger is already set.
pub fn init() -> Result<(), BoxError> {
    init_path(Path::new("log4rs.yaml"))
}

/// # Errors
/// Returns an error if the file is missing or invalid, or a logger is already set.
pub fn init_path(path: &Path) -> Result<(), BoxError> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}

#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, BoxError> {
    let roller = FixedWindowRoller::builder().build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?)
}

/// Builds the rolling-file config: `app.log` for everything, `metrics.log` for
/// telemetry reports, and `dev6.log` for developer events when `enable_dev6` is set.
///
/// # Errors
/// Returns an error if the directory or an appender cannot be created.
pub fn build_config(dir: Option<&Path>, level: Option<&str>, retention: Option<usize>, enable_dev6: bool) -> Result<Config, BoxError> {
    let base = match dir {
        Some(d) => PathBuf::from(d),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&base)?;
    let keep = retention.and_then(|r| u32::try_from(r).ok()).unwrap_or(DEFAULT_RETENTION);
    let lvl = parse_level(level);

    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("metrics", Box::new(rolling(&base, "metrics", keep)?)))
        .logger(Logger::builder().appender("metrics").additive(false).build(METRICS_TARGET, LevelFilter::Info));

    builder = if enable_dev6 {
        builder
            .appender(Appender::builder().build("dev6", Box::new(rolling(&base, "dev6", keep)?)))
            .logger(Logger::builder().appender("dev6").additive(false).build(DEV6_TARGET, LevelFilter::Trace))
    } else {
        builder.logger(Logger::builder().additive(false).build(DEV6_TARGET, LevelFilter::Off))
    };

    Ok(builder.build(Root::builder().appender("app").build(lvl))?)
}

/// Configure logging for the process.
///
/// # Errors
/// Returns an error if the config cannot be built or a logger is already set.
pub fn configure_logging(dir: Option<&Path>, level: Option<&str>, retention: Option<usize>, enable_dev6: bool) -> Result<(), BoxError> {
    let config = build_config(dir, level, retention, enable_dev6)?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Configure logging from `TIERCACHE_LOG_DIR`, `TIERCACHE_LOG_LEVEL`,
/// `TIERCACHE_LOG_RETENTION` and `TIERCACHE_DEV6`.
///
/// # Errors
/// Same as [`configure_logging`].
pub fn configure_from_env() -> Result<(), BoxError> {
    let dir = std::env::var("TIERCACHE_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("TIERCACHE_LOG_LEVEL").ok();
    let retention = std::env::var("TIERCACHE_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok());
    let dev6 = std::env::var("TIERCACHE_DEV6")
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    configure_logging(dir.as_deref(), level.as_deref(), retention, dev6)
}
