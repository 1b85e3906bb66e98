use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tiercache::cli::{self as admin, AdminContext, OutputMode};
use tiercache::settings::Settings;
use tiercache::store::FileMediumStore;
use tiercache::utils::clock::{Clock, SystemClock};

#[derive(Parser, Debug)]
#[command(name = "tiercache", version, about = "Administrative tool for the tiered derivation cache's medium tier", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a settings file (TOML). Falls back to TIERCACHE_CONFIG, then ./tiercache.toml")]
    config: Option<PathBuf>,
    #[arg(long, help = "Medium tier log file. Takes precedence over settings and TIERCACHE_STORE")]
    store: Option<PathBuf>,
    #[arg(long, help = "Emit JSON instead of key=value lines")]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Show record counts by status and bytes used")]
    Stats,
    #[command(about = "List records, oldest first")]
    List {
        #[arg(long, help = "Show at most N records")]
        limit: Option<usize>,
    },
    #[command(about = "Remove expired, stale-version and unreadable records")]
    Purge,
    #[command(about = "Remove the record for a source locator")]
    Invalidate {
        #[arg(help = "Source asset locator as passed to the cache")]
        locator: String,
        #[arg(long, help = "Tenant scope the entry was stored under")]
        scope: Option<String>,
    },
    #[command(about = "Remove every medium tier record (the slow tier is not touched)")]
    Clear,
}

impl From<Commands> for admin::Command {
    fn from(c: Commands) -> Self {
        match c {
            Commands::Stats => admin::Command::Stats,
            Commands::List { limit } => admin::Command::List { limit },
            Commands::Purge => admin::Command::Purge,
            Commands::Invalidate { locator, scope } => admin::Command::Invalidate { locator, scope },
            Commands::Clear => admin::Command::Clear,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match real_main(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tiercache: {e}");
            ExitCode::FAILURE
        }
    }
}

fn real_main(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(store) = cli.store {
        settings.store_path = Some(store);
    }
    if let Err(e) = settings.init_logging() {
        eprintln!("tiercache: logging disabled: {e}");
    }
    let tiered = settings.tiered_config()?;
    let mut store = FileMediumStore::open(settings.store_path(), settings.tiered.medium_quota_bytes)?;
    let ctx = AdminContext {
        now_millis: SystemClock.now_millis(),
        medium_ttl: tiered.medium_ttl,
        schema_version: tiered.schema_version,
    };
    let mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    admin::run(&mut store, cli.command.into(), ctx, mode, &mut out)?;
    out.flush()?;
    Ok(())
}
