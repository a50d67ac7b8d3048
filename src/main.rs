use chat_history_export::records::TimestampStyle;
use chat_history_export::service::ConversationService;
use chat_history_export::service::bridge::{BridgeConfig, BridgeService};
use chat_history_export::service::store::StoreService;
use chat_history_export::{ExportConfig, Exporter, connect};
use clap::Parser;
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Export the message history of every chat conversation to CSV files.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to write CSV files to.
    /// Defaults to ./exports if not set in config.
    #[arg(value_name = "TARGET_DIR")]
    target_dir: Option<PathBuf>,

    /// Read from a local SQLite message archive.
    #[arg(long, value_name = "PATH", conflicts_with = "service_url")]
    store: Option<PathBuf>,

    /// Read through a messaging bridge at this base URL.
    #[arg(long, value_name = "URL")]
    service_url: Option<Url>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/chat-history-export/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write all conversations into a single all_chats.csv.
    #[arg(long)]
    single_file: bool,

    /// Render dates and times in UTC instead of the local time zone.
    #[arg(long)]
    utc: bool,

    /// Print each file written.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress standard output (progress spinners and summary).
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    target_dir: Option<PathBuf>,
    store_path: Option<PathBuf>,
    service_url: Option<Url>,
    session_dir: Option<PathBuf>,
    date_format: Option<String>,
    time_format: Option<String>,
    utc: Option<bool>,
    single_file: Option<bool>,
}

enum Source {
    Store(PathBuf),
    Bridge(Url),
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        dirs::config_dir()
            .map(|d| d.join("chat-history-export/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

/// CLI choice wins outright; from the config file exactly one source may be set.
fn resolve_source(cli: &Cli, file_cfg: &FileConfig) -> Result<Source> {
    if let Some(p) = &cli.store {
        return Ok(Source::Store(p.clone()));
    }
    if let Some(u) = &cli.service_url {
        return Ok(Source::Bridge(u.clone()));
    }
    match (&file_cfg.store_path, &file_cfg.service_url) {
        (Some(p), None) => Ok(Source::Store(p.clone())),
        (None, Some(u)) => Ok(Source::Bridge(u.clone())),
        (Some(_), Some(_)) => Err(eyre!(
            "Config sets both store_path and service_url; pick one or pass --store/--service-url."
        )),
        (None, None) => Err(eyre!(
            "No message source configured.\nUse --store PATH or --service-url URL, or set store_path/service_url in config.toml."
        )),
    }
}

fn default_session_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("chat-history-export"))
        .unwrap_or_else(|| PathBuf::from(".chat-history-export"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // 1. Load config file (CLI path > default path)
    let file_cfg = load_file_config(cli.config.as_deref())?;

    // 2. Resolve target_dir (CLI > Config > Default)
    let target_dir = cli
        .target_dir
        .clone()
        .or(file_cfg.target_dir.clone())
        .unwrap_or_else(|| PathBuf::from("exports"));

    // 3. Resolve the message source (CLI > Config)
    let source = resolve_source(&cli, &file_cfg)?;

    // 4. Resolve timestamp rendering
    let defaults = TimestampStyle::default();
    let timestamps = TimestampStyle {
        date_format: file_cfg.date_format.unwrap_or(defaults.date_format),
        time_format: file_cfg.time_format.unwrap_or(defaults.time_format),
        utc: cli.utc || file_cfg.utc.unwrap_or(false),
    };
    timestamps.validate().map_err(|e| eyre!(e))?;

    // 5. Build the Export Config
    let config = ExportConfig {
        target_dir,
        single_file: cli.single_file || file_cfg.single_file.unwrap_or(false),
        timestamps,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    // 6. Open the session
    let service: Box<dyn ConversationService> = match source {
        Source::Store(path) => {
            if !path.exists() {
                return Err(eyre!(
                    "Message store not found at: {}\nUse --store to specify the path manually.",
                    path.display()
                ));
            }
            Box::new(StoreService::new(path, config.quiet))
        }
        Source::Bridge(url) => {
            let session_dir = file_cfg.session_dir.unwrap_or_else(default_session_dir);
            Box::new(
                BridgeService::new(BridgeConfig::new(url, session_dir))
                    .wrap_err("Failed to set up bridge client")?,
            )
        }
    };

    connect(service.as_ref(), |code| {
        eprintln!("Login required. Scan or enter this code on your phone:\n\n    {}\n", code);
    })
    .await
    .wrap_err("Could not establish a session")?;

    // 7. Run the Business Logic
    Exporter::new(service.as_ref(), &config)
        .run()
        .await
        .wrap_err("Export failed")?;

    Ok(())
}
