use clap::Parser;
use log::*;
#[cfg(debug_assertions)]
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::{
    append::{
        rolling_file::{
            RollingFileAppender,
            policy::compound::{
                CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
            },
        },
    },
    config::{Appender, Config as LogConfig, Logger, Root},
    encode::pattern::PatternEncoder,
};
use match_common::{
    roster::{MatchId, Player},
    store::{MatchDocument, MatchStore, MemoryStore, PortalClient, Registry},
};
use serde::Deserialize;
use std::{fs::read_to_string, path::PathBuf};
use tokio::io::BufReader;

mod command;
mod console;
mod session_manager;
mod sync;
mod ticker;

mod config;
use config::Config;

const APP_NAME: &str = "match_session";
const CONFIG_NAME: &str = "match-session";

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(long, short)]
    /// Id of the match to track
    match_id: String,

    #[clap(long, short, action(clap::ArgAction::Count))]
    /// Increase the log verbosity
    verbose: u8,

    #[clap(long)]
    /// Keep the match in memory instead of using the remote store
    offline: bool,

    #[clap(long)]
    /// JSON file with a `match` document and its `players`, loaded into the offline store
    seed_file: Option<PathBuf>,

    #[clap(long)]
    /// Don't require HTTPS to connect to the store
    allow_http: bool,

    #[clap(long)]
    /// Directory within which log files will be placed, default is platform dependent
    log_location: Option<PathBuf>,

    #[clap(long, default_value = "5000000")]
    /// Max size in bytes that a log file is allowed to reach before being rolled over
    log_max_file_size: u64,

    #[clap(long, default_value = "3")]
    /// Number of archived logs to keep
    num_old_logs: u32,
}

/// Contents of a `--seed-file`
#[derive(Debug, Deserialize)]
struct Seed {
    #[serde(rename = "match")]
    document: MatchDocument,
    #[serde(default)]
    players: Vec<Player>,
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let log_level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let log_base_path = match args.log_location.clone() {
        Some(path) => path,
        None => {
            let mut path = directories::BaseDirs::new()
                .ok_or("Could not find a directory to store logs")?
                .data_local_dir()
                .to_path_buf();
            path.push("match-session-logs");
            path
        }
    };
    let mut log_path = log_base_path.clone();
    let mut archived_log_path = log_base_path.clone();
    log_path.push("match-session-log.txt");
    archived_log_path.push("match-session-log-{}.txt.gz");

    #[cfg(debug_assertions)]
    println!("Log path: {}", log_path.display());

    // Only log to the console in debug mode
    #[cfg(debug_assertions)]
    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("[{d} {h({l:5})} {M}] {m}{n}")))
        .build();

    // Setup the file log roller
    let roller = FixedWindowRoller::builder().build(
        archived_log_path
            .to_str()
            .ok_or("The log location is not valid UTF-8")?,
        args.num_old_logs,
    )?;
    let file_policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(args.log_max_file_size)),
        Box::new(roller),
    );
    let file_appender = RollingFileAppender::builder()
        .append(true)
        .encoder(Box::new(PatternEncoder::new("[{d} {l:5} {M}] {m}{n}")))
        .build(log_path, Box::new(file_policy))?;

    // Setup the logging from all locations to use `LevelFilter::Error`
    let root = Root::builder().appender("file_appender");
    #[cfg(debug_assertions)]
    let root = root.appender("console");
    let root = root.build(LevelFilter::Error);

    let log_config = LogConfig::builder()
        .appender(Appender::builder().build("file_appender", Box::new(file_appender)));

    #[cfg(debug_assertions)]
    let log_config = log_config.appender(Appender::builder().build("console", Box::new(console)));

    let log_config = log_config
        .logger(Logger::builder().build(APP_NAME, log_level))
        .logger(Logger::builder().build("match_common", log_level))
        .build(root)?;

    log4rs::init_config(log_config)?;
    log_panics::init();

    info!("Starting match session for {}", args.match_id);

    match confy::get_configuration_file_path(CONFIG_NAME, None) {
        Ok(path) => info!("Reading config file from {path:?}"),
        Err(e) => warn!("Could not locate the config file: {e}"),
    }

    let config: Config = match confy::load(CONFIG_NAME, None) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file, overwriting with default. Error: {e}");
            let config = Config::default();
            if let Err(e) = confy::store(CONFIG_NAME, None, &config) {
                error!("Failed to write the default config: {e}");
            }
            config
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(args, config))
}

async fn run(args: Cli, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let match_id = MatchId::new(&args.match_id);

    if args.offline || config.offline {
        let store = MemoryStore::new();
        match &args.seed_file {
            Some(path) => {
                let seed: Seed = serde_json::from_str(&read_to_string(path)?)?;
                info!(
                    "Seeding the offline store with match {} and {} players",
                    seed.document.info.id,
                    seed.players.len()
                );
                store.insert_match(&seed.document)?;
                store.insert_players(seed.players);
            }
            None => warn!("Running offline without a seed file, the match can't be found"),
        }
        drive(store, &match_id, config).await
    } else {
        let store = PortalClient::new(
            &config.store.url,
            config.store.access_token(),
            config.store.require_https && !args.allow_http,
            config.store.timeout(),
        )?;
        if !store.has_token() {
            warn!("No access token is configured, the store will likely refuse requests");
        }
        drive(store, &match_id, config).await
    }
}

async fn drive<S: MatchStore + Registry>(
    store: S,
    match_id: &MatchId,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = sync::load_session(&store, match_id, config.game).await?;
    let console = console::Console::new(session, sync::SyncHandle::new(store));

    println!("{}", command::help_text());
    console
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;
    info!("Session for {match_id} closed");
    Ok(())
}
