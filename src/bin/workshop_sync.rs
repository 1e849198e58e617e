use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use workshop_sync::config::{Settings, SettingsLoader, player_config_item_ids};
use workshop_sync::domain::ItemId;
use workshop_sync::error::SyncError;
use workshop_sync::fetcher::SteamCmdFetcher;
use workshop_sync::output::{HumanOutput, JsonOutput, OutputMode, PlanReport};
use workshop_sync::remote::{OfflineRemote, RemoteMetadata, SteamWorkshopClient};
use workshop_sync::sync::{SyncEngine, SyncOptions};

#[derive(Parser)]
#[command(name = "workshop-sync")]
#[command(about = "Keep locally installed workshop mods in sync with the Steam Workshop")]
#[command(version)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch stale or missing items")]
    Sync(SyncArgs),
}

#[derive(Args, Clone, Default)]
struct SyncArgs {
    /// Item ids to sync instead of those listed in the player config.
    ids: Vec<String>,

    #[arg(long)]
    settings: Option<String>,

    #[arg(long)]
    player_config: Option<Utf8PathBuf>,

    #[arg(long)]
    force: bool,

    #[arg(long)]
    dry_run: bool,

    /// Skip remote update checks; only missing items are fetched.
    #[arg(long)]
    offline: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code),
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<SyncError>() {
                return ExitCode::from(map_exit_code(err));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &SyncError) -> u8 {
    match error {
        SyncError::SettingsRead(_)
        | SyncError::SettingsParse(_)
        | SyncError::PlayerConfigRead(_)
        | SyncError::InvalidItemId(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<u8> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let args = match cli.command {
        Some(Commands::Sync(args)) => args,
        None => SyncArgs::default(),
    };
    run_sync(args, output_mode)
}

fn run_sync(args: SyncArgs, output_mode: OutputMode) -> miette::Result<u8> {
    let settings = SettingsLoader::resolve(args.settings.as_deref())?;
    for note in settings.advisories() {
        tracing::warn!("{note}");
    }

    let ids = resolve_ids(&args, &settings)?;
    if ids.is_empty() {
        eprintln!("no workshop items configured");
        return Ok(0);
    }

    let fetcher = SteamCmdFetcher::new(&settings.fetcher);
    let options = SyncOptions { force: args.force };
    if args.offline || !settings.remote.enabled {
        execute(settings, fetcher, OfflineRemote, &ids, options, &args, output_mode)
    } else {
        let remote = SteamWorkshopClient::new(&settings.remote.endpoint)?;
        execute(settings, fetcher, remote, &ids, options, &args, output_mode)
    }
}

fn resolve_ids(args: &SyncArgs, settings: &Settings) -> Result<Vec<ItemId>, SyncError> {
    if !args.ids.is_empty() {
        return args.ids.iter().map(|value| value.parse()).collect();
    }
    let path = args
        .player_config
        .clone()
        .unwrap_or_else(|| settings.files.player_config.clone());
    player_config_item_ids(&path)
}

fn execute<R: RemoteMetadata>(
    settings: Settings,
    fetcher: SteamCmdFetcher,
    remote: R,
    ids: &[ItemId],
    options: SyncOptions,
    args: &SyncArgs,
    output_mode: OutputMode,
) -> miette::Result<u8> {
    let engine = SyncEngine::new(settings, fetcher, remote);

    if args.dry_run {
        let plan = PlanReport::from(&engine.plan(ids, options));
        match output_mode {
            OutputMode::NonInteractive => JsonOutput::print_plan(&plan).into_diagnostic()?,
            OutputMode::Interactive => HumanOutput::print_plan(&plan),
        }
        return Ok(0);
    }

    let result = engine.run(ids, options);
    let report = result.report();
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_sync(&report).into_diagnostic()?,
        OutputMode::Interactive => HumanOutput::print_sync(&report),
    }
    Ok(result.exit_code())
}
