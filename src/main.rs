use clap::{
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use ryo_client::{
    app::{
        self,
        AppConfig,
    },
    felt::Felt,
    manifest::Profile,
    telemetry,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = app::DEFAULT_TORII_URL)]
    torii_url: String,

    #[arg(long, default_value = app::DEFAULT_RPC_URL)]
    rpc_url: String,

    #[arg(long, value_enum, default_value = "dev")]
    profile: Profile,

    /// Defaults to the profile's manifest in the working directory.
    #[arg(long)]
    manifest: Option<PathBuf>,

    #[arg(long, default_value = app::DEFAULT_NAMESPACE)]
    namespace: String,

    /// Defaults to `--namespace`.
    #[arg(long)]
    registry_namespace: Option<String>,

    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[arg(long, default_value_t = 1000)]
    poll_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a game token and follow the session until it ends.
    Play { token: String },
    Leaderboard {
        #[arg(long)]
        season: Option<u32>,
    },
    HallOfFame,
    /// Games in progress for an owner address.
    Games {
        #[arg(long)]
        owner: String,
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        page_size: u32,
    },
}

impl Args {
    fn app_config(&self) -> AppConfig {
        AppConfig {
            torii_url: self.torii_url.clone(),
            rpc_url: self.rpc_url.clone(),
            profile: self.profile,
            manifest_path: self
                .manifest
                .clone()
                .unwrap_or_else(|| PathBuf::from(self.profile.file_name())),
            namespace: self.namespace.clone(),
            registry_namespace: self
                .registry_namespace
                .clone()
                .unwrap_or_else(|| self.namespace.clone()),
            log_dir: self.log_dir.clone(),
            ..Default::default()
        }
        .with_poll_ms(self.poll_ms)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let config = args.app_config();
    let _guard = telemetry::init_tracing(config.log_dir.as_deref());
    tracing::info!(torii = %config.torii_url, namespace = %config.namespace, "starting ryo-client");

    match args.command {
        Command::Play { token } => app::run_play(&config, &token).await,
        Command::Leaderboard { season } => app::run_leaderboard(&config, season).await,
        Command::HallOfFame => app::run_hall_of_fame(&config).await,
        Command::Games {
            owner,
            page,
            page_size,
        } => {
            let owner = Felt::parse(&owner)
                .wrap_err_with(|| format!("Invalid owner address {owner}"))?;
            app::run_games(&config, owner, page, page_size).await
        }
    }
}
