//! podflow: generate listings, host assets and sync products for
//! print-on-demand designs.
//!
//! Credentials come from the environment (a `.env` file is loaded first):
//! PRINTFUL_API_KEY / PRINTFUL_STORE_ID, PRINTFUL_ETSY_API_KEY /
//! PRINTFUL_ETSY_STORE_ID, OPENAI_API_KEY, ASSET_HOST_TOKEN and
//! ASSET_HOST_URL.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use podflow::config::{
    redact, resolve_credentials, resolve_service_keys, EnvSource, RunConfig, StoreKind,
};
use podflow::core::DesignUnit;
use podflow::discovery::Discovery;
use podflow::events::LoggingEventSink;
use podflow::observability::{init_tracing, LogFormat};
use podflow::pipeline::{Collaborators, PipelineRunner};

#[derive(Parser, Debug)]
#[command(name = "podflow", version, about = "Print-on-demand upload and product sync")]
struct Cli {
    /// JSON config file (defaults to $PODFLOW_CONFIG).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Log level (trace, debug, info, warn, error). RUST_LOG wins if set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process design units
    Run(RunArgs),
    /// Resolve configuration and credentials without running
    Check {
        /// Store to check credentials for.
        #[arg(long)]
        store: Option<StoreKind>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Design names. When empty, every image in the assets directory is used.
    names: Vec<String>,

    /// File with one design name per line (or first CSV column).
    #[arg(long, conflicts_with = "names")]
    words_file: Option<PathBuf>,

    /// Directory holding <NAME>.png and mockups/.
    #[arg(long)]
    assets_dir: Option<PathBuf>,

    /// Directory for result files.
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Replace every remote call with placeholders.
    #[arg(long)]
    dry_run: bool,

    /// Store to sync into (manual or etsy).
    #[arg(long)]
    store: Option<StoreKind>,

    /// Attempts per remote call.
    #[arg(long)]
    max_attempts: Option<usize>,

    /// Delay before the first retry, in milliseconds.
    #[arg(long)]
    initial_delay_ms: Option<u64>,

    /// Growth factor between retry delays.
    #[arg(long)]
    backoff_multiplier: Option<f64>,

    /// Print the run summary as JSON instead of a report.
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut RunConfig) {
        if let Some(dir) = &self.assets_dir {
            config.assets_dir.clone_from(dir);
        }
        if let Some(dir) = &self.results_dir {
            config.results_dir.clone_from(dir);
        }
        if let Some(store) = self.store {
            config.store = store;
        }
        if let Some(attempts) = self.max_attempts {
            config.retry.max_attempts = attempts;
        }
        if let Some(delay) = self.initial_delay_ms {
            config.retry.initial_delay_ms = delay;
        }
        if let Some(multiplier) = self.backoff_multiplier {
            config.retry.backoff_multiplier = multiplier;
        }
        config.dry_run |= self.dry_run;
    }

    fn units(&self, config: &RunConfig) -> anyhow::Result<Vec<DesignUnit>> {
        let discovery = Discovery::new(&config.assets_dir);
        let units = if let Some(path) = &self.words_file {
            discovery.from_words_file(path)?
        } else if self.names.is_empty() {
            discovery.from_assets_dir()?
        } else {
            discovery.from_names(&self.names)?
        };
        if units.is_empty() {
            bail!("no design units found in {}", config.assets_dir.display());
        }
        Ok(units)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format, &cli.log_level);

    let env = EnvSource::from_env();
    let mut config =
        RunConfig::resolve(cli.config.as_deref(), &env).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run(args) => {
            args.apply(&mut config);
            run(&config, &env, &args).await
        }
        Commands::Check { store } => {
            if let Some(store) = store {
                config.store = store;
            }
            check(&config, &env)
        }
    }
}

async fn run(config: &RunConfig, env: &EnvSource, args: &RunArgs) -> anyhow::Result<()> {
    let units = args.units(config)?;
    config.validate().context("Invalid run configuration")?;
    let collaborators =
        Collaborators::for_config(config, env).context("Failed to set up remote services")?;
    let runner = PipelineRunner::new(config, collaborators, Arc::new(LoggingEventSink::default()))
        .context("Invalid run configuration")?;

    let summary = runner.run(&units).await.context("Run aborted")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Serialize summary")?
        );
    } else {
        print!("{}", summary.render_report());
    }
    // unit failures are reported, not fatal
    Ok(())
}

fn check(config: &RunConfig, env: &EnvSource) -> anyhow::Result<()> {
    config.validate().context("Invalid configuration")?;
    println!("store:        {}", config.store);
    println!("assets dir:   {}", config.assets_dir.display());
    println!("results dir:  {}", config.results_dir.display());
    println!(
        "retry:        {} attempts, {}ms initial delay, x{}",
        config.retry.max_attempts, config.retry.initial_delay_ms, config.retry.backoff_multiplier
    );
    println!("file host:    {}", config.host.base_url);
    println!("commerce:     {}", config.commerce.base_url);

    let credentials =
        resolve_credentials(env, config.store).context("Store credentials are incomplete")?;
    println!("api key:      {}", redact(credentials.api_key()));
    println!("store id:     {}", credentials.store_id());

    let keys = resolve_service_keys(env).context("Service keys are incomplete")?;
    println!("openai key:   {}", redact(&keys.completion_api_key));
    println!("host token:   {}", redact(&keys.host_token));
    Ok(())
}
