mod config_commands;

use std::path::{Path, PathBuf};

use {
    anyhow::{Context, bail},
    clap::{Parser, Subcommand},
    postern_config::{PosternConfig, Severity},
    postern_metrics::MetricsRecorderConfig,
    tracing::{debug, error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(
    name = "postern",
    version,
    about = "Postern: anonymous two-way Telegram relay"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery in ./ and ~/.config/postern/).
    #[arg(long, global = true, env = "POSTERN_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect the bot and relay messages (default when no subcommand is
    /// provided).
    Run,
    /// Validate the configuration and report errors/warnings.
    CheckConfig {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    match cli.command {
        None | Some(Commands::Run) => run(cli.config.as_deref()).await,
        Some(Commands::CheckConfig { verbose }) => {
            config_commands::check(cli.config.as_deref(), verbose)
        },
    }
}

/// Resolve the config file: explicit path first, then discovery.
fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(postern_config::find_config_file)
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<PosternConfig> {
    let mut config = match resolve_config_path(explicit) {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            postern_config::load_config(&path)
                .with_context(|| format!("failed to load {}", path.display()))?
        },
        None => {
            debug!("no config file found, using defaults and environment");
            PosternConfig::default()
        },
    };
    postern_config::apply_env_overrides(&mut config)?;
    Ok(config)
}

async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "postern starting");

    let config = load_config(config_path)?;

    let report = postern_config::validate::validate_config(&config);
    for d in &report.diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
            Severity::Info => debug!(path = %d.path, "{}", d.message),
        }
    }
    if report.has_errors() {
        bail!(
            "configuration has {} error(s); run `postern check-config` for details",
            report.count(Severity::Error)
        );
    }

    if config.metrics.enabled && config.metrics.listen.is_none() {
        warn!("metrics enabled without metrics.listen; they are only logged at shutdown");
    }
    let metrics = postern_metrics::init_metrics(MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        listen: config.metrics.listen,
    })?;

    let polling = postern_telegram::start_polling(config).await?;
    let stopped = polling.cancel_token();

    let result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!(routes = polling.router().routes().len(), "shutdown requested");
            polling.shutdown().await;
            Ok(())
        },
        () = stopped.cancelled() => {
            polling.join().await;
            Err(anyhow::anyhow!("telegram polling stopped: another instance is using this token"))
        },
    };

    let snapshot = metrics.render();
    if !snapshot.is_empty() {
        debug!(metrics = %snapshot, "final metrics snapshot");
    }
    info!("postern stopped");
    result
}

#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_to_run() {
        let cli = Cli::try_parse_from(["postern"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
        assert!(!cli.json_logs);
    }

    #[test]
    fn parses_check_config_with_global_flags() {
        let cli = Cli::try_parse_from([
            "postern",
            "check-config",
            "--verbose",
            "--config",
            "/etc/postern.toml",
            "--json-logs",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::CheckConfig { verbose: true })
        ));
        assert_eq!(cli.config.as_deref(), Some(Path::new("/etc/postern.toml")));
        assert!(cli.json_logs);
    }

    #[test]
    fn explicit_config_path_wins() {
        let path = Path::new("/tmp/custom.toml");
        assert_eq!(resolve_config_path(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn load_config_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(
            &path,
            "[telegram]\ntoken = \"123:abc\"\noperator_id = 5\n\n[relay]\nroute_capacity = 2\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.telegram.operator_id, 5);
        assert_eq!(config.relay.route_capacity, 2);
    }

    #[test]
    fn load_config_surfaces_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "[telegram\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("relay.toml"));
    }
}
