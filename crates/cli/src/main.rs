mod console;

use {
    clap::{Parser, Subcommand},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    outpost_channels::LoopbackPlatform,
    outpost_config::{Mode, OutpostConfig},
    outpost_supervisor::Supervisor,
};

#[derive(Parser)]
#[command(name = "outpost", about = "Outpost — chat-platform command bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot (the container entry point).
    Start {
        /// Override the health endpoint bind address.
        #[arg(long)]
        bind: Option<String>,
        /// Override the health endpoint port.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the effective configuration.
    Config,
    /// Validate configuration and report problems.
    Doctor,
}

/// Console (pretty or JSON) plus an always-on log file under the data
/// directory. The returned guard must stay alive for the process lifetime.
fn init_telemetry(cli: &Cli) -> tracing_appender::non_blocking::WorkerGuard {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let data_dir = outpost_config::data_dir();
    let _ = std::fs::create_dir_all(&data_dir);
    let file_appender = tracing_appender::rolling::never(&data_dir, "outpost.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "outpost starting");

    match cli.command {
        Commands::Start { bind, port } => {
            let mut config = outpost_config::discover_and_load();
            if let Some(bind) = bind {
                config.gateway.bind = bind;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            start(config).await
        },
        Commands::Config => {
            let config = outpost_config::discover_and_load();
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        },
        Commands::Doctor => doctor(),
    }
}

async fn start(config: OutpostConfig) -> anyhow::Result<()> {
    let supervisor = Supervisor::new(config.clone());
    let (platform, handle) = LoopbackPlatform::new();

    match config.mode {
        Mode::Development => {
            // Dev profile: stdin lines become events, replies print back.
            console::attach(handle);
        },
        Mode::Production => {
            // The real platform integration is deployment-specific and
            // linked in downstream; without one, run the loopback idle so
            // the container still serves its liveness probe.
            warn!("no platform integration configured, running loopback idle");
            tokio::spawn(async move {
                let mut handle = handle;
                while handle.next_reply().await.is_some() {}
            });
        },
    }

    supervisor.run(Box::new(platform)).await
}

fn doctor() -> anyhow::Result<()> {
    let config = outpost_config::discover_and_load();

    let mut problems = Vec::new();
    if config.dispatch.command_prefix.is_empty() {
        problems.push("dispatch.command_prefix is empty");
    }
    if config.dispatch.handler_timeout_secs == 0 {
        problems.push("dispatch.handler_timeout_secs must be positive");
    }
    if config.dispatch.channel_queue_depth == 0 {
        problems.push("dispatch.channel_queue_depth must be positive");
    }
    if config.supervisor.drain_timeout_secs == 0 {
        problems.push("supervisor.drain_timeout_secs must be positive");
    }
    if config.outbound.batch_size == 0 {
        problems.push("outbound.batch_size must be positive");
    }

    if problems.is_empty() {
        println!(
            "config ok ({} mode)",
            format!("{:?}", config.mode).to_lowercase()
        );
        Ok(())
    } else {
        for problem in &problems {
            println!("problem: {problem}");
        }
        anyhow::bail!("{} configuration problem(s) found", problems.len())
    }
}
