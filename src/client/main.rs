/**
 * CompliSite Sync Agent Entry Point
 *
 * Runs the device-side sync core without a UI: opens the local queue,
 * probes the remote API for connectivity and drains queued mutations.
 *
 * Usage: complisite-sync [--config <file>] [run|status|drain|gc]
 */

#[cfg(feature = "agent")]
mod agent {
    use clap::{Parser, Subcommand};
    use complisite_sync::client::{
        Config, DrainOutcome, HttpRemoteApi, LocalDatabase, NetworkMonitor, NetworkStatus,
        RemoteApi, SyncService, Synchronizer,
    };
    use complisite_sync::client::sync::SyncConfig;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio::task::JoinHandle;

    type AnyError = Box<dyn std::error::Error>;

    #[derive(Debug, Parser)]
    #[command(name = "complisite-sync")]
    #[command(version)]
    #[command(about = "Offline write queue and sync agent for CompliSite devices")]
    pub struct Cli {
        #[arg(
            short = 'c',
            long,
            global = true,
            env = "COMPLISITE_CONFIG",
            help = "TOML configuration file layered under COMPLISITE_* variables."
        )]
        pub config: Option<PathBuf>,

        #[command(subcommand)]
        pub command: Option<Command>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
    pub enum Command {
        /// Sync until interrupted (default)
        Run,
        /// Print queue and connectivity status
        Status,
        /// Drain the whole queue once
        Drain,
        /// Delete mutations the remote already acknowledged
        Gc,
    }

    /// Scoped wakes come from `SIGUSR1` (checklists) and `SIGUSR2` (photos)
    #[cfg(unix)]
    fn start_background(synchronizer: Arc<Synchronizer>) -> Result<Vec<JoinHandle<()>>, AnyError> {
        use complisite_sync::client::sync::background::spawn_signal_wakes;
        use complisite_sync::client::{BackgroundSync, SyncTag};

        let (mut background, wake) = BackgroundSync::new(synchronizer, 16);
        for tag in SyncTag::ALL {
            background.register(tag);
        }
        let signals = spawn_signal_wakes(wake)?;
        tracing::info!("background wakes: SIGUSR1 sync-checklists, SIGUSR2 sync-photos");
        Ok(vec![background.spawn(), signals])
    }

    #[cfg(not(unix))]
    fn start_background(_synchronizer: Arc<Synchronizer>) -> Result<Vec<JoinHandle<()>>, AnyError> {
        tracing::info!("no wake source on this platform, background tags disabled");
        Ok(Vec::new())
    }

    pub async fn main() -> Result<(), AnyError> {
        // Load environment variables from .env file if present
        dotenv::dotenv().ok();
        let cli = Cli::parse();

        let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
            .init();

        let config = Config::load(cli.config.as_deref())?;
        let db_path = config.database_path();
        let db = LocalDatabase::open(&db_path)
            .await?
            .with_capacity(config.max_pending_mutations());

        let remote: Arc<dyn RemoteApi> = Arc::new(HttpRemoteApi::new(config.clone()));
        let online = remote.ping().await;
        let monitor = NetworkMonitor::new(NetworkStatus::from_online(online));
        tracing::info!(api = %config.server_url(), online, "remote probed");

        let synchronizer = Arc::new(Synchronizer::new(
            Arc::new(db.clone()),
            Arc::clone(&remote),
            monitor.clone(),
        ));
        synchronizer.restore_state().await?;

        let mut service = SyncService::new(SyncConfig::from(&config), Arc::clone(&synchronizer));

        match cli.command.unwrap_or(Command::Run) {
            Command::Status => {
                let status = service.status().await;
                let stats = db.get_stats().await?;
                println!("database:  {}", db_path.display());
                println!("network:   {:?}", status.network_status);
                println!("pending:   {}", stats.pending_mutations);
                println!("synced:    {} (awaiting cleanup)", stats.synced_mutations);
                match status.last_sync {
                    Some(at) => println!("last sync: {}", at.to_rfc3339()),
                    None => println!("last sync: never"),
                }
            }
            Command::Drain => match service.force_sync().await {
                Ok(DrainOutcome::Drained(report)) => {
                    println!("synced {} of {} mutations", report.synced.len(), report.attempted);
                }
                Ok(DrainOutcome::Skipped) => println!("a drain is already running"),
                Err(e) => {
                    eprintln!("drain incomplete: {}", e);
                    std::process::exit(1);
                }
            },
            Command::Gc => {
                let deleted = service.collect_garbage().await?;
                println!("removed {} acknowledged mutations", deleted);
            }
            Command::Run => {
                let probe = monitor.spawn_probe(Arc::clone(&remote), config.probe_interval());

                let background_tasks = start_background(Arc::clone(&synchronizer))?;

                service.start()?;
                tracing::info!(pending = service.status().await.pending_operations, "sync agent running");

                tokio::signal::ctrl_c().await?;
                tracing::info!("shutdown requested");

                service.stop();
                for task in background_tasks {
                    task.abort();
                }
                probe.abort();
                db.close().await;
            }
        }

        Ok(())
    }

}

#[cfg(feature = "agent")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    agent::main().await
}

#[cfg(not(feature = "agent"))]
fn main() {
    eprintln!("The sync agent requires the 'agent' feature to be enabled.");
    eprintln!("Run with: cargo run --bin complisite-sync --features agent");
    std::process::exit(1);
}
