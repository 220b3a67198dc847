use autodev_core::{NewTask, TaskPriority, TaskType};
use autodev_orchestrator::{DevelopmentSystem, OrchestratorConfig};
use autodev_store::FileTaskStore;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "autodev", about = "autodev — Autonomous development task orchestrator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "autodev.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine until Ctrl-C (or for a fixed duration)
    Run {
        /// Stop after this many seconds
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Print metrics recomputed from the stored records
    Status,
    /// Add a pending task to the store
    Add {
        /// Task type (research, frontend, backend, database, testing,
        /// deployment, ui-ux, portal, api, security)
        #[arg(long = "type")]
        task_type: TaskType,
        #[arg(short, long)]
        description: String,
        #[arg(short, long, default_value = "medium")]
        priority: TaskPriority,
        /// Ids of tasks that must complete first
        #[arg(long = "depends-on")]
        depends_on: Vec<Uuid>,
        #[arg(long, default_value_t = 0.0)]
        estimated_minutes: f64,
    },
}

#[derive(Debug, Deserialize)]
struct AutodevConfig {
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    #[serde(default)]
    orchestrator: OrchestratorConfig,
}

impl Default for AutodevConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

async fn load_config(path: &Path) -> anyhow::Result<AutodevConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(AutodevConfig::default());
    }
    let config_str = tokio::fs::read_to_string(path).await.map_err(|e| {
        anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
    })?;
    let config: AutodevConfig = toml::from_str(&config_str)?;
    config.orchestrator.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;
    let store = Arc::new(FileTaskStore::new(config.data_dir.clone()).await?);

    match cli.command {
        Commands::Run { duration_secs } => {
            info!(data_dir = %config.data_dir.display(), "Starting autodev engine");
            let system = DevelopmentSystem::builder(config.orchestrator)
                .with_store(store)
                .build()?;
            system.start().await?;

            match duration_secs {
                Some(secs) => {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                            info!(secs, "Run duration elapsed");
                        }
                        _ = tokio::signal::ctrl_c() => {
                            info!("Interrupted");
                        }
                    }
                }
                None => {
                    tokio::signal::ctrl_c().await?;
                    info!("Interrupted");
                }
            }

            system.stop().await;
            println!("{}", serde_json::to_string_pretty(&system.get_metrics())?);
        }
        Commands::Status => {
            let metrics = DevelopmentSystem::metrics_from_store(store.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
        Commands::Add {
            task_type,
            description,
            priority,
            depends_on,
            estimated_minutes,
        } => {
            let system = DevelopmentSystem::builder(config.orchestrator)
                .with_store(store)
                .build()?;
            let task = NewTask::new(task_type, description)
                .with_priority(priority)
                .with_dependencies(depends_on)
                .with_estimated_duration(estimated_minutes);
            match system.add_task(task).await {
                Ok(id) => println!("{id}"),
                Err(e) if e.is_config() => {
                    warn!(error = %e, "Task rejected");
                    eprintln!("rejected: {e}");
                    std::process::exit(2);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_layout() {
        let config: AutodevConfig = toml::from_str(
            r#"
            data_dir = "/var/lib/autodev"

            [orchestrator]
            max_concurrent_tasks = 3
            monitoring_interval_ms = 5000

            [orchestrator.features]
            enable_security = false

            [orchestrator.quality]
            remediation = true
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/autodev"));
        assert_eq!(config.orchestrator.max_concurrent_tasks, 3);
        assert!(!config.orchestrator.features.is_enabled(TaskType::Security));
        assert!(config.orchestrator.quality.remediation);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AutodevConfig = toml::from_str("").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.orchestrator.max_concurrent_tasks, 10);
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).await.unwrap();
        assert!(config.orchestrator.auto_deploy);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autodev.toml");
        tokio::fs::write(&path, "[orchestrator]\nmax_concurrent_tasks = 0\n")
            .await
            .unwrap();
        assert!(load_config(&path).await.is_err());
    }

    #[test]
    fn test_cli_parses_add() {
        let cli = Cli::try_parse_from([
            "autodev",
            "add",
            "--type",
            "ui-ux",
            "--description",
            "Design system",
            "--priority",
            "high",
        ])
        .unwrap();
        match cli.command {
            Commands::Add {
                task_type,
                priority,
                depends_on,
                ..
            } => {
                assert_eq!(task_type, TaskType::UiUx);
                assert_eq!(priority, TaskPriority::High);
                assert!(depends_on.is_empty());
            }
            _ => panic!("expected add"),
        }
    }
}
