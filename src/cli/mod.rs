//! Command-line interface for Vista.
//!
//! Runs a synthetic workload through the recording pipeline and prints the
//! resulting view snapshots. Useful for checking a configuration file and
//! for eyeballing what the aggregations produce.

use crate::core::config::ConfigBuilder;
use crate::core::types::{MeasurementDescriptor, MeasurementMap, TagKey, TagValue, Tags};
use crate::core::{Config, Result, StatsError};
use crate::queue::{BackgroundQueue, EventQueue};
use crate::stats::view::ViewSnapshot;
use crate::stats::{presets, StatsManager};
use clap::{Parser, ValueEnum};
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

const METHODS: &[&str] = &["GetUser", "ListOrders", "CreateOrder", "Health"];
const TAG_VALUES: &[&str] = &["a", "b", "c"];

/// Output format for view snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// Record a synthetic workload and print the resulting views
#[derive(Parser, Debug)]
#[command(name = "vista")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/vista/config.yaml)
    #[arg(short, long, env = "VISTA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of record calls per producer
    #[arg(long, env = "VISTA_SAMPLES", default_value_t = 1000)]
    pub samples: usize,

    /// Number of producer threads
    #[arg(long, env = "VISTA_PRODUCERS", default_value_t = 4)]
    pub producers: usize,

    /// Snapshot output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long, env = "VISTA_DEBUG")]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration from the given file, else the default location, else defaults.
    pub fn load_config(&self) -> Result<Config> {
        let builder = ConfigBuilder::new();

        let config_path = match &self.config {
            Some(path) => path.clone(),
            None => {
                let default_path = dirs::config_dir()
                    .map(|d| d.join("vista").join("config.yaml"))
                    .unwrap_or_else(|| PathBuf::from("~/.config/vista/config.yaml"));
                if !default_path.exists() {
                    tracing::debug!("No config file found at {:?}, using defaults", default_path);
                    return builder.debug(self.debug).build();
                }
                default_path
            },
        };

        let builder = builder.from_file(&config_path).map_err(|e| match e {
            StatsError::Io(io) => StatsError::config(format!(
                "Failed to read config file {:?}: {}",
                config_path, io
            )),
            other => other,
        })?;
        tracing::info!("Loaded configuration from: {:?}", config_path);

        builder.debug(self.debug).build()
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self, config: Option<&Config>) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let configured = config.map_or("info", |c| c.logging.level.as_str());
        let env_log_level =
            std::env::var("VISTA_LOG_LEVEL").unwrap_or_else(|_| configured.to_string());
        let log_level = if self.debug {
            "debug"
        } else {
            env_log_level.as_str()
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let structured = config.is_some_and(|c| c.logging.structured);
        let fmt_layer = if structured {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_line_number(true)
                .compact()
        } else {
            tracing_subscriber::fmt::layer().with_target(false).compact()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| StatsError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Execute the Vista CLI.
pub fn execute(cli: Cli) -> Result<()> {
    // Config first so its log level applies
    let config = cli.load_config()?;
    cli.init_logging(Some(&config))?;

    if cli.check_config {
        println!("Configuration is valid!");
        println!("  Queue capacity: {}", config.queue.capacity);
        println!("  Registration policy: {:?}", config.registration.policy);
        println!("  Declared measurements: {}", config.registration.measurements.len());
        println!("  Views: {}", config.registration.views.len());
        return Ok(());
    }

    let snapshots = run_workload(&config, cli.samples, cli.producers)?;
    print_snapshots(&snapshots, cli.format)
}

/// Records `samples` random values per producer thread into every configured
/// view plus the preset RPC latency view, then drains the queue.
pub fn run_workload(config: &Config, samples: usize, producers: usize) -> Result<Vec<ViewSnapshot>> {
    let queue = Arc::new(BackgroundQueue::new(&config.queue)?);
    let manager = Arc::new(StatsManager::from_config(
        config,
        Arc::clone(&queue) as Arc<dyn EventQueue>,
    )?);
    manager.register_view(presets::rpc_client_roundtrip_latency_view())?;

    let views = manager.registered_views();
    let mut measurements: Vec<MeasurementDescriptor> = Vec::new();
    let mut tag_keys: Vec<TagKey> = Vec::new();
    for view in &views {
        if !measurements.iter().any(|m| m.name() == view.measurement().name()) {
            measurements.push(view.measurement().clone());
        }
        for key in view.tag_keys() {
            if !tag_keys.contains(key) {
                tag_keys.push(key.clone());
            }
        }
    }
    let measurements = Arc::new(measurements);
    let tag_keys = Arc::new(tag_keys);

    tracing::info!(
        views = views.len(),
        producers,
        samples,
        "Starting synthetic workload"
    );

    let handles: Vec<_> = (0..producers)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let measurements = Arc::clone(&measurements);
            let tag_keys = Arc::clone(&tag_keys);
            thread::spawn(move || -> Result<()> {
                let mut rng = rand::thread_rng();
                for _ in 0..samples {
                    let tags = random_tags(&mut rng, &tag_keys)?;
                    let map = measurements
                        .iter()
                        .fold(MeasurementMap::builder(), |builder, m| {
                            builder.put(m, rng.gen_range(1.0..250.0))
                        })
                        .build();
                    manager.record(tags, map)?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle
            .join()
            .map_err(|_| StatsError::config("producer thread panicked"))??;
    }

    queue.shutdown()?;
    let stats = queue.stats();
    tracing::info!(
        processed = stats.processed,
        failed = stats.failed,
        "Workload complete"
    );

    Ok(manager.snapshots())
}

fn random_tags(rng: &mut impl Rng, keys: &[TagKey]) -> Result<Tags> {
    let mut tags = Tags::new();
    for key in keys {
        let pool = if key.as_str() == presets::RPC_METHOD {
            METHODS
        } else {
            TAG_VALUES
        };
        if let Some(value) = pool.choose(rng) {
            tags.insert(key.clone(), TagValue::new(*value)?);
        }
    }
    Ok(tags)
}

fn print_snapshots(snapshots: &[ViewSnapshot], format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(snapshots)?,
        OutputFormat::Yaml => serde_yaml::to_string(snapshots)
            .map_err(|e| StatsError::config(format!("Failed to render YAML: {}", e)))?,
    };
    println!("{}", rendered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::QueueConfig;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["vista"]);
        assert!(cli.config.is_none());
        assert_eq!(cli.samples, 1000);
        assert_eq!(cli.producers, 4);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(!cli.debug);
        assert!(!cli.check_config);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "vista",
            "--samples",
            "10",
            "--producers",
            "2",
            "--format",
            "yaml",
            "--check-config",
        ]);
        assert_eq!(cli.samples, 10);
        assert_eq!(cli.producers, 2);
        assert_eq!(cli.format, OutputFormat::Yaml);
        assert!(cli.check_config);
    }

    #[test]
    fn test_run_workload_counts_every_sample() {
        let config = Config {
            queue: QueueConfig {
                capacity: 16,
                ..QueueConfig::default()
            },
            ..Config::default()
        };
        let snapshots = run_workload(&config, 50, 3).unwrap();
        assert_eq!(snapshots.len(), 1);

        match &snapshots[0] {
            ViewSnapshot::Distribution(view) => {
                let total: u64 = view.groups.iter().map(|g| g.aggregate.count).sum();
                assert_eq!(total, 150);
                assert!(view.groups.iter().all(|g| g.tags.get(presets::RPC_METHOD).is_some()));
            },
            ViewSnapshot::Interval(_) => panic!("preset view is a distribution"),
        }
    }
}
