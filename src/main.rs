//! prompthub-mcp: MCP server for protocol-addressed prompt resource management
//!
//! Exposes a priority-merged prompt resource registry with layered
//! discovery and PATEOAS command dispatch to AI assistants over stdio.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use glob::Pattern;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use prompthub_mcp::command::Dispatcher;
use prompthub_mcp::config::{self, Config};
use prompthub_mcp::mcp::server::McpServer;
use prompthub_mcp::registry::{DirectorySource, DiscoverySource, ProtocolResolver, SourceTier, TierRoots};
use prompthub_mcp::state::ProcessState;

/// MCP server for protocol-addressed prompt resource management.
///
/// Discovers prompt resources across user, project, and package tiers,
/// merges them by precedence, and serves them through PATEOAS commands.
#[derive(Parser, Debug)]
#[command(name = "prompthub-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves the tier roots from config, falling back to platform defaults.
fn tier_roots(cfg: &Config) -> TierRoots {
    TierRoots {
        user: cfg.user_dir.clone().unwrap_or_else(|| {
            config::default_user_dir().unwrap_or_else(|| PathBuf::from(".prompthub-user"))
        }),
        project: cfg
            .project_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".prompthub")),
        package: cfg.package_dir.clone().unwrap_or_else(|| {
            config::default_config_dir()
                .map_or_else(|| PathBuf::from("resources"), |d| d.join("package"))
        }),
    }
}

/// Builds the three tiered discovery sources from config.
///
/// Pattern validation already happened in `Config::validate`; a pattern
/// failing to compile here is skipped with a warning rather than aborting.
fn discovery_sources(cfg: &Config, roots: &TierRoots) -> Vec<Arc<dyn DiscoverySource>> {
    let patterns: Vec<Pattern> = cfg
        .discovery
        .patterns
        .iter()
        .filter_map(|p| match Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!(pattern = %p, error = %e, "Skipping invalid discovery pattern");
                None
            }
        })
        .collect();

    vec![
        Arc::new(DirectorySource::new(
            SourceTier::User,
            roots.user.clone(),
            patterns.clone(),
        )),
        Arc::new(DirectorySource::new(
            SourceTier::Project,
            roots.project.clone(),
            patterns.clone(),
        )),
        Arc::new(DirectorySource::new(
            SourceTier::Package,
            roots.package.clone(),
            patterns,
        )),
    ]
}

/// Entry point for the prompthub-mcp server.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nDefault config location: {}", default_path.display());
                }
            }
            return ExitCode::FAILURE;
        }
    };

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting prompthub-mcp server"
    );

    let roots = tier_roots(&cfg);
    info!(
        user = %roots.user.display(),
        project = %roots.project.display(),
        package = %roots.package.display(),
        "Tier roots configured"
    );

    let state_path = cfg.state_path.clone().unwrap_or_else(|| {
        config::default_state_path().unwrap_or_else(|| PathBuf::from("prompthub-state.json"))
    });

    let state = match ProcessState::load(&state_path) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to load persisted state");
            return ExitCode::FAILURE;
        }
    };

    let sources = discovery_sources(&cfg, &roots);
    let resolver = ProtocolResolver::new(roots);

    let dispatcher = match Dispatcher::new(resolver, state, sources) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            error!(error = %e, "Failed to construct command dispatcher");
            return ExitCode::FAILURE;
        }
    };

    // Create MCP server
    let mut server = McpServer::new(dispatcher);

    info!("MCP server ready, waiting for client connection...");

    // Run the server
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(server.run());

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn log_level_from_flags() {
        assert_eq!(get_log_level(0, true, "debug"), Level::ERROR);
        assert_eq!(get_log_level(1, false, "warn"), Level::INFO);
        assert_eq!(get_log_level(3, false, "warn"), Level::TRACE);
        assert_eq!(get_log_level(0, false, "debug"), Level::DEBUG);
        assert_eq!(get_log_level(0, false, "bogus"), Level::WARN);
    }

    #[test]
    fn tier_roots_prefer_config_values() {
        let cfg: Config = serde_json::from_str(
            r#"{"user_dir": "/u", "project_dir": "/p", "package_dir": "/k"}"#,
        )
        .unwrap();
        let roots = tier_roots(&cfg);
        assert_eq!(roots.user, PathBuf::from("/u"));
        assert_eq!(roots.project, PathBuf::from("/p"));
        assert_eq!(roots.package, PathBuf::from("/k"));
    }

    #[test]
    fn three_sources_in_tier_order() {
        let cfg = Config::default();
        let roots = tier_roots(&cfg);
        let sources = discovery_sources(&cfg, &roots);
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].tier(), SourceTier::User);
        assert_eq!(sources[1].tier(), SourceTier::Project);
        assert_eq!(sources[2].tier(), SourceTier::Package);
    }
}
