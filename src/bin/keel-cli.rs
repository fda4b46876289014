use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use keel::config::{load_config, AppConfig};
use keel::routing::{RouteTable, Router};

#[derive(Parser)]
#[command(name = "keel-cli")]
#[command(about = "Inspect keel configuration and routes", long_about = None)]
struct Cli {
    /// Configuration file; defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the configuration
    Check,
    /// List the compiled route table in match order
    Routes,
    /// Resolve a URI against the route table
    Match {
        /// URI to resolve, e.g. /posts/show/7
        uri: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Check => {
            println!(
                "Configuration OK: {} routes, {} modules",
                config.routes.len(),
                config.modules.len()
            );
        }
        Commands::Routes => {
            let table = RouteTable::from_config(&config)?;
            for (i, route) in table.routes().iter().enumerate() {
                let paths = route.paths();
                println!(
                    "{:>3}  {:<32} {:<12} module={} controller={} action={}",
                    i,
                    route.pattern().as_str(),
                    route.name().unwrap_or("-"),
                    paths.module.as_deref().unwrap_or("-"),
                    paths.controller.as_deref().unwrap_or("-"),
                    paths.action.as_deref().unwrap_or("-"),
                );
            }
        }
        Commands::Match { uri } => {
            let table = RouteTable::from_config(&config)?;
            let mut router = Router::new(Arc::new(table));
            router.handle(Some(&uri));
            match router.matched_route() {
                Some(m) => println!("{}", serde_json::to_string_pretty(m)?),
                None => {
                    let fallback = serde_json::json!({
                        "matched": false,
                        "module": router.module_name(),
                        "namespace": router.namespace_name(),
                        "controller": router.controller_name(),
                        "action": router.action_name(),
                    });
                    println!("{}", serde_json::to_string_pretty(&fallback)?);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
