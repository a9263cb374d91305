use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use route_composer::config::{load_config, ServerConfig};
use route_composer::lifecycle::{root_router_name, Project};
use route_composer::modules::{ExtensionResolver, ModuleResolver};
use route_composer::observability::init_logging;
use route_composer::routing::{Node, NodeSummary};

#[derive(Parser)]
#[command(name = "route-tree")]
#[command(about = "Inspect convention-based route directories", long_about = None)]
struct Cli {
    /// Server configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File extensions that count as modules
    #[arg(short, long, default_value = "rs")]
    ext: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the discovered routes tree
    Tree {
        /// Project root
        project: PathBuf,

        /// Print JSON instead of an indented tree
        #[arg(long)]
        json: bool,
    },
    /// Verify the routes directory provides a root router
    Check {
        /// Project root
        project: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    init_logging(&config.observability)?;

    let resolver: Arc<dyn ModuleResolver<()>> = Arc::new(ExtensionResolver::new(&cli.ext));

    match cli.command {
        Commands::Tree { project, json } => {
            let mut node = scan(&Project::new(project), &config, resolver)?;
            let summary = node.summary()?;
            node.destroy();

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_tree(&summary, 0);
            }
        }
        Commands::Check { project } => {
            let mut node = scan(&Project::new(project), &config, resolver)?;
            let name = root_router_name(&node)?;
            println!("root router: {}", node.location()?.join(name).display());
            node.destroy();
        }
    }

    Ok(())
}

fn scan(
    project: &Project,
    config: &ServerConfig,
    resolver: Arc<dyn ModuleResolver<()>>,
) -> Result<Node<()>, route_composer::RouteError> {
    let mut node = Node::new(project.routes_location(config), resolver).with_key_prefix(&config.routes.location);
    node.traverse()?;
    Ok(node)
}

fn print_tree(summary: &NodeSummary, depth: usize) {
    let indent = "  ".repeat(depth);
    let name = if depth == 0 { "" } else { summary.name.as_str() };
    println!("{indent}{name}/");

    for file in &summary.files {
        println!("{indent}  {file}");
    }
    for child in &summary.children {
        print_tree(child, depth + 1);
    }
}
