use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::process;

mod cli;

use cli::projects::ProjectsCommands;
use droneguide_cli::{init_tracing, run_server, Config};
use droneguide_config::{constants, defaults};

#[derive(Parser)]
#[command(name = "droneguide")]
#[command(about = "DroneGuide - camera-guided drone assembly assistant")]
#[command(version)]
struct Cli {
    /// Base URL of a running DroneGuide server
    #[arg(long, global = true, env = constants::DRONEGUIDE_API_URL, default_value = defaults::API_URL)]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Address to bind (overrides HOST)
        #[arg(long)]
        host: Option<std::net::IpAddr>,
    },
    /// Check that the server is up
    Health,
    /// Manage assembly projects
    #[command(subcommand)]
    Projects(ProjectsCommands),
    /// Check a photo of the build against the current step
    Analyze {
        /// Path to a JPEG photo of the assembly
        image: PathBuf,
        /// Assembly step being worked on
        #[arg(short, long, default_value = "1")]
        step: u32,
    },
    /// Ask a question about the build
    Ask {
        /// The question
        query: String,
        /// Path to a JPEG photo of the assembly
        #[arg(short, long)]
        image: PathBuf,
        #[arg(short, long, default_value = "1")]
        step: u32,
    },
    /// Generate a visualization of the finished drone
    Visualize {
        /// What to render
        prompt: String,
        /// Where to write the image
        #[arg(short, long, default_value = "droneguide-visual.jpg")]
        output: PathBuf,
        /// Seconds between progress checks
        #[arg(long, default_value = "10")]
        interval: u64,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = match cli.command {
        Commands::Serve { .. } => "info,tower_http=info",
        _ => "warn",
    };
    init_tracing(default_filter);

    if let Err(e) = handle_command(cli.api_url, cli.command).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn handle_command(
    api_url: String,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Serve { port, host } => {
            let mut config = Config::from_env()?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            println!(
                "{} http://{}",
                "🚁 DroneGuide server starting on".green().bold(),
                config.socket_addr()
            );
            run_server(config).await?;
            Ok(())
        }
        Commands::Health => cli::assist::health(&api_url).await,
        Commands::Projects(cmd) => cli::projects::handle_projects_command(&api_url, cmd).await,
        Commands::Analyze { image, step } => cli::assist::analyze(&api_url, &image, step).await,
        Commands::Ask { query, image, step } => {
            cli::assist::ask(&api_url, &query, &image, step).await
        }
        Commands::Visualize {
            prompt,
            output,
            interval,
        } => cli::visualize::visualize(&api_url, &prompt, &output, interval).await,
    }
}
