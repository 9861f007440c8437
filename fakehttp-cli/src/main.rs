//! CLI for fakehttp: serve mock JSON routes from a file, try out route patterns.

mod routes;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fakehttp_core::JsonHandler;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fakehttp")]
#[command(about = "JSON mock server for HTTP client tests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the routes declared in a JSON file until Ctrl-C.
    Serve {
        /// Routes file (JSON array of {method, path, status?, response?, echo?})
        #[arg(long)]
        routes: PathBuf,
        #[arg(long, env = "HOST", default_value = "127.0.0.1")]
        host: String,
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,
    },
    /// Match a path against a route pattern and print the extracted parameters.
    Match {
        /// Glob pattern, e.g. /groups/*/users/*
        pattern: String,
        /// Request path, e.g. /groups/admins/users/42
        path: String,
    },
}

fn run_serve(routes: PathBuf, host: &str, port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let specs = routes::load(&routes)?;
    let handler = routes::build(specs);
    if handler.is_empty() {
        tracing::warn!(file = %routes.display(), "no usable routes, every request will get 404");
    }
    fakehttp_core::server::run(handler, host, port)
}

fn run_match(pattern: &str, path: &str) -> Result<ExitCode, Box<dyn std::error::Error + Send + Sync>> {
    let handler = JsonHandler::new("", pattern);
    match handler.check_path(path) {
        Ok(params) => {
            println!("{}", serde_json::to_string(&params)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{}", err);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { routes, host, port } => run_serve(routes, &host, port).map(|()| ExitCode::SUCCESS),
        Commands::Match { pattern, path } => run_match(&pattern, &path),
    }
}
