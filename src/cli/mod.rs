//! CLI entry point for Tycho.

use clap::{Parser, Subcommand};

/// Tycho CLI
#[derive(Parser, Debug)]
#[command(name = "tycho", version, about = "Turn orchestration and local protocol gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the protocol gateway in front of a local generate backend
    Serve(ServeArgs),
    /// List models available on the configured backend
    Models,
}

/// Arguments for the `serve` subcommand.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1:3000")]
    pub addr: String,

    /// Base URL of the local generate backend
    #[arg(long, default_value = "http://localhost:11434")]
    pub upstream: String,

    /// Model to serve (repeat for several; first becomes the default)
    #[arg(long = "model")]
    pub models: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_serve_with_defaults() {
        let cli = Cli::try_parse_from(["tycho", "serve"]).unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.addr, "127.0.0.1:3000");
                assert_eq!(args.upstream, "http://localhost:11434");
                assert!(args.models.is_empty());
            }
            other => panic!("expected Serve, got {other:?}"),
        }
    }

    #[test]
    fn parse_serve_with_models() {
        let cli = Cli::try_parse_from([
            "tycho",
            "serve",
            "--addr",
            "0.0.0.0:8080",
            "--upstream",
            "http://localhost:9999",
            "--model",
            "qwen2.5:0.5b",
            "--model",
            "deepseek-r1:1.5b",
        ])
        .unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.addr, "0.0.0.0:8080");
                assert_eq!(args.upstream, "http://localhost:9999");
                assert_eq!(args.models, vec!["qwen2.5:0.5b", "deepseek-r1:1.5b"]);
            }
            other => panic!("expected Serve, got {other:?}"),
        }
    }

    #[test]
    fn parse_models() {
        let cli = Cli::try_parse_from(["tycho", "models"]).unwrap();
        assert!(matches!(cli.command, Commands::Models));
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["tycho"]).is_err());
    }
}
