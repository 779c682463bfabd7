use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Load weather observation records into a rate limited document store")]
pub struct ArgsParser {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// load one batch of observations
    Run {
        #[command(flatten)]
        args: RunArgs,
    },
    /// validate the configuration and print it (password masked)
    CheckConfig {
        #[arg(long, short, help = "config filepath")]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(long, short, help = "config filepath")]
    pub config: PathBuf,
    #[arg(
        long,
        help = "override `loader.max_retries`: how many failed attempts the batch may absorb before giving up"
    )]
    pub max_retries: Option<u32>,
    #[arg(
        long,
        help = "load into a throwaway in-memory store instead of the configured data store (checks the records can be read and keyed)"
    )]
    pub dry_run: bool,
    #[arg(
        long,
        help = "skip the check for an already loaded batch, and insert unconditionally"
    )]
    pub no_check: bool,
}

#[cfg(test)]
mod test {
    use clap::{CommandFactory, Parser};

    use super::{ArgsParser, Cmd};

    #[test]
    fn verify_cli() {
        ArgsParser::command().debug_assert();
    }

    #[test]
    fn run_args() {
        let args = ArgsParser::parse_from([
            "observation-loader",
            "run",
            "--config",
            "loader.toml",
            "--max-retries",
            "3",
            "--dry-run",
        ]);
        let Cmd::Run { args } = args.cmd else {
            panic!("expected run");
        };
        assert_eq!(args.config.to_str(), Some("loader.toml"));
        assert_eq!(args.max_retries, Some(3));
        assert!(args.dry_run);
        assert!(!args.no_check);
    }
}
