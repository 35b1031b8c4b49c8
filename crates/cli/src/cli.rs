// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::cache::CacheCommands;
use crate::helpers::telemetry::setup_tracing;
use crate::{cache, config, demo};
use anyhow::Result;
use clap::{command, ArgAction, Parser, Subcommand};
use fdt_config::{load_config, AppConfig};
use fdt_data::SledStore;
use std::path::PathBuf;
use tracing::{info, instrument, Level};

#[derive(Parser, Debug)]
#[command(name = "diet")]
#[command(about = "Submit and read encrypted daily calorie records", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,

    /// Indicate error levels by adding additional `-v` arguments. Eg. `diet -vvv` will give you
    /// trace level output
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true
    )]
    pub verbose: u8,

    /// Silence all output. This argument cannot be used alongside `-v`
    #[arg(
        short,
        long,
        action = ArgAction::SetTrue,
        conflicts_with = "verbose",
        global = true
    )]
    quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else {
            match self.verbose {
                0 => Level::WARN,  //
                1 => Level::INFO,  // -v
                2 => Level::DEBUG, // -vv
                _ => Level::TRACE, // -vvv
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn execute(self) -> Result<()> {
        setup_tracing(self.log_level())?;

        let config = self.load_config()?;
        info!("Config loaded from: {:?}", config.config_file());

        match self.command {
            Commands::Demo {
                chain,
                calories_in,
                calories_out,
                average,
            } => demo::execute(&config, chain, calories_in, calories_out, average).await?,
            Commands::Cache { command } => cache::execute(command, &config).await?,
            Commands::Config => config::execute(&config)?,
        }

        SledStore::close_all_connections();

        Ok(())
    }

    pub fn load_config(&self) -> Result<AppConfig> {
        load_config(self.config.clone())
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit one day of calories, then read the record and an average back
    Demo {
        /// Chain name from the configuration. Defaults to the first configured chain
        #[arg(long)]
        chain: Option<String>,

        /// Calories eaten
        #[arg(long = "calories-in")]
        calories_in: u32,

        /// Calories burned
        #[arg(long = "calories-out")]
        calories_out: u32,

        /// Also compute and decrypt the average balance over this many recent records
        #[arg(long)]
        average: Option<u64>,
    },

    /// Manage cached decryption signatures
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Print the resolved configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_maps_to_level() {
        let cli = Cli::try_parse_from(["diet", "config"]).unwrap();
        assert_eq!(cli.log_level(), Level::WARN);

        let cli = Cli::try_parse_from(["diet", "-vv", "config"]).unwrap();
        assert_eq!(cli.log_level(), Level::DEBUG);

        let cli = Cli::try_parse_from(["diet", "config", "-q"]).unwrap();
        assert_eq!(cli.log_level(), Level::ERROR);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["diet", "-q", "-v", "config"]).is_err());
    }

    #[test]
    fn test_demo_arguments() {
        let cli = Cli::try_parse_from([
            "diet",
            "--config",
            "/tmp/diet.config.yaml",
            "demo",
            "--calories-in",
            "2000",
            "--calories-out",
            "500",
            "--average",
            "7",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/diet.config.yaml")));
        match cli.command {
            Commands::Demo {
                chain,
                calories_in,
                calories_out,
                average,
            } => {
                assert_eq!(chain, None);
                assert_eq!((calories_in, calories_out), (2000, 500));
                assert_eq!(average, Some(7));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_calories_must_fit_u32() {
        assert!(Cli::try_parse_from([
            "diet",
            "demo",
            "--calories-in",
            "-5",
            "--calories-out",
            "1",
        ])
        .is_err());
    }
}
