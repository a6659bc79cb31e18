//! Configuration inspection and setup.

use std::path::Path;

use clap::{Args, Subcommand};
use mixdown_config::{MixdownConfig, ensure_user_config_dir, find_config, user_config_path};

use super::common::load_config;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show which configuration file is in use
    Path,
}

pub fn run(args: ConfigArgs, config: Option<&Path>) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let effective = load_config(config)?;
            print!("{}", effective.to_toml()?);
            Ok(())
        }
        ConfigCommand::Init { force } => {
            let path = match config {
                Some(path) => path.to_path_buf(),
                None => {
                    ensure_user_config_dir()?;
                    user_config_path()
                }
            };
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists. Use --force to overwrite.",
                    path.display()
                );
            }
            MixdownConfig::default().save(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        ConfigCommand::Path => {
            match find_config(config) {
                Some(path) => println!("{}", path.display()),
                None => println!("(defaults; no config file found)"),
            }
            println!("user config: {}", user_config_path().display());
            Ok(())
        }
    }
}
