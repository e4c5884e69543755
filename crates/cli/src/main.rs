mod cli;
mod commands;
mod config;

use anyhow::{Context, Result};
use clap::Parser;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = cli::Cli::parse();

    let config_path = config::resolve_path(cli.config.as_deref())?;
    let app_config = config::load_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    match cli.command {
        cli::Commands::Mask {
            inputs,
            output_dir,
            verify,
            jobs,
        } => commands::mask::handle(
            &app_config,
            commands::mask::MaskArgs {
                inputs,
                output_dir,
                verify,
                jobs,
            },
        ),
        cli::Commands::Classify { text } => commands::classify::handle(&app_config, &text),
        cli::Commands::Fetch {
            output_name,
            dest,
            output_dir,
        } => commands::fetch::handle(&app_config, &output_name, &dest, output_dir),
        cli::Commands::Config { init } => commands::config::handle(&app_config, &config_path, init),
    }
}
