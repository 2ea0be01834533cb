mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use clawlite_core::config::RunnerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    clawlite_core::observability::init_tracing();
    let cli = Cli::parse();
    let config = RunnerConfig::from_env();

    match cli.command {
        Commands::Run {
            group_folder,
            input_json,
            name,
            main,
            stream,
            timeout_ms,
            env_file,
            tasks,
            groups,
        } => {
            let input_json = commands::read_input_arg(&input_json)?;
            let request = commands::run::RunRequest {
                group_folder,
                name,
                is_main: main,
                stream,
                timeout_ms,
                env_file,
                tasks,
                groups,
            };
            let output = commands::run::cmd_run(config, request, &input_json).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            if !output.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Prepare { group_folder, main } => {
            let workspace = commands::prepare::cmd_prepare(&config, &group_folder, main)?;
            println!("{}", serde_json::to_string_pretty(&workspace)?);
        }
    }
    Ok(())
}
