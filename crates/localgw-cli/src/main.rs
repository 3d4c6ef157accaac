use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use localgw_cli::commands::init::{handle_init, InitOutcome, InitRequest};
use localgw_cli::commands::routes::{handle_routes, RoutesFormat};
use localgw_cli::logging::{init_logging, LoggingConfig};

const DEFAULT_OUTPUT: &str = "mock_api/config.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about = "Local API gateway configuration from infrastructure templates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a template and write the mock configuration document.
    Init {
        /// Template file. Defaults to template.yaml/template.yml, then
        /// cdk.out/*template.json in the working directory.
        #[arg(long)]
        template: Option<PathBuf>,
        /// The template is a synthesized (cdk.out) template.
        #[arg(long)]
        cdk: bool,
        /// Configuration document to write.
        #[arg(long, env = "LOCALGW_OUTPUT", default_value = DEFAULT_OUTPUT)]
        output: PathBuf,
        /// Region used for pseudo-parameters.
        #[arg(long, env = "LOCALGW_REGION", default_value = "us-east-1")]
        region: String,
        /// Replace the configuration instead of merging with an existing one.
        #[arg(long)]
        overwrite: bool,
    },
    /// List the routes of a configuration document.
    Routes {
        /// Configuration document to read.
        #[arg(long, env = "LOCALGW_OUTPUT", default_value = DEFAULT_OUTPUT)]
        config: PathBuf,
        /// Output format.
        #[arg(long, value_enum, default_value_t = RoutesFormat::Text)]
        format: RoutesFormat,
    },
}

fn main() -> Result<()> {
    init_logging(&LoggingConfig::from_env());
    let cli = Cli::parse();

    match cli.command {
        Command::Init {
            template,
            cdk,
            output,
            region,
            overwrite,
        } => {
            let project_dir = std::env::current_dir().context("failed to read working directory")?;
            let request = InitRequest {
                template,
                cloud_assembly: cdk,
                output,
                region,
                overwrite,
                project_dir,
            };
            match handle_init(&request)? {
                InitOutcome::Generated {
                    template,
                    output,
                    routes,
                } => println!(
                    "Generated {} from {} ({} routes)",
                    output.display(),
                    template.display(),
                    routes
                ),
                InitOutcome::Sample { output } => println!(
                    "Template not found. Sample configuration written to {}; edit it before use.",
                    output.display()
                ),
                InitOutcome::NoTemplate => {}
            }
            Ok(())
        }
        Command::Routes { config, format } => handle_routes(&config, format, &mut io::stdout().lock()),
    }
}
