//! Command-line interface implementation for backfill.
//! Provides argument parsing and help text formatting using clap.

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments structure for backfill.
#[derive(Parser, Debug)]
#[command(author, version, about = "Backfill: render documents from templates, and read the data back out of them", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine options file (JSON or YAML). Defaults to backfill.json,
    /// backfill.yml or backfill.yaml in the current directory, if present.
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read the data a filled document holds, as JSON
    Extract {
        /// Template the document was filled from
        #[arg(value_name = "TEMPLATE")]
        template: PathBuf,

        /// Filled document
        #[arg(value_name = "DOCUMENT")]
        document: PathBuf,

        /// Existing data (JSON or YAML) to update instead of starting empty
        #[arg(short, long, value_name = "FILE")]
        data: Option<PathBuf>,

        /// Write the JSON here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Template and document are workbooks in JSON form
        #[arg(short, long)]
        grid: bool,
    },

    /// Fill a template with data
    Render {
        /// Template to fill
        #[arg(value_name = "TEMPLATE")]
        template: PathBuf,

        /// Data (JSON or YAML)
        #[arg(value_name = "DATA")]
        data: PathBuf,

        /// Write the document here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Template is a workbook in JSON form
        #[arg(short, long)]
        grid: bool,
    },
}

/// Parses command line arguments and returns the Args structure.
///
/// # Returns
/// * `Args` - Parsed command line arguments
///
/// # Exits
/// * With status code 1 if required arguments are missing
/// * With clap's default error handling for other argument errors
pub fn get_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if matches!(
                e.kind(),
                ErrorKind::MissingRequiredArgument
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) {
                let _ = Args::command()
                    .help_template(
                        r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#,
                    )
                    .print_help();
                std::process::exit(1);
            } else {
                e.exit();
            }
        }
    }
}
