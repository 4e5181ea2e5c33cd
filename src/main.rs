//! Backfill's main application entry point.
//! Handles command-line argument parsing, file access and hands the actual
//! work to the template engine.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use backfill::{
    cli::{get_args, Args, Command},
    config::{find_options, load_options, parse_data, Options},
    error::{default_error_handler, Error, Result},
    grid::Workbook,
    logger::init_logger,
    renderer::{empty_tree, TemplateEngine},
};
use log::debug;
use serde_json::Value;

/// Main application entry point.
fn main() {
    let args = get_args();
    init_logger(args.verbose);

    if let Err(err) = run(args) {
        default_error_handler(err);
    }
}

fn get_options(config: Option<&Path>) -> Result<Options> {
    match config {
        Some(path) => load_options(path),
        None => find_options("."),
    }
}

fn read_data<P: AsRef<Path>>(path: P) -> Result<Value> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_data(&content)
}

fn read_workbook<P: AsRef<Path>>(path: P) -> Result<Workbook> {
    let content = std::fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&content)?)
}

fn write_file<P: AsRef<Path>>(content: &str, dest_path: P) -> Result<()> {
    let dest_path = dest_path.as_ref();
    if let Some(parent) = dest_path.parent() {
        std::fs::create_dir_all(parent).map_err(Error::IoError)?;
    }
    std::fs::write(dest_path, content).map_err(Error::IoError)
}

fn write_output(content: &str, output: Option<PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            write_file(content, &path)?;
            debug!("Wrote {}", path.display());
            Ok(())
        }
        None => {
            println!("{content}");
            Ok(())
        }
    }
}

/// Main application logic execution.
///
/// # Arguments
/// * `args` - Parsed command line arguments
///
/// # Returns
/// * `Result<()>` - Success or error status of the command
fn run(args: Args) -> Result<()> {
    let engine = TemplateEngine::with_options(get_options(args.config.as_deref())?);

    match args.command {
        Command::Extract {
            template,
            document,
            data,
            output,
            grid,
        } => {
            let mut tree = match data {
                Some(path) => read_data(path)?,
                None => empty_tree(),
            };
            if grid {
                let template = read_workbook(&template)?;
                let document = read_workbook(&document)?;
                engine.extract_workbook(&template, &document, &mut tree)?;
            } else {
                engine.extract_reader(
                    BufReader::new(File::open(&template)?),
                    BufReader::new(File::open(&document)?),
                    &mut tree,
                )?;
            }
            write_output(&serde_json::to_string_pretty(&tree)?, output)
        }
        Command::Render {
            template,
            data,
            output,
            grid,
        } => {
            let data = read_data(data)?;
            if grid {
                let workbook = engine.render_workbook(&read_workbook(&template)?, &data)?;
                return write_output(&serde_json::to_string_pretty(&workbook)?, output);
            }

            let template = BufReader::new(File::open(&template)?);
            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    let mut out = BufWriter::new(File::create(&path)?);
                    engine.render_writer(template, &data, &mut out)
                }
                None => engine.render_writer(template, &data, &mut std::io::stdout().lock()),
            }
        }
    }
}
