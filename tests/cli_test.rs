use backfill::cli::{Args, Command};
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

fn make_args(args: &[&str]) -> Vec<OsString> {
    let mut res = vec![OsString::from("backfill")];
    res.extend(args.iter().map(OsString::from));
    res
}

#[test]
fn test_extract_args() {
    let args = make_args(&["extract", "./letter.tpl", "./letter.txt"]);
    let parsed = Args::try_parse_from(args).unwrap();

    assert!(!parsed.verbose);
    assert!(parsed.config.is_none());
    match parsed.command {
        Command::Extract {
            template,
            document,
            data,
            output,
            grid,
        } => {
            assert_eq!(template, PathBuf::from("./letter.tpl"));
            assert_eq!(document, PathBuf::from("./letter.txt"));
            assert!(data.is_none());
            assert!(output.is_none());
            assert!(!grid);
        }
        other => panic!("Expected extract, got {other:?}"),
    }
}

#[test]
fn test_render_args() {
    let args = make_args(&["render", "./letter.tpl", "./data.yml", "-o", "./out.txt"]);
    let parsed = Args::try_parse_from(args).unwrap();

    match parsed.command {
        Command::Render {
            template,
            data,
            output,
            grid,
        } => {
            assert_eq!(template, PathBuf::from("./letter.tpl"));
            assert_eq!(data, PathBuf::from("./data.yml"));
            assert_eq!(output, Some(PathBuf::from("./out.txt")));
            assert!(!grid);
        }
        other => panic!("Expected render, got {other:?}"),
    }
}

#[test]
fn test_all_flags() {
    let args = make_args(&[
        "extract",
        "--verbose",
        "--config",
        "./backfill.yml",
        "--grid",
        "--data",
        "./seed.json",
        "--output",
        "./out.json",
        "./book.json",
        "./filled.json",
    ]);
    let parsed = Args::try_parse_from(args).unwrap();

    assert!(parsed.verbose);
    assert_eq!(parsed.config, Some(PathBuf::from("./backfill.yml")));
    match parsed.command {
        Command::Extract {
            data, output, grid, ..
        } => {
            assert!(grid);
            assert_eq!(data, Some(PathBuf::from("./seed.json")));
            assert_eq!(output, Some(PathBuf::from("./out.json")));
        }
        other => panic!("Expected extract, got {other:?}"),
    }
}

#[test]
fn test_short_flags() {
    let args = make_args(&["-v", "render", "-g", "./book.json", "./data.json"]);
    let parsed = Args::try_parse_from(args).unwrap();

    assert!(parsed.verbose);
    assert!(matches!(parsed.command, Command::Render { grid: true, .. }));
}

#[test]
fn test_missing_subcommand() {
    let args = make_args(&[]);
    assert!(Args::try_parse_from(args).is_err());
}

#[test]
fn test_missing_args() {
    let args = make_args(&["extract", "./letter.tpl"]);
    assert!(Args::try_parse_from(args).is_err());
}

#[test]
fn test_too_many_args() {
    let args = make_args(&["render", "./letter.tpl", "./data.json", "extra"]);
    assert!(Args::try_parse_from(args).is_err());
}
