//! Common constants used throughout backfill.

/// Supported configuration file names, in lookup order
pub const CONFIG_FILES: [&str; 3] = ["backfill.json", "backfill.yml", "backfill.yaml"];

/// Maximum length of the literal text used to find where a value ends
pub const DEFAULT_BREAKER_WINDOW: usize = 1000;

/// Text runs longer than this are split into several text tokens
pub const DEFAULT_MAX_TEXT_TOKEN_LEN: usize = 256;

/// How date cells read as text
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";

/// Leading characters that make a spreadsheet treat a text as a formula
pub const FORMULA_TRIGGERS: [char; 4] = ['=', '-', '+', '@'];
