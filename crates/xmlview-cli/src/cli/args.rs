//! Shared argument builders for CLI commands.
//!
//! Each function returns a `clap::Arg` that commands compose.

use std::path::PathBuf;

use clap::{Arg, ArgAction, value_parser};

/// Parse a `NAME=VALUE` pair. The value may itself contain `=`.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// XML document to read (positional).
pub fn file_arg() -> Arg {
    Arg::new("file")
        .value_name("FILE")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("XML document")
}

/// XPath expression (-q/--query).
pub fn query_text_arg() -> Arg {
    Arg::new("query_text")
        .short('q')
        .long("query")
        .value_name("XPATH")
        .required(true)
        .help("XPath expression to evaluate")
}

/// Namespace binding (--ns, repeatable).
pub fn ns_arg() -> Arg {
    Arg::new("ns")
        .long("ns")
        .value_name("PREFIX=URI")
        .action(ArgAction::Append)
        .value_parser(parse_key_value)
        .help("Bind a namespace prefix for the query")
}

/// Single-line JSON (--compact).
pub fn compact_arg() -> Arg {
    Arg::new("compact")
        .long("compact")
        .action(ArgAction::SetTrue)
        .help("Output compact JSON")
}

/// Stylesheet file (--stylesheet).
pub fn stylesheet_arg() -> Arg {
    Arg::new("stylesheet")
        .long("stylesheet")
        .value_name("XSL")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("XSLT stylesheet to apply")
}

/// Stylesheet parameter (--param, repeatable).
pub fn param_arg() -> Arg {
    Arg::new("param")
        .long("param")
        .value_name("NAME=VALUE")
        .action(ArgAction::Append)
        .value_parser(parse_key_value)
        .help("Pass a string parameter to the stylesheet")
}

/// Rule schema file (--rules).
pub fn rules_path_arg() -> Arg {
    Arg::new("rules_path")
        .long("rules")
        .value_name("SCH")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Schematron rule schema")
}

/// Validation phase (--phase).
pub fn phase_arg() -> Arg {
    Arg::new("phase")
        .long("phase")
        .value_name("PHASE")
        .help("Phase to validate (defaults to the schema's default phase)")
}

/// Program file to compile (positional).
pub fn program_arg() -> Arg {
    Arg::new("program")
        .value_name("PROGRAM")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Stylesheet or rule schema file")
}

/// Treat the program as a rule schema (--rules flag).
pub fn rules_flag_arg() -> Arg {
    Arg::new("rules")
        .long("rules")
        .action(ArgAction::SetTrue)
        .help("Compile the program as a Schematron rule schema")
}

/// Schema declaration file (--schema).
pub fn schema_arg() -> Arg {
    Arg::new("schema")
        .long("schema")
        .value_name("JSON")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Schema declaration file")
}

/// Schema to extract with (--name).
pub fn name_arg() -> Arg {
    Arg::new("name")
        .long("name")
        .value_name("SCHEMA")
        .required(true)
        .help("Schema name, optionally qualified as GROUP.NAME")
}

/// Color output control (--color).
pub fn color_arg() -> Arg {
    Arg::new("color")
        .long("color")
        .value_name("WHEN")
        .default_value("auto")
        .value_parser(["auto", "always", "never"])
        .help("Colorize output")
}
