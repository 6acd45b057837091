//! Dispatch logic: extract params from ArgMatches and convert to command args.
//!
//! `*Params` structs mirror the command `*Args`, keeping the unresolved
//! `ColorChoice` until the handler runs.

use std::path::PathBuf;

use clap::ArgMatches;

use super::ColorChoice;
use crate::commands::check::CheckArgs;
use crate::commands::extract::ExtractArgs;
use crate::commands::query::QueryArgs;
use crate::commands::transform::TransformArgs;
use crate::commands::validate::ValidateArgs;

pub struct QueryParams {
    pub file: PathBuf,
    pub query: String,
    pub namespaces: Vec<(String, String)>,
    pub compact: bool,
    pub color: ColorChoice,
}

impl QueryParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            file: path(m, "file"),
            query: m.get_one::<String>("query_text").cloned().unwrap_or_default(),
            namespaces: pairs(m, "ns"),
            compact: m.get_flag("compact"),
            color: parse_color(m),
        }
    }
}

impl From<QueryParams> for QueryArgs {
    fn from(p: QueryParams) -> Self {
        Self {
            file: p.file,
            query: p.query,
            namespaces: p.namespaces,
            compact: p.compact,
            color: p.color.should_colorize(),
        }
    }
}

pub struct TransformParams {
    pub file: PathBuf,
    pub stylesheet: PathBuf,
    pub params: Vec<(String, String)>,
    pub color: ColorChoice,
}

impl TransformParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            file: path(m, "file"),
            stylesheet: path(m, "stylesheet"),
            params: pairs(m, "param"),
            color: parse_color(m),
        }
    }
}

impl From<TransformParams> for TransformArgs {
    fn from(p: TransformParams) -> Self {
        Self {
            file: p.file,
            stylesheet: p.stylesheet,
            params: p.params,
            color: p.color.should_colorize(),
        }
    }
}

pub struct ValidateParams {
    pub file: PathBuf,
    pub rules: PathBuf,
    pub phase: Option<String>,
    pub color: ColorChoice,
}

impl ValidateParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            file: path(m, "file"),
            rules: path(m, "rules_path"),
            phase: m.get_one::<String>("phase").cloned(),
            color: parse_color(m),
        }
    }
}

impl From<ValidateParams> for ValidateArgs {
    fn from(p: ValidateParams) -> Self {
        Self {
            file: p.file,
            rules: p.rules,
            phase: p.phase,
            color: p.color.should_colorize(),
        }
    }
}

pub struct CheckParams {
    pub program: PathBuf,
    pub rules: bool,
    pub color: ColorChoice,
}

impl CheckParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            program: path(m, "program"),
            rules: m.get_flag("rules"),
            color: parse_color(m),
        }
    }
}

impl From<CheckParams> for CheckArgs {
    fn from(p: CheckParams) -> Self {
        Self {
            program: p.program,
            rules: p.rules,
            color: p.color.should_colorize(),
        }
    }
}

pub struct ExtractParams {
    pub file: PathBuf,
    pub schema: PathBuf,
    pub name: String,
    pub compact: bool,
    pub color: ColorChoice,
}

impl ExtractParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            file: path(m, "file"),
            schema: path(m, "schema"),
            name: m.get_one::<String>("name").cloned().unwrap_or_default(),
            compact: m.get_flag("compact"),
            color: parse_color(m),
        }
    }
}

impl From<ExtractParams> for ExtractArgs {
    fn from(p: ExtractParams) -> Self {
        Self {
            file: p.file,
            schema: p.schema,
            name: p.name,
            compact: p.compact,
            color: p.color.should_colorize(),
        }
    }
}

fn path(m: &ArgMatches, id: &str) -> PathBuf {
    m.get_one::<PathBuf>(id).cloned().unwrap_or_default()
}

fn pairs(m: &ArgMatches, id: &str) -> Vec<(String, String)> {
    m.get_many::<(String, String)>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn parse_color(m: &ArgMatches) -> ColorChoice {
    match m.get_one::<String>("color").map(|s| s.as_str()) {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}
