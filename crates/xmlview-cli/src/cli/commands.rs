//! Command builders for the CLI.

use clap::Command;

use super::args::*;

/// Build the complete CLI with all subcommands.
pub fn build_cli() -> Command {
    Command::new("xmlview")
        .about("Typed views, transforms and rule checks over XML documents")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(query_command())
        .subcommand(transform_command())
        .subcommand(validate_command())
        .subcommand(check_command())
        .subcommand(extract_command())
}

/// Evaluate an XPath expression against a document.
pub fn query_command() -> Command {
    Command::new("query")
        .about("Evaluate an XPath expression and print the results as JSON")
        .override_usage("  xmlview query <FILE> -q <XPATH> [--ns PREFIX=URI]...")
        .after_help(
            r#"EXAMPLES:
  xmlview query feed.xml -q '//title'
  xmlview query feed.xml -q 'count(//a:entry)' --ns a=http://www.w3.org/2005/Atom
  xmlview query feed.xml -q '//a:link/@href' --ns a=http://www.w3.org/2005/Atom --compact"#,
        )
        .arg(file_arg())
        .arg(query_text_arg())
        .arg(ns_arg())
        .arg(compact_arg())
        .arg(color_arg())
}

/// Apply a stylesheet to a document.
pub fn transform_command() -> Command {
    Command::new("transform")
        .about("Apply an XSLT stylesheet and print the result")
        .override_usage("  xmlview transform <FILE> --stylesheet <XSL> [--param NAME=VALUE]...")
        .after_help(
            r#"EXAMPLES:
  xmlview transform feed.xml --stylesheet atom2rss.xsl
  xmlview transform feed.xml --stylesheet page.xsl --param title=Home"#,
        )
        .arg(file_arg())
        .arg(stylesheet_arg())
        .arg(param_arg())
        .arg(color_arg())
}

/// Check a document against a rule schema.
pub fn validate_command() -> Command {
    Command::new("validate")
        .about("Validate a document against Schematron rules and print the SVRL report")
        .override_usage("  xmlview validate <FILE> --rules <SCH> [--phase PHASE]")
        .after_help(
            r#"EXAMPLES:
  xmlview validate feed.xml --rules feed.sch
  xmlview validate feed.xml --rules feed.sch --phase strict

Exits with status 1 when an assertion fails."#,
        )
        .arg(file_arg())
        .arg(rules_path_arg())
        .arg(phase_arg())
        .arg(color_arg())
}

/// Compile a program without running it.
pub fn check_command() -> Command {
    Command::new("check")
        .about("Compile a stylesheet or rule schema and report diagnostics")
        .override_usage("  xmlview check <PROGRAM> [--rules]")
        .after_help(
            r#"EXAMPLES:
  xmlview check atom2rss.xsl
  xmlview check feed.sch --rules"#,
        )
        .arg(program_arg())
        .arg(rules_flag_arg())
        .arg(color_arg())
}

/// Bind a document to a declared schema and print every field.
pub fn extract_command() -> Command {
    Command::new("extract")
        .about("Read a document through a declared schema and print its fields as JSON")
        .override_usage("  xmlview extract <FILE> --schema <JSON> --name <SCHEMA>")
        .after_help(
            r#"EXAMPLES:
  xmlview extract feed.xml --schema schemas.json --name feed
  xmlview extract feed.xml --schema schemas.json --name atom.feed --compact"#,
        )
        .arg(file_arg())
        .arg(schema_arg())
        .arg(name_arg())
        .arg(compact_arg())
        .arg(color_arg())
}
