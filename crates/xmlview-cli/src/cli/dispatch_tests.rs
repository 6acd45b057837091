//! Tests for CLI dispatch logic.

use std::path::PathBuf;

use super::*;
use crate::cli::args::parse_key_value;
use crate::cli::commands::{
    check_command, extract_command, query_command, transform_command, validate_command,
};

#[test]
fn query_collects_namespaces_in_order() {
    let m = query_command()
        .try_get_matches_from([
            "query",
            "feed.xml",
            "-q",
            "//a:title",
            "--ns",
            "a=http://www.w3.org/2005/Atom",
            "--ns",
            "x=urn:x?y=z",
            "--compact",
        ])
        .unwrap();
    let params = QueryParams::from_matches(&m);

    assert_eq!(params.file, PathBuf::from("feed.xml"));
    assert_eq!(params.query, "//a:title");
    assert_eq!(
        params.namespaces,
        [
            ("a".to_string(), "http://www.w3.org/2005/Atom".to_string()),
            ("x".to_string(), "urn:x?y=z".to_string()),
        ]
    );
    assert!(params.compact);
    assert_eq!(params.color, ColorChoice::Auto);
}

#[test]
fn query_requires_an_expression() {
    let result = query_command().try_get_matches_from(["query", "feed.xml"]);
    assert!(result.is_err());
}

#[test]
fn malformed_pairs_are_rejected() {
    let result = query_command().try_get_matches_from(["query", "f.xml", "-q", ".", "--ns", "atom"]);
    assert!(result.is_err());

    assert!(parse_key_value("=urn:x").is_err());
    assert_eq!(
        parse_key_value("title=a=b").unwrap(),
        ("title".to_string(), "a=b".to_string())
    );
    assert_eq!(parse_key_value("empty=").unwrap(), ("empty".to_string(), String::new()));
}

#[test]
fn transform_params() {
    let m = transform_command()
        .try_get_matches_from([
            "transform",
            "feed.xml",
            "--stylesheet",
            "atom2rss.xsl",
            "--param",
            "title=Home",
            "--color",
            "never",
        ])
        .unwrap();
    let params = TransformParams::from_matches(&m);

    assert_eq!(params.stylesheet, PathBuf::from("atom2rss.xsl"));
    assert_eq!(params.params, [("title".to_string(), "Home".to_string())]);
    assert_eq!(params.color, ColorChoice::Never);
}

#[test]
fn validate_phase_is_optional() {
    let m = validate_command()
        .try_get_matches_from(["validate", "feed.xml", "--rules", "feed.sch"])
        .unwrap();
    let params = ValidateParams::from_matches(&m);
    assert_eq!(params.rules, PathBuf::from("feed.sch"));
    assert_eq!(params.phase, None);

    let m = validate_command()
        .try_get_matches_from(["validate", "feed.xml", "--rules", "feed.sch", "--phase", "strict"])
        .unwrap();
    assert_eq!(ValidateParams::from_matches(&m).phase.as_deref(), Some("strict"));
}

#[test]
fn check_rules_flag() {
    let m = check_command().try_get_matches_from(["check", "feed.sch", "--rules"]).unwrap();
    let params = CheckParams::from_matches(&m);
    assert_eq!(params.program, PathBuf::from("feed.sch"));
    assert!(params.rules);

    let m = check_command().try_get_matches_from(["check", "page.xsl"]).unwrap();
    assert!(!CheckParams::from_matches(&m).rules);
}

#[test]
fn extract_params() {
    let m = extract_command()
        .try_get_matches_from([
            "extract",
            "feed.xml",
            "--schema",
            "schemas.json",
            "--name",
            "atom.feed",
            "--color",
            "always",
        ])
        .unwrap();
    let params = ExtractParams::from_matches(&m);

    assert_eq!(params.schema, PathBuf::from("schemas.json"));
    assert_eq!(params.name, "atom.feed");
    assert!(!params.compact);
    assert_eq!(params.color, ColorChoice::Always);
}

#[test]
fn unknown_color_is_rejected() {
    let result = check_command().try_get_matches_from(["check", "a.xsl", "--color", "sometimes"]);
    assert!(result.is_err());
}

#[test]
fn cli_is_well_formed() {
    build_cli().debug_assert();
}
