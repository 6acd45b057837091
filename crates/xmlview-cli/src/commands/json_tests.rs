use serde_json::json;
use xmlview_core::Colors;

use super::json::format;

#[test]
fn pretty_output_matches_serde() {
    let value = json!({
        "title": "Example Feed",
        "count": 2,
        "entries": [{"id": "urn:1", "draft": true}, {"id": "urn:2", "draft": null}],
        "tags": [],
        "extra": {}
    });
    let out = format(&value, true, Colors::OFF);
    assert_eq!(out, serde_json::to_string_pretty(&value).unwrap());
}

#[test]
fn compact_output_matches_serde() {
    let value = json!(["a \"quoted\" <b>", 1.5, false, null]);
    let out = format(&value, false, Colors::OFF);
    assert_eq!(out, serde_json::to_string(&value).unwrap());
}

#[test]
fn colored_output() {
    let out = format(&json!({"k": ["v", null]}), false, Colors::ON);
    insta::assert_snapshot!(out.replace('\x1b', "ESC"), @r#"ESC[2m{ESC[0mESC[34m"k"ESC[0mESC[2m:ESC[0mESC[2m[ESC[0mESC[32m"v"ESC[0mESC[2m,ESC[0mESC[2mnullESC[0mESC[2m]ESC[0mESC[2m}ESC[0m"#);
}
