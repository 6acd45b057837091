use indoc::indoc;

use crate::decl::{SchemaFile, load};
use crate::error::ConfigError;
use crate::field::{FieldKind, ProgramSource, Target};
use crate::instance::Instance;
use crate::registry::Registry;

const FEEDS: &str = indoc! {r#"
    {
      "group": "feeds",
      "schemas": [
        {
          "name": "feed",
          "meta": { "namespaces": { "atom": "http://www.w3.org/2005/Atom" } },
          "fields": {
            "title": { "type": "text", "query": "/atom:feed/atom:title" },
            "entries": { "type": "embedded_list", "target": "entry", "query": "atom:entry" },
            "count": { "type": "integer", "query": "count(atom:entry)" }
          }
        },
        {
          "name": "entry",
          "meta": { "namespaces": { "atom": "http://www.w3.org/2005/Atom" } },
          "fields": {
            "id": { "type": "text", "query": "atom:id" },
            "draft": {
              "type": "boolean",
              "query": "@draft",
              "required": false,
              "true_values": ["yes"],
              "false_values": ["no"]
            }
          }
        }
      ]
    }
"#};

const FEED_DOC: &str = indoc! {r#"
    <feed xmlns="http://www.w3.org/2005/Atom">
      <title>Example</title>
      <entry draft="yes"><id>urn:1</id></entry>
      <entry><id>urn:2</id></entry>
    </feed>
"#};

fn register(source: &str) -> Result<Vec<std::sync::Arc<crate::schema::Schema>>, ConfigError> {
    SchemaFile::parse(source)?.register(&Registry::new(), None)
}

#[test]
fn forward_references_within_a_file() {
    let registry = Registry::new();
    let schemas = SchemaFile::parse(FEEDS).unwrap().register(&registry, None).unwrap();
    assert_eq!(schemas.len(), 2);
    assert!(registry.pending().is_empty());

    let feed = Instance::from_str(&schemas[0], FEED_DOC).unwrap();
    assert_eq!(feed.get("title").unwrap().as_str(), Some("Example"));
    assert_eq!(feed.get("count").unwrap().as_integer(), Some(2));

    let entries = feed.get("entries").unwrap();
    let ids: Vec<_> = entries
        .as_list()
        .unwrap()
        .iter()
        .map(|e| {
            let entry = e.as_instance().unwrap();
            (
                entry.get("id").unwrap().as_str().map(str::to_string),
                entry.get("draft").unwrap().as_bool(),
            )
        })
        .collect();
    assert_eq!(
        ids,
        [
            (Some("urn:1".to_string()), Some(true)),
            (Some("urn:2".to_string()), None)
        ]
    );
}

#[test]
fn fields_keep_declaration_order() {
    let schemas = register(FEEDS).unwrap();
    let names: Vec<_> = schemas[0].field_names().collect();
    assert_eq!(names, ["root", "title", "entries", "count"]);
}

#[test]
fn extends_looks_up_registered_schemas() {
    let registry = Registry::new();
    SchemaFile::parse(FEEDS).unwrap().register(&registry, None).unwrap();
    let schemas = SchemaFile::parse(indoc! {r#"
        {
          "group": "extra",
          "schemas": [
            {
              "name": "podcast",
              "extends": "feeds.feed",
              "fields": { "image": { "type": "text", "query": "/atom:feed/atom:logo", "required": false } }
            }
          ]
        }
    "#})
    .unwrap()
    .register(&registry, None)
    .unwrap();

    let podcast = &schemas[0];
    assert_eq!(podcast.key(), "extra.podcast");
    let names: Vec<_> = podcast.field_names().collect();
    assert_eq!(names, ["root", "title", "entries", "count", "image"]);
    assert_eq!(podcast.options().namespaces["atom"], "http://www.w3.org/2005/Atom");
}

#[test]
fn unknown_parent() {
    let err = register(r#"{"schemas": [{"name": "a", "extends": "missing"}]}"#).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"schema `missing` is not registered");
}

#[test]
fn unknown_keys_are_rejected() {
    let err = register(r#"{"schemas": [{"name": "a", "fields": {"x": {"type": "text", "query": "x", "colour": 1}}}]}"#)
        .unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));

    let err = register(r#"{"schemas": [{"name": "a", "fields": {"x": {"type": "textual", "query": "x"}}}]}"#)
        .unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));

    let err = register(r#"{"schemas": [{"name": "a", "meta": {"namespace": {}}}]}"#).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"unknown schema option `namespace`");
}

#[test]
fn type_specific_options() {
    let cases = [
        (r#"{"type": "text", "query": "x", "true_values": ["y"]}"#, "`true_values` and `false_values` apply to boolean fields only"),
        (r#"{"type": "integer", "query": "x", "strip_namespaces": []}"#, "`strip_namespaces` applies to markup fields only"),
        (r#"{"type": "node", "query": "x", "none_values": ["-"]}"#, "`none_values` applies to text fields only"),
        (r#"{"type": "texts", "query": "x", "ignore_extra_nodes": true}"#, "`ignore_extra_nodes` applies to single-valued fields only"),
        (r#"{"type": "embedded", "target": " ", "query": "x"}"#, "embedded fields need a target"),
        (r#"{"type": "transform"}"#, "a program needs `source` or `file`"),
    ];
    for (field, expected) in cases {
        let source = format!(r#"{{"schemas": [{{"name": "a", "fields": {{"x": {field}}}}}]}}"#);
        let err = register(&source).unwrap_err();
        assert_eq!(err.to_string(), format!("field `x`: {expected}"), "{field}");
    }
}

#[test]
fn program_source_and_file_conflict() {
    let err = register(r#"{"schemas": [{"name": "a", "fields": {"x": {"type": "rules", "source": "<s/>", "file": "a.sch"}}}]}"#)
        .unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"`source` and `file` are mutually exclusive");
}

#[test]
fn program_files_resolve_against_the_schema_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("xsl")).unwrap();
    std::fs::write(
        dir.path().join("xsl/title.xsl"),
        indoc! {r#"
            <xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
              <xsl:template match="/"><t><xsl:value-of select="/doc/@title"/></t></xsl:template>
            </xsl:stylesheet>
        "#},
    )
    .unwrap();
    let schema_path = dir.path().join("schemas.json");
    std::fs::write(
        &schema_path,
        r#"{"group": "files", "schemas": [{"name": "doc", "fields": {"title": {"type": "transform", "file": "xsl/title.xsl"}}}]}"#,
    )
    .unwrap();

    let registry = Registry::new();
    let schemas = load(&schema_path, &registry).unwrap();
    let field = schemas[0].field("title").unwrap();
    assert_eq!(
        field.program_spec().unwrap().source,
        ProgramSource::File(dir.path().join("xsl/title.xsl"))
    );

    let doc = Instance::from_str(&schemas[0], r#"<doc title="Hello"/>"#).unwrap();
    let output = doc.get("title").unwrap();
    assert_eq!(output.as_output().unwrap().render(), "<t>Hello</t>");
}

#[test]
fn missing_schema_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load(&dir.path().join("nope.json"), &Registry::new()).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn embedded_program_fields() {
    let schemas = register(indoc! {r#"
        {
          "schemas": [
            {
              "name": "doc",
              "fields": {
                "summary": {
                  "type": "embedded_transform",
                  "target": "self",
                  "source": "<xsl:stylesheet version='1.0' xmlns:xsl='http://www.w3.org/1999/XSL/Transform'><xsl:template match='/'><doc n='1'/></xsl:template></xsl:stylesheet>",
                  "required": false
                },
                "n": { "type": "integer", "query": "@n", "required": false }
              }
            }
          ]
        }
    "#})
    .unwrap();

    let field = schemas[0].field("summary").unwrap();
    assert!(matches!(field.kind, FieldKind::EmbeddedTransform { .. }));
    assert!(matches!(field.target().unwrap().target, Target::SelfRef));

    let doc = Instance::from_str(&schemas[0], "<doc/>").unwrap();
    let summary = doc.get("summary").unwrap();
    let summary = summary.as_instance().unwrap();
    assert_eq!(summary.get("n").unwrap().as_integer(), Some(1));
    assert_eq!(doc.get("n").unwrap().as_integer(), None);
}

#[test]
fn default_group() {
    let schemas = register(r#"{"schemas": [{"name": "a"}]}"#).unwrap();
    assert_eq!(schemas[0].key(), "default.a");
}
