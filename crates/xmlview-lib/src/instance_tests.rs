use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indoc::indoc;
use xmlview_core::{Item, Namespaces, NodeRef, RawResult};

use crate::error::FieldError;
use crate::extension::{ExtensionDecl, ExtensionRegistry};
use crate::field::{Field, ProgramSource};
use crate::instance::Instance;
use crate::options::{Meta, StructuralSchema};
use crate::schema::Schema;
use crate::value::Value;

const BOOK: &str = indoc! {r#"
    <book lang="en">
      <title>Dune</title>
      <author>Frank Herbert</author>
      <author>Brian Herbert</author>
      <pages>412</pages>
      <isbn>N/A</isbn>
    </book>
"#};

const TO_CARD: &str = indoc! {r#"
    <xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
      <xsl:param name="label" select="'Book'"/>
      <xsl:template match="/">
        <card><xsl:value-of select="$label"/>: <xsl:value-of select="/book/title"/></card>
      </xsl:template>
    </xsl:stylesheet>
"#};

const BOOK_RULES: &str = indoc! {r#"
    <sch:schema xmlns:sch="http://purl.oclc.org/dsdl/schematron">
      <sch:pattern>
        <sch:rule context="book">
          <sch:assert test="isbn != 'N/A'">book has no isbn</sch:assert>
        </sch:rule>
      </sch:pattern>
    </sch:schema>
"#};

fn book(schema: &Arc<Schema>) -> Instance {
    Instance::from_str(schema, BOOK).unwrap()
}

fn prepare(builder: crate::schema::SchemaBuilder) -> Arc<Schema> {
    builder.prepare().unwrap()
}

#[test]
fn fields_evaluate_once_and_keep_identity() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let schema = prepare(
        Schema::builder("book")
            .meta(Meta::new().namespace("b", "urn:book").extension_namespace_uri("urn:book"))
            .field("authors", Field::texts("b:count-calls(/book/author)"))
            .extension(ExtensionDecl::new("count-calls", move |_, _, args| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(args[0].clone())
            })),
    );
    let instance = book(&schema);

    let first = instance.get("authors").unwrap();
    let second = instance.get("authors").unwrap();

    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let authors: Vec<_> = first.as_list().unwrap().iter().filter_map(Value::as_str).collect();
    assert_eq!(authors, ["Frank Herbert", "Brian Herbert"]);
}

#[test]
fn typed_fields() {
    let schema = prepare(
        Schema::builder("book")
            .field("title", Field::text("/book/title"))
            .field("pages", Field::integer("/book/pages"))
            .field("lang", Field::text("/book/@lang"))
            .field("long", Field::boolean("string(/book/pages > 300)")),
    );
    let instance = book(&schema);

    assert_eq!(instance.get("title").unwrap().as_str(), Some("Dune"));
    assert_eq!(instance.get("pages").unwrap().as_integer(), Some(412));
    assert_eq!(instance.get("lang").unwrap().as_str(), Some("en"));
    assert_eq!(instance.get("long").unwrap().as_bool(), Some(true));
}

#[test]
fn missing_required_result() {
    let schema = prepare(Schema::builder("book").field("subtitle", Field::text("/book/subtitle")));
    let err = book(&schema).get("subtitle").unwrap_err();

    assert!(err.is_cardinality());
    insta::assert_snapshot!(err.to_string(), @"subtitle: query `/book/subtitle` did not match any nodes");
}

#[test]
fn optional_fields_read_as_null() {
    let schema = prepare(
        Schema::builder("book").field("subtitle", Field::text("/book/subtitle").required(false)),
    );
    let instance = book(&schema);

    assert!(instance.get("subtitle").unwrap().is_null());
    assert!(!instance.is_initialized("subtitle"));
}

#[test]
fn multiple_results_for_single_field() {
    let schema = prepare(
        Schema::builder("book")
            .field("author", Field::text("/book/author"))
            .field("first_author", Field::text("/book/author").ignore_extra_nodes()),
    );
    let instance = book(&schema);

    let err = instance.get("author").unwrap_err();
    assert!(matches!(err, FieldError::MultipleResults { .. }));
    insta::assert_snapshot!(err.to_string(), @"author: query `/book/author` matched more than one node");
    assert_eq!(instance.get("first_author").unwrap().as_str(), Some("Frank Herbert"));
}

#[test]
fn none_values_on_required_field() {
    let schema = prepare(
        Schema::builder("book")
            .field("isbn", Field::text("/book/isbn").none_values(["N/A"]))
            .field(
                "maybe_isbn",
                Field::text("/book/isbn").none_values(["N/A"]).required(false),
            ),
    );
    let instance = book(&schema);

    insta::assert_snapshot!(instance.get("isbn").unwrap_err().to_string(), @r#"isbn: field is required, but value "N/A" is mapped to null"#);
    assert!(instance.get("maybe_isbn").unwrap().is_null());
}

#[test]
fn defaults_go_through_coercion() {
    let schema = prepare(
        Schema::builder("book")
            .field("edition", Field::integer("/book/edition").default("1"))
            .field("tags", Field::texts("/book/tag").default("fiction"))
            .field("broken", Field::integer("/book/edition").default("first")),
    );
    let instance = book(&schema);

    assert_eq!(instance.get("edition").unwrap().as_integer(), Some(1));
    let tags = instance.get("tags").unwrap();
    assert_eq!(tags.as_list().unwrap()[0].as_str(), Some("fiction"));
    assert!(matches!(
        instance.get("broken").unwrap_err(),
        FieldError::Parse { .. }
    ));
}

#[test]
fn immutable_after_first_value() {
    let schema = prepare(
        Schema::builder("book")
            .field("title", Field::text("/book/title"))
            .field("note", Field::text("/book/note").required(false)),
    );
    let instance = book(&schema);

    instance.get("title").unwrap();
    let err = instance.set("title", "Other").unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"default.book.title is immutable");

    // An assignment before the first read initializes the field.
    instance.set("note", "signed").unwrap();
    assert_eq!(instance.get("note").unwrap().as_str(), Some("signed"));
    assert!(instance.set("note", "unsigned").is_err());
}

#[test]
fn null_assignment_does_not_initialize() {
    let schema = prepare(Schema::builder("book").field("title", Field::text("/book/title")));
    let instance = book(&schema);

    instance.set("title", Value::Null).unwrap();
    assert!(!instance.is_initialized("title"));
    instance.set("title", "Assigned").unwrap();
    assert_eq!(instance.get("title").unwrap().as_str(), Some("Assigned"));

    // Null on an initialized field leaves it alone.
    instance.set("title", Value::Null).unwrap();
    assert_eq!(instance.get("title").unwrap().as_str(), Some("Assigned"));
}

#[test]
fn mutable_fields_accept_reassignment() {
    let schema = prepare(
        Schema::builder("book").field("pages", Field::integer("/book/pages").mutable()),
    );
    let instance = book(&schema);

    assert_eq!(instance.get("pages").unwrap().as_integer(), Some(412));
    instance.set("pages", "500").unwrap();
    assert_eq!(instance.get("pages").unwrap().as_integer(), Some(500));
    instance.set("pages", 10i64).unwrap();
    assert_eq!(instance.get("pages").unwrap().as_integer(), Some(10));

    let err = instance.set("pages", true).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"pages: cannot assign a boolean value to a integer field");
}

#[test]
fn failed_evaluation_is_retried() {
    let fail = Arc::new(AtomicUsize::new(1));
    let remaining = fail.clone();
    let schema = prepare(
        Schema::builder("book")
            .meta(Meta::new().namespace("b", "urn:book").extension_namespace_uri("urn:book"))
            .field("title", Field::text("b:flaky(/book/title)"))
            .field("pages", Field::integer("/book/pages"))
            .extension(ExtensionDecl::new("flaky", move |_, _, args| {
                if remaining.load(Ordering::SeqCst) > 0 {
                    remaining.fetch_sub(1, Ordering::SeqCst);
                    return Err("not yet".to_string());
                }
                Ok(args[0].clone())
            })),
    );
    let instance = book(&schema);

    assert_eq!(instance.get("pages").unwrap().as_integer(), Some(412));
    assert!(matches!(
        instance.get("title").unwrap_err(),
        FieldError::Query { .. }
    ));
    assert!(!instance.is_initialized("title"));
    assert_eq!(instance.get("title").unwrap().as_str(), Some("Dune"));
    assert_eq!(instance.get("pages").unwrap().as_integer(), Some(412));
}

#[test]
fn reading_a_field_from_its_own_evaluation() {
    let schema = prepare(
        Schema::builder("book")
            .meta(Meta::new().namespace("b", "urn:book").extension_namespace_uri("urn:book"))
            .field("loop", Field::text("b:self()"))
            .extension(ExtensionDecl::new("self", |instance, _, _| {
                instance.get("loop").map_err(|e| e.to_string())?;
                Ok(RawResult::Null)
            })),
    );
    let err = book(&schema).get("loop").unwrap_err();

    let FieldError::Query { source, .. } = err else {
        panic!("expected a query error, got {err:?}");
    };
    assert!(source.to_string().contains("loop is read while it is being evaluated"));
}

fn answer(n: f64) -> impl Fn(&Instance, Option<&NodeRef>, &[RawResult]) -> Result<RawResult, String> + Send + Sync {
    move |_, _, _| Ok(RawResult::Scalar(Item::Number(n)))
}

#[test]
fn field_extensions_shadow_schema_extensions() {
    let schema = prepare(
        Schema::builder("book")
            .meta(Meta::new().namespace("b", "urn:book").extension_namespace_uri("urn:book"))
            .field("plain", Field::integer("b:answer()"))
            .field(
                "shadowed",
                Field::integer("b:answer()").extension(ExtensionDecl::new("answer", answer(7.0))),
            )
            .extension(ExtensionDecl::new("answer", answer(42.0))),
    );
    let instance = book(&schema);

    assert_eq!(instance.get("plain").unwrap().as_integer(), Some(42));
    assert_eq!(instance.get("shadowed").unwrap().as_integer(), Some(7));
}

#[test]
fn extra_namespaces_apply_per_field() {
    let source = r#"<doc xmlns:a="urn:a"><a:x>1</a:x></doc>"#;
    let schema = prepare(
        Schema::builder("doc").field("x", Field::integer("/doc/n:x").extra_namespace("n", "urn:a")),
    );
    let instance = Instance::from_str(&schema, source).unwrap();
    assert_eq!(instance.get("x").unwrap().as_integer(), Some(1));
}

#[test]
fn transform_fields_are_cached() {
    let schema = prepare(
        Schema::builder("book").field("card", Field::transform(ProgramSource::inline(TO_CARD))),
    );
    let instance = book(&schema);

    let first = instance.get("card").unwrap();
    let second = instance.get("card").unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    insta::assert_snapshot!(first.as_output().unwrap().render(), @"<card>Book: Dune</card>");
}

#[test]
fn transform_with_params_is_not_cached() {
    let schema = prepare(
        Schema::builder("book").field("card", Field::transform(ProgramSource::inline(TO_CARD))),
    );
    let instance = book(&schema);

    let custom = instance.transform("card", [("label", "Novel")]).unwrap();
    assert_eq!(custom.as_output().unwrap().render(), "<card>Novel: Dune</card>");
    assert!(!instance.is_initialized("card"));
    assert_eq!(
        instance.get("card").unwrap().as_output().unwrap().render(),
        "<card>Book: Dune</card>"
    );
    assert!(instance.transform("root", [("a", "b")]).is_err());
}

#[test]
fn empty_transform_output_is_missing() {
    let empty = indoc! {r#"
        <xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
          <xsl:template match="/"></xsl:template>
        </xsl:stylesheet>
    "#};
    let schema = prepare(
        Schema::builder("book")
            .field("required", Field::transform(ProgramSource::inline(empty)))
            .field("optional", Field::transform(ProgramSource::inline(empty)).required(false)),
    );
    let instance = book(&schema);

    let err = instance.get("required").unwrap_err();
    assert!(matches!(err, FieldError::MissingResult { ref field, .. } if field == "required"));
    assert!(!instance.is_initialized("required"));
    assert!(instance.get("optional").unwrap().is_null());
}

#[test]
fn programs_compile_once_per_field() {
    let schema = prepare(
        Schema::builder("book").field("card", Field::transform(ProgramSource::inline(TO_CARD))),
    );
    let spec = schema.field("card").unwrap().program_spec().unwrap();
    assert!(!spec.is_compiled());

    book(&schema).get("card").unwrap();
    assert!(spec.is_compiled());
    let compiled = spec.program("card", Default::default()).unwrap();
    book(&schema).get("card").unwrap();
    assert!(Arc::ptr_eq(&compiled, &spec.program("card", Default::default()).unwrap()));
}

#[test]
fn broken_programs_report_diagnostics() {
    let schema = prepare(
        Schema::builder("book").field("card", Field::transform(ProgramSource::inline("<nope/>"))),
    );
    let err = book(&schema).get("card").unwrap_err();

    let FieldError::Compile { diagnostics, .. } = &err else {
        panic!("expected a compile error, got {err:?}");
    };
    assert!(diagnostics.has_errors());
    assert!(!schema.field("card").unwrap().program_spec().unwrap().is_compiled());
}

#[test]
fn rules_fields_produce_reports() {
    let schema = prepare(
        Schema::builder("book").field("checks", Field::rules(ProgramSource::inline(BOOK_RULES))),
    );
    let checks = book(&schema).get("checks").unwrap();
    let validation = checks.as_validation().unwrap();

    assert!(!validation.is_valid());
    let messages: Vec<_> = validation.report.failed_asserts().map(|f| f.message.as_str()).collect();
    assert_eq!(messages, ["book has no isbn"]);
}

#[test]
fn program_files_are_read_lazily() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("card.xsl");
    let schema = prepare(
        Schema::builder("book").field("card", Field::transform(ProgramSource::file(&path))),
    );
    let instance = book(&schema);

    assert!(matches!(instance.get("card").unwrap_err(), FieldError::Compile { .. }));
    std::fs::write(&path, TO_CARD).unwrap();
    assert_eq!(
        instance.get("card").unwrap().as_output().unwrap().render(),
        "<card>Book: Dune</card>"
    );
}

#[test]
fn root_field_keeps_identity() {
    let schema = prepare(Schema::builder("book").field("title", Field::text("title")));
    let instance = book(&schema);

    let first = instance.get("root").unwrap();
    let second = instance.get("root").unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(first.as_node(), Some(instance.root()));
}

#[test]
fn element_fields_hold_assigned_nodes() {
    let schema = prepare(Schema::builder("book").field("marker", Field::element()));
    let instance = book(&schema);

    assert!(instance.get("marker").unwrap().is_null());
    let title = instance.root().element_children().remove(0);
    instance.set("marker", title.clone()).unwrap();
    assert_eq!(instance.get("marker").unwrap().as_node(), Some(&title));

    let err = instance.set("root", title).unwrap_err();
    assert!(matches!(err, FieldError::ImmutableField { .. }));
    assert!(instance.set("marker", "text").is_err());
}

#[test]
fn embedded_self_reference() {
    let schema = prepare(
        Schema::builder("node")
            .field("name", Field::text("@name"))
            .field("children", Field::embedded_list("self", "node").required(false)),
    );
    let tree = Instance::from_str(
        &schema,
        r#"<node name="a"><node name="b"><node name="c"/></node><node name="d"/></node>"#,
    )
    .unwrap();

    let children = tree.get("children").unwrap();
    let names: Vec<String> = children
        .as_list()
        .unwrap()
        .iter()
        .map(|c| c.as_instance().unwrap().get("name").unwrap().as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["b", "d"]);

    let leaf = children.as_list().unwrap()[1].as_instance().unwrap().clone();
    assert!(leaf.get("children").unwrap().is_null());
}

#[test]
fn embedded_targets_must_resolve_before_reading() {
    let schema = prepare(
        Schema::builder("book").field("publisher", Field::embedded("nowhere", "/book/publisher")),
    );
    let err = book(&schema).get("publisher").unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"publisher: target schema `nowhere` is not resolved");
}

#[test]
fn embedded_transform_builds_an_instance() {
    let card = prepare(Schema::builder("card").field("text", Field::text("/card")));
    let schema = prepare(
        Schema::builder("book")
            .field("card", Field::embedded_transform(&card, ProgramSource::inline(TO_CARD))),
    );
    let value = book(&schema).get("card").unwrap();
    let card_instance = value.as_instance().unwrap();

    assert!(Arc::ptr_eq(card_instance.schema(), &card));
    assert_eq!(card_instance.get("text").unwrap().as_str(), Some("Book: Dune"));
}

#[derive(Debug)]
struct RequireLang;

impl StructuralSchema for RequireLang {
    fn validate(&self, root: &xmlview_core::NodeRef) -> Result<(), String> {
        match root.attribute("lang") {
            Some(_) => Ok(()),
            None => Err("missing lang".to_string()),
        }
    }
}

#[test]
fn structural_schema_checks_every_instance() {
    let schema = prepare(
        Schema::builder("book").meta(Meta::new().structural_schema(Arc::new(RequireLang))),
    );

    assert!(Instance::from_str(&schema, BOOK).is_ok());
    let err = Instance::from_str(&schema, "<book/>").unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"document does not satisfy the structural schema: missing lang");
}

#[test]
fn unknown_fields() {
    let schema = prepare(Schema::builder("book"));
    let err = book(&schema).get("nope").unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"default.book has no field named `nope`");
}

#[test]
fn identity_follows_schema_and_root() {
    let schema = prepare(Schema::builder("book"));
    let other = prepare(Schema::builder("book"));
    let doc = xmlview_core::parse_str(BOOK, Default::default()).unwrap();

    let a = Instance::new(&schema, doc.root()).unwrap();
    let b = Instance::new(&schema, doc.root_element().unwrap()).unwrap();
    let c = Instance::new(&other, doc.root()).unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
    let set: HashSet<_> = [a, b, c].into_iter().collect();
    assert_eq!(set.len(), 2);
}

#[test]
fn ad_hoc_queries() {
    let schema = prepare(Schema::builder("book").meta(Meta::new().namespace("b", "urn:book")));
    let instance = book(&schema);

    let count = instance
        .xpath("count(author)", &Namespaces::new(), &ExtensionRegistry::new())
        .unwrap();
    assert_eq!(count, RawResult::Scalar(Item::Number(2.0)));

    let mut extensions = ExtensionRegistry::new();
    extensions
        .register(
            Some("urn:book"),
            "pages",
            Arc::new(|instance: &Instance, _: Option<&NodeRef>, _: &[RawResult]| {
                Ok(RawResult::Scalar(Item::Text(instance.root().local_name().unwrap_or_default())))
            }),
            None,
            "test",
        )
        .unwrap();
    let name = instance.xpath("b:pages()", &Namespaces::new(), &extensions).unwrap();
    assert_eq!(name.string_value(), "book");
}

#[test]
fn json_rendering() {
    let schema = prepare(
        Schema::builder("book")
            .field("title", Field::text("/book/title"))
            .field("pages", Field::integer("/book/pages"))
            .field("authors", Field::texts("/book/author")),
    );
    let json = book(&schema).to_json().unwrap();

    insta::assert_snapshot!(json.to_string(), @r#"{"title":"Dune","pages":412,"authors":["Frank Herbert","Brian Herbert"]}"#);
}
