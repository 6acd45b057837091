use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::Lazy;
use xmlview_core::NodeRef;
use xmlview_core::markup::XHTML_NAMESPACE;
use xmlview_core::serialize::{self, Method, Options};
use xmlview_lib::coerce::parse_datetime;
use xmlview_lib::{
    ExtensionDecl, Field, Instance, Item, Meta, ProgramSource, RawResult, Schema,
};

const ATOM: &str = "http://www.w3.org/2005/Atom";
const FUNCTIONS: &str = "urn:local:atom-feed-functions";

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

/// Serialized children without XHTML namespace declarations.
fn escape_xhtml(_: &Instance, _: Option<&NodeRef>, args: &[RawResult]) -> Result<RawResult, String> {
    let options = Options::new(Method::Xml).omit_namespace(XHTML_NAMESPACE);
    let markup: String = args
        .first()
        .cloned()
        .map(RawResult::into_items)
        .unwrap_or_default()
        .iter()
        .filter_map(Item::as_node)
        .map(|node| serialize::serialize(node, &options))
        .collect();
    Ok(RawResult::Scalar(Item::Text(markup)))
}

fn rss_date(_: &Instance, _: Option<&NodeRef>, args: &[RawResult]) -> Result<RawResult, String> {
    let text = args.first().map(RawResult::string_value).unwrap_or_default();
    let formatted = match parse_datetime(&text) {
        Some(dt) => dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        None => String::new(),
    };
    Ok(RawResult::Scalar(Item::Text(formatted)))
}

struct Schemas {
    feed: Arc<Schema>,
    entry: Arc<Schema>,
}

// The feed registers before the entry schema it embeds.
static SCHEMAS: Lazy<Schemas> = Lazy::new(|| {
    let base = Schema::builder("base")
        .group("atom-feed-test")
        .meta(
            Meta::new()
                .namespace("atom", ATOM)
                .namespace("fn", FUNCTIONS)
                .extension_namespace_uri(FUNCTIONS),
        )
        .extension(ExtensionDecl::new("escape-xhtml", escape_xhtml))
        .register()
        .unwrap();

    let feed = Schema::builder("feed")
        .extends(&base)
        .field("title", Field::text("/atom:feed/atom:title"))
        .field(
            "updated",
            Field::datetime(
                "/atom:feed/atom:*[local-name()='updated' or (local-name()='published' and not(../atom:updated))]",
            ),
        )
        .field("entries", Field::embedded_list("entry", "/atom:feed/atom:entry").required(false))
        .field("to_rss", Field::transform(ProgramSource::file(data("atom2rss.xsl"))))
        .extension(ExtensionDecl::new("rss-date", rss_date))
        .register()
        .unwrap();

    let entry = Schema::builder("entry")
        .extends(&base)
        .field("title", Field::text("atom:title"))
        .field("entry_id", Field::text("atom:id"))
        .field("updated", Field::datetime("atom:updated"))
        .field("summary", Field::inner_html("fn:escape-xhtml(atom:summary/*)"))
        .register()
        .unwrap();

    Schemas { feed, entry }
});

fn feed() -> Instance {
    Instance::from_file(&SCHEMAS.feed, data("atom_feed.xml")).unwrap()
}

#[test]
fn feed_title() {
    assert_eq!(feed().get("title").unwrap().as_str(), Some("Example Feed"));
}

#[test]
fn feed_updated() {
    let updated = feed().get("updated").unwrap();
    assert_eq!(
        updated.as_datetime().unwrap().to_string(),
        "2012-07-05 18:30:02"
    );
}

#[test]
fn entries_embed_the_forward_declared_schema() {
    let feed = feed();
    let entries = feed.get("entries").unwrap();
    let entries = entries.as_list().unwrap();
    assert_eq!(entries.len(), 2);

    let first = entries[0].as_instance().unwrap();
    assert!(Arc::ptr_eq(first.schema(), &SCHEMAS.entry));
    assert_eq!(first.get("title").unwrap().as_str(), Some("An example entry"));
    assert_eq!(
        first.get("entry_id").unwrap().as_str(),
        Some("urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a")
    );
    assert_eq!(first.get("summary").unwrap().as_str(), Some("Some <b>text</b>.<br/>"));

    let second = entries[1].as_instance().unwrap();
    assert_eq!(
        second.get("updated").unwrap().as_datetime().unwrap().to_string(),
        "2012-07-06 07:00:00"
    );
}

#[test]
fn entry_extensions_are_inherited() {
    let keys: Vec<_> = SCHEMAS.entry.extensions().keys().collect();
    assert_eq!(keys, [(FUNCTIONS, "escape-xhtml")]);
    let keys: Vec<_> = SCHEMAS.feed.extensions().keys().collect();
    assert_eq!(keys, [(FUNCTIONS, "escape-xhtml"), (FUNCTIONS, "rss-date")]);
}

#[test]
fn transform_to_rss() {
    let feed = feed();
    let rss = feed.get("to_rss").unwrap();
    insta::assert_snapshot!(rss.as_output().unwrap().render(), @r#"<rss version="2.0"><channel><description>Example Feed</description><link>http://example.org/</link><pubDate>Thu, 05 Jul 2012 18:30:02 GMT</pubDate><item><link>http://example.org/2003/12/13/atom03</link><guid>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</guid><pubDate>Thu, 05 Jul 2012 18:30:02 GMT</pubDate><description>&lt;div&gt;Some &lt;b&gt;text&lt;/b&gt;.&lt;br/&gt;&lt;/div&gt;</description></item><item><link>http://example.org/2003/12/14/atom04</link><guid>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6b</guid><pubDate>Fri, 06 Jul 2012 07:00:00 GMT</pubDate><description>&lt;div&gt;More text.&lt;/div&gt;</description></item></channel></rss>"#);

    // Compiled once per field, shared by every instance.
    let again = SCHEMAS.feed.field("to_rss").unwrap();
    assert!(again.program_spec().unwrap().is_compiled());
}

#[test]
fn instances_serialize_to_json() {
    let json = feed().to_json().unwrap();
    assert_eq!(json["title"], "Example Feed");
    assert_eq!(json["entries"][1]["title"], "A second entry");
    assert_eq!(json["entries"][0]["summary"], "Some <b>text</b>.<br/>");
}
