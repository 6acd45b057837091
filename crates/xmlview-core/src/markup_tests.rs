use crate::markup::{XHTML_NAMESPACE, inner_markup, strip_namespace_declaration};

#[test]
fn strips_surrounding_tag() {
    assert_eq!(inner_markup("<p>Some <b>bold</b> text</p>"), "Some <b>bold</b> text");
    assert_eq!(inner_markup(r#"<p class="x">  padded  </p>"#), "padded");
}

#[test]
fn collapses_void_pairs() {
    assert_eq!(inner_markup("<div>a<br></br>b</div>"), "a<br/>b");
    assert_eq!(
        inner_markup(r#"<div><img src="a.png"></img></div>"#),
        r#"<img src="a.png"/>"#
    );
    // not a void element
    assert_eq!(inner_markup("<div><span></span></div>"), "<span></span>");
}

#[test]
fn mismatched_outer_tag_is_kept() {
    assert_eq!(inner_markup("<a>x</b>"), "<a>x</b>");
    assert_eq!(inner_markup("plain"), "plain");
}

#[test]
fn strips_declaration() {
    let markup = r#"<div xmlns="http://www.w3.org/1999/xhtml"><p xmlns="http://www.w3.org/1999/xhtml">x</p></div>"#;
    let stripped = strip_namespace_declaration(markup, XHTML_NAMESPACE);
    assert_eq!(stripped, "<div><p>x</p></div>");
}

#[test]
fn strips_prefixed_declaration() {
    let markup = r#"<div xmlns:h="http://www.w3.org/1999/xhtml" xmlns:o="urn:other">x</div>"#;
    let stripped = strip_namespace_declaration(markup, XHTML_NAMESPACE);
    assert_eq!(stripped, r#"<div xmlns:o="urn:other">x</div>"#);
}
