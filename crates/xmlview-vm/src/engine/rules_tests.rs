use indoc::indoc;
use xmlview_compiler::rules::{ALL_PHASES, CheckKind, RuleSchema, compile_rules};
use xmlview_core::{Document, ParserOptions, parse_str};

use super::{SVRL_NAMESPACE, VM, Validation, location};

const ENTRY_RULES: &str = indoc! {r#"
    <sch:schema xmlns:sch="http://purl.oclc.org/dsdl/schematron">
      <sch:title>Feed checks</sch:title>
      <sch:pattern id="entries">
        <sch:rule context="entry">
          <sch:assert test="title" id="has-title">Entry <sch:value-of select="@id"/> has no title</sch:assert>
          <sch:report test="@draft">draft <sch:name/></sch:report>
        </sch:rule>
        <sch:rule context="entry|feed">
          <sch:report test="true()">seen <sch:name/></sch:report>
        </sch:rule>
      </sch:pattern>
    </sch:schema>
"#};

const FEED: &str = r#"<feed><entry id="1"><title>A</title></entry><entry id="2" draft="yes"/></feed>"#;

fn rules(source: &str, phase: Option<&str>) -> RuleSchema {
    compile_rules(source, ParserOptions::default(), phase).unwrap().0
}

fn doc(source: &str) -> Document {
    parse_str(source, ParserOptions::default()).unwrap()
}

fn validate(schema: &RuleSchema, input: &str) -> Validation {
    VM::default().validate(schema, &doc(input).root()).unwrap()
}

#[test]
fn reports_findings_in_document_order() {
    let validation = validate(&rules(ENTRY_RULES, None), FEED);
    let report = &validation.report;

    assert!(!validation.is_valid());
    assert_eq!(report.title.as_deref(), Some("Feed checks"));
    assert_eq!(report.fired_rules, 3);

    let summary: Vec<_> = report
        .findings
        .iter()
        .map(|f| (f.kind, f.location.as_str(), f.message.as_str()))
        .collect();
    assert_eq!(
        summary,
        [
            (CheckKind::Report, "/feed[1]", "seen feed"),
            (CheckKind::Assert, "/feed[1]/entry[2]", "Entry 2 has no title"),
            (CheckKind::Report, "/feed[1]/entry[2]", "draft entry"),
        ]
    );

    let failed = report.failed_asserts().next().unwrap();
    assert_eq!(failed.id.as_deref(), Some("has-title"));
    assert_eq!(failed.pattern.as_deref(), Some("entries"));
    assert_eq!(failed.context, "entry");
    assert_eq!(failed.test, "title");
    assert_eq!(report.successful_reports().count(), 2);
}

#[test]
fn writes_svrl() {
    let validation = validate(&rules(ENTRY_RULES, None), FEED);

    let root = validation.output.root_element().unwrap();
    assert_eq!(root.namespace_uri().as_deref(), Some(SVRL_NAMESPACE));
    insta::assert_snapshot!(validation.output.render(), @r#"<svrl:schematron-output xmlns:svrl="http://purl.oclc.org/dsdl/svrl" title="Feed checks"><svrl:active-pattern id="entries"/><svrl:fired-rule context="entry|feed"/><svrl:successful-report test="true()" location="/feed[1]"><svrl:text>seen feed</svrl:text></svrl:successful-report><svrl:fired-rule context="entry"/><svrl:fired-rule context="entry"/><svrl:failed-assert test="title" id="has-title" location="/feed[1]/entry[2]"><svrl:text>Entry 2 has no title</svrl:text></svrl:failed-assert><svrl:successful-report test="@draft" location="/feed[1]/entry[2]"><svrl:text>draft entry</svrl:text></svrl:successful-report></svrl:schematron-output>"#);
}

#[test]
fn reports_do_not_affect_validity() {
    let schema = rules(
        indoc! {r#"
            <sch:schema xmlns:sch="http://purl.oclc.org/dsdl/schematron">
              <sch:pattern>
                <sch:rule context="/*">
                  <sch:report test="true()">always</sch:report>
                </sch:rule>
              </sch:pattern>
            </sch:schema>
        "#},
        None,
    );

    let validation = validate(&schema, "<a/>");

    assert!(validation.is_valid());
    assert_eq!(validation.report.findings.len(), 1);
}

#[test]
fn phases_limit_patterns() {
    let source = indoc! {r#"
        <sch:schema xmlns:sch="http://purl.oclc.org/dsdl/schematron" defaultPhase="quick">
          <sch:phase id="quick"><sch:active pattern="ids"/></sch:phase>
          <sch:pattern id="ids">
            <sch:rule context="item"><sch:assert test="@id">item needs an id</sch:assert></sch:rule>
          </sch:pattern>
          <sch:pattern id="names">
            <sch:rule context="item"><sch:assert test="@name">item needs a name</sch:assert></sch:rule>
          </sch:pattern>
        </sch:schema>
    "#};
    let input = r#"<list><item id="1"/></list>"#;

    let quick = validate(&rules(source, None), input);
    assert!(quick.is_valid());
    assert_eq!(quick.report.phase.as_deref(), Some("quick"));

    let all = validate(&rules(source, Some(ALL_PHASES)), input);
    assert!(!all.is_valid());
    assert_eq!(all.report.phase, None);
    assert_eq!(all.report.findings[0].message, "item needs a name");
}

#[test]
fn attributes_are_rule_contexts() {
    let source = indoc! {r#"
        <sch:schema xmlns:sch="http://purl.oclc.org/dsdl/schematron">
          <sch:ns prefix="x" uri="urn:x"/>
          <sch:pattern>
            <sch:rule context="@x:code">
              <sch:assert test="string-length(.) = 3">bad code <sch:value-of select="."/></sch:assert>
            </sch:rule>
          </sch:pattern>
        </sch:schema>
    "#};
    let input = r#"<list xmlns:x="urn:x"><item x:code="ABC"/><item x:code="TOOLONG"/></list>"#;

    let validation = validate(&rules(source, None), input);

    let findings = &validation.report.findings;
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].location, "/list[1]/item[2]/@x:code");
    assert_eq!(findings[0].message, "bad code TOOLONG");
    assert!(validation.output.render().contains(r#"<svrl:ns-prefix-in-attribute-values uri="urn:x" prefix="x"/>"#));
}

#[test]
fn schema_lets_are_visible_to_rules() {
    let source = indoc! {r#"
        <sch:schema xmlns:sch="http://purl.oclc.org/dsdl/schematron">
          <sch:let name="limit" value="2"/>
          <sch:pattern>
            <sch:rule context="list">
              <sch:assert test="count(item) &lt;= $limit">at most <sch:value-of select="$limit"/> items</sch:assert>
            </sch:rule>
          </sch:pattern>
        </sch:schema>
    "#};

    let validation = validate(&rules(source, None), "<list><item/><item/><item/></list>");

    assert_eq!(validation.report.findings[0].message, "at most 2 items");
}

#[test]
fn messages_are_whitespace_normalized() {
    let source = indoc! {r#"
        <sch:schema xmlns:sch="http://purl.oclc.org/dsdl/schematron">
          <sch:pattern>
            <sch:rule context="a">
              <sch:assert test="false()">
                spread
                over   lines
              </sch:assert>
            </sch:rule>
          </sch:pattern>
        </sch:schema>
    "#};

    let validation = validate(&rules(source, None), "<a/>");

    assert_eq!(validation.report.findings[0].message, "spread over lines");
}

#[test]
fn locations_count_same_named_siblings() {
    let input = doc("<r><a/><b/><a><c/></a></r>");
    let r = input.root_element().unwrap();
    let second_a = r.element_children().remove(2);
    let c = second_a.element_children().remove(0);

    let dom = input.dom();
    let root = sxd_xpath::nodeset::Node::Root(dom.root());
    assert_eq!(location(root), "/");
    assert_eq!(location(second_a.resolve_from(root).unwrap()), "/r[1]/a[2]");
    assert_eq!(location(c.resolve_from(root).unwrap()), "/r[1]/a[2]/c[1]");
}
