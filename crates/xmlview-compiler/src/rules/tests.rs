use indoc::indoc;
use xmlview_core::ParserOptions;

use super::*;
use crate::diagnostics::DiagnosticKind;

const FEED_RULES: &str = indoc! {r#"
    <sch:schema xmlns:sch="http://purl.oclc.org/dsdl/schematron" defaultPhase="basic">
      <sch:title>Feed checks</sch:title>
      <sch:ns prefix="atom" uri="http://www.w3.org/2005/Atom"/>
      <sch:phase id="basic">
        <sch:active pattern="required"/>
      </sch:phase>
      <sch:phase id="strict">
        <sch:active pattern="required"/>
        <sch:active pattern="dates"/>
      </sch:phase>
      <sch:pattern id="required">
        <sch:rule context="atom:entry">
          <sch:let name="title" value="atom:title"/>
          <sch:assert test="$title" id="has-title">Entry <sch:value-of select="atom:id"/> has no title</sch:assert>
          <sch:report test="count(atom:link) &gt; 3" role="warn"><sch:name/> has many links</sch:report>
        </sch:rule>
      </sch:pattern>
      <sch:pattern id="dates">
        <sch:rule context="atom:updated">
          <sch:assert test="string-length(.) = 20">malformed date</sch:assert>
        </sch:rule>
      </sch:pattern>
    </sch:schema>
"#};

fn compile(phase: Option<&str>) -> RuleSchema {
    compile_rules(FEED_RULES, ParserOptions::default(), phase).unwrap().0
}

#[test]
fn compiles_patterns_and_checks() {
    let schema = compile(Some(ALL_PHASES));

    assert_eq!(schema.title.as_deref(), Some("Feed checks"));
    assert_eq!(
        schema.namespaces.get("atom").map(String::as_str),
        Some("http://www.w3.org/2005/Atom")
    );
    assert_eq!(schema.patterns.len(), 2);
    assert_eq!(schema.active, [0, 1]);
    assert_eq!(schema.phase, None);

    let rule = &schema.patterns[0].rules[0];
    assert_eq!(schema.expressions.get(rule.context).source, "atom:entry");
    assert_eq!(rule.lets.len(), 1);
    assert_eq!(rule.checks.len(), 2);
    assert_eq!(rule.checks[0].kind, CheckKind::Assert);
    assert_eq!(rule.checks[0].id.as_deref(), Some("has-title"));
    assert_eq!(rule.checks[1].kind, CheckKind::Report);
    assert_eq!(rule.checks[1].role.as_deref(), Some("warn"));
}

#[test]
fn message_parts() {
    let schema = compile(None);
    let check = &schema.patterns[0].rules[0].checks[0];
    assert!(matches!(
        check.message.as_slice(),
        [
            MessagePart::Text(_),
            MessagePart::ValueOf(_),
            MessagePart::Text(_)
        ]
    ));
    let report = &schema.patterns[0].rules[0].checks[1];
    assert!(matches!(report.message[0], MessagePart::Name(None)));
}

#[test]
fn default_phase_selects_patterns() {
    let schema = compile(None);
    assert_eq!(schema.phase.as_deref(), Some("basic"));
    assert_eq!(schema.active, [0]);
    let ids: Vec<_> = schema.active_patterns().map(|p| p.id.as_deref()).collect();
    assert_eq!(ids, [Some("required")]);
}

#[test]
fn explicit_phase_overrides_default() {
    let schema = compile(Some("strict"));
    assert_eq!(schema.active, [0, 1]);
}

#[test]
fn undefined_phase() {
    let err = compile_rules(FEED_RULES, ParserOptions::default(), Some("draft")).unwrap_err();
    let message = err.diagnostics().first_error().unwrap();
    assert_eq!(message.kind, DiagnosticKind::UndefinedPhase);
    assert_eq!(message.message, "phase `draft` is not defined");
}

#[test]
fn undefined_pattern_in_phase() {
    let source = indoc! {r#"
        <schema xmlns="http://purl.oclc.org/dsdl/schematron">
          <phase id="p"><active pattern="missing"/></phase>
          <pattern id="present"><rule context="/"><assert test="true()">ok</assert></rule></pattern>
        </schema>
    "#};
    let err = compile_rules(source, ParserOptions::default(), Some("p")).unwrap_err();
    let kinds: Vec<_> = err.diagnostics().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, [DiagnosticKind::UndefinedPattern]);
}

#[test]
fn accepts_pre_iso_namespace() {
    let source = indoc! {r#"
        <schema xmlns="http://www.ascc.net/xml/schematron">
          <pattern name="p"><rule context="item"><assert test="@id">id</assert></rule></pattern>
        </schema>
    "#};
    let (schema, _) = compile_rules(source, ParserOptions::default(), None).unwrap();
    assert_eq!(schema.patterns.len(), 1);
    assert_eq!(schema.active, [0]);
}

#[test]
fn rejects_other_documents() {
    let err = compile_rules("<schema/>", ParserOptions::default(), None).unwrap_err();
    let kinds: Vec<_> = err.diagnostics().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, [DiagnosticKind::NotARuleSchema]);
}

#[test]
fn rule_without_context() {
    let source = indoc! {r#"
        <sch:schema xmlns:sch="http://purl.oclc.org/dsdl/schematron">
          <sch:pattern><sch:rule><sch:assert test="1">x</sch:assert></sch:rule></sch:pattern>
        </sch:schema>
    "#};
    let err = compile_rules(source, ParserOptions::default(), None).unwrap_err();
    let message = err.diagnostics().first_error().unwrap();
    assert_eq!(message.kind, DiagnosticKind::MissingAttribute);
    assert_eq!(message.message, "missing required attribute `context`");
}
