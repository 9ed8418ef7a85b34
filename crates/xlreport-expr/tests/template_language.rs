//! Tests for the placeholder language as report templates use it

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use xlreport_expr::{
    registry, render_str, ExecOptions, ExprError, Fragment, MissingKey, Output, Template,
};

fn render(src: &str, data: &Value) -> String {
    render_str(src, data, &ExecOptions::default()).unwrap()
}

fn invoice() -> Value {
    json!({
        "CompanyName": "Roga i Kopyta",
        "Number": 42,
        "Date": "2024-03-01 10:15:00",
        "Lines": [
            {"Name": "Cable", "Length": 1250, "Price": 19990},
            {"Name": "Pipe", "Length": 600, "Price": 5000}
        ],
        "Weight": 15250,
        "Route": 1234567
    })
}

/// Header cells mix static text and placeholders
#[test]
fn test_header_cells() {
    let data = invoice();
    assert_eq!(
        render("Invoice No {{.Number}} from {{fdate \"02.01.2006\" .Date}}", &data),
        "Invoice No 42 from 01.03.2024"
    );
    assert_eq!(render("{{.CompanyName}}", &data), "Roga i Kopyta");
    assert_eq!(render("{{toTonnes .Weight}} t", &data), "15.250 t");
    assert_eq!(render("{{toKMeters .Route}}", &data), "1.235");
}

/// Helpers compose with pipes and parenthesized calls
#[test]
fn test_helpers_in_pipelines() {
    let data = invoice();
    assert_eq!(
        render("{{range .Lines}}{{.Name}}={{.Price | toRubles}};{{end}}", &data),
        "Cable=199.90;Pipe=50.00;"
    );
    assert_eq!(
        render("{{(index .Lines 0).Length | toMeters}}", &data),
        "1.25"
    );
    assert_eq!(render("{{nfmt .Number 8}}", &data), "5.25");
    assert_eq!(
        render("{{printf \"%s: %d pcs\" (index .Lines 1).Name (len .Lines)}}", &data),
        "Pipe: 2 pcs"
    );
}

#[test]
fn test_conditionals_over_rows() {
    let data = invoice();
    let src = "{{range $i, $l := .Lines}}{{if gt $l.Length 1000}}long{{else}}short{{end}}{{if eq $i 0}},{{end}}{{end}}";
    assert_eq!(render(src, &data), "long,short");
    assert_eq!(
        render("{{if and .Lines (not .Missing)}}ok{{end}}", &json!({"Lines": [1], "Missing": ""})),
        "ok"
    );
}

#[test]
fn test_trim_markers_and_comments() {
    let data = json!({"A": "x"});
    assert_eq!(render("a  {{- .A -}}  b", &data), "axb");
    assert_eq!(render("a{{/* note */}}b", &data), "ab");
    assert_eq!(render("{{- /* note */ -}}  a", &data), "a");
}

#[test]
fn test_printing_of_values() {
    let data = json!({
        "Int": 7,
        "Float": 2.5,
        "Big": 1e21,
        "Null": null,
        "Flag": true,
        "List": [1, "a"],
        "Map": {"b": 2, "a": 1}
    });
    assert_eq!(render("{{.Int}}|{{.Float}}|{{.Big}}", &data), "7|2.5|1e+21");
    assert_eq!(render("[{{.Null}}]|{{.Flag}}", &data), "[]|true");
    assert_eq!(render("{{.List}}|{{.Map}}", &data), "[1 a]|map[a:1 b:2]");
}

#[test]
fn test_missing_key_modes() {
    let data = json!({"A": 1});
    let err = render_str("x {{.B}}", &data, &ExecOptions::default()).unwrap_err();
    assert_eq!(err.kind().to_string(), "map has no entry for key \"B\"");

    let zero = ExecOptions::default().with_missing_key(MissingKey::Zero);
    assert_eq!(render_str("x {{.B}}", &data, &zero).unwrap(), "x ");
}

#[test]
fn test_parse_errors() {
    for src in ["{{.A", "{{if .A}}x", "{{end}}", "{{nosuch .A}}", "{{range}}{{end}}"] {
        assert!(Template::parse(src).is_err(), "{:?} should not parse", src);
    }
    let err = Template::parse("{{nosuch 1}}").unwrap_err();
    assert!(matches!(err.kind(), ExprError::UnknownFunction(name) if name == "nosuch"));
}

/// Control structures may open and close in different fragments
#[test]
fn test_structures_span_fragments() {
    let template = Template::from_fragments(vec![
        Fragment::Text("{{range .Lines}}{{.Name}}".to_string()),
        Fragment::Marker(1u32),
        Fragment::Text("{{toMeters .Length}}".to_string()),
        Fragment::Marker(2u32),
        Fragment::Text("{{end}}".to_string()),
    ])
    .unwrap();

    let out = template
        .execute(&invoice(), &ExecOptions::default())
        .unwrap();
    assert_eq!(
        out,
        vec![
            Output::Text("Cable".into()),
            Output::Marker(1),
            Output::Text("1.25".into()),
            Output::Marker(2),
            Output::Text("Pipe".into()),
            Output::Marker(1),
            Output::Text("0.60".into()),
            Output::Marker(2),
        ]
    );
}

#[test]
fn test_actions_cannot_span_fragments() {
    let result = Template::from_fragments(vec![
        Fragment::Text("{{.A".to_string()),
        Fragment::Marker(()),
        Fragment::Text("}}".to_string()),
    ]);
    let err = result.unwrap_err();
    assert_eq!(err.fragment(), Some(0));
}

#[test]
fn test_registry_lists_report_helpers() {
    let names = registry().names();
    for name in ["fdate", "nfmt", "toMeters", "toTonnes", "toKMeters", "toRubles"] {
        assert!(names.contains(&name));
    }
}
