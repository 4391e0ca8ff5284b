// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Query language integration tests.
//!
//! End-to-end tests covering the parser, both renderer dialects, and the
//! in-memory evaluator.

use std::collections::BTreeSet;

use geo_types::{line_string, point};
use geostore_core::query::{
    parse, BooleanExpr, CompareOp, Dialect, EvalContext, PropertyExpr, QueryErrorType,
    RenderContext, ValueExpr,
};
use geostore_core::spatial::Envelope;
use geostore_core::store::Feature;
use geostore_core::{query, StoreError};
use serde_json::json;

fn render_json(q: &str) -> String {
    Dialect::JsonPath
        .render(&parse(q).expect("should parse"), &RenderContext::new())
        .expect("should render")
}

fn render_plain(q: &str) -> String {
    Dialect::PlainAttribute
        .render(&parse(q).expect("should parse"), &RenderContext::new())
        .expect("should render")
}

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Values inside the parentheses of `<access> in (...)`.
fn in_values(rendered: &str) -> BTreeSet<String> {
    let start = rendered.rfind(" in (").expect("in clause") + 5;
    let end = rendered.rfind(')').expect("closing paren");
    rendered[start..end]
        .split(',')
        .map(|v| v.trim().to_string())
        .collect()
}

// ============================================================================
// Parser Tests
// ============================================================================

#[test]
fn test_parse_comparison() {
    let ast = parse("properties.height >= 2.5").expect("should parse");
    assert_eq!(
        ast,
        BooleanExpr::Comparison {
            property: PropertyExpr::from_dotted("properties.height").unwrap(),
            operator: CompareOp::Gte,
            value: ValueExpr::decimal("2.5"),
        }
    );
}

#[test]
fn test_parse_keywords_case_insensitive() {
    let lower = parse("not a = 1 and b is not null or c in (1) and d like 'x'").unwrap();
    let upper = parse("NOT a = 1 AND b IS NOT NULL OR c IN (1) AND d LIKE 'x'").unwrap();
    assert_eq!(lower, upper);
}

#[test]
fn test_parse_whitespace_insignificant() {
    let compact = parse("(a=1)and(b!='x')").unwrap();
    let spaced = parse("  ( a = 1 )\n\tand ( b != 'x' )  ").unwrap();
    assert_eq!(compact, spaced);
}

#[test]
fn test_parse_from_str() {
    let ast: BooleanExpr = "intersects bbox and kind = 'road'".parse().unwrap();
    assert!(ast.is_spatial());
    assert!(!parse("kind = 'road'").unwrap().is_spatial());
}

#[test]
fn test_parse_error_has_position() {
    let err = parse("a = 1 and b <> 2").unwrap_err();
    assert_eq!(err.error_type, QueryErrorType::SyntaxError);
    let pos = err.position.expect("position");
    assert_eq!(pos.offset, 13);
    assert!(err.to_string().contains("line 1"));
}

#[test]
fn test_parse_error_converts_to_store_error() {
    fn run() -> geostore_core::Result<BooleanExpr> {
        Ok(parse("a = ")?)
    }
    assert!(matches!(run(), Err(StoreError::Query(_))));
}

#[test]
fn test_ast_serializes_with_type_tags() {
    let ast = parse("a = 1 or intersects bbox").unwrap();
    let value = serde_json::to_value(&ast).unwrap();
    assert_eq!(value["type"], "or");
    assert_eq!(value["left"]["type"], "comparison");
    assert_eq!(value["left"]["property"], json!(["a"]));
    assert_eq!(value["right"]["type"], "intersects_bbox");
    let back: BooleanExpr = serde_json::from_value(value).unwrap();
    assert_eq!(back, ast);
}

// ============================================================================
// Renderer Tests
// ============================================================================

#[test]
fn test_render_documented_examples() {
    assert_eq!(
        normalize(&render_json("ab.cd = 12")),
        "json_extract_path_text(json, 'ab','cd')::decimal = ( 12 )"
    );
    assert_eq!(normalize(&render_plain("ab.cd = 12")), "ab.cd = ( 12 )");
    assert_eq!(
        normalize(&render_plain("properties.foo like 'a%bcd'")),
        "foo ilike 'a%bcd'"
    );
}

#[test]
fn test_render_boolean_literal() {
    assert_eq!(render_json("true"), " true ");
    assert_eq!(render_plain("FALSE"), " false ");
}

#[test]
fn test_render_in_as_set() {
    let rendered = render_json("properties.kind in ('b', 'a', 'c')");
    assert!(rendered.starts_with("json_extract_path_text(json, 'properties','kind')::text in ("));
    assert_eq!(
        in_values(&rendered),
        BTreeSet::from(["'a'".to_string(), "'b'".to_string(), "'c'".to_string()])
    );

    let rendered = render_plain("properties.n in (3, 1, 2)");
    assert!(rendered.starts_with("n in ("));
    assert_eq!(
        in_values(&rendered),
        BTreeSet::from(["1".to_string(), "2".to_string(), "3".to_string()])
    );
}

#[test]
fn test_json_dialect_never_casts_pattern_and_null_tests() {
    for q in ["a ~ /x/", "a like 'x'", "a is null", "a is not null"] {
        let rendered = render_json(q);
        assert!(rendered.starts_with("json_extract_path_text(json, 'a') "), "{}", rendered);
        assert!(!rendered.contains("::"), "{}", rendered);
    }
}

#[test]
fn test_plain_dialect_never_casts() {
    for q in ["a = 1", "a = true", "a = 'x'", "a in (1, 2)", "properties.a.b != 2.0"] {
        assert!(!render_plain(q).contains("::"), "{}", q);
    }
}

#[test]
fn test_render_nested() {
    let rendered = render_json("not (a = 1 or b = true) and intersects 'POINT(1 2)'");
    assert_eq!(
        normalize(&rendered),
        "( NOT ( ( json_extract_path_text(json, 'a')::decimal = ( 1 ) ) OR \
         ( json_extract_path_text(json, 'b')::bool = ( true ) ) ) ) AND \
         ( ST_Intersects( geometry, 'POINT(1 2)' ) )"
    );
}

#[test]
fn test_render_bbox_requires_window() {
    let ast = parse("intersects bbox").unwrap();
    assert!(matches!(
        query::render(&ast, Dialect::PlainAttribute, &RenderContext::new()),
        Err(StoreError::MissingReferenceWindow)
    ));

    let window = Envelope::new(0.0, 0.0, 2.0, 1.0, 4326).unwrap();
    let rendered = query::render(&ast, Dialect::JsonPath, &RenderContext::with_envelope(&window))
        .unwrap();
    assert_eq!(
        rendered,
        "ST_Intersects( geometry, 'POLYGON((0 0, 2 0, 2 1, 0 1, 0 0))' )"
    );
}

#[test]
fn test_render_escapes_quotes() {
    assert_eq!(render_plain("note ~ /don't/"), "note ~ 'don''t'");
    let window = RenderContext::with_reference_window("POINT(0 0)') OR ('1");
    assert_eq!(
        Dialect::PlainAttribute
            .render(&parse("intersects bbox").unwrap(), &window)
            .unwrap(),
        "ST_Intersects( geometry, 'POINT(0 0)'') OR (''1' )"
    );
}

#[test]
fn test_deserialized_ast_is_validated() {
    let bad_value = json!({
        "type": "comparison",
        "property": ["a"],
        "operator": "eq",
        "value": {"type": "integer", "text": "1; DROP TABLE x"}
    });
    assert!(serde_json::from_value::<BooleanExpr>(bad_value).is_err());

    let bad_path = json!({"type": "null_test", "property": ["a", ""], "is_null": true});
    assert!(serde_json::from_value::<BooleanExpr>(bad_path).is_err());
}

#[test]
fn test_render_is_deterministic() {
    let q = "a in (5, 'x', true, 2.5) or b ~ /^q/ and not c is null";
    let ast = parse(q).unwrap();
    let ctx = RenderContext::new();
    for dialect in [Dialect::JsonPath, Dialect::PlainAttribute] {
        let first = dialect.render(&ast, &ctx).unwrap();
        let again = dialect.render(&parse(q).unwrap(), &ctx).unwrap();
        assert_eq!(first, again);
    }
}

// ============================================================================
// Evaluator Tests
// ============================================================================

fn road() -> Feature {
    Feature::new(1, line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)])
        .with_property("kind", "road")
        .with_property("lanes", 4)
        .with_property("name", "Harbour Road")
}

#[test]
fn test_evaluate_attribute_filters() {
    let ctx = EvalContext::new();
    let f = road();
    for (q, expected) in [
        ("kind = 'road'", true),
        ("properties.kind = 'road' and lanes > 2", true),
        ("lanes in (1, 2)", false),
        ("name like 'harbour%'", true),
        ("name ~ /Road$/", true),
        ("not (kind = 'road')", false),
        ("speed is null", true),
        ("not speed = 50", false),
        ("not (speed = 50 and kind = 'lane')", true),
        ("speed = 50 or lanes = 4", true),
    ] {
        assert_eq!(
            query::evaluate(&parse(q).unwrap(), &f, &ctx).unwrap(),
            expected,
            "{}",
            q
        );
    }
}

#[test]
fn test_evaluate_spatial_filters() {
    let f = road();
    let ctx = EvalContext::with_reference_window(Envelope::new(4.0, -1.0, 5.0, 1.0, 4326).unwrap());
    assert!(query::evaluate(&parse("intersects bbox").unwrap(), &f, &ctx).unwrap());

    let miss = Feature::new(2, point!(x: 50.0, y: 50.0));
    assert!(!query::evaluate(&parse("intersects bbox").unwrap(), &miss, &ctx).unwrap());
}
