// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Evaluates a predicate AST against an in-memory feature.
//!
//! Property comparisons follow the cast rules the renderers emit, and boolean
//! combinators use SQL three-valued logic: a predicate over a missing or null
//! property is unknown, `NOT` of unknown stays unknown, and a feature is
//! selected only when the whole predicate is true. This is how a backend
//! running the rendered predicate treats the same rows.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use geo::Intersects;
use geo_types::Geometry;
use regex::{Regex, RegexBuilder};
use serde_json::Value as JsonValue;

use super::ast::{
    BooleanExpr, CompareOp, PropertyExpr, QueryError, QueryErrorType, ValueExpr, ValueListExpr,
};
use crate::error::{Result, StoreError};
use crate::spatial::{intersects_envelope, parse_wkt, Envelope};
use crate::store::Feature;

/// Per-call evaluation settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalContext {
    reference_window: Option<Envelope>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference_window(window: Envelope) -> Self {
        Self {
            reference_window: Some(window),
        }
    }

    pub fn reference_window(&self) -> Option<&Envelope> {
        self.reference_window.as_ref()
    }
}

/// A predicate with its regex, LIKE and WKT literals compiled once, for
/// evaluation against many features.
#[derive(Debug)]
pub struct PreparedFilter<'a> {
    expr: &'a BooleanExpr,
    regexes: HashMap<&'a str, Regex>,
    likes: HashMap<&'a str, Regex>,
    geometries: HashMap<&'a str, Geometry<f64>>,
}

impl<'a> PreparedFilter<'a> {
    /// Compile every pattern and geometry literal in `expr`.
    pub fn new(expr: &'a BooleanExpr) -> Result<Self> {
        let mut prepared = Self {
            expr,
            regexes: HashMap::new(),
            likes: HashMap::new(),
            geometries: HashMap::new(),
        };
        prepared.compile(expr)?;
        Ok(prepared)
    }

    pub fn expr(&self) -> &BooleanExpr {
        self.expr
    }

    fn compile(&mut self, expr: &'a BooleanExpr) -> Result<()> {
        match expr {
            BooleanExpr::And { left, right } | BooleanExpr::Or { left, right } => {
                self.compile(left)?;
                self.compile(right)
            }
            BooleanExpr::Not { inner } => self.compile(inner),
            BooleanExpr::Regex { pattern, .. } => {
                if let Entry::Vacant(slot) = self.regexes.entry(pattern.as_str()) {
                    slot.insert(Regex::new(pattern).map_err(|e| invalid_pattern(pattern, e))?);
                }
                Ok(())
            }
            BooleanExpr::Like { pattern, .. } => {
                if let Entry::Vacant(slot) = self.likes.entry(pattern.as_str()) {
                    slot.insert(like_regex(pattern)?);
                }
                Ok(())
            }
            BooleanExpr::IntersectsGeom { wkt } => {
                if let Entry::Vacant(slot) = self.geometries.entry(wkt.as_str()) {
                    slot.insert(parse_wkt(wkt)?);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// True when the predicate is true for `feature`; false and unknown
    /// both reject it.
    pub fn matches(&self, feature: &Feature, ctx: &EvalContext) -> Result<bool> {
        Ok(self.truth(self.expr, feature, ctx)? == Some(true))
    }

    /// Truth value of `expr`, `None` being unknown.
    fn truth(
        &self,
        expr: &BooleanExpr,
        feature: &Feature,
        ctx: &EvalContext,
    ) -> Result<Option<bool>> {
        let truth = match expr {
            BooleanExpr::And { left, right } => match self.truth(left, feature, ctx)? {
                Some(false) => Some(false),
                left => match (left, self.truth(right, feature, ctx)?) {
                    (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                },
            },
            BooleanExpr::Or { left, right } => match self.truth(left, feature, ctx)? {
                Some(true) => Some(true),
                left => match (left, self.truth(right, feature, ctx)?) {
                    (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                },
            },
            BooleanExpr::Not { inner } => self.truth(inner, feature, ctx)?.map(|b| !b),
            BooleanExpr::Comparison {
                property,
                operator,
                value,
            } => lookup(feature, property).and_then(|v| compare(v, *operator, value)),
            BooleanExpr::In { property, values } => {
                lookup(feature, property).and_then(|v| contains(v, values))
            }
            BooleanExpr::Regex { property, pattern } => {
                let re = prepared(&self.regexes, pattern)?;
                lookup(feature, property)
                    .and_then(as_text)
                    .map(|s| re.is_match(&s))
            }
            BooleanExpr::Like { property, pattern } => {
                let re = prepared(&self.likes, pattern)?;
                lookup(feature, property)
                    .and_then(as_text)
                    .map(|s| re.is_match(&s))
            }
            BooleanExpr::NullTest { property, is_null } => {
                Some(lookup(feature, property).is_none() == *is_null)
            }
            BooleanExpr::Literal { value } => Some(*value),
            BooleanExpr::IntersectsBbox => {
                let window = ctx
                    .reference_window()
                    .ok_or(StoreError::MissingReferenceWindow)?;
                Some(intersects_envelope(&feature.geometry, window))
            }
            BooleanExpr::IntersectsGeom { wkt } => {
                let reference = prepared(&self.geometries, wkt)?;
                Some(feature.geometry.intersects(reference))
            }
        };
        Ok(truth)
    }
}

/// Evaluate `expr` for a single feature.
///
/// Prefer [`PreparedFilter`] when the same predicate runs over many features.
pub fn evaluate(expr: &BooleanExpr, feature: &Feature, ctx: &EvalContext) -> Result<bool> {
    PreparedFilter::new(expr)?.matches(feature, ctx)
}

fn prepared<'m, T>(compiled: &'m HashMap<&str, T>, literal: &str) -> Result<&'m T> {
    compiled
        .get(literal)
        .ok_or_else(|| StoreError::InvalidInput(format!("literal '{}' was not prepared", literal)))
}

/// Non-null value at `property`.
fn lookup<'a>(feature: &'a Feature, property: &PropertyExpr) -> Option<&'a JsonValue> {
    feature.property(property).filter(|v| !v.is_null())
}

/// `None` when the value cannot be read as the literal's cast type.
fn compare(value: &JsonValue, operator: CompareOp, literal: &ValueExpr) -> Option<bool> {
    let ord: Ordering = match literal {
        ValueExpr::Integer { .. } | ValueExpr::Decimal { .. } => {
            as_decimal(value)?.partial_cmp(&literal.as_f64()?)?
        }
        ValueExpr::Boolean { value: r } => as_bool(value)?.cmp(r),
        ValueExpr::Text { value: r } => as_text(value)?.as_str().cmp(r.as_str()),
    };
    Some(operator.holds(ord))
}

/// `x in (a, b)` as `x = a or x = b`.
fn contains(value: &JsonValue, values: &ValueListExpr) -> Option<bool> {
    let mut unknown = false;
    for member in values.iter() {
        match compare(value, CompareOp::Eq, member) {
            Some(true) => return Some(true),
            Some(false) => {}
            None => unknown = true,
        }
    }
    if unknown {
        None
    } else {
        Some(false)
    }
}

fn as_decimal(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn as_bool(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        JsonValue::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn as_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Anchored, case-insensitive regex for a SQL LIKE pattern.
fn like_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::with_capacity(pattern.len() + 2);
    re.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    RegexBuilder::new(&re)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| invalid_pattern(pattern, e))
}

fn invalid_pattern(pattern: &str, err: regex::Error) -> StoreError {
    StoreError::Query(QueryError {
        error_type: QueryErrorType::InvalidPattern,
        message: format!("Invalid pattern '{}': {}", pattern, err),
        position: None,
    })
}
