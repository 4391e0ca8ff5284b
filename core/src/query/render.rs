// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Renders a [`BooleanExpr`] into a backend predicate string.
//!
//! All dialects share the same recursive rendering; they only differ in how a
//! property access is written and whether it carries a type cast.

use super::ast::{quote, BooleanExpr, Cast, PropertyExpr, ValueExpr};
use crate::error::{Result, StoreError};
use crate::spatial::Envelope;

/// Per-call render settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    reference_window: Option<String>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `text` verbatim as the `intersects bbox` reference.
    pub fn with_reference_window(text: impl Into<String>) -> Self {
        Self {
            reference_window: Some(text.into()),
        }
    }

    /// Use the WKT polygon of `envelope` as the `intersects bbox` reference.
    pub fn with_envelope(envelope: &Envelope) -> Self {
        Self::with_reference_window(envelope.to_wkt())
    }

    pub fn reference_window(&self) -> Option<&str> {
        self.reference_window.as_deref()
    }
}

/// Backend predicate dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Properties live in a JSON document column and are read through
    /// `json_extract_path_text`, cast to the literal's type.
    JsonPath,
    /// Properties are plain columns; the `properties.` prefix is dropped.
    PlainAttribute,
}

impl Dialect {
    pub fn render(&self, expr: &BooleanExpr, ctx: &RenderContext) -> Result<String> {
        match expr {
            BooleanExpr::And { left, right } => Ok(format!(
                "( {} ) AND ( {} )",
                self.render(left, ctx)?,
                self.render(right, ctx)?
            )),
            BooleanExpr::Or { left, right } => Ok(format!(
                "( {} ) OR ( {} )",
                self.render(left, ctx)?,
                self.render(right, ctx)?
            )),
            BooleanExpr::Not { inner } => Ok(format!("NOT ( {} )", self.render(inner, ctx)?)),
            BooleanExpr::Comparison {
                property,
                operator,
                value,
            } => Ok(format!(
                "{} {} ( {} )",
                self.property_access(property, Some(value.cast())),
                operator.symbol(),
                value.to_literal()
            )),
            BooleanExpr::In { property, values } => {
                let rendered: Vec<String> = values.iter().map(ValueExpr::to_literal).collect();
                Ok(format!(
                    "{} in ({})",
                    self.property_access(property, Some(values.cast())),
                    rendered.join(", ")
                ))
            }
            BooleanExpr::Regex { property, pattern } => Ok(format!(
                "{} ~ {}",
                self.property_access(property, None),
                quote(pattern)
            )),
            BooleanExpr::Like { property, pattern } => Ok(format!(
                "{} ilike {}",
                self.property_access(property, None),
                quote(pattern)
            )),
            BooleanExpr::NullTest { property, is_null } => Ok(format!(
                "{} is {}null",
                self.property_access(property, None),
                if *is_null { "" } else { "not " }
            )),
            BooleanExpr::Literal { value } => Ok(format!(" {} ", value)),
            BooleanExpr::IntersectsBbox => {
                let window = ctx
                    .reference_window()
                    .ok_or(StoreError::MissingReferenceWindow)?;
                Ok(format!("ST_Intersects( geometry, {} )", quote(window)))
            }
            BooleanExpr::IntersectsGeom { wkt } => {
                Ok(format!("ST_Intersects( geometry, {} )", quote(wkt)))
            }
        }
    }

    /// Backend expression reading `property`, cast when the node allows it.
    pub fn property_access(&self, property: &PropertyExpr, cast: Option<Cast>) -> String {
        match self {
            Dialect::JsonPath => {
                let path: Vec<String> = property
                    .segments()
                    .iter()
                    .map(|s| quote(s))
                    .collect();
                let access = format!("json_extract_path_text(json, {})", path.join(","));
                match cast {
                    Some(cast) => format!("{}{}", access, cast.suffix()),
                    None => access,
                }
            }
            Dialect::PlainAttribute => match property.segments() {
                [head, rest @ ..] if head == "properties" && !rest.is_empty() => rest.join("."),
                segments => segments.join("."),
            },
        }
    }
}

/// Render `expr` in `dialect`.
pub fn render(expr: &BooleanExpr, dialect: Dialect, ctx: &RenderContext) -> Result<String> {
    dialect.render(expr, ctx)
}
