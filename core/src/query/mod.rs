// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Filter predicate language.
//!
//! # Syntax
//!
//! ```text
//! properties.kind = 'road'
//! properties.lanes >= 2 AND NOT properties.toll = true
//! (name like 'main%' OR name ~ /^Route \d+$/) AND ref is not null
//! properties.kind in ('road', 'path')
//! intersects bbox
//! intersects 'POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))'
//! ```
//!
//! # Operators
//!
//! | Operator | Meaning | Example |
//! |----------|---------|---------|
//! | `=`, `!=` | Equality | `a.b = 12` |
//! | `>`, `>=`, `<`, `<=` | Range | `height > 2.5` |
//! | `in` | Set membership | `kind in ('a', 'b')` |
//! | `like` | Case-insensitive SQL pattern (`%`, `_`) | `name like 'a%'` |
//! | `~` | Regular expression | `name ~ /^a.c$/` |
//! | `is [not] null` | Presence | `ref is not null` |
//! | `intersects` | Spatial overlap | `intersects bbox` |
//! | `and`, `or`, `not` | Boolean combinators | `not a = 1` |
//!
//! Parsed trees are rendered for a backend with a [`Dialect`], or evaluated
//! in memory with [`evaluate`] or a reusable [`PreparedFilter`].

pub mod ast;
pub mod eval;
pub mod parser;
pub mod render;

pub use ast::{
    BooleanExpr, Cast, CompareOp, Position, PropertyExpr, QueryError, QueryErrorType, ValueExpr,
    ValueListExpr,
};
pub use eval::{evaluate, EvalContext, PreparedFilter};
pub use parser::parse;
pub use render::{render, Dialect, RenderContext};
