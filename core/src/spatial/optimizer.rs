// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Window query decomposition into Morton-code index terms.
//!
//! A window is split into every leaf cell it touches, then each leaf's
//! ancestors are added so that documents indexed at a coarser code also match.
//! Index lookups must test stored codes for exact equality against one member
//! of the set; results are a cell-granular superset and need an exact
//! post-filter against the window.

use std::collections::BTreeSet;

use serde_json::{json, Map, Value as JsonValue};

use super::envelope::Envelope;
use super::morton::{MortonCode, MortonContext};

/// Strategy turning a query window into the codes to look up.
pub trait QueryOptimizer {
    fn optimize(&self, window: &Envelope, context: &MortonContext) -> BTreeSet<MortonCode>;
}

/// Quadtree subdivision with ancestor expansion.
#[derive(Debug, Clone, Copy, Default)]
pub struct MortonCodeQueryOptimizer;

impl MortonCodeQueryOptimizer {
    pub fn new() -> Self {
        Self
    }

    /// Leaf codes whose cell intersects `window`.
    pub fn leaf_cells(&self, window: &Envelope, context: &MortonContext) -> BTreeSet<MortonCode> {
        let mut leaves = BTreeSet::new();
        divide(MortonCode::root(), window, context, &mut leaves);
        leaves
    }

    /// Add every ancestor prefix, including the root, of each code.
    pub fn expand(codes: BTreeSet<MortonCode>) -> BTreeSet<MortonCode> {
        let mut expanded = BTreeSet::new();
        for code in &codes {
            for ancestor in code.ancestors() {
                // shared prefixes are visited once per leaf; stop at the first known one
                if !expanded.insert(ancestor) {
                    break;
                }
            }
        }
        expanded.extend(codes);
        expanded
    }
}

impl QueryOptimizer for MortonCodeQueryOptimizer {
    fn optimize(&self, window: &Envelope, context: &MortonContext) -> BTreeSet<MortonCode> {
        let leaves = self.leaf_cells(window, context);
        let leaf_count = leaves.len();
        let codes = Self::expand(leaves);
        tracing::debug!(
            window = %window,
            depth = context.depth(),
            leaves = leaf_count,
            codes = codes.len(),
            "Optimized window query"
        );
        codes
    }
}

fn divide(
    code: MortonCode,
    window: &Envelope,
    context: &MortonContext,
    out: &mut BTreeSet<MortonCode>,
) {
    if !context.cell_envelope(&code).intersects(window) {
        return;
    }
    if code.len() >= context.depth() {
        out.insert(code);
        return;
    }
    for child in code.children() {
        divide(child, window, context, out);
    }
}

/// OR-set of exact-equality index terms on `field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexQuery {
    field: String,
    codes: BTreeSet<MortonCode>,
}

impl IndexQuery {
    pub fn new(field: impl Into<String>, codes: BTreeSet<MortonCode>) -> Self {
        Self {
            field: field.into(),
            codes,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn codes(&self) -> &BTreeSet<MortonCode> {
        &self.codes
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Stored codes match on equality only, never by prefix.
    pub fn matches(&self, stored: &MortonCode) -> bool {
        self.codes.contains(stored)
    }

    /// One `{ field: code }` document per code.
    pub fn terms(&self) -> Vec<JsonValue> {
        self.codes
            .iter()
            .map(|code| {
                let mut term = Map::new();
                term.insert(self.field.clone(), JsonValue::from(code.as_str()));
                JsonValue::Object(term)
            })
            .collect()
    }

    pub fn to_document(&self) -> JsonValue {
        json!({ "$or": self.terms() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(depth: usize) -> MortonContext {
        MortonContext::new(Envelope::new(0.0, 0.0, 16.0, 16.0, 4326).unwrap(), depth).unwrap()
    }

    fn codes(list: &[&str]) -> BTreeSet<MortonCode> {
        list.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_full_extent_depth_two() {
        let ctx = context(2);
        let result = MortonCodeQueryOptimizer.optimize(ctx.extent(), &ctx);
        assert_eq!(result.len(), 21);
        let mut expected = vec!["".to_string()];
        for a in 0..4 {
            expected.push(a.to_string());
            for b in 0..4 {
                expected.push(format!("{}{}", a, b));
            }
        }
        let expected: BTreeSet<MortonCode> =
            expected.into_iter().map(|s| s.parse().unwrap()).collect();
        assert_eq!(result, expected);
    }

    #[test]
    fn test_small_window_in_one_leaf() {
        let ctx = context(2);
        let window = Envelope::new(1.0, 1.0, 2.0, 2.0, 4326).unwrap();
        let result = MortonCodeQueryOptimizer.optimize(&window, &ctx);
        assert_eq!(result, codes(&["", "0", "00"]));
    }

    #[test]
    fn test_window_on_cell_boundary_includes_both_sides() {
        let ctx = context(1);
        let window = Envelope::new(8.0, 1.0, 8.0, 2.0, 4326).unwrap();
        let result = MortonCodeQueryOptimizer.optimize(&window, &ctx);
        assert_eq!(result, codes(&["", "0", "1"]));
    }

    #[test]
    fn test_window_outside_extent() {
        let ctx = context(3);
        let window = Envelope::new(20.0, 20.0, 30.0, 30.0, 4326).unwrap();
        assert!(MortonCodeQueryOptimizer.optimize(&window, &ctx).is_empty());
    }

    #[test]
    fn test_expand() {
        let expanded = MortonCodeQueryOptimizer::expand(codes(&["012", "013", "2"]));
        assert_eq!(expanded, codes(&["", "0", "01", "012", "013", "2"]));
    }

    #[test]
    fn test_index_query_document() {
        let query = IndexQuery::new("morton", codes(&["", "1"]));
        assert_eq!(
            query.to_document(),
            json!({ "$or": [{ "morton": "" }, { "morton": "1" }] })
        );
        assert!(query.matches(&"1".parse().unwrap()));
        assert!(!query.matches(&"10".parse().unwrap()));
    }
}
