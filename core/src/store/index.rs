// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Morton-code index for window queries.
//!
//! Maps each stored code to the features filed under it. Lookups are exact
//! code equality; prefix relationships are handled by the query side through
//! ancestor expansion.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::spatial::{IndexQuery, MortonCode};

#[derive(Debug, Default)]
pub struct MortonIndex {
    by_code: HashMap<MortonCode, HashSet<u64>>,
    code_of: HashMap<u64, MortonCode>,
}

impl MortonIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(id, code)` pairs.
    pub fn build<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (u64, MortonCode)>,
    {
        let start = std::time::Instant::now();
        let mut index = Self::new();
        for (id, code) in entries {
            index.insert(id, code);
        }

        tracing::info!(
            features = index.code_of.len(),
            codes = index.by_code.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Built morton index"
        );
        index
    }

    /// File `id` under `code`, replacing any previous code for it.
    pub fn insert(&mut self, id: u64, code: MortonCode) {
        self.remove(id);
        self.by_code.entry(code.clone()).or_default().insert(id);
        self.code_of.insert(id, code);
    }

    pub fn remove(&mut self, id: u64) -> Option<MortonCode> {
        let code = self.code_of.remove(&id)?;
        if let Some(ids) = self.by_code.get_mut(&code) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_code.remove(&code);
            }
        }
        Some(code)
    }

    pub fn code_of(&self, id: u64) -> Option<&MortonCode> {
        self.code_of.get(&id)
    }

    pub fn len(&self) -> usize {
        self.code_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code_of.is_empty()
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn lookup_exact(&self, code: &MortonCode) -> HashSet<u64> {
        self.by_code.get(code).cloned().unwrap_or_default()
    }

    /// Union of exact matches for every code of `query`.
    pub fn lookup(&self, query: &IndexQuery) -> HashSet<u64> {
        let mut result = HashSet::new();
        for code in query.codes() {
            if let Some(ids) = self.by_code.get(code) {
                result.extend(ids.iter().copied());
            }
        }
        result
    }

    pub fn stats(&self) -> IndexStats {
        let mut by_length: BTreeMap<usize, usize> = BTreeMap::new();
        for (code, ids) in &self.by_code {
            *by_length.entry(code.len()).or_default() += ids.len();
        }
        IndexStats {
            features_indexed: self.code_of.len(),
            distinct_codes: self.by_code.len(),
            features_by_code_length: by_length,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct IndexStats {
    pub features_indexed: usize,
    pub distinct_codes: usize,
    pub features_by_code_length: BTreeMap<usize, usize>,
}
