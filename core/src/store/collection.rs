// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! In-memory feature collection and its window-query adapter.

use std::collections::HashMap;

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::query::{BooleanExpr, EvalContext, PreparedFilter};
use crate::spatial::{intersects_envelope, Envelope, IndexQuery, MortonContext, QueryOptimizer};

use super::index::{IndexStats, MortonIndex};
use super::{Feature, IndexedFeature, Sink};

/// Features keyed by id plus their Morton index.
#[derive(Debug, Default)]
pub struct Collection {
    name: String,
    features: HashMap<u64, Feature>,
    index: MortonIndex,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Feature> {
        self.features.get(&id)
    }

    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.features.values()
    }

    pub fn index(&self) -> &MortonIndex {
        &self.index
    }

    pub fn index_stats(&self) -> IndexStats {
        self.index.stats()
    }

    /// Store or replace a feature under `code`.
    pub fn upsert(&mut self, entry: IndexedFeature) {
        let id = entry.feature.id;
        self.index.insert(id, entry.code);
        self.features.insert(id, entry.feature);
    }

    pub fn remove(&mut self, id: u64) -> Option<Feature> {
        self.index.remove(id);
        self.features.remove(&id)
    }
}

impl Sink for Collection {
    fn write_batch(&mut self, batch: Vec<IndexedFeature>) -> Result<()> {
        for entry in batch {
            self.upsert(entry);
        }
        Ok(())
    }
}

/// Window queries over a [`Collection`] using an injected optimizer.
pub struct SpatialStore<O> {
    collection: Collection,
    context: MortonContext,
    optimizer: O,
    index_field: String,
}

impl<O: QueryOptimizer> SpatialStore<O> {
    pub fn new(collection: Collection, context: MortonContext, optimizer: O) -> Self {
        Self {
            collection,
            context,
            optimizer,
            index_field: crate::config::DEFAULT_INDEX_FIELD.to_string(),
        }
    }

    pub fn from_config(collection: Collection, config: &Config, optimizer: O) -> Result<Self> {
        let mut store = Self::new(collection, config.morton_context()?, optimizer);
        store.index_field = config.index_field.clone();
        Ok(store)
    }

    pub fn context(&self) -> &MortonContext {
        &self.context
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn collection_mut(&mut self) -> &mut Collection {
        &mut self.collection
    }

    pub fn into_collection(self) -> Collection {
        self.collection
    }

    /// Index terms a backend would OR together for `window`.
    pub fn index_query(&self, window: &Envelope) -> Result<IndexQuery> {
        let expected = self.context.extent().crs();
        if window.crs() != expected {
            return Err(StoreError::CrsMismatch {
                expected,
                found: window.crs(),
            });
        }
        Ok(IndexQuery::new(
            self.index_field.clone(),
            self.optimizer.optimize(window, &self.context),
        ))
    }

    /// Features whose geometry intersects `window`, ordered by id.
    pub fn window_query(&self, window: &Envelope) -> Result<Vec<&Feature>> {
        let query = self.index_query(window)?;
        let candidates = self.collection.index.lookup(&query);
        let mut hits: Vec<&Feature> = candidates
            .iter()
            .filter_map(|id| self.collection.get(*id))
            .filter(|f| intersects_envelope(&f.geometry, window))
            .collect();
        hits.sort_by_key(|f| f.id);

        tracing::debug!(
            collection = %self.collection.name,
            codes = query.codes().len(),
            candidates = candidates.len(),
            hits = hits.len(),
            "Window query"
        );
        Ok(hits)
    }

    /// Features matching `filter`, optionally restricted to `window`.
    ///
    /// The window also serves as the `intersects bbox` reference.
    pub fn query(&self, filter: &BooleanExpr, window: Option<&Envelope>) -> Result<Vec<&Feature>> {
        let filter = PreparedFilter::new(filter)?;
        let (candidates, ctx) = match window {
            Some(window) => (
                self.window_query(window)?,
                EvalContext::with_reference_window(*window),
            ),
            None => {
                let mut all: Vec<&Feature> = self.collection.features().collect();
                all.sort_by_key(|f| f.id);
                (all, EvalContext::new())
            }
        };

        let mut matched = Vec::with_capacity(candidates.len());
        for feature in candidates {
            if filter.matches(feature, &ctx)? {
                matched.push(feature);
            }
        }
        Ok(matched)
    }
}

impl<O> Sink for SpatialStore<O> {
    fn write_batch(&mut self, batch: Vec<IndexedFeature>) -> Result<()> {
        self.collection.write_batch(batch)
    }
}
