// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Feature ingestion and window queries over a Morton-indexed collection.
//!
//! Producers and consumers are abstracted as [`Source`] and [`Sink`];
//! [`Collection`] is the in-memory sink and [`SpatialStore`] answers window
//! queries against it with an injected [`QueryOptimizer`].
//!
//! [`QueryOptimizer`]: crate::spatial::QueryOptimizer

pub mod collection;
pub mod index;
pub mod ingest;

use geo_types::Geometry;
use serde_json::{Map, Value as JsonValue};

use crate::error::Result;
use crate::query::PropertyExpr;
use crate::spatial::MortonCode;

pub use collection::{Collection, SpatialStore};
pub use index::{IndexStats, MortonIndex};
pub use ingest::{IngestStats, Ingestor};

/// A geometry with attribute properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: u64,
    pub geometry: Geometry<f64>,
    pub properties: Map<String, JsonValue>,
}

impl Feature {
    pub fn new(id: u64, geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            id,
            geometry: geometry.into(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Resolve a property path.
    ///
    /// A leading `properties` segment is optional: `properties.a.b` and `a.b`
    /// address the same value. Array elements are addressed by index.
    pub fn property(&self, path: &PropertyExpr) -> Option<&JsonValue> {
        let segments = match path.segments() {
            [head, rest @ ..] if head == "properties" && !rest.is_empty() => rest,
            segments => segments,
        };
        let (first, rest) = segments.split_first()?;
        let mut current = self.properties.get(first)?;
        for segment in rest {
            current = match current {
                JsonValue::Object(map) => map.get(segment)?,
                JsonValue::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// A feature with the code it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedFeature {
    pub code: MortonCode,
    pub feature: Feature,
}

/// Producer of features.
pub trait Source {
    /// Up to `max` features; an empty batch means the source is exhausted.
    fn next_batch(&mut self, max: usize) -> Result<Vec<Feature>>;
}

/// Consumer of indexed features.
pub trait Sink {
    fn write_batch(&mut self, batch: Vec<IndexedFeature>) -> Result<()>;
}

/// [`Source`] over any iterator of features.
pub struct IterSource<I> {
    iter: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Feature>,
{
    pub fn new(iter: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            iter: iter.into_iter(),
        }
    }
}

impl<I> Source for IterSource<I>
where
    I: Iterator<Item = Feature>,
{
    fn next_batch(&mut self, max: usize) -> Result<Vec<Feature>> {
        Ok(self.iter.by_ref().take(max).collect())
    }
}
