// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Batched ingestion from a [`Source`] into a [`Sink`].

use crate::error::{Result, StoreError};
use crate::spatial::MortonContext;

use super::{Feature, IndexedFeature, Sink, Source};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct IngestStats {
    pub ingested: usize,
    pub skipped: usize,
    pub batches: usize,
}

/// Assigns each feature the code of the smallest cell covering its bounding
/// box and forwards features to the sink in batches.
#[derive(Debug, Clone)]
pub struct Ingestor {
    context: MortonContext,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(context: MortonContext, batch_size: usize) -> Self {
        Self {
            context,
            batch_size: batch_size.max(1),
        }
    }

    pub fn context(&self) -> &MortonContext {
        &self.context
    }

    /// Code a feature is stored under.
    pub fn code_for(&self, feature: &Feature) -> Result<IndexedFeature> {
        let bbox = self.context.bounding_envelope(&feature.geometry)?;
        let code = self.context.covering_code(&bbox)?;
        Ok(IndexedFeature {
            code,
            feature: feature.clone(),
        })
    }

    /// Drain `source` into `sink`.
    ///
    /// Features that cannot be indexed (empty geometry, outside the extent)
    /// are logged and skipped; sink and source errors abort the run.
    pub fn run<S, K>(&self, source: &mut S, sink: &mut K) -> Result<IngestStats>
    where
        S: Source + ?Sized,
        K: Sink + ?Sized,
    {
        let mut stats = IngestStats::default();
        loop {
            let batch = source.next_batch(self.batch_size)?;
            if batch.is_empty() {
                break;
            }

            let mut indexed = Vec::with_capacity(batch.len());
            for feature in batch {
                match self.code_for(&feature) {
                    Ok(entry) => indexed.push(entry),
                    Err(err @ (StoreError::OutOfExtent(_) | StoreError::InvalidGeometry(_))) => {
                        tracing::warn!(feature_id = feature.id, error = %err, "Skipping feature");
                        stats.skipped += 1;
                    }
                    Err(err) => return Err(err),
                }
            }

            stats.ingested += indexed.len();
            if !indexed.is_empty() {
                sink.write_batch(indexed)?;
                stats.batches += 1;
            }
        }

        tracing::info!(
            ingested = stats.ingested,
            skipped = stats.skipped,
            batches = stats.batches,
            "Ingest complete"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Envelope;
    use crate::store::IterSource;
    use geo_types::{point, Geometry, GeometryCollection};

    #[derive(Default)]
    struct VecSink {
        batches: Vec<Vec<IndexedFeature>>,
    }

    impl Sink for VecSink {
        fn write_batch(&mut self, batch: Vec<IndexedFeature>) -> Result<()> {
            self.batches.push(batch);
            Ok(())
        }
    }

    struct FailingSink;

    impl Sink for FailingSink {
        fn write_batch(&mut self, _batch: Vec<IndexedFeature>) -> Result<()> {
            Err(StoreError::InvalidInput("disk full".into()))
        }
    }

    fn ingestor(batch_size: usize) -> Ingestor {
        let extent = Envelope::new(0.0, 0.0, 16.0, 16.0, 4326).unwrap();
        Ingestor::new(MortonContext::new(extent, 3).unwrap(), batch_size)
    }

    #[test]
    fn test_batches_and_skips() {
        let features = vec![
            Feature::new(1, point!(x: 1.0, y: 1.0)),
            Feature::new(2, point!(x: 100.0, y: 1.0)),
            Feature::new(3, point!(x: 15.0, y: 15.0)),
            Feature::new(4, Geometry::GeometryCollection(GeometryCollection::default())),
            Feature::new(5, point!(x: 9.0, y: 1.0)),
        ];
        let mut sink = VecSink::default();
        let stats = ingestor(2)
            .run(&mut IterSource::new(features), &mut sink)
            .unwrap();

        assert_eq!(stats.ingested, 3);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.batches, 3);
        let ids: Vec<u64> = sink
            .batches
            .iter()
            .flatten()
            .map(|f| f.feature.id)
            .collect();
        assert_eq!(ids, [1, 3, 5]);
        assert_eq!(sink.batches[0][0].code.as_str(), "000");
        assert_eq!(sink.batches[1][0].code.as_str(), "333");
    }

    #[test]
    fn test_sink_error_aborts() {
        let features = vec![Feature::new(1, point!(x: 1.0, y: 1.0))];
        let result = ingestor(10).run(&mut IterSource::new(features), &mut FailingSink);
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    }
}
