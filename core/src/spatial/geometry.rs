// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

use std::str::FromStr;

use geo::Intersects;
use geo_types::Geometry;

use super::envelope::Envelope;
use crate::error::{Result, StoreError};

/// Parse WKT into a geometry.
pub fn parse_wkt(text: &str) -> Result<Geometry<f64>> {
    wkt::Wkt::<f64>::from_str(text)
        .map_err(|e| StoreError::InvalidGeometry(format!("{}: {}", e, text)))
        .and_then(|w| {
            w.try_into()
                .map_err(|e: wkt::conversion::Error| StoreError::InvalidGeometry(format!("{:?}", e)))
        })
}

/// Exact test of `geometry` against a rectangle.
pub fn intersects_envelope(geometry: &Geometry<f64>, envelope: &Envelope) -> bool {
    geometry.intersects(&Geometry::Rect(envelope.to_rect()))
}
