// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Axis-aligned spatial extent tagged with a CRS code.
//!
//! Text form: `<crs>:<minX>,<minY>,<maxX>,<maxY>` with a zero-padded 4 digit
//! CRS code, e.g. `4326:-180,-90,180,90`.

use std::fmt;
use std::sync::LazyLock;

use geo_types::{coord, Rect};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Highest CRS code representable in the 4 digit text form.
pub const MAX_CRS: u16 = 9999;

// Coordinates are plain decimals, the form `encode` writes.
static ENVELOPE_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    let num = r"(-?[0-9]+(?:\.[0-9]+)?)";
    Regex::new(&format!(r"^([0-9]{{4}}):{num},{num},{num},{num}$")).expect("static regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Envelope {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    crs: u16,
}

impl Envelope {
    /// Coordinates must be finite with `min <= max` on both axes.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64, crs: u16) -> Result<Self> {
        if ![min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite()) {
            return Err(StoreError::InvalidInput(
                "envelope coordinates must be finite".into(),
            ));
        }
        if min_x > max_x || min_y > max_y {
            return Err(StoreError::InvalidInput(format!(
                "inverted envelope: ({}, {}) .. ({}, {})",
                min_x, min_y, max_x, max_y
            )));
        }
        if crs > MAX_CRS {
            return Err(StoreError::InvalidInput(format!(
                "crs code {} does not fit in 4 digits",
                crs
            )));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
            crs,
        })
    }

    /// Bounds already known to be valid, e.g. a subdivision of a valid extent.
    pub(crate) fn from_parts(min_x: f64, min_y: f64, max_x: f64, max_y: f64, crs: u16) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            crs,
        }
    }

    pub fn from_rect(rect: Rect<f64>, crs: u16) -> Result<Self> {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y, crs)
    }

    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    pub fn crs(&self) -> u16 {
        self.crs
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Closed-interval overlap; touching edges count.
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    pub fn contains(&self, other: &Envelope) -> bool {
        self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_x, y: self.min_y },
            coord! { x: self.max_x, y: self.max_y },
        )
    }

    /// Closed polygon ring, counter-clockwise from the lower-left corner.
    pub fn to_wkt(&self) -> String {
        format!(
            "POLYGON(({minx} {miny}, {maxx} {miny}, {maxx} {maxy}, {minx} {maxy}, {minx} {miny}))",
            minx = self.min_x,
            miny = self.min_y,
            maxx = self.max_x,
            maxy = self.max_y
        )
    }

    pub fn encode(&self) -> String {
        format!(
            "{:04}:{},{},{},{}",
            self.crs, self.min_x, self.min_y, self.max_x, self.max_y
        )
    }

    /// Parse the text form. Anything malformed yields `None`.
    pub fn decode(text: &str) -> Option<Self> {
        let caps = ENVELOPE_TEXT.captures(text)?;
        let crs: u16 = caps[1].parse().ok()?;
        let mut coords = [0.0f64; 4];
        for (slot, idx) in coords.iter_mut().zip(2..=5) {
            *slot = caps[idx].parse().ok()?;
        }
        Self::new(coords[0], coords[1], coords[2], coords[3], crs).ok()
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<Envelope> for String {
    fn from(envelope: Envelope) -> Self {
        envelope.encode()
    }
}

impl TryFrom<String> for Envelope {
    type Error = StoreError;

    fn try_from(text: String) -> Result<Self> {
        Envelope::decode(&text)
            .ok_or_else(|| StoreError::InvalidInput(format!("malformed envelope '{}'", text)))
    }
}
