// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Z-order (Morton) codes over a fixed quadtree.
//!
//! A code is a string over `0123`; each digit selects a quadrant of the
//! previous cell:
//!
//! ```text
//!   +---+---+
//!   | 2 | 3 |
//!   +---+---+
//!   | 0 | 1 |
//!   +---+---+
//! ```
//!
//! A coordinate exactly on a split line belongs to the upper/right half.
//! Encoding and decoding walk the tree with the same midpoint arithmetic, so a
//! point always lies inside the cell of its own code.

use std::fmt;

use geo::BoundingRect;
use geo_types::Geometry;
use serde::{Deserialize, Serialize};

use super::envelope::Envelope;
use crate::error::{Result, StoreError};

/// Deepest supported quadtree.
pub const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MortonCode(String);

impl MortonCode {
    /// The empty code, covering the whole extent.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn digits(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.bytes().map(|b| b - b'0')
    }

    pub fn child(&self, digit: u8) -> Option<MortonCode> {
        if digit > 3 {
            return None;
        }
        let mut code = self.0.clone();
        code.push(char::from(b'0' + digit));
        Some(MortonCode(code))
    }

    pub fn children(&self) -> [MortonCode; 4] {
        ['0', '1', '2', '3'].map(|d| {
            let mut code = self.0.clone();
            code.push(d);
            MortonCode(code)
        })
    }

    pub fn parent(&self) -> Option<MortonCode> {
        if self.is_root() {
            None
        } else {
            Some(MortonCode(self.0[..self.0.len() - 1].to_string()))
        }
    }

    /// Proper prefixes, longest first, ending with the root.
    pub fn ancestors(&self) -> impl Iterator<Item = MortonCode> + '_ {
        (0..self.0.len()).rev().map(|n| MortonCode(self.0[..n].to_string()))
    }

    pub fn is_prefix_of(&self, other: &MortonCode) -> bool {
        other.0.starts_with(&self.0)
    }
}

impl fmt::Display for MortonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for MortonCode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(bad) = s.chars().find(|c| !matches!(c, '0'..='3')) {
            return Err(StoreError::InvalidCode(format!(
                "'{}' contains '{}', expected digits 0-3",
                s, bad
            )));
        }
        Ok(MortonCode(s.to_string()))
    }
}

impl TryFrom<String> for MortonCode {
    type Error = StoreError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<MortonCode> for String {
    fn from(code: MortonCode) -> Self {
        code.0
    }
}

/// Cell bounds while walking the tree.
#[derive(Debug, Clone, Copy)]
struct Cell {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Cell {
    fn of(extent: &Envelope) -> Self {
        Self {
            min_x: extent.min_x(),
            min_y: extent.min_y(),
            max_x: extent.max_x(),
            max_y: extent.max_y(),
        }
    }

    fn mid(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    fn quadrant_of(&self, x: f64, y: f64) -> u8 {
        let (mid_x, mid_y) = self.mid();
        let mut digit = 0;
        if x >= mid_x {
            digit |= 1;
        }
        if y >= mid_y {
            digit |= 2;
        }
        digit
    }

    fn quadrant(&self, digit: u8) -> Self {
        let (mid_x, mid_y) = self.mid();
        let mut cell = *self;
        if digit & 1 == 0 {
            cell.max_x = mid_x;
        } else {
            cell.min_x = mid_x;
        }
        if digit & 2 == 0 {
            cell.max_y = mid_y;
        } else {
            cell.min_y = mid_y;
        }
        cell
    }
}

/// Extent and depth of a collection's quadtree. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MortonContext {
    extent: Envelope,
    depth: usize,
}

impl MortonContext {
    pub fn new(extent: Envelope, depth: usize) -> Result<Self> {
        if depth == 0 || depth > MAX_DEPTH {
            return Err(StoreError::InvalidContext(format!(
                "depth must be within 1..={}, got {}",
                MAX_DEPTH, depth
            )));
        }
        if extent.width() <= 0.0 || extent.height() <= 0.0 {
            return Err(StoreError::InvalidContext(format!(
                "extent {} has zero area",
                extent
            )));
        }
        Ok(Self { extent, depth })
    }

    pub fn extent(&self) -> &Envelope {
        &self.extent
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Leaf code of the cell containing `(x, y)`.
    pub fn code_of_point(&self, x: f64, y: f64) -> Result<MortonCode> {
        if !self.extent.contains_point(x, y) {
            return Err(StoreError::OutOfExtent(format!(
                "point ({}, {}) is outside {}",
                x, y, self.extent
            )));
        }
        let mut cell = Cell::of(&self.extent);
        let mut code = String::with_capacity(self.depth);
        for _ in 0..self.depth {
            let digit = cell.quadrant_of(x, y);
            code.push(char::from(b'0' + digit));
            cell = cell.quadrant(digit);
        }
        Ok(MortonCode(code))
    }

    /// Leaf code of the bounding-box center of `geometry`.
    pub fn code_of_geometry(&self, geometry: &Geometry<f64>) -> Result<MortonCode> {
        let bbox = self.bounding_envelope(geometry)?;
        let (x, y) = bbox.center();
        self.code_of_point(x, y)
    }

    /// Deepest code whose cell contains all of `bbox`.
    pub fn covering_code(&self, bbox: &Envelope) -> Result<MortonCode> {
        if !self.extent.contains(bbox) {
            return Err(StoreError::OutOfExtent(format!(
                "{} is not within {}",
                bbox, self.extent
            )));
        }
        let mut cell = Cell::of(&self.extent);
        let mut code = String::with_capacity(self.depth);
        while code.len() < self.depth {
            let low = cell.quadrant_of(bbox.min_x(), bbox.min_y());
            let high = cell.quadrant_of(bbox.max_x(), bbox.max_y());
            if low != high {
                break;
            }
            code.push(char::from(b'0' + low));
            cell = cell.quadrant(low);
        }
        Ok(MortonCode(code))
    }

    /// Bounding box of `geometry`, checked against the extent.
    pub fn bounding_envelope(&self, geometry: &Geometry<f64>) -> Result<Envelope> {
        let rect = geometry
            .bounding_rect()
            .ok_or_else(|| StoreError::InvalidGeometry("geometry is empty".into()))?;
        let bbox = Envelope::from_rect(rect, self.extent.crs())
            .map_err(|e| StoreError::InvalidGeometry(e.to_string()))?;
        if !self.extent.contains(&bbox) {
            return Err(StoreError::OutOfExtent(format!(
                "{} is not within {}",
                bbox, self.extent
            )));
        }
        Ok(bbox)
    }

    /// Cell rectangle of `code`; the root code yields the whole extent.
    pub fn envelope_of(&self, code: &MortonCode) -> Result<Envelope> {
        if code.len() > self.depth {
            return Err(StoreError::InvalidCode(format!(
                "'{}' is longer than depth {}",
                code, self.depth
            )));
        }
        Ok(self.cell_envelope(code))
    }

    pub(crate) fn cell_envelope(&self, code: &MortonCode) -> Envelope {
        let cell = code
            .digits()
            .fold(Cell::of(&self.extent), |cell, d| cell.quadrant(d));
        Envelope::from_parts(
            cell.min_x,
            cell.min_y,
            cell.max_x,
            cell.max_y,
            self.extent.crs(),
        )
    }
}
