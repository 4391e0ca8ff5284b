// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Morton-code spatial index.
//!
//! A [`MortonContext`] fixes the quadtree for a collection. Features are
//! stored under a [`MortonCode`]; a window query is answered by looking up the
//! code set produced by a [`QueryOptimizer`] and post-filtering the candidates
//! against the exact window.

pub mod envelope;
pub mod geometry;
pub mod morton;
pub mod optimizer;

pub use envelope::Envelope;
pub use geometry::{intersects_envelope, parse_wkt};
pub use morton::{MortonCode, MortonContext, MAX_DEPTH};
pub use optimizer::{IndexQuery, MortonCodeQueryOptimizer, QueryOptimizer};
