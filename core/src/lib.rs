// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Query and spatial indexing core for a geospatial feature store.
//!
//! - [`query`]: filter predicate language (parser, AST, backend renderers,
//!   in-memory evaluator).
//! - [`spatial`]: envelopes, Morton codes and window query decomposition.
//! - [`store`]: feature ingestion and window queries over an in-memory
//!   Morton-indexed collection.

pub mod config;
pub mod error;
pub mod query;
pub mod spatial;
pub mod store;

pub use error::{Result, StoreError};
