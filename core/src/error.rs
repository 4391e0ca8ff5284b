// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::query::QueryError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("query error: {0}")]
    Query(#[from] QueryError),
    #[error("no reference window configured for `intersects bbox`")]
    MissingReferenceWindow,
    #[error("outside index extent: {0}")]
    OutOfExtent(String),
    #[error("invalid morton code: {0}")]
    InvalidCode(String),
    #[error("invalid morton context: {0}")]
    InvalidContext(String),
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("crs mismatch: expected {expected:04}, found {found:04}")]
    CrsMismatch { expected: u16, found: u16 },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
