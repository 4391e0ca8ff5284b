// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

use std::env;

use crate::error::Result;
use crate::spatial::{Envelope, MortonContext};

pub const DEFAULT_EXTENT: &str = "4326:-180,-90,180,90";
pub const DEFAULT_MORTON_DEPTH: usize = 8;
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_INDEX_FIELD: &str = "morton";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub extent: Envelope,
    pub morton_depth: usize,
    pub batch_size: usize,
    pub index_field: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extent: default_extent(),
            morton_depth: DEFAULT_MORTON_DEPTH,
            batch_size: DEFAULT_BATCH_SIZE,
            index_field: DEFAULT_INDEX_FIELD.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unparseable values fall back to
    /// defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let extent = match lookup("GEOSTORE_EXTENT") {
            Some(raw) => Envelope::decode(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "Invalid GEOSTORE_EXTENT, using default");
                default_extent()
            }),
            None => default_extent(),
        };
        let morton_depth = parse_or("GEOSTORE_MORTON_DEPTH", &lookup, DEFAULT_MORTON_DEPTH);
        let batch_size = parse_or("GEOSTORE_BATCH_SIZE", &lookup, DEFAULT_BATCH_SIZE);
        let index_field = lookup("GEOSTORE_INDEX_FIELD")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_INDEX_FIELD.to_string());
        Self {
            extent,
            morton_depth,
            batch_size,
            index_field,
        }
    }

    pub fn morton_context(&self) -> Result<MortonContext> {
        MortonContext::new(self.extent, self.morton_depth)
    }
}

fn parse_or<F>(key: &str, lookup: &F, default: usize) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default, "Invalid config value, using default");
            default
        }),
        None => default,
    }
}

fn default_extent() -> Envelope {
    Envelope::from_parts(-180.0, -90.0, 180.0, 90.0, 4326)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config, Config::default());
        assert_eq!(config.extent.encode(), DEFAULT_EXTENT);
        assert_eq!(config.morton_context().unwrap().depth(), DEFAULT_MORTON_DEPTH);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("GEOSTORE_EXTENT", "3857:0,0,100,50"),
            ("GEOSTORE_MORTON_DEPTH", "12"),
            ("GEOSTORE_BATCH_SIZE", " 50 "),
            ("GEOSTORE_INDEX_FIELD", "zcode"),
        ]));
        assert_eq!(config.extent, Envelope::new(0.0, 0.0, 100.0, 50.0, 3857).unwrap());
        assert_eq!(config.morton_depth, 12);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.index_field, "zcode");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("GEOSTORE_EXTENT", "world"),
            ("GEOSTORE_MORTON_DEPTH", "deep"),
        ]));
        assert_eq!(config.extent, default_extent());
        assert_eq!(config.morton_depth, DEFAULT_MORTON_DEPTH);
    }

    #[test]
    fn test_invalid_depth_surfaces_in_context() {
        let config = Config::from_lookup(lookup(&[("GEOSTORE_MORTON_DEPTH", "0")]));
        assert!(config.morton_context().is_err());
    }
}
