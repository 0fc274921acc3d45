// In: src/config.rs

//! The single source of truth for codec configuration.
//!
//! `CodecConfig` is created once at the connection boundary (defaults, or
//! deserialized from JSON) and shared read-only through an `Arc` inside
//! `ServerContext`, which also carries the facts negotiated with the server:
//! its timezone, protocol revision and feature flags. Nothing here is global
//! state; every column receives the context it was resolved with.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// First protocol revision that sends a per-column custom-serialization flag.
pub const DBMS_MIN_REVISION_WITH_CUSTOM_SERIALIZATION: u64 = 54454;

/// Revision this codec speaks by default.
pub const DEFAULT_REVISION: u64 = 54460;

//==================================================================================
// I. String pre-sizing
//==================================================================================

/// Capacity hints for the byte storage of String columns. Columns are matched
/// by name; anything without an override uses `default_capacity`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StringBufferConfig {
    #[serde(default)]
    pub default_capacity: usize,

    #[serde(default)]
    pub per_column: BTreeMap<String, usize>,
}

impl StringBufferConfig {
    /// Returns the byte capacity to reserve for the column `name`.
    pub fn capacity_for(&self, name: &str) -> usize {
        self.per_column
            .get(name)
            .copied()
            .unwrap_or(self.default_capacity)
    }
}

//==================================================================================
// II. The Unified CodecConfig
//==================================================================================

/// Tunables for the self-describing column family and buffer sizing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CodecConfig {
    /// Branch cap of `Dynamic` columns that do not declare `max_types`.
    #[serde(default = "default_dynamic_max_types")]
    pub dynamic_max_types: usize,

    /// Dynamic path cap of `JSON` columns that do not declare `max_dynamic_paths`.
    #[serde(default = "default_json_max_dynamic_paths")]
    pub json_max_dynamic_paths: usize,

    /// Branch cap of the Dynamic columns created for JSON dynamic paths.
    #[serde(default = "default_dynamic_max_types")]
    pub json_max_dynamic_types: usize,

    #[serde(default)]
    pub string_buffer: StringBufferConfig,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            dynamic_max_types: default_dynamic_max_types(),
            json_max_dynamic_paths: default_json_max_dynamic_paths(),
            json_max_dynamic_types: default_dynamic_max_types(),
            string_buffer: StringBufferConfig::default(),
        }
    }
}

impl CodecConfig {
    /// Parses a configuration from JSON text. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Helper for `serde` to provide a default for the Dynamic branch cap.
fn default_dynamic_max_types() -> usize {
    32
}

/// Helper for `serde` to provide a default for the JSON dynamic path cap.
fn default_json_max_dynamic_paths() -> usize {
    1024
}

//==================================================================================
// III. Server context
//==================================================================================

/// Feature flags negotiated with the server.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ServerFeatures {
    /// Use the V2 serialization of Dynamic and JSON (no explicit type/path cap).
    #[serde(default)]
    pub dynamic_json_v2: bool,
}

/// Out-of-band facts about the server, constant for one connection.
#[derive(Debug, Clone)]
pub struct ServerContext {
    pub timezone: Tz,
    pub revision: u64,
    pub features: ServerFeatures,
    pub config: Arc<CodecConfig>,
}

impl Default for ServerContext {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            revision: DEFAULT_REVISION,
            features: ServerFeatures::default(),
            config: Arc::new(CodecConfig::default()),
        }
    }
}

impl ServerContext {
    pub fn new(config: CodecConfig) -> Self {
        Self {
            config: Arc::new(config),
            ..Self::default()
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_features(mut self, features: ServerFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }
}

/// Parses an IANA timezone name such as `Europe/Amsterdam`.
pub fn parse_timezone(name: &str) -> Result<Tz, CodecError> {
    name.parse::<Tz>()
        .map_err(|e| CodecError::invalid_value("timezone", format!("{}: {}", name, e)))
}

//==================================================================================
// IV. Unit Tests
//==================================================================================
