//! Schema header describing generated or replayed data

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag keys, tag types and the ordered field keys of every measurement
///
/// Produced once by a data source before the first point and shared
/// read-only with every worker afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaHeader {
    pub tag_keys: Vec<String>,
    pub tag_types: Vec<String>,
    pub field_keys: BTreeMap<String, Vec<String>>,
}

impl SchemaHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// A header carries no schema (line protocol files have none)
    pub fn is_empty(&self) -> bool {
        self.tag_keys.is_empty() && self.field_keys.is_empty()
    }

    /// Ordered field keys of a measurement
    pub fn fields(&self, measurement: &str) -> Option<&[String]> {
        self.field_keys.get(measurement).map(Vec::as_slice)
    }

    pub fn with_tag(mut self, key: impl Into<String>, tag_type: impl Into<String>) -> Self {
        self.tag_keys.push(key.into());
        self.tag_types.push(tag_type.into());
        self
    }

    pub fn with_measurement<I, S>(mut self, measurement: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_keys
            .insert(measurement.into(), fields.into_iter().map(Into::into).collect());
        self
    }
}
