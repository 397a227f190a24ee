// SPDX-License-Identifier: GPL-3.0-only

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A raw event pushed by the middleware
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    /// Event mask the push was published under
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl EventData {
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Decode the arguments of an entity-subscriber event
    pub fn entity_change<T: DeserializeOwned>(&self) -> Result<EntityChange<T>, serde_json::Error> {
        EntityChange::deserialize(&self.args)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityOperation {
    Create,
    Update,
    Delete,
}

/// Arguments of an `entity-subscriber.<entity>.changed` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct EntityChange<T> {
    pub operation: EntityOperation,
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub entities: Vec<T>,
}
