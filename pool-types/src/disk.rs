//! Disk identifiers
//!
//! The middleware reports disks by device path (e.g. "/dev/ada0"). The console
//! never inspects a disk beyond its identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one physical disk as reported by the middleware
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiskId(String);

impl DiskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short device name for display (e.g. "ada0" for "/dev/ada0")
    pub fn device_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for DiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DiskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DiskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
