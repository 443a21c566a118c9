use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};

/// The tag key used to group instances into projects.
pub const PROJECT_TAG: &str = "Project";

/// What we show when an instance carries no project tag.
pub const NO_PROJECT: &str = "no project";

/// The description stamped on every snapshot this tool creates.
pub const SNAPSHOT_DESCRIPTION: &str = "Created by shotty";

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromStr, Display, Serialize, Deserialize)]
#[display(style = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromStr, Display, Serialize, Deserialize)]
#[display(style = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum VolumeState {
    Creating,
    Available,
    InUse,
    Deleting,
    Deleted,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromStr, Display, Serialize, Deserialize)]
#[display(style = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotState {
    Pending,
    Completed,
    Error,
}

/// A compute instance as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub state: InstanceState,
    pub availability_zone: String,
    pub instance_type: String,
    #[serde(default)]
    pub public_dns: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Instance {
    /// Returns the value of the given tag, if the instance carries it.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(|v| v.as_str())
    }

    /// Returns the project tag, or "no project".
    pub fn project(&self) -> &str {
        self.tag(PROJECT_TAG).unwrap_or(NO_PROJECT)
    }
}

/// A block storage volume attached to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    pub instance_id: String,
    pub state: VolumeState,
    pub size_gib: u64,
    pub encrypted: bool,
}

/// A point-in-time copy of a volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub volume_id: String,
    pub state: SnapshotState,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
}

/// Selects which instances a command operates on.
///
/// A project and an instance id are alternative selectors; they do not
/// compose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceSelector {
    All,
    Project(String),
    Id(String),
}

impl InstanceSelector {
    /// Returns true if the instance is selected.
    pub fn matches(&self, instance: &Instance) -> bool {
        match self {
            InstanceSelector::All => true,
            InstanceSelector::Project(project) => instance.tag(PROJECT_TAG) == Some(project.as_str()),
            InstanceSelector::Id(id) => instance.id == *id,
        }
    }
}

impl std::fmt::Display for InstanceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceSelector::All => write!(f, "all instances"),
            InstanceSelector::Project(p) => write!(f, "project {}", p),
            InstanceSelector::Id(id) => write!(f, "instance {}", id),
        }
    }
}

/// A single page of results from a paginated provider listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next_page: Option<String>,
}
