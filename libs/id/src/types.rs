//! Identity types for jobs and their instances.
//!
//! A job key is the `(cluster, role, environment, name)` tuple; each
//! component is a validated newtype so a key can never hold an invalid part.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::define_identifier;
use crate::IdError;

// =============================================================================
// Validation
// =============================================================================

/// Validates a role, environment or job name against `^[\w\-\.]+$`.
fn validate_identifier(field: &'static str, value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty { field });
    }

    let valid = value
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.');
    if !valid {
        return Err(IdError::InvalidIdentifier {
            field,
            value: value.to_string(),
        });
    }

    Ok(())
}

/// Validates a cluster name. Anything goes except empty and `/`.
fn validate_cluster(field: &'static str, value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty { field });
    }

    if value.contains('/') || value.chars().any(char::is_whitespace) {
        return Err(IdError::InvalidIdentifier {
            field,
            value: value.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Job Key Components
// =============================================================================

define_identifier!(Cluster, "cluster", validate_cluster);
define_identifier!(Role, "role", validate_identifier);
define_identifier!(Environment, "env", validate_identifier);
define_identifier!(JobName, "name", validate_identifier);

// =============================================================================
// Job Key
// =============================================================================

/// Globally unique identity of a job.
///
/// Equality and ordering follow the `(cluster, role, environment, name)` tuple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub cluster: Cluster,
    pub role: Role,
    pub environment: Environment,
    pub name: JobName,
}

impl JobKey {
    /// Creates a job key from validated components.
    #[must_use]
    pub fn new(cluster: Cluster, role: Role, environment: Environment, name: JobName) -> Self {
        Self {
            cluster,
            role,
            environment,
            name,
        }
    }

    /// Creates a job key from raw strings, validating every component.
    pub fn from_parts(
        cluster: &str,
        role: &str,
        environment: &str,
        name: &str,
    ) -> Result<Self, IdError> {
        Ok(Self {
            cluster: Cluster::parse(cluster)?,
            role: Role::parse(role)?,
            environment: Environment::parse(environment)?,
            name: JobName::parse(name)?,
        })
    }

    /// Parses a job key from `CLUSTER/ROLE/ENV/NAME`.
    pub fn from_path(path: &str) -> Result<Self, IdError> {
        let parts: Vec<&str> = path.split('/').collect();
        let [cluster, role, environment, name] = parts.as_slice() else {
            return Err(IdError::InvalidPath(path.to_string()));
        };

        Self::from_parts(cluster, role, environment, name)
    }

    /// Renders the key as `CLUSTER/ROLE/ENV/NAME`.
    #[must_use]
    pub fn to_path(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.cluster, self.role, self.environment, self.name
        )
    }
}

impl std::str::FromStr for JobKey {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_path(s)
    }
}

// =============================================================================
// Instance ID
// =============================================================================

/// Numbered replica of a job's task, unique within the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(u32);

impl InstanceId {
    /// Creates a new InstanceId from a u32.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for InstanceId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| IdError::InvalidInstance(s.to_string()))
    }
}

impl From<u32> for InstanceId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<InstanceId> for u32 {
    fn from(id: InstanceId) -> Self {
        id.0
    }
}

/// Largest number of instances a single `first-last` range may span.
pub const MAX_INSTANCE_RANGE: u32 = 100_000;

/// Parses an instance list such as `0-3,7,9`.
///
/// Returns the instances sorted ascending without duplicates. A range
/// spanning more than [`MAX_INSTANCE_RANGE`] instances is rejected.
pub fn parse_instances(list: &str) -> Result<Vec<InstanceId>, IdError> {
    let mut instances = BTreeSet::new();

    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((first, last)) => {
                let first: InstanceId = first.parse()?;
                let last: InstanceId = last.parse()?;
                if first > last {
                    return Err(IdError::InvalidRange {
                        first: first.value(),
                        last: last.value(),
                    });
                }
                if last.value() - first.value() >= MAX_INSTANCE_RANGE {
                    return Err(IdError::RangeTooLarge {
                        first: first.value(),
                        last: last.value(),
                        max: MAX_INSTANCE_RANGE,
                    });
                }
                instances.extend((first.value()..=last.value()).map(InstanceId));
            }
            None => {
                instances.insert(part.parse()?);
            }
        }
    }

    Ok(instances.into_iter().collect())
}

// =============================================================================
// Tests
// =============================================================================
