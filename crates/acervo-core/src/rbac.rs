//! Granular role-based access control.
//!
//! A granular role carries a permission map `{resource: [action, ...]}`
//! stored as JSON text. The map is decoded once into closed enums; entries
//! naming unknown resources or actions are dropped at decode time.
//!
//! Resolution order:
//!
//! 1. legacy role `super_admin` allows everything;
//! 2. no granular role denies everything;
//! 3. a resource absent from the map denies;
//! 4. otherwise the action must be listed for the resource.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::LegacyRole;

/// Resource kinds guarded by granular permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Memories,
    Users,
    Roles,
    Organizations,
    Agents,
    LessonPlans,
    AuditLogs,
    Ai,
}

impl Resource {
    pub const ALL: [Resource; 8] = [
        Resource::Memories,
        Resource::Users,
        Resource::Roles,
        Resource::Organizations,
        Resource::Agents,
        Resource::LessonPlans,
        Resource::AuditLogs,
        Resource::Ai,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Memories => "memories",
            Resource::Users => "users",
            Resource::Roles => "roles",
            Resource::Organizations => "organizations",
            Resource::Agents => "agents",
            Resource::LessonPlans => "lesson_plans",
            Resource::AuditLogs => "audit_logs",
            Resource::Ai => "ai",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memories" => Ok(Resource::Memories),
            "users" => Ok(Resource::Users),
            "roles" => Ok(Resource::Roles),
            "organizations" => Ok(Resource::Organizations),
            "agents" => Ok(Resource::Agents),
            "lesson_plans" | "lessonPlans" => Ok(Resource::LessonPlans),
            "audit_logs" | "auditLogs" => Ok(Resource::AuditLogs),
            "ai" => Ok(Resource::Ai),
            other => Err(Error::InvalidInput(format!("Unknown resource: {}", other))),
        }
    }
}

/// Actions a role may be granted on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Approve,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Approve => "approve",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            "approve" => Ok(Action::Approve),
            other => Err(Error::InvalidInput(format!("Unknown action: {}", other))),
        }
    }
}

/// Decoded permission map of a granular role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    grants: HashMap<Resource, HashSet<Action>>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant actions on a resource (builder style).
    pub fn grant(mut self, resource: Resource, actions: &[Action]) -> Self {
        self.grants
            .entry(resource)
            .or_default()
            .extend(actions.iter().copied());
        self
    }

    /// Strictly decode a permission map, rejecting anything that is not an
    /// object of string arrays. Used when an administrator submits a role.
    pub fn try_decode(raw: &JsonValue) -> Result<Self> {
        let object = raw.as_object().ok_or_else(|| {
            Error::InvalidInput("permissions must be an object of action lists".to_string())
        })?;
        let mut set = PermissionSet::new();
        for (key, value) in object {
            let resource: Resource = key.parse()?;
            let list = value.as_array().ok_or_else(|| {
                Error::InvalidInput(format!("permissions.{} must be an array", key))
            })?;
            let entry = set.grants.entry(resource).or_default();
            for item in list {
                let name = item.as_str().ok_or_else(|| {
                    Error::InvalidInput(format!("permissions.{} must contain strings", key))
                })?;
                entry.insert(name.parse()?);
            }
        }
        Ok(set)
    }

    /// Leniently decode a stored permission map.
    ///
    /// Malformed text yields the empty set. Unknown resources and actions
    /// are dropped; a resource whose value is not a list is kept with no
    /// actions, so it still denies.
    pub fn decode(raw: &str) -> Self {
        let value: JsonValue = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    subsystem = "core",
                    component = "rbac",
                    error = %e,
                    "Malformed permission data, denying all"
                );
                return Self::default();
            }
        };
        let Some(object) = value.as_object() else {
            warn!(
                subsystem = "core",
                component = "rbac",
                "Permission data is not an object, denying all"
            );
            return Self::default();
        };

        let mut set = PermissionSet::new();
        for (key, actions) in object {
            let Ok(resource) = key.parse::<Resource>() else {
                continue;
            };
            let entry = set.grants.entry(resource).or_default();
            if let Some(list) = actions.as_array() {
                entry.extend(
                    list.iter()
                        .filter_map(|a| a.as_str())
                        .filter_map(|a| a.parse::<Action>().ok()),
                );
            }
        }
        set
    }

    /// Encode for storage. Keys and actions are sorted for stable output.
    pub fn to_json(&self) -> JsonValue {
        let mut resources: Vec<_> = self.grants.keys().copied().collect();
        resources.sort_by_key(|r| r.as_str());
        let mut map = serde_json::Map::new();
        for resource in resources {
            let mut actions: Vec<&str> = self.grants[&resource].iter().map(|a| a.as_str()).collect();
            actions.sort_unstable();
            map.insert(resource.as_str().to_string(), JsonValue::from(actions));
        }
        JsonValue::Object(map)
    }

    pub fn contains_resource(&self, resource: Resource) -> bool {
        self.grants.contains_key(&resource)
    }

    pub fn allows(&self, resource: Resource, action: Action) -> bool {
        self.grants
            .get(&resource)
            .is_some_and(|actions| actions.contains(&action))
    }

    /// Grant every action on every resource.
    pub fn full() -> Self {
        let all = [
            Action::Create,
            Action::Read,
            Action::Update,
            Action::Delete,
            Action::Approve,
        ];
        Resource::ALL
            .iter()
            .fold(Self::new(), |set, r| set.grant(*r, &all))
    }
}

/// Decide whether a user may perform `action` on `resource`.
///
/// `granular` is the raw permission text of the user's granular role, if
/// any is attached.
pub fn authorize(
    legacy_role: LegacyRole,
    granular: Option<&str>,
    resource: Resource,
    action: Action,
) -> bool {
    if legacy_role == LegacyRole::SuperAdmin {
        return true;
    }
    let Some(raw) = granular else {
        return false;
    };
    PermissionSet::decode(raw).allows(resource, action)
}
