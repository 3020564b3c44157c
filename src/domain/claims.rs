//! Claims issued to authenticated principals and the policy table evaluated against them.
//!
//! Claim key names come from configuration and are carried in [`ClaimNames`];
//! nothing here reads process-wide state. Roles expand into permission claims
//! through [`ROLE_PERMISSIONS`], and each [`Policy`] requires exactly one
//! `(claim key, value)` pair to be present.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::domain::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimNames {
    pub role: String,
    pub permission: String,
    pub subject: String,
}

impl Default for ClaimNames {
    fn default() -> Self {
        Self {
            role: "role".to_string(),
            permission: "permission".to_string(),
            subject: "sub".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Permission {
    FleetRead,
    FleetWrite,
    IncidentsImport,
    AuditRead,
    KeysManage,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FleetRead => "fleet.read",
            Self::FleetWrite => "fleet.write",
            Self::IncidentsImport => "incidents.import",
            Self::AuditRead => "audit.read",
            Self::KeysManage => "keys.manage",
        }
    }

    pub fn all() -> &'static [Permission] {
        &[
            Self::FleetRead,
            Self::FleetWrite,
            Self::IncidentsImport,
            Self::AuditRead,
            Self::KeysManage,
        ]
    }
}

pub const ROLE_PERMISSIONS: &[(Role, &[Permission])] = &[
    (Role::Viewer, &[Permission::FleetRead]),
    (Role::Editor, &[Permission::FleetRead, Permission::FleetWrite]),
    (
        Role::Importer,
        &[Permission::FleetRead, Permission::IncidentsImport],
    ),
    (
        Role::Admin,
        &[
            Permission::FleetRead,
            Permission::FleetWrite,
            Permission::IncidentsImport,
            Permission::AuditRead,
            Permission::KeysManage,
        ],
    ),
];

pub fn permissions_for(role: Role) -> &'static [Permission] {
    ROLE_PERMISSIONS
        .iter()
        .find(|(candidate, _)| *candidate == role)
        .map(|(_, permissions)| *permissions)
        .unwrap_or(&[])
}

/// Multimap of claim key to values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSet {
    claims: BTreeMap<String, BTreeSet<String>>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.claims
            .entry(key.into())
            .or_default()
            .insert(value.into());
    }

    pub fn has(&self, key: &str, value: &str) -> bool {
        self.claims
            .get(key)
            .is_some_and(|values| values.contains(value))
    }

    pub fn values(&self, key: &str) -> impl Iterator<Item = &str> {
        self.claims
            .get(key)
            .into_iter()
            .flat_map(|values| values.iter().map(String::as_str))
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.values(key).next()
    }
}

/// Expands a principal's identity and roles into claims.
#[derive(Debug, Clone)]
pub struct ClaimsTransformer {
    names: ClaimNames,
}

impl ClaimsTransformer {
    pub fn new(names: ClaimNames) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &ClaimNames {
        &self.names
    }

    pub fn transform(&self, subject: &str, roles: &[Role]) -> ClaimSet {
        let mut claims = ClaimSet::new();
        claims.insert(self.names.subject.as_str(), subject);
        for role in roles {
            claims.insert(self.names.role.as_str(), role.as_str());
            for permission in permissions_for(*role) {
                claims.insert(self.names.permission.as_str(), permission.as_str());
            }
        }
        claims
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    ViewFleet,
    EditFleet,
    ImportIncidents,
    ReadAudit,
    ManageKeys,
}

impl Policy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ViewFleet => "view_fleet",
            Self::EditFleet => "edit_fleet",
            Self::ImportIncidents => "import_incidents",
            Self::ReadAudit => "read_audit",
            Self::ManageKeys => "manage_keys",
        }
    }

    fn permission(self) -> Permission {
        match self {
            Self::ViewFleet => Permission::FleetRead,
            Self::EditFleet => Permission::FleetWrite,
            Self::ImportIncidents => Permission::IncidentsImport,
            Self::ReadAudit => Permission::AuditRead,
            Self::ManageKeys => Permission::KeysManage,
        }
    }

    pub fn all() -> &'static [Policy] {
        &[
            Self::ViewFleet,
            Self::EditFleet,
            Self::ImportIncidents,
            Self::ReadAudit,
            Self::ManageKeys,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequirement {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("policy `{policy}` requires claim `{key}={value}`")]
    MissingClaim {
        policy: &'static str,
        key: String,
        value: String,
    },
    #[error("policy `{policy}` is not configured")]
    Unconfigured { policy: &'static str },
}

#[derive(Debug, Clone)]
pub struct PolicyTable {
    entries: Vec<(Policy, ClaimRequirement)>,
}

impl PolicyTable {
    pub fn new(names: &ClaimNames) -> Self {
        let entries = Policy::all()
            .iter()
            .map(|policy| {
                (
                    *policy,
                    ClaimRequirement {
                        key: names.permission.clone(),
                        value: policy.permission().as_str().to_string(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn requirement(&self, policy: Policy) -> Option<&ClaimRequirement> {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == policy)
            .map(|(_, requirement)| requirement)
    }

    pub fn evaluate(&self, policy: Policy, claims: &ClaimSet) -> Result<(), AuthzError> {
        let requirement = self
            .requirement(policy)
            .ok_or(AuthzError::Unconfigured {
                policy: policy.as_str(),
            })?;

        if claims.has(&requirement.key, &requirement.value) {
            Ok(())
        } else {
            Err(AuthzError::MissingClaim {
                policy: policy.as_str(),
                key: requirement.key.clone(),
                value: requirement.value.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom_names() -> ClaimNames {
        ClaimNames {
            role: "roles".into(),
            permission: "scp".into(),
            subject: "oid".into(),
        }
    }

    #[test]
    fn every_role_has_a_table_entry() {
        for role in Role::all() {
            assert!(!permissions_for(*role).is_empty(), "{role} has no grants");
        }
    }

    #[test]
    fn transformer_emits_subject_roles_and_permissions() {
        let transformer = ClaimsTransformer::new(custom_names());
        let claims = transformer.transform("key-1", &[Role::Importer]);

        assert_eq!(claims.first("oid"), Some("key-1"));
        assert!(claims.has("roles", "importer"));
        assert!(claims.has("scp", "fleet.read"));
        assert!(claims.has("scp", "incidents.import"));
        assert!(!claims.has("scp", "fleet.write"));
    }

    #[test]
    fn overlapping_roles_do_not_duplicate_claims() {
        let transformer = ClaimsTransformer::new(ClaimNames::default());
        let claims = transformer.transform("k", &[Role::Viewer, Role::Editor]);
        assert_eq!(claims.values("permission").count(), 2);
    }

    #[test]
    fn policy_table_uses_configured_claim_key() {
        let table = PolicyTable::new(&custom_names());
        let requirement = table.requirement(Policy::ReadAudit).expect("configured");
        assert_eq!(requirement.key, "scp");
        assert_eq!(requirement.value, "audit.read");
    }

    #[test]
    fn evaluate_grants_and_denies_per_role() {
        let names = ClaimNames::default();
        let table = PolicyTable::new(&names);
        let transformer = ClaimsTransformer::new(names);

        let viewer = transformer.transform("v", &[Role::Viewer]);
        assert_eq!(table.evaluate(Policy::ViewFleet, &viewer), Ok(()));
        assert_eq!(
            table.evaluate(Policy::EditFleet, &viewer),
            Err(AuthzError::MissingClaim {
                policy: "edit_fleet",
                key: "permission".into(),
                value: "fleet.write".into(),
            })
        );

        let admin = transformer.transform("a", &[Role::Admin]);
        for policy in Policy::all() {
            assert!(table.evaluate(*policy, &admin).is_ok(), "{policy:?}");
        }
    }

    #[test]
    fn claims_under_a_different_key_do_not_satisfy_policy() {
        let table = PolicyTable::new(&ClaimNames::default());
        let mut claims = ClaimSet::new();
        claims.insert("scope", "fleet.read");
        assert!(table.evaluate(Policy::ViewFleet, &claims).is_err());
    }
}
