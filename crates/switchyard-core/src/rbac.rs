//! `RBACEngine`: a closed, compile-time role/permission table.
//!
//! Replaces a dynamic DB-driven role→permission join with a fixed tagged
//! enum and a `match`-based table, so authorization decisions never depend
//! on database availability and can't silently drift from what's deployed.

use serde::{Deserialize, Serialize};
use switchyard_crypto::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ProjectCreate,
    ProjectRead,
    ProjectUpdate,
    ServiceCreate,
    ServiceRead,
    ServiceUpdate,
    DeploymentCreate,
    DeploymentRead,
    DeploymentRollback,
    BuildCreate,
    BuildRead,
    DomainCreate,
    DomainRead,
    DomainUpdate,
    DomainVerify,
}

const DEVELOPER_PERMISSIONS: &[Permission] = &[
    Permission::ProjectRead,
    Permission::ServiceCreate,
    Permission::ServiceRead,
    Permission::ServiceUpdate,
    Permission::DeploymentCreate,
    Permission::DeploymentRead,
    Permission::DeploymentRollback,
    Permission::BuildCreate,
    Permission::BuildRead,
    Permission::DomainCreate,
    Permission::DomainRead,
    Permission::DomainUpdate,
    Permission::DomainVerify,
];

const VIEWER_PERMISSIONS: &[Permission] = &[
    Permission::ProjectRead,
    Permission::ServiceRead,
    Permission::DeploymentRead,
    Permission::BuildRead,
    Permission::DomainRead,
];

/// `(method, route_pattern) -> Permission`, for automatic endpoint
/// enforcement. Route patterns use the same `{param}` placeholder
/// convention as the consuming router.
pub const ENDPOINT_PERMISSIONS: &[(&str, &str, Permission)] = &[
    ("POST", "/projects", Permission::ProjectCreate),
    ("GET", "/projects/{id}", Permission::ProjectRead),
    ("PATCH", "/projects/{id}", Permission::ProjectUpdate),
    ("POST", "/projects/{id}/services", Permission::ServiceCreate),
    ("GET", "/services/{id}", Permission::ServiceRead),
    ("PATCH", "/services/{id}", Permission::ServiceUpdate),
    (
        "POST",
        "/services/{id}/deployments",
        Permission::DeploymentCreate,
    ),
    ("GET", "/deployments/{id}", Permission::DeploymentRead),
    (
        "POST",
        "/deployments/{id}/rollback",
        Permission::DeploymentRollback,
    ),
    ("POST", "/services/{id}/builds", Permission::BuildCreate),
    ("GET", "/builds/{id}", Permission::BuildRead),
    ("POST", "/services/{id}/domains", Permission::DomainCreate),
    ("GET", "/domains/{id}", Permission::DomainRead),
    ("PATCH", "/domains/{id}", Permission::DomainUpdate),
    ("POST", "/domains/{id}/verify", Permission::DomainVerify),
];

/// Static role/permission table and its evaluation entry point.
pub struct RbacEngine;

impl RbacEngine {
    /// `admin` and `superadmin` are treated as equivalent "any role" roles
    /// here: they satisfy every permission without consulting the table.
    /// This is a deliberate shortcut, not an oversight.
    pub fn has_permission(role: Role, permission: Permission) -> bool {
        match role {
            Role::Admin | Role::Superadmin => true,
            Role::Developer => DEVELOPER_PERMISSIONS.contains(&permission),
            Role::Viewer => VIEWER_PERMISSIONS.contains(&permission),
        }
    }

    pub fn permission_for_endpoint(method: &str, route: &str) -> Option<Permission> {
        ENDPOINT_PERMISSIONS
            .iter()
            .find(|(m, r, _)| *m == method && *r == route)
            .map(|(_, _, p)| *p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_satisfies_every_permission() {
        for perm in [
            Permission::ProjectCreate,
            Permission::DeploymentRollback,
            Permission::DomainVerify,
        ] {
            assert!(RbacEngine::has_permission(Role::Admin, perm));
            assert!(RbacEngine::has_permission(Role::Superadmin, perm));
        }
    }

    #[test]
    fn viewer_cannot_create() {
        assert!(!RbacEngine::has_permission(
            Role::Viewer,
            Permission::ServiceCreate
        ));
        assert!(RbacEngine::has_permission(
            Role::Viewer,
            Permission::ServiceRead
        ));
    }

    #[test]
    fn developer_can_rollback_but_viewer_cannot() {
        assert!(RbacEngine::has_permission(
            Role::Developer,
            Permission::DeploymentRollback
        ));
        assert!(!RbacEngine::has_permission(
            Role::Viewer,
            Permission::DeploymentRollback
        ));
    }

    #[test]
    fn endpoint_map_resolves_known_routes() {
        assert_eq!(
            RbacEngine::permission_for_endpoint("POST", "/projects"),
            Some(Permission::ProjectCreate)
        );
        assert_eq!(RbacEngine::permission_for_endpoint("GET", "/nope"), None);
    }
}
