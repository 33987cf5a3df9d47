//! Role-based access control with inheritance.
//!
//! Roles carry a permission set plus a list of roles they inherit from; the
//! effective set is the transitive union. The inheritance graph is a DAG:
//! cycles are rejected when a role is created or rewired. Built-in roles
//! cannot be deleted.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use globset::Glob;
use secureyeoman_core::RoleId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// A single permission: resource pattern, action, optional context ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Resource pattern, exact (`soul/personalities`) or glob (`soul/*`, `*`).
    pub resource: String,
    /// Action name, exact or `*`.
    pub action: String,
    /// Numeric ceilings that must hold for the request context, e.g.
    /// `{"duration_ms": 60000}` grants only requests whose `duration_ms`
    /// is present and does not exceed the ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, i64>>,
}

impl Permission {
    /// Create a context-free permission.
    #[must_use]
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            context: None,
        }
    }

    /// Attach context ceilings.
    #[must_use]
    pub fn with_context(mut self, context: HashMap<String, i64>) -> Self {
        self.context = Some(context);
        self
    }

    fn matches(&self, request: &PermissionRequest) -> bool {
        if !Self::pattern_matches(&self.resource, &request.resource) {
            return false;
        }
        if self.action != "*" && self.action != request.action {
            return false;
        }
        if let Some(ceilings) = &self.context {
            for (key, max) in ceilings {
                match request.context.get(key) {
                    Some(value) if value <= max => {},
                    _ => return false,
                }
            }
        }
        true
    }

    fn pattern_matches(pattern: &str, resource: &str) -> bool {
        if pattern == resource {
            return true;
        }
        Glob::new(pattern)
            .map(|g| g.compile_matcher().is_match(resource))
            .unwrap_or(false)
    }
}

/// A role record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    /// Unique role identifier.
    pub id: RoleId,
    /// Human-readable name, unique.
    pub name: String,
    /// Built-in roles cannot be deleted.
    pub is_builtin: bool,
    /// Direct permissions.
    pub permissions: Vec<Permission>,
    /// Roles whose permissions this role inherits (transitively).
    #[serde(default)]
    pub inherit_from: Vec<RoleId>,
}

/// A permission check request.
#[derive(Debug, Clone, Default)]
pub struct PermissionRequest {
    /// Resource being accessed.
    pub resource: String,
    /// Action being performed.
    pub action: String,
    /// Context values checked against permission ceilings.
    pub context: HashMap<String, i64>,
}

impl PermissionRequest {
    /// Create a context-free request.
    #[must_use]
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            context: HashMap::new(),
        }
    }
}

/// Outcome of a permission check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionCheck {
    /// Whether the request is granted.
    pub granted: bool,
    /// Why the request was denied, when it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// Built-in role sentinels. Fixed ids so sessions survive restarts.
const ADMIN_ROLE: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0001);
const OPERATOR_ROLE: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0002);
const VIEWER_ROLE: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0003);
const AUDITOR_ROLE: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0004);

/// The built-in roles seeded into every engine.
#[must_use]
pub fn builtin_roles() -> Vec<Role> {
    vec![
        Role {
            id: RoleId::from_uuid(ADMIN_ROLE),
            name: "admin".into(),
            is_builtin: true,
            permissions: vec![Permission::new("*", "*")],
            inherit_from: vec![],
        },
        Role {
            id: RoleId::from_uuid(OPERATOR_ROLE),
            name: "operator".into(),
            is_builtin: true,
            permissions: vec![
                Permission::new("*", "read"),
                Permission::new("*", "write"),
                Permission::new("tasks/*", "execute"),
            ],
            inherit_from: vec![],
        },
        Role {
            id: RoleId::from_uuid(VIEWER_ROLE),
            name: "viewer".into(),
            is_builtin: true,
            permissions: vec![Permission::new("*", "read")],
            inherit_from: vec![],
        },
        Role {
            id: RoleId::from_uuid(AUDITOR_ROLE),
            name: "auditor".into(),
            is_builtin: true,
            permissions: vec![
                Permission::new("audit/*", "read"),
                Permission::new("audit/*", "verify"),
            ],
            inherit_from: vec![RoleId::from_uuid(VIEWER_ROLE)],
        },
    ]
}

/// The RBAC engine.
///
/// Pure in-memory evaluation; callers audit denials. Roles are persisted by
/// the owning service and re-seeded through [`RbacEngine::insert_role`].
pub struct RbacEngine {
    roles: RwLock<HashMap<RoleId, Role>>,
}

impl Default for RbacEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RbacEngine {
    /// Create an engine seeded with the built-in roles.
    #[must_use]
    pub fn new() -> Self {
        let mut roles = HashMap::new();
        for role in builtin_roles() {
            roles.insert(role.id, role);
        }
        Self {
            roles: RwLock::new(roles),
        }
    }

    fn read(&self) -> AuthResult<std::sync::RwLockReadGuard<'_, HashMap<RoleId, Role>>> {
        self.roles
            .read()
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    fn write(&self) -> AuthResult<std::sync::RwLockWriteGuard<'_, HashMap<RoleId, Role>>> {
        self.roles
            .write()
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    /// Look up a role by name.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RoleNotFound`] if no role has that name.
    pub fn role_by_name(&self, name: &str) -> AuthResult<Role> {
        self.read()?
            .values()
            .find(|r| r.name == name)
            .cloned()
            .ok_or_else(|| AuthError::RoleNotFound(name.to_string()))
    }

    /// Look up a role by id.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RoleNotFound`] if the id is unknown.
    pub fn role(&self, id: RoleId) -> AuthResult<Role> {
        self.read()?
            .get(&id)
            .cloned()
            .ok_or_else(|| AuthError::RoleNotFound(id.to_string()))
    }

    /// All roles, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the role table lock is poisoned.
    pub fn list(&self) -> AuthResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.read()?.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    /// Create a new role.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidRole`] if the name collides, a parent is
    /// unknown, or inheritance would form a cycle.
    pub fn create_role(
        &self,
        name: impl Into<String>,
        permissions: Vec<Permission>,
        inherit_from: Vec<RoleId>,
    ) -> AuthResult<Role> {
        let name = name.into();
        let mut roles = self.write()?;

        if roles.values().any(|r| r.name == name) {
            return Err(AuthError::InvalidRole(format!(
                "role name already exists: {name}"
            )));
        }
        for parent in &inherit_from {
            if !roles.contains_key(parent) {
                return Err(AuthError::InvalidRole(format!(
                    "unknown parent role: {parent}"
                )));
            }
        }

        let role = Role {
            id: RoleId::new(),
            name,
            is_builtin: false,
            permissions,
            inherit_from,
        };
        Self::reject_cycles(&roles, &role)?;
        roles.insert(role.id, role.clone());
        Ok(role)
    }

    /// Insert or replace a role record (persistence re-seeding, updates).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidRole`] if inheritance would form a cycle.
    pub fn insert_role(&self, role: Role) -> AuthResult<()> {
        let mut roles = self.write()?;
        Self::reject_cycles(&roles, &role)?;
        roles.insert(role.id, role);
        Ok(())
    }

    /// Delete a role.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidRole`] for built-in roles, or
    /// [`AuthError::RoleNotFound`] for unknown ids.
    pub fn delete_role(&self, id: RoleId) -> AuthResult<()> {
        let mut roles = self.write()?;
        let role = roles
            .get(&id)
            .ok_or_else(|| AuthError::RoleNotFound(id.to_string()))?;
        if role.is_builtin {
            return Err(AuthError::InvalidRole(format!(
                "built-in role cannot be deleted: {}",
                role.name
            )));
        }
        roles.remove(&id);
        Ok(())
    }

    /// Walk inheritance from `role`, failing if `role.id` is reachable.
    fn reject_cycles(roles: &HashMap<RoleId, Role>, role: &Role) -> AuthResult<()> {
        let mut seen = HashSet::new();
        let mut stack: Vec<RoleId> = role.inherit_from.clone();
        while let Some(current) = stack.pop() {
            if current == role.id {
                return Err(AuthError::InvalidRole(format!(
                    "inheritance cycle through role {}",
                    role.name
                )));
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(parent) = roles.get(&current) {
                stack.extend(parent.inherit_from.iter().copied());
            }
        }
        Ok(())
    }

    /// The transitive union of a role's permissions.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RoleNotFound`] if the id is unknown.
    pub fn effective_permissions(&self, id: RoleId) -> AuthResult<Vec<Permission>> {
        let roles = self.read()?;
        if !roles.contains_key(&id) {
            return Err(AuthError::RoleNotFound(id.to_string()));
        }

        let mut seen = HashSet::new();
        let mut stack = vec![id];
        let mut permissions = Vec::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(role) = roles.get(&current) {
                permissions.extend(role.permissions.iter().cloned());
                stack.extend(role.inherit_from.iter().copied());
            }
        }
        Ok(permissions)
    }

    /// Evaluate a permission request against a role.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RoleNotFound`] if the role id is unknown.
    pub fn check(&self, role_id: RoleId, request: &PermissionRequest) -> AuthResult<PermissionCheck> {
        let permissions = self.effective_permissions(role_id)?;
        if permissions.iter().any(|p| p.matches(request)) {
            Ok(PermissionCheck {
                granted: true,
                reason: None,
            })
        } else {
            Ok(PermissionCheck {
                granted: false,
                reason: Some(format!(
                    "no permission grants {} on {}",
                    request.action, request.resource
                )),
            })
        }
    }
}

impl std::fmt::Debug for RbacEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RbacEngine").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_matches_everything() {
        let engine = RbacEngine::new();
        let admin = engine.role_by_name("admin").unwrap();
        let check = engine
            .check(admin.id, &PermissionRequest::new("soul/personalities", "write"))
            .unwrap();
        assert!(check.granted);
    }

    #[test]
    fn test_viewer_denied_write() {
        let engine = RbacEngine::new();
        let viewer = engine.role_by_name("viewer").unwrap();

        let read = engine
            .check(viewer.id, &PermissionRequest::new("soul/personality", "read"))
            .unwrap();
        assert!(read.granted);

        let write = engine
            .check(viewer.id, &PermissionRequest::new("soul/personalities", "write"))
            .unwrap();
        assert!(!write.granted);
        assert!(write.reason.is_some());
    }

    #[test]
    fn test_inheritance_union() {
        let engine = RbacEngine::new();
        let auditor = engine.role_by_name("auditor").unwrap();

        // Direct permission from auditor itself.
        assert!(
            engine
                .check(auditor.id, &PermissionRequest::new("audit/chain", "verify"))
                .unwrap()
                .granted
        );
        // Inherited from viewer.
        assert!(
            engine
                .check(auditor.id, &PermissionRequest::new("brain/memories", "read"))
                .unwrap()
                .granted
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let engine = RbacEngine::new();
        let a = engine.create_role("a", vec![], vec![]).unwrap();
        let b = engine
            .create_role("b", vec![], vec![a.id])
            .unwrap();

        // Rewire a to inherit from b: a → b → a.
        let mut rewired = a.clone();
        rewired.inherit_from = vec![b.id];
        assert!(matches!(
            engine.insert_role(rewired),
            Err(AuthError::InvalidRole(_))
        ));
    }

    #[test]
    fn test_builtin_delete_rejected() {
        let engine = RbacEngine::new();
        let admin = engine.role_by_name("admin").unwrap();
        assert!(matches!(
            engine.delete_role(admin.id),
            Err(AuthError::InvalidRole(_))
        ));
    }

    #[test]
    fn test_custom_role_delete() {
        let engine = RbacEngine::new();
        let role = engine.create_role("temp", vec![], vec![]).unwrap();
        engine.delete_role(role.id).unwrap();
        assert!(engine.role(role.id).is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let engine = RbacEngine::new();
        assert!(matches!(
            engine.create_role("admin", vec![], vec![]),
            Err(AuthError::InvalidRole(_))
        ));
    }

    #[test]
    fn test_context_ceiling() {
        let engine = RbacEngine::new();
        let role = engine
            .create_role(
                "limited-exec",
                vec![
                    Permission::new("tasks/*", "execute")
                        .with_context(HashMap::from([("duration_ms".to_string(), 60_000)])),
                ],
                vec![],
            )
            .unwrap();

        let mut within = PermissionRequest::new("tasks/query", "execute");
        within.context.insert("duration_ms".into(), 30_000);
        assert!(engine.check(role.id, &within).unwrap().granted);

        let mut over = PermissionRequest::new("tasks/query", "execute");
        over.context.insert("duration_ms".into(), 120_000);
        assert!(!engine.check(role.id, &over).unwrap().granted);

        // Missing context value cannot satisfy the ceiling.
        let absent = PermissionRequest::new("tasks/query", "execute");
        assert!(!engine.check(role.id, &absent).unwrap().granted);
    }

    #[test]
    fn test_glob_resources() {
        let engine = RbacEngine::new();
        let role = engine
            .create_role(
                "soul-editor",
                vec![Permission::new("soul/*", "write")],
                vec![],
            )
            .unwrap();

        assert!(
            engine
                .check(role.id, &PermissionRequest::new("soul/personalities", "write"))
                .unwrap()
                .granted
        );
        assert!(
            !engine
                .check(role.id, &PermissionRequest::new("brain/memories", "write"))
                .unwrap()
                .granted
        );
    }
}
