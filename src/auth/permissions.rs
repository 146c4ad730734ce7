use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewOwnProfile,
    EditOwnProfile,
    TrackOwnProgress,
    RequestCertificates,
    KeepChatHistory,

    ViewAllUsers,
    EditUsers,
    ResetPasswords,
    GrantAdmin,
    ViewStatistics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    Learner,
    Admin,
}

static LEARNER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    HashSet::from([
        Permission::ViewOwnProfile,
        Permission::EditOwnProfile,
        Permission::TrackOwnProgress,
        Permission::RequestCertificates,
        Permission::KeepChatHistory,
    ])
});

static ADMIN_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(LEARNER_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ViewAllUsers);
    permissions.insert(Permission::EditUsers);
    permissions.insert(Permission::ResetPasswords);
    permissions.insert(Permission::GrantAdmin);
    permissions.insert(Permission::ViewStatistics);

    permissions
});

impl Role {
    pub fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin { Role::Admin } else { Role::Learner }
    }

    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Learner => &LEARNER_PERMISSIONS,
            Role::Admin => &ADMIN_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Learner => "learner",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{Permission, Role};

    #[test]
    fn test_admin_inherits_learner_permissions() {
        for permission in Role::Learner.permissions() {
            assert!(Role::Admin.has_permission(*permission));
        }
    }

    #[test]
    fn test_learner_cannot_administer() {
        assert!(!Role::Learner.has_permission(Permission::ViewAllUsers));
        assert!(!Role::Learner.has_permission(Permission::ResetPasswords));
        assert!(Role::Learner.has_permission(Permission::RequestCertificates));
    }

    #[test]
    fn test_role_from_admin_flag() {
        assert_eq!(Role::from_admin_flag(true), Role::Admin);
        assert_eq!(Role::from_admin_flag(false).as_str(), "learner");
    }
}
