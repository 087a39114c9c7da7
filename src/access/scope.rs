use mongodb::bson::oid::ObjectId;
use serde::Serialize;

use super::{AccessError, Role};

/// Visibility level derived from a user's role and tenancy fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum AccessScope {
    Global,
    Franchise {
        franchise_code: String,
    },
    Branch {
        franchise_code: String,
        branch_code: String,
    },
    Own {
        #[serde(serialize_with = "serialize_oid")]
        user_id: ObjectId,
        franchise_code: Option<String>,
        branch_code: Option<String>,
    },
}

fn serialize_oid<S: serde::Serializer>(id: &ObjectId, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&id.to_hex())
}

impl AccessScope {
    /// A franchise role without a franchise code, or a branch role without a
    /// branch code, is rejected rather than widened.
    pub fn derive(
        role: Role,
        user_id: ObjectId,
        franchise_code: Option<&str>,
        branch_code: Option<&str>,
    ) -> Result<Self, AccessError> {
        let franchise_code = non_empty(franchise_code);
        let branch_code = non_empty(branch_code);

        match role {
            Role::SuperAdmin | Role::Admin => Ok(AccessScope::Global),
            Role::FranchiseAdmin => {
                let franchise_code = franchise_code.ok_or_else(|| {
                    AccessError::MissingTenancy(format!("Role '{}' requires a franchise", role))
                })?;
                Ok(AccessScope::Franchise { franchise_code })
            }
            Role::BranchAdmin | Role::Instructor => match (franchise_code, branch_code) {
                (Some(franchise_code), Some(branch_code)) => Ok(AccessScope::Branch {
                    franchise_code,
                    branch_code,
                }),
                _ => Err(AccessError::MissingTenancy(format!(
                    "Role '{}' requires a franchise and branch",
                    role
                ))),
            },
            Role::Student => Ok(AccessScope::Own {
                user_id,
                franchise_code,
                branch_code,
            }),
        }
    }

    pub fn franchise_code(&self) -> Option<&str> {
        match self {
            AccessScope::Global => None,
            AccessScope::Franchise { franchise_code } => Some(franchise_code),
            AccessScope::Branch { franchise_code, .. } => Some(franchise_code),
            AccessScope::Own { franchise_code, .. } => franchise_code.as_deref(),
        }
    }

    pub fn branch_code(&self) -> Option<&str> {
        match self {
            AccessScope::Branch { branch_code, .. } => Some(branch_code),
            AccessScope::Own { branch_code, .. } => branch_code.as_deref(),
            _ => None,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, AccessScope::Global)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_roles_ignore_tenancy() {
        let scope = AccessScope::derive(Role::Admin, ObjectId::new(), Some("F1"), Some("B1")).unwrap();
        assert_eq!(scope, AccessScope::Global);
    }

    #[test]
    fn franchise_admin_requires_code() {
        let err = AccessScope::derive(Role::FranchiseAdmin, ObjectId::new(), Some("  "), None);
        assert!(matches!(err, Err(AccessError::MissingTenancy(_))));
    }

    #[test]
    fn instructor_requires_branch() {
        let err = AccessScope::derive(Role::Instructor, ObjectId::new(), Some("F1"), None);
        assert!(matches!(err, Err(AccessError::MissingTenancy(_))));

        let scope = AccessScope::derive(Role::Instructor, ObjectId::new(), Some("F1"), Some("B2")).unwrap();
        assert_eq!(scope.franchise_code(), Some("F1"));
        assert_eq!(scope.branch_code(), Some("B2"));
    }

    #[test]
    fn student_without_franchise_is_own_scope() {
        let id = ObjectId::new();
        let scope = AccessScope::derive(Role::Student, id, None, None).unwrap();
        assert_eq!(
            scope,
            AccessScope::Own { user_id: id, franchise_code: None, branch_code: None }
        );
        assert_eq!(scope.franchise_code(), None);
    }
}
