use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::AccessError;

/// User roles, ordered by privilege through [`Role::rank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    FranchiseAdmin,
    BranchAdmin,
    Instructor,
    Student,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::FranchiseAdmin,
        Role::BranchAdmin,
        Role::Instructor,
        Role::Student,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::FranchiseAdmin => "franchise_admin",
            Role::BranchAdmin => "branch_admin",
            Role::Instructor => "instructor",
            Role::Student => "student",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Role::SuperAdmin => 100,
            Role::Admin => 90,
            Role::FranchiseAdmin => 70,
            Role::BranchAdmin => 50,
            Role::Instructor => 30,
            Role::Student => 10,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }

    /// Roles allowed to manage users, enrollments and tickets of others
    pub fn is_staff_manager(&self) -> bool {
        matches!(
            self,
            Role::SuperAdmin | Role::Admin | Role::FranchiseAdmin | Role::BranchAdmin
        )
    }

    pub fn can_author_content(&self) -> bool {
        !matches!(self, Role::Student)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "super_admin" | "superadmin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "franchise_admin" | "franchise_owner" | "franchise" => Ok(Role::FranchiseAdmin),
            "branch_admin" | "branch_manager" => Ok(Role::BranchAdmin),
            "instructor" | "teacher" => Ok(Role::Instructor),
            "student" | "user" => Ok(Role::Student),
            _ => Err(AccessError::UnknownRole(s.to_string())),
        }
    }
}
