//! Franchise/branch access control.
//!
//! Every request resolves to a [`BranchAccessManager`] holding the caller's
//! role and [`AccessScope`]. Handlers use it to:
//!
//! - build tenant filters that are ANDed into MongoDB reads and writes,
//! - check the role/operation matrix before mutating anything,
//! - verify a loaded document lies inside the caller's scope,
//! - stamp `franchise_code`/`branch_code` onto new documents.

pub mod role;
pub mod scope;

use mongodb::bson::{doc, oid::ObjectId, Bson, Document};

use crate::types::Operation;

pub use role::Role;
pub use scope::AccessScope;

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),
    #[error("{0}")]
    MissingTenancy(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Resource is outside the caller's scope")]
    OutOfScope,
}

/// Resource families with distinct tenancy rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    User,
    Franchise,
    Branch,
    Agreement,
    Course,
    /// Modules, lessons, lectures and quizzes; scoped through their course.
    CourseContent,
    QuizAttempt,
    Enrollment,
    Notification,
    SupportTicket,
    Enquiry,
    Upload,
}

impl Resource {
    pub fn label(&self) -> &'static str {
        match self {
            Resource::User => "users",
            Resource::Franchise => "franchises",
            Resource::Branch => "branches",
            Resource::Agreement => "agreements",
            Resource::Course => "courses",
            Resource::CourseContent => "course content",
            Resource::QuizAttempt => "quiz attempts",
            Resource::Enrollment => "enrollments",
            Resource::Notification => "notifications",
            Resource::SupportTicket => "support tickets",
            Resource::Enquiry => "enquiries",
            Resource::Upload => "uploads",
        }
    }

    /// Field holding the owning student/user id for self-scoped access
    fn owner_field(&self) -> Option<&'static str> {
        match self {
            Resource::Enrollment | Resource::QuizAttempt => Some("student_id"),
            Resource::SupportTicket => Some("created_by"),
            Resource::Upload => Some("uploaded_by"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BranchAccessManager {
    role: Role,
    scope: AccessScope,
    user_id: ObjectId,
}

impl BranchAccessManager {
    pub fn new(role: Role, scope: AccessScope, user_id: ObjectId) -> Self {
        Self { role, scope, user_id }
    }

    pub fn for_user(
        role: Role,
        user_id: ObjectId,
        franchise_code: Option<&str>,
        branch_code: Option<&str>,
    ) -> Result<Self, AccessError> {
        let scope = AccessScope::derive(role, user_id, franchise_code, branch_code)?;
        Ok(Self::new(role, scope, user_id))
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn scope(&self) -> &AccessScope {
        &self.scope
    }

    pub fn user_id(&self) -> ObjectId {
        self.user_id
    }

    /// Role/operation matrix. Row-level restrictions are applied separately
    /// through [`Self::filter_for`] and [`Self::ensure_in_scope`].
    pub fn can(&self, op: Operation, resource: Resource) -> bool {
        use Operation::*;
        use Resource::*;

        match self.role {
            Role::SuperAdmin | Role::Admin => true,
            Role::FranchiseAdmin => match resource {
                Franchise => matches!(op, Read | Update),
                Agreement | QuizAttempt => op == Read,
                Enquiry => matches!(op, Read | Update),
                Upload => matches!(op, Read | Create),
                _ => true,
            },
            Role::BranchAdmin => match resource {
                Franchise => op == Read,
                Branch => matches!(op, Read | Update),
                Agreement => false,
                QuizAttempt => op == Read,
                Enquiry => matches!(op, Read | Update),
                Upload => matches!(op, Read | Create),
                _ => true,
            },
            Role::Instructor => match resource {
                Franchise | Branch | User | QuizAttempt | Enrollment | Notification => op == Read,
                Course => op != Delete,
                CourseContent => true,
                SupportTicket => op != Delete,
                Upload => matches!(op, Read | Create),
                Agreement | Enquiry => false,
            },
            Role::Student => match resource {
                Course | CourseContent | Franchise | Branch | Notification => op == Read,
                User => matches!(op, Read | Update),
                QuizAttempt | Upload => matches!(op, Read | Create),
                Enrollment | SupportTicket => op != Delete,
                Agreement | Enquiry => false,
            },
        }
    }

    pub fn require(&self, op: Operation, resource: Resource) -> Result<(), AccessError> {
        if self.can(op, resource) {
            Ok(())
        } else {
            tracing::debug!(
                "Denied {:?} on {} for role {}",
                op,
                resource.label(),
                self.role
            );
            Err(AccessError::Forbidden(format!(
                "Role '{}' is not allowed to {} {}",
                self.role,
                op.verb(),
                resource.label()
            )))
        }
    }

    /// Tenant filter for `resource`. An empty document means unrestricted.
    pub fn filter_for(&self, resource: Resource) -> Document {
        match &self.scope {
            AccessScope::Global => doc! {},
            AccessScope::Franchise { franchise_code } => match resource {
                Resource::CourseContent => doc! {},
                _ => doc! { "franchise_code": franchise_code },
            },
            AccessScope::Branch { franchise_code, branch_code } => match resource {
                Resource::CourseContent => doc! {},
                // Enquiries arrive per franchise and carry no branch
                Resource::Franchise | Resource::Agreement | Resource::Enquiry => {
                    doc! { "franchise_code": franchise_code }
                }
                Resource::Course => doc! {
                    "franchise_code": franchise_code,
                    "$or": [ { "branch_code": branch_code }, { "branch_code": Bson::Null } ],
                },
                _ => doc! { "franchise_code": franchise_code, "branch_code": branch_code },
            },
            AccessScope::Own { user_id, franchise_code, branch_code } => {
                if let Some(field) = resource.owner_field() {
                    return doc! { field: user_id.to_hex() };
                }
                match resource {
                    Resource::User => doc! { "_id": *user_id },
                    Resource::CourseContent => doc! {},
                    Resource::Course => match franchise_code {
                        Some(code) => doc! {
                            "is_published": true,
                            "$or": [ { "franchise_code": code }, { "franchise_code": Bson::Null } ],
                        },
                        None => doc! { "is_published": true, "franchise_code": Bson::Null },
                    },
                    Resource::Franchise => match franchise_code {
                        Some(code) => doc! { "franchise_code": code },
                        None => match_nothing(),
                    },
                    Resource::Branch => match (franchise_code, branch_code) {
                        (Some(f), Some(b)) => doc! { "franchise_code": f, "branch_code": b },
                        _ => match_nothing(),
                    },
                    _ => match_nothing(),
                }
            }
        }
    }

    /// `base` restricted to the caller's scope.
    pub fn scoped(&self, resource: Resource, base: Document) -> Document {
        crate::filter::and_filters(base, self.filter_for(resource))
    }

    /// In-memory counterpart of [`Self::filter_for`] for documents already loaded.
    pub fn ensure_in_scope(&self, resource: Resource, document: &Document) -> Result<(), AccessError> {
        if self.document_in_scope(resource, document) {
            Ok(())
        } else {
            Err(AccessError::OutOfScope)
        }
    }

    fn document_in_scope(&self, resource: Resource, document: &Document) -> bool {
        let franchise = document.get_str("franchise_code").ok();
        let branch = document.get_str("branch_code").ok();

        match &self.scope {
            AccessScope::Global => true,
            AccessScope::Franchise { franchise_code } => match resource {
                Resource::CourseContent => true,
                _ => franchise == Some(franchise_code.as_str()),
            },
            AccessScope::Branch { franchise_code, branch_code } => {
                let same_franchise = franchise == Some(franchise_code.as_str());
                match resource {
                    Resource::CourseContent => true,
                    Resource::Franchise | Resource::Agreement | Resource::Enquiry => same_franchise,
                    Resource::Course => {
                        same_franchise && (branch.is_none() || branch == Some(branch_code.as_str()))
                    }
                    _ => same_franchise && branch == Some(branch_code.as_str()),
                }
            }
            AccessScope::Own { user_id, franchise_code, branch_code } => {
                if let Some(field) = resource.owner_field() {
                    return document.get_str(field).ok() == Some(user_id.to_hex().as_str());
                }
                match resource {
                    Resource::User => document.get_object_id("_id").ok() == Some(*user_id),
                    Resource::CourseContent => true,
                    Resource::Course => {
                        let published = document.get_bool("is_published").unwrap_or(false);
                        published && (franchise.is_none() || franchise == franchise_code.as_deref())
                    }
                    Resource::Franchise => franchise.is_some() && franchise == franchise_code.as_deref(),
                    Resource::Branch => {
                        franchise.is_some()
                            && franchise == franchise_code.as_deref()
                            && branch == branch_code.as_deref()
                    }
                    _ => false,
                }
            }
        }
    }

    /// Copy the caller's tenancy onto a new document. Global callers keep
    /// whatever codes they supplied; scoped callers cannot choose.
    pub fn stamp(&self, resource: Resource, document: &mut Document) {
        match &self.scope {
            AccessScope::Global => {}
            AccessScope::Franchise { franchise_code } => {
                document.insert("franchise_code", franchise_code.clone());
            }
            AccessScope::Branch { franchise_code, branch_code } => {
                document.insert("franchise_code", franchise_code.clone());
                // Branch staff may publish franchise-wide courses only by leaving
                // branch_code unset explicitly; everything else is pinned.
                if resource != Resource::Course || document.get("branch_code") != Some(&Bson::Null) {
                    document.insert("branch_code", branch_code.clone());
                }
            }
            AccessScope::Own { franchise_code, branch_code, .. } => {
                set_or_remove(document, "franchise_code", franchise_code.as_deref());
                set_or_remove(document, "branch_code", branch_code.as_deref());
            }
        }
    }

    /// Whether the caller may create or promote a user to `target`.
    pub fn can_assign_role(&self, target: Role) -> bool {
        self.role == Role::SuperAdmin || self.role.rank() > target.rank()
    }

    /// Feed filter for notifications addressed to this user.
    pub fn notification_feed_filter(&self) -> Document {
        let mut audiences = vec![
            doc! { "audience": "all" },
            doc! { "audience": "user", "target_user_id": self.user_id.to_hex() },
        ];
        if let Some(franchise_code) = self.scope.franchise_code() {
            audiences.push(doc! { "audience": "franchise", "franchise_code": franchise_code });
            if let Some(branch_code) = self.scope.branch_code() {
                audiences.push(doc! {
                    "audience": "branch",
                    "franchise_code": franchise_code,
                    "branch_code": branch_code,
                });
            }
        }
        doc! { "$or": audiences }
    }
}

fn match_nothing() -> Document {
    doc! { "_id": { "$exists": false } }
}

fn set_or_remove(document: &mut Document, key: &str, value: Option<&str>) {
    match value {
        Some(v) => {
            document.insert(key, v);
        }
        None => {
            document.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(role: Role, franchise: Option<&str>, branch: Option<&str>) -> BranchAccessManager {
        BranchAccessManager::for_user(role, ObjectId::new(), franchise, branch).unwrap()
    }

    #[test]
    fn global_scope_is_unfiltered() {
        let m = manager(Role::SuperAdmin, None, None);
        assert!(m.filter_for(Resource::Course).is_empty());
        assert!(m.filter_for(Resource::Franchise).is_empty());
        assert!(m.can(Operation::Delete, Resource::Franchise));
    }

    #[test]
    fn franchise_scope_filters_by_code() {
        let m = manager(Role::FranchiseAdmin, Some("NORTH"), None);
        assert_eq!(m.filter_for(Resource::User), doc! { "franchise_code": "NORTH" });
        assert_eq!(m.filter_for(Resource::Enrollment), doc! { "franchise_code": "NORTH" });
        assert!(m.filter_for(Resource::CourseContent).is_empty());
    }

    #[test]
    fn branch_scope_sees_franchise_wide_courses() {
        let m = manager(Role::BranchAdmin, Some("NORTH"), Some("B1"));
        let filter = m.filter_for(Resource::Course);
        assert_eq!(filter.get_str("franchise_code").unwrap(), "NORTH");
        assert_eq!(filter.get_array("$or").unwrap().len(), 2);

        let mine = doc! { "franchise_code": "NORTH", "branch_code": "B1" };
        let franchise_wide = doc! { "franchise_code": "NORTH" };
        let sibling = doc! { "franchise_code": "NORTH", "branch_code": "B2" };
        assert!(m.ensure_in_scope(Resource::Course, &mine).is_ok());
        assert!(m.ensure_in_scope(Resource::Course, &franchise_wide).is_ok());
        assert!(m.ensure_in_scope(Resource::Course, &sibling).is_err());
    }

    #[test]
    fn branch_scope_pins_users_to_branch() {
        let m = manager(Role::BranchAdmin, Some("NORTH"), Some("B1"));
        assert_eq!(
            m.filter_for(Resource::User),
            doc! { "franchise_code": "NORTH", "branch_code": "B1" }
        );
        let other = doc! { "franchise_code": "NORTH", "branch_code": "B2" };
        assert!(matches!(
            m.ensure_in_scope(Resource::User, &other),
            Err(AccessError::OutOfScope)
        ));
    }

    #[test]
    fn branch_admins_follow_up_franchise_enquiries() {
        let m = manager(Role::BranchAdmin, Some("NORTH"), Some("B1"));
        assert!(m.can(Operation::Read, Resource::Enquiry));
        assert!(m.can(Operation::Update, Resource::Enquiry));
        assert_eq!(m.filter_for(Resource::Enquiry), doc! { "franchise_code": "NORTH" });

        let enquiry = doc! { "franchise_code": "NORTH", "email": "parent@example.org" };
        let foreign = doc! { "franchise_code": "SOUTH" };
        assert!(m.ensure_in_scope(Resource::Enquiry, &enquiry).is_ok());
        assert!(m.ensure_in_scope(Resource::Enquiry, &foreign).is_err());
    }

    #[test]
    fn students_only_see_their_own_rows() {
        let id = ObjectId::new();
        let m = BranchAccessManager::for_user(Role::Student, id, Some("NORTH"), None).unwrap();

        assert_eq!(m.filter_for(Resource::Enrollment), doc! { "student_id": id.to_hex() });
        assert_eq!(m.filter_for(Resource::SupportTicket), doc! { "created_by": id.to_hex() });
        assert_eq!(m.filter_for(Resource::User), doc! { "_id": id });

        let theirs = doc! { "student_id": ObjectId::new().to_hex() };
        let own = doc! { "student_id": id.to_hex() };
        assert!(m.ensure_in_scope(Resource::Enrollment, &own).is_ok());
        assert!(m.ensure_in_scope(Resource::Enrollment, &theirs).is_err());
    }

    #[test]
    fn students_see_published_catalogue_courses() {
        let m = manager(Role::Student, Some("NORTH"), None);
        let filter = m.filter_for(Resource::Course);
        assert_eq!(filter.get_bool("is_published").unwrap(), true);

        let global = doc! { "is_published": true };
        let local = doc! { "is_published": true, "franchise_code": "NORTH" };
        let foreign = doc! { "is_published": true, "franchise_code": "SOUTH" };
        let draft = doc! { "is_published": false, "franchise_code": "NORTH" };
        assert!(m.ensure_in_scope(Resource::Course, &global).is_ok());
        assert!(m.ensure_in_scope(Resource::Course, &local).is_ok());
        assert!(m.ensure_in_scope(Resource::Course, &foreign).is_err());
        assert!(m.ensure_in_scope(Resource::Course, &draft).is_err());
    }

    #[test]
    fn students_cannot_touch_registry_data() {
        let m = manager(Role::Student, None, None);
        assert_eq!(m.filter_for(Resource::Franchise), match_nothing());
        assert_eq!(m.filter_for(Resource::Enquiry), match_nothing());
        assert!(!m.can(Operation::Read, Resource::Agreement));
        assert!(m.require(Operation::Create, Resource::Course).is_err());
        assert!(m.can(Operation::Create, Resource::QuizAttempt));
        assert!(!m.can(Operation::Delete, Resource::SupportTicket));
    }

    #[test]
    fn role_matrix_for_staff() {
        let franchise = manager(Role::FranchiseAdmin, Some("NORTH"), None);
        assert!(franchise.can(Operation::Create, Resource::Branch));
        assert!(!franchise.can(Operation::Create, Resource::Franchise));
        assert!(!franchise.can(Operation::Update, Resource::Agreement));

        let instructor = manager(Role::Instructor, Some("NORTH"), Some("B1"));
        assert!(instructor.can(Operation::Update, Resource::CourseContent));
        assert!(!instructor.can(Operation::Delete, Resource::Course));
        assert!(!instructor.can(Operation::Create, Resource::User));
        assert!(!instructor.can(Operation::Read, Resource::Enquiry));
    }

    #[test]
    fn stamping_overrides_scoped_input() {
        let m = manager(Role::FranchiseAdmin, Some("NORTH"), None);
        let mut document = doc! { "title": "Rust 101", "franchise_code": "SOUTH" };
        m.stamp(Resource::Course, &mut document);
        assert_eq!(document.get_str("franchise_code").unwrap(), "NORTH");

        let global = manager(Role::Admin, None, None);
        let mut document = doc! { "franchise_code": "SOUTH" };
        global.stamp(Resource::Course, &mut document);
        assert_eq!(document.get_str("franchise_code").unwrap(), "SOUTH");
    }

    #[test]
    fn branch_staff_can_publish_franchise_wide_courses() {
        let m = manager(Role::Instructor, Some("NORTH"), Some("B1"));

        let mut pinned = doc! { "title": "Algebra" };
        m.stamp(Resource::Course, &mut pinned);
        assert_eq!(pinned.get_str("branch_code").unwrap(), "B1");

        let mut wide = doc! { "title": "Algebra", "branch_code": Bson::Null };
        m.stamp(Resource::Course, &mut wide);
        assert_eq!(wide.get("branch_code"), Some(&Bson::Null));

        let mut ticket = doc! { "branch_code": Bson::Null };
        m.stamp(Resource::SupportTicket, &mut ticket);
        assert_eq!(ticket.get_str("branch_code").unwrap(), "B1");
    }

    #[test]
    fn student_stamp_strips_spoofed_codes() {
        let m = manager(Role::Student, None, None);
        let mut document = doc! { "franchise_code": "NORTH", "branch_code": "B1" };
        m.stamp(Resource::SupportTicket, &mut document);
        assert!(!document.contains_key("franchise_code"));
        assert!(!document.contains_key("branch_code"));
    }

    #[test]
    fn role_assignment_requires_higher_rank() {
        let franchise = manager(Role::FranchiseAdmin, Some("NORTH"), None);
        assert!(franchise.can_assign_role(Role::BranchAdmin));
        assert!(franchise.can_assign_role(Role::Student));
        assert!(!franchise.can_assign_role(Role::FranchiseAdmin));
        assert!(!franchise.can_assign_role(Role::Admin));

        let root = manager(Role::SuperAdmin, None, None);
        assert!(root.can_assign_role(Role::SuperAdmin));
    }

    #[test]
    fn notification_feed_includes_tenancy_audiences() {
        let m = manager(Role::Instructor, Some("NORTH"), Some("B1"));
        let filter = m.notification_feed_filter();
        assert_eq!(filter.get_array("$or").unwrap().len(), 4);

        let lone = manager(Role::Student, None, None);
        assert_eq!(lone.notification_feed_filter().get_array("$or").unwrap().len(), 2);
    }
}
