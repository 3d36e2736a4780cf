// [[GATEKEEPER]]/apps/gatekeeper/src/ownership.rs
// Purpose: IDOR protection. Decides whether a principal may touch a loaded resource.
// Architecture: Domain Logic Layer
// Dependencies: Models

use crate::error::GateError;
use crate::models::{FileRef, Principal, ProjectRef, Role, SelfScoped, TaskRef};

/// A resource projection that knows who its direct owners are.
///
/// Implementations only compare identifiers; the admin override lives in
/// [`can_access`] and nowhere else.
pub trait OwnershipCheckable {
    fn is_owned_by(&self, user_id: &str) -> bool;
}

impl OwnershipCheckable for ProjectRef {
    fn is_owned_by(&self, user_id: &str) -> bool {
        self.student_id == user_id || self.counselor_id.as_deref() == Some(user_id)
    }
}

impl OwnershipCheckable for TaskRef {
    fn is_owned_by(&self, user_id: &str) -> bool {
        self.milestone.project.is_owned_by(user_id)
    }
}

impl OwnershipCheckable for FileRef {
    fn is_owned_by(&self, user_id: &str) -> bool {
        // Orphaned uploads are visible to the uploader only.
        self.uploader_id == user_id
            || self
                .project
                .as_ref()
                .is_some_and(|project| project.is_owned_by(user_id))
    }
}

impl OwnershipCheckable for SelfScoped {
    fn is_owned_by(&self, user_id: &str) -> bool {
        self.subject_id == user_id
    }
}

pub fn can_access<R: OwnershipCheckable + ?Sized>(user_id: &str, role: Role, resource: &R) -> bool {
    role.is_privileged() || resource.is_owned_by(user_id)
}

pub fn can_access_project(user_id: &str, role: Role, project: &ProjectRef) -> bool {
    can_access(user_id, role, project)
}

pub fn can_access_task(user_id: &str, role: Role, task: &TaskRef) -> bool {
    can_access(user_id, role, task)
}

pub fn can_access_file(user_id: &str, role: Role, file: &FileRef) -> bool {
    can_access(user_id, role, file)
}

pub fn can_access_self(user_id: &str, role: Role, scope: &SelfScoped) -> bool {
    can_access(user_id, role, scope)
}

/// Resolve a lookup result into 404 / 403 / pass.
pub fn ensure_access<R: OwnershipCheckable>(
    principal: &Principal,
    resource: Option<&R>,
    resource_name: &'static str,
) -> Result<(), GateError> {
    let resource = resource.ok_or(GateError::NotFound(resource_name))?;

    if can_access(&principal.user_id, principal.role, resource) {
        Ok(())
    } else {
        tracing::warn!(
            "Ownership check denied {} access to {} for user {}",
            principal.role,
            resource_name,
            principal.user_id
        );
        Err(GateError::Forbidden)
    }
}
