use crate::models::{Principal, Role, SessionClaims};

impl Principal {
    /// Normalize verified claims into a principal.
    ///
    /// Returns `None` when the subject is missing; callers treat that as
    /// unauthenticated. A missing or unrecognised role claim falls back to
    /// `Role::Student` so role-gated routes still reject cleanly.
    pub fn from_claims(claims: &SessionClaims) -> Option<Principal> {
        let user_id = claims
            .sub
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;

        Some(Principal {
            user_id: user_id.to_string(),
            role: role_from_claim(claims.role.as_deref()),
            email: claims.email.clone(),
        })
    }
}

// Least privilege on absent/unknown claims. Whether a missing claim should
// instead be a 401 is an open product question.
fn role_from_claim(claim: Option<&str>) -> Role {
    match claim {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            tracing::warn!("{}; defaulting to {}", e, Role::Student);
            Role::Student
        }),
        None => {
            tracing::debug!("No role claim present; defaulting to {}", Role::Student);
            Role::Student
        }
    }
}
