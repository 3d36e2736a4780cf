use crate::error::GateError;
use crate::models::{Principal, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Pass(Principal),
    Unauthenticated,
    Forbidden,
}

impl AuthDecision {
    pub fn into_result(self) -> Result<Principal, GateError> {
        match self {
            AuthDecision::Pass(principal) => Ok(principal),
            AuthDecision::Unauthenticated => Err(GateError::Unauthenticated),
            AuthDecision::Forbidden => Err(GateError::Forbidden),
        }
    }
}

/// Check a principal against an optional allow-list.
/// `None` or an empty list means any authenticated role.
pub fn authorize(principal: Option<Principal>, allowed_roles: Option<&[Role]>) -> AuthDecision {
    let Some(principal) = principal else {
        return AuthDecision::Unauthenticated;
    };

    match allowed_roles {
        Some(roles) if !roles.is_empty() && !roles.contains(&principal.role) => {
            AuthDecision::Forbidden
        }
        _ => AuthDecision::Pass(principal),
    }
}
