use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use tracing::warn;

use crate::auth::{AuthError, Session};
use crate::database::models::Role;
use crate::error::ApiError;

/// Why the gate refused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Unauthenticated,
    Forbidden,
    SelfTargetForbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(Denial),
}

/// Session present and, when a role is required, holding exactly that role
pub fn authorize(session: Option<&Session>, required_role: Option<Role>) -> Decision {
    let Some(session) = session else {
        return Decision::Denied(Denial::Unauthenticated);
    };
    match required_role {
        Some(role) if session.user.role != Some(role) => Decision::Denied(Denial::Forbidden),
        _ => Decision::Allowed,
    }
}

/// `authorize`, plus: acting on your own identity is always denied,
/// whatever your role.
pub fn authorize_target(session: Option<&Session>, required_role: Option<Role>, target: &str) -> Decision {
    match authorize(session, required_role) {
        Decision::Allowed => match session {
            Some(s) if s.user.id.to_string() == target.trim().to_ascii_lowercase() => {
                Decision::Denied(Denial::SelfTargetForbidden)
            }
            _ => Decision::Allowed,
        },
        denied => denied,
    }
}

/// Route-level gate configuration
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub required_role: Option<Role>,
    /// Deny when the route's `:id` is the caller's own identity
    pub deny_self_target: bool,
}

impl Policy {
    pub const SIGNED_IN: Policy = Policy {
        required_role: None,
        deny_self_target: false,
    };

    pub const ADMIN: Policy = Policy {
        required_role: Some(Role::Admin),
        deny_self_target: false,
    };

    pub const ADMIN_NOT_SELF: Policy = Policy {
        required_role: Some(Role::Admin),
        deny_self_target: true,
    };

    pub fn evaluate(&self, session: Option<&Session>, target: Option<&str>) -> Decision {
        match target {
            Some(target) if self.deny_self_target => authorize_target(session, self.required_role, target),
            _ => authorize(session, self.required_role),
        }
    }
}

impl From<Denial> for AuthError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Unauthenticated => AuthError::Unauthorized("Authentication required".to_string()),
            Denial::Forbidden => AuthError::Forbidden("Insufficient role for this operation".to_string()),
            Denial::SelfTargetForbidden => AuthError::SelfTargetForbidden,
        }
    }
}

/// Middleware applying a `Policy` before the handler body runs.
///
/// ```ignore
/// Router::new()
///     .route("/api/admin/users/:id", delete(admin::user_delete))
///     .route_layer(from_fn_with_state(Policy::ADMIN_NOT_SELF, require))
/// ```
pub async fn require(
    State(policy): State<Policy>,
    params: Option<Path<HashMap<String, String>>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let target = params.as_ref().and_then(|Path(p)| p.get("id")).map(String::as_str);
    let session = request.extensions().get::<Session>();

    match policy.evaluate(session, target) {
        Decision::Allowed => Ok(next.run(request).await),
        Decision::Denied(denial) => {
            warn!(
                "Denied {} {} ({:?}) for {}",
                request.method(),
                request.uri().path(),
                denial,
                session.map(|s| s.user.email.as_str()).unwrap_or("anonymous")
            );
            Err(AuthError::from(denial).into())
        }
    }
}
