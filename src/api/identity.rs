//! Caller identity as forwarded by the upstream gateway.
//!
//! The gateway authenticates the request and passes the result as `x-identity-*`
//! headers. Anonymous callers identify their guest cart with `x-session-id`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use super::error::ApiError;
use crate::domain::aggregates::{CartOwner, Customer};
use crate::error::OrderingError;

pub const IDENTITY_ID: &str = "x-identity-id";
pub const IDENTITY_ROLE: &str = "x-identity-role";
pub const IDENTITY_NAME: &str = "x-identity-name";
pub const IDENTITY_EMAIL: &str = "x-identity-email";
pub const IDENTITY_PHONE: &str = "x-identity-phone";
pub const SESSION_ID: &str = "x-session-id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

#[derive(Clone, Debug)]
pub struct Identity {
    pub id: String,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Clone, Debug, Default)]
pub struct Caller {
    pub identity: Option<Identity>,
    pub session_id: Option<String>,
}

impl Caller {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, OrderingError> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let identity = match header(IDENTITY_ID) {
            Some(id) => {
                let role = match header(IDENTITY_ROLE).as_deref() {
                    None | Some("customer") => Role::Customer,
                    Some("admin") => Role::Admin,
                    Some(other) => {
                        tracing::warn!(identity = %id, role = other, "Rejected unknown role");
                        return Err(OrderingError::Unauthorized);
                    }
                };
                Some(Identity {
                    id,
                    role,
                    name: header(IDENTITY_NAME).unwrap_or_default(),
                    email: header(IDENTITY_EMAIL).unwrap_or_default(),
                    phone: header(IDENTITY_PHONE).unwrap_or_default(),
                })
            }
            None => None,
        };
        Ok(Self { identity, session_id: header(SESSION_ID) })
    }

    pub fn is_admin(&self) -> bool { self.identity.as_ref().is_some_and(|i| i.role == Role::Admin) }

    pub fn require_identity(&self) -> Result<&Identity, OrderingError> { self.identity.as_ref().ok_or(OrderingError::Unauthorized) }

    pub fn require_admin(&self) -> Result<&Identity, OrderingError> {
        let identity = self.require_identity()?;
        if identity.role != Role::Admin {
            return Err(OrderingError::Forbidden("admin role required".into()));
        }
        Ok(identity)
    }

    /// Signed-in callers own their user cart; anonymous callers own the cart of their session.
    pub fn cart_owner(&self) -> Result<CartOwner, OrderingError> {
        match (&self.identity, &self.session_id) {
            (Some(identity), _) => Ok(CartOwner::User(identity.id.clone())),
            (None, Some(session)) => Ok(CartOwner::Guest(session.clone())),
            (None, None) => Err(OrderingError::Unauthorized),
        }
    }

    pub fn customer(&self) -> Customer {
        self.identity
            .as_ref()
            .map(|i| Customer { identity_id: Some(i.id.clone()), name: i.name.clone(), email: i.email.clone(), phone: i.phone.clone() })
            .unwrap_or_default()
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_anonymous_guest() {
        let caller = Caller::from_headers(&headers(&[(SESSION_ID, "s-1")])).unwrap();
        assert_eq!(caller.cart_owner().unwrap(), CartOwner::Guest("s-1".into()));
        assert!(matches!(caller.require_identity(), Err(OrderingError::Unauthorized)));
        assert!(Caller::default().cart_owner().is_err());
    }

    #[test]
    fn test_roles() {
        let customer = Caller::from_headers(&headers(&[(IDENTITY_ID, "u1"), (SESSION_ID, "s-1")])).unwrap();
        assert_eq!(customer.cart_owner().unwrap(), CartOwner::User("u1".into()));
        assert!(matches!(customer.require_admin(), Err(OrderingError::Forbidden(_))));

        let admin = Caller::from_headers(&headers(&[(IDENTITY_ID, "a1"), (IDENTITY_ROLE, "admin")])).unwrap();
        assert!(admin.is_admin());
        assert!(Caller::from_headers(&headers(&[(IDENTITY_ID, "x"), (IDENTITY_ROLE, "root")])).is_err());
    }
}
