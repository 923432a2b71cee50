//! Identity extraction.
//!
//! Farmgate sits behind an authenticating gateway. The gateway verifies the caller and forwards the resulting
//! identity in two headers, `X-Actor-Id` and `X-Actor-Role`. The server trusts these headers; it never sees
//! credentials. The `SYSTEM` role is reserved for internal callers and can never be claimed over HTTP.
//!
//! Handlers receive the identity by taking an [`AuthenticatedActor`] argument. When the [`crate::middleware::acl`]
//! middleware has already resolved the actor for the route, the extractor reuses it from the request extensions.
use std::str::FromStr;

use actix_web::{dev::Payload, http::header::HeaderMap, FromRequest, HttpMessage, HttpRequest};
use farmgate_engine::db_types::{Actor, Role};
use futures::future::{ready, Ready};
use log::trace;

use crate::errors::{AuthError, ServerError};

pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";
pub const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";

/// The authenticated identity behind a request.
#[derive(Debug, Clone)]
pub struct AuthenticatedActor(pub Actor);

impl AuthenticatedActor {
    pub fn actor(&self) -> &Actor {
        &self.0
    }

    pub fn into_inner(self) -> Actor {
        self.0
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, AuthError> {
    let value = headers.get(name).ok_or(AuthError::MissingHeader(name))?;
    let value = value.to_str().map_err(|e| AuthError::InvalidHeader(name, e.to_string()))?.trim();
    if value.is_empty() {
        return Err(AuthError::MissingHeader(name));
    }
    Ok(value)
}

/// Reads the actor from the gateway headers.
///
/// A missing or malformed header is an authentication failure. Claiming the `SYSTEM` role is an authorization
/// failure.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ServerError> {
    let id = header_value(headers, ACTOR_ID_HEADER)?;
    let role = header_value(headers, ACTOR_ROLE_HEADER)?;
    let role = Role::from_str(role).map_err(|e| AuthError::InvalidHeader(ACTOR_ROLE_HEADER, e.to_string()))?;
    if role == Role::System {
        return Err(ServerError::InsufficientPermissions(AuthError::ReservedRole(role.to_string()).to_string()));
    }
    trace!("💻️ Request made by {role} {id}");
    Ok(Actor::new(id, role))
}

impl FromRequest for AuthenticatedActor {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        if let Some(actor) = req.extensions().get::<Actor>() {
            return ready(Ok(Self(actor.clone())));
        }
        ready(actor_from_headers(req.headers()).map(Self))
    }
}
