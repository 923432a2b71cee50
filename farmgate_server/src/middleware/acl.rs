//! Access control list middleware for the Farmgate server.
//! This middleware can be placed on any route or service.
//!
//! It resolves the actor from the gateway headers and checks its role against the roles allowed on the route. If the
//! actor is allowed, it is stored in the request extensions, so that handlers can pick it up via
//! [`crate::auth::AuthenticatedActor`], and the request continues. Otherwise a 401 or 403 response is returned
//! without calling the handler.
//!
//! Ownership of individual orders and inquiries is checked by the engine, not here.

use std::{future::Future, pin::Pin, rc::Rc};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
    ResponseError,
};
use farmgate_engine::db_types::Role;
use futures::future::{ok, Ready};
use log::debug;

use crate::{auth::actor_from_headers, errors::ServerError};

pub struct AclMiddlewareFactory {
    allowed_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(allowed_roles: &[Role]) -> Self {
        AclMiddlewareFactory { allowed_roles: allowed_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AclMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { allowed_roles: self.allowed_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    allowed_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let allowed_roles = self.allowed_roles.clone();
        Box::pin(async move {
            let actor = match actor_from_headers(req.headers()) {
                Ok(actor) => actor,
                Err(e) => {
                    debug!("💻️ Rejected request to {}. {e}", req.path());
                    return Ok(req.into_response(e.error_response()).map_into_right_body());
                },
            };
            if !allowed_roles.contains(&actor.role) {
                debug!("💻️ {} {} may not call {}", actor.role, actor.id, req.path());
                let err = ServerError::InsufficientPermissions(format!("The {} role may not call this endpoint", actor.role));
                return Ok(req.into_response(err.error_response()).map_into_right_body());
            }
            req.extensions_mut().insert(actor);
            service.call(req).await.map(ServiceResponse::map_into_left_body)
        })
    }
}
