//! Admin token middleware.
//!
//! Out-of-band operations (restocking, exchange rates) are only open to callers that present the configured admin
//! token in the `X-Admin-Token` header. The middleware can be placed on any route or scope. Requests without the
//! header, or with the wrong token, are refused with a 401 before they reach the handler. If no admin token has been
//! configured, every request is refused.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use mkt_common::Secret;

use crate::errors::ServerError;

pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

pub struct AdminTokenMiddlewareFactory {
    token: Secret<String>,
}

impl AdminTokenMiddlewareFactory {
    pub fn new(token: Secret<String>) -> Self {
        AdminTokenMiddlewareFactory { token }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminTokenMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AdminTokenMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminTokenMiddlewareService { token: self.token.clone(), service: Rc::new(service) }))
    }
}

pub struct AdminTokenMiddlewareService<S> {
    token: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AdminTokenMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let expected = self.token.clone();
        Box::pin(async move {
            let presented = req.headers().get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
            if expected.is_empty() {
                warn!("💻️ Refusing {} because no admin token has been configured", req.path());
                return Err(ServerError::Unauthorized.into());
            }
            if !expected.matches(presented) {
                warn!("💻️ Refusing {}. The admin token is missing or wrong.", req.path());
                return Err(ServerError::Unauthorized.into());
            }
            trace!("💻️ Admin token accepted for {}", req.path());
            service.call(req).await
        })
    }
}
