//! Rate limiting middleware.

use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::ContentType,
};
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use ratewall_core::domain::API_KEY_HEADER;
use ratewall_core::{Decision, Identity, RateLimiter};

/// Body of every rejection.
pub const RATE_LIMITED_MESSAGE: &str =
    "you have reached the maximum number of requests or actions allowed within a certain time frame";

/// Rate limiting middleware factory.
pub struct RateLimitMiddleware {
    limiter: Arc<RateLimiter>,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<RateLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limiter = self.limiter.clone();
        let identity = identify(&req);

        Box::pin(async move {
            match limiter.check(&identity).await {
                Decision::Allow => {
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Decision::Deny(reason) => {
                    tracing::debug!(identity = %identity, ?reason, "Request rejected");

                    let response = HttpResponse::TooManyRequests()
                        .content_type(ContentType::plaintext())
                        .body(RATE_LIMITED_MESSAGE);

                    let (http_req, _payload) = req.into_parts();
                    Ok(ServiceResponse::new(http_req, response).map_into_right_body())
                }
            }
        })
    }
}

/// Identity from the peer address and the `API_KEY` header. Header bytes
/// outside visible ASCII are kept; invalid UTF-8 is replaced, not dropped.
fn identify(req: &ServiceRequest) -> Identity {
    let remote = req
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let api_key = req
        .headers()
        .get(API_KEY_HEADER)
        .map(|v| String::from_utf8_lossy(v.as_bytes()));

    Identity::derive(&remote, api_key.as_deref())
}
