//! HTTP handlers and route configuration.

mod health;
mod hello;

use actix_web::web;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check))
        // Everything else falls through to the demo handler.
        .route("/{tail:.*}", web::to(hello::hello));
}
