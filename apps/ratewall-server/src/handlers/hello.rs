use actix_web::HttpResponse;
use actix_web::http::header::ContentType;

/// Demo downstream handler.
pub async fn hello() -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body("Hello, world!!!\n")
}
