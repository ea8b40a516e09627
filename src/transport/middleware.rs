use axum::{
    extract::Request,
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};

static PRODUCT: &str = concat!("vodcast/", env!("CARGO_PKG_VERSION"));

pub async fn add_response_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(header::SERVER, HeaderValue::from_static(PRODUCT));
    response
}
