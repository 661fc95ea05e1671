/*!
 * TLS Scheme Enforcement
 *
 * When HTTPS enforcement is on, requests that arrived over plain HTTP at a
 * fronting proxy (reported via x-forwarded-proto) are refused. Requests
 * served directly over the in-process TLS listener carry no forwarding
 * header and pass through.
 */

use axum::{body::Body, extract::Request, middleware::Next, response::Response};

use crate::utils::AppError;

/// Reject proxied plain-HTTP requests when enforcement is enabled
pub async fn enforce_https(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let forwarded_proto = req
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok());

    if let Some(proto) = forwarded_proto {
        if !proto.eq_ignore_ascii_case("https") {
            return Err(AppError::Forbidden(
                "HTTPS is required".to_string(),
            ));
        }
    }

    Ok(next.run(req).await)
}
