use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, Response},
    middleware::Next,
};

/// The API only ever returns JSON, so nothing may be loaded or framed.
const CSP: &str = "default-src 'none'; frame-ancestors 'none'; base-uri 'none'; form-action 'none'";

const SECURITY_HEADERS: [(&str, &str); 3] = [
    ("content-security-policy", CSP),
    ("referrer-policy", "no-referrer"),
    ("x-content-type-options", "nosniff"),
];

/// Adds CSP, Referrer-Policy and X-Content-Type-Options to every response
/// that does not already carry them.
pub async fn csp_middleware(req: Request<Body>, next: Next) -> Response<Body> {
    let mut res = next.run(req).await;

    for (name, value) in SECURITY_HEADERS {
        let name = HeaderName::from_static(name);
        if !res.headers().contains_key(&name) {
            res.headers_mut()
                .insert(name, HeaderValue::from_static(value));
        }
    }

    res
}
