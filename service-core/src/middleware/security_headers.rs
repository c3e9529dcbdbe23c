use axum::{extract::Request, http::header, middleware::Next, response::IntoResponse};

/// Paths serving rendered documents get a CSP that permits inline styles;
/// everything else is JSON and gets a deny-all policy.
fn serves_document(path: &str) -> bool {
    path.ends_with("/render") || path.ends_with("/print")
}

pub async fn security_headers_middleware(req: Request, next: Next) -> impl IntoResponse {
    let is_document = serves_document(req.uri().path());

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        header::HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );

    if is_document {
        headers.insert(
            header::CONTENT_SECURITY_POLICY,
            header::HeaderValue::from_static(
                "default-src 'none'; style-src 'unsafe-inline'; img-src 'self' https: data:",
            ),
        );
        headers.insert(
            header::X_FRAME_OPTIONS,
            header::HeaderValue::from_static("SAMEORIGIN"),
        );
    } else {
        headers.insert(
            header::CONTENT_SECURITY_POLICY,
            header::HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        );
        headers.insert(
            header::X_FRAME_OPTIONS,
            header::HeaderValue::from_static("DENY"),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::serves_document;

    #[test]
    fn document_routes_are_detected() {
        assert!(serves_document("/invoices/abc/render"));
        assert!(serves_document("/invoices/abc/print"));
        assert!(!serves_document("/invoices/abc"));
        assert!(!serves_document("/invoices/abc/pdf"));
    }
}
