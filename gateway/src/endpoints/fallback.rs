use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use relay_types::RelayError;

pub async fn handle_404(req: Request<Body>) -> Response {
    let path = req.uri().path().to_string();
    let method = req.method().to_string();
    RelayError::RouteNotFound { path, method }.into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::{Method, StatusCode, Uri};
    use serde_json::Value;

    #[tokio::test]
    async fn handle_404_reports_method_and_path() {
        let req = Request::builder()
            .method(Method::GET)
            .uri(Uri::from_static("/unknown/path"))
            .body(Body::empty())
            .unwrap();

        let response = handle_404(req).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        let message = value.get("error").and_then(Value::as_str).unwrap();
        assert!(message.contains("GET"));
        assert!(message.contains("/unknown/path"));
    }
}
