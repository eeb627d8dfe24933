//! API routes

pub mod health;
pub mod predict;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

/// Build the application router with its middleware
pub fn build_router(state: SharedState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        // Health check
        .route("/health", get(health::health_check))

        // Classification
        .route("/predict", post(predict::predict))
        .route("/labels", get(predict::labels))

        // Add state
        .with_state(state)

        // Add middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use burn_ndarray::NdArray;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use serde_json::Value;
    use steel_defect::{
        Classifier, InferencePool, LabelSet, Predictor, Preprocessor, Ranker, ResNetConfig,
    };
    use tower::ServiceExt;

    use crate::state::AppState;

    const BOUNDARY: &str = "steel-defect-test-boundary";

    fn app(max_upload_bytes: usize) -> Router {
        let config = ResNetConfig::new(6)
            .with_layers([1, 1, 1, 1])
            .with_base_width(4);
        let classifier = Classifier::<NdArray>::seeded(&config, 3, &Default::default()).unwrap();
        let ranker = Ranker::new(LabelSet::default(), 3).unwrap();
        let predictor = Predictor::new(Preprocessor::default(), classifier, ranker);

        let pool = InferencePool::spawn(predictor, 2, 16).unwrap();
        let state = AppState::new(pool, LabelSet::default(), 224, "NdArray (CPU)", max_upload_bytes);
        build_router(Arc::new(state))
    }

    fn png(color: [u8; 3]) -> Vec<u8> {
        let image = RgbImage::from_pixel(64, 64, Rgb(color));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn multipart_body(field: &str, content: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"sample.png\"\r\n",
                field
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn predict_request(uri: &str, field: &str, content: &[u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(field, content)))
            .unwrap()
    }

    async fn json(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_predict_returns_top_three() {
        let resp = app(1 << 20)
            .oneshot(predict_request("/predict", "file", &png([128, 128, 128])))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = json(resp).await;
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);

        let confidences: Vec<f64> = results
            .iter()
            .map(|r| r["confidence"].as_f64().unwrap())
            .collect();
        assert!(confidences.windows(2).all(|w| w[0] >= w[1]));
        assert!(results.iter().all(|r| r["class"].is_string()));
    }

    #[tokio::test]
    async fn test_predict_top_k_query() {
        let app = app(1 << 20);

        let resp = app
            .clone()
            .oneshot(predict_request("/predict?top_k=6", "file", &png([10, 20, 30])))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json(resp).await["results"].as_array().unwrap().len(), 6);

        for uri in ["/predict?top_k=0", "/predict?top_k=7", "/predict?top_k=three"] {
            let resp = app
                .clone()
                .oneshot(predict_request(uri, "file", &png([10, 20, 30])))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
            assert!(json(resp).await["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_non_image_upload_is_bad_request() {
        let resp = app(1 << 20)
            .oneshot(predict_request("/predict", "file", b"this is not an image"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(json(resp).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_missing_file_field_is_bad_request() {
        let resp = app(1 << 20)
            .oneshot(predict_request("/predict", "image", &png([0, 0, 0])))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let not_multipart = Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let resp = app(1 << 20).oneshot(not_multipart).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let resp = app(1024)
            .oneshot(predict_request("/predict", "file", &vec![0u8; 8192]))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_health_and_labels() {
        let app = app(1 << 20);

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let health = json(resp).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["workers"], 2);
        assert_eq!(health["backend"], "NdArray (CPU)");

        let resp = app
            .oneshot(Request::builder().uri("/labels").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let labels = json(resp).await;
        assert_eq!(labels["labels"][0], "crazing");
        assert_eq!(labels["labels"].as_array().unwrap().len(), 6);
        assert_eq!(labels["top_k"], 3);
        assert_eq!(labels["image_size"], 224);
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let resp = app(1 << 20)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }
}
