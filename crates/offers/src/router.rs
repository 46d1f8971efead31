//! Offer admin router. Mounts all offer endpoints under /api/v1/offers.

use crate::handlers::{self, OfferAdminState};
use crate::repository::OfferRepository;
use crate::service::OfferService;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;

/// Build the admin router over the given repository.
pub fn offer_router(repo: Arc<dyn OfferRepository>) -> Router {
    let state = OfferAdminState {
        service: Arc::new(OfferService::new(repo)),
    };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/offers", get(handlers::list_offers).post(handlers::create_offer))
        .route("/api/v1/offers/:offer_id", get(handlers::get_offer).delete(handlers::deactivate_offer))
        .route("/api/v1/offers/:offer_id/schedule", put(handlers::update_schedule))
        .route("/api/v1/offers/:offer_id/pause", post(handlers::pause_offer))
        .route("/api/v1/offers/:offer_id/resume", post(handlers::resume_offer))
        .route("/api/v1/offers/:offer_id/active", get(handlers::offer_activity))
        .route("/api/v1/offers/:offer_id/redirect", get(handlers::resolve_redirect))
        .route("/api/v1/offers/:offer_id/rules", post(handlers::add_smart_rule))
        .route("/api/v1/offers/:offer_id/rules/:rule_id", delete(handlers::remove_smart_rule))
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::repository::MemoryOfferRepository;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> Router {
        offer_router(Arc::new(MemoryOfferRepository::new()))
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn create_body() -> serde_json::Value {
        serde_json::json!({
            "offer_id": "ML-9",
            "campaign_id": "CMP-2",
            "name": "Mobile Game Install",
            "network": "ayet",
            "payout": 1.5,
            "target_url": "https://track.example.com/9",
            "created_by": "admin",
            "countries": ["us"]
        })
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let app = app();
        let resp = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/offers", create_body()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = app
            .oneshot(Request::get("/api/v1/offers/ML-9").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["countries"][0], "US");
        assert_eq!(body["schedule"]["status"], "Active");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let app = app();
        let resp = app
            .clone()
            .oneshot(Request::get("/api/v1/offers/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let mut body = create_body();
        body["target_url"] = serde_json::json!("track.example.com");
        let resp = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/offers", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(resp).await["error"], "validation_failed");

        app.clone()
            .oneshot(json_request("POST", "/api/v1/offers", create_body()))
            .await
            .unwrap();
        let resp = app
            .oneshot(json_request("POST", "/api/v1/offers", create_body()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_rules_and_pause() {
        let app = app();
        app.clone()
            .oneshot(json_request("POST", "/api/v1/offers", create_body()))
            .await
            .unwrap();

        let rule = serde_json::json!({
            "type": "Backup",
            "url": "https://backup.example.com",
            "priority": 1
        });
        let resp = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/offers/ML-9/rules", rule.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/offers/ML-9/rules", rule))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(resp).await["error"], "duplicate_priority");

        let resp = app
            .clone()
            .oneshot(Request::post("/api/v1/offers/ML-9/pause").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(Request::get("/api/v1/offers/ML-9/active").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["isCurrentlyActive"], false);
    }
}
