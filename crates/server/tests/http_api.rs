use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use repository::InMemoryRepository;
use tower::ServiceExt;

async fn test_app(key: &str) -> axum::Router {
    let repo = InMemoryRepository::new(key.to_owned(), None, Duration::ZERO, false).await;
    server::startup::app(Arc::new(repo), key.to_owned())
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn s1_plain_update_then_plain_get_round_trips() {
    let app = test_app("").await;

    let response = app
        .clone()
        .oneshot(
            Request::post("/update/gauge/Alloc/1.5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/value/gauge/Alloc").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "1.5");
}

#[tokio::test]
async fn s2_counter_updates_accumulate() {
    let app = test_app("").await;

    for value in ["2", "3"] {
        let response = app
            .clone()
            .oneshot(
                Request::post(format!("/update/counter/Hits/{value}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(Request::get("/value/counter/Hits").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_text(response).await, "5");
}

#[tokio::test]
async fn s3_unknown_kind_is_not_implemented() {
    let app = test_app("").await;

    let response = app
        .oneshot(
            Request::post("/update/int/Foo/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn s4_unparsable_value_is_bad_request() {
    let app = test_app("").await;

    let response = app
        .oneshot(
            Request::post("/update/gauge/Foo/not-a-number")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn s5_batch_update_then_index_listing() {
    let app = test_app("").await;

    let response = app
        .clone()
        .oneshot(
            Request::post("/updates")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"[{"id":"A","type":"gauge","value":1},{"id":"B","type":"counter","delta":7}]"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_text(response).await;
    assert!(listing.contains("A - 1"));
    assert!(listing.contains("B - 7"));
}

#[tokio::test]
async fn s6_wrong_hash_is_bad_request() {
    let app = test_app("secret").await;

    let response = app
        .oneshot(
            Request::post("/update")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"id":"A","type":"gauge","value":1,"hash":"deadbeef"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ping_succeeds_against_a_healthy_backend() {
    let app = test_app("").await;
    let response = app
        .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn get_on_missing_metric_is_not_found() {
    let app = test_app("").await;
    let response = app
        .oneshot(
            Request::get("/value/gauge/DoesNotExist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
