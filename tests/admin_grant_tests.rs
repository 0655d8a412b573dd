// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Role grant contract tests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

#[tokio::test]
async fn test_non_post_methods_are_rejected() {
    for method in ["GET", "PUT", "DELETE", "PATCH"] {
        let (app, _state) = common::create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri("/admin/grant")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.status(),
            StatusCode::METHOD_NOT_ALLOWED,
            "method {method}"
        );
    }
}

#[tokio::test]
async fn test_non_post_rejected_even_with_valid_body() {
    let (app, _state) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/admin/grant")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"uid": "user-1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_missing_uid_is_rejected() {
    let (app, _state) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/grant")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = common::body_json(response).await;
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn test_grant_reaches_provider() {
    let (app, _state) = common::create_test_app();

    // The offline provider errors; a 500 here means validation and method
    // checks passed and the claim update was attempted.
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/grant")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"uid": "user-1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = common::body_json(response).await;
    assert_eq!(body["error"], "upstream_error");
}
