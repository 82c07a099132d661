use axum::http::StatusCode;
use tower::ServiceExt;

mod common;
use common::{body_text, get_request, loaded_app};

#[tokio::test]
async fn can_report_health() {
    let (app, _) = loaded_app().await;

    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}

#[tokio::test]
async fn can_render_not_found_page_for_unknown_path() {
    let (app, _) = loaded_app().await;

    let response = app.oneshot(get_request("/nowhere")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_text(response).await;
    assert!(body.contains("Page not found"));
    assert!(body.contains("/nowhere"));
}

#[tokio::test]
async fn can_keep_selected_filter_from_query() {
    let (app, _) = loaded_app().await;

    let response = app
        .oneshot(get_request("/?filter=active"))
        .await
        .unwrap();

    let body = body_text(response).await;
    assert!(body.contains("id=\"current-filter\" name=\"filter\" value=\"active\""));
    assert!(body.contains("No active tasks"));
}
