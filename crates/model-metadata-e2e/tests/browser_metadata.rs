//! Editor helpers in a real browser against a fixture page
//!
//! The fixture mimics the metadata editor's DOM and network traffic. Tests
//! are skipped when `SKIP_BROWSER_TESTS` is set or Chrome cannot be found.
//!
//! Run with: cargo test -p model-metadata-e2e --test browser_metadata

#[path = "common/browser.rs"]
mod browser;

use axum::{
    response::Html,
    routing::{get, post, put},
    Json, Router,
};
use model_metadata_e2e::driver::Driver;
use model_metadata_e2e::helpers::{
    dataset_edit_bar, map_column_to, open_column_options, rename_column, save_metadata_changes,
    set_column_type, ColumnMapping,
};
use model_metadata_e2e::{Config, Locator, Session, TextMatch};
use serde_json::json;

const EDITOR_HTML: &str = include_str!("fixtures/editor.html");

/// Serve the fixture and its API on an ephemeral port
async fn start_fixture() -> String {
    let app = Router::new()
        .route("/", get(|| async { Html(EDITOR_HTML) }))
        .route(
            "/api/card/:id",
            put(|| async { Json(json!({ "id": 7, "result_metadata": [] })) }),
        )
        .route(
            "/api/dataset",
            post(|| async { Json(json!({ "data": { "rows": [] } })) }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Should bind fixture server");
    let addr = listener.local_addr().expect("Should have local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Fixture server crashed");
    });
    format!("http://{}", addr)
}

async fn open_editor(hash: &str) -> Option<Session> {
    let base_url = start_fixture().await;
    let session = browser::require_session(Config::for_base_url(base_url)).await?;
    session
        .visit(&format!("/{}", hash))
        .await
        .expect("Should load fixture");
    Some(session)
}

fn log_entry(text: &str) -> Locator {
    Locator::document()
        .css(".log-entry")
        .contains(TextMatch::Exact(text.to_string()))
}

#[tokio::test]
async fn test_save_metadata_changes_in_browser() {
    skip_if_no_chrome!();

    let Some(session) = open_editor("").await else {
        return;
    };

    save_metadata_changes(&session)
        .await
        .expect("Save flow should complete");
    assert!(session
        .driver()
        .resolve(&dataset_edit_bar())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_open_column_options_in_browser() {
    skip_if_no_chrome!();

    let Some(session) = open_editor("").await else {
        return;
    };

    open_column_options(&session, "Tax")
        .await
        .expect("Should click the Tax header");
    session
        .should_be_visible(&log_entry("header:Tax"))
        .await
        .expect("Header click should be logged");
}

#[tokio::test]
async fn test_rename_column_in_browser() {
    skip_if_no_chrome!();

    let Some(session) = open_editor("").await else {
        return;
    };

    rename_column(&session, "Tax", "Sales tax")
        .await
        .expect("Should rename column");
    session
        .get(&Locator::document().display_value("Sales tax"))
        .await
        .expect("Input should hold the new name");
}

#[tokio::test]
async fn test_set_column_type_in_browser() {
    skip_if_no_chrome!();

    let Some(session) = open_editor("").await else {
        return;
    };

    set_column_type(&session, "No special type", "Currency")
        .await
        .expect("Should pick Currency");
    session
        .should_be_visible(&log_entry("type:Currency"))
        .await
        .expect("Type change should be logged");
}

#[tokio::test]
async fn test_map_column_to_in_browser() {
    skip_if_no_chrome!();

    let Some(session) = open_editor("").await else {
        return;
    };

    map_column_to(&session, &ColumnMapping::new("Orders", "Tax"))
        .await
        .expect("Should map column");
    session
        .should_be_visible(&log_entry("mapped:Orders.Tax"))
        .await
        .expect("Mapping should be logged");
}

#[tokio::test]
async fn test_map_column_to_through_overlay_in_browser() {
    skip_if_no_chrome!();

    let Some(session) = open_editor("#covered").await else {
        return;
    };

    map_column_to(&session, &ColumnMapping::new("Orders", "Tax"))
        .await
        .expect("Forced click should open the mapping popover");
    session
        .should_be_visible(&log_entry("mapped:Orders.Tax"))
        .await
        .expect("Mapping should be logged");
}
