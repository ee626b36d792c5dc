//! Mock of the application's card API, served on an ephemeral port

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

pub const TOKEN: &str = "mock-session-token";
pub const USERNAME: &str = "admin@example.com";
pub const PASSWORD: &str = "correct horse";

#[derive(Default)]
pub struct MockState {
    pub cards: Mutex<HashMap<u64, Value>>,
    /// `METHOD /path` of every request, in arrival order
    pub requests: Mutex<Vec<String>>,
    /// Answer every `PUT` with a 500
    pub fail_updates: Mutex<bool>,
}

pub struct MockApp {
    pub base_url: String,
    pub state: Arc<MockState>,
    handle: JoinHandle<()>,
}

#[allow(dead_code)]
impl MockApp {
    /// Start the mock with the given cards
    pub async fn start(cards: Vec<Value>) -> Self {
        let state = Arc::new(MockState::default());
        {
            let mut store = state.cards.lock().unwrap();
            for card in cards {
                let id = card["id"].as_u64().expect("card needs an id");
                store.insert(id, card);
            }
        }

        let app = Router::new()
            .route("/api/session", post(create_session))
            .route("/api/card/:id", get(get_card).put(update_card))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Should bind mock app");
        let addr = listener.local_addr().expect("Should have local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock app crashed");
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
            handle,
        }
    }

    pub fn card(&self, id: u64) -> Option<Value> {
        self.state.cards.lock().unwrap().get(&id).cloned()
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn fail_updates(&self) {
        *self.state.fail_updates.lock().unwrap() = true;
    }
}

impl Drop for MockApp {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("x-metabase-session")
        .and_then(|v| v.to_str().ok())
        == Some(TOKEN)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "Unauthenticated").into_response()
}

async fn create_session(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.requests.lock().unwrap().push("POST /api/session".into());
    if body["username"] == USERNAME && body["password"] == PASSWORD {
        Json(json!({ "id": TOKEN })).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "errors": { "password": "did not match stored password" } })),
        )
            .into_response()
    }
}

async fn get_card(
    State(state): State<Arc<MockState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    state
        .requests
        .lock()
        .unwrap()
        .push(format!("GET /api/card/{}", id));
    if !authorized(&headers) {
        return unauthorized();
    }
    match state.cards.lock().unwrap().get(&id) {
        Some(card) => Json(card.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "Not found.").into_response(),
    }
}

async fn update_card(
    State(state): State<Arc<MockState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state
        .requests
        .lock()
        .unwrap()
        .push(format!("PUT /api/card/{}", id));
    if !authorized(&headers) {
        return unauthorized();
    }
    if *state.fail_updates.lock().unwrap() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Update failed").into_response();
    }

    let mut cards = state.cards.lock().unwrap();
    let Some(card) = cards.get_mut(&id) else {
        return (StatusCode::NOT_FOUND, "Not found.").into_response();
    };
    if let (Some(card), Some(changes)) = (card.as_object_mut(), body.as_object()) {
        for (key, value) in changes {
            card.insert(key.clone(), value.clone());
        }
    }
    Json(card.clone()).into_response()
}
