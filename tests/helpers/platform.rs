//! In-process stand-in for the hosted data/auth platform.
//!
//! Emulates just enough of the REST contract the app depends on: filtered
//! selects (`eq` / `neq` / `in`, ordering, limit), inserts returning their
//! representation, filtered updates and deletes, the auth endpoints, and the
//! mail provider's `/emails` endpoint so tests can assert on outbound email.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Default)]
pub struct PlatformState {
    /// collection name -> rows
    rows: Mutex<HashMap<String, Vec<Value>>>,
    /// access token -> (user_id, email)
    sessions: Mutex<HashMap<String, (String, String)>>,
    /// email -> (password, user_id)
    accounts: Mutex<HashMap<String, (String, String)>>,
    /// user_id -> email, for the privileged admin lookup
    user_emails: Mutex<HashMap<String, String>>,
    sent_mail: Mutex<Vec<SentMail>>,
    seq: AtomicU64,
    fail_mail: AtomicBool,
    /// fail the next PATCH against this collection with a 500
    fail_patch: Mutex<Option<String>>,
}

impl PlatformState {
    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Monotonic fake timestamps so `order=created_at` is deterministic.
    fn next_timestamp(&self) -> String {
        let seq = self.next_seq();
        chrono::DateTime::from_timestamp(1_700_000_000 + seq as i64, 0)
            .expect("valid timestamp")
            .to_rfc3339()
    }

    pub fn insert_row(&self, collection: &str, mut row: Value) -> Value {
        let obj = row.as_object_mut().expect("row must be an object");
        if !obj.contains_key("id") {
            obj.insert(
                "id".to_string(),
                json!(format!("{collection}-{}", self.next_seq())),
            );
        }
        if !obj.contains_key("created_at") {
            obj.insert("created_at".to_string(), json!(self.next_timestamp()));
        }
        self.rows
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    /// Mutate rows directly, bypassing the REST surface (e.g. to flip a
    /// role or a status out from under the app).
    pub fn update_rows(&self, collection: &str, f: impl FnOnce(&mut Vec<Value>)) {
        let mut rows = self.rows.lock().unwrap();
        f(rows.entry(collection.to_string()).or_default());
    }

    pub fn rows(&self, collection: &str) -> Vec<Value> {
        self.rows
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn sent_mail(&self) -> Vec<SentMail> {
        self.sent_mail.lock().unwrap().clone()
    }

    pub fn set_fail_mail(&self, fail: bool) {
        self.fail_mail.store(fail, Ordering::SeqCst);
    }

    pub fn fail_next_patch(&self, collection: &str) {
        *self.fail_patch.lock().unwrap() = Some(collection.to_string());
    }

    /// Register an account and a live session; returns the access token.
    pub fn add_user(&self, user_id: &str, email: &str, password: &str) -> String {
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), user_id.to_string()));
        self.user_emails
            .lock()
            .unwrap()
            .insert(user_id.to_string(), email.to_string());
        let token = format!("tok-{user_id}");
        self.sessions
            .lock()
            .unwrap()
            .insert(token.clone(), (user_id.to_string(), email.to_string()));
        token
    }

    pub fn seed_profile(&self, user_id: &str, role: &str, is_admin: bool, email: &str) {
        self.insert_row(
            "profiles",
            json!({
                "user_id": user_id,
                "role": role,
                "is_admin": is_admin,
                "email": email,
                "first_name": "Test",
                "last_name": "User",
                "phone": "(615) 555-0100",
            }),
        );
    }
}

/// Full property row with sensible defaults; tests tweak fields before
/// inserting.
pub fn property_json(id: &str, address: &str, price: i64, arv: i64, repairs: i64) -> Value {
    json!({
        "id": id,
        "address": address,
        "price": price,
        "beds": 3,
        "baths": 2.0,
        "sqft": 1480,
        "acres": 0.19,
        "arv": arv,
        "repairs": repairs,
        "lat": 36.1627,
        "lng": -86.7816,
        "photo_url": "https://photos.google.com/",
        "status": "New",
        "is_accepting_offers": true,
        "accepted_offer_id": null,
        "offer_deadline": null,
    })
}

pub fn offer_json(property_id: &str, user_id: &str, offer_price: i64, status: &str) -> Value {
    json!({
        "property_id": property_id,
        "user_id": user_id,
        "offer_price": offer_price,
        "notes": null,
        "status": status,
    })
}

pub struct MockPlatform {
    pub base_url: String,
    pub state: Arc<PlatformState>,
}

impl MockPlatform {
    pub async fn spawn() -> Self {
        let state = Arc::new(PlatformState::default());

        let app = Router::new()
            .route(
                "/rest/v1/{collection}",
                get(rest_select)
                    .post(rest_insert)
                    .patch(rest_update)
                    .delete(rest_delete),
            )
            .route("/auth/v1/user", get(auth_user))
            .route("/auth/v1/token", post(auth_token))
            .route("/auth/v1/signup", post(auth_signup))
            .route("/auth/v1/admin/users/{id}", get(auth_admin_user))
            .route("/emails", post(send_email))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock platform");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock platform");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn row_matches(row: &Value, filters: &[(String, String)]) -> bool {
    filters.iter().all(|(column, op_value)| {
        let field = scalar(row.get(column).unwrap_or(&Value::Null));
        if let Some(v) = op_value.strip_prefix("eq.") {
            field == v
        } else if let Some(v) = op_value.strip_prefix("neq.") {
            field != v
        } else if let Some(v) = op_value.strip_prefix("in.") {
            v.trim_start_matches('(')
                .trim_end_matches(')')
                .split(',')
                .any(|candidate| candidate == field)
        } else {
            true
        }
    })
}

fn split_params(params: Vec<(String, String)>) -> (Vec<(String, String)>, Option<String>, Option<usize>) {
    let mut filters = Vec::new();
    let mut order = None;
    let mut limit = None;
    for (key, value) in params {
        match key.as_str() {
            "select" => {}
            "order" => order = Some(value),
            "limit" => limit = value.parse().ok(),
            _ => filters.push((key, value)),
        }
    }
    (filters, order, limit)
}

async fn rest_select(
    State(state): State<Arc<PlatformState>>,
    Path(collection): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Json<Vec<Value>> {
    let (filters, order, limit) = split_params(params);

    let mut rows: Vec<Value> = state
        .rows(&collection)
        .into_iter()
        .filter(|row| row_matches(row, &filters))
        .collect();

    if let Some(order) = order {
        let (column, descending) = match order.rsplit_once('.') {
            Some((column, "desc")) => (column.to_string(), true),
            Some((column, "asc")) => (column.to_string(), false),
            _ => (order, false),
        };
        rows.sort_by_key(|row| scalar(row.get(&column).unwrap_or(&Value::Null)));
        if descending {
            rows.reverse();
        }
    }

    if let Some(limit) = limit {
        rows.truncate(limit);
    }

    Json(rows)
}

async fn rest_insert(
    State(state): State<Arc<PlatformState>>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let row = state.insert_row(&collection, body);
    (StatusCode::CREATED, Json(vec![row]))
}

async fn rest_update(
    State(state): State<Arc<PlatformState>>,
    Path(collection): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    Json(patch): Json<Value>,
) -> impl IntoResponse {
    {
        let mut fail_patch = state.fail_patch.lock().unwrap();
        if fail_patch.as_deref() == Some(collection.as_str()) {
            *fail_patch = None;
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "simulated patch failure" })),
            )
                .into_response();
        }
    }

    let (filters, _, _) = split_params(params);
    let patch = patch.as_object().cloned().unwrap_or_default();

    let mut updated = Vec::new();
    {
        let mut rows = state.rows.lock().unwrap();
        if let Some(rows) = rows.get_mut(&collection) {
            for row in rows.iter_mut().filter(|row| row_matches(row, &filters)) {
                let obj = row.as_object_mut().expect("row must be an object");
                for (key, value) in &patch {
                    obj.insert(key.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }
    }

    (StatusCode::OK, Json(updated)).into_response()
}

async fn rest_delete(
    State(state): State<Arc<PlatformState>>,
    Path(collection): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Json<Vec<Value>> {
    let (filters, _, _) = split_params(params);
    let mut rows = state.rows.lock().unwrap();
    if let Some(rows) = rows.get_mut(&collection) {
        rows.retain(|row| !row_matches(row, &filters));
    }
    Json(Vec::new())
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("authorization")?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::to_string)
}

async fn auth_user(
    State(state): State<Arc<PlatformState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(token) = bearer(&headers) else {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "missing token" })))
            .into_response();
    };
    match state.sessions.lock().unwrap().get(&token) {
        Some((user_id, email)) => {
            Json(json!({ "id": user_id, "email": email })).into_response()
        }
        None => (StatusCode::UNAUTHORIZED, Json(json!({ "message": "invalid token" })))
            .into_response(),
    }
}

async fn auth_token(
    State(state): State<Arc<PlatformState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let email = body.get("email").and_then(Value::as_str).unwrap_or_default();
    let password = body
        .get("password")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let account = state.accounts.lock().unwrap().get(email).cloned();
    match account {
        Some((stored_password, user_id)) if stored_password == password => {
            let token = format!("tok-login-{}", state.next_seq());
            state
                .sessions
                .lock()
                .unwrap()
                .insert(token.clone(), (user_id.clone(), email.to_string()));
            Json(json!({
                "access_token": token,
                "token_type": "bearer",
                "user": { "id": user_id, "email": email },
            }))
            .into_response()
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error_description": "Invalid login credentials" })),
        )
            .into_response(),
    }
}

async fn auth_signup(
    State(state): State<Arc<PlatformState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let email = body.get("email").and_then(Value::as_str).unwrap_or_default();
    let password = body
        .get("password")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let metadata = body.get("data").cloned().unwrap_or_else(|| json!({}));

    let user_id = format!("user-{}", state.next_seq());
    state
        .accounts
        .lock()
        .unwrap()
        .insert(email.to_string(), (password.to_string(), user_id.clone()));
    state
        .user_emails
        .lock()
        .unwrap()
        .insert(user_id.clone(), email.to_string());

    // The platform provisions a pending profile alongside the account.
    state.insert_row(
        "profiles",
        json!({
            "user_id": user_id,
            "role": "pending",
            "is_admin": false,
            "email": email,
            "first_name": metadata.get("first_name").cloned().unwrap_or(Value::Null),
            "last_name": metadata.get("last_name").cloned().unwrap_or(Value::Null),
            "phone": metadata.get("phone").cloned().unwrap_or(Value::Null),
        }),
    );

    Json(json!({ "id": user_id, "email": email }))
}

async fn auth_admin_user(
    State(state): State<Arc<PlatformState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match state.user_emails.lock().unwrap().get(&user_id) {
        Some(email) => Json(json!({ "id": user_id, "email": email })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "User not found" })),
        )
            .into_response(),
    }
}

async fn send_email(
    State(state): State<Arc<PlatformState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if state.fail_mail.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "simulated outage" })),
        )
            .into_response();
    }

    state.sent_mail.lock().unwrap().push(SentMail {
        to: body.get("to").and_then(Value::as_str).unwrap_or_default().to_string(),
        subject: body
            .get("subject")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        html: body
            .get("html")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    });

    Json(json!({ "id": format!("email-{}", state.next_seq()) })).into_response()
}
