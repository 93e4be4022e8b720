//! HTTP surface of the marketplace. Pages and the JSON API sit behind the
//! role-gated guard; the two serverless-style handlers (`/functions/admin-users`
//! and `/hooks/offer-events`) validate their callers independently.

use crate::admin::{self, NewProperty};
use crate::approvals;
use crate::catalog::{self, FilterMode, SortMode};
use crate::deals;
use crate::errors::MarketError;
use crate::events::Signals;
use crate::guard::{self, CurrentUser};
use crate::mailer::Mailer;
use crate::models::{format_money, Offer, Property, Role};
use crate::notify::{self, NotifyOutcome, WebhookPayload};
use crate::offers;
use crate::session::SessionCookie;
use crate::settings::Settings;
use crate::store::Store;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Extension, Form, Json, Router};
use miette::IntoDiagnostic;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Store,
    pub mailer: Mailer,
    pub signals: Signals,
}

pub fn router(state: AppState) -> Router {
    let guarded = Router::new()
        .route("/dashboard", get(dashboard_page))
        .route("/offers", get(offers_page))
        .route("/admin", get(admin_page))
        .route("/api/me", get(me))
        .route("/api/events", get(change_events))
        .route("/api/properties", get(list_properties))
        .route("/api/properties/{id}", get(deal_sheet))
        .route(
            "/api/properties/{id}/save",
            post(save_property).delete(unsave_property),
        )
        .route(
            "/api/properties/{id}/offers",
            post(submit_offer).delete(withdraw_offer),
        )
        .route("/api/offers", get(my_offers))
        .route("/api/admin/console", get(admin_console))
        .route("/api/admin/properties", post(create_property))
        .route("/api/admin/properties/{id}", axum::routing::delete(delete_property))
        .route("/api/admin/properties/{id}/offers", get(property_offers))
        .route("/api/admin/offers/{id}/accept", post(accept_offer))
        .layer(middleware::from_fn_with_state(state.clone(), route_guard));

    Router::new()
        .route("/", get(|| async { Redirect::to("/dashboard") }))
        .route("/healthz", get(|| async { "ok" }))
        .route("/signup", get(signup_page).post(signup))
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
        // Privileged handlers: bearer / webhook auth, not the session guard.
        .route(
            "/functions/admin-users",
            get(admin_users_list).post(admin_users_approve),
        )
        .route("/hooks/offer-events", post(offer_events))
        .merge(guarded)
        .with_state(state)
}

pub async fn serve(
    settings: Settings,
    store: Store,
    mailer: Mailer,
) -> miette::Result<()> {
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .map_err(|e| miette::miette!("bad listen addr: {e}"))?;

    let state = AppState {
        settings: Arc::new(settings),
        store,
        mailer,
        signals: Signals::new(),
    };

    let app = router(state);

    tracing::info!(%addr, "Marketplace API listening");
    let listener = tokio::net::TcpListener::bind(addr).await.into_diagnostic()?;
    axum::serve(listener, app).await.into_diagnostic()?;
    Ok(())
}

// --- route guard -----------------------------------------------------------

/// Wraps every authenticated route: no session redirects to login, a pending
/// role always gets the approval screen, admin paths bounce non-admins back
/// to the dashboard. The role is resolved from the platform per request.
async fn route_guard(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let token = match session_token(request.headers()) {
        Some(token) => token,
        None => return login_redirect(&path).into_response(),
    };

    let user = match guard::resolve(&state.store, &token).await {
        Ok(user) => user,
        Err(MarketError::Unauthorized(_)) => return login_redirect(&path).into_response(),
        Err(err) => return err.into_response(),
    };

    if user.role == Role::Pending {
        return pending_screen(state.settings.guard.poll_interval_secs).into_response();
    }

    if (path.starts_with("/api/admin") || path == "/admin") && !user.is_admin() {
        return Redirect::to("/dashboard").into_response();
    }

    request.extensions_mut().insert(user);
    next.run(request).await
}

/// Session cookie first, Authorization bearer as the API fallback.
fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = SessionCookie::from_headers(headers) {
        return Some(cookie.access_token);
    }
    approvals::bearer_token(headers)
}

fn login_redirect(next: &str) -> Redirect {
    Redirect::to(&format!("/login?next={}", urlencoding::encode(next)))
}

/// Static approval-pending screen. The refresh interval is the poll: once an
/// admin flips the role, the next load falls through the guard.
fn pending_screen(poll_interval_secs: u64) -> Html<String> {
    Html(format!(
        r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8">
    <meta http-equiv="refresh" content="{poll_interval_secs}">
    <title>Pending approval</title>
  </head>
  <body>
    <p>Account status: Pending approval</p>
    <h1>Thanks — we received your request</h1>
    <p>Your account is currently pending review. Once approved, you'll get
    full access to browse deals and submit offers.</p>
    <ul>
      <li>We verify your buyer profile</li>
      <li>We approve access (role switches to "buyer")</li>
      <li>You'll be able to view properties immediately</li>
    </ul>
  </body>
</html>"#
    ))
}

// --- session ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SignupForm {
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    phone: String,
}

async fn signup(
    State(state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> Result<Json<serde_json::Value>, MarketError> {
    state
        .store
        .sign_up(
            form.email.trim(),
            &form.password,
            &json!({
                "first_name": form.first_name.trim(),
                "last_name": form.last_name.trim(),
                "phone": form.phone.trim(),
            }),
        )
        .await?;

    Ok(Json(json!({
        "message": "Account created. It is pending approval; sign in to check your status."
    })))
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    email: String,
    password: String,
    #[serde(default)]
    next: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, MarketError> {
    let session = state.store.sign_in(form.email.trim(), &form.password).await?;

    let cookie = SessionCookie::new(session.access_token);
    let target = form.next.as_deref().filter(|n| n.starts_with('/')).unwrap_or("/dashboard");

    let mut response = Redirect::to(target).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        cookie
            .to_cookie_header(&state.settings)
            .parse()
            .map_err(|_| MarketError::Other("invalid session cookie".to_string()))?,
    );
    Ok(response)
}

async fn logout() -> Response {
    let mut response = Redirect::to("/login").into_response();
    if let Ok(header_value) = SessionCookie::delete_cookie_header().parse() {
        response.headers_mut().insert(header::SET_COOKIE, header_value);
    }
    response
}

async fn me(Extension(user): Extension<CurrentUser>) -> Json<serde_json::Value> {
    Json(json!({
        "user_id": user.user_id,
        "email": user.email,
        "role": user.role,
    }))
}

// --- change signals --------------------------------------------------------

async fn change_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.signals.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|signal| {
        signal
            .ok()
            .map(|s| Ok(Event::default().event("change").data(s.as_str())))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// --- listing browser -------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct BrowseParams {
    #[serde(default)]
    sort: SortMode,
    #[serde(default)]
    filter: FilterMode,
}

#[derive(Debug, serde::Serialize)]
struct BrowseRow {
    #[serde(flatten)]
    property: Property,
    spread: i64,
    saved: bool,
}

async fn list_properties(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<BrowseParams>,
) -> Result<Json<serde_json::Value>, MarketError> {
    let credential = user.credential();
    let properties = catalog::fetch_properties(&state.store, credential).await?;
    let saved_ids = catalog::fetch_saved_ids(&state.store, credential, &user.user_id).await?;

    let rows: Vec<BrowseRow> = catalog::apply(properties, params.sort, params.filter, &saved_ids)
        .into_iter()
        .map(|property| BrowseRow {
            spread: property.spread(),
            saved: saved_ids.contains(&property.id),
            property,
        })
        .collect();

    Ok(Json(json!({ "count": rows.len(), "properties": rows })))
}

async fn deal_sheet(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(property_id): Path<String>,
) -> Result<Json<serde_json::Value>, MarketError> {
    let credential = user.credential();
    let property = catalog::fetch_property(&state.store, credential, &property_id).await?;
    let saved_ids = catalog::fetch_saved_ids(&state.store, credential, &user.user_id).await?;
    let my_offer = deals::my_offer(&state.store, credential, &user.user_id, &property_id).await?;

    let accepting = deals::offer_gate(&property, chrono::Utc::now()).is_ok();

    Ok(Json(json!({
        "property": property,
        "spread": property.spread(),
        "spread_display": format_money(property.spread()),
        "saved": saved_ids.contains(&property.id),
        "my_offer": my_offer,
        "accepting_offers": accepting,
    })))
}

// --- deal sheet actions ----------------------------------------------------

async fn save_property(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(property_id): Path<String>,
) -> Result<StatusCode, MarketError> {
    deals::save_property(
        &state.store,
        &state.signals,
        user.credential(),
        &user.user_id,
        &property_id,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unsave_property(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(property_id): Path<String>,
) -> Result<StatusCode, MarketError> {
    deals::unsave_property(
        &state.store,
        &state.signals,
        user.credential(),
        &user.user_id,
        &property_id,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct SubmitOfferBody {
    offer_price: i64,
    #[serde(default)]
    notes: Option<String>,
}

async fn submit_offer(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(property_id): Path<String>,
    Json(body): Json<SubmitOfferBody>,
) -> Result<Json<Offer>, MarketError> {
    let offer = deals::submit_offer(
        &state.store,
        &state.signals,
        user.credential(),
        &user.user_id,
        &property_id,
        body.offer_price,
        body.notes,
    )
    .await?;
    Ok(Json(offer))
}

async fn withdraw_offer(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(property_id): Path<String>,
) -> Result<StatusCode, MarketError> {
    deals::withdraw_offer(
        &state.store,
        &state.signals,
        user.credential(),
        &user.user_id,
        &property_id,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- buyer offers page -----------------------------------------------------

async fn my_offers(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, MarketError> {
    let rows =
        offers::fetch_my_offers(&state.store, user.credential(), &user.user_id).await?;
    let summary = offers::summarize(&rows);
    Ok(Json(json!({ "summary": summary, "offers": rows })))
}

// --- admin console ---------------------------------------------------------

async fn admin_console(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<admin::Console>, MarketError> {
    let console = admin::console(&state.store, user.credential()).await?;
    Ok(Json(console))
}

async fn create_property(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<NewProperty>,
) -> Result<(StatusCode, Json<Property>), MarketError> {
    let property = admin::create_property(&state.store, user.credential(), body).await?;
    Ok((StatusCode::CREATED, Json(property)))
}

async fn delete_property(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(property_id): Path<String>,
) -> Result<StatusCode, MarketError> {
    admin::delete_property(&state.store, user.credential(), &property_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn property_offers(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(property_id): Path<String>,
) -> Result<Json<Vec<Offer>>, MarketError> {
    let rows =
        admin::offers_for_property(&state.store, user.credential(), &property_id).await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
struct AcceptOfferBody {
    property_id: String,
}

async fn accept_offer(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(offer_id): Path<String>,
    Json(body): Json<AcceptOfferBody>,
) -> Result<Json<Offer>, MarketError> {
    let accepted = admin::accept_offer(
        &state.store,
        &state.signals,
        user.credential(),
        &body.property_id,
        &offer_id,
    )
    .await?;
    Ok(Json(accepted))
}

// --- privileged admin-users handler ----------------------------------------

async fn admin_users_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, MarketError> {
    approvals::authorize_admin(&state.store, &headers).await?;
    let users = approvals::list_pending(&state.store).await?;
    Ok(Json(json!({ "users": users })))
}

#[derive(Debug, Deserialize)]
struct ApproveBody {
    #[serde(default)]
    user_id: Option<String>,
}

async fn admin_users_approve(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ApproveBody>, axum::extract::rejection::JsonRejection>,
) -> Result<Json<approvals::ApprovalOutcome>, MarketError> {
    approvals::authorize_admin(&state.store, &headers).await?;

    let user_id = body
        .ok()
        .and_then(|Json(b)| b.user_id)
        .ok_or_else(|| MarketError::BadRequest("Missing body.user_id".to_string()))?;

    let outcome =
        approvals::approve(&state.store, &state.mailer, &state.signals, &user_id).await?;
    Ok(Json(outcome))
}

// --- offer-event webhook ---------------------------------------------------

async fn offer_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<WebhookPayload>,
) -> Result<Response, MarketError> {
    // The store signs webhook deliveries with a bearer token; reject bare
    // requests outright.
    if approvals::bearer_token(&headers).is_none() {
        return Err(MarketError::Unauthorized(
            "Missing Authorization header".to_string(),
        ));
    }

    let outcome = notify::handle(&state.store, &state.mailer, payload).await?;
    let body = match outcome {
        NotifyOutcome::Sent => "OK",
        NotifyOutcome::Ignored => "Ignored",
        NotifyOutcome::NoBuyerEmail => "No buyer email",
    };
    Ok((StatusCode::OK, body).into_response())
}

// --- pages -----------------------------------------------------------------
// Layout and styling are out of scope; these are bare shells so the guard's
// redirect targets resolve and pending users have somewhere to land. The
// data flows live under /api.

#[derive(Debug, Default, Deserialize)]
struct LoginPageParams {
    #[serde(default)]
    next: Option<String>,
}

async fn login_page(Query(params): Query<LoginPageParams>) -> Html<String> {
    let next = params.next.unwrap_or_else(|| "/dashboard".to_string());
    Html(format!(
        r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>Sign in</title></head>
  <body>
    <h1>Sign in</h1>
    <form method="post" action="/login">
      <input type="hidden" name="next" value="{next}">
      <label>Email <input type="email" name="email" required></label>
      <label>Password <input type="password" name="password" required></label>
      <button type="submit">Sign in</button>
    </form>
    <p><a href="/signup">Create account</a></p>
  </body>
</html>"#,
        next = next,
    ))
}

async fn signup_page() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>Create account</title></head>
  <body>
    <h1>Create account</h1>
    <p>Request access. All fields required.</p>
    <form method="post" action="/signup">
      <label>First name <input type="text" name="first_name" required></label>
      <label>Last name <input type="text" name="last_name" required></label>
      <label>Phone <input type="tel" name="phone" required></label>
      <label>Email <input type="email" name="email" required></label>
      <label>Password <input type="password" name="password" required minlength="8"></label>
      <button type="submit">Create account</button>
    </form>
    <p><a href="/login">Back to sign in</a></p>
  </body>
</html>"#,
    )
}

async fn dashboard_page() -> Html<&'static str> {
    Html("<h1>Browse Deals</h1><p>Map-first browsing with compact investor list view.</p>")
}

async fn offers_page() -> Html<&'static str> {
    Html("<h1>My Offers</h1><p>Track pending, accepted, and rejected offers.</p>")
}

async fn admin_page() -> Html<&'static str> {
    Html("<h1>Admin</h1><p>Manage properties and accept offers.</p>")
}
