//! The privileged admin-users handler: list pending signups and approve
//! them. Mirrors a serverless function: it authenticates a bearer token on
//! every call and re-resolves the caller's admin flag server-side through
//! the service role, never trusting anything the client asserts.

use crate::errors::MarketError;
use crate::events::{Signal, Signals};
use crate::mailer::Mailer;
use crate::models::Profile;
use crate::store::{collections, Credential, Match, Query, Store};
use axum::http::HeaderMap;
use serde::Serialize;
use serde_json::json;

const PROFILE_COLUMNS: &str = "user_id,email,first_name,last_name,phone,role,is_admin,created_at";

/// Pull `Bearer <token>` out of the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Validate the caller: 401 without a valid session token, 403 unless the
/// service-role read of their own profile carries the admin flag.
pub async fn authorize_admin(store: &Store, headers: &HeaderMap) -> Result<String, MarketError> {
    let token = bearer_token(headers).ok_or_else(|| {
        MarketError::Unauthorized("Missing Authorization Bearer token".to_string())
    })?;

    let user = store.auth_user(&token).await?;

    let me = store
        .select_one::<Profile>(
            Credential::Service,
            Query::from(collections::PROFILES)
                .columns(PROFILE_COLUMNS)
                .eq("user_id", &user.id),
        )
        .await?;

    match me {
        Some(profile) if profile.is_admin => Ok(user.id),
        _ => Err(MarketError::Forbidden("Forbidden".to_string())),
    }
}

/// Profiles still waiting for approval, oldest first.
pub async fn list_pending(store: &Store) -> Result<Vec<Profile>, MarketError> {
    store
        .select::<Profile>(
            Credential::Service,
            Query::from(collections::PROFILES)
                .columns(PROFILE_COLUMNS)
                .eq("role", "pending")
                .order_asc("created_at"),
        )
        .await
}

#[derive(Debug, Serialize)]
pub struct ApprovalOutcome {
    pub approved: Profile,
    pub email_sent: bool,
    pub email_error: Option<String>,
}

/// Flip one profile from `pending` to `buyer`, then try to send the
/// approval email. Email failure is reported alongside the result and never
/// rolls the approval back.
pub async fn approve(
    store: &Store,
    mailer: &Mailer,
    signals: &Signals,
    user_id: &str,
) -> Result<ApprovalOutcome, MarketError> {
    let mut updated = store
        .update::<Profile>(
            Credential::Service,
            collections::PROFILES,
            Match::new().eq("user_id", user_id),
            &json!({ "role": "buyer" }),
        )
        .await?;
    if updated.is_empty() {
        return Err(MarketError::NotFound(format!("Profile not found: {user_id}")));
    }
    let approved = updated.remove(0);
    tracing::info!(%user_id, "profile approved; role pending -> buyer");
    signals.notify(Signal::UsersChanged);

    let (email_sent, email_error) = match &approved.email {
        Some(email) => {
            let subject = "Your buyer account has been approved";
            let html = approval_email_html(&approved, &mailer.admin_link());
            match mailer.send(email, subject, &html).await {
                Ok(()) => (true, None),
                Err(err) => {
                    tracing::warn!(%user_id, error = %err, "approval email failed");
                    (false, Some(err.to_string()))
                }
            }
        }
        None => (false, Some("no email on profile".to_string())),
    };

    Ok(ApprovalOutcome {
        approved,
        email_sent,
        email_error,
    })
}

fn approval_email_html(profile: &Profile, dashboard_link: &str) -> String {
    format!(
        r#"<div style="font-family: ui-sans-serif, system-ui; line-height: 1.45;">
  <h2 style="margin:0 0 8px;">You're approved</h2>
  <div style="color:#444; margin-bottom:14px;">Hi {name},</div>
  <p>Your buyer account has been approved. You can now browse deals and submit offers.</p>
  <div style="margin-top:16px;">
    <a href="{link}">Open the app</a>
  </div>
</div>"#,
        name = profile.display_name(),
        link = dashboard_link,
    )
}
