//! Role resolution for the route guard.
//!
//! The session and role are re-derived from the platform on every request
//! rather than cached; a stale or client-asserted role is never trusted for
//! anything security-sensitive. Any failure reading the profile resolves to
//! `pending` (fail-closed).

use crate::errors::MarketError;
use crate::models::{Profile, Role};
use crate::store::{collections, Credential, Query, Store};

/// The caller of the current request, resolved fresh from the platform.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Role,
    pub access_token: String,
}

impl CurrentUser {
    pub fn credential(&self) -> Credential<'_> {
        Credential::User(&self.access_token)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Validate the token against the auth service, then read the caller's
/// profile for the role. An invalid token is `Unauthorized`; an unreadable or
/// missing profile resolves the role to [`Role::Pending`].
pub async fn resolve(store: &Store, access_token: &str) -> Result<CurrentUser, MarketError> {
    let user = store.auth_user(access_token).await?;

    let role = match store
        .select_one::<Profile>(
            Credential::User(access_token),
            Query::from(collections::PROFILES)
                .columns("user_id,role,is_admin,email,created_at")
                .eq("user_id", &user.id),
        )
        .await
    {
        Ok(Some(profile)) => profile.role,
        Ok(None) => Role::Pending,
        Err(err) => {
            tracing::warn!(user_id = %user.id, error = %err, "profile read failed; treating role as pending");
            Role::Pending
        }
    };

    Ok(CurrentUser {
        user_id: user.id,
        email: user.email,
        role,
        access_token: access_token.to_string(),
    })
}
