//! Client for the hosted data/auth platform.
//!
//! Every row this application touches lives in the platform's collections;
//! nothing is cached or owned locally. The query surface is deliberately
//! narrow: select columns by name from a named collection with `eq` / `neq` /
//! `in` filters and timestamp ordering, plus insert/update/delete with the
//! same filters. Row-level security is the platform's job: user-scoped
//! requests carry the caller's access token, privileged handlers use the
//! service role key.

use crate::errors::MarketError;
use crate::settings::Platform;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod collections {
    pub const PROPERTIES: &str = "properties";
    pub const OFFERS: &str = "offers";
    pub const PROFILES: &str = "profiles";
    pub const SAVED_PROPERTIES: &str = "saved_properties";
    /// Derived read-only view: pending offers per property.
    pub const PROPERTY_OFFER_COUNTS: &str = "property_offer_counts";
}

/// Who a request acts as. `User` carries a session access token and is
/// subject to row-level security; `Service` bypasses it.
#[derive(Debug, Clone, Copy)]
pub enum Credential<'a> {
    User(&'a str),
    Service,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignedInSession {
    pub access_token: String,
    pub user: AuthUser,
}

/// A filtered read against one collection.
#[derive(Debug, Clone)]
pub struct Query {
    collection: &'static str,
    columns: String,
    filters: Vec<(String, String)>,
    order: Option<String>,
    limit: Option<u32>,
}

impl Query {
    pub fn from(collection: &'static str) -> Self {
        Self {
            collection,
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn columns(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    pub fn neq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("neq.{}", value.to_string())));
        self
    }

    pub fn is_in(mut self, column: &str, values: &[&str]) -> Self {
        self.filters
            .push((column.to_string(), format!("in.({})", values.join(","))));
        self
    }

    pub fn order_asc(mut self, column: &str) -> Self {
        self.order = Some(format!("{column}.asc"));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order = Some(format!("{column}.desc"));
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.columns.clone())];
        params.extend(self.filters.iter().cloned());
        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

/// Filters for writes (update/delete), same operators as [`Query`].
#[derive(Debug, Clone, Default)]
pub struct Match {
    filters: Vec<(String, String)>,
}

impl Match {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    pub fn neq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("neq.{}", value.to_string())));
        self
    }
}

#[derive(Clone)]
pub struct Store {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl Store {
    pub fn new(platform: &Platform) -> Result<Self, MarketError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: platform.url.trim_end_matches('/').to_string(),
            anon_key: platform.anon_key.clone(),
            service_role_key: platform.service_role_key.clone(),
        })
    }

    fn rest_url(&self, collection: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection)
    }

    fn apply_credential(
        &self,
        req: reqwest::RequestBuilder,
        credential: Credential<'_>,
    ) -> reqwest::RequestBuilder {
        match credential {
            Credential::User(token) => req
                .header("apikey", &self.anon_key)
                .bearer_auth(token),
            Credential::Service => req
                .header("apikey", &self.service_role_key)
                .bearer_auth(&self.service_role_key),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, MarketError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        // The platform reports errors as {"message": "..."}; fall back to the
        // raw body when it doesn't.
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.get("error"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or(body);
        Err(MarketError::Store {
            status: status.as_u16(),
            message,
        })
    }

    /// Select rows matching the query.
    pub async fn select<T: DeserializeOwned>(
        &self,
        credential: Credential<'_>,
        query: Query,
    ) -> Result<Vec<T>, MarketError> {
        let req = self
            .http
            .get(self.rest_url(query.collection))
            .query(&query.params());
        let response = self.apply_credential(req, credential).send().await?;
        let rows = Self::check(response).await?.json::<Vec<T>>().await?;
        Ok(rows)
    }

    /// Select at most one row.
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        credential: Credential<'_>,
        query: Query,
    ) -> Result<Option<T>, MarketError> {
        let mut rows = self.select::<T>(credential, query.limit(1)).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    /// Insert one row and return the stored representation.
    pub async fn insert<T: DeserializeOwned>(
        &self,
        credential: Credential<'_>,
        collection: &'static str,
        row: &impl Serialize,
    ) -> Result<T, MarketError> {
        let req = self
            .http
            .post(self.rest_url(collection))
            .header("Prefer", "return=representation")
            .json(row);
        let response = self.apply_credential(req, credential).send().await?;
        let mut rows = Self::check(response).await?.json::<Vec<T>>().await?;
        if rows.is_empty() {
            return Err(MarketError::Store {
                status: 500,
                message: format!("insert into {collection} returned no representation"),
            });
        }
        Ok(rows.remove(0))
    }

    /// Update rows matching the filters and return the updated rows.
    pub async fn update<T: DeserializeOwned>(
        &self,
        credential: Credential<'_>,
        collection: &'static str,
        matcher: Match,
        patch: &impl Serialize,
    ) -> Result<Vec<T>, MarketError> {
        let req = self
            .http
            .patch(self.rest_url(collection))
            .query(&matcher.filters)
            .header("Prefer", "return=representation")
            .json(patch);
        let response = self.apply_credential(req, credential).send().await?;
        let rows = Self::check(response).await?.json::<Vec<T>>().await?;
        Ok(rows)
    }

    /// Delete rows matching the filters.
    pub async fn delete(
        &self,
        credential: Credential<'_>,
        collection: &'static str,
        matcher: Match,
    ) -> Result<(), MarketError> {
        let req = self
            .http
            .delete(self.rest_url(collection))
            .query(&matcher.filters);
        let response = self.apply_credential(req, credential).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    // --- auth service ---

    /// Resolve the user behind a session access token. Invalid tokens come
    /// back as `Unauthorized`.
    pub async fn auth_user(&self, access_token: &str) -> Result<AuthUser, MarketError> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MarketError::Unauthorized("Invalid session".to_string()));
        }
        Ok(response.json::<AuthUser>().await?)
    }

    /// Password sign-in against the platform's auth service.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignedInSession, MarketError> {
        let response = self
            .http
            .post(format!(
                "{}/auth/v1/token?grant_type=password",
                self.base_url
            ))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MarketError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        }
        Ok(response.json::<SignedInSession>().await?)
    }

    /// Create an account with profile metadata. The platform provisions the
    /// matching `profiles` row with role `pending`.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &Value,
    ) -> Result<(), MarketError> {
        let response = self
            .http
            .post(format!("{}/auth/v1/signup", self.base_url))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Look up a user's email through the privileged admin API. Returns the
    /// raw result; callers treat failures as best-effort.
    pub async fn admin_user_email(&self, user_id: &str) -> Result<Option<String>, MarketError> {
        let response = self
            .http
            .get(format!("{}/auth/v1/admin/users/{}", self.base_url, user_id))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .send()
            .await?;
        let body = Self::check(response).await?.json::<Value>().await?;
        // The auth service returns the bare user object; tolerate a wrapped
        // {"user": {...}} shape as well.
        let user = body.get("user").unwrap_or(&body);
        Ok(user
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}
