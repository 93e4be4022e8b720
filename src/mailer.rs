//! Transactional email client (Resend-style REST API). Every send in this
//! app is best-effort from the caller's point of view: the primary mutation
//! is already committed before any email goes out.

use crate::errors::MarketError;
use crate::settings::Mail;
use serde_json::json;

#[derive(Clone)]
pub struct Mailer {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    from: String,
    admin_to: String,
    app_base_url: Option<String>,
}

impl Mailer {
    pub fn new(mail: &Mail) -> Result<Self, MarketError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            api_base: mail.api_base.trim_end_matches('/').to_string(),
            api_key: mail.api_key.clone(),
            from: mail.from.clone(),
            admin_to: mail.admin_to.clone(),
            app_base_url: mail.app_base_url.clone(),
        })
    }

    /// The fixed address that receives new-offer alerts.
    pub fn admin_to(&self) -> &str {
        &self.admin_to
    }

    /// Link to the admin console for email bodies.
    pub fn admin_link(&self) -> String {
        match &self.app_base_url {
            Some(base) => format!("{}/admin", base.trim_end_matches('/')),
            None => "/admin".to_string(),
        }
    }

    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MarketError> {
        let response = self
            .http
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Mail {
                status: status.as_u16(),
                message: body,
            });
        }

        tracing::info!(%to, %subject, "email sent");
        Ok(())
    }
}
