//! Spins up the real router against the mock platform for end-to-end tests.

use super::platform::MockPlatform;
use dealflow::events::Signals;
use dealflow::mailer::Mailer;
use dealflow::settings::Settings;
use dealflow::store::Store;
use dealflow::web::{router, AppState};
use std::sync::Arc;

pub struct TestApp {
    pub base_url: String,
    pub platform: MockPlatform,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let platform = MockPlatform::spawn().await;

        let mut settings = Settings::default();
        settings.platform.url = platform.base_url.clone();
        settings.platform.anon_key = "anon-test".to_string();
        settings.platform.service_role_key = "service-test".to_string();
        settings.mail.api_base = platform.base_url.clone();
        settings.mail.api_key = "re_test".to_string();
        settings.mail.admin_to = "admin@example.com".to_string();
        settings.mail.app_base_url = Some("https://deals.example.com".to_string());
        settings.guard.poll_interval_secs = 1;

        let store = Store::new(&settings.platform).expect("store client");
        let mailer = Mailer::new(&settings.mail).expect("mailer client");
        let state = AppState {
            settings: Arc::new(settings),
            store,
            mailer,
            signals: Signals::new(),
        };

        let app = router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind app");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("app server");
        });

        // Redirects stay observable; tests assert on Location headers.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("test client");

        Self {
            base_url: format!("http://{addr}"),
            platform,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register an account + session + buyer profile; returns the token.
    pub fn seed_buyer(&self, user_id: &str, email: &str) -> String {
        let token = self.platform.state.add_user(user_id, email, "password123");
        self.platform.state.seed_profile(user_id, "buyer", false, email);
        token
    }

    /// Register an account + session + admin profile; returns the token.
    pub fn seed_admin(&self, user_id: &str, email: &str) -> String {
        let token = self.platform.state.add_user(user_id, email, "password123");
        self.platform.state.seed_profile(user_id, "admin", true, email);
        token
    }

    /// Register an account + session with a profile still pending approval.
    pub fn seed_pending(&self, user_id: &str, email: &str) -> String {
        let token = self.platform.state.add_user(user_id, email, "password123");
        self.platform.state.seed_profile(user_id, "pending", false, email);
        token
    }
}
