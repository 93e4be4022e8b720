use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub server: Server,
    pub platform: Platform,
    pub mail: Mail,
    pub guard: Guard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
    /// If set, this is used as the public base URL, e.g., https://deals.example.com
    pub public_base_url: Option<String>,
}

/// Connection details for the hosted data/auth platform. The app never owns
/// storage; every row lives behind these endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Platform {
    /// Base URL of the platform, e.g. https://xyzcompany.supabase.co
    pub url: String,
    /// Publishable key used for user-scoped requests (row-level security applies)
    pub anon_key: String,
    /// Privileged key used by the serverless-style handlers (bypasses RLS)
    pub service_role_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mail {
    /// Base URL of the transactional email provider
    pub api_base: String,
    pub api_key: String,
    /// Sender, e.g. "RHD Wholesale <onboarding@resend.dev>"
    pub from: String,
    /// Fixed address that receives new-offer alerts
    pub admin_to: String,
    /// Optional public app URL used for links inside emails
    pub app_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guard {
    /// Refresh interval (seconds) of the approval-pending screen
    pub poll_interval_secs: u64,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_base_url: None,
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            service_role_key: String::new(),
        }
    }
}

impl Default for Mail {
    fn default() -> Self {
        Self {
            api_base: "https://api.resend.com".to_string(),
            api_key: String::new(),
            from: "Dealflow <onboarding@resend.dev>".to_string(),
            admin_to: "admin@example.com".to_string(),
            app_base_url: None,
        }
    }
}

impl Default for Guard {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("server.host", Server::default().host)
            .into_diagnostic()?
            .set_default("server.port", Server::default().port)
            .into_diagnostic()?
            .set_default("platform.url", Platform::default().url)
            .into_diagnostic()?
            .set_default("platform.anon_key", Platform::default().anon_key)
            .into_diagnostic()?
            .set_default(
                "platform.service_role_key",
                Platform::default().service_role_key,
            )
            .into_diagnostic()?
            .set_default("mail.api_base", Mail::default().api_base)
            .into_diagnostic()?
            .set_default("mail.api_key", Mail::default().api_key)
            .into_diagnostic()?
            .set_default("mail.from", Mail::default().from)
            .into_diagnostic()?
            .set_default("mail.admin_to", Mail::default().admin_to)
            .into_diagnostic()?
            .set_default(
                "guard.poll_interval_secs",
                Guard::default().poll_interval_secs,
            )
            .into_diagnostic()?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: DEALFLOW__SERVER__PORT=9090, etc.
        builder = builder.add_source(config::Environment::with_prefix("DEALFLOW").separator("__"));

        let cfg = builder.build().into_diagnostic()?;
        let s: Settings = cfg.try_deserialize().into_diagnostic()?;
        Ok(s)
    }

    pub fn base_url(&self) -> String {
        if let Some(base) = &self.server.public_base_url {
            base.trim_end_matches('/').to_string()
        } else {
            format!("http://{}:{}", self.server.host, self.server.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_settings_load_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nonexistent.toml");

        let settings =
            Settings::load(config_path.to_str().unwrap()).expect("Failed to load settings");

        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.platform.url, "http://localhost:54321");
        assert_eq!(settings.mail.api_base, "https://api.resend.com");
        assert_eq!(settings.guard.poll_interval_secs, 5);
    }

    #[test]
    fn test_settings_load_from_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        let config_content = r#"
[server]
host = "127.0.0.1"
port = 9090
public_base_url = "https://deals.example.com"

[platform]
url = "https://xyzcompany.supabase.co"
anon_key = "anon-123"
service_role_key = "service-456"

[mail]
api_key = "re_test"
admin_to = "offers@example.com"
"#;
        fs::write(&config_path, config_content).expect("Failed to write config");

        let settings =
            Settings::load(config_path.to_str().unwrap()).expect("Failed to load settings");

        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.platform.url, "https://xyzcompany.supabase.co");
        assert_eq!(settings.platform.anon_key, "anon-123");
        assert_eq!(settings.platform.service_role_key, "service-456");
        assert_eq!(settings.mail.admin_to, "offers@example.com");
    }

    #[test]
    fn test_settings_env_override() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        let config_content = r#"
[server]
host = "127.0.0.1"
port = 8080
"#;
        fs::write(&config_path, config_content).expect("Failed to write config");

        env::set_var("DEALFLOW__SERVER__PORT", "9999");
        env::set_var("DEALFLOW__PLATFORM__ANON_KEY", "from-env");

        let settings =
            Settings::load(config_path.to_str().unwrap()).expect("Failed to load settings");

        assert_eq!(settings.server.port, 9999);
        assert_eq!(settings.platform.anon_key, "from-env");

        env::remove_var("DEALFLOW__SERVER__PORT");
        env::remove_var("DEALFLOW__PLATFORM__ANON_KEY");
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let mut settings = Settings::default();
        settings.server.public_base_url = Some("https://deals.example.com/".to_string());

        assert_eq!(settings.base_url(), "https://deals.example.com");
    }

    #[test]
    fn test_base_url_fallback() {
        let mut settings = Settings::default();
        settings.server.host = "localhost".to_string();
        settings.server.port = 3000;

        assert_eq!(settings.base_url(), "http://localhost:3000");
    }
}
