use std::env;

use crate::scan::ScanKey;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    /// Secret key for the payment gateway API (also signs its webhooks).
    pub gateway_secret_key: String,
    /// Shared secret for signing ticket scan credentials.
    pub scan_key: ScanKey,
    /// Optional webhook URL for buyer notifications (fire-and-forget),
    /// set via BOXOFFICE_NOTIFY_WEBHOOK_URL.
    pub notify_webhook_url: Option<String>,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("BOXOFFICE_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let gateway_secret_key = env::var("GATEWAY_SECRET_KEY").unwrap_or_else(|_| {
            if dev_mode {
                "sk_test_placeholder".to_string()
            } else {
                panic!("GATEWAY_SECRET_KEY must be set outside dev mode")
            }
        });

        let scan_key = match env::var("SCAN_SECRET") {
            Ok(encoded) => ScanKey::from_base64(&encoded)
                .expect("SCAN_SECRET must be a base64-encoded 32-byte key"),
            Err(_) if dev_mode => {
                tracing::warn!("SCAN_SECRET not set, generating ephemeral dev key");
                ScanKey::generate()
            }
            Err(_) => panic!("SCAN_SECRET must be set outside dev mode"),
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "boxoffice.db".to_string()),
            base_url,
            gateway_secret_key,
            scan_key,
            notify_webhook_url: env::var("BOXOFFICE_NOTIFY_WEBHOOK_URL").ok(),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
