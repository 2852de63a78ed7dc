use std::env;

use strum::{AsRefStr, EnumString};

/// Which payment provider adapter the pipeline is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    Flutterwave,
    #[strum(serialize = "pawapay")]
    PawaPay,
    Demo,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Forces the simulated gateway and router regardless of `provider`
    pub demo_mode: bool,
    pub provider: ProviderKind,
    pub currency: String,
    pub flw_secret_key: String,
    /// Expected `verif-hash` header value (None = unsigned webhooks accepted)
    pub flw_webhook_secret: Option<String>,
    pub flw_base_url: String,
    pub pawapay_api_token: String,
    pub pawapay_base_url: String,
    pub pawapay_webhook_secret: Option<String>,
    pub router_url: String,
    pub router_user: String,
    pub router_password: String,
    pub router_profile: String,
    pub provider_timeout_secs: u64,
    pub router_timeout_secs: u64,
    /// Tag prepended to every hotspot username
    pub username_prefix: String,
    /// Admin routes are only mounted when this is set
    pub admin_api_key: Option<String>,
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let demo_mode = env::var("DEMO_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let provider = env::var("PAYMENT_PROVIDER")
            .ok()
            .and_then(|p| p.parse::<ProviderKind>().ok())
            .unwrap_or(ProviderKind::Flutterwave);

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_or("PORT", 3000),
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "fastnet.db".to_string()),
            demo_mode,
            provider: if demo_mode { ProviderKind::Demo } else { provider },
            currency: env::var("CURRENCY").unwrap_or_else(|_| "UGX".to_string()),
            flw_secret_key: env::var("FLW_SECRET_KEY").unwrap_or_default(),
            flw_webhook_secret: non_empty("FLW_WEBHOOK_SECRET"),
            flw_base_url: env::var("FLW_BASE_URL")
                .unwrap_or_else(|_| "https://api.flutterwave.com".to_string()),
            pawapay_api_token: env::var("PAWAPAY_API_TOKEN").unwrap_or_default(),
            pawapay_base_url: env::var("PAWAPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.sandbox.pawapay.io".to_string()),
            pawapay_webhook_secret: non_empty("PAWAPAY_WEBHOOK_SECRET"),
            router_url: env::var("ROUTER_URL")
                .unwrap_or_else(|_| "http://192.168.88.1".to_string()),
            router_user: env::var("ROUTER_USER").unwrap_or_else(|_| "admin".to_string()),
            router_password: env::var("ROUTER_PASSWORD").unwrap_or_default(),
            router_profile: env::var("ROUTER_PROFILE").unwrap_or_else(|_| "default".to_string()),
            provider_timeout_secs: parse_or("PROVIDER_TIMEOUT_SECS", 15),
            router_timeout_secs: parse_or("ROUTER_TIMEOUT_SECS", 10),
            username_prefix: env::var("USERNAME_PREFIX").unwrap_or_else(|_| "FASTNET".to_string()),
            admin_api_key: non_empty("ADMIN_API_KEY"),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Secret the active provider signs its webhooks with, if any.
    pub fn webhook_secret(&self) -> Option<&str> {
        match self.provider {
            ProviderKind::Flutterwave | ProviderKind::Demo => self.flw_webhook_secret.as_deref(),
            ProviderKind::PawaPay => self.pawapay_webhook_secret.as_deref(),
        }
    }
}
