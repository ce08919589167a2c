//! Configuration management for Cognify
//!
//! Settings live in `~/.cognify/config.toml`. Secrets can also come from the
//! environment, which takes precedence over the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;
use crate::types::BillingPeriod;

const MB: u64 = 1024 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Frontend origin used in checkout/portal return URLs
    pub app_url: String,
    /// Public origin of this service, used for storage URLs
    pub public_base_url: String,
    /// SQLite database and object storage live here
    pub data_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            app_url: "http://localhost:3000".to_string(),
            public_base_url: "http://localhost:8080".to_string(),
            data_dir: "~/.cognify/data".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Limits
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LimitsConfig {
    /// Max PDF size for signed-in uploads
    pub upload_max_bytes: u64,
    /// Max PDF size for the anonymous trial
    pub trial_max_bytes: u64,
    /// Extracted PDF text is cut to this many words
    pub pdf_max_words: usize,
    /// Pages beyond this are not read
    pub pdf_max_pages: usize,
    /// Trial sources with less text than this are rejected
    pub trial_min_text_chars: usize,
    pub trial_requests_per_window: u32,
    pub trial_window_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            upload_max_bytes: 10 * MB,
            trial_max_bytes: 5 * MB,
            pdf_max_words: 20_000,
            pdf_max_pages: 200,
            trial_min_text_chars: 100,
            trial_requests_per_window: 3,
            trial_window_secs: 60 * 60,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub tts_model: String,
    pub voice: String,
    pub quiz_questions: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            tts_model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            quiz_questions: 5,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Supabase Auth
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SupabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub anon_key: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Stripe
// ─────────────────────────────────────────────────────────────────────────────

/// Which Stripe key set is active
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StripeMode {
    #[default]
    Test,
    Live,
}

impl StripeMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Live => "live",
        }
    }
}

/// Keys and prices for one Stripe mode
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StripeKeys {
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub webhook_secret: String,
    #[serde(default)]
    pub price_monthly: String,
    #[serde(default)]
    pub price_yearly: String,
    #[serde(default)]
    pub price_lifetime: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StripeConfig {
    #[serde(default)]
    pub mode: StripeMode,
    pub api_base: String,
    /// Max age of a signed webhook timestamp
    pub webhook_tolerance_secs: u64,
    #[serde(default)]
    pub test: StripeKeys,
    #[serde(default)]
    pub live: StripeKeys,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            mode: StripeMode::default(),
            api_base: "https://api.stripe.com/v1".to_string(),
            webhook_tolerance_secs: 300,
            test: StripeKeys::default(),
            live: StripeKeys::default(),
        }
    }
}

impl StripeConfig {
    /// Keys for the active mode
    pub fn keys(&self) -> &StripeKeys {
        match self.mode {
            StripeMode::Test => &self.test,
            StripeMode::Live => &self.live,
        }
    }

    fn keys_mut(&mut self, mode: StripeMode) -> &mut StripeKeys {
        match mode {
            StripeMode::Test => &mut self.test,
            StripeMode::Live => &mut self.live,
        }
    }

    /// Price id for a billing period in the active mode
    pub fn price_id(&self, period: BillingPeriod) -> Result<&str, Error> {
        let keys = self.keys();
        let price = match period {
            BillingPeriod::Monthly => &keys.price_monthly,
            BillingPeriod::Yearly => &keys.price_yearly,
            BillingPeriod::Lifetime => &keys.price_lifetime,
        };
        if price.is_empty() {
            return Err(Error::Config(format!(
                "Price ID for {} plan is not configured for {} mode",
                period.as_str(),
                self.mode.name()
            )));
        }
        Ok(price)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Cognify configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub supabase: SupabaseConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
}

impl Config {
    /// Get the config file path (~/.cognify/config.toml)
    pub fn path() -> Result<PathBuf> {
        Ok(cognify_dir()?.join("config.toml"))
    }

    /// Check if config exists
    pub fn exists() -> bool {
        Self::path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Load config from disk, or return None if it doesn't exist
    pub fn load() -> Result<Option<Self>> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .context("Failed to parse config file")?;
        Ok(Some(config))
    }

    /// Config file (or defaults) with environment overrides applied
    pub fn load_effective() -> Result<Self> {
        let mut config = Self::load()?.unwrap_or_default();
        config.apply_env();
        Ok(config)
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        std::fs::write(&path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Apply overrides from process environment variables
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&str]| -> Option<String> {
            keys.iter()
                .filter_map(|k| lookup(k))
                .find(|v| !v.trim().is_empty())
        };

        if let Some(v) = get(&["OPENAI_API_KEY"]) {
            self.openai.api_key = v;
        }
        if let Some(v) = get(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]) {
            self.supabase.url = v;
        }
        if let Some(v) = get(&["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"]) {
            self.supabase.anon_key = v;
        }
        if let Some(v) = get(&["APP_URL", "NEXT_PUBLIC_APP_URL"]) {
            self.server.app_url = v;
        }
        if let Some(v) = get(&["COGNIFY_PUBLIC_URL"]) {
            self.server.public_base_url = v;
        }
        if let Some(v) = get(&["COGNIFY_DATA_DIR"]) {
            self.server.data_dir = v;
        }
        if let Some(v) = get(&["STRIPE_MODE"]) {
            self.stripe.mode = if v.eq_ignore_ascii_case("live") {
                StripeMode::Live
            } else {
                StripeMode::Test
            };
        }

        for mode in [StripeMode::Test, StripeMode::Live] {
            let suffix = mode.name().to_uppercase();
            let keys = self.stripe.keys_mut(mode);
            let fields: [(&str, &mut String); 5] = [
                ("STRIPE_SECRET_KEY", &mut keys.secret_key),
                ("STRIPE_WEBHOOK_SECRET", &mut keys.webhook_secret),
                ("STRIPE_PRICE_MONTHLY", &mut keys.price_monthly),
                ("STRIPE_PRICE_YEARLY", &mut keys.price_yearly),
                ("STRIPE_PRICE_LIFETIME", &mut keys.price_lifetime),
            ];
            for (prefix, field) in fields {
                if let Some(v) = get(&[&format!("{}_{}", prefix, suffix)]) {
                    *field = v;
                }
            }
        }
    }

    /// Data directory with `~` expanded
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.server.data_dir))
    }

    /// SQLite database location
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("cognify.db")
    }

    /// Object storage root
    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir().join("storage")
    }
}

/// Get the base cognify directory path (~/.cognify)
pub fn cognify_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".cognify"))
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.limits.upload_max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.limits.trial_max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.limits.trial_requests_per_window, 3);
        assert_eq!(config.limits.trial_window_secs, 3600);
        assert_eq!(config.openai.chat_model, "gpt-4o-mini");
        assert_eq!(config.stripe.mode, StripeMode::Test);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.stripe.live.price_yearly = "price_y".to_string();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("[server]\nhost = \"127.0.0.1\"\nport = 9000\napp_url = \"https://cognify.app\"\npublic_base_url = \"https://api.cognify.app\"\ndata_dir = \"/var/lib/cognify\"\n").unwrap();
        assert_eq!(parsed.server.port, 9000);
        assert_eq!(parsed.limits, LimitsConfig::default());
        assert_eq!(parsed.openai, OpenAiConfig::default());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::default();
        config.openai.api_key = "from-file".to_string();

        config.apply_overrides(lookup_from(&[
            ("OPENAI_API_KEY", "from-env"),
            ("NEXT_PUBLIC_SUPABASE_URL", "https://proj.supabase.co"),
            ("STRIPE_MODE", "live"),
            ("STRIPE_SECRET_KEY_LIVE", "sk_live_1"),
            ("STRIPE_PRICE_MONTHLY_TEST", "price_test_m"),
        ]));

        assert_eq!(config.openai.api_key, "from-env");
        assert_eq!(config.supabase.url, "https://proj.supabase.co");
        assert_eq!(config.stripe.mode, StripeMode::Live);
        assert_eq!(config.stripe.live.secret_key, "sk_live_1");
        assert_eq!(config.stripe.test.price_monthly, "price_test_m");
        assert_eq!(config.stripe.keys().secret_key, "sk_live_1");
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = Config::default();
        config.openai.api_key = "keep".to_string();
        config.apply_overrides(lookup_from(&[("OPENAI_API_KEY", "  ")]));
        assert_eq!(config.openai.api_key, "keep");
    }

    #[test]
    fn test_price_id_lookup() {
        let mut stripe = StripeConfig::default();
        stripe.test.price_monthly = "price_m".to_string();

        assert_eq!(stripe.price_id(BillingPeriod::Monthly).unwrap(), "price_m");

        let err = stripe.price_id(BillingPeriod::Lifetime).unwrap_err();
        assert!(err.to_string().contains("lifetime"));
        assert!(err.to_string().contains("test"));
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/srv/data"), "/srv/data");
    }
}
