use service_core::config as core_config;
use service_core::config::get_env;
use service_core::error::AppError;

/// Default model for standard packages.
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Default model for the premium package.
const DEFAULT_PREMIUM_MODEL: &str = "openai/gpt-oss-120b";

/// Package name that unlocks the premium model.
const DEFAULT_PREMIUM_PACKAGE: &str = "Pro AI";

/// How many recent turns are replayed as conversation context.
const DEFAULT_CONTEXT_WINDOW: usize = 6;

const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Upstream completion call timeout in seconds.
const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 12;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub common: core_config::Config,
    pub repository: RepositoryConfig,
    pub completion: CompletionConfig,
    pub models: ModelConfig,
    pub notifier: NotifierConfig,
}

/// Tenant repository (PostgREST-style REST API) connection settings.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub base_url: String,
    pub service_key: String,
}

#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_base: String,
    /// Upstream API credentials; requests rotate uniformly over this set.
    pub api_keys: Vec<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
}

/// Model-tier mapping and context window.
///
/// Both the mapping and the window size are deliberately configuration
/// values rather than hardcoded constants.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub default_model: String,
    pub premium_model: String,
    pub premium_package: String,
    pub context_window: usize,
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub bot_token: String,
    pub lead_keywords: Vec<String>,
}

impl GatewayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = core_config::is_prod();

        let api_keys: Vec<String> = get_env("COMPLETION_API_KEYS", Some("test-key-1"), is_prod)?
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();

        // Fail fast here rather than on the first request.
        if api_keys.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "COMPLETION_API_KEYS must contain at least one credential"
            )));
        }

        // Optional override; the built-in bilingual list applies otherwise.
        let lead_keywords = match std::env::var("LEAD_KEYWORDS") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect(),
            _ => crate::services::notifier::default_lead_keywords(),
        };

        Ok(GatewayConfig {
            common: common_config,
            repository: RepositoryConfig {
                base_url: get_env("TENANT_REPO_URL", Some("http://localhost:54321"), is_prod)?,
                service_key: get_env("TENANT_REPO_SERVICE_KEY", Some("dev-service-key"), is_prod)?,
            },
            completion: CompletionConfig {
                api_base: get_env(
                    "COMPLETION_API_BASE",
                    Some("https://api.groq.com/openai/v1"),
                    is_prod,
                )?,
                api_keys,
                timeout_secs: get_env(
                    "COMPLETION_TIMEOUT_SECS",
                    Some(&DEFAULT_COMPLETION_TIMEOUT_SECS.to_string()),
                    is_prod,
                )?
                .parse()
                .unwrap_or(DEFAULT_COMPLETION_TIMEOUT_SECS),
                temperature: get_env(
                    "CHAT_TEMPERATURE",
                    Some(&DEFAULT_TEMPERATURE.to_string()),
                    is_prod,
                )?
                .parse()
                .unwrap_or(DEFAULT_TEMPERATURE),
            },
            models: ModelConfig {
                default_model: get_env("CHAT_DEFAULT_MODEL", Some(DEFAULT_MODEL), is_prod)?,
                premium_model: get_env("CHAT_PREMIUM_MODEL", Some(DEFAULT_PREMIUM_MODEL), is_prod)?,
                premium_package: get_env(
                    "CHAT_PREMIUM_PACKAGE",
                    Some(DEFAULT_PREMIUM_PACKAGE),
                    is_prod,
                )?,
                context_window: get_env(
                    "CHAT_CONTEXT_WINDOW",
                    Some(&DEFAULT_CONTEXT_WINDOW.to_string()),
                    is_prod,
                )?
                .parse()
                .unwrap_or(DEFAULT_CONTEXT_WINDOW),
            },
            notifier: NotifierConfig {
                bot_token: get_env("NOTIFIER_BOT_TOKEN", Some("dev-bot-token"), is_prod)?,
                lead_keywords,
            },
        })
    }

    /// Pick the model identifier for a tenant's subscription package.
    pub fn model_for_package(&self, package_type: &str) -> &str {
        if package_type == self.models.premium_package {
            &self.models.premium_model
        } else {
            &self.models.default_model
        }
    }
}
