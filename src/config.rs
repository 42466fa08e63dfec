//! Configuration types.
//!
//! Everything is read from the environment once at startup. Required keys
//! fail closed with [`ConfigError::MissingEnvVar`].

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::pipeline::senders::SenderAllowList;

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_MAX_TOKENS: u32 = 1000;
const DEFAULT_MAILGUN_BASE: &str = "https://api.mailgun.net/v3";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PORT: u16 = 3000;

/// Completion provider settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub model: String,
    pub timeout: Duration,
}

/// Mailgun HTTP API settings.
#[derive(Debug, Clone)]
pub struct MailgunConfig {
    pub api_key: SecretString,
    pub domain: String,
    pub api_base: String,
    pub timeout: Duration,
}

/// SMTP relay settings, used instead of Mailgun when `SMTP_HOST` is set.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub timeout: Duration,
}

/// Which outbound mail provider to use.
#[derive(Debug, Clone)]
pub enum DispatchConfig {
    Mailgun(MailgunConfig),
    Smtp(SmtpConfig),
}

/// Settings for a single pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on generated tokens per reply.
    pub max_tokens: u32,
    /// Max attachment downloads in flight per email. 1 means sequential.
    pub fetch_concurrency: usize,
    /// `None` accepts every sender.
    pub allowed_senders: Option<SenderAllowList>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            fetch_concurrency: 1,
            allowed_senders: None,
        }
    }
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    pub from_address: String,
    pub llm: LlmConfig,
    pub dispatch: DispatchConfig,
    pub pipeline: PipelineConfig,
    /// Timeout for attachment downloads.
    pub http_timeout: Duration,
    pub port: u16,
    pub log_dir: Option<String>,
}

impl ResponderConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let timeout_secs: u64 = parse_or(&get, "RESPONDER_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RESPONDER_HTTP_TIMEOUT_SECS".into(),
                message: "must be greater than zero".into(),
            });
        }
        let http_timeout = Duration::from_secs(timeout_secs);

        let max_tokens: u32 = parse_or(&get, "RESPONDER_MAX_TOKENS", DEFAULT_MAX_TOKENS)?;
        let fetch_concurrency: usize = parse_or(&get, "RESPONDER_FETCH_CONCURRENCY", 1)?;
        if fetch_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RESPONDER_FETCH_CONCURRENCY".into(),
                message: "must be at least 1".into(),
            });
        }

        let llm = LlmConfig {
            api_key: SecretString::from(require("OPENAI_API_KEY")?),
            model: get("RESPONDER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: http_timeout,
        };

        let dispatch = match get("SMTP_HOST") {
            Some(host) => DispatchConfig::Smtp(SmtpConfig {
                host,
                port: parse_or(&get, "SMTP_PORT", 587)?,
                username: get("SMTP_USERNAME").unwrap_or_default(),
                password: SecretString::from(get("SMTP_PASSWORD").unwrap_or_default()),
                timeout: http_timeout,
            }),
            None => DispatchConfig::Mailgun(MailgunConfig {
                api_key: SecretString::from(require("MAILGUN_API_KEY")?),
                domain: require("MAILGUN_DOMAIN")?,
                api_base: get("MAILGUN_API_BASE").unwrap_or_else(|| DEFAULT_MAILGUN_BASE.to_string()),
                timeout: http_timeout,
            }),
        };

        // Unset means no allowlist; set but blank means an empty one.
        let allowed_senders =
            lookup("RESPONDER_ALLOWED_SENDERS").map(|raw| SenderAllowList::parse(&raw));

        let pipeline = PipelineConfig {
            max_tokens,
            fetch_concurrency,
            allowed_senders,
        };

        Ok(Self {
            from_address: require("RESPONDER_FROM_ADDRESS")?,
            llm,
            dispatch,
            pipeline,
            http_timeout,
            port: parse_or(&get, "RESPONDER_PORT", DEFAULT_PORT)?,
            log_dir: get("RESPONDER_LOG_DIR"),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("OPENAI_API_KEY", "sk-test"),
            ("MAILGUN_API_KEY", "key-test"),
            ("MAILGUN_DOMAIN", "mg.example.com"),
            ("RESPONDER_FROM_ADDRESS", "assistant@mg.example.com"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<ResponderConfig, ConfigError> {
        ResponderConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_applied() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.pipeline.max_tokens, 1000);
        assert_eq!(config.llm.api_key.expose_secret(), "sk-test");
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.port, 3000);
        assert_eq!(config.pipeline.fetch_concurrency, 1);
        assert!(config.pipeline.allowed_senders.is_none());
        assert!(config.log_dir.is_none());
        match config.dispatch {
            DispatchConfig::Mailgun(mg) => {
                assert_eq!(mg.domain, "mg.example.com");
                assert_eq!(mg.api_base, "https://api.mailgun.net/v3");
            }
            DispatchConfig::Smtp(_) => panic!("expected mailgun dispatch"),
        }
    }

    #[test]
    fn missing_openai_key_fails() {
        let mut env = base_env();
        env.remove("OPENAI_API_KEY");
        match load(&env) {
            Err(ConfigError::MissingEnvVar(key)) => assert_eq!(key, "OPENAI_API_KEY"),
            other => panic!("expected MissingEnvVar, got {other:?}"),
        }
    }

    #[test]
    fn missing_from_address_fails() {
        let mut env = base_env();
        env.remove("RESPONDER_FROM_ADDRESS");
        assert!(matches!(load(&env), Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut env = base_env();
        env.insert("MAILGUN_DOMAIN", "   ");
        match load(&env) {
            Err(ConfigError::MissingEnvVar(key)) => assert_eq!(key, "MAILGUN_DOMAIN"),
            other => panic!("expected MissingEnvVar, got {other:?}"),
        }
    }

    #[test]
    fn smtp_host_replaces_mailgun() {
        let mut env = base_env();
        env.remove("MAILGUN_API_KEY");
        env.remove("MAILGUN_DOMAIN");
        env.insert("SMTP_HOST", "smtp.example.com");
        env.insert("SMTP_USERNAME", "bot");
        let config = load(&env).unwrap();
        match config.dispatch {
            DispatchConfig::Smtp(smtp) => {
                assert_eq!(smtp.host, "smtp.example.com");
                assert_eq!(smtp.port, 587);
                assert_eq!(smtp.username, "bot");
            }
            DispatchConfig::Mailgun(_) => panic!("expected smtp dispatch"),
        }
    }

    #[test]
    fn invalid_number_rejected() {
        let mut env = base_env();
        env.insert("RESPONDER_MAX_TOKENS", "lots");
        match load(&env) {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "RESPONDER_MAX_TOKENS"),
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut env = base_env();
        env.insert("RESPONDER_HTTP_TIMEOUT_SECS", "0");
        assert!(matches!(load(&env), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let mut env = base_env();
        env.insert("RESPONDER_FETCH_CONCURRENCY", "0");
        assert!(matches!(load(&env), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn allowlist_parsed() {
        let mut env = base_env();
        env.insert("RESPONDER_ALLOWED_SENDERS", "ops@shop.example, @partner.example,,");
        let allowed = load(&env).unwrap().pipeline.allowed_senders.unwrap();
        assert!(allowed.permits("ops@shop.example"));
        assert!(allowed.permits("anyone@partner.example"));
        assert!(!allowed.permits("someone@gmail.com"));
    }

    #[test]
    fn blank_allowlist_admits_nobody() {
        let mut env = base_env();
        env.insert("RESPONDER_ALLOWED_SENDERS", "");
        let allowed = load(&env).unwrap().pipeline.allowed_senders;
        let allowed = allowed.expect("blank allowlist must not disable the check");
        assert!(allowed.is_empty());
        assert!(!allowed.permits("ops@shop.example"));
    }

    #[test]
    fn overrides_applied() {
        let mut env = base_env();
        env.insert("RESPONDER_MODEL", "gpt-4o-mini");
        env.insert("RESPONDER_MAX_TOKENS", "256");
        env.insert("RESPONDER_HTTP_TIMEOUT_SECS", "5");
        env.insert("RESPONDER_FETCH_CONCURRENCY", "4");
        env.insert("RESPONDER_PORT", "8081");
        let config = load(&env).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.pipeline.max_tokens, 256);
        assert_eq!(config.llm.timeout, Duration::from_secs(5));
        assert_eq!(config.pipeline.fetch_concurrency, 4);
        assert_eq!(config.port, 8081);
    }
}
