use secrecy::{ExposeSecret, Secret};
use service_core::config::{self as core_config, first_env, get_env, is_production};
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;

/// Upload ceiling when `MAX_UPLOAD_BYTES` is not set (10MB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Seconds before a GenAI call is abandoned.
const DEFAULT_GENAI_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ArtisanConfig {
    pub common: core_config::Config,
    pub catalog: CatalogConfig,
    pub media: MediaConfig,
    pub public: PublicConfig,
    pub genai: GenaiConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub backend: CatalogBackend,
    pub mongodb: Option<MongoConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Enhanced images, served under `/static`.
    pub dir: PathBuf,
    /// Uploads as received. Never served; keep it outside `dir`.
    pub originals_dir: PathBuf,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PublicConfig {
    /// Public origin of this service, without a trailing slash.
    pub backend_origin: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GenaiConfig {
    pub api_key: Option<Secret<String>>,
    pub text_model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Fail the request on provider errors instead of falling back to the raw text.
    pub strict: bool,
}

impl GenaiConfig {
    pub fn key_present(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().is_empty())
    }
}

impl Default for GenaiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            text_model: "gemini-2.5-flash".to_string(),
            base_url: crate::services::providers::gemini::GEMINI_API_BASE.to_string(),
            timeout_secs: DEFAULT_GENAI_TIMEOUT_SECS,
            strict: false,
        }
    }
}

impl ArtisanConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = is_production();

        let backend: CatalogBackend = get_env("CATALOG_BACKEND", Some("mongodb"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let mongodb = match backend {
            CatalogBackend::Mongo => Some(MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("artisan_db"), is_prod)?,
            }),
            CatalogBackend::Memory => None,
        };

        let max_upload_bytes = parse_setting(
            "MAX_UPLOAD_BYTES",
            &get_env(
                "MAX_UPLOAD_BYTES",
                Some(&DEFAULT_MAX_UPLOAD_BYTES.to_string()),
                is_prod,
            )?,
        )?;

        let defaults = GenaiConfig::default();
        let genai = GenaiConfig {
            api_key: first_env(&["GEMINI_API_KEY", "GENAI_API_KEY", "GOOGLE_API_KEY"])
                .map(Secret::new),
            text_model: get_env("GENAI_TEXT_MODEL", Some(&defaults.text_model), is_prod)?,
            base_url: env::var("GENAI_BASE_URL").unwrap_or(defaults.base_url),
            timeout_secs: parse_setting(
                "GENAI_TIMEOUT_SECS",
                &get_env(
                    "GENAI_TIMEOUT_SECS",
                    Some(&DEFAULT_GENAI_TIMEOUT_SECS.to_string()),
                    is_prod,
                )?,
            )?,
            strict: env::var("GENAI_STRICT")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        Ok(ArtisanConfig {
            common,
            catalog: CatalogConfig { backend, mongodb },
            media: MediaConfig {
                dir: PathBuf::from(get_env("MEDIA_DIR", Some("media"), is_prod)?),
                originals_dir: PathBuf::from(get_env("ORIGINALS_DIR", Some("originals"), is_prod)?),
                max_upload_bytes,
            },
            public: PublicConfig {
                backend_origin: normalize_origin(env::var("BACKEND_ORIGIN").ok()),
            },
            genai,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
        })
    }
}

impl std::str::FromStr for CatalogBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(CatalogBackend::Mongo),
            "memory" => Ok(CatalogBackend::Memory),
            _ => Err(format!("Invalid catalog backend: {}", s)),
        }
    }
}

/// Parse a numeric setting; a malformed value is a configuration error.
fn parse_setting<T>(name: &str, value: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid {}: {}", name, e)))
}

/// Strip trailing slashes; an empty origin means "serve relative URLs".
pub fn normalize_origin(origin: Option<String>) -> Option<String> {
    origin
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_backend_parses_aliases() {
        assert_eq!("MongoDB".parse::<CatalogBackend>(), Ok(CatalogBackend::Mongo));
        assert_eq!("memory".parse::<CatalogBackend>(), Ok(CatalogBackend::Memory));
        assert!("sqlite".parse::<CatalogBackend>().is_err());
    }

    #[test]
    fn malformed_numbers_are_config_errors() {
        assert_eq!(parse_setting::<u64>("GENAI_TIMEOUT_SECS", " 45 ").unwrap(), 45);
        assert!(matches!(
            parse_setting::<u64>("GENAI_TIMEOUT_SECS", "thirty"),
            Err(AppError::ConfigError(_))
        ));
        assert!(matches!(
            parse_setting::<usize>("MAX_UPLOAD_BYTES", "-1"),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn origin_is_trimmed() {
        assert_eq!(
            normalize_origin(Some("https://artisans.example.com/".to_string())),
            Some("https://artisans.example.com".to_string())
        );
        assert_eq!(normalize_origin(Some("  ".to_string())), None);
        assert_eq!(normalize_origin(None), None);
    }

    #[test]
    fn empty_key_is_not_present() {
        let config = GenaiConfig {
            api_key: Some(Secret::new(String::new())),
            ..GenaiConfig::default()
        };
        assert!(!config.key_present());
        assert!(!GenaiConfig::default().key_present());
    }
}
