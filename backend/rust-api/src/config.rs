use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::models::quiz::DEFAULT_PASSING_SCORE;
use crate::services::quiz_session::SessionSettings;
use crate::services::report::ReportPolicy;
use crate::utils::retry::RetryConfig;

/// Audience claim of tokens issued to signed-in users.
pub const DEFAULT_JWT_AUDIENCE: &str = "authenticated";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub identity_url: String,
    pub identity_anon_key: String,
    /// Attempts per identity-service call; 1 disables retries.
    pub identity_max_attempts: usize,
    pub content_dir: PathBuf,
    pub quiz: QuizSettings,
}

/// Tunables of a quiz attempt and its report.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct QuizSettings {
    pub sample_size: usize,
    pub duration_seconds: u32,
    pub passing_score: u8,
    /// Percent; categories scoring below it are weak areas.
    pub weak_area_threshold: u8,
    pub tick_interval_ms: u64,
    /// How long a closed session stays addressable before it is evicted.
    pub retention_seconds: u64,
}

impl Default for QuizSettings {
    fn default() -> Self {
        let session = SessionSettings::default();
        Self {
            sample_size: session.sample_size,
            duration_seconds: session.duration_seconds,
            passing_score: DEFAULT_PASSING_SCORE,
            weak_area_threshold: 70,
            tick_interval_ms: 1000,
            retention_seconds: 300,
        }
    }
}

impl QuizSettings {
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            sample_size: self.sample_size,
            duration_seconds: self.duration_seconds,
        }
    }

    pub fn report_policy(&self) -> ReportPolicy {
        ReportPolicy {
            passing_score: self.passing_score,
            weak_area_threshold: f64::from(self.weak_area_threshold) / 100.0,
        }
    }

    /// Wall-clock length of one countdown second.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.passing_score > 100 {
            return Err(config::ConfigError::Message(format!(
                "quiz.passing_score must be 0..=100, got {}",
                self.passing_score
            )));
        }
        if self.weak_area_threshold > 100 {
            return Err(config::ConfigError::Message(format!(
                "quiz.weak_area_threshold must be 0..=100, got {}",
                self.weak_area_threshold
            )));
        }
        if self.retention_seconds == 0 {
            return Err(config::ConfigError::Message(
                "quiz.retention_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Retry policy for calls to the identity service.
    pub fn identity_retry(&self) -> RetryConfig {
        if self.identity_max_attempts <= 1 {
            return RetryConfig::none();
        }
        RetryConfig {
            max_attempts: self.identity_max_attempts,
            ..RetryConfig::default()
        }
    }

    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first (two levels up), then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/{env}.toml, overridden by APP__SECTION__KEY variables
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ));
            }
            Err(_) => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let jwt_audience = settings
            .get_string("auth.jwt_audience")
            .or_else(|_| env::var("JWT_AUDIENCE"))
            .unwrap_or_else(|_| DEFAULT_JWT_AUDIENCE.to_string());

        let identity_url = settings
            .get_string("identity.url")
            .or_else(|_| env::var("IDENTITY_URL"))
            .unwrap_or_else(|_| "http://localhost:54321".to_string());

        let identity_anon_key = settings
            .get_string("identity.anon_key")
            .or_else(|_| env::var("IDENTITY_ANON_KEY"))
            .unwrap_or_default();

        let identity_max_attempts = lookup(
            &settings,
            "identity.max_attempts",
            "IDENTITY_MAX_ATTEMPTS",
            RetryConfig::default().max_attempts,
        )?;

        let content_dir = settings
            .get_string("content.dir")
            .or_else(|_| env::var("CONTENT_DIR"))
            .unwrap_or_else(|_| "content".to_string());

        let defaults = QuizSettings::default();
        let quiz = QuizSettings {
            sample_size: lookup(
                &settings,
                "quiz.sample_size",
                "QUIZ_SAMPLE_SIZE",
                defaults.sample_size,
            )?,
            duration_seconds: lookup(
                &settings,
                "quiz.duration_seconds",
                "QUIZ_DURATION_SECONDS",
                defaults.duration_seconds,
            )?,
            passing_score: lookup(
                &settings,
                "quiz.passing_score",
                "QUIZ_PASSING_SCORE",
                defaults.passing_score,
            )?,
            weak_area_threshold: lookup(
                &settings,
                "quiz.weak_area_threshold",
                "QUIZ_WEAK_AREA_THRESHOLD",
                defaults.weak_area_threshold,
            )?,
            tick_interval_ms: lookup(
                &settings,
                "quiz.tick_interval_ms",
                "QUIZ_TICK_INTERVAL_MS",
                defaults.tick_interval_ms,
            )?,
            retention_seconds: lookup(
                &settings,
                "quiz.retention_seconds",
                "QUIZ_RETENTION_SECONDS",
                defaults.retention_seconds,
            )?,
        };
        quiz.validate()?;

        Ok(Config {
            bind_addr,
            jwt_secret,
            jwt_audience,
            identity_url,
            identity_anon_key,
            identity_max_attempts,
            content_dir: PathBuf::from(content_dir),
            quiz,
        })
    }
}

/// Reads `key` from the layered settings, then `env_var`, then `default`.
/// A value that is present but does not parse is an error.
fn lookup<T>(
    settings: &config::Config,
    key: &str,
    env_var: &str,
    default: T,
) -> Result<T, config::ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = match settings.get_string(key).or_else(|_| env::var(env_var)) {
        Ok(raw) => raw,
        Err(_) => return Ok(default),
    };

    raw.trim()
        .parse()
        .map_err(|e| config::ConfigError::Message(format!("invalid {}='{}': {}", key, raw, e)))
}
