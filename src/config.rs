use crate::application::lending::RetryPolicy;
use crate::domain::LedgerKey;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// 台帳ストアの実装
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackend {
    Memory,
    Postgres,
}

/// 設定読み込みのエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("LEDGER_BACKEND must be \"memory\" or \"postgres\", got {0:?}")]
    UnknownBackend(String),

    #[error("LEDGER_BACKEND=postgres requires DATABASE_URL")]
    MissingDatabaseUrl,

    #[error("invalid LEDGER_KEY: {0}")]
    InvalidLedgerKey(String),
}

/// 環境変数から読み込むアプリケーション設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub backend: LedgerBackend,
    pub database_url: Option<String>,
    pub port: u16,
    pub ledger_key: LedgerKey,
    pub retry_policy: RetryPolicy,
    pub operation_timeout: Duration,
    /// インメモリのカタログに読み込む書籍一覧（JSON）
    pub catalog_fixture: Option<PathBuf>,
}

impl AppConfig {
    /// プロセスの環境変数から読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の検索関数から読み込む
    ///
    /// 未設定と空文字列はどちらも既定値を使う。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let database_url = get("DATABASE_URL");

        let backend = match get("LEDGER_BACKEND").as_deref().map(str::trim) {
            None if database_url.is_some() => LedgerBackend::Postgres,
            None => LedgerBackend::Memory,
            Some(value) if value.eq_ignore_ascii_case("memory") => LedgerBackend::Memory,
            Some(value) if value.eq_ignore_ascii_case("postgres") => LedgerBackend::Postgres,
            Some(value) => return Err(ConfigError::UnknownBackend(value.to_string())),
        };

        if backend == LedgerBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        let ledger_key = match get("LEDGER_KEY") {
            Some(value) => {
                LedgerKey::new(value).map_err(|e| ConfigError::InvalidLedgerKey(e.to_string()))?
            }
            None => LedgerKey::global(),
        };

        let catalog_fixture = get("CATALOG_FIXTURE").map(PathBuf::from);

        let port = parse_number(&get, "PORT", 3000u16)?;
        let max_attempts = parse_number(&get, "LENDING_MAX_ATTEMPTS", 5u32)?;
        let base_ms = parse_number(&get, "LENDING_RETRY_BASE_MS", 25u64)?;
        let max_ms = parse_number(&get, "LENDING_RETRY_MAX_MS", 500u64)?;
        let timeout_ms = parse_number(&get, "LENDING_OPERATION_TIMEOUT_MS", 5000u64)?;

        Ok(Self {
            backend,
            database_url,
            port,
            ledger_key,
            retry_policy: RetryPolicy::new(
                max_attempts,
                Duration::from_millis(base_ms),
                Duration::from_millis(max_ms),
            ),
            operation_timeout: Duration::from_millis(timeout_ms),
            catalog_fixture,
        })
    }
}

/// 正の整数を読み込む（未設定なら既定値）
fn parse_number<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(name) else {
        return Ok(default);
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value != T::default() => Ok(value),
        _ => Err(ConfigError::InvalidNumber { name, value: raw }),
    }
}
