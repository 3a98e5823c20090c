//! tcrecon ランタイム設定
//!
//! リトライのタイムアウト・間隔、ポーリング間隔、ページサイズなど
//! プロセス全体で共有する設定値を扱います。値はプロセス起動時に一度だけ解決し、
//! 以降は変更しません:
//!
//! 1. 組み込みのデフォルト値 (read 180s, write 300s, page limit 100, ...)
//! 2. YAML 設定ファイル ([`find_config_file`] で検索)
//! 3. 環境変数による上書き (全項目に対応する `*_ENV` 定数を参照)

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// 設定ファイルを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "TCRECON_CONFIG_PATH";
pub const READ_RETRY_TIMEOUT_ENV: &str = "TENCENTCLOUD_READ_RETRY_TIMEOUT";
pub const WRITE_RETRY_TIMEOUT_ENV: &str = "TENCENTCLOUD_WRITE_RETRY_TIMEOUT";
pub const RETRY_INTERVAL_ENV: &str = "TCRECON_RETRY_INTERVAL_MS";
pub const MAX_RETRY_INTERVAL_ENV: &str = "TCRECON_MAX_RETRY_INTERVAL_MS";
pub const RETRY_MULTIPLIER_ENV: &str = "TCRECON_RETRY_MULTIPLIER";
pub const POLL_INTERVAL_ENV: &str = "TCRECON_POLL_INTERVAL_MS";
pub const PAGE_LIMIT_ENV: &str = "TCRECON_PAGE_LIMIT";
pub const NOT_FOUND_CHECKS_ENV: &str = "TCRECON_NOT_FOUND_CHECKS";

const CONFIG_DIR_NAME: &str = "tcrecon";
const CANDIDATES: [&str; 4] = [
    "tcrecon.local.yaml",
    ".tcrecon.local.yaml",
    "tcrecon.yaml",
    ".tcrecon.yaml",
];

/// プロセス全体のランタイム設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// 読み取り系 API のリトライ上限時間（秒）
    #[serde(default = "default_read_timeout")]
    pub read_retry_timeout_secs: u64,
    /// 変更系 API のリトライ上限時間（秒）
    #[serde(default = "default_write_timeout")]
    pub write_retry_timeout_secs: u64,
    /// 初回リトライまでの待機時間（ミリ秒、0 は不可）
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,
    /// リトライ待機時間の上限（ミリ秒）
    #[serde(default = "default_max_retry_interval")]
    pub max_retry_interval_ms: u64,
    /// リトライごとの待機時間の倍率
    #[serde(default = "default_multiplier")]
    pub retry_multiplier: f64,
    /// 状態収束ポーリングの固定間隔（ミリ秒）
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// 一覧 API のページサイズ
    #[serde(default = "default_page_limit")]
    pub page_limit: u64,
    /// 状態待機中に許容する連続 not found の回数
    #[serde(default = "default_not_found_checks")]
    pub not_found_checks: u32,
}

fn default_read_timeout() -> u64 {
    180
}
fn default_write_timeout() -> u64 {
    300
}
fn default_retry_interval() -> u64 {
    1000
}
fn default_max_retry_interval() -> u64 {
    10_000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_poll_interval() -> u64 {
    1000
}
fn default_page_limit() -> u64 {
    100
}
fn default_not_found_checks() -> u32 {
    20
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            read_retry_timeout_secs: default_read_timeout(),
            write_retry_timeout_secs: default_write_timeout(),
            retry_interval_ms: default_retry_interval(),
            max_retry_interval_ms: default_max_retry_interval(),
            retry_multiplier: default_multiplier(),
            poll_interval_ms: default_poll_interval(),
            page_limit: default_page_limit(),
            not_found_checks: default_not_found_checks(),
        }
    }
}

impl RuntimeConfig {
    /// 設定を解決する: デフォルト値 → 設定ファイル → 環境変数
    pub fn load() -> Result<Self> {
        let mut config = match find_config_file()? {
            Some(path) => Self::from_file(&path)?,
            None => {
                tracing::debug!("No tcrecon config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// YAML 設定ファイルを読み込む（未指定の項目はデフォルト値）
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded tcrecon config from {}", path.display());
        Ok(config)
    }

    fn from_yaml_str(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// 環境変数で現在の値を上書きする
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_var(READ_RETRY_TIMEOUT_ENV)? {
            self.read_retry_timeout_secs = v;
        }
        if let Some(v) = env_var(WRITE_RETRY_TIMEOUT_ENV)? {
            self.write_retry_timeout_secs = v;
        }
        if let Some(v) = env_var(RETRY_INTERVAL_ENV)? {
            self.retry_interval_ms = v;
        }
        if let Some(v) = env_var(MAX_RETRY_INTERVAL_ENV)? {
            self.max_retry_interval_ms = v;
        }
        if let Some(v) = env_var(RETRY_MULTIPLIER_ENV)? {
            self.retry_multiplier = v;
        }
        if let Some(v) = env_var(POLL_INTERVAL_ENV)? {
            self.poll_interval_ms = v;
        }
        if let Some(v) = env_var(PAGE_LIMIT_ENV)? {
            self.page_limit = v;
        }
        if let Some(v) = env_var(NOT_FOUND_CHECKS_ENV)? {
            self.not_found_checks = v;
        }
        Ok(())
    }

    /// ランタイムが動作できない設定値を拒否する
    pub fn validate(&self) -> Result<()> {
        // 0 のリトライ間隔は待機なしの連続リトライになる
        let checks = [
            ("read_retry_timeout_secs", self.read_retry_timeout_secs),
            ("write_retry_timeout_secs", self.write_retry_timeout_secs),
            ("retry_interval_ms", self.retry_interval_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("page_limit", self.page_limit),
        ];
        for (key, value) in checks {
            if value == 0 {
                return Err(invalid(key, value.to_string(), "must be greater than zero"));
            }
        }
        if self.retry_multiplier.is_nan() || self.retry_multiplier < 1.0 {
            return Err(invalid(
                "retry_multiplier",
                self.retry_multiplier.to_string(),
                "must be at least 1.0",
            ));
        }
        if self.max_retry_interval_ms < self.retry_interval_ms {
            return Err(invalid(
                "max_retry_interval_ms",
                self.max_retry_interval_ms.to_string(),
                "must not be smaller than retry_interval_ms",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: String, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value,
        reason: reason.to_string(),
    }
}

fn env_var<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(key, raw.clone(), &e.to_string())),
        Err(_) => Ok(None),
    }
}

/// tcrecon のユーザー設定ディレクトリ (Linux では `~/.config/tcrecon`)
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .ok_or(ConfigError::ConfigDirNotFound)
}

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 TCRECON_CONFIG_PATH (指定時は存在必須)
/// 2. カレントディレクトリ: tcrecon.local.yaml, .tcrecon.local.yaml, tcrecon.yaml, .tcrecon.yaml
/// 3. ./.tcrecon/ ディレクトリ内: 同様の順序
/// 4. ~/.config/tcrecon/config.yaml (グローバル設定)
pub fn find_config_file() -> Result<Option<PathBuf>> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::ConfigFileNotFound(path));
    }

    // 2. カレントディレクトリで検索
    let current_dir = std::env::current_dir()?;
    if let Some(path) = first_existing(&current_dir) {
        return Ok(Some(path));
    }

    // 3. ./.tcrecon/ ディレクトリで検索
    let local_dir = current_dir.join(".tcrecon");
    if local_dir.is_dir() {
        if let Some(path) = first_existing(&local_dir) {
            return Ok(Some(path));
        }
    }

    // 4. グローバル設定ファイル (~/.config/tcrecon/config.yaml)
    if let Ok(config_dir) = get_config_dir() {
        let global = config_dir.join("config.yaml");
        if global.exists() {
            return Ok(Some(global));
        }
    }

    // 見つからなければデフォルト値で動作する
    Ok(None)
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}
