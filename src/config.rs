use crate::error::{AppError, AppResult, ConfigError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 页面地址前缀，页码直接拼接在后面
    pub base_url: String,
    /// 输出目录
    pub output_dir: String,
    /// 起始页码
    pub start_page: u64,
    /// 最多抓取的页数（None 表示直到站点返回 4xx）
    pub page_budget: Option<u64>,
    /// 每抓取多少页写一次文件
    pub flush_interval: usize,
    /// 单次请求超时（秒）
    pub fetch_timeout_secs: u64,
    /// 临时错误的最大重试次数
    pub max_retries: usize,
    /// 重试等待基数（毫秒），第 n 次重试等待 n 倍
    pub retry_backoff_ms: u64,
    /// 两页之间的间隔（毫秒）
    pub request_delay_ms: u64,
    /// 是否通过 Tor 抓取
    pub use_tor: bool,
    /// tor 可执行文件路径
    pub tor_binary: String,
    /// Tor SOCKS 端口
    pub tor_socks_port: u16,
    /// Tor 控制端口
    pub tor_control_port: u16,
    /// 控制端口密码
    pub tor_control_password: Option<String>,
    /// 等待 tor 就绪的最长时间（秒）
    pub tor_startup_timeout_secs: u64,
    /// 控制端口一次换线路会话的时限（秒）
    pub tor_control_timeout_secs: u64,
    /// 随机 User-Agent 的最短长度
    pub identity_min_len: usize,
    /// 随机 User-Agent 的最长长度
    pub identity_max_len: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://bacdive.dsmz.de/strain/".to_string(),
            output_dir: "Microbial_Data".to_string(),
            start_page: 1,
            page_budget: None,
            flush_interval: 20,
            fetch_timeout_secs: 10,
            max_retries: 3,
            retry_backoff_ms: 500,
            request_delay_ms: 100,
            use_tor: false,
            tor_binary: "tor".to_string(),
            tor_socks_port: 9050,
            tor_control_port: 9051,
            tor_control_password: None,
            tor_startup_timeout_secs: 10,
            tor_control_timeout_secs: 10,
            identity_min_len: 1,
            identity_max_len: 20,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 默认配置叠加环境变量
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// 从 TOML 文件加载，缺省字段使用默认值
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    fn from_toml_str(content: &str, origin: &str) -> AppResult<Self> {
        let config = toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: origin.to_string(),
            source,
        })?;
        Ok(config)
    }

    /// 用环境变量覆盖已有字段
    pub fn with_env(self) -> Self {
        let d = self;
        Self {
            base_url: std::env::var("HARVEST_BASE_URL").unwrap_or(d.base_url),
            output_dir: std::env::var("HARVEST_OUTPUT_DIR").unwrap_or(d.output_dir),
            start_page: env_parse("HARVEST_START_PAGE").unwrap_or(d.start_page),
            page_budget: env_parse("HARVEST_PAGE_BUDGET").or(d.page_budget),
            flush_interval: env_parse("HARVEST_FLUSH_INTERVAL").unwrap_or(d.flush_interval),
            fetch_timeout_secs: env_parse("HARVEST_FETCH_TIMEOUT_SECS").unwrap_or(d.fetch_timeout_secs),
            max_retries: env_parse("HARVEST_MAX_RETRIES").unwrap_or(d.max_retries),
            retry_backoff_ms: env_parse("HARVEST_RETRY_BACKOFF_MS").unwrap_or(d.retry_backoff_ms),
            request_delay_ms: env_parse("HARVEST_REQUEST_DELAY_MS").unwrap_or(d.request_delay_ms),
            use_tor: env_parse("HARVEST_USE_TOR").unwrap_or(d.use_tor),
            tor_binary: std::env::var("TOR_BINARY").unwrap_or(d.tor_binary),
            tor_socks_port: env_parse("TOR_SOCKS_PORT").unwrap_or(d.tor_socks_port),
            tor_control_port: env_parse("TOR_CONTROL_PORT").unwrap_or(d.tor_control_port),
            tor_control_password: std::env::var("TOR_CONTROL_PASSWORD").ok().or(d.tor_control_password),
            tor_startup_timeout_secs: env_parse("TOR_STARTUP_TIMEOUT_SECS").unwrap_or(d.tor_startup_timeout_secs),
            tor_control_timeout_secs: env_parse("TOR_CONTROL_TIMEOUT_SECS").unwrap_or(d.tor_control_timeout_secs),
            identity_min_len: env_parse("HARVEST_IDENTITY_MIN_LEN").unwrap_or(d.identity_min_len),
            identity_max_len: env_parse("HARVEST_IDENTITY_MAX_LEN").unwrap_or(d.identity_max_len),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(d.verbose_logging),
        }
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> AppResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(AppError::invalid_config("base_url", &self.base_url, "不能为空"));
        }
        if self.tor_control_timeout_secs == 0 {
            return Err(AppError::invalid_config("tor_control_timeout_secs", 0, "必须大于 0"));
        }
        if self.flush_interval == 0 {
            return Err(AppError::invalid_config("flush_interval", 0, "必须大于 0"));
        }
        if self.identity_min_len == 0 || self.identity_min_len > self.identity_max_len {
            return Err(AppError::invalid_config(
                "identity_min_len",
                self.identity_min_len,
                format!("必须在 1..={} 之间", self.identity_max_len),
            ));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn tor_startup_timeout(&self) -> Duration {
        Duration::from_secs(self.tor_startup_timeout_secs)
    }

    pub fn tor_control_timeout(&self) -> Duration {
        Duration::from_secs(self.tor_control_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.flush_interval, 20);
        assert_eq!(config.tor_control_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_toml_partial_override() {
        let config = Config::from_toml_str(
            r#"
            base_url = "http://localhost:8080/strain/"
            flush_interval = 2
            page_budget = 5
            use_tor = true
            "#,
            "inline",
        )
        .unwrap();

        assert_eq!(config.base_url, "http://localhost:8080/strain/");
        assert_eq!(config.flush_interval, 2);
        assert_eq!(config.page_budget, Some(5));
        assert!(config.use_tor);
        // 未写的字段保持默认
        assert_eq!(config.tor_socks_port, 9050);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_toml_parse_error() {
        let err = Config::from_toml_str("flush_interval = \"many\"", "bad.toml").unwrap_err();
        assert!(matches!(
            err,
            AppError::Config(ConfigError::TomlParseFailed { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = Config {
            flush_interval: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_control_timeout() {
        let config = Config {
            tor_control_timeout_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_identity_range() {
        let config = Config {
            identity_min_len: 30,
            identity_max_len: 20,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
