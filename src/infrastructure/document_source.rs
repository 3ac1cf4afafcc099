//! 页面来源 - 基础设施层
//!
//! 持有 HTTP 客户端，只暴露"按页码取回 HTML"的能力

use crate::config::Config;
use crate::error::{ConfigError, FetchError, TorError};
use reqwest::header::USER_AGENT;
use reqwest::{Client, Proxy, StatusCode};
use tracing::debug;

/// 按页码获取页面
#[allow(async_fn_in_trait)]
pub trait DocumentSource {
    /// 获取第 page_id 页的 HTML
    ///
    /// `user_agent` 为 None 时使用客户端默认值
    async fn get(&self, page_id: u64, user_agent: Option<&str>) -> Result<String, FetchError>;
}

/// 响应状态分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Success,
    /// 已经没有更多页面
    EndOfCollection,
    /// 可以重试
    Transient,
}

/// 根据 HTTP 状态码判断页面状态
///
/// 403/408/429 多半是限流或被封，换身份重试；其余 4xx 视为采集结束
pub fn classify_status(status: StatusCode) -> PageStatus {
    match status.as_u16() {
        200..=399 => PageStatus::Success,
        403 | 408 | 429 => PageStatus::Transient,
        400..=499 => PageStatus::EndOfCollection,
        _ => PageStatus::Transient,
    }
}

/// 基于 reqwest 的页面来源
pub struct HttpDocumentSource {
    client: Client,
    base_url: String,
}

impl HttpDocumentSource {
    /// 直连客户端
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.fetch_timeout())
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// 通过 Tor SOCKS 端口的客户端，DNS 也走代理
    ///
    /// 每次构建都是全新的客户端，不带任何 cookie
    pub fn via_tor(config: &Config) -> Result<Self, TorError> {
        let proxy = Proxy::all(format!("socks5h://127.0.0.1:{}", config.tor_socks_port))
            .map_err(TorError::ProxySetup)?;
        let client = Client::builder()
            .proxy(proxy)
            .timeout(config.fetch_timeout())
            .build()
            .map_err(TorError::ProxySetup)?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    pub fn page_url(&self, page_id: u64) -> String {
        format!("{}{}", self.base_url, page_id)
    }
}

impl DocumentSource for HttpDocumentSource {
    async fn get(&self, page_id: u64, user_agent: Option<&str>) -> Result<String, FetchError> {
        let url = self.page_url(page_id);
        debug!("GET {}", url);

        let mut request = self.client.get(&url);
        if let Some(agent) = user_agent {
            request = request.header(USER_AGENT, agent);
        }

        let response = request.send().await.map_err(|e| FetchError::Transient {
            page_id,
            reason: describe_transport_error(&e),
        })?;

        let status = response.status();
        match classify_status(status) {
            PageStatus::Success => response.text().await.map_err(|e| FetchError::Transient {
                page_id,
                reason: describe_transport_error(&e),
            }),
            PageStatus::EndOfCollection => Err(FetchError::EndOfCollection {
                page_id,
                status: status.as_u16(),
            }),
            PageStatus::Transient => Err(FetchError::Transient {
                page_id,
                reason: format!("HTTP {}", status),
            }),
        }
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("请求超时: {}", e)
    } else if e.is_connect() {
        format!("连接失败: {}", e)
    } else {
        e.to_string()
    }
}
