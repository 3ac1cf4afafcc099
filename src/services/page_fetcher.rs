//! 页面获取能力
//!
//! 采集控制器只依赖这个 trait，直连和身份轮换两种会话都实现它

use crate::error::FetchError;
use crate::infrastructure::DocumentSource;

/// 按页码获取页面的会话
#[allow(async_fn_in_trait)]
pub trait PageFetcher {
    async fn fetch(&mut self, page_id: u64) -> Result<String, FetchError>;

    /// 释放会话持有的资源，可重复调用
    async fn shutdown(&mut self) {}
}

/// 直连会话，不换身份
pub struct DirectSession<S> {
    source: S,
}

impl<S: DocumentSource> DirectSession<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: DocumentSource> PageFetcher for DirectSession<S> {
    async fn fetch(&mut self, page_id: u64) -> Result<String, FetchError> {
        self.source.get(page_id, None).await
    }
}
