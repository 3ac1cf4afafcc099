//! 翻页采集控制器 - 编排层
//!
//! ## 职责
//!
//! 持有页码游标和待写入批次，按顺序逐页抓取、提取、写入。
//!
//! ## 状态
//!
//! ```text
//! Ready(n) → Fetching(n) ─ 成功/放弃 ─→ Ready(n+1)
//!                        ─ 4xx ─────→ Exhausted
//!                        ─ 换身份失败 ─→ Ready(n)，run 返回错误
//!                        ─ 致命错误 ─→ Aborted
//! Ready(n) ─ 达到页数上限 ─→ BudgetSpent
//! ```
//!
//! - 游标只前进：每页尝试（含重试）结束后 +1，换身份失败时不动
//! - 换身份失败后可再次 `run`，从同一页继续
//! - 每 K 页写入一次，结束时写入剩余部分

use crate::config::Config;
use crate::error::{AppError, AppResult, FetchError};
use crate::infrastructure::LogSink;
use crate::models::Fact;
use crate::services::{Extractor, PageFetcher};
use crate::utils::logging;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// 控制器状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlState {
    /// 下一次抓取第 n 页
    Ready(u64),
    /// 正在抓取第 n 页
    Fetching(u64),
    /// 站点已无更多页面
    Exhausted,
    /// 达到页数上限
    BudgetSpent,
    /// 因致命错误终止
    Aborted(String),
}

impl CrawlState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CrawlState::Exhausted | CrawlState::BudgetSpent | CrawlState::Aborted(_)
        )
    }
}

/// 采集策略
#[derive(Debug, Clone)]
pub struct CrawlPolicy {
    /// 每多少页写入一次
    pub flush_interval: usize,
    /// 临时错误重试次数
    pub max_retries: usize,
    /// 第 n 次重试前等待 n 倍
    pub retry_backoff: Duration,
    /// 两页之间的间隔
    pub request_delay: Duration,
    /// 最多尝试的页数
    pub page_budget: Option<u64>,
}

impl CrawlPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            flush_interval: config.flush_interval.max(1),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            request_delay: config.request_delay(),
            page_budget: config.page_budget,
        }
    }
}

impl Default for CrawlPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 采集统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// 成功提取的页数
    pub pages_fetched: usize,
    /// 找不到菌株名称的页数
    pub pages_malformed: usize,
    /// 重试耗尽后放弃的页数
    pub pages_skipped: usize,
    /// 跳过的表格行
    pub tables_skipped: usize,
    /// 重试次数
    pub retries: usize,
    /// 输出的数据条数（含菌株标记）
    pub facts: usize,
    /// 写入次数
    pub sink_writes: usize,
}

/// 单页尝试的结果
enum PageOutcome {
    Harvested(Vec<Fact>),
    Malformed,
    Skipped,
}

/// 翻页采集控制器
pub struct CrawlController<F, K> {
    fetcher: F,
    sink: K,
    extractor: Extractor,
    policy: CrawlPolicy,
    state: CrawlState,
    cursor: u64,
    attempted: u64,
    batch: Vec<Fact>,
    pending_pages: usize,
    stats: CrawlStats,
}

impl<F: PageFetcher, K: LogSink> CrawlController<F, K> {
    pub fn new(fetcher: F, sink: K, start_page: u64, policy: CrawlPolicy) -> Self {
        Self {
            fetcher,
            sink,
            extractor: Extractor::new(),
            policy,
            state: CrawlState::Ready(start_page),
            cursor: start_page,
            attempted: 0,
            batch: Vec::new(),
            pending_pages: 0,
            stats: CrawlStats::default(),
        }
    }

    /// 下一次要抓取的页码
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    /// 尚未写入的数据条数
    pub fn pending_facts(&self) -> usize {
        self.batch.len()
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn fetcher_mut(&mut self) -> &mut F {
        &mut self.fetcher
    }

    /// 一直运行到终止状态
    ///
    /// 正常结束（无更多页面或达到上限）时写入剩余数据并返回统计；
    /// 出错时尽量写入已有数据后返回错误。换身份失败不会终止控制器，
    /// 再次调用会从同一页继续；已终止的控制器直接返回错误
    pub async fn run(&mut self) -> AppResult<CrawlStats> {
        if let CrawlState::Aborted(reason) = &self.state {
            return Err(AppError::Aborted {
                reason: reason.clone(),
            });
        }

        while !self.state.is_terminal() {
            match self.step().await {
                Ok(()) => {}
                Err(e @ AppError::Fetch(FetchError::IdentityRotation { .. })) => {
                    return Err(self.suspend(e));
                }
                Err(e) => return Err(self.abort(e)),
            }
        }

        if let Err(e) = self.flush() {
            return Err(self.abort(e));
        }
        Ok(self.stats.clone())
    }

    /// 执行一次状态转换（一页，含重试）
    pub async fn step(&mut self) -> AppResult<()> {
        let page_id = match self.state {
            CrawlState::Ready(n) => n,
            _ => return Ok(()),
        };

        if self.policy.page_budget.is_some_and(|budget| self.attempted >= budget) {
            info!("📊 已达到页数上限 {}", self.attempted);
            self.state = CrawlState::BudgetSpent;
            return Ok(());
        }

        if self.attempted > 0 && !self.policy.request_delay.is_zero() {
            sleep(self.policy.request_delay).await;
        }

        self.state = CrawlState::Fetching(page_id);
        let outcome = match self.fetch_with_retry(page_id).await {
            Ok(outcome) => outcome,
            Err(FetchError::EndOfCollection { status, .. }) => {
                info!("🏁 页面 {} 返回 HTTP {}，采集结束", page_id, status);
                self.advance(page_id);
                self.state = CrawlState::Exhausted;
                return Ok(());
            }
            Err(e) => {
                // 换身份失败：页码不前进，留给调用方重试
                self.state = CrawlState::Ready(page_id);
                return Err(e.into());
            }
        };

        match outcome {
            PageOutcome::Harvested(facts) => {
                self.stats.pages_fetched += 1;
                self.stats.facts += facts.len();
                self.batch.extend(facts);
            }
            PageOutcome::Malformed => self.stats.pages_malformed += 1,
            PageOutcome::Skipped => self.stats.pages_skipped += 1,
        }

        self.advance(page_id);
        self.pending_pages += 1;
        self.state = CrawlState::Ready(self.cursor);

        if self.pending_pages >= self.policy.flush_interval {
            self.flush()?;
        }
        Ok(())
    }

    /// 写入并清空批次，没有待写入的页面时不写
    ///
    /// 写入失败时保留批次
    pub fn flush(&mut self) -> AppResult<()> {
        if self.pending_pages == 0 {
            return Ok(());
        }

        self.sink.append(&self.batch)?;
        self.stats.sink_writes += 1;
        logging::log_batch_flush(
            self.stats.sink_writes,
            self.pending_pages,
            self.batch.len(),
            &self.sink.location(),
        );

        self.batch.clear();
        self.pending_pages = 0;
        Ok(())
    }

    async fn fetch_with_retry(&mut self, page_id: u64) -> Result<PageOutcome, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetcher.fetch(page_id).await {
                Ok(html) => return Ok(self.extract(page_id, &html)),
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    self.stats.retries += 1;
                    warn!(
                        "{} (重试 {}/{})",
                        e, attempt, self.policy.max_retries
                    );
                    sleep(self.policy.retry_backoff * attempt as u32).await;
                }
                Err(e) if e.is_transient() => {
                    warn!("❌ 放弃页面 {}: {}", page_id, e);
                    return Ok(PageOutcome::Skipped);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn extract(&mut self, page_id: u64, html: &str) -> PageOutcome {
        match self.extractor.extract_html(html) {
            Ok(extraction) => {
                info!("✓ [{}] {}", page_id, extraction.subject);
                self.stats.tables_skipped += extraction.malformed_tables.len();
                PageOutcome::Harvested(extraction.into_facts())
            }
            Err(e) => {
                warn!("⚠️ 跳过页面 {}: {}", page_id, e);
                PageOutcome::Malformed
            }
        }
    }

    fn advance(&mut self, page_id: u64) {
        self.cursor = page_id + 1;
        self.attempted += 1;
    }

    /// 保持 Ready(n)，尽量写入已有数据
    fn suspend(&mut self, e: AppError) -> AppError {
        warn!("⏸️ 采集暂停 (页码 {}): {}", self.cursor, e);
        self.flush_best_effort();
        e
    }

    /// 进入终止状态，尽量写入已有数据
    fn abort(&mut self, e: AppError) -> AppError {
        error!("🛑 采集终止 (页码 {}): {}", self.cursor, e);
        self.state = CrawlState::Aborted(e.to_string());
        self.flush_best_effort();
        e
    }

    fn flush_best_effort(&mut self) {
        if let Err(flush_err) = self.flush() {
            error!("写入剩余数据失败，{} 条数据未写入: {}", self.batch.len(), flush_err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use std::collections::VecDeque;

    /// 按预设脚本返回结果的会话
    struct ScriptedFetcher {
        script: VecDeque<Result<String, FetchError>>,
        requested: Vec<u64>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<Result<String, FetchError>>) -> Self {
            Self {
                script: script.into(),
                requested: Vec::new(),
            }
        }
    }

    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&mut self, page_id: u64) -> Result<String, FetchError> {
            self.requested.push(page_id);
            self.script.pop_front().unwrap_or(Err(FetchError::EndOfCollection {
                page_id,
                status: 404,
            }))
        }
    }

    #[derive(Default)]
    struct MemorySink {
        writes: Vec<Vec<Fact>>,
        fail: bool,
    }

    impl LogSink for MemorySink {
        fn append(&mut self, facts: &[Fact]) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::WriteFailed {
                    path: "memory".into(),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.writes.push(facts.to_vec());
            Ok(())
        }

        fn location(&self) -> String {
            "memory".into()
        }
    }

    fn strain_page(name: &str) -> String {
        format!(
            "<html><body><main><div><div><div><div><div><div><div>\
             <p>a</p><p>b</p><p>c</p><p><span>{}</span></p>\
             </div></div></div></div></div></div></div>\
             <table><tr><td>Gram stain</td><td>negative</td></tr></table>\
             </main></body></html>",
            name
        )
    }

    fn quiet_policy(flush_interval: usize) -> CrawlPolicy {
        CrawlPolicy {
            flush_interval,
            max_retries: 2,
            retry_backoff: Duration::ZERO,
            request_delay: Duration::ZERO,
            page_budget: None,
        }
    }

    fn transient(page_id: u64) -> Result<String, FetchError> {
        Err(FetchError::Transient {
            page_id,
            reason: "HTTP 503".into(),
        })
    }

    #[tokio::test]
    async fn test_cursor_advances_once_per_page() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(strain_page("A")),
            Ok("<html>no subject</html>".into()),
            transient(3),
            transient(3),
            transient(3),
        ]);
        let mut controller = CrawlController::new(fetcher, MemorySink::default(), 1, quiet_policy(10));

        controller.step().await.unwrap();
        assert_eq!(controller.cursor(), 2);
        controller.step().await.unwrap();
        assert_eq!(controller.cursor(), 3);
        // 重试两次后放弃，只前进一页
        controller.step().await.unwrap();
        assert_eq!(controller.cursor(), 4);
        assert_eq!(controller.state(), &CrawlState::Ready(4));

        let stats = controller.stats();
        assert_eq!(stats.pages_fetched, 1);
        assert_eq!(stats.pages_malformed, 1);
        assert_eq!(stats.pages_skipped, 1);
        assert_eq!(stats.retries, 2);
        assert_eq!(controller.fetcher.requested, vec![1, 2, 3, 3, 3]);
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let fetcher = ScriptedFetcher::new(vec![transient(5), Ok(strain_page("B"))]);
        let mut controller = CrawlController::new(fetcher, MemorySink::default(), 5, quiet_policy(10));

        controller.step().await.unwrap();
        assert_eq!(controller.cursor(), 6);
        assert_eq!(controller.stats().pages_fetched, 1);
        assert_eq!(controller.pending_facts(), 2);
    }

    #[tokio::test]
    async fn test_identity_rotation_error_keeps_cursor() {
        let fetcher = ScriptedFetcher::new(vec![Err(FetchError::IdentityRotation {
            source: crate::error::TorError::StartupTimeout {
                port: 9050,
                waited_secs: 10,
            },
        })]);
        let mut controller = CrawlController::new(fetcher, MemorySink::default(), 7, quiet_policy(10));

        let err = controller.step().await.unwrap_err();
        assert!(matches!(err, AppError::Fetch(FetchError::IdentityRotation { .. })));
        assert_eq!(controller.cursor(), 7);
        assert_eq!(controller.state(), &CrawlState::Ready(7));
    }

    fn rotation_failure() -> Result<String, FetchError> {
        Err(FetchError::IdentityRotation {
            source: crate::error::TorError::ControlRejected {
                command: "SIGNAL NEWNYM".into(),
                reply: "552 Unrecognized signal".into(),
            },
        })
    }

    #[tokio::test]
    async fn test_run_resumes_same_page_after_rotation_failure() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(strain_page("A")),
            rotation_failure(),
            Ok(strain_page("B")),
        ]);
        let mut controller = CrawlController::new(fetcher, MemorySink::default(), 7, quiet_policy(10));

        let err = controller.run().await.unwrap_err();
        assert!(matches!(err, AppError::Fetch(FetchError::IdentityRotation { .. })));
        assert_eq!(controller.state(), &CrawlState::Ready(8));
        assert_eq!(controller.cursor(), 8);
        // 已抓取的页面先写入
        assert_eq!(controller.sink().writes.len(), 1);
        assert_eq!(controller.pending_facts(), 0);

        let stats = controller.run().await.unwrap();
        assert_eq!(controller.state(), &CrawlState::Exhausted);
        assert_eq!(stats.pages_fetched, 2);
        assert_eq!(stats.pages_skipped, 0);
        assert_eq!(controller.fetcher.requested, vec![7, 8, 8, 9]);
        assert_eq!(controller.sink().writes[1][0], Fact::subject("B"));
    }

    #[tokio::test]
    async fn test_budget_stops_run() {
        let pages = (0..10).map(|i| Ok(strain_page(&format!("S{}", i)))).collect();
        let mut policy = quiet_policy(3);
        policy.page_budget = Some(4);
        let mut controller = CrawlController::new(ScriptedFetcher::new(pages), MemorySink::default(), 1, policy);

        let stats = controller.run().await.unwrap();
        assert_eq!(controller.state(), &CrawlState::BudgetSpent);
        assert_eq!(stats.pages_fetched, 4);
        assert_eq!(controller.cursor(), 5);
        // 3 页一次，剩余 1 页一次
        assert_eq!(controller.sink().writes.len(), 2);
        assert_eq!(controller.pending_facts(), 0);
    }

    #[tokio::test]
    async fn test_sink_failure_aborts() {
        let sink = MemorySink {
            fail: true,
            ..MemorySink::default()
        };
        let fetcher = ScriptedFetcher::new(vec![Ok(strain_page("A")), Ok(strain_page("B"))]);
        let mut controller = CrawlController::new(fetcher, sink, 1, quiet_policy(1));

        let err = controller.run().await.unwrap_err();
        assert!(matches!(err, AppError::Sink(_)));
        assert!(matches!(controller.state(), CrawlState::Aborted(_)));
        // 写入失败的数据仍保留在批次中
        assert_eq!(controller.pending_facts(), 2);
        assert_eq!(controller.cursor(), 2);

        // 终止后不能再运行
        let err = controller.run().await.unwrap_err();
        assert!(matches!(err, AppError::Aborted { .. }));
        assert_eq!(controller.fetcher.requested, vec![1]);
    }
}
