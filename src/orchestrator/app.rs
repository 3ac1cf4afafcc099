//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：校验配置、输出启动信息
//! 2. **资源管理**：创建输出文件、HTTP 客户端，按需启动 tor
//! 3. **采集调度**：把会话和输出交给 `CrawlController`
//! 4. **资源释放**：无论成功失败都关闭会话（停止 tor 并等待监控任务）
//! 5. **离线提取**：对保存在本地的页面做同样的提取

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::log_sink::render_facts;
use crate::infrastructure::{FileLogSink, HttpDocumentSource, LogSink, TorNetwork};
use crate::orchestrator::crawl_controller::{CrawlController, CrawlPolicy, CrawlStats};
use crate::services::{DirectSession, Extractor, IdentityRotatingSession, PageFetcher};
use crate::utils::logging;
use chrono::{DateTime, Local};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 应用主结构
pub struct App {
    config: Config,
    started_at: DateTime<Local>,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> AppResult<Self> {
        config.validate()?;
        logging::log_startup(&config);

        Ok(Self {
            config,
            started_at: Local::now(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> AppResult<CrawlStats> {
        let sink = FileLogSink::create(&self.config.output_dir, &self.started_at)?;
        info!("📁 输出文件: {}", sink.location());

        if self.config.use_tor {
            let session = IdentityRotatingSession::new(
                HttpDocumentSource::via_tor(&self.config)?,
                TorNetwork::new(&self.config),
                StdRng::from_os_rng(),
                self.config.identity_min_len..=self.config.identity_max_len,
            );
            self.crawl(session, sink).await
        } else {
            let session = DirectSession::new(HttpDocumentSource::new(&self.config)?);
            self.crawl(session, sink).await
        }
    }

    /// 用给定会话和输出执行采集，结束后总会关闭会话
    pub async fn crawl<F, K>(&self, fetcher: F, sink: K) -> AppResult<CrawlStats>
    where
        F: PageFetcher,
        K: LogSink,
    {
        let mut controller = CrawlController::new(
            fetcher,
            sink,
            self.config.start_page,
            CrawlPolicy::from_config(&self.config),
        );

        let result = controller.run().await;
        controller.fetcher_mut().shutdown().await;

        logging::print_final_stats(
            controller.stats(),
            controller.cursor(),
            &controller.sink().location(),
        );
        result
    }

    /// 离线提取本地 HTML 文件，结果写入新的输出文件
    ///
    /// 返回输出文件路径
    pub fn extract_file(&self, html_path: &Path) -> AppResult<PathBuf> {
        let html = std::fs::read_to_string(html_path).map_err(|source| AppError::Input {
            path: html_path.display().to_string(),
            source,
        })?;

        let extraction = Extractor::new().extract_html(&html)?;
        info!("✓ {} -> {} 条数据", extraction.subject, extraction.facts.len());
        let facts = extraction.into_facts();
        debug!("{}", render_facts(&facts));

        let mut sink = FileLogSink::create(&self.config.output_dir, &self.started_at)?;
        sink.append(&facts)?;
        info!("数据已保存至: {}", sink.location());
        Ok(sink.path().to_path_buf())
    }
}
