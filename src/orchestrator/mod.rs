//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 管理应用生命周期（初始化、运行、清理）
//! - 选择直连或 Tor 会话
//! - 保证 tor 在任何退出路径上都被停止
//!
//! ### `crawl_controller` - 翻页采集控制器
//! - 持有页码游标和待写入批次
//! - 逐页抓取、重试、提取
//! - 判断采集结束，按批写入
//!
//! ## 层次关系
//!
//! ```text
//! app (生命周期、资源)
//!     ↓
//! crawl_controller (页码、批次、重试)
//!     ↓
//! services (能力层：extractor / identity / page_fetcher)
//!     ↓
//! infrastructure (基础设施：HTTP / tor / 输出文件)
//! ```

pub mod app;
pub mod crawl_controller;

// 重新导出主要类型
pub use app::App;
pub use crawl_controller::{CrawlController, CrawlPolicy, CrawlState, CrawlStats};
