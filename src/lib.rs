//! # Strain Harvest
//!
//! 按页码逐页抓取菌株数据页面，提取字段后写入以时间命名的文本文件，供后续整理成表格
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（HTTP 客户端、tor 进程、输出文件），只暴露能力
//! - `HttpDocumentSource` - 按页码取回 HTML，区分成功 / 采集结束 / 临时错误
//! - `TorNetwork` - tor 子进程 + 控制端口
//! - `FileLogSink` - 只追加的输出文件
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个页面
//! - `Extractor` - 标量字段 + 表格字段提取
//! - `IdentityRotatingSession` - 每次请求前换线路、换 User-Agent
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/crawl_controller` - 页码游标、重试、批量写入
//! - `orchestrator/app` - 生命周期和资源释放
//!
//! ## 输出格式
//!
//! 每页先写 `|菌株名`，再写若干 `;字段:值`，没有其他分隔符

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{Fact, FieldTaxonomy};
pub use orchestrator::{App, CrawlController, CrawlStats};
pub use services::Extractor;
pub use utils::logging;
