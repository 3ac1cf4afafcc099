//! 日志工具模块
//!
//! 初始化 tracing，并提供运行开始、批次写入和最终统计的输出

use crate::config::Config;
use crate::orchestrator::CrawlStats;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化日志输出
///
/// 优先使用 `RUST_LOG`，否则按 verbose 选择 info / debug；重复调用无副作用
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 菌株数据采集");
    info!("🌐 页面地址: {}{{id}}", config.base_url);
    info!("📄 起始页: {}", config.start_page);
    match config.page_budget {
        Some(budget) => info!("📊 最多抓取: {} 页", budget),
        None => info!("📊 抓取直到站点返回 4xx"),
    }
    info!("💾 每 {} 页写入一次: {}/", config.flush_interval, config.output_dir);
    if config.use_tor {
        info!("🧅 通过 Tor 抓取 (SOCKS: {})", config.tor_socks_port);
    }
    info!("{}", "=".repeat(60));
}

/// 记录批次写入信息
///
/// # 参数
/// - `write_no`: 第几次写入
/// - `pages`: 本批包含的页数
/// - `facts`: 本批数据条数
/// - `location`: 输出位置
pub fn log_batch_flush(write_no: usize, pages: usize, facts: usize, location: &str) {
    info!("{}", "─".repeat(60));
    info!("💾 第 {} 次写入: {} 页, {} 条数据 -> {}", write_no, pages, facts, location);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `stats`: 采集统计
/// - `next_page`: 下一次运行应从哪一页开始
/// - `location`: 输出位置
pub fn print_final_stats(stats: &CrawlStats, next_page: u64, location: &str) {
    info!("{}", "=".repeat(60));
    info!("📊 采集完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {} 页", stats.pages_fetched);
    info!("⚠️ 结构异常: {} 页, 跳过表格行: {}", stats.pages_malformed, stats.tables_skipped);
    info!("❌ 放弃: {} 页 (重试 {} 次)", stats.pages_skipped, stats.retries);
    info!("📝 数据: {} 条, 写入 {} 次", stats.facts, stats.sink_writes);
    info!("➡️ 下一页: {}", next_page);
    info!("{}", "=".repeat(60));
    info!("数据已保存至: {}", location);
}
