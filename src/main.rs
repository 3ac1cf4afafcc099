use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use strain_harvest::{logging, App, Config};

/// 菌株数据采集
#[derive(Debug, Parser)]
#[command(name = "strain_harvest", version)]
struct Cli {
    /// TOML 配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 起始页码
    #[arg(long)]
    start: Option<u64>,

    /// 最多抓取的页数
    #[arg(long)]
    pages: Option<u64>,

    /// 输出目录
    #[arg(long)]
    out: Option<String>,

    /// 通过 Tor 抓取
    #[arg(long)]
    tor: bool,

    /// 只提取本地 HTML 文件
    #[arg(long, value_name = "HTML_FILE")]
    offline: Option<PathBuf>,

    /// 显示详细日志
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// 默认值 < 配置文件 < 环境变量 < 命令行
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_toml_file(path)
                .with_context(|| format!("加载配置失败: {}", path.display()))?
                .with_env(),
            None => Config::from_env(),
        };
        if let Some(start) = self.start {
            config.start_page = start;
        }
        if let Some(pages) = self.pages {
            config.page_budget = Some(pages);
        }
        if let Some(out) = &self.out {
            config.output_dir = out.clone();
        }
        config.use_tor |= self.tor;
        config.verbose_logging |= self.verbose;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = cli.resolve_config()?;

    // 初始化日志
    logging::init(config.verbose_logging);

    let app = App::initialize(config)?;

    if let Some(path) = &cli.offline {
        app.extract_file(path)?;
        return Ok(());
    }

    app.run().await?;

    Ok(())
}
