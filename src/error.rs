use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 页面获取错误
    #[error("抓取错误: {0}")]
    Fetch(#[from] FetchError),
    /// 页面解析错误
    #[error("解析错误: {0}")]
    Extract(#[from] ExtractError),
    /// 输出文件错误
    #[error("输出错误: {0}")]
    Sink(#[from] SinkError),
    /// Tor 相关错误
    #[error("Tor错误: {0}")]
    Tor(#[from] TorError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 控制器已因致命错误终止，不能继续运行
    #[error("采集已终止: {reason}")]
    Aborted { reason: String },
    /// 读取本地页面失败
    #[error("无法读取输入文件 ({path}): {source}")]
    Input {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 页面获取错误
#[derive(Debug, Error)]
pub enum FetchError {
    /// 站点返回 4xx，视为已无更多页面
    #[error("页面 {page_id} 不存在 (HTTP {status})，采集结束")]
    EndOfCollection { page_id: u64, status: u16 },

    /// 网络/超时/5xx 等临时错误，可重试
    #[error("页面 {page_id} 临时获取失败: {reason}")]
    Transient { page_id: u64, reason: String },

    /// 无法更换 Tor 线路，请求未发出
    #[error("更换身份失败: {source}")]
    IdentityRotation {
        #[source]
        source: TorError,
    },
}

impl FetchError {
    /// 是否是可重试的临时错误
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// 页面解析错误
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// 页面中找不到菌株名称
    #[error("页面结构异常，找不到菌株名称 (选择器: {selector})")]
    MalformedPage { selector: String },

    /// 表格行的子元素数量不足
    #[error("表格 {trait_id} 结构异常: 需要至少 {required} 个子元素，实际 {found} 个")]
    MalformedTable {
        trait_id: String,
        required: usize,
        found: usize,
    },
}

/// 输出文件错误，全部视为致命错误
#[derive(Debug, Error)]
pub enum SinkError {
    /// 创建输出目录或文件失败
    #[error("无法创建输出文件 ({path}): {source}")]
    CreateFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 写入失败
    #[error("写入输出文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Tor 相关错误
#[derive(Debug, Error)]
pub enum TorError {
    /// 启动 tor 进程失败
    #[error("无法启动 tor ({binary}): {source}")]
    LaunchFailed {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// 等待 SOCKS 端口就绪超时
    #[error("tor 在 {waited_secs} 秒内未就绪 (SOCKS 端口: {port})")]
    StartupTimeout { port: u16, waited_secs: u64 },

    /// 控制端口连接或读写失败
    #[error("控制端口 {port} 通信失败: {source}")]
    ControlIo {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// 控制端口返回了非 250 的应答
    #[error("控制命令 {command} 被拒绝: {reply}")]
    ControlRejected { command: String, reply: String },

    /// 构建代理客户端失败
    #[error("无法构建代理客户端: {0}")]
    ProxySetup(#[source] reqwest::Error),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置值非法
    #[error("配置项 {field} 的值 '{value}' 非法: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// 读取配置文件失败
    #[error("无法读取配置文件 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// 构建 HTTP 客户端失败
    #[error("无法构建 HTTP 客户端: {0}")]
    HttpClient(#[source] reqwest::Error),
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建配置值非法错误
    pub fn invalid_config(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        AppError::Config(ConfigError::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
