//! Tor 进程管理 - 基础设施层
//!
//! 持有 tor 子进程和后台监控任务，只暴露 启动 / 换线路 / 停止 三种能力

use crate::config::Config;
use crate::error::TorError;
use crate::infrastructure::tor_control::TorController;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// 匿名网络的控制能力
#[allow(async_fn_in_trait)]
pub trait CircuitControl {
    /// 确保匿名网络可用（已在运行则直接返回）
    async fn start(&mut self) -> Result<(), TorError>;
    /// 申请新的线路
    async fn new_identity(&mut self) -> Result<(), TorError>;
    /// 停止由本程序启动的进程并等待监控任务结束
    async fn stop(&mut self);
}

/// 本机端口是否已被占用
pub fn port_in_use(port: u16) -> bool {
    std::net::TcpListener::bind(("127.0.0.1", port)).is_err()
}

/// 后台监控任务
struct Monitor {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Tor 网络：子进程 + 控制端口
pub struct TorNetwork {
    binary: String,
    socks_port: u16,
    control_port: u16,
    startup_timeout: Duration,
    controller: TorController,
    monitor: Option<Monitor>,
    running: bool,
}

impl TorNetwork {
    pub fn new(config: &Config) -> Self {
        Self {
            binary: config.tor_binary.clone(),
            socks_port: config.tor_socks_port,
            control_port: config.tor_control_port,
            startup_timeout: config.tor_startup_timeout(),
            controller: TorController::new(
                config.tor_control_port,
                config.tor_control_password.clone(),
                config.tor_control_timeout(),
            ),
            monitor: None,
            running: false,
        }
    }

    /// 子进程是否由本程序启动
    pub fn is_managed(&self) -> bool {
        self.monitor.is_some()
    }

    fn launch(&mut self) -> Result<(), TorError> {
        info!("🧅 正在启动 tor: {}", self.binary);
        let child = Command::new(&self.binary)
            .arg("--SocksPort")
            .arg(self.socks_port.to_string())
            .arg("--ControlPort")
            .arg(self.control_port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TorError::LaunchFailed {
                binary: self.binary.clone(),
                source,
            })?;

        self.attach(child);
        Ok(())
    }

    /// 交给后台任务监控，stop 时终止
    fn attach(&mut self, child: Child) {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(supervise(child, shutdown_rx));
        self.monitor = Some(Monitor { shutdown, handle });
    }

    /// 轮询 SOCKS 端口直到可以连接
    async fn wait_until_ready(&self) -> Result<(), TorError> {
        let started = Instant::now();
        loop {
            if TcpStream::connect(("127.0.0.1", self.socks_port)).await.is_ok() {
                debug!("tor 就绪，用时 {:?}", started.elapsed());
                return Ok(());
            }
            if started.elapsed() >= self.startup_timeout {
                return Err(TorError::StartupTimeout {
                    port: self.socks_port,
                    waited_secs: self.startup_timeout.as_secs(),
                });
            }
            sleep(Duration::from_millis(250)).await;
        }
    }
}

impl CircuitControl for TorNetwork {
    async fn start(&mut self) -> Result<(), TorError> {
        if self.running {
            return Ok(());
        }

        if port_in_use(self.socks_port) {
            info!("🧅 端口 {} 已被占用，视为 tor 已在运行", self.socks_port);
        } else {
            self.launch()?;
            if let Err(e) = self.wait_until_ready().await {
                self.stop().await;
                return Err(e);
            }
        }

        self.running = true;
        info!("✓ tor 已就绪 (SOCKS: {}, 控制端口: {})", self.socks_port, self.control_port);
        Ok(())
    }

    async fn new_identity(&mut self) -> Result<(), TorError> {
        self.controller.new_identity().await
    }

    async fn stop(&mut self) {
        self.running = false;
        let Some(monitor) = self.monitor.take() else {
            return;
        };

        // 进程可能已自行退出，此时接收端已关闭
        let _ = monitor.shutdown.send(());
        if let Err(e) = monitor.handle.await {
            error!("tor 监控任务异常结束: {}", e);
        }
    }
}

/// 等待子进程退出或收到停止信号
async fn supervise(mut child: Child, shutdown: oneshot::Receiver<()>) {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = shutdown => None,
    };

    match exited {
        Some(Ok(status)) => warn!("tor 进程意外退出: {}", status),
        Some(Err(e)) => error!("等待 tor 进程失败: {}", e),
        None => match child.kill().await {
            Ok(()) => info!("🧅 tor 进程已终止"),
            Err(e) => warn!("终止 tor 进程失败: {}", e),
        },
    }
}
