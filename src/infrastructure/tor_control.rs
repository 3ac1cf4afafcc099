//! Tor 控制端口客户端
//!
//! 只实现换线路需要的三条命令：AUTHENTICATE / SIGNAL NEWNYM / QUIT

use crate::error::TorError;
use regex::Regex;
use std::io::ErrorKind;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// `250 OK` / `250-version=...` / `250+...`
static REPLY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{3})([ +\-])(.*)$").expect("常量正则"));

/// 控制端口应答的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    pub code: u16,
    /// 是否是最后一行
    pub is_final: bool,
    pub text: String,
}

pub fn parse_reply_line(line: &str) -> Option<ReplyLine> {
    let caps = REPLY_LINE.captures(line.trim_end_matches(['\r', '\n']))?;
    Some(ReplyLine {
        code: caps[1].parse().ok()?,
        is_final: &caps[2] == " ",
        text: caps[3].to_string(),
    })
}

/// 控制端口客户端
#[derive(Debug, Clone)]
pub struct TorController {
    port: u16,
    password: Option<String>,
    /// 整个会话（连接 + 三条命令）的时限
    timeout: Duration,
}

impl TorController {
    pub fn new(port: u16, password: Option<String>, timeout: Duration) -> Self {
        Self {
            port,
            password,
            timeout,
        }
    }

    /// 申请新的线路
    ///
    /// 任一命令不是 250 都返回错误；超过时限按通信失败处理
    pub async fn new_identity(&self) -> Result<(), TorError> {
        match timeout(self.timeout, self.exchange()).await {
            Ok(result) => result,
            Err(_) => Err(self.io_error(std::io::Error::new(
                ErrorKind::TimedOut,
                format!("{:?} 内没有应答", self.timeout),
            ))),
        }
    }

    async fn exchange(&self) -> Result<(), TorError> {
        let stream = TcpStream::connect(("127.0.0.1", self.port))
            .await
            .map_err(|source| self.io_error(source))?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        self.command(&mut reader, &mut write_half, "AUTHENTICATE", &self.auth_command())
            .await?;
        self.command(&mut reader, &mut write_half, "SIGNAL NEWNYM", "SIGNAL NEWNYM")
            .await?;
        // QUIT 失败不影响结果
        let _ = self.command(&mut reader, &mut write_half, "QUIT", "QUIT").await;

        debug!("已申请新的 Tor 线路");
        Ok(())
    }

    fn auth_command(&self) -> String {
        match &self.password {
            Some(pw) => format!("AUTHENTICATE \"{}\"", pw.replace('\\', "\\\\").replace('"', "\\\"")),
            None => "AUTHENTICATE".to_string(),
        }
    }

    /// 发送一条命令并读取完整应答，`label` 用于错误信息（不含密码）
    async fn command<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
        label: &str,
        line: &str,
    ) -> Result<ReplyLine, TorError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .map_err(|source| self.io_error(source))?;
        writer.flush().await.map_err(|source| self.io_error(source))?;

        loop {
            let mut buf = String::new();
            let read = reader
                .read_line(&mut buf)
                .await
                .map_err(|source| self.io_error(source))?;
            if read == 0 {
                return Err(self.io_error(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "控制端口已关闭",
                )));
            }

            let reply = parse_reply_line(&buf).ok_or_else(|| TorError::ControlRejected {
                command: label.to_string(),
                reply: buf.trim_end().to_string(),
            })?;
            if !reply.is_final {
                continue;
            }
            if reply.code != 250 {
                return Err(TorError::ControlRejected {
                    command: label.to_string(),
                    reply: format!("{} {}", reply.code, reply.text),
                });
            }
            return Ok(reply);
        }
    }

    fn io_error(&self, source: std::io::Error) -> TorError {
        TorError::ControlIo {
            port: self.port,
            source,
        }
    }
}
