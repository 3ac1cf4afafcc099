//! 输出文件 - 基础设施层
//!
//! 每次运行一个文件，以启动时间命名，只追加

use crate::error::SinkError;
use crate::models::Fact;
use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 只追加的输出目标
pub trait LogSink {
    /// 追加一批数据，同一批的内容连续写入
    fn append(&mut self, facts: &[Fact]) -> Result<(), SinkError>;

    /// 输出位置（用于日志）
    fn location(&self) -> String;
}

impl<T: LogSink + ?Sized> LogSink for &mut T {
    fn append(&mut self, facts: &[Fact]) -> Result<(), SinkError> {
        (**self).append(facts)
    }

    fn location(&self) -> String {
        (**self).location()
    }
}

/// 输出文件名：可排序且不含文件系统非法字符
pub fn log_file_name(started_at: &DateTime<Local>) -> String {
    format!("{}.txt", started_at.format("%Y-%m-%d_%H-%M-%S"))
}

/// 把一批数据序列化成输出格式
pub fn render_facts(facts: &[Fact]) -> String {
    facts.iter().map(|f| f.to_string()).collect()
}

/// 本地文件输出
pub struct FileLogSink {
    path: PathBuf,
}

impl FileLogSink {
    /// 在 output_dir 下新建本次运行的文件
    ///
    /// 同一秒内重复启动时在文件名后追加序号
    ///
    /// # 参数
    /// - `output_dir`: 输出目录，不存在时创建
    /// - `started_at`: 运行开始时间，用于文件名
    ///
    /// # 返回
    /// 指向新建空文件的输出
    pub fn create(output_dir: impl AsRef<Path>, started_at: &DateTime<Local>) -> Result<Self, SinkError> {
        let dir = output_dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| SinkError::CreateFailed {
            path: dir.display().to_string(),
            source,
        })?;

        let base = log_file_name(started_at);
        let stem = base.trim_end_matches(".txt");
        let mut n = 0u32;
        loop {
            let name = if n == 0 { base.clone() } else { format!("{}-{}.txt", stem, n) };
            let path = dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    debug!("创建输出文件: {}", path.display());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
                Err(source) => {
                    return Err(SinkError::CreateFailed {
                        path: path.display().to_string(),
                        source,
                    })
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogSink {
    fn append(&mut self, facts: &[Fact]) -> Result<(), SinkError> {
        let write_failed = |source| SinkError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        };

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(write_failed)?;
        file.write_all(render_facts(facts).as_bytes()).map_err(write_failed)?;

        debug!("写入 {} 条数据到 {}", facts.len(), self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_file_name_format() {
        assert_eq!(log_file_name(&fixed_time()), "2024-03-09_14-05-07.txt");
    }

    #[test]
    fn test_create_and_append() {
        let dir = tempdir().unwrap();
        let mut sink = FileLogSink::create(dir.path().join("Microbial_Data"), &fixed_time()).unwrap();
        assert!(sink.path().exists());
        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "");

        sink.append(&[
            Fact::subject("Escherichia coli"),
            Fact::field("Escherichia coli", "Gram stain", "negative"),
        ])
        .unwrap();
        sink.append(&[Fact::subject("Bacillus subtilis")]).unwrap();

        assert_eq!(
            fs::read_to_string(sink.path()).unwrap(),
            "|Escherichia coli;Gram stain:negative|Bacillus subtilis"
        );
    }

    #[test]
    fn test_same_second_gets_suffix() {
        let dir = tempdir().unwrap();
        let first = FileLogSink::create(dir.path(), &fixed_time()).unwrap();
        let second = FileLogSink::create(dir.path(), &fixed_time()).unwrap();
        assert_ne!(first.path(), second.path());
        assert!(second.location().ends_with("2024-03-09_14-05-07-1.txt"));
    }
}
