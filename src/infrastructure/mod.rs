//! 基础设施层：持有网络客户端、tor 进程和输出文件，只暴露能力

pub mod document_source;
pub mod log_sink;
pub mod tor;
pub mod tor_control;

pub use document_source::{classify_status, DocumentSource, HttpDocumentSource, PageStatus};
pub use log_sink::{FileLogSink, LogSink};
pub use tor::{CircuitControl, TorNetwork};
pub use tor_control::TorController;
