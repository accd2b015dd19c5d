//! 剪贴板访问模块
//!
//! # 设计思路
//!
//! 统一管理剪贴板相关的核心能力：
//! - **读写抽象**：`ClipboardBackend` trait 隔离系统剪贴板，测试时可替换为内存实现
//! - **变化检测**：`ChangeDetector` 通过内容摘要判断剪贴板是否变化
//! - **写回重试**：`writer` 子模块负责带退避的写入
//!
//! # 实现思路
//!
//! - 系统剪贴板由 `arboard` 提供；空剪贴板或非文本内容统一映射为 `Ok(None)`。
//! - 失败按 `ClipboardFailureKind` 分类，只有 Busy / Transient 会被重试。
//! - 本工具写回的脱敏文本会被 `ChangeDetector::remember` 记录，
//!   下一次轮询不会把自己的写入当作新内容。

mod change;
mod writer;

pub use change::ChangeDetector;
pub use writer::{write_with_retry, RetryPolicy};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardFailureKind {
    /// 剪贴板被其他进程占用
    Busy,
    Transient,
    Fatal,
}

/// 剪贴板读写失败
#[derive(Debug, Clone)]
pub struct ClipboardError {
    pub kind: ClipboardFailureKind,
    pub message: String,
}

impl ClipboardError {
    pub fn busy(message: impl Into<String>) -> Self {
        Self {
            kind: ClipboardFailureKind::Busy,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ClipboardFailureKind::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: ClipboardFailureKind::Fatal,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ClipboardFailureKind::Busy | ClipboardFailureKind::Transient)
    }
}

impl std::fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl From<ClipboardError> for AppError {
    fn from(error: ClipboardError) -> Self {
        AppError::Clipboard(error.to_string())
    }
}

/// 剪贴板读写接口
pub trait ClipboardBackend {
    /// 读取当前文本；剪贴板为空或不是文本时返回 `Ok(None)`
    fn read_text(&mut self) -> Result<Option<String>, ClipboardError>;

    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// 基于 `arboard` 的系统剪贴板
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, AppError> {
        let inner = arboard::Clipboard::new()
            .map_err(|e| AppError::Clipboard(format!("打开系统剪贴板失败: {}", e)))?;
        Ok(Self { inner })
    }
}

fn classify_arboard_error(error: arboard::Error) -> ClipboardError {
    match error {
        arboard::Error::ClipboardOccupied => ClipboardError::busy("剪贴板被其他进程占用"),
        arboard::Error::ClipboardNotSupported => ClipboardError::fatal("当前环境不支持剪贴板"),
        other => ClipboardError::transient(other.to_string()),
    }
}

impl ClipboardBackend for SystemClipboard {
    fn read_text(&mut self) -> Result<Option<String>, ClipboardError> {
        match self.inner.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(err) => Err(classify_arboard_error(err)),
        }
    }

    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.inner.set_text(text).map_err(classify_arboard_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_and_transient_are_retryable() {
        assert!(ClipboardError::busy("x").is_retryable());
        assert!(ClipboardError::transient("x").is_retryable());
        assert!(!ClipboardError::fatal("x").is_retryable());
    }

    #[test]
    fn occupied_clipboard_is_busy() {
        let err = classify_arboard_error(arboard::Error::ClipboardOccupied);
        assert_eq!(err.kind, ClipboardFailureKind::Busy);
    }

    #[test]
    fn converts_into_app_error() {
        let err: AppError = ClipboardError::fatal("gone").into();
        assert!(err.is_clipboard());
    }
}
