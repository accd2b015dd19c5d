//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，替代各模块中分散的
//! `.map_err(|e| e.to_string())`、`format!(...)`、`expect()` 等不一致模式。
//!
//! 轮询循环按错误分支决定后续动作：
//! - `Clipboard`：记录日志，下一轮重试
//! - `Analyzer` / `Anonymizer`：记录日志，跳过本轮
//! - `Config`：启动阶段直接失败
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `std::io::Error`、`serde_json::Error` 提供 `From` 转换，无需手动 map。

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 剪贴板读写操作失败
    #[error("剪贴板操作失败: {0}")]
    Clipboard(String),

    /// PII 分析服务调用失败
    #[error("PII 分析失败: {0}")]
    Analyzer(String),

    /// 匿名化服务调用失败
    #[error("匿名化失败: {0}")]
    Anonymizer(String),

    /// 配置无效或无法加载
    #[error("配置错误: {0}")]
    Config(String),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化 / 反序列化失败
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// 是否应在下一次轮询时重试（而非跳过内容）
    pub fn is_clipboard(&self) -> bool {
        matches!(self, Self::Clipboard(_))
    }
}
