//! # 剪贴板脱敏工具 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  main ── check-config / run（Ctrl+C 退出并打印统计）      │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↓
//! ┌───────┴──────────────────────────────────────────────────┐
//! │  redactor ──── 轮询循环 + 单条内容处理 + 统计/样本        │
//! │     │                                                    │
//! │     ├─ clipboard ── arboard 读写 · 变化检测 · 写回重试    │
//! │     └─ presidio ─── analyzer / anonymizer（HTTP / 本地）  │
//! │                                                          │
//! │  settings ── JSON 配置 + CLIPRE_* 环境变量 + 校验         │
//! │  logging ─── env_logger（可同时写入日志文件）             │
//! │  error ───── AppError（统一错误类型）                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`settings`] | 配置加载、环境变量覆盖、校验 |
//! | [`logging`] | 日志初始化 |
//! | [`clipboard`] | 剪贴板读写抽象、变化检测、写回重试 |
//! | [`presidio`] | Presidio 调用契约、REST 客户端、本地 `replace` 匿名化 |
//! | [`redactor`] | 轮询编排、统计、脱敏样本 |

pub mod error;
pub mod clipboard;
pub mod logging;
pub mod presidio;
pub mod redactor;
pub mod settings;
