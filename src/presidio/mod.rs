//! # Presidio 接入模块
//!
//! ## 设计思路
//!
//! PII 识别与匿名化完全交给 Microsoft Presidio，本模块只定义调用契约：
//!
//! ```text
//! 文本 + 语言 + 实体白名单 + 阈值
//!    ↓
//! PiiAnalyzer::analyze      → Vec<RecognizerResult>（类型 / 区间 / 置信度）
//!    ↓
//! TextAnonymizer::anonymize → 脱敏文本
//! ```
//!
//! - `client`：通过 HTTP 调用 presidio-analyzer / presidio-anonymizer 服务
//! - `local`：只执行 `replace` 算子的本地匿名化，省去一次网络往返
//!
//! ## 实现思路
//!
//! - 两个 trait 均返回 `impl Future + Send`，调用方按泛型持有，无需装箱。
//! - 区间偏移沿用 Presidio 约定：按 Unicode 字符计数，而非字节。

mod client;
mod local;

use std::collections::HashMap;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub use client::PresidioClient;
pub use local::LocalAnonymizer;

/// 分析请求（对应 `POST /analyze` 请求体）
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeRequest<'a> {
    pub text: &'a str,
    pub language: &'a str,
    pub entities: &'a [String],
    pub score_threshold: f64,
}

/// 单个识别结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizerResult {
    pub entity_type: String,
    /// 起始字符下标（含）
    pub start: usize,
    /// 结束字符下标（不含）
    pub end: usize,
    pub score: f64,
}

impl RecognizerResult {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &RecognizerResult) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &RecognizerResult) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn same_span(&self, other: &RecognizerResult) -> bool {
        self.start == other.start && self.end == other.end
    }
}

/// 匿名化算子配置（对应 Presidio 的 `OperatorConfig`）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorConfig {
    #[serde(rename = "type")]
    pub operator_name: String,
    pub new_value: String,
}

impl OperatorConfig {
    pub const REPLACE: &'static str = "replace";

    pub fn replace(new_value: impl Into<String>) -> Self {
        Self {
            operator_name: Self::REPLACE.to_string(),
            new_value: new_value.into(),
        }
    }
}

/// 由占位符配置生成每种实体的 `replace` 算子
pub fn operators_from_patterns(patterns: &HashMap<String, String>) -> HashMap<String, OperatorConfig> {
    patterns
        .iter()
        .map(|(entity, placeholder)| (entity.clone(), OperatorConfig::replace(placeholder.clone())))
        .collect()
}

/// PII 分析器
pub trait PiiAnalyzer {
    fn analyze(
        &self,
        request: &AnalyzeRequest<'_>,
    ) -> impl Future<Output = Result<Vec<RecognizerResult>, AppError>> + Send;
}

/// 文本匿名化器
pub trait TextAnonymizer {
    fn anonymize(
        &self,
        text: &str,
        results: &[RecognizerResult],
        operators: &HashMap<String, OperatorConfig>,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// 运行时选择的匿名化实现
pub enum AnonymizerBackend {
    Remote(PresidioClient),
    Local(LocalAnonymizer),
}

impl AnonymizerBackend {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Remote(_) => "presidio-anonymizer",
            Self::Local(_) => "local-replace",
        }
    }
}

impl TextAnonymizer for AnonymizerBackend {
    async fn anonymize(
        &self,
        text: &str,
        results: &[RecognizerResult],
        operators: &HashMap<String, OperatorConfig>,
    ) -> Result<String, AppError> {
        match self {
            Self::Remote(client) => client.anonymize(text, results, operators).await,
            Self::Local(local) => local.anonymize(text, results, operators).await,
        }
    }
}
