//! 运行配置模块
//!
//! # 设计思路
//!
//! 将所有可调参数集中到 `RedactorConfig`：轮询间隔、实体白名单、置信度阈值、
//! 占位符、Presidio 服务地址等。配置来源按优先级叠加：
//! 1. 内置默认值（`Default`）
//! 2. JSON 配置文件（缺失字段回退默认值）
//! 3. `CLIPRE_*` 环境变量（含 `.env` 文件）
//!
//! # 实现思路
//!
//! - 文件不存在时静默使用默认值；文件损坏时返回 `AppError::Config`，避免静默吞掉用户配置。
//! - 环境变量通过 `lookup` 闭包注入，便于测试时不污染进程环境。
//! - `validate()` 返回错误列表而非首个错误，方便一次性展示全部问题。

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_PLACEHOLDER_KEY: &str = "DEFAULT";
/// 未配置 `DEFAULT` 时的最终占位符
pub const DEFAULT_PLACEHOLDER: &str = "[REDACTED]";

const POLL_INTERVAL_MIN_MS: u64 = 10;
const POLL_INTERVAL_MAX_MS: u64 = 60_000;

const VALID_LOG_LEVELS: [&str; 4] = ["DEBUG", "INFO", "WARNING", "ERROR"];

/// Presidio 实体类型命名：大写字母、数字与下划线
static ENTITY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("实体名正则无效"));

/// 剪贴板变化检测使用的摘要算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }
}

/// 剪贴板脱敏器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactorConfig {
    /// 剪贴板轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 单次处理允许的最大字符数，超出则跳过
    pub max_clipboard_chars: usize,
    /// 日志级别：DEBUG / INFO / WARNING / ERROR
    pub log_level: String,
    pub log_to_file: bool,
    pub log_file: PathBuf,
    /// 启用的 PII 实体类型
    pub entities: Vec<String>,
    /// 实体类型 -> 占位符，`DEFAULT` 为兜底占位符
    pub redaction_patterns: HashMap<String, String>,
    /// 单次分析耗时目标（毫秒），超出时告警
    pub performance_target_ms: u64,
    pub enable_performance_monitoring: bool,
    /// 关闭后直接比较原文（占用更多内存）
    pub enable_content_hashing: bool,
    pub hash_algorithm: HashAlgorithm,
    /// 最低置信度（0.0 ~ 1.0）
    pub confidence_threshold: f64,
    pub language: String,
    /// 是否保存脱敏样本（仅保存脱敏后的文本）
    pub save_redaction_examples: bool,
    pub examples_file: PathBuf,
    /// presidio-analyzer 服务地址
    pub analyzer_url: String,
    /// presidio-anonymizer 服务地址；未配置时在本地替换
    pub anonymizer_url: Option<String>,
    pub request_timeout_ms: u64,
}

pub fn default_entities() -> Vec<String> {
    [
        "PERSON",
        "EMAIL_ADDRESS",
        "PHONE_NUMBER",
        "IP_ADDRESS",
        "LOCATION",
        "DATE_TIME",
        "CRYPTO",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_redaction_patterns() -> HashMap<String, String> {
    [
        (DEFAULT_PLACEHOLDER_KEY, DEFAULT_PLACEHOLDER),
        ("PERSON", "[NAME_REDACTED]"),
        ("EMAIL_ADDRESS", "[EMAIL_REDACTED]"),
        ("PHONE_NUMBER", "[PHONE_REDACTED]"),
        ("IP_ADDRESS", "[IP_REDACTED]"),
        ("CRYPTO", "[CRYPTO_REDACTED]"),
        ("LOCATION", "[LOCATION_REDACTED]"),
        ("DATE_TIME", "[DATE_REDACTED]"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for RedactorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            max_clipboard_chars: 10_000,
            log_level: "INFO".to_string(),
            log_to_file: true,
            log_file: PathBuf::from("clipboard_redactor.log"),
            entities: default_entities(),
            redaction_patterns: default_redaction_patterns(),
            performance_target_ms: 200,
            enable_performance_monitoring: true,
            enable_content_hashing: true,
            hash_algorithm: HashAlgorithm::Sha256,
            confidence_threshold: 0.5,
            language: "en".to_string(),
            save_redaction_examples: false,
            examples_file: PathBuf::from("redaction_examples.json"),
            analyzer_url: "http://localhost:5002".to_string(),
            anonymizer_url: None,
            request_timeout_ms: 5_000,
        }
    }
}

fn normalize_poll_interval_ms(value_ms: u64) -> u64 {
    value_ms.clamp(POLL_INTERVAL_MIN_MS, POLL_INTERVAL_MAX_MS)
}

impl RedactorConfig {
    /// 从 JSON 文件加载配置
    ///
    /// # 返回
    /// - 文件不存在：`Ok(默认配置)`
    /// - 文件存在但无法解析：`Err(AppError::Config)`
    pub fn load_from_path(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            log::debug!("配置文件不存在，使用默认配置: {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("解析配置文件 '{}' 失败: {}", path.display(), e)))
    }

    /// 用环境变量覆盖配置
    ///
    /// 数值解析失败时保持原值。
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secs) = lookup("CLIPRE_POLL_INTERVAL").and_then(|v| v.trim().parse::<f64>().ok()) {
            if secs.is_finite() && secs > 0.0 {
                self.poll_interval_ms = (secs * 1000.0).round() as u64;
            } else {
                // 保留非法值交给 validate() 报告
                self.poll_interval_ms = 0;
            }
        }

        if let Some(level) = lookup("CLIPRE_LOG_LEVEL") {
            self.log_level = level.trim().to_uppercase();
        }

        if let Some(threshold) =
            lookup("CLIPRE_CONFIDENCE_THRESHOLD").and_then(|v| v.trim().parse::<f64>().ok())
        {
            self.confidence_threshold = threshold;
        }

        if let Some(url) = lookup("CLIPRE_ANALYZER_URL") {
            self.analyzer_url = url.trim().to_string();
        }

        if let Some(url) = lookup("CLIPRE_ANONYMIZER_URL") {
            let url = url.trim();
            self.anonymizer_url = if url.is_empty() { None } else { Some(url.to_string()) };
        }
    }

    /// 校验配置，返回全部错误描述
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.poll_interval_ms == 0 {
            errors.push("poll_interval_ms 必须为正数".to_string());
        }
        if self.max_clipboard_chars == 0 {
            errors.push("max_clipboard_chars 必须为正数".to_string());
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level 必须是以下之一: {}",
                VALID_LOG_LEVELS.join(", ")
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            errors.push("confidence_threshold 必须在 0.0 ~ 1.0 之间".to_string());
        }
        if self.performance_target_ms == 0 {
            errors.push("performance_target_ms 必须为正数".to_string());
        }
        if self.entities.is_empty() {
            errors.push("entities 不能为空".to_string());
        }
        for entity in &self.entities {
            if !ENTITY_NAME.is_match(entity) {
                errors.push(format!("实体类型 '{}' 命名无效（应为大写下划线形式）", entity));
            }
        }
        if !self.redaction_patterns.contains_key(DEFAULT_PLACEHOLDER_KEY) {
            errors.push(format!("redaction_patterns 缺少 {} 占位符", DEFAULT_PLACEHOLDER_KEY));
        }
        if self.language.trim().is_empty() {
            errors.push("language 不能为空".to_string());
        }
        if !is_http_url(&self.analyzer_url) {
            errors.push(format!("analyzer_url '{}' 不是有效的 http(s) 地址", self.analyzer_url));
        }
        if let Some(url) = &self.anonymizer_url {
            if !is_http_url(url) {
                errors.push(format!("anonymizer_url '{}' 不是有效的 http(s) 地址", url));
            }
        }
        if self.request_timeout_ms == 0 {
            errors.push("request_timeout_ms 必须为正数".to_string());
        }

        errors
    }

    /// 实际生效的轮询间隔（限制在合理区间内）
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(normalize_poll_interval_ms(self.poll_interval_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// `log` crate 对应的级别过滤器
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.log_level.as_str() {
            "DEBUG" => log::LevelFilter::Debug,
            "WARNING" => log::LevelFilter::Warn,
            "ERROR" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        }
    }
}

fn is_http_url(url: &str) -> bool {
    reqwest::Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

/// 默认配置文件路径：`CLIPRE_CONFIG` 优先，否则 `<config_dir>/clipboard-redactor/config.json`
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("CLIPRE_CONFIG") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join("clipboard-redactor").join("config.json"))
        .unwrap_or_else(|| PathBuf::from("config.json"))
}

/// 加载 `.env`、配置文件与环境变量覆盖后的最终配置
pub fn load_effective_config(path: &Path) -> Result<RedactorConfig, AppError> {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            log::warn!("读取 .env 文件失败: {}", err);
        }
    }

    let mut config = RedactorConfig::load_from_path(path)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}
