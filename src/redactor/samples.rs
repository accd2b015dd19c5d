//! 脱敏样本记录
//!
//! 开启 `save_redaction_examples` 后，每次成功脱敏追加一条样本到 JSON 数组文件，
//! 仅保留最近 100 条。样本只包含脱敏后的文本，原文只记录长度。

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const MAX_SAMPLES: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactionSample {
    pub timestamp: String,
    pub original_length: usize,
    pub redacted_length: usize,
    pub pii_types: Vec<String>,
    pub redacted_text: String,
}

impl RedactionSample {
    pub fn new(original: &str, redacted: &str, pii_types: Vec<String>) -> Self {
        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            original_length: original.chars().count(),
            redacted_length: redacted.chars().count(),
            pii_types,
            redacted_text: redacted.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SampleLog {
    path: PathBuf,
    max_entries: usize,
}

impl SampleLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_entries: MAX_SAMPLES,
        }
    }

    /// 读取已有样本；文件损坏时从空列表开始
    pub fn load(&self) -> Result<Vec<RedactionSample>, AppError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(samples) => Ok(samples),
            Err(err) => {
                log::warn!("样本文件 '{}' 无法解析，将重新创建: {}", self.path.display(), err);
                Ok(Vec::new())
            }
        }
    }

    pub fn append(&self, sample: RedactionSample) -> Result<(), AppError> {
        let mut samples = self.load()?;
        samples.push(sample);
        if samples.len() > self.max_entries {
            let excess = samples.len() - self.max_entries;
            samples.drain(..excess);
        }

        let content = serde_json::to_string_pretty(&samples)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}
