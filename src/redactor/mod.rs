//! # 剪贴板脱敏编排模块
//!
//! ## 设计思路
//!
//! `Redactor` 只负责流程编排，不关心剪贴板和 Presidio 的具体实现。
//! 单次轮询链路固定为：
//! 1. 读取剪贴板文本
//! 2. 与上一次内容比对，未变化则结束
//! 3. 调用分析器（计时，超出目标耗时告警）
//! 4. 有识别结果时调用匿名化器
//! 5. 文本发生变化时写回剪贴板，并记录写回内容避免二次处理
//!
//! ## 实现思路
//!
//! - 剪贴板、分析器、匿名化器均为泛型参数，测试时注入替身实现。
//! - 统计数据放在 `Mutex` 中，`process_content` 只需 `&self`，循环结束后仍可读取最终报告。
//! - 写回重试与等待都是异步的，退出信号随时可以打断。
//! - 剪贴板读失败：记录并在下一轮重试；分析/匿名化失败：记录并跳过本轮。
//! - 日志只记录实体类型、置信度与长度，从不输出剪贴板原文。

mod samples;
mod stats;

pub use samples::{RedactionSample, SampleLog, MAX_SAMPLES};
pub use stats::RedactorStats;

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::clipboard::{write_with_retry, ChangeDetector, ClipboardBackend, RetryPolicy};
use crate::error::AppError;
use crate::presidio::{
    operators_from_patterns, AnalyzeRequest, OperatorConfig, PiiAnalyzer, RecognizerResult,
    TextAnonymizer,
};
use crate::settings::RedactorConfig;

const ERROR_BACKOFF_BASE_MS: u64 = 1_000;
const ERROR_BACKOFF_MAX_MS: u64 = 30_000;
/// DEBUG 级别下周期性打印统计的间隔
const STATS_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// 连续失败时的等待时间：1s 起步，指数增长，30s 封顶
fn compute_error_backoff_ms(consecutive_errors: u32) -> u64 {
    let exp = 1_u64 << consecutive_errors.saturating_sub(1).min(6);
    ERROR_BACKOFF_BASE_MS.saturating_mul(exp).min(ERROR_BACKOFF_MAX_MS)
}

/// 单次轮询的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// 剪贴板为空或不是文本
    Empty,
    Unchanged,
    /// 已分析，无需修改
    Clean,
    /// 已写回脱敏文本
    Redacted,
}

/// 剪贴板脱敏器
pub struct Redactor<C, A, N> {
    config: RedactorConfig,
    clipboard: C,
    analyzer: A,
    anonymizer: N,
    detector: ChangeDetector,
    operators: HashMap<String, OperatorConfig>,
    retry_policy: RetryPolicy,
    samples: Option<SampleLog>,
    stats: Mutex<RedactorStats>,
}

impl<C, A, N> Redactor<C, A, N>
where
    C: ClipboardBackend,
    A: PiiAnalyzer,
    N: TextAnonymizer,
{
    pub fn new(config: RedactorConfig, clipboard: C, analyzer: A, anonymizer: N) -> Self {
        let detector = ChangeDetector::new(config.enable_content_hashing, config.hash_algorithm);
        let operators = operators_from_patterns(&config.redaction_patterns);
        let samples = config
            .save_redaction_examples
            .then(|| SampleLog::new(config.examples_file.clone()));

        log::info!("监控 {} 种 PII 实体类型", config.entities.len());
        log::debug!("PII 实体: {}", config.entities.join(", "));

        Self {
            config,
            clipboard,
            analyzer,
            anonymizer,
            detector,
            operators,
            retry_policy: RetryPolicy::default(),
            samples,
            stats: Mutex::new(RedactorStats::default()),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn config(&self) -> &RedactorConfig {
        &self.config
    }

    pub fn stats_snapshot(&self) -> RedactorStats {
        self.lock_stats().clone()
    }

    fn lock_stats(&self) -> MutexGuard<'_, RedactorStats> {
        match self.stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("统计数据锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    async fn analyze_text(&self, text: &str) -> Result<Vec<RecognizerResult>, AppError> {
        let request = AnalyzeRequest {
            text,
            language: &self.config.language,
            entities: &self.config.entities,
            score_threshold: self.config.confidence_threshold,
        };

        let started = Instant::now();
        let results = self.analyzer.analyze(&request).await?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let monitoring = self.config.enable_performance_monitoring;

        // 失败的调用只计入 analysis_failures
        self.lock_stats().record_check(monitoring.then_some(elapsed_ms));
        log::debug!("分析完成，耗时 {:.2}ms，识别到 {} 个实体", elapsed_ms, results.len());

        if monitoring && elapsed_ms > self.config.performance_target_ms as f64 {
            log::warn!(
                "⏱️ 分析耗时 {:.2}ms 超过目标 {}ms",
                elapsed_ms,
                self.config.performance_target_ms
            );
        }

        Ok(results)
    }

    /// 处理一段剪贴板文本
    ///
    /// # 返回
    /// - `Some(脱敏文本)`：检测到 PII 且文本发生变化
    /// - `None`：无需修改（空白、超长、无 PII、分析失败等）
    pub async fn process_content(&self, content: &str) -> Option<String> {
        if content.trim().is_empty() {
            return None;
        }

        let char_count = content.chars().count();
        if char_count > self.config.max_clipboard_chars {
            log::warn!(
                "跳过超长剪贴板内容（{} 字符，上限 {}）",
                char_count,
                self.config.max_clipboard_chars
            );
            self.lock_stats().skipped_oversize += 1;
            return None;
        }

        let results = match self.analyze_text(content).await {
            Ok(results) => results,
            Err(err) => {
                log::error!("分析剪贴板内容失败，跳过本轮: {}", err);
                self.lock_stats().analysis_failures += 1;
                return None;
            }
        };

        if results.is_empty() {
            log::debug!("剪贴板内容未检测到 PII");
            return None;
        }

        let detected: BTreeSet<&str> = results.iter().map(|r| r.entity_type.as_str()).collect();
        log::info!("检测到 PII: {}", detected.iter().copied().collect::<Vec<_>>().join(", "));
        log::debug!(
            "PII 明细: {}",
            results
                .iter()
                .map(|r| format!("{}({:.2})", r.entity_type, r.score))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let redacted = match self.anonymizer.anonymize(content, &results, &self.operators).await {
            Ok(text) => text,
            Err(err) => {
                log::error!("脱敏失败，跳过本轮: {}", err);
                self.lock_stats().analysis_failures += 1;
                return None;
            }
        };

        if redacted == content {
            return None;
        }

        self.lock_stats().redactions_performed += 1;
        log::info!("剪贴板内容已脱敏（{} 个实体）", results.len());

        if let Some(samples) = &self.samples {
            let pii_types = results.iter().map(|r| r.entity_type.clone()).collect();
            if let Err(err) = samples.append(RedactionSample::new(content, &redacted, pii_types)) {
                log::error!("保存脱敏样本失败: {}", err);
            }
        }

        Some(redacted)
    }

    /// 执行一次轮询
    pub async fn poll_once(&mut self) -> Result<PollOutcome, AppError> {
        let content = match self.clipboard.read_text() {
            Ok(Some(text)) if !text.is_empty() => text,
            Ok(_) => return Ok(PollOutcome::Empty),
            Err(err) => {
                self.lock_stats().clipboard_errors += 1;
                return Err(err.into());
            }
        };

        if !self.detector.has_changed(&content) {
            return Ok(PollOutcome::Unchanged);
        }
        log::debug!("剪贴板内容已变化，开始分析");

        let Some(redacted) = self.process_content(&content).await else {
            return Ok(PollOutcome::Clean);
        };

        if let Err(err) = write_with_retry(&mut self.clipboard, &redacted, &self.retry_policy).await {
            // 原文仍在剪贴板中，下一轮需要重新处理
            self.detector.forget();
            self.lock_stats().clipboard_errors += 1;
            return Err(err.into());
        }

        self.detector.remember(&redacted);
        log::info!("📋 剪贴板已更新为脱敏内容");
        Ok(PollOutcome::Redacted)
    }

    /// 轮询直到 `shutdown` 完成
    pub async fn run<S>(&mut self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let report_stats = self.config.level_filter() >= log::LevelFilter::Debug;
        let mut stats_tick = tokio::time::interval(STATS_REPORT_INTERVAL);
        stats_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        stats_tick.tick().await;

        let mut consecutive_errors: u32 = 0;
        log::info!("开始监控剪贴板，轮询间隔 {:?}", self.config.poll_interval());

        'polling: loop {
            let polled = tokio::select! {
                _ = &mut shutdown => break,
                polled = self.poll_once() => polled,
            };

            let wait_for = match polled {
                Ok(outcome) => {
                    consecutive_errors = 0;
                    log::trace!("轮询结果: {:?}", outcome);
                    self.config.poll_interval()
                }
                Err(err) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    let backoff_ms = compute_error_backoff_ms(consecutive_errors);
                    log::error!(
                        "剪贴板监控出错，{}ms 后重试（attempt={}）: {}",
                        backoff_ms,
                        consecutive_errors,
                        err
                    );
                    Duration::from_millis(backoff_ms)
                }
            };

            // 打印统计不打断等待，退避时间照常走完
            let wait = tokio::time::sleep(wait_for);
            tokio::pin!(wait);
            loop {
                tokio::select! {
                    _ = &mut shutdown => break 'polling,
                    _ = &mut wait => break,
                    _ = stats_tick.tick(), if report_stats => {
                        println!("\n{}", self.stats_snapshot().summary(&self.config, chrono::Local::now()));
                    }
                }
            }
        }

        log::info!("剪贴板监控已停止");
    }
}
