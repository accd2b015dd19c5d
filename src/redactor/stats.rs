//! 运行统计
//!
//! 计数器在轮询循环内更新，退出时打印汇总。
//! 平均耗时使用增量均值，无需保存历史样本。

use chrono::{DateTime, Local};

use crate::settings::RedactorConfig;

#[derive(Debug, Clone)]
pub struct RedactorStats {
    /// 调用分析器的次数
    pub total_checks: u64,
    pub redactions_performed: u64,
    /// 分析耗时的增量均值（毫秒）
    pub avg_processing_time_ms: f64,
    pub analysis_failures: u64,
    pub clipboard_errors: u64,
    /// 因超过长度上限而跳过的次数
    pub skipped_oversize: u64,
    pub start_time: DateTime<Local>,
}

impl Default for RedactorStats {
    fn default() -> Self {
        Self::new(Local::now())
    }
}

impl RedactorStats {
    pub fn new(start_time: DateTime<Local>) -> Self {
        Self {
            total_checks: 0,
            redactions_performed: 0,
            avg_processing_time_ms: 0.0,
            analysis_failures: 0,
            clipboard_errors: 0,
            skipped_oversize: 0,
            start_time,
        }
    }

    /// 记录一次分析调用；`elapsed_ms` 为 `None` 时只计数不计入均值
    pub fn record_check(&mut self, elapsed_ms: Option<f64>) {
        self.total_checks += 1;
        if let Some(ms) = elapsed_ms {
            let n = self.total_checks as f64;
            self.avg_processing_time_ms += (ms - self.avg_processing_time_ms) / n;
        }
    }

    pub fn runtime_seconds(&self, now: DateTime<Local>) -> f64 {
        (now - self.start_time).num_milliseconds().max(0) as f64 / 1000.0
    }

    /// 不足 1 秒时按 1 秒计算
    pub fn checks_per_second(&self, now: DateTime<Local>) -> f64 {
        self.total_checks as f64 / self.runtime_seconds(now).max(1.0)
    }

    /// 退出时打印的统计报告
    pub fn summary(&self, config: &RedactorConfig, now: DateTime<Local>) -> String {
        let rule = "=".repeat(50);
        let lines = [
            rule.clone(),
            "CLIPBOARD REDACTOR STATISTICS".to_string(),
            rule.clone(),
            format!("Runtime: {:.1} seconds", self.runtime_seconds(now)),
            format!("Total clipboard checks: {}", self.total_checks),
            format!("Redactions performed: {}", self.redactions_performed),
            format!("Average processing time: {:.2}ms", self.avg_processing_time_ms),
            format!("Checks per second: {:.2}", self.checks_per_second(now)),
            format!("Analysis failures: {}", self.analysis_failures),
            format!("Clipboard errors: {}", self.clipboard_errors),
            format!("Skipped (oversize): {}", self.skipped_oversize),
            format!("Performance target: {}ms", config.performance_target_ms),
            format!("PII entities monitored: {}", config.entities.len()),
            rule,
        ];
        lines.join("\n")
    }
}
