//! # 剪贴板写回模块
//!
//! ## 设计思路
//!
//! 其他应用同样在监听剪贴板时，写入可能短暂失败（剪贴板被占用）。
//! 写回脱敏文本必须尽量成功，否则原始 PII 会留在剪贴板中，因此进行有限重试。
//!
//! ## 实现思路
//!
//! - 指数退避 + 抖动，单次延迟与总耗时都有上限。
//! - `Fatal` 错误立即返回，不消耗重试预算。
//! - 退避使用 `tokio::time::sleep`，等待期间不占用运行时线程。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use super::{ClipboardBackend, ClipboardError};

/// 写入重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 首次失败后的最大重试次数
    pub retries: u32,
    pub base_delay_ms: u64,
    /// 单次退避延迟上限（毫秒）
    pub max_delay_ms: u64,
    /// 整个写入流程允许的总预算（毫秒）
    pub max_total_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 900,
            max_total_ms: 1_800,
        }
    }
}

static JITTER_STATE: AtomicU64 = AtomicU64::new(0);

fn seed_jitter_state() -> u64 {
    let time_seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let state = time_seed ^ ((std::process::id() as u64) << 32) ^ 0x9E37_79B9_7F4A_7C15;
    if state == 0 { 0xA5A5_5A5A_0123_4567 } else { state }
}

fn next_jitter_u64() -> u64 {
    let mut current = JITTER_STATE.load(Ordering::Relaxed);

    loop {
        let mut next = if current == 0 { seed_jitter_state() } else { current };
        next ^= next << 13;
        next ^= next >> 7;
        next ^= next << 17;

        match JITTER_STATE.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => current = observed,
        }
    }
}

fn capped_backoff_ms(base_delay_ms: u64, attempt: u32, max_delay_ms: u64) -> u64 {
    base_delay_ms
        .saturating_mul(1_u64 << attempt.saturating_sub(1).min(8))
        .min(max_delay_ms.max(base_delay_ms))
}

fn compute_backoff_delay_with_jitter(base_delay_ms: u64, attempt: u32, max_delay_ms: u64) -> u64 {
    let capped = capped_backoff_ms(base_delay_ms, attempt, max_delay_ms);
    let jitter_bound = (capped / 3).max(1);
    capped.saturating_add(next_jitter_u64() % (jitter_bound + 1))
}

fn would_exceed_retry_budget(elapsed_ms: u64, wait_ms: u64, budget_ms: u64) -> bool {
    elapsed_ms.saturating_add(wait_ms) > budget_ms
}

/// 写入剪贴板（含重试）
///
/// 总耗时受 `max_total_ms` 约束；future 被丢弃时重试随之取消。
pub async fn write_with_retry<B>(backend: &mut B, text: &str, policy: &RetryPolicy) -> Result<(), ClipboardError>
where
    B: ClipboardBackend + ?Sized,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        let err = match backend.write_text(text) {
            Ok(()) => {
                if attempt > 0 {
                    log::debug!("📋 剪贴板写入在第 {} 次重试后成功", attempt);
                }
                return Ok(());
            }
            Err(err) => err,
        };

        if !err.is_retryable() || attempt >= policy.retries {
            log::warn!("📋 剪贴板写入失败（attempt={}）: {}", attempt, err);
            return Err(err);
        }

        attempt += 1;
        let wait_ms = compute_backoff_delay_with_jitter(policy.base_delay_ms, attempt, policy.max_delay_ms);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if would_exceed_retry_budget(elapsed_ms, wait_ms, policy.max_total_ms) {
            log::warn!(
                "📋 剪贴板写入重试预算耗尽: elapsed={}ms wait={}ms budget={}ms",
                elapsed_ms,
                wait_ms,
                policy.max_total_ms
            );
            return Err(ClipboardError::busy(format!("重试预算耗尽: {}", err.message)));
        }

        log::debug!("📋 剪贴板写入失败，{}ms 后重试（attempt={}）: {}", wait_ms, attempt, err);
        tokio::time::sleep(Duration::from_millis(wait_ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use super::*;

    struct FlakyClipboard {
        failures_left: u32,
        failure: ClipboardError,
        writes: u32,
        content: Option<String>,
    }

    impl ClipboardBackend for FlakyClipboard {
        fn read_text(&mut self) -> Result<Option<String>, ClipboardError> {
            Ok(self.content.clone())
        }

        fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
            self.writes += 1;
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(self.failure.clone());
            }
            self.content = Some(text.to_string());
            Ok(())
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 4,
            max_total_ms: 1_000,
        }
    }

    #[test]
    fn backoff_grows_then_caps() {
        assert_eq!(capped_backoff_ms(100, 1, 900), 100);
        assert_eq!(capped_backoff_ms(100, 2, 900), 200);
        assert_eq!(capped_backoff_ms(100, 3, 900), 400);
        assert_eq!(capped_backoff_ms(100, 5, 900), 900);
    }

    #[test]
    fn jitter_stays_within_a_third() {
        for attempt in 1..6 {
            let delay = compute_backoff_delay_with_jitter(90, attempt, 900);
            let capped = capped_backoff_ms(90, attempt, 900);
            assert!(delay >= capped && delay <= capped + capped / 3);
        }
    }

    #[test]
    fn budget_check_is_inclusive() {
        assert!(!would_exceed_retry_budget(900, 900, 1_800));
        assert!(would_exceed_retry_budget(901, 900, 1_800));
    }

    #[tokio::test]
    async fn busy_clipboard_eventually_written() {
        let mut clipboard = FlakyClipboard {
            failures_left: 2,
            failure: ClipboardError::busy("occupied"),
            writes: 0,
            content: None,
        };

        write_with_retry(&mut clipboard, "[REDACTED]", &fast_policy()).await.expect("write");
        assert_eq!(clipboard.writes, 3);
        assert_eq!(clipboard.content.as_deref(), Some("[REDACTED]"));
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let mut clipboard = FlakyClipboard {
            failures_left: 5,
            failure: ClipboardError::fatal("unsupported"),
            writes: 0,
            content: None,
        };

        let err = write_with_retry(&mut clipboard, "x", &fast_policy()).await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(clipboard.writes, 1);
    }

    #[tokio::test]
    async fn gives_up_after_configured_retries() {
        let mut clipboard = FlakyClipboard {
            failures_left: 10,
            failure: ClipboardError::transient("flaky"),
            writes: 0,
            content: None,
        };

        assert!(write_with_retry(&mut clipboard, "x", &fast_policy()).await.is_err());
        assert_eq!(clipboard.writes, 4);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn backoff_does_not_block_other_tasks() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let ticker = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(5)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let mut clipboard = FlakyClipboard {
            failures_left: u32::MAX,
            failure: ClipboardError::busy("occupied"),
            writes: 0,
            content: None,
        };
        let policy = RetryPolicy {
            retries: 10,
            base_delay_ms: 40,
            max_delay_ms: 40,
            max_total_ms: 300,
        };

        assert!(write_with_retry(&mut clipboard, "x", &policy).await.is_err());
        ticker.abort();

        // 单线程运行时上，阻塞式等待会让计时任务一次都跑不了
        assert!(clipboard.writes > 1);
        assert!(ticks.load(Ordering::SeqCst) >= 5, "ticks={}", ticks.load(Ordering::SeqCst));
    }
}
