//! 剪贴板变化检测
//!
//! 只保存上一次内容的摘要（或关闭摘要时保存原文），
//! 相同内容重复出现时不会触发第二次分析。

use sha2::{Digest, Sha256, Sha512};

use crate::settings::HashAlgorithm;

/// 剪贴板变化检测器
#[derive(Debug)]
pub struct ChangeDetector {
    /// `None` 表示直接比较原文
    algorithm: Option<HashAlgorithm>,
    last_fingerprint: Option<String>,
}

impl ChangeDetector {
    pub fn new(enable_hashing: bool, algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm: enable_hashing.then_some(algorithm),
            last_fingerprint: None,
        }
    }

    fn fingerprint(&self, text: &str) -> String {
        match self.algorithm {
            Some(HashAlgorithm::Sha256) => hex(&Sha256::digest(text.as_bytes())),
            Some(HashAlgorithm::Sha512) => hex(&Sha512::digest(text.as_bytes())),
            None => text.to_string(),
        }
    }

    /// 内容与上一次不同时返回 `true`，并记录新内容
    pub fn has_changed(&mut self, text: &str) -> bool {
        let fingerprint = self.fingerprint(text);
        if self.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            return false;
        }
        self.last_fingerprint = Some(fingerprint);
        true
    }

    /// 记录本工具写回的内容，避免下一轮把它当作新变化
    pub fn remember(&mut self, text: &str) {
        self.last_fingerprint = Some(self.fingerprint(text));
    }

    /// 清空记录，下一次读取必定视为变化
    pub fn forget(&mut self) {
        self.last_fingerprint = None;
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_is_reported_once() {
        let mut detector = ChangeDetector::new(true, HashAlgorithm::Sha256);
        assert!(detector.has_changed("alice@example.com"));
        assert!(!detector.has_changed("alice@example.com"));
        assert!(detector.has_changed("bob@example.com"));
        assert!(detector.has_changed("alice@example.com"));
    }

    #[test]
    fn remembered_content_is_not_a_change() {
        let mut detector = ChangeDetector::new(true, HashAlgorithm::Sha512);
        assert!(detector.has_changed("call 555-0100"));
        detector.remember("call [PHONE_REDACTED]");
        assert!(!detector.has_changed("call [PHONE_REDACTED]"));
    }

    #[test]
    fn forgotten_content_is_seen_again() {
        let mut detector = ChangeDetector::new(true, HashAlgorithm::Sha256);
        assert!(detector.has_changed("x"));
        detector.forget();
        assert!(detector.has_changed("x"));
    }

    #[test]
    fn raw_comparison_without_hashing() {
        let mut detector = ChangeDetector::new(false, HashAlgorithm::Sha256);
        assert!(detector.has_changed("a"));
        assert!(!detector.has_changed("a"));
        assert_eq!(detector.last_fingerprint.as_deref(), Some("a"));
    }

    #[test]
    fn sha256_fingerprint_is_hex_encoded() {
        let detector = ChangeDetector::new(true, HashAlgorithm::Sha256);
        assert_eq!(
            detector.fingerprint("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
