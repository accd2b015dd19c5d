//! 本地 `replace` 匿名化
//!
//! 与 presidio-anonymizer 的 `replace` 算子行为一致：
//! - 同类型相交的区间合并为并集，分数取最大值
//! - 被其他区间包含（或下标完全相同且分数不高于对方）的区间被丢弃
//! - 不同类型部分重叠时，低优先级区间只替换未被覆盖的部分
//! - 未配置的实体类型使用 `DEFAULT` 占位符
//! - 从后往前替换，前面的偏移不受影响
//!
//! 任何有效识别区间内的字符都不会残留在输出中。

use std::cmp::Ordering;
use std::collections::HashMap;

use super::{OperatorConfig, RecognizerResult, TextAnonymizer};
use crate::error::AppError;
use crate::settings::{DEFAULT_PLACEHOLDER, DEFAULT_PLACEHOLDER_KEY};

#[derive(Debug, Default, Clone)]
pub struct LocalAnonymizer;

impl LocalAnonymizer {
    pub fn new() -> Self {
        Self
    }

    /// 同步执行替换
    pub fn apply(
        &self,
        text: &str,
        results: &[RecognizerResult],
        operators: &HashMap<String, OperatorConfig>,
    ) -> Result<String, AppError> {
        // 字符下标 -> 字节偏移，末尾追加 text.len()
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let char_count = boundaries.len();
        boundaries.push(text.len());

        let candidates: Vec<RecognizerResult> = results
            .iter()
            .filter(|r| {
                let valid = r.start < r.end && r.end <= char_count;
                if !valid {
                    log::debug!(
                        "忽略越界识别结果: {} [{}, {}) / {} chars",
                        r.entity_type,
                        r.start,
                        r.end,
                        char_count
                    );
                }
                valid
            })
            .cloned()
            .collect();

        let spans = trim_intersections(drop_enclosed(merge_same_type(candidates)));

        let mut output = text.to_string();
        for span in spans.iter().rev() {
            let operator = operators
                .get(&span.entity_type)
                .or_else(|| operators.get(DEFAULT_PLACEHOLDER_KEY));

            let replacement = match operator {
                Some(op) if op.operator_name == OperatorConfig::REPLACE => op.new_value.as_str(),
                Some(op) => {
                    return Err(AppError::Anonymizer(format!(
                        "本地匿名化不支持算子 '{}'",
                        op.operator_name
                    )));
                }
                None => DEFAULT_PLACEHOLDER,
            };

            output.replace_range(boundaries[span.start]..boundaries[span.end], replacement);
        }

        Ok(output)
    }
}

/// 分数高者优先，同分时更长者优先
fn by_priority(a: &RecognizerResult, b: &RecognizerResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.len().cmp(&a.len()))
        .then_with(|| a.start.cmp(&b.start))
}

/// 同类型相交区间合并为并集
fn merge_same_type(mut spans: Vec<RecognizerResult>) -> Vec<RecognizerResult> {
    spans.sort_by(|a, b| a.entity_type.cmp(&b.entity_type).then_with(|| a.start.cmp(&b.start)));

    let mut merged: Vec<RecognizerResult> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if last.entity_type == span.entity_type && last.overlaps(&span) => {
                last.end = last.end.max(span.end);
                last.score = last.score.max(span.score);
            }
            _ => merged.push(span),
        }
    }
    merged
}

/// 丢弃被包含的区间，结果按优先级排序
fn drop_enclosed(mut spans: Vec<RecognizerResult>) -> Vec<RecognizerResult> {
    spans.sort_by(by_priority);

    spans
        .iter()
        .enumerate()
        .filter(|&(i, span)| {
            !spans
                .iter()
                .enumerate()
                .any(|(j, other)| j != i && other.contains(span) && (!other.same_span(span) || j < i))
        })
        .map(|(_, span)| span.clone())
        .collect()
}

/// 按优先级认领字符，低优先级区间裁剪到未覆盖的剩余部分
fn trim_intersections(spans: Vec<RecognizerResult>) -> Vec<RecognizerResult> {
    let mut claimed: Vec<RecognizerResult> = Vec::with_capacity(spans.len());
    for span in spans {
        let mut pieces = vec![span];
        for kept in &claimed {
            pieces = pieces.into_iter().flat_map(|piece| subtract(piece, kept)).collect();
        }
        claimed.extend(pieces);
    }
    claimed.sort_by_key(|span| span.start);
    claimed
}

fn subtract(piece: RecognizerResult, kept: &RecognizerResult) -> Vec<RecognizerResult> {
    if !piece.overlaps(kept) {
        return vec![piece];
    }

    let mut rest = Vec::with_capacity(2);
    if piece.start < kept.start {
        rest.push(RecognizerResult {
            end: kept.start,
            ..piece.clone()
        });
    }
    if kept.end < piece.end {
        rest.push(RecognizerResult {
            start: kept.end,
            ..piece
        });
    }
    rest
}

impl TextAnonymizer for LocalAnonymizer {
    async fn anonymize(
        &self,
        text: &str,
        results: &[RecognizerResult],
        operators: &HashMap<String, OperatorConfig>,
    ) -> Result<String, AppError> {
        self.apply(text, results, operators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presidio::operators_from_patterns;
    use crate::settings::default_redaction_patterns;

    fn result(entity: &str, start: usize, end: usize, score: f64) -> RecognizerResult {
        RecognizerResult {
            entity_type: entity.to_string(),
            start,
            end,
            score,
        }
    }

    fn operators() -> HashMap<String, OperatorConfig> {
        operators_from_patterns(&default_redaction_patterns())
    }

    #[test]
    fn replaces_each_entity_with_its_placeholder() {
        let text = "John Smith wrote to john@example.com";
        let results = vec![result("PERSON", 0, 10, 0.85), result("EMAIL_ADDRESS", 20, 36, 1.0)];

        let redacted = LocalAnonymizer::new().apply(text, &results, &operators()).expect("apply");
        assert_eq!(redacted, "[NAME_REDACTED] wrote to [EMAIL_REDACTED]");
    }

    #[test]
    fn unknown_entity_falls_back_to_default() {
        let text = "SSN 078-05-1120";
        let results = vec![result("US_SSN", 4, 15, 0.9)];

        let redacted = LocalAnonymizer::new().apply(text, &results, &operators()).expect("apply");
        assert_eq!(redacted, "SSN [REDACTED]");
    }

    #[test]
    fn offsets_are_counted_in_characters() {
        let text = "联系人：张伟 邮箱 zw@example.cn";
        let results = vec![result("PERSON", 4, 6, 0.7), result("EMAIL_ADDRESS", 10, 23, 1.0)];

        let redacted = LocalAnonymizer::new().apply(text, &results, &operators()).expect("apply");
        assert_eq!(redacted, "联系人：[NAME_REDACTED] 邮箱 [EMAIL_REDACTED]");
    }

    #[test]
    fn overlapping_spans_keep_highest_score() {
        let text = "visit 10.0.0.1 today";
        let results = vec![result("DATE_TIME", 6, 10, 0.4), result("IP_ADDRESS", 6, 14, 0.95)];

        let redacted = LocalAnonymizer::new().apply(text, &results, &operators()).expect("apply");
        assert_eq!(redacted, "visit [IP_REDACTED] today");
    }

    #[test]
    fn partial_overlap_trims_the_weaker_span() {
        let text = "John Smith London";
        let results = vec![result("PERSON", 0, 10, 0.85), result("LOCATION", 5, 17, 0.6)];

        let redacted = LocalAnonymizer::new().apply(text, &results, &operators()).expect("apply");
        assert_eq!(redacted, "[NAME_REDACTED][LOCATION_REDACTED]");
    }

    #[test]
    fn intersecting_spans_of_one_type_are_merged() {
        let text = "mail ann@example.com.evil now";
        let results = vec![
            result("EMAIL_ADDRESS", 5, 20, 1.0),
            result("EMAIL_ADDRESS", 9, 25, 0.9),
        ];

        let redacted = LocalAnonymizer::new().apply(text, &results, &operators()).expect("apply");
        assert_eq!(redacted, "mail [EMAIL_REDACTED] now");
    }

    #[test]
    fn enclosing_span_wins_over_enclosed_one() {
        let text = "at 221B Baker Street";
        let results = vec![result("PERSON", 8, 13, 0.9), result("LOCATION", 3, 20, 0.5)];

        let redacted = LocalAnonymizer::new().apply(text, &results, &operators()).expect("apply");
        assert_eq!(redacted, "at [LOCATION_REDACTED]");
    }

    #[test]
    fn weaker_span_between_two_stronger_ones_keeps_the_gap() {
        let text = "aaaa bbbb cccc";
        let results = vec![
            result("PERSON", 0, 6, 0.9),
            result("LOCATION", 2, 12, 0.4),
            result("EMAIL_ADDRESS", 8, 14, 0.95),
        ];

        let redacted = LocalAnonymizer::new().apply(text, &results, &operators()).expect("apply");
        assert_eq!(redacted, "[NAME_REDACTED][LOCATION_REDACTED][EMAIL_REDACTED]");
    }

    #[test]
    fn missing_default_operator_uses_builtin_placeholder() {
        let redacted = LocalAnonymizer::new()
            .apply("SSN 078-05-1120", &[result("US_SSN", 4, 15, 0.9)], &HashMap::new())
            .expect("apply");
        assert_eq!(redacted, "SSN [REDACTED]");
    }

    #[test]
    fn out_of_range_spans_are_ignored() {
        let text = "short";
        let results = vec![result("PERSON", 2, 50, 0.9), result("PERSON", 3, 3, 0.9)];

        let redacted = LocalAnonymizer::new().apply(text, &results, &operators()).expect("apply");
        assert_eq!(redacted, "short");
    }

    #[test]
    fn unsupported_operator_is_an_error() {
        let mut ops = HashMap::new();
        ops.insert(
            "PERSON".to_string(),
            OperatorConfig {
                operator_name: "hash".to_string(),
                new_value: String::new(),
            },
        );

        let err = LocalAnonymizer::new()
            .apply("Ada", &[result("PERSON", 0, 3, 0.9)], &ops)
            .unwrap_err();
        assert!(matches!(err, AppError::Anonymizer(_)));
    }
}
