//! 失败分类
//!
//! 提供方不暴露结构化错误码，只能对错误文本做子串匹配。
//! 所有匹配规则集中在 [`FAILURE_PATTERNS`]，按顺序匹配，先命中者生效。
//! HTTP 状态码只在紧跟 `HTTP` / `status` 时才计入，裸数字不参与匹配。
//! 分类只用于对外报告，不参与重试决策。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// 失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    Quota,
    RateLimit,
    Auth,
    Timeout,
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Quota => "quota",
            FailureKind::RateLimit => "rate-limit",
            FailureKind::Auth => "auth",
            FailureKind::Timeout => "timeout",
            FailureKind::Unknown => "unknown",
        }
    }
}

/// 分类结果（面向用户）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedFailure {
    pub kind: FailureKind,
    /// 简短错误信息
    pub user_message: String,
    /// 详细说明与建议
    pub user_details: String,
}

/// 匹配表：(类型, 小写关键字, HTTP 状态码)
///
/// quota 排在 rate-limit 之前：配额耗尽的响应通常同样带有 429
const FAILURE_PATTERNS: &[(FailureKind, &[&str], &[u16])] = &[
    (
        FailureKind::Quota,
        &[
            "insufficient_quota",
            "exceeded your current quota",
            "quota",
            "billing",
            "credit balance",
            "payment required",
        ],
        &[402],
    ),
    (
        FailureKind::RateLimit,
        &[
            "rate limit",
            "rate_limit",
            "ratelimit",
            "too many requests",
            "resource_exhausted",
            "overloaded",
        ],
        &[429],
    ),
    (
        FailureKind::Auth,
        &[
            "api key",
            "api_key",
            "apikey",
            "unauthorized",
            "unauthenticated",
            "invalid authentication",
            "permission denied",
            "forbidden",
            "not configured",
        ],
        &[401, 403],
    ),
    (
        FailureKind::Timeout,
        &[
            "timeout",
            "timed out",
            "deadline exceeded",
            "etimedout",
            "gateway time-out",
        ],
        &[408, 504],
    ),
];

/// `HTTP 429`、`HTTP 429:`、`status: 401`、`status code 403`
static STATUS_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:http|status)(?:\s+code)?[\s:=]*(\d{3})\b").unwrap()
});

fn status_codes(lowered: &str) -> Vec<u16> {
    STATUS_CODE
        .captures_iter(lowered)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}

const PROGRESS_NOTE: &str = "Your progress has been saved; retrying will resume where it stopped.";

/// 对错误文本分类
pub fn classify(message: &str) -> ClassifiedFailure {
    let lowered = message.to_lowercase();
    let codes = status_codes(&lowered);
    let kind = FAILURE_PATTERNS
        .iter()
        .find(|(_, needles, statuses)| {
            needles.iter().any(|n| lowered.contains(n)) || statuses.iter().any(|s| codes.contains(s))
        })
        .map(|(kind, _, _)| *kind)
        .unwrap_or(FailureKind::Unknown);

    let (user_message, hint) = match kind {
        FailureKind::Quota => (
            "The AI provider quota has been exhausted",
            "Check the provider account balance or plan limits before retrying.".to_string(),
        ),
        FailureKind::RateLimit => (
            "The AI provider is rate limiting requests",
            "Wait a minute and try again, or switch to a slower generation speed.".to_string(),
        ),
        FailureKind::Auth => (
            "The AI provider rejected the credentials",
            "Verify that the provider API key is configured and valid.".to_string(),
        ),
        FailureKind::Timeout => (
            "The AI provider took too long to respond",
            "The request timed out; try again, possibly with sequential mode.".to_string(),
        ),
        FailureKind::Unknown => ("Book generation failed", format!("Error: {}.", message)),
    };

    ClassifiedFailure {
        kind,
        user_message: user_message.to_string(),
        user_details: format!("{} {}", hint, PROGRESS_NOTE),
    }
}

/// 对任意错误分类
pub fn classify_error(err: &(dyn std::error::Error + '_)) -> ClassifiedFailure {
    classify(&err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_wins_over_rate_limit() {
        let f = classify("HTTP 429: You exceeded your current quota, please check your plan");
        assert_eq!(f.kind, FailureKind::Quota);
    }

    #[test]
    fn test_rate_limit() {
        assert_eq!(classify("HTTP 429 Too Many Requests").kind, FailureKind::RateLimit);
        assert_eq!(classify("Rate limit reached for model").kind, FailureKind::RateLimit);
    }

    #[test]
    fn test_auth() {
        assert_eq!(classify("Incorrect API key provided").kind, FailureKind::Auth);
        assert_eq!(classify("HTTP 401 Unauthorized").kind, FailureKind::Auth);
        assert_eq!(
            classify("Provider not configured: missing key").kind,
            FailureKind::Auth
        );
    }

    #[test]
    fn test_timeout() {
        assert_eq!(classify("Request timeout").kind, FailureKind::Timeout);
        assert_eq!(classify("operation timed out").kind, FailureKind::Timeout);
        assert_eq!(classify("Service error: HTTP 504: upstream").kind, FailureKind::Timeout);
    }

    #[test]
    fn test_status_code_needs_http_prefix() {
        assert_eq!(
            classify("Service error: HTTP 429: slow down").kind,
            FailureKind::RateLimit
        );
        assert_eq!(classify("status: 403").kind, FailureKind::Auth);
        assert_eq!(
            classify("Invalid response: chapter 401 came back empty").kind,
            FailureKind::Unknown
        );
        assert_eq!(
            classify("Network error: connection reset for https://api.test/v1?req=4290").kind,
            FailureKind::Unknown
        );
        assert_eq!(classify("HTTP 4290 weird").kind, FailureKind::Unknown);
    }

    #[test]
    fn test_unknown_keeps_original_message() {
        let f = classify("model returned garbage");
        assert_eq!(f.kind, FailureKind::Unknown);
        assert!(f.user_details.contains("model returned garbage"));
    }

    #[test]
    fn test_details_always_mention_saved_progress() {
        for msg in ["quota", "429", "401", "timeout", "boom"] {
            assert!(classify(msg).user_details.contains("progress has been saved"));
        }
    }

    #[test]
    fn test_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&FailureKind::RateLimit).unwrap();
        assert_eq!(json, "\"rate-limit\"");
    }
}
