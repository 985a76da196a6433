use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum YoutubeError {
    #[error("response is neither a resource nor an error object, full response: {0}")]
    InvalidResponse(String),
    #[error("API returned error code {code} ({reason}): {message}")]
    ErrorResponse { code: i64, reason: String, message: String },
    #[error("daily quota exhausted ({reason}): {message}")]
    QuotaExceeded { reason: String, message: String },
}

impl YoutubeError {
    /// 这些 reason 表示当天的配额已经耗尽，重试只会得到同样的结果
    const QUOTA_REASONS: [&'static str; 4] = [
        "quotaExceeded",
        "dailyLimitExceeded",
        "rateLimitExceeded",
        "userRateLimitExceeded",
    ];

    pub fn from_api(code: i64, reason: String, message: String) -> Self {
        if Self::QUOTA_REASONS.contains(&reason.as_str()) {
            YoutubeError::QuotaExceeded { reason, message }
        } else {
            YoutubeError::ErrorResponse { code, reason, message }
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, YoutubeError::QuotaExceeded { .. })
    }
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("client secret file has neither an 'installed' nor a 'web' section")]
    MalformedClientSecret,
    #[error("no refresh token stored, a new login is required")]
    MissingRefreshToken,
    #[error("authorization was denied: {0}")]
    AuthorizationDenied(String),
    #[error("authorization state mismatch, expected {expected}, got {actual}")]
    StateMismatch { expected: String, actual: String },
}
