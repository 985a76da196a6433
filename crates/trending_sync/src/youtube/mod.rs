use anyhow::{Context, Result, bail};
pub use client::{Auth, Client, Cost, YoutubeClient};
pub use credential::{ClientSecret, Credential, CredentialStore};
pub use error::{CredentialError, YoutubeError};
pub use playlist::{Playlist, PlaylistItem};
pub use region::Region;
use serde::Deserialize;
pub use video::VideoItem;

mod chart;
mod client;
mod credential;
mod error;
mod playlist;
mod region;
mod video;

/// 单页最多返回的条目数，YouTube 所有 list 接口的上限都是 50
pub const MAX_RESULTS: u32 = 50;

pub(crate) trait Validate {
    type Output;

    fn validate(self) -> Result<Self::Output>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

impl Validate for serde_json::Value {
    type Output = serde_json::Value;

    fn validate(self) -> Result<Self::Output> {
        let Some(error) = self.get("error") else {
            return Ok(self);
        };
        let body: ErrorBody = match ErrorBody::deserialize(error) {
            Ok(body) => body,
            Err(_) => bail!(YoutubeError::InvalidResponse(self.to_string())),
        };
        let reason = body
            .errors
            .into_iter()
            .map(|e| e.reason)
            .find(|r| !r.is_empty())
            .unwrap_or_else(|| "unknown".to_owned());
        bail!(YoutubeError::from_api(body.code, reason, body.message))
    }
}

/// YouTube 在非 2xx 状态码下仍然会返回包含 error 对象的 json，
/// 因此不能直接使用 error_for_status，需要先读出 body 再判断
pub(crate) trait ResponseExt {
    async fn validated_json(self) -> Result<serde_json::Value>;
}

impl ResponseExt for reqwest::Response {
    async fn validated_json(self) -> Result<serde_json::Value> {
        let status = self.status();
        let url = self.url().path().to_owned();
        let body = self.text().await.with_context(|| format!("failed to read body of {url}"))?;
        // delete 之类的接口成功时返回 204 和空 body
        if body.trim().is_empty() {
            if status.is_success() {
                return Ok(serde_json::Value::Null);
            }
            bail!(YoutubeError::ErrorResponse {
                code: status.as_u16() as i64,
                reason: "emptyBody".to_owned(),
                message: format!("{url} returned {status} without a body"),
            });
        }
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(value) => {
                let value = value.validate()?;
                if !status.is_success() {
                    bail!(YoutubeError::InvalidResponse(value.to_string()));
                }
                Ok(value)
            }
            Err(e) if status.is_success() => Err(e).with_context(|| format!("failed to decode body of {url}")),
            Err(_) => bail!(YoutubeError::ErrorResponse {
                code: status.as_u16() as i64,
                reason: "nonJsonBody".to_owned(),
                message: body.chars().take(200).collect(),
            }),
        }
    }
}

/// 所有 list 接口共用的分页响应结构
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T: serde::de::DeserializeOwned> ListResponse<T> {
    pub(crate) fn from_value(value: serde_json::Value, what: &str) -> Result<Self> {
        serde_json::from_value(value).with_context(|| format!("unexpected shape of {what} response"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_validate_passes_resources_through() {
        let value = json!({"kind": "youtube#videoListResponse", "items": []});
        assert_eq!(value.clone().validate().unwrap(), value);
    }

    #[test]
    fn test_validate_extracts_quota_error() {
        let value = json!({
            "error": {
                "code": 403,
                "message": "The request cannot be completed because you have exceeded your quota.",
                "errors": [{"message": "exceeded", "domain": "youtube.quota", "reason": "quotaExceeded"}]
            }
        });
        let err = value.validate().unwrap_err();
        let err = err.downcast_ref::<YoutubeError>().unwrap();
        assert!(err.is_quota_exceeded());
    }

    #[test]
    fn test_validate_rejects_malformed_error() {
        let value = json!({"error": "boom"});
        let err = value.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<YoutubeError>(),
            Some(YoutubeError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_list_response_defaults() {
        let resp: ListResponse<serde_json::Value> =
            ListResponse::from_value(json!({"pageInfo": {"totalResults": 0}}), "test").unwrap();
        assert!(resp.items.is_empty());
        assert!(resp.next_page_token.is_none());
    }
}
