use std::sync::Once;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::{Method, header};

use crate::youtube::Credential;

pub const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// 各类调用的配额消耗，参考 https://developers.google.com/youtube/v3/determine_quota_cost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cost {
    List,
    Write,
}

impl Cost {
    pub fn units(self) -> u64 {
        match self {
            Cost::List => 1,
            Cost::Write => 50,
        }
    }
}

// 一个对 reqwest::Client 的简单封装，用于 YouTube 请求
#[derive(Clone)]
pub struct Client(reqwest::Client);

impl Client {
    pub fn new() -> Self {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = rustls::crypto::ring::default_provider().install_default();
        });
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(concat!("trending-sync/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        Self(
            reqwest::Client::builder()
                .default_headers(headers)
                .gzip(true)
                .connect_timeout(Duration::from_secs(10))
                .read_timeout(Duration::from_secs(30))
                .build()
                .expect("failed to build reqwest client"),
        )
    }

    // 如果有 credential，以 bearer token 的形式附加到请求头中
    pub fn request(&self, method: Method, url: &str, credential: Option<&Credential>) -> reqwest::RequestBuilder {
        let req = self.0.request(method, url);
        match credential {
            Some(credential) => req.bearer_auth(&credential.access_token),
            None => req,
        }
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.0
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

/// 请求的鉴权方式：只读接口使用开发者 key，写接口需要 OAuth 凭据
#[derive(Clone)]
pub enum Auth {
    ApiKey(String),
    OAuth(Credential),
}

pub struct YoutubeClient {
    pub client: Client,
    auth: Auth,
    cost: AtomicU64,
}

impl YoutubeClient {
    pub fn new(auth: Auth) -> Self {
        Self::with_client(Client::new(), auth)
    }

    pub fn with_client(client: Client, auth: Auth) -> Self {
        Self {
            client,
            auth,
            cost: AtomicU64::new(0),
        }
    }

    /// 获取一个预构建的请求，path 相对于 API_BASE，同时记录本次调用的配额消耗
    pub fn request(&self, method: Method, path: &str, cost: Cost) -> reqwest::RequestBuilder {
        self.cost.fetch_add(cost.units(), Ordering::Relaxed);
        let url = format!("{}/{}", API_BASE, path.trim_start_matches('/'));
        match &self.auth {
            Auth::ApiKey(key) => self.client.request(method, &url, None).query(&[("key", key.as_str())]),
            Auth::OAuth(credential) => self.client.request(method, &url, Some(credential)),
        }
    }

    /// 截至目前累计消耗的配额
    pub fn cost(&self) -> u64 {
        self.cost.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_request_auth_and_cost() {
        let client = YoutubeClient::new(Auth::ApiKey("secret".to_owned()));
        let req = client
            .request(Method::GET, "/videos", Cost::List)
            .query(&[("part", "id")])
            .build()
            .unwrap();
        assert_eq!(
            req.url().as_str(),
            "https://www.googleapis.com/youtube/v3/videos?key=secret&part=id"
        );
        assert!(req.headers().get(header::AUTHORIZATION).is_none());
        let _ = client.request(Method::DELETE, "playlistItems", Cost::Write);
        assert_eq!(client.cost(), 51);

        let client = YoutubeClient::new(Auth::OAuth(Credential {
            access_token: "ya29.token".to_owned(),
            refresh_token: None,
            expires_at: Utc::now(),
            scopes: vec![],
        }));
        let req = client.request(Method::POST, "playlistItems", Cost::Write).build().unwrap();
        assert_eq!(req.headers()[header::AUTHORIZATION], "Bearer ya29.token");
        assert_eq!(req.url().query(), None);
        assert_eq!(client.cost(), 50);
    }
}
