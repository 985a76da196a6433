use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use crate::utils::{dump_json, load_json, remove_if_exists};
use crate::youtube::{Client, CredentialError};

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_owned()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_owned()
}

/// Google Cloud Console 下载的 client_secrets.json 中的应用信息
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ClientSecret {
    /// 桌面应用位于 installed 下，网页应用位于 web 下
    pub fn from_value(mut value: serde_json::Value) -> Result<Self> {
        let Some(section) = ["installed", "web"]
            .into_iter()
            .find_map(|key| value.get_mut(key).map(serde_json::Value::take))
        else {
            bail!(CredentialError::MalformedClientSecret);
        };
        serde_json::from_value(section).context("client secret is missing client_id or client_secret")
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_value(load_json(path)?).with_context(|| format!("invalid client secret file {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    /// 预留一分钟的余量，避免请求发出后才过期
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && self.expires_at - TimeDelta::seconds(60) > now
    }

    pub fn covers(&self, scopes: &[String]) -> bool {
        scopes.iter().all(|s| self.scopes.contains(s))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
    scope: Option<String>,
}

impl TokenResponse {
    /// 刷新接口通常不会再返回 refresh_token，此时沿用旧的
    fn into_credential(self, previous_refresh_token: Option<String>, requested: &[String], now: DateTime<Utc>) -> Credential {
        let scopes = match self.scope {
            Some(scope) => scope.split_whitespace().map(str::to_owned).collect(),
            None => requested.to_vec(),
        };
        Credential {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh_token),
            expires_at: now + TimeDelta::seconds(self.expires_in),
            scopes,
        }
    }
}

/// 授权服务器重定向回本地时携带的参数
#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code { code: String, state: String },
    Denied(String),
}

impl Callback {
    /// 与授权无关的请求（例如不带参数的 GET /）返回 None
    fn from_query(mut params: HashMap<String, String>) -> Option<Self> {
        if let Some(error) = params.remove("error") {
            return Some(Callback::Denied(error));
        }
        Some(Callback::Code {
            code: params.remove("code")?,
            state: params.remove("state").unwrap_or_default(),
        })
    }
}

async fn redirect(
    State(sender): State<mpsc::Sender<Callback>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, &'static str) {
    let Some(callback) = Callback::from_query(params) else {
        return (StatusCode::NOT_FOUND, "Not Found");
    };
    let body = match &callback {
        Callback::Code { .. } => "Authorization complete, you may close this window.",
        Callback::Denied(_) => "Authorization failed, check the terminal for details.",
    };
    // 只处理第一个回调
    let _ = sender.try_send(callback);
    (StatusCode::OK, body)
}

/// 在本地回环地址上等待浏览器带着授权码重定向回来
async fn wait_for_code(listener: TcpListener, expected_state: &str) -> Result<String> {
    let (sender, mut receiver) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let app = Router::new().route("/", get(redirect)).with_state(sender);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown_rx.await;
    });
    let server = tokio::spawn(async move { server.await });
    let Some(callback) = receiver.recv().await else {
        server
            .await
            .context("redirect server panicked")?
            .context("redirect server failed")?;
        bail!("redirect server stopped before the authorization callback arrived");
    };
    let _ = shutdown_tx.send(());
    match callback {
        Callback::Code { code, state } if state == expected_state => Ok(code),
        Callback::Code { state, .. } => bail!(CredentialError::StateMismatch {
            expected: expected_state.to_owned(),
            actual: state,
        }),
        Callback::Denied(reason) => bail!(CredentialError::AuthorizationDenied(reason)),
    }
}

/// 负责 OAuth 凭据的读取、刷新、登录与失效，凭据以 json 的形式保存在 path
pub struct CredentialStore {
    client: Client,
    secret: ClientSecret,
    path: PathBuf,
    scopes: Vec<String>,
}

impl CredentialStore {
    pub fn new(client: Client, secret: ClientSecret, path: PathBuf, scopes: Vec<String>) -> Self {
        Self {
            client,
            secret,
            path,
            scopes,
        }
    }

    /// 读取保存的凭据，文件不存在时返回 None
    pub fn load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            return Ok(None);
        }
        load_json(&self.path)
            .map(Some)
            .with_context(|| format!("failed to load credential from {}", self.path.display()))
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        dump_json(&self.path, credential, true)?;
        debug!("credential saved to {}", self.path.display());
        Ok(())
    }

    /// 删除保存的凭据，下次运行会重新登录
    pub fn invalidate(&self) -> Result<()> {
        warn!("invalidating stored credential {}", self.path.display());
        remove_if_exists(&self.path)
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let res = self
            .client
            .request(Method::POST, &self.secret.token_uri, None)
            .form(params)
            .send()
            .await
            .context("failed to reach the token endpoint")?;
        let status = res.status();
        let body = res
            .json::<serde_json::Value>()
            .await
            .context("token endpoint returned a non-json body")?;
        if !status.is_success() || body.get("error").is_some() {
            let error = body["error"].as_str().unwrap_or("unknown_error");
            let description = body["error_description"].as_str().unwrap_or_default();
            bail!(CredentialError::AuthorizationDenied(format!("{error}: {description}")));
        }
        serde_json::from_value(body).context("unexpected shape of token response")
    }

    pub async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let Some(refresh_token) = credential.refresh_token.as_deref() else {
            bail!(CredentialError::MissingRefreshToken);
        };
        let res = self
            .token_request(&[
                ("client_id", self.secret.client_id.as_str()),
                ("client_secret", self.secret.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;
        let refreshed = res.into_credential(credential.refresh_token.clone(), &self.scopes, Utc::now());
        self.save(&refreshed)?;
        info!("credential refreshed, valid until {}", refreshed.expires_at);
        Ok(refreshed)
    }

    /// 交互式登录：打印授权链接，在本地回环地址上接收授权码并换取凭据
    pub async fn login(&self) -> Result<Credential> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind loopback listener")?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
        let state = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect::<String>();
        let scope = self.scopes.join(" ");
        let query = serde_urlencoded::to_string([
            ("client_id", self.secret.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", state.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ])?;
        info!("open the following url in a browser to authorize this application:");
        info!("{}?{}", self.secret.auth_uri, query);
        let code = wait_for_code(listener, &state).await?;
        let res = self
            .token_request(&[
                ("code", code.as_str()),
                ("client_id", self.secret.client_id.as_str()),
                ("client_secret", self.secret.client_secret.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .await?;
        let credential = res.into_credential(None, &self.scopes, Utc::now());
        self.save(&credential)?;
        info!("login succeeded");
        Ok(credential)
    }

    /// 授权后的第一个请求失败时，认为保存的凭据不可用并删除它，下次运行会重新登录
    pub async fn verify<T>(&self, first_request: impl Future<Output = Result<T>>) -> Result<T> {
        match first_request.await {
            Ok(res) => Ok(res),
            Err(e) => {
                self.invalidate()?;
                Err(e.context("the first authorized request failed, run again to log in"))
            }
        }
    }

    /// 使用或刷新保存的凭据，需要重新登录时返回 None
    async fn renew(&self, relogin: bool) -> Result<Option<Credential>> {
        if relogin {
            info!("relogin requested, ignoring stored credential");
            return Ok(None);
        }
        match self.load()? {
            Some(credential) if credential.is_valid(Utc::now()) && credential.covers(&self.scopes) => {
                debug!("using stored credential");
                Ok(Some(credential))
            }
            Some(credential) if credential.refresh_token.is_some() && credential.covers(&self.scopes) => {
                match self.refresh(&credential).await {
                    Ok(credential) => Ok(Some(credential)),
                    Err(e) => {
                        warn!("failed to refresh credential: {:#}, falling back to login", e);
                        Ok(None)
                    }
                }
            }
            _ => Ok(None),
        }
    }

    /// 获取可用的凭据：有效则直接使用，过期则刷新，否则重新登录
    pub async fn authorize(&self, relogin: bool) -> Result<Credential> {
        match self.renew(relogin).await? {
            Some(credential) => Ok(credential),
            None => self.login().await,
        }
    }
}
