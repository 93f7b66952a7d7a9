//! Signed HTTP exchanges with the cloud API.
//!
//! [`SignedHttp`] performs one signed request and returns the decoded JSON
//! body. [`TokenEndpoint`] uses it to implement [`Authenticator`], and
//! [`Transport`] combines it with the [`TokenStore`] so that every call
//! carries a valid access token.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Method, header};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result, TOKEN_INVALID_CODE};
use crate::model::{Envelope, ErrorEnvelope};
use crate::sign::{SIGN_METHOD, Signer};
use crate::token::{Authenticator, Credential, TokenStore};

/// Token exchange endpoint.
pub const TOKEN_PATH: &str = "/v1.0/token?grant_type=1";

/// Lifetime assumed when the token result carries no expiry.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Performs signed requests against one base URL.
#[derive(Debug, Clone)]
pub struct SignedHttp {
    client: reqwest::Client,
    base_url: String,
    signer: Signer,
}

impl SignedHttp {
    /// Build the HTTP client from `config`, applying its timeouts.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;
        let signer = Signer::new(config.client_id.clone(), &config.client_secret)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            signer,
        })
    }

    /// Send one signed request and decode the JSON body.
    ///
    /// `body` must be the exact JSON text to send; it is hashed into the
    /// signature as-is. A non-2xx status is turned into [`ClientError::Api`]
    /// when the body is an error envelope, otherwise [`ClientError::Http`].
    pub async fn exchange(
        &self,
        method: Method,
        path_with_query: &str,
        body: Option<&str>,
        access_token: &str,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path_with_query);
        let timestamp = Utc::now().timestamp_millis();
        let signature = self.signer.sign(
            &method,
            path_with_query,
            body.unwrap_or(""),
            access_token,
            timestamp,
        );

        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header("client_id", self.signer.client_id())
            .header("t", timestamp.to_string())
            .header("sign", signature.sign)
            .header("sign_method", SIGN_METHOD);

        if !access_token.is_empty() {
            request = request.header("access_token", access_token);
        }

        if let Some(body) = body {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ErrorEnvelope>(&text) {
                Ok(err) => {
                    tracing::error!(
                        "{} {} failed: status {}, code {}, msg {:?}",
                        method,
                        path_with_query,
                        status,
                        err.code,
                        err.msg
                    );
                    ClientError::Api {
                        code: err.code,
                        message: err.msg.unwrap_or_else(|| status.to_string()),
                    }
                }
                Err(_) => {
                    tracing::error!("{} {} failed: {} - {}", method, path_with_query, status, text);
                    ClientError::Http {
                        status: status.as_u16(),
                        body: text,
                    }
                }
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

/// Shape of `result` returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResult {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    expire_time: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// [`Authenticator`] backed by the token endpoint.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    http: SignedHttp,
}

impl TokenEndpoint {
    pub fn new(http: SignedHttp) -> Self {
        Self { http }
    }
}

fn auth_error(code: Option<i64>, message: impl Into<String>) -> ClientError {
    ClientError::Authentication {
        code,
        message: message.into(),
    }
}

#[async_trait]
impl Authenticator for TokenEndpoint {
    async fn authenticate(&self) -> Result<Credential> {
        let value = self
            .http
            .exchange(Method::GET, TOKEN_PATH, None, "")
            .await
            .map_err(|e| match e {
                ClientError::Api { code, message } => auth_error(Some(code), message),
                other => other,
            })?;

        let envelope: Envelope<Value> = serde_json::from_value(value)
            .map_err(|e| auth_error(None, format!("malformed token response: {}", e)))?;

        if !envelope.success {
            return Err(auth_error(envelope.code, envelope.failure_message()));
        }

        let result = envelope
            .result
            .ok_or_else(|| auth_error(None, "token response has no result"))?;
        let token: TokenResult = serde_json::from_value(result)
            .map_err(|e| auth_error(None, format!("malformed token result: {}", e)))?;

        if token.access_token.is_empty() {
            return Err(auth_error(None, "token result has an empty access_token"));
        }

        let lifetime = token
            .expire_time
            .or(token.expires_in)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

        let expires_at = Some(lifetime)
            .filter(|secs| *secs >= 0)
            .and_then(Duration::try_seconds)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| {
                auth_error(
                    None,
                    format!("malformed token result: expiry {} out of range", lifetime),
                )
            })?;

        Ok(Credential::new(
            token.access_token,
            token.refresh_token.unwrap_or_default(),
            token.uid.unwrap_or_default(),
            expires_at,
        ))
    }
}

/// Authenticated transport: every call is signed with a valid access token.
#[derive(Debug, Clone)]
pub struct Transport {
    http: SignedHttp,
    tokens: Arc<TokenStore>,
}

impl Transport {
    /// Build a transport whose token store authenticates against `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = SignedHttp::new(config)?;
        let tokens = Arc::new(TokenStore::new(Arc::new(TokenEndpoint::new(http.clone()))));
        Ok(Self { http, tokens })
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Valid credential for the current project.
    pub async fn credential(&self) -> Result<Arc<Credential>> {
        self.tokens.get_valid_token().await
    }

    /// Perform one authenticated call and return the raw JSON body.
    ///
    /// Code 1010 ("token invalid") drops the cached credential before the
    /// error (or the failed envelope) is handed back; the call itself is not
    /// retried.
    pub async fn call_raw(&self, method: Method, path: &str, body: Option<&str>) -> Result<Value> {
        let credential = self.tokens.get_valid_token().await?;

        let value = match self
            .http
            .exchange(method, path, body, credential.access_token.expose())
            .await
        {
            Ok(value) => value,
            Err(ClientError::Api { code, message }) if code == TOKEN_INVALID_CODE => {
                self.tokens.invalidate();
                return Err(ClientError::TokenInvalid { code, message });
            }
            Err(e) => return Err(e),
        };

        if value.get("success") == Some(&Value::Bool(false))
            && value.get("code").and_then(Value::as_i64) == Some(TOKEN_INVALID_CODE)
        {
            tracing::warn!("{} reported token invalid, dropping cached token", path);
            self.tokens.invalidate();
        }

        Ok(value)
    }

    /// Perform one call and decode its envelope.
    ///
    /// `result` is only decoded when `success` is true; a malformed result
    /// on a successful envelope is a [`ClientError::Serialization`].
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&str>,
    ) -> Result<Envelope<T>> {
        let value = self.call_raw(method, path, body).await?;
        decode_envelope(value)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>> {
        self.call(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>> {
        let body = serde_json::to_string(body)?;
        self.call(Method::POST, path, Some(&body)).await
    }
}

/// Decode an envelope, skipping `result` on failed envelopes.
pub(crate) fn decode_envelope<T: DeserializeOwned>(value: Value) -> Result<Envelope<T>> {
    let Envelope {
        success,
        code,
        msg,
        t,
        tid,
        result,
    } = serde_json::from_value::<Envelope<Value>>(value)?;

    let result = match result {
        Some(v) if success && !v.is_null() => Some(serde_json::from_value(v)?),
        _ => None,
    };

    Ok(Envelope {
        success,
        code,
        msg,
        t,
        tid,
        result,
    })
}

/// Everything except RFC 3986 unreserved characters is escaped.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode one path segment.
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}
