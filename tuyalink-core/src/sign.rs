//! Request signing.
//!
//! Every call to the cloud is signed with HMAC-SHA256 keyed by the client
//! secret. The signed string is
//!
//! ```text
//! client_id + access_token + t + METHOD "\n" sha256(body) "\n" "\n" path_with_query
//! ```
//!
//! where `access_token` is empty for the token call, `t` is epoch millis and
//! the empty line stands for the (unused) signed-headers block. The signature
//! is upper-case hex; the body hash is lower-case hex.

use hmac::{Hmac, Mac};
use reqwest::Method;
use sha2::{Digest, Sha256};

use crate::error::{ClientError, Result};
use crate::secret::{Secret, TOKEN_MASK};

type HmacSha256 = Hmac<Sha256>;

/// Value of the `sign_method` header.
pub const SIGN_METHOD: &str = "HMAC-SHA256";

/// Lower-case hex SHA-256 of the empty string.
pub const EMPTY_BODY_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Output of [`Signer::sign`].
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    /// Upper-case hex HMAC, sent as the `sign` header.
    pub sign: String,

    /// Exact string that was signed.
    pub string_to_sign: String,
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signature")
            .field("sign", &self.sign)
            .field("string_to_sign", &"[REDACTED]")
            .finish()
    }
}

/// Produces provider signatures for one client id / secret pair.
#[derive(Clone)]
pub struct Signer {
    client_id: String,
    mac: HmacSha256,
}

impl Signer {
    /// Create a signer keyed by `client_secret`.
    pub fn new(client_id: impl Into<String>, client_secret: &Secret) -> Result<Self> {
        let mac = <HmacSha256 as Mac>::new_from_slice(client_secret.expose().as_bytes())
            .map_err(|e| ClientError::config(format!("unusable client secret: {}", e)))?;
        Ok(Self {
            client_id: client_id.into(),
            mac,
        })
    }

    /// Client id the signer was built for.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Sign one request.
    ///
    /// `body` is the exact JSON text that will be sent (empty for no body) and
    /// `access_token` is empty for the token call. Identical inputs always
    /// produce an identical signature.
    pub fn sign(
        &self,
        method: &Method,
        path_with_query: &str,
        body: &str,
        access_token: &str,
        timestamp: i64,
    ) -> Signature {
        let string_to_sign = format!(
            "{}{}{}{}\n{}\n\n{}",
            self.client_id,
            access_token,
            timestamp,
            method.as_str().to_ascii_uppercase(),
            sha256_hex(body),
            path_with_query,
        );

        let mut mac = self.mac.clone();
        mac.update(string_to_sign.as_bytes());
        let sign = hex::encode_upper(mac.finalize().into_bytes());

        tracing::trace!(
            "string to sign for {} {}: {:?}",
            method,
            path_with_query,
            redact(&string_to_sign, access_token)
        );

        Signature {
            sign,
            string_to_sign,
        }
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("client_id", &self.client_id)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Lower-case hex SHA-256 of a UTF-8 string.
pub fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// Replace every occurrence of `access_token` in `text` with a mask.
pub fn redact(text: &str, access_token: &str) -> String {
    if access_token.is_empty() {
        text.to_string()
    } else {
        text.replace(access_token, TOKEN_MASK)
    }
}
