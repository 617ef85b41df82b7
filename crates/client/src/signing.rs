//! Request signing.
//!
//! Every request carries a `params` JSON document and a `signature`. The
//! params gain an `auth` block (key plus expiry one hour out) and a random
//! `nonce` so two identical requests never share a signature. The
//! signature is `sha384:` followed by the hex HMAC-SHA384 of the params
//! text, keyed with the account secret.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha384;

type HmacSha384 = Hmac<Sha384>;

/// How long a signature stays valid, in hours.
pub const SIGNATURE_TTL_HOURS: i64 = 1;

/// The two form fields that authenticate a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedParams {
    pub params: String,
    pub signature: String,
}

/// Format an expiry timestamp the way the API expects it.
pub fn expires_string(at: DateTime<Utc>) -> String {
    at.format("%Y/%m/%d %H:%M:%S+00:00").to_string()
}

/// Add auth and nonce to `params`, serialize them, and sign the result.
pub fn sign_params(
    auth_key: &str,
    auth_secret: &str,
    mut params: serde_json::Map<String, serde_json::Value>,
    now: DateTime<Utc>,
    nonce: u32,
) -> SignedParams {
    params.insert(
        "auth".to_string(),
        serde_json::json!({
            "key": auth_key,
            "expires": expires_string(now + Duration::hours(SIGNATURE_TTL_HOURS)),
        }),
    );
    params.insert("nonce".to_string(), serde_json::json!(nonce));

    let params = serde_json::Value::Object(params).to_string();

    let mut mac =
        HmacSha384::new_from_slice(auth_secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(params.as_bytes());
    let signature = format!("sha384:{}", hex::encode(mac.finalize().into_bytes()));

    SignedParams { params, signature }
}

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}
