//! HMAC request signing for the venue REST APIs
//!
//! Binance signs the raw query string and expects lowercase hex.
//! OKX signs `timestamp + method + request_path + body` and expects base64.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

type HmacSha256 = Hmac<Sha256>;

fn hmac_sha256(secret: &str, message: &str) -> ExchangeResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::AuthenticationFailed(format!("HMAC key error: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Binance `signature` parameter for a query string
pub fn binance_signature(query_string: &str, secret: &str) -> ExchangeResult<String> {
    Ok(hex::encode(hmac_sha256(secret, query_string)?))
}

/// OKX `OK-ACCESS-SIGN` header value
pub fn okx_signature(
    timestamp: &str,
    method: &str,
    request_path: &str,
    body: &str,
    secret: &str,
) -> ExchangeResult<String> {
    let message = format!("{}{}{}{}", timestamp, method, request_path, body);
    Ok(BASE64.encode(hmac_sha256(secret, &message)?))
}

/// OKX `OK-ACCESS-TIMESTAMP` format: ISO-8601 with millisecond precision
pub fn okx_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
