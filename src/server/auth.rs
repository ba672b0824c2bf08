use hmac::{ Hmac, Mac };
use sha2::Sha256;
use std::collections::HashMap;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

pub const MAX_CLOCK_SKEW_SECS: u64 = 300;

/// Parses a raw query string (`ts=..&sig=..`) into owned pairs.
pub fn query_params(query: Option<&str>) -> HashMap<String, String> {
    form_urlencoded::parse(query.unwrap_or("").as_bytes()).into_owned().collect()
}

/// Hex HMAC-SHA256 of the timestamp under the shared secret, as clients send
/// it in `sig`.
pub fn sign_timestamp(secret: &str, ts: &str) -> Result<String, &'static str> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "bad secret")?;
    mac.update(ts.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks the `ts`/`sig` parameters: `sig` must be the hex HMAC-SHA256 of
/// `ts` under the shared secret, and `ts` must be within five minutes of
/// `now`.
pub fn verify_signature(
    secret: &str,
    params: &HashMap<String, String>,
    now: i64
) -> Result<(), &'static str> {
    let (ts, sig) = match (params.get("ts"), params.get("sig")) {
        (Some(ts), Some(sig)) => (ts.as_str(), sig.as_str()),
        _ => {
            return Err("missing ts/sig");
        }
    };

    let ts_i: i64 = ts.parse().map_err(|_| "bad timestamp")?;
    match now.checked_sub(ts_i).map(i64::unsigned_abs) {
        Some(skew) if skew <= MAX_CLOCK_SKEW_SECS => {}
        _ => {
            return Err("timestamp out of range");
        }
    }

    let sig_bytes = hex::decode(sig).map_err(|_| "bad signature")?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "bad secret")?;
    mac.update(ts.as_bytes());
    mac.verify_slice(&sig_bytes).map_err(|_| "bad signature")
}
