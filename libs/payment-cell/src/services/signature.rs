use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha512;
use tracing::debug;

use crate::models::PaymentError;

type HmacSha512 = Hmac<Sha512>;

pub const SECURE_HASH: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";

/// Form-style encoding: spaces become `+`.
fn form_encode(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}

/// The signed string: every non-empty `vnp_*` parameter except the hash fields,
/// sorted by key, values form-encoded, joined as `k=v&k=v`.
pub fn canonical_query<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let signed: BTreeMap<&str, &str> = params
        .into_iter()
        .filter(|(key, value)| {
            key.starts_with("vnp_") && !value.is_empty() && *key != SECURE_HASH && *key != SECURE_HASH_TYPE
        })
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();

    signed
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, form_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn mac_over(secret: &str, canonical: &str) -> Result<HmacSha512, PaymentError> {
    if secret.is_empty() {
        return Err(PaymentError::NotConfigured);
    }
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).map_err(|_| PaymentError::NotConfigured)?;
    mac.update(canonical.as_bytes());
    Ok(mac)
}

/// Lower-case hex HMAC-SHA512 of `canonical`.
pub fn sign(secret: &str, canonical: &str) -> Result<String, PaymentError> {
    Ok(hex::encode(mac_over(secret, canonical)?.finalize().into_bytes()))
}

/// Checks `vnp_SecureHash` against the rest of the parameters. Hex case is ignored and the
/// comparison is constant-time.
pub fn verify<'a, I>(secret: &str, params: I) -> bool
where
    I: IntoIterator<Item = (&'a String, &'a String)> + Clone,
{
    let provided = params
        .clone()
        .into_iter()
        .find(|(key, _)| key.as_str() == SECURE_HASH)
        .map(|(_, value)| value.clone());
    let Some(provided) = provided else {
        debug!("Callback carried no secure hash");
        return false;
    };
    let Ok(signature) = hex::decode(provided.trim()) else {
        debug!("Secure hash is not valid hex");
        return false;
    };

    let canonical = canonical_query(params);
    match mac_over(secret, &canonical) {
        Ok(mac) => mac.verify_slice(&signature).is_ok(),
        Err(_) => false,
    }
}
