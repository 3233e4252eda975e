use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// `Base64(HMAC-SHA256(secret, data))`. Used to sign requests to the payment processor.
pub fn calculate_signature(secret: &str, data: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::default(),
    };
    mac.update(data);
    BASE64_STANDARD.encode(mac.finalize().into_bytes())
}
