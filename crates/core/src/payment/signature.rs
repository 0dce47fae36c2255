use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::domain::payment::{OrderId, PaymentId};

type HmacSha256 = Hmac<Sha256>;

/// `hex(HMAC-SHA256(secret, "{order_id}|{payment_id}"))`, the signature the
/// gateway attaches to a successful payment.
pub fn gateway_signature(secret: &[u8], order_id: &OrderId, payment_id: &PaymentId) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(signed_payload(order_id, payment_id).as_bytes());
    encode_hex(mac.finalize().into_bytes().as_slice())
}

/// Constant-time check of a hex signature against the expected HMAC.
pub fn verify_gateway_signature(
    secret: &[u8],
    order_id: &OrderId,
    payment_id: &PaymentId,
    signature: &str,
) -> bool {
    let Some(candidate) = decode_hex(signature.trim()) else {
        return false;
    };
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(signed_payload(order_id, payment_id).as_bytes());
    mac.verify_slice(&candidate).is_ok()
}

/// Stored in place of the raw signature.
pub fn signature_hash(signature: &str) -> String {
    encode_hex(Sha256::digest(signature.trim().as_bytes()).as_slice())
}

fn signed_payload(order_id: &OrderId, payment_id: &PaymentId) -> String {
    format!("{}|{}", order_id.0, payment_id.0)
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn decode_hex(value: &str) -> Option<Vec<u8>> {
    if value.len() % 2 != 0 {
        return None;
    }
    (0..value.len())
        .step_by(2)
        .map(|index| value.get(index..index + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}
