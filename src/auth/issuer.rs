// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Unverified issuer inspection, used to route a token to its validator.
//!
//! ## Security
//!
//! **Everything read here is attacker-controlled.** The payload is decoded
//! before any signature check, so anyone can put any `iss` value in it.
//! The peeked issuer may only decide *which validator looks at the token*.
//! It must never feed an authorization decision. Authorization uses the
//! claims a validator returned after verifying the signature.

use base64ct::{Base64Url, Encoding};
use serde_json::{Map, Value};

/// Separator between the compact JWS segments.
const SEGMENT_DELIMITER: char = '.';

/// Read the `iss` claim from a compact token without verifying it.
///
/// Returns `None` for tokens with fewer than two segments, payloads that
/// are not base64url JSON objects, and payloads without a string `iss`.
/// Never panics.
pub fn peek_issuer(token: &str) -> Option<String> {
    let claims = peek_claims(token)?;
    claims.get("iss")?.as_str().map(str::to_owned)
}

/// Decode the payload segment of a compact token without verifying it.
pub(crate) fn peek_claims(token: &str) -> Option<Map<String, Value>> {
    let mut segments = token.split(SEGMENT_DELIMITER);
    let _header = segments.next()?;
    let payload = segments.next()?;
    let bytes = decode_segment(payload)?;
    match serde_json::from_slice::<Value>(&bytes).ok()? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}

/// Base64url-decode a segment, restoring the padding JWS strips.
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    if segment.is_empty() {
        return None;
    }
    let mut padded = String::with_capacity(segment.len() + 3);
    padded.push_str(segment);
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    Base64Url::decode_vec(&padded).ok()
}
