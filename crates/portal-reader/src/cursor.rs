//! Opaque continuation tokens for customer listings.
//!
//! A token is the last evaluated index key, serialized as JSON and base58
//! encoded so it is URL-safe and carries no punctuation.

use crate::error::{ReaderError, Result};
use portal_core::IndexCursor;

pub fn encode(cursor: &IndexCursor) -> String {
    // A timestamp and a string always serialize.
    let json = serde_json::to_vec(cursor).expect("index cursor serializes to JSON");
    bs58::encode(json).into_string()
}

pub fn decode(token: &str) -> Result<IndexCursor> {
    let bytes = bs58::decode(token.trim())
        .into_vec()
        .map_err(|e| ReaderError::InvalidArgument(format!("malformed cursor: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| ReaderError::InvalidArgument(format!("malformed cursor: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::Timestamp;
    use portal_core::ShortCode;

    fn cursor() -> IndexCursor {
        IndexCursor {
            created_at: Timestamp::from_second(1_700_000_000).unwrap(),
            short_code: ShortCode::new_unchecked("abc123"),
        }
    }

    #[test]
    fn decode_reverses_encode() {
        let token = encode(&cursor());
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(decode(&token).unwrap(), cursor());
    }

    #[test]
    fn malformed_tokens_are_invalid_arguments() {
        // '0' is outside the base58 alphabet.
        assert!(matches!(decode("0OIl"), Err(ReaderError::InvalidArgument(_))));

        // Valid base58, but not a cursor.
        let token = bs58::encode(b"{\"hello\":1}").into_string();
        assert!(matches!(decode(&token), Err(ReaderError::InvalidArgument(_))));
    }
}
