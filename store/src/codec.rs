//! Text encoding of embeddings for persistence.
//!
//! Embeddings are stored as a UTF-8 JSON array of floats. Order, count and
//! values survive a round trip exactly.

use voicematch_embeddings::Embedding;

use crate::error::Result;

/// Encode an embedding as a JSON array.
pub fn encode_embedding(embedding: &[f32]) -> Result<String> {
    Ok(serde_json::to_string(embedding)?)
}

/// Decode an embedding from a JSON array.
pub fn decode_embedding(text: &str) -> Result<Embedding> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_is_exact() {
        let embedding = vec![0.1f32, -3.4028235e38, 1.17549435e-38, 0.0, 42.125, -0.70710677];
        let text = encode_embedding(&embedding).unwrap();
        let decoded = decode_embedding(&text).unwrap();

        assert_eq!(decoded.len(), embedding.len());
        for (a, b) in embedding.iter().zip(decoded.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_decode_rejects_non_array() {
        assert!(decode_embedding("{\"a\": 1}").is_err());
        assert!(decode_embedding("[1.0, \"x\"]").is_err());
    }
}
