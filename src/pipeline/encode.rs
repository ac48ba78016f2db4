//! Document encoding: raw PDF bytes → base64 for the JSON submission body.
//!
//! The service takes the document inline (`agent_inputs.pdf_document`) rather
//! than as a multipart upload, so the whole file travels as one standard
//! alphabet base64 string.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Encode document bytes as standard base64.
pub fn encode_document(bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded document {} bytes → {} bytes base64", bytes.len(), b64.len());
    b64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_small_document() {
        let b64 = encode_document(b"%PDF-1.4");
        assert_eq!(b64, "JVBERi0xLjQ=");
        let decoded = STANDARD.decode(&b64).expect("valid base64");
        assert_eq!(decoded, b"%PDF-1.4");
    }
}
