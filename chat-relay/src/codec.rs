//! Per-line wire transform applied to every post-handshake line.
//!
//! [`ObfuscationCodec`] is a presentation layer only. It appends the shared
//! key to the plaintext and base64-encodes the result, so anyone who knows
//! the alphabet recovers both the key and the text. It provides no
//! confidentiality. Routing code only sees the [`LineCodec`] trait, which is
//! where a real cipher would be plugged in.

use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};

/// Standard alphabet, padding optional on decode.
const WIRE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encodes and decodes one line (no embedded newline) at a time.
pub trait LineCodec: Send + Sync {
    fn encode(&self, plain: &str) -> String;

    /// Never fails; undecodable input comes back unchanged.
    fn decode(&self, wire: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct ObfuscationCodec {
    key: String,
}

impl ObfuscationCodec {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl LineCodec for ObfuscationCodec {
    fn encode(&self, plain: &str) -> String {
        let mut payload = String::with_capacity(plain.len() + self.key.len());
        payload.push_str(plain);
        payload.push_str(&self.key);
        WIRE_ENGINE.encode(payload.as_bytes())
    }

    fn decode(&self, wire: &str) -> String {
        let Ok(bytes) = WIRE_ENGINE.decode(wire) else {
            return wire.to_string();
        };
        let Ok(text) = String::from_utf8(bytes) else {
            return wire.to_string();
        };

        match text.strip_suffix(self.key.as_str()) {
            Some(plain) => plain.to_string(),
            None => text,
        }
    }
}
