// SPDX-License-Identifier: MIT
//
// QKD Link Simulator: BB84 over Free-Space Optical Channels
// Copyright (c) 2025 QKD Link Simulator Contributors

//! AES-256-CBC encryption keyed by BB84 key bits
//!
//! The raw bit array is packed into a 256-bit key without hashing. Short keys are
//! right-padded with zero bits, long keys are truncated.

use crate::basis::Bit;
use crate::{Error, Result};
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Fewest key bits accepted for key derivation
pub const MIN_KEY_BITS: usize = 16;

pub const KEY_SIZE_BYTES: usize = 32;
pub const BLOCK_SIZE: usize = 16;

/// Parameters reported alongside every ciphertext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionInfo {
    pub algorithm: String,
    pub key_size_bits: usize,
    pub key_size_bytes: usize,
    pub block_size: usize,
    pub mode: String,
    pub key_hex: String,
    pub key_source: String,
    pub quantum_bits_used: usize,
}

/// Base64 ciphertext and IV
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedMessage {
    pub ciphertext_b64: String,
    pub iv_b64: String,
    pub info: EncryptionInfo,
    pub original_length: usize,
}

impl EncryptedMessage {
    pub fn encrypted_length(&self) -> usize {
        self.ciphertext_b64.len()
    }
}

/// Pack key bits into a 32-byte AES key, most significant bit first
pub fn derive_key(bits: &[Bit]) -> Result<[u8; KEY_SIZE_BYTES]> {
    if bits.len() < MIN_KEY_BITS {
        return Err(Error::InsufficientKeyMaterial {
            required: MIN_KEY_BITS,
            supplied: bits.len(),
        });
    }
    if let Some(pos) = bits.iter().position(|&b| b > 1) {
        return Err(Error::InvalidParameter(format!(
            "Key bit at position {} is {}, expected 0 or 1",
            pos, bits[pos]
        )));
    }

    let mut key = [0u8; KEY_SIZE_BYTES];
    for (i, &bit) in bits.iter().take(KEY_SIZE_BYTES * 8).enumerate() {
        key[i / 8] |= bit << (7 - i % 8);
    }
    Ok(key)
}

/// Encrypt a UTF-8 message under a fresh random IV
pub fn encrypt_message(message: &str, bits: &[Bit]) -> Result<EncryptedMessage> {
    let key = derive_key(bits)?;

    let mut iv = [0u8; BLOCK_SIZE];
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256CbcEnc::new_from_slices(&key, &iv)
        .map_err(|e| Error::Internal(format!("Cipher initialisation failed: {}", e)))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(message.as_bytes());

    Ok(EncryptedMessage {
        ciphertext_b64: encode_base64(&ciphertext),
        iv_b64: encode_base64(&iv),
        info: EncryptionInfo {
            algorithm: "AES-256-CBC".to_string(),
            key_size_bits: KEY_SIZE_BYTES * 8,
            key_size_bytes: KEY_SIZE_BYTES,
            block_size: BLOCK_SIZE,
            mode: "CBC".to_string(),
            key_hex: hex::encode(key),
            key_source: "BB84 Quantum Key Distribution".to_string(),
            quantum_bits_used: bits.len(),
        },
        original_length: message.len(),
    })
}

/// Decrypt a message produced by [`encrypt_message`] with the same key bits
pub fn decrypt_message(ciphertext_b64: &str, iv_b64: &str, bits: &[Bit]) -> Result<String> {
    let key = derive_key(bits)?;

    let ciphertext = decode_base64(ciphertext_b64)
        .map_err(|_| Error::DecryptionError("Ciphertext is not valid base64".to_string()))?;
    let iv = decode_base64(iv_b64)
        .map_err(|_| Error::DecryptionError("IV is not valid base64".to_string()))?;

    if iv.len() != BLOCK_SIZE {
        return Err(Error::DecryptionError(format!(
            "IV must be {} bytes, got {}",
            BLOCK_SIZE,
            iv.len()
        )));
    }
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(Error::DecryptionError(format!(
            "Ciphertext length {} is not a positive multiple of {}",
            ciphertext.len(),
            BLOCK_SIZE
        )));
    }

    let cipher = Aes256CbcDec::new_from_slices(&key, &iv)
        .map_err(|e| Error::Internal(format!("Cipher initialisation failed: {}", e)))?;
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| Error::DecryptionError("Invalid padding (wrong key or tampered data)".to_string()))?;

    String::from_utf8(plaintext)
        .map_err(|_| Error::DecryptionError("Plaintext is not valid UTF-8".to_string()))
}

/// Encode bytes to base64 string
pub fn encode_base64(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Decode base64 string to bytes
pub fn decode_base64(s: &str) -> Result<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| Error::InvalidParameter(format!("Invalid base64: {}", e)))
}
