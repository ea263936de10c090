//! Authenticated envelope format.
//!
//! An envelope is the base64 encoding of
//!
//! ```text
//! [tag:32][nonce:16][ciphertext:N]
//! ```
//!
//! where `ciphertext` is AES-CBC with PKCS#7 padding under the encryption
//! key and `tag` is `HMAC-SHA256(signing_key, nonce || ciphertext)`. The tag
//! is verified before any cipher work happens on decryption.

use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use crate::key::Key;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Authentication tag size (HMAC-SHA256 output).
pub const TAG_SIZE: usize = 32;

/// Nonce size (one AES block, used as the CBC IV).
pub const NONCE_SIZE: usize = 16;

/// Smallest decoded envelope that can be parsed.
pub const MIN_ENVELOPE_SIZE: usize = TAG_SIZE + NONCE_SIZE;

/// Encrypts and signs `plaintext` with `key`, returning the base64 envelope.
///
/// A fresh nonce is drawn from the operating system CSPRNG on every call.
///
/// # Errors
///
/// Returns `Error::EncryptionFailed` if the key material does not fit the
/// algorithm. Keys built through `KeySet` always fit.
pub fn seal(key: &Key, algorithm: Algorithm, plaintext: &[u8]) -> Result<String> {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    seal_with_nonce(key, algorithm, plaintext, &nonce)
}

pub(crate) fn seal_with_nonce(
    key: &Key,
    algorithm: Algorithm,
    plaintext: &[u8],
    nonce: &[u8; NONCE_SIZE],
) -> Result<String> {
    let ciphertext = cbc_encrypt(algorithm, key.encryption_key(), nonce, plaintext)?;
    let tag = sign(key, nonce, &ciphertext)?;

    let mut envelope = Vec::with_capacity(TAG_SIZE + NONCE_SIZE + ciphertext.len());
    envelope.extend_from_slice(&tag);
    envelope.extend_from_slice(nonce);
    envelope.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(envelope))
}

/// Verifies and decrypts a base64 envelope with `key`.
///
/// # Errors
///
/// - `Error::MalformedEnvelope` if the input is not base64 or is shorter
///   than tag and nonce
/// - `Error::AuthenticationFailed` if the tag does not match
/// - `Error::DecryptionFailed` if the authenticated ciphertext does not
///   unpad
pub fn open(key: &Key, algorithm: Algorithm, envelope: &str) -> Result<Vec<u8>> {
    let decoded = STANDARD
        .decode(envelope.trim())
        .map_err(|e| Error::MalformedEnvelope(format!("invalid base64: {e}")))?;

    if decoded.len() < MIN_ENVELOPE_SIZE {
        return Err(Error::MalformedEnvelope(format!(
            "{} bytes (min: {MIN_ENVELOPE_SIZE})",
            decoded.len()
        )));
    }

    let (tag, rest) = decoded.split_at(TAG_SIZE);
    let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

    verify(key, nonce, ciphertext, tag)?;

    cbc_decrypt(algorithm, key.encryption_key(), nonce, ciphertext)
}

/// Compares two byte slices without short-circuiting on the first mismatch.
///
/// Every byte pair is XORed into an accumulator; the slices are equal only
/// if the lengths match and the accumulator is zero.
#[must_use]
pub fn secure_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let diff = a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

fn mac(key: &Key, nonce: &[u8], ciphertext: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key.signing_key())
        .map_err(|e| Error::EncryptionFailed(format!("Invalid signing key: {e}")))?;
    mac.update(nonce);
    mac.update(ciphertext);
    Ok(mac)
}

fn sign(key: &Key, nonce: &[u8], ciphertext: &[u8]) -> Result<[u8; TAG_SIZE]> {
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&mac(key, nonce, ciphertext)?.finalize().into_bytes());
    Ok(tag)
}

fn verify(key: &Key, nonce: &[u8], ciphertext: &[u8], tag: &[u8]) -> Result<()> {
    let expected = mac(key, nonce, ciphertext)?.finalize().into_bytes();

    if secure_compare(&expected, tag) {
        Ok(())
    } else {
        tracing::warn!(key_id = key.id(), "envelope authentication failed");
        Err(Error::AuthenticationFailed)
    }
}

fn cbc_encrypt(algorithm: Algorithm, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    fn run<C: KeyIvInit + BlockEncryptMut>(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = C::new_from_slices(key, iv)
            .map_err(|e| Error::EncryptionFailed(format!("Invalid encryption key: {e}")))?;
        Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
    }

    match algorithm {
        Algorithm::Aes128Cbc => run::<cbc::Encryptor<aes::Aes128>>(key, iv, plaintext),
        Algorithm::Aes192Cbc => run::<cbc::Encryptor<aes::Aes192>>(key, iv, plaintext),
        Algorithm::Aes256Cbc => run::<cbc::Encryptor<aes::Aes256>>(key, iv, plaintext),
    }
}

fn cbc_decrypt(algorithm: Algorithm, key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    fn run<C: KeyIvInit + BlockDecryptMut>(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let cipher = C::new_from_slices(key, iv)
            .map_err(|e| Error::DecryptionFailed(format!("Invalid encryption key: {e}")))?;
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| Error::DecryptionFailed("invalid padding".to_string()))
    }

    match algorithm {
        Algorithm::Aes128Cbc => run::<cbc::Decryptor<aes::Aes128>>(key, iv, ciphertext),
        Algorithm::Aes192Cbc => run::<cbc::Decryptor<aes::Aes192>>(key, iv, ciphertext),
        Algorithm::Aes256Cbc => run::<cbc::Decryptor<aes::Aes256>>(key, iv, ciphertext),
    }
}
