//! Transform Pipeline
//!
//! Gzip compression above a size threshold and optional AES-256-GCM
//! encryption. Encoding compresses then encrypts; decoding reverses the order.
//! Everything here is immutable after construction and safe to call without
//! holding the store lock.

use std::fmt;
use std::io::{Read, Write};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::cache::checksum;
use crate::error::{CacheError, Result};

const NONCE_LEN: usize = 12;

// == Compressor ==
/// Gzip codec.
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    level: u32,
}

impl Compressor {
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.level));
        encoder
            .write_all(data)
            .map_err(|e| CacheError::Transform(format!("Gzip compression failed: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| CacheError::Transform(format!("Gzip finalization failed: {}", e)))
    }

    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| CacheError::Transform(format!("Gzip decompression failed: {}", e)))?;
        Ok(decompressed)
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(6)
    }
}

// == Encryptor ==
/// AES-256-GCM codec. Output is `nonce || ciphertext`.
#[derive(Clone)]
pub struct Encryptor {
    cipher: Aes256Gcm,
}

impl fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encryptor").field("key", &"[REDACTED]").finish()
    }
}

impl Encryptor {
    /// Derives the 256-bit key as SHA-256 of the passphrase.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let key = Sha256::digest(passphrase.as_bytes());
        Self::from_key(&key)
    }

    /// Uses a fresh random key. Ciphertexts do not outlive this instance.
    pub fn random() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self::from_key(&key)
    }

    fn from_key(key: &[u8]) -> Self {
        Self {
            cipher: Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), data)
            .map_err(|e| CacheError::Crypto(format!("Encryption failed: {}", e)))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < NONCE_LEN {
            return Err(CacheError::Crypto(format!(
                "Ciphertext too short: {} bytes",
                data.len()
            )));
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);

        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| CacheError::Crypto(format!("Decryption failed: {}", e)))
    }
}

// == Encoded Payload ==
/// Result of running a value through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub compressed: bool,
    pub encrypted: bool,
    pub checksum: String,
}

impl Encoded {
    pub fn size(&self) -> u64 {
        checksum::payload_size(&self.bytes)
    }
}

// == Transform Pipeline ==
#[derive(Debug, Clone)]
pub struct TransformPipeline {
    threshold: usize,
    compressor: Compressor,
    encryptor: Encryptor,
}

impl TransformPipeline {
    /// Builds a pipeline. Without a passphrase a random key is generated.
    pub fn new(compression_threshold: usize, encryption_key: Option<&str>) -> Self {
        let encryptor = match encryption_key {
            Some(key) => Encryptor::from_passphrase(key),
            None => Encryptor::random(),
        };

        Self {
            threshold: compression_threshold,
            compressor: Compressor::default(),
            encryptor,
        }
    }

    pub fn should_compress(&self, raw_len: usize) -> bool {
        raw_len > self.threshold
    }

    // == Encode ==
    /// Compresses when allowed and over threshold, then encrypts if asked.
    pub fn encode(&self, raw: Vec<u8>, allow_compression: bool, encrypt: bool) -> Result<Encoded> {
        let compressed = allow_compression && self.should_compress(raw.len());
        let mut bytes = if compressed {
            self.compressor.compress(&raw)?
        } else {
            raw
        };

        if encrypt {
            bytes = self.encryptor.encrypt(&bytes)?;
        }

        let checksum = checksum::digest(&bytes);
        Ok(Encoded {
            bytes,
            compressed,
            encrypted: encrypt,
            checksum,
        })
    }

    // == Decode ==
    /// Decrypts then decompresses according to the flags.
    pub fn decode(&self, bytes: &[u8], compressed: bool, encrypted: bool) -> Result<Vec<u8>> {
        let plain = if encrypted {
            self.encryptor.decrypt(bytes)?
        } else {
            bytes.to_vec()
        };

        if compressed {
            self.compressor.decompress(&plain)
        } else {
            Ok(plain)
        }
    }

    pub fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        self.compressor.compress(raw)
    }
}
