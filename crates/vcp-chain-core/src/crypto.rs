//! Cryptographic primitives for VCP chains.
//!
//! Digests and signatures are selected by algorithm tag so that new schemes
//! are additive variants. Today: SHA-256 (default) and BLAKE3 for hashing,
//! Ed25519 for signatures.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// PrevHash of the genesis event: 64 zero characters.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Hash function used for EventHash and Merkle nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    /// The tag written into `HashAlgo` fields.
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA-256",
            Self::Blake3 => "BLAKE3",
        }
    }

    /// Parse a `HashAlgo` tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "SHA-256" | "SHA256" => Some(Self::Sha256),
            "BLAKE3" => Some(Self::Blake3),
            _ => None,
        }
    }

    /// Hash a single buffer.
    pub fn digest(self, data: &[u8]) -> Digest {
        self.digest_parts(&[data])
    }

    /// Hash the concatenation of several buffers without copying them.
    pub fn digest_parts(self, parts: &[&[u8]]) -> Digest {
        match self {
            Self::Sha256 => {
                let mut hasher = sha2::Sha256::new();
                for part in parts {
                    hasher.update(part);
                }
                Digest(hasher.finalize().into())
            }
            Self::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                for part in parts {
                    hasher.update(part);
                }
                Digest(*hasher.finalize().as_bytes())
            }
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl FromStr for HashAlgorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_tag(s).ok_or_else(|| CoreError::UnsupportedAlgorithm(s.to_string()))
    }
}

/// A 32-byte digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// SHA-256 of the given data.
    pub fn sha256(data: &[u8]) -> Self {
        HashAlgorithm::Sha256.digest(data)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex (either case).
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidHex {
            field: "digest",
            reason: e.to_string(),
        })?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CoreError::InvalidDigestLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// The zero digest.
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Digest {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Signature scheme, selected by the `SignAlgo` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignAlgorithm {
    #[default]
    Ed25519,
}

impl SignAlgorithm {
    /// The tag written into `SignAlgo` and key records.
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Ed25519 => "ED25519",
        }
    }

    /// Parse a `SignAlgo` tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "ED25519" => Some(Self::Ed25519),
            _ => None,
        }
    }
}

impl fmt::Display for SignAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Produces detached signatures over event digests.
pub trait DigestSigner {
    /// The scheme this signer implements.
    fn algorithm(&self) -> SignAlgorithm;

    /// Sign the raw digest bytes, returning the signature as hex.
    fn sign_digest(&self, digest: &Digest) -> String;
}

/// Checks detached signatures produced by a [`DigestSigner`].
pub trait SignatureVerifier: Send + Sync {
    /// The scheme this verifier implements.
    fn algorithm(&self) -> SignAlgorithm;

    /// Verify a hex signature over `message`.
    fn verify_hex(&self, message: &[u8], signature_hex: &str) -> Result<()>;
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|_| CoreError::InvalidPublicKey)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CoreError::InvalidPublicKey)?;
        Ok(Self(arr))
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<()> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        let sig = Signature::from_bytes(&signature.0);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl SignatureVerifier for Ed25519PublicKey {
    fn algorithm(&self) -> SignAlgorithm {
        SignAlgorithm::Ed25519
    }

    fn verify_hex(&self, message: &[u8], signature_hex: &str) -> Result<()> {
        let signature = Ed25519Signature::from_hex(signature_hex)?;
        self.verify(message, &signature)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

impl Ed25519Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|_| CoreError::InvalidSignature)?;
        let arr: [u8; 64] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CoreError::InvalidSignature)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &self.to_hex()[..16])
    }
}

/// An Ed25519 keypair for signing event digests.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let signing_key = SigningKey::generate(&mut rng);
        Self { signing_key }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Get the public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }

    /// Public key record under the given key id.
    pub fn public_key_record(&self, key_id: &str) -> PublicKeyRecord {
        PublicKeyRecord::ed25519(key_id, &self.public_key())
    }
}

impl DigestSigner for Keypair {
    fn algorithm(&self) -> SignAlgorithm {
        SignAlgorithm::Ed25519
    }

    fn sign_digest(&self, digest: &Digest) -> String {
        self.sign(digest.as_bytes()).to_hex()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}

/// Published public key material.
///
/// ```json
/// {"KeyID": "vcp-key-001", "Algorithm": "ED25519", "PublicKey": "<64 hex chars>"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublicKeyRecord {
    #[serde(rename = "KeyID")]
    pub key_id: String,
    pub algorithm: String,
    pub public_key: String,
}

impl PublicKeyRecord {
    /// Record for an Ed25519 key.
    pub fn ed25519(key_id: &str, key: &Ed25519PublicKey) -> Self {
        Self {
            key_id: key_id.to_string(),
            algorithm: SignAlgorithm::Ed25519.as_tag().to_string(),
            public_key: key.to_hex(),
        }
    }

    /// Resolve the verification routine for this key's algorithm tag.
    pub fn verifier(&self) -> Result<Box<dyn SignatureVerifier>> {
        match SignAlgorithm::from_tag(&self.algorithm) {
            Some(SignAlgorithm::Ed25519) => {
                let key = Ed25519PublicKey::from_hex(&self.public_key)?;
                VerifyingKey::from_bytes(key.as_bytes()).map_err(|_| CoreError::InvalidPublicKey)?;
                Ok(Box::new(key))
            }
            None => Err(CoreError::UnsupportedAlgorithm(self.algorithm.clone())),
        }
    }
}
