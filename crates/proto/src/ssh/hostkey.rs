//! SSH host key operations (ssh-ed25519).
//!
//! The server proves its identity during key exchange by signing the
//! exchange hash with its host key; the client verifies that signature
//! against the host key blob carried in the ECDH reply.
//!
//! # Security
//!
//! - Ed25519 provides 128-bit security with constant-time operations
//! - Secret key bytes only leave the type wrapped in [`Zeroizing`]
//!
//! # Example
//!
//! ```rust
//! use halyard_proto::ssh::hostkey::Ed25519HostKey;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hostkey = Ed25519HostKey::generate()?;
//!
//! let signature_blob = hostkey.sign(b"data to sign")?;
//! Ed25519HostKey::verify_blob(
//!     &hostkey.public_key_blob(),
//!     b"data to sign",
//!     &signature_blob,
//! )?;
//! # Ok(())
//! # }
//! ```

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH};
use halyard_platform::{HalyardError, HalyardResult};
use zeroize::Zeroizing;

/// The ssh-ed25519 algorithm name, as it appears in key and signature blobs.
pub const ED25519_ALGORITHM_NAME: &str = "ssh-ed25519";

/// Ed25519 host key (ssh-ed25519).
#[derive(Clone)]
pub struct Ed25519HostKey {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Ed25519HostKey {
    /// Generates a new Ed25519 key pair.
    pub fn generate() -> HalyardResult<Self> {
        let mut csprng = rand::thread_rng();
        let secret_bytes: [u8; SECRET_KEY_LENGTH] = rand::Rng::gen(&mut csprng);
        let signing_key = SigningKey::from_bytes(&secret_bytes);
        let verifying_key = signing_key.verifying_key();
        Ok(Self {
            signing_key,
            verifying_key,
        })
    }

    /// Creates a key from raw secret bytes (32-byte secret key).
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Security`] if `secret_bytes` is not 32 bytes.
    pub fn from_bytes(secret_bytes: &[u8]) -> HalyardResult<Self> {
        if secret_bytes.len() != SECRET_KEY_LENGTH {
            return Err(HalyardError::Security(
                "Ed25519 secret key must be 32 bytes".to_string(),
            ));
        }
        let mut key_bytes = [0u8; SECRET_KEY_LENGTH];
        key_bytes.copy_from_slice(secret_bytes);
        let signing_key = SigningKey::from_bytes(&key_bytes);
        let verifying_key = signing_key.verifying_key();
        Ok(Self {
            signing_key,
            verifying_key,
        })
    }

    /// Returns the secret key bytes (32 bytes).
    ///
    /// WARNING: This exposes the private key material. Handle with care.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    /// Returns the public key in SSH wire format.
    ///
    /// Format: `string "ssh-ed25519"` + `string public_key (32 bytes)`.
    /// This is the `K_S` field of the ECDH reply and exchange hash.
    pub fn public_key_blob(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        let alg_name = ED25519_ALGORITHM_NAME.as_bytes();
        bytes.extend_from_slice(&(alg_name.len() as u32).to_be_bytes());
        bytes.extend_from_slice(alg_name);

        let public_key = self.verifying_key.as_bytes();
        bytes.extend_from_slice(&(public_key.len() as u32).to_be_bytes());
        bytes.extend_from_slice(public_key);

        bytes
    }

    /// Signs data, returning the signature in SSH wire format.
    ///
    /// Format: `string "ssh-ed25519"` + `string signature (64 bytes)`.
    pub fn sign(&self, data: &[u8]) -> HalyardResult<Vec<u8>> {
        let signature = self.signing_key.sign(data);

        let mut bytes = Vec::new();

        let alg_name = ED25519_ALGORITHM_NAME.as_bytes();
        bytes.extend_from_slice(&(alg_name.len() as u32).to_be_bytes());
        bytes.extend_from_slice(alg_name);

        let sig_bytes = signature.to_bytes();
        bytes.extend_from_slice(&(sig_bytes.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&sig_bytes);

        Ok(bytes)
    }

    /// Verifies a raw Ed25519 signature.
    ///
    /// # Arguments
    ///
    /// * `public_key` - The 32-byte Ed25519 public key
    /// * `data` - The data that was signed
    /// * `signature` - The 64-byte signature
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Security`] if the key or signature has the
    /// wrong length or the public key is invalid.
    pub fn verify(public_key: &[u8], data: &[u8], signature: &[u8]) -> HalyardResult<bool> {
        if public_key.len() != 32 {
            return Err(HalyardError::Security(
                "Ed25519 public key must be 32 bytes".to_string(),
            ));
        }
        if signature.len() != 64 {
            return Err(HalyardError::Security(
                "Ed25519 signature must be 64 bytes".to_string(),
            ));
        }

        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(public_key);
        let verifying_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| HalyardError::Security(format!("Invalid Ed25519 public key: {}", e)))?;

        let mut sig_bytes = [0u8; 64];
        sig_bytes.copy_from_slice(signature);
        let signature = Signature::from_bytes(&sig_bytes);

        Ok(verifying_key.verify(data, &signature).is_ok())
    }

    /// Verifies a wire-format signature blob against a wire-format host key
    /// blob.
    ///
    /// # Errors
    ///
    /// Returns [`HalyardError::Protocol`] if either blob is malformed and
    /// [`HalyardError::Security`] if the signature does not verify.
    pub fn verify_blob(
        host_key_blob: &[u8],
        data: &[u8],
        signature_blob: &[u8],
    ) -> HalyardResult<()> {
        let public_key = parse_public_key_blob(host_key_blob)?;
        let signature = parse_signature_blob(signature_blob)?;

        if Self::verify(&public_key, data, &signature)? {
            Ok(())
        } else {
            Err(HalyardError::Security(
                "Ed25519 signature verification failed".to_string(),
            ))
        }
    }
}

impl std::fmt::Debug for Ed25519HostKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519HostKey")
            .field("algorithm", &ED25519_ALGORITHM_NAME)
            .field("public_key", &hex::encode(self.verifying_key.as_bytes()))
            .finish_non_exhaustive()
    }
}

/// Parses an ssh-ed25519 public key blob into the raw 32-byte key.
///
/// # Errors
///
/// Returns [`HalyardError::Protocol`] if the blob is truncated, names a
/// different algorithm, or carries a key of the wrong length.
pub fn parse_public_key_blob(blob: &[u8]) -> HalyardResult<[u8; 32]> {
    let mut offset = 0;
    let algorithm = read_string_field(blob, &mut offset, "host key algorithm name")?;
    if algorithm != ED25519_ALGORITHM_NAME.as_bytes() {
        return Err(HalyardError::Protocol(format!(
            "Unsupported host key algorithm: '{}'",
            String::from_utf8_lossy(&algorithm)
        )));
    }

    let key = read_string_field(blob, &mut offset, "host key")?;
    if key.len() != 32 {
        return Err(HalyardError::Protocol(format!(
            "Invalid Ed25519 public key length: expected 32, got {}",
            key.len()
        )));
    }

    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&key);
    Ok(key_bytes)
}

/// Parses an ssh-ed25519 signature blob into the raw 64-byte signature.
///
/// # Errors
///
/// Returns [`HalyardError::Protocol`] if the blob is truncated, names a
/// different algorithm, or carries a signature of the wrong length.
pub fn parse_signature_blob(blob: &[u8]) -> HalyardResult<[u8; 64]> {
    let mut offset = 0;
    let algorithm = read_string_field(blob, &mut offset, "signature algorithm name")?;
    if algorithm != ED25519_ALGORITHM_NAME.as_bytes() {
        return Err(HalyardError::Protocol(format!(
            "Unsupported signature algorithm: '{}'",
            String::from_utf8_lossy(&algorithm)
        )));
    }

    let signature = read_string_field(blob, &mut offset, "signature")?;
    if signature.len() != 64 {
        return Err(HalyardError::Protocol(format!(
            "Invalid Ed25519 signature length: expected 64, got {}",
            signature.len()
        )));
    }

    let mut sig_bytes = [0u8; 64];
    sig_bytes.copy_from_slice(&signature);
    Ok(sig_bytes)
}

fn read_string_field(data: &[u8], offset: &mut usize, what: &str) -> HalyardResult<Vec<u8>> {
    if *offset + 4 > data.len() {
        return Err(HalyardError::Protocol(format!(
            "Blob truncated reading {} length",
            what
        )));
    }

    let length = u32::from_be_bytes([
        data[*offset],
        data[*offset + 1],
        data[*offset + 2],
        data[*offset + 3],
    ]) as usize;
    *offset += 4;

    if *offset + length > data.len() {
        return Err(HalyardError::Protocol(format!(
            "Blob truncated reading {}",
            what
        )));
    }

    let bytes = data[*offset..*offset + length].to_vec();
    *offset += length;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_sign() {
        let key = Ed25519HostKey::generate().unwrap();
        let signature_blob = key.sign(b"exchange hash").unwrap();

        // string "ssh-ed25519" + string sig(64)
        assert_eq!(signature_blob.len(), 4 + 11 + 4 + 64);
        Ed25519HostKey::verify_blob(&key.public_key_blob(), b"exchange hash", &signature_blob)
            .unwrap();
    }

    #[test]
    fn test_verify_rejects_wrong_data() {
        let key = Ed25519HostKey::generate().unwrap();
        let signature_blob = key.sign(b"exchange hash").unwrap();

        let result =
            Ed25519HostKey::verify_blob(&key.public_key_blob(), b"other data", &signature_blob);
        assert!(matches!(result, Err(HalyardError::Security(_))));
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let key = Ed25519HostKey::generate().unwrap();
        let other = Ed25519HostKey::generate().unwrap();
        let signature_blob = key.sign(b"exchange hash").unwrap();

        let result =
            Ed25519HostKey::verify_blob(&other.public_key_blob(), b"exchange hash", &signature_blob);
        assert!(matches!(result, Err(HalyardError::Security(_))));
    }

    #[test]
    fn test_from_bytes_round_trip() {
        let key = Ed25519HostKey::generate().unwrap();
        let restored = Ed25519HostKey::from_bytes(key.secret_bytes().as_ref()).unwrap();
        assert_eq!(key.public_key_blob(), restored.public_key_blob());
    }

    #[test]
    fn test_from_bytes_wrong_length() {
        assert!(Ed25519HostKey::from_bytes(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_parse_public_key_blob() {
        let key = Ed25519HostKey::generate().unwrap();
        let blob = key.public_key_blob();
        let raw = parse_public_key_blob(&blob).unwrap();
        // The raw key is the last 32 bytes of the blob.
        assert_eq!(&raw[..], &blob[blob.len() - 32..]);
    }

    #[test]
    fn test_parse_public_key_blob_wrong_algorithm() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&7u32.to_be_bytes());
        blob.extend_from_slice(b"ssh-rsa");
        blob.extend_from_slice(&32u32.to_be_bytes());
        blob.extend_from_slice(&[0u8; 32]);

        match parse_public_key_blob(&blob) {
            Err(HalyardError::Protocol(msg)) => {
                assert!(msg.contains("Unsupported host key algorithm"));
            }
            _ => panic!("Expected Protocol error"),
        }
    }

    #[test]
    fn test_parse_signature_blob_truncated() {
        let key = Ed25519HostKey::generate().unwrap();
        let blob = key.sign(b"data").unwrap();
        assert!(parse_signature_blob(&blob[..blob.len() - 1]).is_err());
    }
}
