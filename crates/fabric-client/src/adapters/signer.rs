//! # Local Signer
//!
//! P-256 ECDSA signing identity held in memory.
//!
//! Signatures are SHA-256 ECDSA, low-S normalized and DER encoded.

use fabric_protos::msp::SerializedIdentity;
use p256::ecdsa::signature::Signer as _;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use p256::SecretKey;
use prost::Message;
use rand::rngs::OsRng;
use sha2::digest::DynDigest;
use sha2::{Digest, Sha256};

use crate::domain::FabricError;
use crate::ports::Signer;

/// Signing identity made of an enrollment certificate and its key.
pub struct LocalSigner {
    msp_id: String,
    certificate_pem: Vec<u8>,
    key: SigningKey,
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("msp_id", &self.msp_id)
            .finish_non_exhaustive()
    }
}

impl LocalSigner {
    /// Identity from a PEM certificate and a PKCS#8 or SEC1 PEM key.
    ///
    /// The key must match the certificate's public key.
    pub fn from_pem(
        msp_id: impl Into<String>,
        certificate_pem: &str,
        key_pem: &str,
    ) -> Result<Self, FabricError> {
        let secret = SecretKey::from_pkcs8_pem(key_pem)
            .or_else(|_| SecretKey::from_sec1_pem(key_pem))
            .map_err(|e| FabricError::Config(format!("invalid private key: {e}")))?;
        let key = SigningKey::from(secret);

        let public_key = certificate_public_key(certificate_pem)?;
        let expected = key.verifying_key().to_encoded_point(false);
        if public_key != expected.as_bytes() {
            return Err(FabricError::Config(
                "private key does not match certificate".to_string(),
            ));
        }

        Ok(Self {
            msp_id: msp_id.into(),
            certificate_pem: certificate_pem.as_bytes().to_vec(),
            key,
        })
    }

    /// Identity with a freshly generated key.
    pub fn random(msp_id: impl Into<String>, certificate_pem: impl Into<Vec<u8>>) -> Self {
        Self {
            msp_id: msp_id.into(),
            certificate_pem: certificate_pem.into(),
            key: SigningKey::random(&mut OsRng),
        }
    }

    /// Organization of the identity.
    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    /// Public half of the signing key.
    pub fn verifying_key(&self) -> &p256::ecdsa::VerifyingKey {
        self.key.verifying_key()
    }
}

impl Signer for LocalSigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, FabricError> {
        let signature: Signature = self
            .key
            .try_sign(message)
            .map_err(|e| FabricError::Signing(e.to_string()))?;
        let signature = signature.normalize_s().unwrap_or(signature);
        Ok(signature.to_der().as_bytes().to_vec())
    }

    fn serialize(&self) -> Result<Vec<u8>, FabricError> {
        Ok(SerializedIdentity {
            mspid: self.msp_id.clone(),
            id_bytes: self.certificate_pem.clone(),
        }
        .encode_to_vec())
    }

    fn hasher(&self) -> Result<Box<dyn DynDigest + Send>, FabricError> {
        Ok(Box::new(Sha256::new()))
    }
}

fn certificate_public_key(certificate_pem: &str) -> Result<Vec<u8>, FabricError> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(certificate_pem.as_bytes())
        .map_err(|e| FabricError::Config(format!("invalid certificate PEM: {e}")))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| FabricError::Config(format!("invalid certificate: {e}")))?;
    Ok(cert.public_key().subject_public_key.data.to_vec())
}
