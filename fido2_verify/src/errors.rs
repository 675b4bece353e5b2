use thiserror::Error;

use crate::utils::UtilError;

/// Errors that can occur while verifying FIDO2/WebAuthn responses.
///
/// Every variant carries the text of the rule that was violated, so the caller
/// can tell exactly which check rejected a response.
#[derive(Debug, Error)]
pub enum Fido2Error {
    /// A request or expectation value has the wrong type or shape
    #[error("Input error: {0}")]
    Input(String),

    /// Malformed CBOR, ASN.1, JSON or TPM structure
    #[error("Decode error: {0}")]
    Decode(String),

    /// A binary buffer ended before a fixed-size field
    #[error("Truncated data: {0}")]
    Truncated(String),

    /// Unknown COSE key type, label or algorithm
    #[error("Unsupported key: {0}")]
    UnsupportedKey(String),

    /// Attestation format is not registered
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Certificate could not be parsed
    #[error("Certificate parse error: {0}")]
    CertParse(String),

    /// Certificate chain did not validate against the supplied roots
    #[error("Chain validation error: {0}")]
    ChainValidation(String),

    /// Signature, hash or nonce mismatch
    #[error("Verification error: {0}")]
    Verification(String),

    /// The response is well formed but violates a relying party rule
    #[error("Policy violation: {0}")]
    Policy(String),

    /// A parsed field was never validated
    #[error("Audit error: {0}")]
    Audit(String),

    /// Invalid library configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metadata collection error
    #[error("Metadata error: {0}")]
    Mds(String),

    /// Feature that is deliberately left unimplemented (ECDAA, authenticator extensions)
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Error from utility operations
    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),

    /// Error from JSON serialization/deserialization
    #[error("Serde error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl Fido2Error {
    /// The rule text without the kind prefix.
    pub fn message(&self) -> String {
        match self {
            Fido2Error::Input(m)
            | Fido2Error::Decode(m)
            | Fido2Error::Truncated(m)
            | Fido2Error::UnsupportedKey(m)
            | Fido2Error::UnsupportedFormat(m)
            | Fido2Error::CertParse(m)
            | Fido2Error::ChainValidation(m)
            | Fido2Error::Verification(m)
            | Fido2Error::Policy(m)
            | Fido2Error::Audit(m)
            | Fido2Error::Config(m)
            | Fido2Error::Mds(m)
            | Fido2Error::NotImplemented(m) => m.clone(),
            Fido2Error::Utils(e) => e.to_string(),
            Fido2Error::SerdeJson(e) => e.to_string(),
        }
    }
}
