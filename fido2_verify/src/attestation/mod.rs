//! Attestation statement formats.
//!
//! Each format parses its `attStmt` into an [`AttestationStatement`] and later
//! validates it against the rest of the registration response. Formats are
//! looked up by their `fmt` identifier in an [`AttestationRegistry`].

mod none;
mod packed;
mod safetynet;
mod tpm;
mod u2f;
mod utils;

use std::collections::BTreeMap;

use ciborium::value::Value as CborValue;

use crate::audit::AttestationContext;
use crate::codec::cbor::describe;
use crate::crypto::HashAlg;
use crate::errors::Fido2Error;

pub use none::NoneFormat;
pub use packed::PackedFormat;
pub use safetynet::SafetyNetFormat;
pub use tpm::TpmFormat;
pub use u2f::FidoU2fFormat;

/// COSE algorithm of a statement, resolved to its name and hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgInfo {
    pub id: i64,
    pub alg_name: Option<&'static str>,
    pub hash_alg: Option<HashAlg>,
}

/// A parsed attestation statement.
///
/// Fields filled in during validation (the SafetyNet payload and certificates
/// taken from the JWS header) start out empty.
#[derive(Debug, Clone)]
pub enum AttestationStatement {
    None,
    Packed {
        alg: AlgInfo,
        att_cert: Option<Vec<u8>>,
        x5c: Option<Vec<Vec<u8>>>,
        ecdaa_key_id: Option<Vec<u8>>,
        sig: Vec<u8>,
    },
    FidoU2f {
        att_cert: Vec<u8>,
        x5c: Vec<Vec<u8>>,
        sig: Vec<u8>,
    },
    AndroidSafetyNet {
        ver: String,
        response: String,
        payload: Option<serde_json::Value>,
        att_cert: Option<Vec<u8>>,
        x5c: Option<Vec<Vec<u8>>>,
    },
    Tpm {
        ver: String,
        alg: AlgInfo,
        att_cert: Vec<u8>,
        x5c: Vec<Vec<u8>>,
        sig: Vec<u8>,
        cert_info: crate::codec::CertInfo,
        pub_area: crate::codec::PubArea,
    },
    /// Statement of a format registered by the caller.
    Other(BTreeMap<String, CborValue>),
}

impl AttestationStatement {
    /// Statement members that must be covered by the audit.
    pub(crate) fn field_names(&self) -> Vec<String> {
        let names: Vec<&str> = match self {
            AttestationStatement::None => vec![],
            AttestationStatement::Packed {
                x5c, ecdaa_key_id, ..
            } => {
                let mut names = vec!["alg"];
                if x5c.is_some() {
                    names.push("attCert");
                }
                names.push("x5c");
                if ecdaa_key_id.is_some() {
                    names.push("ecdaaKeyId");
                }
                names.push("sig");
                names
            }
            AttestationStatement::FidoU2f { .. } => vec!["attCert", "x5c", "sig"],
            AttestationStatement::AndroidSafetyNet { payload, .. } => {
                if payload.is_some() {
                    vec!["ver", "response", "payload", "attCert", "x5c"]
                } else {
                    vec!["ver", "response"]
                }
            }
            AttestationStatement::Tpm { .. } => {
                vec!["attCert", "x5c", "sig", "ver", "alg", "certInfo", "pubArea"]
            }
            AttestationStatement::Other(map) => map.keys().map(String::as_str).collect(),
        };
        names.into_iter().map(str::to_string).collect()
    }
}

/// An attestation statement format.
pub trait AttestationFormat: Send + Sync {
    /// The `fmt` identifier, e.g. `"packed"`.
    fn name(&self) -> &str;

    /// Decodes the `attStmt` map.
    fn parse(&self, att_stmt: &[(CborValue, CborValue)]) -> Result<AttestationStatement, Fido2Error>;

    /// Verifies the statement and journals every statement member it checked,
    /// finishing with `fmt`.
    fn validate(&self, ctx: &mut AttestationContext) -> Result<(), Fido2Error>;
}

/// Attestation formats by `fmt` identifier.
#[derive(Default)]
pub struct AttestationRegistry {
    formats: BTreeMap<String, Box<dyn AttestationFormat>>,
}

impl std::fmt::Debug for AttestationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationRegistry")
            .field("formats", &self.formats.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AttestationRegistry {
    /// Registry holding `none`, `packed`, `fido-u2f`, `android-safetynet` and `tpm`.
    pub fn with_default_formats() -> Self {
        let mut registry = Self::default();
        let defaults: [Box<dyn AttestationFormat>; 5] = [
            Box::new(NoneFormat),
            Box::new(PackedFormat),
            Box::new(FidoU2fFormat),
            Box::new(SafetyNetFormat),
            Box::new(TpmFormat),
        ];
        for format in defaults {
            registry
                .formats
                .insert(format.name().to_string(), format);
        }
        registry
    }

    pub fn add_format(&mut self, format: Box<dyn AttestationFormat>) -> Result<(), Fido2Error> {
        let name = format.name().to_string();
        if self.formats.contains_key(&name) {
            return Err(Fido2Error::Config(format!(
                "can't add format: '{name}' already exists"
            )));
        }
        tracing::debug!("Registering attestation format '{}'", name);
        self.formats.insert(name, format);
        Ok(())
    }

    pub fn delete_all_formats(&mut self) {
        self.formats.clear();
    }

    pub fn format_names(&self) -> Vec<String> {
        self.formats.keys().cloned().collect()
    }

    fn get(&self, fmt: &str) -> Result<&dyn AttestationFormat, Fido2Error> {
        self.formats
            .get(fmt)
            .map(|f| f.as_ref())
            .ok_or_else(|| {
                Fido2Error::UnsupportedFormat(format!("no support for attestation format: {fmt}"))
            })
    }

    pub(crate) fn parse(&self, fmt: &str, att_stmt: &CborValue) -> Result<AttestationStatement, Fido2Error> {
        let format = self.get(fmt)?;
        let CborValue::Map(map) = att_stmt else {
            return Err(Fido2Error::Input(format!(
                "expected 'attStmt' to be object, got: {}",
                describe(att_stmt)
            )));
        };
        format.parse(map)
    }

    pub(crate) fn validate(&self, ctx: &mut AttestationContext) -> Result<(), Fido2Error> {
        let fmt = ctx.authnr_data.fmt.clone();
        let format = self.get(&fmt)?;
        match fmt.as_str() {
            "none" => tracing::debug!("Using 'none' attestation format"),
            "packed" => tracing::debug!("Using 'packed' attestation format"),
            "fido-u2f" => tracing::debug!("Using 'fido-u2f' attestation format"),
            "android-safetynet" => tracing::debug!("Using 'android-safetynet' attestation format"),
            "tpm" => tracing::debug!("Using 'tpm' attestation format"),
            other => tracing::debug!("Using custom attestation format '{}'", other),
        }
        format.validate(ctx)
    }
}
