//! Verification state and the field audit.
//!
//! Every field decoded from a response must be validated before a result is
//! handed out. Validators record what they checked in the [`Audit`] journal
//! and the final audit step refuses to complete while anything is missing.

mod expectations;
mod validators;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;

use crate::certificate::CertManager;
use crate::parser::{AssertionAuthnrData, AttestationAuthnrData, ClientData};

pub use expectations::{AllowCredential, AllowCredentialInput, Expectations, ExpectationsInput};
pub(crate) use expectations::{
    ASSERTION_OPTIONAL, ASSERTION_REQUIRED, ATTESTATION_OPTIONAL, ATTESTATION_REQUIRED,
};

/// Record of what was validated while verifying a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    pub valid_expectations: bool,
    pub valid_request: bool,
    pub complete: bool,
    pub journal: BTreeSet<String>,
    pub warning: BTreeMap<String, String>,
    pub info: BTreeMap<String, serde_json::Value>,
}

impl Audit {
    pub fn journal(&mut self, field: &str) {
        self.journal.insert(field.to_string());
    }

    pub fn is_journaled(&self, field: &str) -> bool {
        self.journal.contains(field)
    }

    pub fn add_info(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.info.insert(key.to_string(), value.into());
    }

    pub fn add_warning(&mut self, key: &str, message: impl Into<String>) {
        self.warning.insert(key.to_string(), message.into());
    }
}

/// Everything a validator can look at, plus the audit it writes to.
#[derive(Debug)]
pub struct VerificationContext<D> {
    pub client_data: ClientData,
    pub authnr_data: D,
    pub expectations: Expectations,
    pub audit: Audit,
    pub(crate) cert_manager: Arc<CertManager>,
}

pub type AttestationContext = VerificationContext<AttestationAuthnrData>;
pub type AssertionContext = VerificationContext<AssertionAuthnrData>;

impl<D> VerificationContext<D> {
    pub(crate) fn new(
        client_data: ClientData,
        authnr_data: D,
        expectations: Expectations,
        audit: Audit,
        cert_manager: Arc<CertManager>,
    ) -> Self {
        Self {
            client_data,
            authnr_data,
            expectations,
            audit,
            cert_manager,
        }
    }

    /// Trusted certificates available to attestation formats.
    pub fn cert_manager(&self) -> &CertManager {
        &self.cert_manager
    }
}
