//! fido2-verify - Server-side FIDO2/WebAuthn verification
//!
//! This crate verifies registration (attestation) and authentication
//! (assertion) responses produced by WebAuthn authenticators. It parses the
//! client data and authenticator data, validates the `none`, `packed`,
//! `fido-u2f`, `android-safetynet` and `tpm` attestation formats, checks
//! certificate chains, and proves through an audit journal that every parsed
//! field was checked against the relying party's expectations.
//!
//! Challenge storage, credential persistence and HTTP handling are left to the
//! caller.

mod attestation;
mod audit;
mod certificate;
mod codec;
mod config;
mod crypto;
mod errors;
mod extensions;
mod fido2;
mod mds;
mod options;
mod origin;
mod parser;
mod result;
mod utils;

#[cfg(test)]
mod test_utils;

pub use fido2::{Factor, Fido2};

pub use errors::Fido2Error;
pub use utils::UtilError;

pub use config::{AttestationConveyance, AuthenticatorAttachment, Fido2Config, UserVerification};

pub use options::{
    AssertionOptions, AttestationOptions, AuthenticatorSelection, OptionsRequest,
    PubKeyCredParam, RelyingParty,
};

pub use extensions::{Extension, ExtensionKind, ExtensionRegistry};

pub use result::{Fido2AssertionResult, Fido2AttestationResult, Fido2Result};

pub use parser::{
    AssertionAuthnrData, AttestationAuthnrData, AttestedCredential, AuthenticatorData,
    AuthnrFields, BinaryInput, ClientData, CredentialRequest, CredentialResponse,
};

pub use audit::{
    AllowCredential, AllowCredentialInput, AssertionContext, AttestationContext, Audit,
    Expectations, ExpectationsInput, VerificationContext,
};

pub use attestation::{
    AlgInfo, AttestationFormat, AttestationRegistry, AttestationStatement, FidoU2fFormat,
    NoneFormat, PackedFormat, SafetyNetFormat, TpmFormat,
};

pub use certificate::{
    CertManager, Certificate, Crl, ExtensionValue, Extensions, GeneralName, IssuerStatus, oid,
    roots,
};

pub use codec::{CertInfo, Jwk, PubArea, alg_to_hash, alg_to_str, cose_to_jwk};
pub use crypto::HashAlg;

pub use mds::{MdsCollection, MdsEntry, MdsEntryId, MdsToc, TocEntry, UserVerificationDesc};

pub use origin::{check_origin, check_rp_id};
