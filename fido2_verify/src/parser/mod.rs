//! Decoding of registration and authentication responses.

mod authenticator_data;
mod client_data;
mod request;
mod response;

pub use authenticator_data::{AttestedCredential, AuthenticatorData};
pub use client_data::ClientData;
pub use request::{BinaryInput, CredentialRequest, CredentialResponse};
pub use response::{AssertionAuthnrData, AttestationAuthnrData, AuthnrFields};

pub(crate) use authenticator_data::{FLAG_AT, FLAG_ED, FLAG_UP, FLAG_UV};
pub(crate) use client_data::parse_client_response;
pub(crate) use response::{parse_authnr_assertion_response, parse_authnr_attestation_response};
