use ciborium::value::Value as CborValue;

use super::authenticator_data::AuthenticatorData;
use super::request::CredentialRequest;
use crate::attestation::{AttestationRegistry, AttestationStatement};
use crate::codec::cbor::{self, map_get};
use crate::errors::Fido2Error;

/// Authenticator side of a registration response.
#[derive(Debug, Clone)]
pub struct AttestationAuthnrData {
    pub fmt: String,
    pub statement: AttestationStatement,
    pub transports: Option<Vec<String>>,
    pub data: AuthenticatorData,
}

/// Authenticator side of an authentication response.
#[derive(Debug, Clone)]
pub struct AssertionAuthnrData {
    pub sig: Vec<u8>,
    pub user_handle: Option<Vec<u8>>,
    pub data: AuthenticatorData,
}

/// Access to the decoded authenticator data and the names of every field the
/// audit must see validated.
pub trait AuthnrFields {
    fn authenticator_data(&self) -> &AuthenticatorData;

    fn field_names(&self) -> Vec<String>;
}

impl AuthnrFields for AttestationAuthnrData {
    fn authenticator_data(&self) -> &AuthenticatorData {
        &self.data
    }

    fn field_names(&self) -> Vec<String> {
        let mut names = vec!["fmt".to_string()];
        names.extend(self.statement.field_names());
        names.push("rawAuthnrData".to_string());
        names.push("transports".to_string());
        names.extend(self.data.field_names().into_iter().map(str::to_string));
        names
    }
}

impl AuthnrFields for AssertionAuthnrData {
    fn authenticator_data(&self) -> &AuthenticatorData {
        &self.data
    }

    fn field_names(&self) -> Vec<String> {
        let mut names = vec![
            "sig".to_string(),
            "userHandle".to_string(),
            "rawAuthnrData".to_string(),
        ];
        names.extend(self.data.field_names().into_iter().map(str::to_string));
        names
    }
}

/// Decodes the attestation object of a registration response.
pub(crate) fn parse_authnr_attestation_response(
    request: &CredentialRequest,
    registry: &AttestationRegistry,
) -> Result<AttestationAuthnrData, Fido2Error> {
    let response = request.response()?;
    let raw = response
        .attestation_object
        .as_ref()
        .ok_or_else(|| {
            Fido2Error::Input("expected 'attestationObject' to be ArrayBuffer".to_string())
        })?
        .to_bytes("attestationObject")?;

    let parsed = cbor::decode_exact(&raw)
        .map_err(|e| Fido2Error::Decode(format!("couldn't parse attestationObject cbor: {}", e.message())))?;
    let CborValue::Map(object) = parsed else {
        return Err(Fido2Error::Decode(
            "couldn't parse attestationObject cbor: expected a map".to_string(),
        ));
    };

    let fmt = match map_get(&object, "fmt") {
        Some(CborValue::Text(fmt)) => fmt.clone(),
        _ => {
            return Err(Fido2Error::Input(
                "expected attestation  to contain a 'fmt' string".to_string(),
            ));
        }
    };
    let att_stmt = match map_get(&object, "attStmt") {
        Some(stmt @ CborValue::Map(_)) => stmt,
        _ => {
            return Err(Fido2Error::Input(
                "expected attestation cbor to contain a 'attStmt' object".to_string(),
            ));
        }
    };
    let auth_data = match map_get(&object, "authData") {
        Some(CborValue::Bytes(b)) => b,
        _ => {
            return Err(Fido2Error::Input(
                "expected attestation cbor to contain a 'authData' byte sequence".to_string(),
            ));
        }
    };

    let statement = registry.parse(&fmt, att_stmt)?;
    let data = AuthenticatorData::parse(auth_data)?;

    tracing::debug!(
        "Parsed '{}' attestation, flags {:?}, counter {}",
        fmt,
        data.flags,
        data.counter
    );

    Ok(AttestationAuthnrData {
        fmt,
        statement,
        transports: request.transports.clone(),
        data,
    })
}

/// Decodes the authenticator data, signature and user handle of an
/// authentication response. An empty user handle counts as absent.
pub(crate) fn parse_authnr_assertion_response(
    request: &CredentialRequest,
) -> Result<AssertionAuthnrData, Fido2Error> {
    let response = request.response()?;
    let raw = response
        .authenticator_data
        .as_ref()
        .ok_or_else(|| {
            Fido2Error::Input("expected 'authenticatorData' to be ArrayBuffer".to_string())
        })?
        .to_bytes("authenticatorData")?;
    let sig = response
        .signature
        .as_ref()
        .ok_or_else(|| Fido2Error::Input("expected 'signature' to be ArrayBuffer".to_string()))?
        .to_bytes("signature")?;
    let user_handle = match &response.user_handle {
        Some(handle) => Some(handle.to_bytes("userHandle")?).filter(|h| !h.is_empty()),
        None => None,
    };

    let data = AuthenticatorData::parse(&raw)?;

    Ok(AssertionAuthnrData {
        sig,
        user_handle,
        data,
    })
}
