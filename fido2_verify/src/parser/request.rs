use serde::{Deserialize, Serialize};

use crate::errors::Fido2Error;
use crate::utils::{base64url_encode, coerce_to_bytes};

/// A binary field as delivered by the client: raw bytes or a base64/base64url string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinaryInput {
    Bytes(Vec<u8>),
    Text(String),
}

impl BinaryInput {
    /// Decodes the value; padding and alphabet of text input are not significant.
    pub fn to_bytes(&self, name: &str) -> Result<Vec<u8>, Fido2Error> {
        match self {
            BinaryInput::Bytes(b) => Ok(b.clone()),
            BinaryInput::Text(s) if s.is_empty() => Ok(Vec::new()),
            BinaryInput::Text(s) => coerce_to_bytes(s)
                .map_err(|_| Fido2Error::Input(format!("could not coerce '{name}' to bytes"))),
        }
    }

    /// Text is passed through unchanged, bytes are encoded as unpadded base64url.
    pub fn to_base64url(&self) -> String {
        match self {
            BinaryInput::Text(s) => s.clone(),
            BinaryInput::Bytes(b) => base64url_encode(b),
        }
    }
}

impl From<Vec<u8>> for BinaryInput {
    fn from(bytes: Vec<u8>) -> Self {
        BinaryInput::Bytes(bytes)
    }
}

impl From<&[u8]> for BinaryInput {
    fn from(bytes: &[u8]) -> Self {
        BinaryInput::Bytes(bytes.to_vec())
    }
}

impl From<String> for BinaryInput {
    fn from(text: String) -> Self {
        BinaryInput::Text(text)
    }
}

impl From<&str> for BinaryInput {
    fn from(text: &str) -> Self {
        BinaryInput::Text(text.to_string())
    }
}

/// `response` member of a PublicKeyCredential.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Option<BinaryInput>,
    pub attestation_object: Option<BinaryInput>,
    pub authenticator_data: Option<BinaryInput>,
    pub signature: Option<BinaryInput>,
    pub user_handle: Option<BinaryInput>,
}

/// A PublicKeyCredential returned by `navigator.credentials.create()` or `.get()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    pub id: Option<BinaryInput>,
    pub raw_id: Option<BinaryInput>,
    pub response: Option<CredentialResponse>,
    pub transports: Option<Vec<String>>,
}

impl CredentialRequest {
    /// Registration response.
    pub fn attestation(
        raw_id: impl Into<BinaryInput>,
        client_data_json: impl Into<BinaryInput>,
        attestation_object: impl Into<BinaryInput>,
    ) -> Self {
        Self {
            id: None,
            raw_id: Some(raw_id.into()),
            response: Some(CredentialResponse {
                client_data_json: Some(client_data_json.into()),
                attestation_object: Some(attestation_object.into()),
                ..Default::default()
            }),
            transports: None,
        }
    }

    /// Authentication response.
    pub fn assertion(
        raw_id: impl Into<BinaryInput>,
        client_data_json: impl Into<BinaryInput>,
        authenticator_data: impl Into<BinaryInput>,
        signature: impl Into<BinaryInput>,
        user_handle: Option<BinaryInput>,
    ) -> Self {
        Self {
            id: None,
            raw_id: Some(raw_id.into()),
            response: Some(CredentialResponse {
                client_data_json: Some(client_data_json.into()),
                authenticator_data: Some(authenticator_data.into()),
                signature: Some(signature.into()),
                user_handle,
                ..Default::default()
            }),
            transports: None,
        }
    }

    pub fn with_transports(mut self, transports: Vec<String>) -> Self {
        self.transports = Some(transports);
        self
    }

    pub(crate) fn response(&self) -> Result<&CredentialResponse, Fido2Error> {
        self.response.as_ref().ok_or_else(|| {
            Fido2Error::Input("expected 'response' field of request to be Object".to_string())
        })
    }

    /// `rawId`, falling back to `id`.
    pub(crate) fn raw_id_bytes(&self) -> Result<Vec<u8>, Fido2Error> {
        self.raw_id
            .as_ref()
            .or(self.id.as_ref())
            .ok_or_else(|| Fido2Error::Input("could not coerce 'rawId' to bytes".to_string()))?
            .to_bytes("rawId")
    }

    fn check_id(&self) -> Result<(), Fido2Error> {
        if self.raw_id.is_none() && self.id.is_none() {
            return Err(Fido2Error::Input(
                "expected 'id' or 'rawId' field of request to be present".to_string(),
            ));
        }
        Ok(())
    }

    /// Shape check of a registration response.
    pub(crate) fn validate_create(&self) -> Result<(), Fido2Error> {
        self.check_id()?;
        let response = self.response()?;
        if response.attestation_object.is_none() {
            return Err(Fido2Error::Input(
                "expected 'response.attestationObject' to be base64 String or ArrayBuffer"
                    .to_string(),
            ));
        }
        if response.client_data_json.is_none() {
            return Err(Fido2Error::Input(
                "expected 'response.clientDataJSON' to be base64 String or ArrayBuffer".to_string(),
            ));
        }
        Ok(())
    }

    /// Shape check of an authentication response.
    pub(crate) fn validate_assertion(&self) -> Result<(), Fido2Error> {
        self.check_id()?;
        let response = self.response()?;
        if response.client_data_json.is_none() {
            return Err(Fido2Error::Input(
                "expected 'response.clientDataJSON' to be base64 String or ArrayBuffer".to_string(),
            ));
        }
        if response.authenticator_data.is_none() {
            return Err(Fido2Error::Input(
                "expected 'response.authenticatorData' to be base64 String or ArrayBuffer"
                    .to_string(),
            ));
        }
        if response.signature.is_none() {
            return Err(Fido2Error::Input(
                "expected 'response.signature' to be base64 String or ArrayBuffer".to_string(),
            ));
        }
        Ok(())
    }
}
