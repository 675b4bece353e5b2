use serde::Serialize;
use serde_json::Value;

use super::request::CredentialRequest;
use crate::errors::Fido2Error;

/// Parsed `clientDataJSON`.
///
/// Members are kept as received; type checks happen in the validators so that
/// each failure names the member that was wrong.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientData {
    pub challenge: Option<Value>,
    pub origin: Option<Value>,
    #[serde(rename = "type")]
    pub type_: Option<Value>,
    pub token_binding: Option<Value>,
    #[serde(skip)]
    pub raw_client_data_json: Vec<u8>,
    #[serde(skip)]
    pub raw_id: Vec<u8>,
}

impl ClientData {
    /// Every field of client data is subject to the audit, present or not.
    pub const FIELD_NAMES: [&'static str; 6] = [
        "challenge",
        "origin",
        "type",
        "tokenBinding",
        "rawClientDataJson",
        "rawId",
    ];

    pub fn challenge_str(&self) -> Option<&str> {
        self.challenge.as_ref().and_then(Value::as_str)
    }

    pub fn origin_str(&self) -> Option<&str> {
        self.origin.as_ref().and_then(Value::as_str)
    }

    pub fn type_str(&self) -> Option<&str> {
        self.type_.as_ref().and_then(Value::as_str)
    }
}

/// Decodes the client data of a registration or authentication response.
pub(crate) fn parse_client_response(request: &CredentialRequest) -> Result<ClientData, Fido2Error> {
    let raw_id = request.raw_id_bytes()?;
    let response = request.response()?;

    let raw_client_data_json = response
        .client_data_json
        .as_ref()
        .ok_or_else(|| Fido2Error::Input("expected 'clientDataJSON' to be ArrayBuffer".to_string()))?
        .to_bytes("clientDataJSON")?;

    let parsed: Value = serde_json::from_slice(&raw_client_data_json)
        .map_err(|e| Fido2Error::Decode(format!("couldn't parse clientDataJson: {e}")))?;
    let Value::Object(mut members) = parsed else {
        return Err(Fido2Error::Decode(
            "couldn't parse clientDataJson: expected a JSON object".to_string(),
        ));
    };

    Ok(ClientData {
        challenge: members.remove("challenge"),
        origin: members.remove("origin"),
        type_: members.remove("type"),
        token_binding: members.remove("tokenBinding"),
        raw_client_data_json,
        raw_id,
    })
}
