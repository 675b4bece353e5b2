use ciborium::value::Value as CborValue;
use serde_json::Value;

use super::utils::{get_bytes, get_text, signed_data};
use super::{AttestationFormat, AttestationStatement};
use crate::audit::AttestationContext;
use crate::certificate::Certificate;
use crate::crypto::{sha256, verify_x5c_jws};
use crate::errors::Fido2Error;
use crate::utils::base64_encode;

/// `android-safetynet`: a SafetyNet attestation JWS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyNetFormat;

impl AttestationFormat for SafetyNetFormat {
    fn name(&self) -> &str {
        "android-safetynet"
    }

    fn parse(&self, att_stmt: &[(CborValue, CborValue)]) -> Result<AttestationStatement, Fido2Error> {
        let ver = get_text(att_stmt, "ver").ok_or_else(|| {
            Fido2Error::Input(
                "android-safetynet attestation: expected 'ver' to be a String".to_string(),
            )
        })?;
        let response = get_bytes(att_stmt, "response").ok_or_else(|| {
            Fido2Error::Input(
                "android-safetynet attestation: expected 'response' to be ArrayBuffer".to_string(),
            )
        })?;
        let response = String::from_utf8(response).map_err(|_| {
            Fido2Error::Decode(
                "android-safetynet attestation: 'response' was not a UTF-8 JWS".to_string(),
            )
        })?;
        Ok(AttestationStatement::AndroidSafetyNet {
            ver,
            response,
            payload: None,
            att_cert: None,
            x5c: None,
        })
    }

    fn validate(&self, ctx: &mut AttestationContext) -> Result<(), Fido2Error> {
        let AttestationStatement::AndroidSafetyNet { ver, response, .. } =
            ctx.authnr_data.statement.clone()
        else {
            return Err(Fido2Error::Input(
                "android-safetynet attestation: statement is not a SafetyNet statement".to_string(),
            ));
        };

        let (payload, mut certs) = verify_jws(&response)?;

        if payload.get("ctsProfileMatch").and_then(Value::as_bool) != Some(true) {
            return Err(Fido2Error::Policy(
                "android-safetynet attestation: ctsProfileMatch: the device is not compatible"
                    .to_string(),
            ));
        }

        let expected_nonce = base64_encode(&sha256(&signed_data(ctx)));
        if payload.get("nonce").and_then(Value::as_str) != Some(expected_nonce.as_str()) {
            return Err(Fido2Error::Verification(
                "android-safetynet attestation: nonce check hash failed".to_string(),
            ));
        }

        if let Some(error) = payload.get("error") {
            let advice = payload
                .get("advice")
                .and_then(Value::as_str)
                .unwrap_or("undefined");
            let error = error.as_str().map_or_else(|| error.to_string(), str::to_string);
            return Err(Fido2Error::Policy(format!(
                "android-safetynet: {error}advice: {advice}"
            )));
        }

        let att_cert = certs.remove(0);
        let organization = Certificate::from_der(&att_cert)?
            .subject()?
            .get("organization-name")
            .cloned();

        ctx.authnr_data.statement = AttestationStatement::AndroidSafetyNet {
            ver,
            response,
            payload: Some(payload),
            att_cert: Some(att_cert),
            x5c: Some(certs),
        };
        for field in ["payload", "ver", "response", "attCert", "x5c"] {
            ctx.audit.journal(field);
        }

        if let Some(organization) = organization {
            ctx.audit.add_info("organization-name", organization);
        }
        ctx.audit.add_info("attestation-type", "basic");
        ctx.audit.journal("fmt");
        Ok(())
    }
}

const ERROR_PREFIX: &str = "android-safetynet attestation: ";

/// Verifies the JWS with the leaf certificate of its `x5c` header and returns
/// the payload and the header certificates, leaf first.
fn verify_jws(response: &str) -> Result<(Value, Vec<Vec<u8>>), Fido2Error> {
    let jws = verify_x5c_jws(response, ERROR_PREFIX)?;
    Ok((jws.claims, jws.certs))
}
