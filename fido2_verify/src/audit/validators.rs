use std::collections::BTreeSet;

use serde_json::Value;
use subtle::ConstantTimeEq;

use super::VerificationContext;
use crate::crypto::{sha256, verify_spki_signature_default};
use crate::errors::Fido2Error;
use crate::origin::{check_origin, origin_hostname};
use crate::parser::{
    AssertionAuthnrData, AttestationAuthnrData, AttestedCredential, AuthnrFields, ClientData,
    FLAG_UP, FLAG_UV,
};
use crate::utils::{base64url_encode, is_base64url, is_pem, pem_to_der};

fn json_display(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

impl<D: AuthnrFields> VerificationContext<D> {
    fn attested(&self) -> Option<&AttestedCredential> {
        self.authnr_data.authenticator_data().attested.as_ref()
    }

    pub(crate) fn validate_raw_client_data_json(&mut self) -> Result<(), Fido2Error> {
        if self.client_data.raw_client_data_json.is_empty() {
            return Err(Fido2Error::Input(
                "clientData clientDataJson should be ArrayBuffer".to_string(),
            ));
        }
        self.audit.journal("rawClientDataJson");
        Ok(())
    }

    pub(crate) fn validate_origin(&mut self) -> Result<(), Fido2Error> {
        let origin = self
            .client_data
            .origin_str()
            .ok_or_else(|| Fido2Error::Input("clientData origin was not a string".to_string()))?;
        let origin = check_origin(origin)?;
        if self.expectations.origin.as_deref() != Some(origin.as_str()) {
            tracing::debug!(
                "Origin mismatch: got {}, expected {:?}",
                origin,
                self.expectations.origin
            );
            return Err(Fido2Error::Policy(
                "clientData origin did not match expected origin".to_string(),
            ));
        }
        self.audit.journal("origin");
        Ok(())
    }

    pub(crate) fn validate_challenge(&mut self) -> Result<(), Fido2Error> {
        let challenge = self
            .client_data
            .challenge_str()
            .ok_or_else(|| Fido2Error::Input("clientData challenge was not a string".to_string()))?;
        if !is_base64url(challenge) {
            return Err(Fido2Error::Input(
                "clientData challenge was not properly encoded base64url".to_string(),
            ));
        }
        let challenge = challenge.trim_end_matches('=');
        if self.expectations.challenge.as_deref() != Some(challenge) {
            return Err(Fido2Error::Policy("clientData challenge mismatch".to_string()));
        }
        self.audit.journal("challenge");
        Ok(())
    }

    pub(crate) fn validate_token_binding(&mut self) -> Result<(), Fido2Error> {
        match &self.client_data.token_binding {
            None => {}
            Some(Value::Object(binding)) => {
                let status = binding.get("status");
                if !matches!(
                    status.and_then(Value::as_str),
                    Some("not-supported") | Some("supported")
                ) {
                    return Err(Fido2Error::Policy(format!(
                        "tokenBinding status should be 'not-supported' or 'supported', got: {}",
                        json_display(status)
                    )));
                }
                if binding.len() != 1 {
                    return Err(Fido2Error::Policy("tokenBinding had too many keys".to_string()));
                }
            }
            Some(other) => {
                return Err(Fido2Error::Input(format!(
                    "Token binding field malformed: {other}"
                )));
            }
        }
        self.audit.journal("tokenBinding");
        Ok(())
    }

    pub(crate) fn validate_id(&mut self) -> Result<(), Fido2Error> {
        let raw_id = &self.client_data.raw_id;
        if raw_id.is_empty() {
            return Err(Fido2Error::Input("expected id to be of type ArrayBuffer".to_string()));
        }
        if let Some(attested) = self.attested() {
            if attested.cred_id != *raw_id {
                return Err(Fido2Error::Policy("id and credId were not the same".to_string()));
            }
        }
        if let Some(Some(allowed)) = &self.expectations.allow_credentials {
            if !allowed.iter().any(|cred| cred.id == *raw_id) {
                return Err(Fido2Error::Policy(
                    "Credential ID does not match any value in allowCredentials".to_string(),
                ));
            }
        }
        self.audit.journal("rawId");
        Ok(())
    }

    pub(crate) fn validate_raw_authnr_data(&mut self) -> Result<(), Fido2Error> {
        if self.authnr_data.authenticator_data().raw.is_empty() {
            return Err(Fido2Error::Input(
                "authnrData rawAuthnrData should be ArrayBuffer".to_string(),
            ));
        }
        self.audit.journal("rawAuthnrData");
        Ok(())
    }

    /// The rpIdHash must be SHA-256 of the expected rpId, or of the origin's
    /// hostname when no rpId is expected.
    pub(crate) fn validate_rp_id_hash(&mut self) -> Result<(), Fido2Error> {
        let rp_id = match (&self.expectations.rp_id, &self.expectations.origin) {
            (Some(rp_id), _) if rp_id.starts_with("http") => origin_hostname(rp_id)?,
            (Some(rp_id), _) => rp_id.clone(),
            (None, Some(origin)) => origin_hostname(origin)?,
            (None, None) => {
                return Err(Fido2Error::Input(
                    "expectation did not contain value for 'origin'".to_string(),
                ));
            }
        };
        let expected = sha256(rp_id.as_bytes());
        let actual = &self.authnr_data.authenticator_data().rp_id_hash;
        if actual.len() != expected.len() {
            return Err(Fido2Error::Policy("authnrData rpIdHash length mismatch".to_string()));
        }
        if !bool::from(actual.as_slice().ct_eq(&expected)) {
            return Err(Fido2Error::Policy("authnrData rpIdHash mismatch".to_string()));
        }
        self.audit.journal("rpIdHash");
        Ok(())
    }

    pub(crate) fn validate_flags(&mut self) -> Result<(), Fido2Error> {
        let data = self.authnr_data.authenticator_data();
        let expected = self.expectations.flags.clone().unwrap_or_default();
        let missing_up = || {
            Fido2Error::Policy(
                "expected User Presence (UP) flag to be set if User Verification (UV) is set"
                    .to_string(),
            )
        };

        for flag in &expected {
            match flag.as_str() {
                "UP-or-UV" => {
                    if data.has_flag(FLAG_UV) {
                        if !data.has_flag(FLAG_UP) {
                            return Err(missing_up());
                        }
                    } else if !data.has_flag(FLAG_UP) {
                        return Err(Fido2Error::Policy(
                            "expected User Presence (UP) or User Verification (UV) flag to be set and neither was"
                                .to_string(),
                        ));
                    }
                }
                "UV" => {
                    if !data.has_flag(FLAG_UV) {
                        return Err(Fido2Error::Policy(format!("expected flag was not set: {flag}")));
                    }
                    if !data.has_flag(FLAG_UP) {
                        return Err(missing_up());
                    }
                }
                other => {
                    if !data.has_flag(other) {
                        return Err(Fido2Error::Policy(format!("expected flag was not set: {other}")));
                    }
                }
            }
        }

        self.audit.journal("flags");
        Ok(())
    }

    pub(crate) fn validate_initial_counter(&mut self) -> Result<(), Fido2Error> {
        // counter is decoded as u32 so any value is acceptable for a new credential
        self.audit.journal("counter");
        Ok(())
    }

    pub(crate) fn validate_aaguid(&mut self) -> Result<(), Fido2Error> {
        let attested = self
            .attested()
            .ok_or_else(|| Fido2Error::Input("authnrData AAGUID is not ArrayBuffer".to_string()))?;
        if attested.aaguid.len() != 16 {
            return Err(Fido2Error::Decode("authnrData AAGUID was wrong length".to_string()));
        }
        self.audit.journal("aaguid");
        Ok(())
    }

    pub(crate) fn validate_cred_id(&mut self) -> Result<(), Fido2Error> {
        let attested = self
            .attested()
            .ok_or_else(|| Fido2Error::Input("authnrData credId should be ArrayBuffer".to_string()))?;
        if attested.cred_id.len() != usize::from(attested.cred_id_len) {
            return Err(Fido2Error::Decode("authnrData credId was wrong length".to_string()));
        }
        self.audit.journal("credId");
        self.audit.journal("credIdLen");
        Ok(())
    }

    pub(crate) fn validate_public_key(&mut self) -> Result<(), Fido2Error> {
        let attested = self.attested().ok_or_else(|| {
            Fido2Error::Input("authnrData credentialPublicKeyCose isn't of type ArrayBuffer".to_string())
        })?;
        let jwk = &attested.public_key_jwk;
        let kty = jwk.kty().ok_or_else(|| {
            Fido2Error::Input("authnrData credentialPublicKeyJwk.kty should be a string".to_string())
        })?;
        if jwk.alg().is_none() {
            return Err(Fido2Error::Input(
                "authnrData credentialPublicKeyJwk.alg should be a string".to_string(),
            ));
        }
        match kty {
            "EC" => {
                if jwk.crv().is_none() {
                    return Err(Fido2Error::Input(
                        "authnrData credentialPublicKeyJwk.crv should be a string".to_string(),
                    ));
                }
            }
            "RSA" => {
                if jwk.get("n").is_none() || jwk.get("e").is_none() {
                    return Err(Fido2Error::Input(
                        "authnrData credentialPublicKeyJwk.n and .e should be strings".to_string(),
                    ));
                }
            }
            other => {
                return Err(Fido2Error::UnsupportedKey(format!(
                    "authnrData unknown JWK key type: {other}"
                )));
            }
        }
        if !is_pem(&attested.public_key_pem) {
            return Err(Fido2Error::Decode(
                "authnrData credentialPublicKeyPem was malformatted".to_string(),
            ));
        }
        self.audit.journal("credentialPublicKeyCose");
        self.audit.journal("credentialPublicKeyJwk");
        self.audit.journal("credentialPublicKeyPem");
        Ok(())
    }

    pub(crate) fn validate_create_type(&mut self) -> Result<(), Fido2Error> {
        let type_ = self.client_data.type_str();
        if type_ != Some("webauthn.create") {
            return Err(Fido2Error::Policy(format!(
                "clientData type should be 'webauthn.create', got: {}",
                json_display(self.client_data.type_.as_ref())
            )));
        }
        self.audit.journal("type");
        Ok(())
    }

    pub(crate) fn validate_get_type(&mut self) -> Result<(), Fido2Error> {
        if self.client_data.type_str() != Some("webauthn.get") {
            return Err(Fido2Error::Policy(
                "clientData type should be 'webauthn.get'".to_string(),
            ));
        }
        self.audit.journal("type");
        Ok(())
    }

    /// Checks that every decoded field was journaled and that nothing else was.
    pub(crate) fn validate_audit(&mut self) -> Result<(), Fido2Error> {
        let mut expected: BTreeSet<String> = BTreeSet::new();
        let fields = ClientData::FIELD_NAMES
            .iter()
            .map(|name| name.to_string())
            .chain(self.authnr_data.field_names());
        for field in fields {
            if !self.audit.is_journaled(&field) {
                return Err(Fido2Error::Audit(format!(
                    "internal audit failed: {field} was not validated"
                )));
            }
            expected.insert(field);
        }

        if self.audit.journal.len() != expected.len() {
            return Err(Fido2Error::Audit(format!(
                "internal audit failed: {} fields checked; expected {}",
                self.audit.journal.len(),
                expected.len()
            )));
        }
        if !self.audit.valid_expectations {
            return Err(Fido2Error::Audit(
                "internal audit failed: expectations not validated".to_string(),
            ));
        }
        if !self.audit.valid_request {
            return Err(Fido2Error::Audit(
                "internal audit failed: request not validated".to_string(),
            ));
        }

        self.audit.complete = true;
        tracing::debug!("Audit complete: {} fields validated", expected.len());
        Ok(())
    }
}

impl VerificationContext<AttestationAuthnrData> {
    pub(crate) fn validate_transports(&mut self) -> Result<(), Fido2Error> {
        if let Some(transports) = &self.authnr_data.transports {
            if transports.iter().any(String::is_empty) {
                return Err(Fido2Error::Input(
                    "expected transports to be an Array of non-empty Strings".to_string(),
                ));
            }
        }
        self.audit.journal("transports");
        Ok(())
    }
}

impl VerificationContext<AssertionAuthnrData> {
    /// Verifies the assertion signature over `authData || SHA-256(clientDataJSON)`
    /// with the stored credential public key.
    pub(crate) fn validate_assertion_signature(&mut self) -> Result<(), Fido2Error> {
        let pem = self.expectations.public_key.as_deref().ok_or_else(|| {
            Fido2Error::Input("expected publicKey to be in PEM format".to_string())
        })?;
        let spki = pem_to_der(pem)?;

        let mut signed = self.authnr_data.data.raw.clone();
        signed.extend(sha256(&self.client_data.raw_client_data_json));

        if !verify_spki_signature_default(&spki, &signed, &self.authnr_data.sig)? {
            return Err(Fido2Error::Verification("signature validation failed".to_string()));
        }
        self.audit.journal("sig");
        Ok(())
    }

    pub(crate) fn validate_user_handle(&mut self) -> Result<(), Fido2Error> {
        if let Some(handle) = &self.authnr_data.user_handle {
            let encoded = base64url_encode(handle);
            match &self.expectations.user_handle {
                Some(Some(expected)) if *expected == encoded => {}
                _ => {
                    return Err(Fido2Error::Policy("unable to validate userHandle".to_string()));
                }
            }
        }
        self.audit.journal("userHandle");
        Ok(())
    }

    /// Rejects a counter that did not increase. Authenticators that always
    /// report zero do not support counters and are let through.
    pub(crate) fn validate_counter(&mut self) -> Result<(), Fido2Error> {
        let prev = self.expectations.prev_counter.ok_or_else(|| {
            Fido2Error::Input("expected counter to be positive integer".to_string())
        })?;
        let counter = i64::from(self.authnr_data.data.counter);
        let counter_supported = !(counter == 0 && prev == 0);

        if counter <= prev && counter_supported {
            tracing::warn!("Counter rollback: stored {}, received {}", prev, counter);
            return Err(Fido2Error::Policy("counter rollback detected".to_string()));
        }

        self.audit.journal("counter");
        self.audit
            .add_info("counter-supported", counter_supported.to_string());
        Ok(())
    }
}
