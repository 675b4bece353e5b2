use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::config::{AuthenticatorAttachment, Fido2Config, UserVerification};
use crate::crypto::sha256;
use crate::errors::Fido2Error;
use crate::extensions::{ExtensionKind, ExtensionRegistry};
use crate::utils::{base64url_encode, gen_random_bytes};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RelyingParty {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub type_: String,
    pub alg: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_resident_key: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<UserVerification>,
}

/// Options for `navigator.credentials.create()`.
///
/// `user` is left empty for the caller to fill in. Challenges are base64url
/// without padding; when extra data was mixed in, `challenge` is
/// SHA-256(`rawChallenge` || extra data) and `rawChallenge` is the random
/// value it was derived from.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AttestationOptions {
    pub rp: RelyingParty,
    pub user: serde_json::Map<String, Value>,
    pub challenge: String,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    pub timeout: u32,
    pub attestation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticator_selection: Option<AuthenticatorSelection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_challenge: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, Value>,
}

/// Options for `navigator.credentials.get()`.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AssertionOptions {
    pub challenge: String,
    pub timeout: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rp_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<UserVerification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_challenge: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, Value>,
}

/// Per-call inputs to options generation.
#[derive(Debug, Clone, Default)]
pub struct OptionsRequest {
    /// Mixed into the challenge so it can later be recomputed from the raw challenge.
    pub extra_data: Option<Vec<u8>>,
    /// Replaces the enabled extensions for this call.
    pub extension_options: Option<BTreeMap<String, Value>>,
}

/// Returns `(challenge, rawChallenge)`.
fn generate_challenge(
    size: usize,
    extra_data: Option<&[u8]>,
) -> Result<(String, Option<String>), Fido2Error> {
    let raw = gen_random_bytes(size)?;
    match extra_data {
        Some(extra) => {
            let mut data = raw.clone();
            data.extend_from_slice(extra);
            Ok((base64url_encode(&sha256(&data)), Some(base64url_encode(&raw))))
        }
        None => Ok((base64url_encode(&raw), None)),
    }
}

pub(crate) fn attestation_options(
    config: &Fido2Config,
    extensions: &ExtensionRegistry,
    request: &OptionsRequest,
) -> Result<AttestationOptions, Fido2Error> {
    let (challenge, raw_challenge) =
        generate_challenge(config.challenge_size, request.extra_data.as_deref())?;

    let authenticator_selection = if config.authenticator_attachment.is_some()
        || config.authenticator_require_resident_key.is_some()
        || config.authenticator_user_verification.is_some()
    {
        Some(AuthenticatorSelection {
            authenticator_attachment: config.authenticator_attachment,
            require_resident_key: config.authenticator_require_resident_key,
            user_verification: config.authenticator_user_verification,
        })
    } else {
        None
    };

    Ok(AttestationOptions {
        rp: RelyingParty {
            name: config.rp_name.clone(),
            id: config.rp_id.clone(),
            icon: config.rp_icon.clone(),
        },
        user: serde_json::Map::new(),
        challenge,
        pub_key_cred_params: config
            .crypto_params
            .iter()
            .map(|alg| PubKeyCredParam {
                type_: "public-key".to_string(),
                alg: *alg,
            })
            .collect(),
        timeout: config.timeout,
        attestation: config.attestation.as_str().to_string(),
        authenticator_selection,
        raw_challenge,
        extensions: extensions.create_extensions(
            ExtensionKind::Attestation,
            request.extension_options.as_ref(),
        )?,
    })
}

pub(crate) fn assertion_options(
    config: &Fido2Config,
    extensions: &ExtensionRegistry,
    request: &OptionsRequest,
) -> Result<AssertionOptions, Fido2Error> {
    let (challenge, raw_challenge) =
        generate_challenge(config.challenge_size, request.extra_data.as_deref())?;

    Ok(AssertionOptions {
        challenge,
        timeout: config.timeout,
        rp_id: config.rp_id.clone(),
        user_verification: config.authenticator_user_verification,
        raw_challenge,
        extensions: extensions.create_extensions(
            ExtensionKind::Assertion,
            request.extension_options.as_ref(),
        )?,
    })
}
