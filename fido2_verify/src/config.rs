use std::{env, sync::LazyLock};

use serde::{Deserialize, Serialize};

use crate::errors::Fido2Error;

const DEFAULT_TIMEOUT: u32 = 60000;
const DEFAULT_RP_NAME: &str = "Anonymous Service";
const DEFAULT_CHALLENGE_SIZE: usize = 64;
const MIN_CHALLENGE_SIZE: usize = 32;
const DEFAULT_CRYPTO_PARAMS: [i64; 2] = [-7, -257];

/// Attestation conveyance preference sent in registration options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationConveyance {
    #[default]
    Direct,
    Indirect,
    None,
}

impl AttestationConveyance {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttestationConveyance::Direct => "direct",
            AttestationConveyance::Indirect => "indirect",
            AttestationConveyance::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorAttachment {
    Platform,
    CrossPlatform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerification {
    Required,
    Preferred,
    Discouraged,
}

/// Relying party settings used to generate options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fido2Config {
    /// Milliseconds the client is given to complete the ceremony.
    pub timeout: u32,
    pub rp_id: Option<String>,
    pub rp_name: String,
    pub rp_icon: Option<String>,
    /// Challenge length in bytes.
    pub challenge_size: usize,
    pub attestation: AttestationConveyance,
    /// COSE algorithm identifiers offered in `pubKeyCredParams`, most preferred first.
    pub crypto_params: Vec<i64>,
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
    pub authenticator_require_resident_key: Option<bool>,
    pub authenticator_user_verification: Option<UserVerification>,
}

impl Default for Fido2Config {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            rp_id: None,
            rp_name: DEFAULT_RP_NAME.to_string(),
            rp_icon: None,
            challenge_size: DEFAULT_CHALLENGE_SIZE,
            attestation: AttestationConveyance::default(),
            crypto_params: DEFAULT_CRYPTO_PARAMS.to_vec(),
            authenticator_attachment: None,
            authenticator_require_resident_key: None,
            authenticator_user_verification: None,
        }
    }
}

impl Fido2Config {
    /// Settings from the `FIDO2_*` environment variables. Invalid values are
    /// logged and replaced by their defaults.
    pub fn from_env() -> Self {
        Self {
            timeout: *FIDO2_TIMEOUT,
            rp_id: FIDO2_RP_ID.clone(),
            rp_name: FIDO2_RP_NAME.clone(),
            rp_icon: FIDO2_RP_ICON.clone(),
            challenge_size: *FIDO2_CHALLENGE_SIZE,
            attestation: *FIDO2_ATTESTATION,
            crypto_params: FIDO2_CRYPTO_PARAMS.clone(),
            authenticator_attachment: *FIDO2_AUTHENTICATOR_ATTACHMENT,
            authenticator_require_resident_key: *FIDO2_REQUIRE_RESIDENT_KEY,
            authenticator_user_verification: *FIDO2_USER_VERIFICATION,
        }
    }

    pub fn validate(&self) -> Result<(), Fido2Error> {
        if self.challenge_size < MIN_CHALLENGE_SIZE {
            return Err(Fido2Error::Config(
                "challenge size too small, must be 32 or greater".to_string(),
            ));
        }
        if self.crypto_params.is_empty() {
            return Err(Fido2Error::Config(
                "cryptoParams must have at least one element".to_string(),
            ));
        }
        if self.rp_name.is_empty() {
            return Err(Fido2Error::Config("rpName must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_timeout(value: Option<String>) -> u32 {
    match value {
        None => DEFAULT_TIMEOUT,
        Some(v) => v.parse::<u32>().unwrap_or_else(|_| {
            tracing::warn!("Invalid timeout: {}. Using default {}", v, DEFAULT_TIMEOUT);
            DEFAULT_TIMEOUT
        }),
    }
}

fn parse_challenge_size(value: Option<String>) -> usize {
    match value {
        None => DEFAULT_CHALLENGE_SIZE,
        Some(v) => match v.parse::<usize>() {
            Ok(size) if size >= MIN_CHALLENGE_SIZE => size,
            _ => {
                tracing::warn!(
                    "Invalid challenge size: {}. Using default {}",
                    v,
                    DEFAULT_CHALLENGE_SIZE
                );
                DEFAULT_CHALLENGE_SIZE
            }
        },
    }
}

fn parse_attestation(value: Option<String>) -> AttestationConveyance {
    match value {
        None => AttestationConveyance::Direct,
        Some(v) => match v.to_lowercase().as_str() {
            "direct" => AttestationConveyance::Direct,
            "indirect" => AttestationConveyance::Indirect,
            "none" => AttestationConveyance::None,
            invalid => {
                tracing::warn!("Invalid attestation: {}. Using default 'direct'", invalid);
                AttestationConveyance::Direct
            }
        },
    }
}

fn parse_crypto_params(value: Option<String>) -> Vec<i64> {
    let Some(v) = value else {
        return DEFAULT_CRYPTO_PARAMS.to_vec();
    };
    let params = v
        .split(',')
        .map(|p| p.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>();
    match params {
        Ok(params) if !params.is_empty() => params,
        _ => {
            tracing::warn!("Invalid crypto params: {}. Using default '-7,-257'", v);
            DEFAULT_CRYPTO_PARAMS.to_vec()
        }
    }
}

fn parse_authenticator_attachment(value: Option<String>) -> Option<AuthenticatorAttachment> {
    let v = value?;
    match v.to_lowercase().as_str() {
        "platform" => Some(AuthenticatorAttachment::Platform),
        "cross-platform" => Some(AuthenticatorAttachment::CrossPlatform),
        invalid => {
            tracing::warn!(
                "Invalid authenticator attachment: {}. Leaving it unset",
                invalid
            );
            None
        }
    }
}

fn parse_require_resident_key(value: Option<String>) -> Option<bool> {
    let v = value?;
    match v.to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        invalid => {
            tracing::warn!("Invalid require_resident_key: {}. Leaving it unset", invalid);
            None
        }
    }
}

fn parse_user_verification(value: Option<String>) -> Option<UserVerification> {
    let v = value?;
    match v.to_lowercase().as_str() {
        "required" => Some(UserVerification::Required),
        "preferred" => Some(UserVerification::Preferred),
        "discouraged" => Some(UserVerification::Discouraged),
        invalid => {
            tracing::warn!("Invalid user verification: {}. Leaving it unset", invalid);
            None
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

pub(crate) static FIDO2_TIMEOUT: LazyLock<u32> =
    LazyLock::new(|| parse_timeout(non_empty_var("FIDO2_TIMEOUT")));

pub(crate) static FIDO2_RP_ID: LazyLock<Option<String>> =
    LazyLock::new(|| non_empty_var("FIDO2_RP_ID"));

pub(crate) static FIDO2_RP_NAME: LazyLock<String> = LazyLock::new(|| {
    non_empty_var("FIDO2_RP_NAME").unwrap_or_else(|| DEFAULT_RP_NAME.to_string())
});

pub(crate) static FIDO2_RP_ICON: LazyLock<Option<String>> =
    LazyLock::new(|| non_empty_var("FIDO2_RP_ICON"));

pub(crate) static FIDO2_CHALLENGE_SIZE: LazyLock<usize> =
    LazyLock::new(|| parse_challenge_size(non_empty_var("FIDO2_CHALLENGE_SIZE")));

pub(crate) static FIDO2_ATTESTATION: LazyLock<AttestationConveyance> =
    LazyLock::new(|| parse_attestation(non_empty_var("FIDO2_ATTESTATION")));

pub(crate) static FIDO2_CRYPTO_PARAMS: LazyLock<Vec<i64>> =
    LazyLock::new(|| parse_crypto_params(non_empty_var("FIDO2_CRYPTO_PARAMS")));

pub(crate) static FIDO2_AUTHENTICATOR_ATTACHMENT: LazyLock<Option<AuthenticatorAttachment>> =
    LazyLock::new(|| parse_authenticator_attachment(non_empty_var("FIDO2_AUTHENTICATOR_ATTACHMENT")));

pub(crate) static FIDO2_REQUIRE_RESIDENT_KEY: LazyLock<Option<bool>> =
    LazyLock::new(|| parse_require_resident_key(non_empty_var("FIDO2_REQUIRE_RESIDENT_KEY")));

pub(crate) static FIDO2_USER_VERIFICATION: LazyLock<Option<UserVerification>> =
    LazyLock::new(|| parse_user_verification(non_empty_var("FIDO2_USER_VERIFICATION")));
