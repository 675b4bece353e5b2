use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use super::collection::TocEntry;
use crate::certificate::Certificate;
use crate::errors::Fido2Error;

/// Identifier of a metadata entry: an AAID (UAF), an AAGUID (FIDO2) or the
/// attestation certificate key identifiers (U2F).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MdsEntryId {
    Id(String),
    KeyIdentifiers(Vec<String>),
}

impl MdsEntryId {
    pub(crate) fn from_object(obj: &Map<String, Value>) -> Result<Self, Fido2Error> {
        if let Some(Value::String(aaid)) = obj.get("aaid") {
            return Ok(MdsEntryId::Id(aaid.clone()));
        }
        if let Some(Value::String(aaguid)) = obj.get("aaguid") {
            return Ok(MdsEntryId::Id(aaguid.clone()));
        }
        if let Some(Value::Array(ids)) = obj.get("attestationCertificateKeyIdentifiers") {
            return Ok(MdsEntryId::KeyIdentifiers(
                ids.iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect(),
            ));
        }
        Err(Fido2Error::Mds("MDS entry didn't have a valid ID".to_string()))
    }

    /// Single ids compare as strings; key identifier lists match when they
    /// hold the same identifiers in any order.
    pub fn matches(&self, other: &MdsEntryId) -> bool {
        match (self, other) {
            (MdsEntryId::Id(a), MdsEntryId::Id(b)) => a == b,
            (MdsEntryId::KeyIdentifiers(a), MdsEntryId::KeyIdentifiers(b)) => {
                a.len() == b.len() && a.iter().all(|id| b.contains(id))
            }
            _ => false,
        }
    }

    /// Lookup keys, with dashes removed.
    pub(crate) fn keys(&self) -> Vec<String> {
        let ids: Vec<&String> = match self {
            MdsEntryId::Id(id) => vec![id],
            MdsEntryId::KeyIdentifiers(ids) => ids.iter().collect(),
        };
        ids.into_iter().map(|id| id.replace('-', "")).collect()
    }
}

impl fmt::Display for MdsEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MdsEntryId::Id(id) => write!(f, "{id}"),
            MdsEntryId::KeyIdentifiers(ids) => write!(f, "{}", ids.join(",")),
        }
    }
}

/// One user verification method of an authenticator.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserVerificationDesc {
    /// "code", "biometric" or "pattern" when the statement carries accuracy details.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    pub user_verification: Vec<String>,
    /// Contents of `caDesc`, `baDesc` or `paDesc`.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// A validated metadata statement merged with its TOC entry.
///
/// Registry constants from the statement are converted to their names so an
/// MDS v2 statement (bit masks and numeric codes) and an MDS v3 statement
/// (string arrays) read the same.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MdsEntry {
    /// Name of the collection the entry came from.
    pub collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aaid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aaguid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation_certificate_key_identifiers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub protocol_family: String,
    pub attachment_hint: Vec<String>,
    pub attestation_types: Vec<String>,
    pub authentication_algorithm: String,
    pub public_key_alg_and_encoding: String,
    pub key_protection: Vec<String>,
    pub matcher_protection: Vec<String>,
    pub tc_display: Vec<String>,
    pub user_verification_details: Vec<Vec<UserVerificationDesc>>,
    pub attestation_root_certificates: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_second_factor_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_key_restricted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_fresh_user_verification_required: Option<bool>,
    pub status_reports: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_of_last_status_change: Option<String>,
    /// TOC entry fields overlaid with the statement, as received.
    #[serde(skip)]
    pub properties: Map<String, Value>,
}

impl MdsEntry {
    /// Builds the entry together with its parsed attestation root certificates.
    /// The caller decides when the roots become trusted.
    pub(crate) fn new(
        statement: &Map<String, Value>,
        toc_entry: &TocEntry,
        collection: &str,
    ) -> Result<(Self, Vec<Certificate>), Fido2Error> {
        let mut properties = toc_entry.to_map()?;
        properties.extend(statement.iter().map(|(k, v)| (k.clone(), v.clone())));
        properties.remove("metadataStatement");
        properties.remove("raw");

        let authentication_algorithm = match properties.get("authenticationAlgorithms") {
            Some(Value::Array(algs)) if !algs.is_empty() => algorithm_name(&algs[0])?,
            _ => algorithm_name(properties.get("authenticationAlgorithm").unwrap_or(&Value::Null))?,
        };

        let public_key_alg_and_encoding = match properties.get("publicKeyAlgAndEncodings") {
            Some(Value::Array(encodings)) if !encodings.is_empty() => format!(
                "ALG_KEY_{}",
                encodings[0].as_str().unwrap_or_default().to_uppercase()
            ),
            _ => key_encoding_name(properties.get("publicKeyAlgAndEncoding").unwrap_or(&Value::Null))?,
        };

        let attestation_root_certificates: Vec<String> = properties
            .get("attestationRootCertificates")
            .and_then(Value::as_array)
            .map(|certs| {
                certs
                    .iter()
                    .filter_map(|c| c.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let roots = attestation_root_certificates
            .iter()
            .map(|pem| {
                let cert = Certificate::parse(pem)?;
                if cert.registry_key().is_none() {
                    return Err(Fido2Error::CertParse(
                        "certificate subject has no attributes".to_string(),
                    ));
                }
                Ok(cert)
            })
            .collect::<Result<Vec<_>, Fido2Error>>()?;

        let entry = MdsEntry {
            collection: collection.to_string(),
            aaid: string_prop(&properties, "aaid"),
            aaguid: string_prop(&properties, "aaguid"),
            attestation_certificate_key_identifiers: properties
                .get("attestationCertificateKeyIdentifiers")
                .and_then(Value::as_array)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| id.as_str().map(str::to_string))
                        .collect()
                }),
            description: string_prop(&properties, "description"),
            protocol_family: string_prop(&properties, "protocolFamily")
                .unwrap_or_else(|| "uaf".to_string()),
            attachment_hint: flags_or_names(
                properties.get("attachmentHint"),
                ATTACHMENT_HINTS,
                0xFF00,
                "unknown attachment hint flags",
            )?,
            attestation_types: attestation_types(properties.get("attestationTypes"))?,
            authentication_algorithm,
            public_key_alg_and_encoding,
            key_protection: flags_or_names(
                properties.get("keyProtection"),
                KEY_PROTECTION,
                0xFFE0,
                "unknown key protection flags",
            )?,
            matcher_protection: flags_or_names(
                properties.get("matcherProtection"),
                MATCHER_PROTECTION,
                0xFFF8,
                "unknown matcher protection flags",
            )?,
            tc_display: flags_or_names(
                properties.get("tcDisplay"),
                TC_DISPLAY,
                0xFFE0,
                "unknown transaction confirmation display flags",
            )?,
            user_verification_details: user_verification_details(
                properties.get("userVerificationDetails"),
            )?,
            attestation_root_certificates,
            is_second_factor_only: real_boolean(&properties, "isSecondFactorOnly"),
            is_key_restricted: real_boolean(&properties, "isKeyRestricted"),
            is_fresh_user_verification_required: real_boolean(
                &properties,
                "isFreshUserVerificationRequired",
            ),
            status_reports: toc_entry.status_reports.clone(),
            time_of_last_status_change: toc_entry.time_of_last_status_change.clone(),
            properties,
        };
        Ok((entry, roots))
    }
}

const ATTACHMENT_HINTS: &[(u64, &str)] = &[
    (0x0001, "internal"),
    (0x0002, "external"),
    (0x0004, "wired"),
    (0x0008, "wireless"),
    (0x0010, "nfc"),
    (0x0020, "bluetooth"),
    (0x0040, "network"),
    (0x0080, "ready"),
];

const KEY_PROTECTION: &[(u64, &str)] = &[
    (0x0001, "software"),
    (0x0002, "hardware"),
    (0x0004, "tee"),
    (0x0008, "secure-element"),
    (0x0010, "remote-handle"),
];

const MATCHER_PROTECTION: &[(u64, &str)] = &[
    (0x0001, "software"),
    (0x0002, "hardware"),
    (0x0004, "tee"),
];

const TC_DISPLAY: &[(u64, &str)] = &[
    (0x0001, "any"),
    (0x0002, "priviledged-software"),
    (0x0004, "tee"),
    (0x0008, "hardware"),
    (0x0010, "remote"),
];

const USER_VERIFICATION: &[(u64, &str)] = &[
    (0x0001, "presence"),
    (0x0002, "fingerprint"),
    (0x0004, "passcode"),
    (0x0008, "voiceprint"),
    (0x0010, "faceprint"),
    (0x0020, "location"),
    (0x0040, "eyeprint"),
    (0x0080, "pattern"),
    (0x0100, "handprint"),
    (0x0200, "none"),
    (0x0400, "all"),
];

fn string_prop(props: &Map<String, Value>, name: &str) -> Option<String> {
    props.get(name).and_then(Value::as_str).map(str::to_string)
}

/// Accepts `true`/`false` and their string spellings.
fn real_boolean(props: &Map<String, Value>, name: &str) -> Option<bool> {
    match props.get(name)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

fn bits_to_names(bits: u64, table: &[(u64, &str)]) -> Vec<String> {
    table
        .iter()
        .filter(|(bit, _)| bits & bit != 0)
        .map(|(_, name)| name.to_string())
        .collect()
}

/// A string array is taken as is; a number is decoded as a bit mask.
fn flags_or_names(
    value: Option<&Value>,
    table: &[(u64, &str)],
    unknown_mask: u64,
    error: &str,
) -> Result<Vec<String>, Fido2Error> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(names)) => Ok(names
            .iter()
            .filter_map(|n| n.as_str().map(str::to_string))
            .collect()),
        Some(Value::Number(n)) => {
            let bits = n
                .as_u64()
                .ok_or_else(|| Fido2Error::Mds(format!("{error}: {n}")))?;
            if bits & unknown_mask != 0 {
                return Err(Fido2Error::Mds(format!("{error}: {}", bits & unknown_mask)));
            }
            Ok(bits_to_names(bits, table))
        }
        Some(other) => Err(Fido2Error::Mds(format!("{error}: {other}"))),
    }
}

fn attestation_types(value: Option<&Value>) -> Result<Vec<String>, Fido2Error> {
    let Some(Value::Array(types)) = value else {
        return Err(Fido2Error::Mds(format!(
            "expected attestationTypes to be Array, got: {}",
            value.unwrap_or(&Value::Null)
        )));
    };
    types
        .iter()
        .map(|t| match t {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => match n.as_u64() {
                Some(0x3E07) => Ok("basic-full".to_string()),
                Some(0x3E08) => Ok("basic-surrogate".to_string()),
                Some(0x3E09) => Ok("ecdaa".to_string()),
                _ => Err(Fido2Error::Mds(format!("unknown attestation type: {n}"))),
            },
            other => Err(Fido2Error::Mds(format!("unknown attestation type: {other}"))),
        })
        .collect()
}

fn algorithm_name(value: &Value) -> Result<String, Fido2Error> {
    if let Value::String(s) = value {
        return Ok(s.clone());
    }
    let name = match value.as_u64() {
        Some(0x0001) => "ALG_SIGN_SECP256R1_ECDSA_SHA256_RAW",
        Some(0x0002) => "ALG_SIGN_SECP256R1_ECDSA_SHA256_DER",
        Some(0x0003) => "ALG_SIGN_RSASSA_PSS_SHA256_RAW",
        Some(0x0004) => "ALG_SIGN_RSASSA_PSS_SHA256_DER",
        Some(0x0005) => "ALG_SIGN_SECP256K1_ECDSA_SHA256_RAW",
        Some(0x0006) => "ALG_SIGN_SECP256K1_ECDSA_SHA256_DER",
        Some(0x0007) => "ALG_SIGN_SM2_SM3_RAW",
        Some(0x0008) => "ALG_SIGN_RSA_EMSA_PKCS1_SHA256_RAW",
        Some(0x0009) => "ALG_SIGN_RSA_EMSA_PKCS1_SHA256_DER",
        _ => {
            return Err(Fido2Error::Mds(format!(
                "unknown authentication algorithm: {value}"
            )));
        }
    };
    Ok(name.to_string())
}

fn key_encoding_name(value: &Value) -> Result<String, Fido2Error> {
    if let Value::String(s) = value {
        return Ok(s.clone());
    }
    let name = match value.as_u64() {
        Some(0x0100) => "ALG_KEY_ECC_X962_RAW",
        Some(0x0101) => "ALG_KEY_ECC_X962_DER",
        Some(0x0102) => "ALG_KEY_RSA_2048_RAW",
        Some(0x0103) => "ALG_KEY_RSA_2048_DER",
        Some(0x0104) => "ALG_KEY_COSE",
        _ => {
            return Err(Fido2Error::Mds(format!(
                "unknown public key algorithm and encoding: {value}"
            )));
        }
    };
    Ok(name.to_string())
}

fn user_verification_details(
    value: Option<&Value>,
) -> Result<Vec<Vec<UserVerificationDesc>>, Fido2Error> {
    let Some(Value::Array(combinations)) = value else {
        return Err(Fido2Error::Mds(format!(
            "expected userVerificationDetails to be an Array, got: {}",
            value.unwrap_or(&Value::Null)
        )));
    };

    combinations
        .iter()
        .map(|combination| {
            let Value::Array(descs) = combination else {
                return Err(Fido2Error::Mds(format!(
                    "expected userVerification to be Array, got {combination}"
                )));
            };
            descs.iter().map(user_verification_desc).collect()
        })
        .collect()
}

fn user_verification_desc(desc: &Value) -> Result<UserVerificationDesc, Fido2Error> {
    let empty = Map::new();
    let desc = desc.as_object().unwrap_or(&empty);

    let mut type_ = None;
    let mut details = Map::new();
    for (key, name) in [("caDesc", "code"), ("baDesc", "biometric"), ("paDesc", "pattern")] {
        if let Some(d) = desc.get(key) {
            type_ = Some(name.to_string());
            if let Some(d) = d.as_object() {
                details = d.clone();
            }
        }
    }

    // v3 statements name the method, e.g. "fingerprint_internal"
    let user_verification = match desc.get("userVerificationMethod").and_then(Value::as_str) {
        Some(method) => vec![
            method
                .strip_suffix("_internal")
                .filter(|m| !m.is_empty() && m.chars().all(|c| c.is_alphanumeric() || c == '_'))
                .unwrap_or("none")
                .to_string(),
        ],
        None => bits_to_names(
            desc.get("userVerification")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            USER_VERIFICATION,
        ),
    };

    Ok(UserVerificationDesc {
        type_,
        user_verification,
        details,
    })
}
