use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::Fido2Error;
use crate::origin::{check_origin, check_rp_id};
use crate::parser::BinaryInput;
use crate::utils::{base64url_encode, is_base64url, is_pem};

const KNOWN_FLAGS: [&str; 5] = ["UP", "UV", "UP-or-UV", "AT", "ED"];
const KNOWN_TRANSPORTS: [&str; 4] = ["usb", "nfc", "ble", "internal"];

pub(crate) const ATTESTATION_REQUIRED: [&str; 3] = ["origin", "challenge", "flags"];
pub(crate) const ATTESTATION_OPTIONAL: [&str; 1] = ["rpId"];
pub(crate) const ASSERTION_REQUIRED: [&str; 6] = [
    "origin",
    "challenge",
    "flags",
    "prevCounter",
    "publicKey",
    "userHandle",
];
pub(crate) const ASSERTION_OPTIONAL: [&str; 2] = ["rpId", "allowCredentials"];

/// Distinguishes a member that is present with `null` from one that is missing.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// An entry of `allowCredentials` as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowCredentialInput {
    pub id: Option<BinaryInput>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub transports: Option<Vec<String>>,
}

/// What the relying party expects of a response, as supplied by the caller.
///
/// `userHandle` and `allowCredentials` may be given as `null`, which counts as
/// supplied; leaving them out does not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectationsInput {
    pub origin: Option<String>,
    pub rp_id: Option<String>,
    pub challenge: Option<BinaryInput>,
    pub flags: Option<Vec<String>>,
    pub prev_counter: Option<i64>,
    pub public_key: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some", skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<Option<BinaryInput>>,
    #[serde(default, deserialize_with = "deserialize_some", skip_serializing_if = "Option::is_none")]
    pub allow_credentials: Option<Option<Vec<AllowCredentialInput>>>,
}

/// `allowCredentials` entry with its id decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowCredential {
    pub id: Vec<u8>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub transports: Option<Vec<String>>,
}

/// Normalised expectations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectations {
    pub origin: Option<String>,
    pub rp_id: Option<String>,
    /// Unpadded base64url.
    pub challenge: Option<String>,
    pub flags: Option<BTreeSet<String>>,
    pub prev_counter: Option<i64>,
    pub public_key: Option<String>,
    /// `Some(None)` when the caller expects no user handle.
    pub user_handle: Option<Option<String>>,
    pub allow_credentials: Option<Option<Vec<AllowCredential>>>,
}

fn canonical_base64url(input: &BinaryInput) -> String {
    match input {
        BinaryInput::Bytes(b) => base64url_encode(b),
        BinaryInput::Text(s) => s
            .trim_end_matches('=')
            .chars()
            .map(|c| match c {
                '+' => '-',
                '/' => '_',
                c => c,
            })
            .collect(),
    }
}

impl Expectations {
    /// Normalises caller input: checks and canonicalises origin and rpId,
    /// encodes the challenge as base64url and decodes credential ids.
    pub fn parse(input: &ExpectationsInput) -> Result<Self, Fido2Error> {
        let origin = match input.origin.as_deref() {
            Some(o) if !o.is_empty() => Some(check_origin(o)?),
            _ => None,
        };
        let rp_id = match input.rp_id.as_deref() {
            Some(r) if !r.is_empty() => Some(check_rp_id(r)?),
            _ => None,
        };
        let challenge = input
            .challenge
            .as_ref()
            .map(canonical_base64url)
            .filter(|c| !c.is_empty());
        let flags = input
            .flags
            .as_ref()
            .map(|flags| flags.iter().cloned().collect::<BTreeSet<_>>());
        let public_key = input.public_key.clone().filter(|k| !k.is_empty());

        let user_handle = input.user_handle.as_ref().map(|handle| match handle {
            None => None,
            Some(BinaryInput::Text(s)) if s.is_empty() => Some(String::new()),
            Some(h) => Some(h.to_base64url()),
        });

        let allow_credentials = match &input.allow_credentials {
            None => None,
            Some(None) => Some(None),
            Some(Some(list)) => Some(Some(
                list.iter()
                    .enumerate()
                    .map(|(i, cred)| {
                        let id = cred
                            .id
                            .as_ref()
                            .ok_or_else(|| {
                                Fido2Error::Input(format!(
                                    "expected id of allowCredentials[{i}] to be ArrayBuffer"
                                ))
                            })?
                            .to_bytes(&format!("allowCredentials[{i}].id"))?;
                        Ok(AllowCredential {
                            id,
                            type_: cred.type_.clone(),
                            transports: cred.transports.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, Fido2Error>>()?,
            )),
        };

        Ok(Self {
            origin,
            rp_id,
            challenge,
            flags,
            prev_counter: input.prev_counter,
            public_key,
            user_handle,
            allow_credentials,
        })
    }

    /// Names of the expectations that were supplied.
    pub(crate) fn present_fields(&self) -> BTreeSet<&'static str> {
        let present = [
            ("origin", self.origin.is_some()),
            ("rpId", self.rp_id.is_some()),
            ("challenge", self.challenge.is_some()),
            ("flags", self.flags.is_some()),
            ("prevCounter", self.prev_counter.is_some()),
            ("publicKey", self.public_key.is_some()),
            ("userHandle", self.user_handle.is_some()),
            ("allowCredentials", self.allow_credentials.is_some()),
        ];
        present
            .into_iter()
            .filter(|(_, set)| *set)
            .map(|(name, _)| name)
            .collect()
    }

    /// Checks that exactly the required expectations (plus any of the
    /// optional ones) are supplied and that each is well formed.
    pub(crate) fn validate(&self, required: &[&str], optional: &[&str]) -> Result<(), Fido2Error> {
        let present = self.present_fields();

        for field in required {
            if !present.contains(field) {
                return Err(Fido2Error::Input(format!(
                    "expectation did not contain value for '{field}'"
                )));
            }
        }

        let optional_count = optional.iter().filter(|f| present.contains(*f)).count();
        if present.len() != required.len() + optional_count {
            return Err(Fido2Error::Input(format!(
                "wrong number of expectations: should have {} but got {}",
                required.len(),
                present.len() - optional_count
            )));
        }

        if let Some(origin) = &self.origin {
            if check_origin(origin)? != *origin {
                return Err(Fido2Error::Input("origin was malformatted".to_string()));
            }
        }

        if let Some(rp_id) = &self.rp_id {
            check_rp_id(rp_id)?;
        }

        if let Some(challenge) = &self.challenge {
            if !is_base64url(challenge) {
                return Err(Fido2Error::Input(
                    "expected challenge should be properly encoded base64url String".to_string(),
                ));
            }
        }

        if let Some(flags) = &self.flags {
            if let Some(unknown) = flags.iter().find(|f| !KNOWN_FLAGS.contains(&f.as_str())) {
                return Err(Fido2Error::Input(format!("expected flag unknown: {unknown}")));
            }
        }

        if let Some(counter) = self.prev_counter {
            if counter < 0 || counter > i64::from(u32::MAX) {
                return Err(Fido2Error::Input(
                    "expected counter to be positive integer".to_string(),
                ));
            }
        }

        if let Some(public_key) = &self.public_key {
            if !is_pem(public_key) {
                return Err(Fido2Error::Input(
                    "expected publicKey to be in PEM format".to_string(),
                ));
            }
        }

        if let Some(Some(creds)) = &self.allow_credentials {
            for (i, cred) in creds.iter().enumerate() {
                if cred.type_.as_deref() != Some("public-key") {
                    return Err(Fido2Error::Input(format!(
                        "expected type of allowCredentials[{i}] to be string with value 'public-key'"
                    )));
                }
                if let Some(transports) = &cred.transports {
                    if transports
                        .iter()
                        .any(|t| !KNOWN_TRANSPORTS.contains(&t.as_str()))
                    {
                        return Err(Fido2Error::Input(format!(
                            "expected transports of allowCredentials[{i}] to be string with value 'usb', 'nfc', 'ble', 'internal' or null"
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
