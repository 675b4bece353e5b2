use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use crate::codec::cbor;
use crate::codec::{Jwk, cose_to_jwk};
use crate::errors::Fido2Error;

const RP_ID_HASH_LEN: usize = 32;
const FIXED_LEN: usize = RP_ID_HASH_LEN + 1 + 4;
const AAGUID_LEN: usize = 16;

pub(crate) const FLAG_UP: &str = "UP";
pub(crate) const FLAG_UV: &str = "UV";
pub(crate) const FLAG_AT: &str = "AT";
pub(crate) const FLAG_ED: &str = "ED";

const FLAG_BITS: [(u8, &str); 8] = [
    (0x01, FLAG_UP),
    (0x02, "RFU1"),
    (0x04, FLAG_UV),
    (0x08, "RFU3"),
    (0x10, "RFU4"),
    (0x20, "RFU5"),
    (0x40, FLAG_AT),
    (0x80, FLAG_ED),
];

/// Credential data present when the AT flag is set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestedCredential {
    pub aaguid: Vec<u8>,
    pub cred_id_len: u16,
    pub cred_id: Vec<u8>,
    #[serde(rename = "credentialPublicKeyCose")]
    pub public_key_cose: Vec<u8>,
    #[serde(rename = "credentialPublicKeyJwk")]
    pub public_key_jwk: Jwk,
    #[serde(rename = "credentialPublicKeyPem")]
    pub public_key_pem: String,
}

/// Decoded authenticator data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorData {
    pub rp_id_hash: Vec<u8>,
    pub flags: BTreeSet<&'static str>,
    pub counter: u32,
    #[serde(flatten)]
    pub attested: Option<AttestedCredential>,
    #[serde(skip)]
    pub raw: Vec<u8>,
}

fn decode_flags(bits: u8) -> BTreeSet<&'static str> {
    FLAG_BITS
        .iter()
        .filter(|(mask, _)| bits & mask != 0)
        .map(|(_, name)| *name)
        .collect()
}

impl AuthenticatorData {
    /// Parses `rpIdHash || flags || signCount [|| attestedCredentialData]`.
    ///
    /// The credential public key is the last CBOR item and must end the
    /// buffer. Extension data (ED flag) is rejected.
    pub fn parse(raw: &[u8]) -> Result<Self, Fido2Error> {
        if raw.len() < FIXED_LEN {
            return Err(Fido2Error::Truncated(format!(
                "authenticator data must be at least {FIXED_LEN} bytes, got {}",
                raw.len()
            )));
        }

        let rp_id_hash = raw[..RP_ID_HASH_LEN].to_vec();
        let flags = decode_flags(raw[RP_ID_HASH_LEN]);
        let counter = u32::from_be_bytes([raw[33], raw[34], raw[35], raw[36]]);
        let mut rest = &raw[FIXED_LEN..];

        let attested = if flags.contains(FLAG_AT) {
            Some(parse_attested_credential(&mut rest)?)
        } else {
            None
        };

        if flags.contains(FLAG_ED) {
            return Err(Fido2Error::NotImplemented(
                "authenticator extensions not supported".to_string(),
            ));
        }

        if !rest.is_empty() {
            return Err(Fido2Error::Decode(format!(
                "{} bytes left over after authenticator data",
                rest.len()
            )));
        }

        Ok(Self {
            rp_id_hash,
            flags,
            counter,
            attested,
            raw: raw.to_vec(),
        })
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    /// AAGUID in its hyphenated form.
    pub fn aaguid_string(&self) -> Option<String> {
        let attested = self.attested.as_ref()?;
        Uuid::from_slice(&attested.aaguid)
            .ok()
            .map(|u| u.hyphenated().to_string())
    }

    /// Names of the decoded fields that the audit expects to see validated.
    pub(crate) fn field_names(&self) -> Vec<&'static str> {
        let mut names = vec!["rpIdHash", "flags", "counter"];
        if self.attested.is_some() {
            names.extend([
                "aaguid",
                "credIdLen",
                "credId",
                "credentialPublicKeyCose",
                "credentialPublicKeyJwk",
                "credentialPublicKeyPem",
            ]);
        }
        names
    }
}

fn parse_attested_credential(rest: &mut &[u8]) -> Result<AttestedCredential, Fido2Error> {
    let buf = *rest;
    if buf.len() < AAGUID_LEN + 2 {
        return Err(Fido2Error::Truncated(
            "attested credential data ended before the credential id length".to_string(),
        ));
    }
    let aaguid = buf[..AAGUID_LEN].to_vec();
    let cred_id_len = u16::from_be_bytes([buf[AAGUID_LEN], buf[AAGUID_LEN + 1]]);
    let id_start = AAGUID_LEN + 2;
    let id_end = id_start + cred_id_len as usize;
    if buf.len() < id_end {
        return Err(Fido2Error::Truncated(format!(
            "credential id of {cred_id_len} bytes exceeds authenticator data"
        )));
    }
    let cred_id = buf[id_start..id_end].to_vec();

    let mut key_bytes = &buf[id_end..];
    if key_bytes.is_empty() {
        return Err(Fido2Error::Truncated(
            "authenticator data ended before the credential public key".to_string(),
        ));
    }
    let before = key_bytes.len();
    let cose = cbor::decode_first(&mut key_bytes)?;
    let public_key_cose = buf[id_end..id_end + (before - key_bytes.len())].to_vec();
    *rest = key_bytes;

    let public_key_jwk = cose_to_jwk(&cose)?;
    let public_key_pem = public_key_jwk.to_pem()?;

    tracing::debug!(
        "Attested credential: id {} bytes, key type {:?}",
        cred_id.len(),
        public_key_jwk.kty()
    );

    Ok(AttestedCredential {
        aaguid,
        cred_id_len,
        cred_id,
        public_key_cose,
        public_key_jwk,
        public_key_pem,
    })
}
