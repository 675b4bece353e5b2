//! TPM 2.0 attestation structures (TPMS_ATTEST and TPMT_PUBLIC).
//!
//! All integers are big-endian; `TPM2B_*` values carry a u16 size prefix.

use serde::Serialize;

use crate::crypto::HashAlg;
use crate::errors::Fido2Error;
use crate::utils::to_hex;

pub(crate) const TPM_GENERATED_VALUE: u32 = 0xff54_4347;
pub(crate) const TPM_ST_ATTEST_CERTIFY: &str = "TPM_ST_ATTEST_CERTIFY";
pub(crate) const TPM_ALG_RSA: &str = "TPM_ALG_RSA";

const RSA_DEFAULT_EXPONENT: u32 = 65537;

pub(crate) fn decode_structure_tag(tag: u16) -> Result<&'static str, Fido2Error> {
    let name = match tag {
        0x00C4 => "TPM_ST_RSP_COMMAND",
        0x8000 => "TPM_ST_NULL",
        0x8001 => "TPM_ST_NO_SESSIONS",
        0x8002 => "TPM_ST_SESSIONS",
        0x8003 => "TPM_RESERVED_0x8003",
        0x8004 => "TPM_RESERVED_0x8004",
        0x8014 => "TPM_ST_ATTEST_NV",
        0x8015 => "TPM_ST_ATTEST_COMMAND_AUDIT",
        0x8016 => "TPM_ST_ATTEST_SESSION_AUDIT",
        0x8017 => "TPM_ST_ATTEST_CERTIFY",
        0x8018 => "TPM_ST_ATTEST_QUOTE",
        0x8019 => "TPM_ST_ATTEST_TIME",
        0x801A => "TPM_ST_ATTEST_CREATION",
        0x801B => "TPM_RESERVED_0x801B",
        0x8021 => "TPM_ST_CREATION",
        0x8022 => "TPM_ST_VERIFIED",
        0x8023 => "TPM_ST_AUTH_SECRET",
        0x8024 => "TPM_ST_HASHCHECK",
        0x8025 => "TPM_ST_AUTH_SIGNED",
        0x8029 => "TPM_ST_FU_MANIFEST",
        other => {
            return Err(Fido2Error::Decode(format!(
                "tpm attestation: unknown structure tag: {other:x}"
            )));
        }
    };
    Ok(name)
}

/// TPM_ALG_ID to name; unassigned ids yield `None`.
pub(crate) fn alg_id_to_str(id: u16) -> Option<&'static str> {
    match id {
        0x00 => Some("TPM_ALG_ERROR"),
        0x01 => Some("TPM_ALG_RSA"),
        0x04 => Some("TPM_ALG_SHA1"),
        0x05 => Some("TPM_ALG_HMAC"),
        0x06 => Some("TPM_ALG_AES"),
        0x07 => Some("TPM_ALG_MGF1"),
        0x08 => Some("TPM_ALG_KEYEDHASH"),
        0x0A => Some("TPM_ALG_XOR"),
        0x0B => Some("TPM_ALG_SHA256"),
        0x0C => Some("TPM_ALG_SHA384"),
        0x0D => Some("TPM_ALG_SHA512"),
        0x10 => Some("TPM_ALG_NULL"),
        0x12 => Some("TPM_ALG_SM3_256"),
        0x13 => Some("TPM_ALG_SM4"),
        0x14 => Some("TPM_ALG_RSASSA"),
        0x15 => Some("TPM_ALG_RSAES"),
        0x16 => Some("TPM_ALG_RSAPSS"),
        0x17 => Some("TPM_ALG_OAEP"),
        0x18 => Some("TPM_ALG_ECDSA"),
        _ => None,
    }
}

/// Hash function named by a TPM algorithm.
pub(crate) fn tpm_hash(name: Option<&str>) -> Result<HashAlg, Fido2Error> {
    match name {
        Some("TPM_ALG_SHA1") => Ok(HashAlg::Sha1),
        Some("TPM_ALG_SHA256") => Ok(HashAlg::Sha256),
        Some("TPM_ALG_SHA384") => Ok(HashAlg::Sha384),
        Some("TPM_ALG_SHA512") => Ok(HashAlg::Sha512),
        other => Err(Fido2Error::UnsupportedKey(format!(
            "Unsupported hash type: {}",
            other.unwrap_or("undefined")
        ))),
    }
}

const OBJECT_ATTRIBUTES: [&str; 32] = [
    "RESERVED_0",
    "FIXED_TPM",
    "ST_CLEAR",
    "RESERVED_3",
    "FIXED_PARENT",
    "SENSITIVE_DATA_ORIGIN",
    "USER_WITH_AUTH",
    "ADMIN_WITH_POLICY",
    "RESERVED_8",
    "RESERVED_9",
    "NO_DA",
    "ENCRYPTED_DUPLICATION",
    "RESERVED_12",
    "RESERVED_13",
    "RESERVED_14",
    "RESERVED_15",
    "RESTRICTED",
    "DECRYPT",
    "SIGN_ENCRYPT",
    "RESERVED_19",
    "RESERVED_20",
    "RESERVED_21",
    "RESERVED_22",
    "RESERVED_23",
    "RESERVED_24",
    "RESERVED_25",
    "RESERVED_26",
    "RESERVED_27",
    "RESERVED_28",
    "RESERVED_29",
    "RESERVED_30",
    "RESERVED_31",
];

pub(crate) fn decode_object_attributes(bits: u32) -> Vec<&'static str> {
    OBJECT_ATTRIBUTES
        .iter()
        .enumerate()
        .filter(|(i, _)| bits & (1 << i) != 0)
        .map(|(_, name)| *name)
        .collect()
}

struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
    what: &'static str,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8], what: &'static str) -> Self {
        Self {
            buf,
            offset: 0,
            what,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], Fido2Error> {
        let end = self.offset.checked_add(len).filter(|end| *end <= self.buf.len());
        let Some(end) = end else {
            return Err(Fido2Error::Truncated(format!(
                "tpm attestation: {} ended at offset {} while reading {} bytes",
                self.what, self.offset, len
            )));
        };
        let slice = &self.buf[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, Fido2Error> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, Fido2Error> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, Fido2Error> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn sized(&mut self) -> Result<&'a [u8], Fido2Error> {
        let size = self.u16()? as usize;
        self.take(size)
    }

    /// TPM2B_NAME: a sized buffer holding a u16 hash algorithm and the digest.
    fn name(&mut self) -> Result<(Option<&'static str>, Vec<u8>), Fido2Error> {
        let inner = self.sized()?;
        let mut name = Reader::new(inner, self.what);
        let hash_type = alg_id_to_str(name.u16()?);
        Ok((hash_type, inner[2..].to_vec()))
    }

    fn finished(&self) -> bool {
        self.offset == self.buf.len()
    }
}

/// Decoded TPMS_ATTEST produced by TPM2_Certify.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertInfo {
    #[serde(skip)]
    pub raw: Vec<u8>,
    pub magic: u32,
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub qualified_signer_hash_type: Option<&'static str>,
    pub qualified_signer: Vec<u8>,
    pub extra_data: Vec<u8>,
    pub clock: Vec<u8>,
    pub reset_count: u32,
    pub restart_count: u32,
    pub safe: bool,
    pub firmware_version: Vec<u8>,
    pub name_hash_type: Option<&'static str>,
    pub name: Vec<u8>,
    pub qualified_name_hash_type: Option<&'static str>,
    pub qualified_name: Vec<u8>,
}

impl CertInfo {
    pub fn parse(raw: &[u8]) -> Result<Self, Fido2Error> {
        let mut r = Reader::new(raw, "certInfo");

        let magic = r.u32()?;
        if magic != TPM_GENERATED_VALUE {
            return Err(Fido2Error::Decode(format!(
                "tpm attestation: certInfo had bad magic number: {magic:x}"
            )));
        }

        let type_ = decode_structure_tag(r.u16()?)?;
        if type_ != TPM_ST_ATTEST_CERTIFY {
            return Err(Fido2Error::Decode(format!(
                "tpm attestation: got wrong type. expected 'TPM_ST_ATTEST_CERTIFY' got: {type_}"
            )));
        }

        let (qualified_signer_hash_type, qualified_signer) = r.name()?;
        let extra_data = r.sized()?.to_vec();
        let clock = r.take(8)?.to_vec();
        let reset_count = r.u32()?;
        let restart_count = r.u32()?;
        let safe = r.u8()? != 0;
        let firmware_version = r.take(8)?.to_vec();
        let (name_hash_type, name) = r.name()?;
        let (qualified_name_hash_type, qualified_name) = r.name()?;

        if !r.finished() {
            return Err(Fido2Error::Decode(
                "tpm attestation: left over bytes when parsing cert info".to_string(),
            ));
        }

        tracing::debug!(
            "certInfo: name hash {:?}, extraData {}",
            name_hash_type,
            to_hex(&extra_data)
        );

        Ok(Self {
            raw: raw.to_vec(),
            magic,
            type_,
            qualified_signer_hash_type,
            qualified_signer,
            extra_data,
            clock,
            reset_count,
            restart_count,
            safe,
            firmware_version,
            name_hash_type,
            name,
            qualified_name_hash_type,
            qualified_name,
        })
    }
}

/// Decoded TPMT_PUBLIC. Only RSA parameters are understood.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PubArea {
    #[serde(skip)]
    pub raw: Vec<u8>,
    #[serde(rename = "type")]
    pub type_: Option<&'static str>,
    pub name_alg: Option<&'static str>,
    pub object_attributes: Vec<&'static str>,
    pub auth_policy: Vec<u8>,
    pub symmetric: Option<&'static str>,
    pub scheme: Option<&'static str>,
    pub key_bits: u16,
    pub exponent: u32,
    pub unique: Vec<u8>,
}

impl PubArea {
    pub fn parse(raw: &[u8]) -> Result<Self, Fido2Error> {
        let mut r = Reader::new(raw, "pubArea");

        let type_ = alg_id_to_str(r.u16()?);
        let name_alg = alg_id_to_str(r.u16()?);
        let object_attributes = decode_object_attributes(r.u32()?);
        let auth_policy = r.sized()?.to_vec();

        if type_ != Some(TPM_ALG_RSA) {
            return Err(Fido2Error::UnsupportedKey(
                "tpm attestation: only TPM_ALG_RSA supported".to_string(),
            ));
        }

        let symmetric = alg_id_to_str(r.u16()?);
        let scheme = alg_id_to_str(r.u16()?);
        let key_bits = r.u16()?;
        let exponent = match r.u32()? {
            0 => RSA_DEFAULT_EXPONENT,
            e => e,
        };
        let unique = r.sized()?.to_vec();

        if !r.finished() {
            return Err(Fido2Error::Decode(
                "tpm attestation: left over bytes when parsing public area".to_string(),
            ));
        }

        Ok(Self {
            raw: raw.to_vec(),
            type_,
            name_alg,
            object_attributes,
            auth_policy,
            symmetric,
            scheme,
            key_bits,
            exponent,
            unique,
        })
    }
}
