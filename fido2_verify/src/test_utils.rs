//! Test utilities shared by the unit tests of every module.
//!
//! Signed fixtures are produced at runtime from freshly generated P-256 keys,
//! so certificates, attestation statements and JWS tokens can be built for any
//! scenario without binary test vectors.

use std::sync::{Arc, Once};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use ciborium::value::Value as CborValue;
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair, KeyPair};

use crate::attestation::AttestationRegistry;
use crate::audit::{AssertionContext, AttestationContext, Audit, Expectations, VerificationContext};
use crate::certificate::{CertManager, oid};
use crate::codec::der;
use crate::crypto::sha256;
use crate::errors::Fido2Error;
use crate::parser::{
    CredentialRequest, parse_authnr_assertion_response, parse_authnr_attestation_response,
    parse_client_response,
};
use crate::utils::der_to_pem;

/// Loads `.env_test` (falling back to `.env`) once per test binary.
pub(crate) fn init_test_environment() {
    static ENV_INIT: Once = Once::new();
    ENV_INIT.call_once(|| {
        if dotenvy::from_filename(".env_test").is_err() {
            dotenvy::dotenv().ok();
        }
    });
}

const ECDSA_WITH_SHA256: &str = "1.2.840.10045.4.3.2";

/// A P-256 key pair used to sign fixtures.
pub(crate) struct TestKey {
    pkcs8: Vec<u8>,
    pair: EcdsaKeyPair,
}

impl TestKey {
    pub(crate) fn generate_p256() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .unwrap()
            .as_ref()
            .to_vec();
        let pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &pkcs8, &rng).unwrap();
        Self { pkcs8, pair }
    }

    pub(crate) fn pkcs8(&self) -> &[u8] {
        &self.pkcs8
    }

    /// ASN.1 DER ECDSA signature over SHA-256(msg).
    pub(crate) fn sign(&self, msg: &[u8]) -> Vec<u8> {
        self.pair
            .sign(&SystemRandom::new(), msg)
            .unwrap()
            .as_ref()
            .to_vec()
    }

    /// Uncompressed point `04 || x || y`.
    pub(crate) fn public_point(&self) -> Vec<u8> {
        self.pair.public_key().as_ref().to_vec()
    }

    pub(crate) fn x(&self) -> Vec<u8> {
        self.public_point()[1..33].to_vec()
    }

    pub(crate) fn y(&self) -> Vec<u8> {
        self.public_point()[33..65].to_vec()
    }

    pub(crate) fn spki_der(&self) -> Vec<u8> {
        der::sequence(&[
            der::sequence(&[
                der::oid(oid::EC_PUBLIC_KEY).unwrap(),
                der::oid(oid::SECP256R1).unwrap(),
            ]),
            der::bit_string(&self.public_point()),
        ])
    }

    pub(crate) fn pem(&self) -> String {
        der_to_pem("PUBLIC KEY", &self.spki_der())
    }

    pub(crate) fn cose_key(&self) -> CborValue {
        create_test_ec_cose_key(&self.x(), &self.y())
    }
}

pub(crate) fn create_test_ec_cose_key(x: &[u8], y: &[u8]) -> CborValue {
    CborValue::Map(vec![
        (CborValue::Integer(1.into()), CborValue::Integer(2.into())),
        (CborValue::Integer(3.into()), CborValue::Integer((-7).into())),
        (CborValue::Integer((-1).into()), CborValue::Integer(1.into())),
        (CborValue::Integer((-2).into()), CborValue::Bytes(x.to_vec())),
        (CborValue::Integer((-3).into()), CborValue::Bytes(y.to_vec())),
    ])
}

pub(crate) fn create_test_rsa_cose_key(n: &[u8], e: &[u8]) -> CborValue {
    CborValue::Map(vec![
        (CborValue::Integer(1.into()), CborValue::Integer(3.into())),
        (CborValue::Integer(3.into()), CborValue::Integer((-257).into())),
        (CborValue::Integer((-1).into()), CborValue::Bytes(n.to_vec())),
        (CborValue::Integer((-2).into()), CborValue::Bytes(e.to_vec())),
    ])
}

pub(crate) fn cbor_bytes(value: &CborValue) -> Vec<u8> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes).unwrap();
    bytes
}

pub(crate) const TEST_AAGUID: [u8; 16] = [
    0xf8, 0xa0, 0x11, 0xf3, 0x8c, 0x0a, 0x4d, 0x15, 0x80, 0x06, 0x17, 0x11, 0x1f, 0x9e, 0xdc, 0x7d,
];

/// Authenticator data with attested credential data.
pub(crate) fn create_test_auth_data(
    rp_id: &str,
    flags: u8,
    counter: u32,
    aaguid: [u8; 16],
    cred_id: &[u8],
    cose_key: &CborValue,
) -> Vec<u8> {
    let mut auth_data = sha256(rp_id.as_bytes());
    auth_data.push(flags);
    auth_data.extend_from_slice(&counter.to_be_bytes());
    auth_data.extend_from_slice(&aaguid);
    auth_data.extend_from_slice(&(cred_id.len() as u16).to_be_bytes());
    auth_data.extend_from_slice(cred_id);
    auth_data.extend(cbor_bytes(cose_key));
    auth_data
}

/// Authenticator data as returned by an assertion (no attested credential).
pub(crate) fn create_test_assertion_auth_data(rp_id: &str, flags: u8, counter: u32) -> Vec<u8> {
    let mut auth_data = sha256(rp_id.as_bytes());
    auth_data.push(flags);
    auth_data.extend_from_slice(&counter.to_be_bytes());
    auth_data
}

pub(crate) fn create_test_client_data(type_: &str, challenge: &str, origin: &str) -> Vec<u8> {
    serde_json::json!({
        "type": type_,
        "challenge": challenge,
        "origin": origin,
    })
    .to_string()
    .into_bytes()
}

pub(crate) fn create_test_attestation_object(
    fmt: &str,
    att_stmt: CborValue,
    auth_data: &[u8],
) -> Vec<u8> {
    cbor_bytes(&CborValue::Map(vec![
        (CborValue::Text("fmt".into()), CborValue::Text(fmt.into())),
        (CborValue::Text("attStmt".into()), att_stmt),
        (CborValue::Text("authData".into()), CborValue::Bytes(auth_data.to_vec())),
    ]))
}

/// TPMS_ATTEST for TPM_ST_ATTEST_CERTIFY with SHA-256 names.
pub(crate) fn create_test_cert_info(extra_data: &[u8], name_digest: &[u8]) -> Vec<u8> {
    fn tpm2b_name(digest: &[u8]) -> Vec<u8> {
        let mut out = ((digest.len() + 2) as u16).to_be_bytes().to_vec();
        out.extend_from_slice(&0x000Bu16.to_be_bytes());
        out.extend_from_slice(digest);
        out
    }

    let mut ci = 0xff54_4347u32.to_be_bytes().to_vec();
    ci.extend_from_slice(&0x8017u16.to_be_bytes());
    ci.extend(tpm2b_name(&[0u8; 32]));
    ci.extend_from_slice(&(extra_data.len() as u16).to_be_bytes());
    ci.extend_from_slice(extra_data);
    ci.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0x10, 0x00]); // clock
    ci.extend_from_slice(&7u32.to_be_bytes()); // resetCount
    ci.extend_from_slice(&3u32.to_be_bytes()); // restartCount
    ci.push(1); // safe
    ci.extend_from_slice(&[0, 2, 0, 0, 0, 0, 0, 0]); // firmwareVersion
    ci.extend(tpm2b_name(name_digest));
    ci.extend(tpm2b_name(&[0u8; 32]));
    ci
}

/// TPMT_PUBLIC for an RSA 2048 signing key; `exponent` 0 means 65537.
pub(crate) fn create_test_rsa_pub_area(n: &[u8], exponent: u32) -> Vec<u8> {
    let mut pa = 0x0001u16.to_be_bytes().to_vec(); // TPM_ALG_RSA
    pa.extend_from_slice(&0x000Bu16.to_be_bytes()); // nameAlg SHA256
    pa.extend_from_slice(&0x0004_0072u32.to_be_bytes());
    pa.extend_from_slice(&0u16.to_be_bytes()); // authPolicy
    pa.extend_from_slice(&0x0010u16.to_be_bytes()); // symmetric NULL
    pa.extend_from_slice(&0x0010u16.to_be_bytes()); // scheme NULL
    pa.extend_from_slice(&2048u16.to_be_bytes());
    pa.extend_from_slice(&exponent.to_be_bytes());
    pa.extend_from_slice(&(n.len() as u16).to_be_bytes());
    pa.extend_from_slice(n);
    pa
}

/// Description of a test certificate; see [`create_test_cert`].
#[derive(Debug, Clone)]
pub(crate) struct CertSpec {
    subject: Vec<(&'static str, String)>,
    issuer: Option<Vec<(&'static str, String)>>,
    version: u8,
    extensions: Vec<(String, bool, Vec<u8>)>,
}

fn basic_constraints(ca: bool) -> Vec<u8> {
    if ca {
        der::sequence(&[vec![0x01, 0x01, 0xff]])
    } else {
        der::sequence(&[])
    }
}

impl CertSpec {
    /// End-entity certificate with `cA = false`.
    pub(crate) fn leaf(cn: &str) -> Self {
        Self {
            subject: vec![(oid::COMMON_NAME, cn.to_string())],
            issuer: None,
            version: 3,
            extensions: vec![(oid::BASIC_CONSTRAINTS.to_string(), false, basic_constraints(false))],
        }
    }

    pub(crate) fn ca(cn: &str) -> Self {
        Self {
            subject: vec![(oid::COMMON_NAME, cn.to_string())],
            issuer: None,
            version: 3,
            extensions: vec![
                (oid::BASIC_CONSTRAINTS.to_string(), true, basic_constraints(true)),
                (oid::KEY_USAGE.to_string(), true, vec![0x03, 0x02, 0x01, 0x06]),
            ],
        }
    }

    /// Certificate meeting the packed attestation requirements.
    pub(crate) fn packed(aaguid: Option<[u8; 16]>) -> Self {
        let mut spec = Self {
            subject: vec![
                (oid::COUNTRY_NAME, "US".to_string()),
                (oid::ORGANIZATION_NAME, "Test Vendor".to_string()),
                (oid::ORGANIZATIONAL_UNIT_NAME, "Authenticator Attestation".to_string()),
                (oid::COMMON_NAME, "Test Packed Attestation".to_string()),
            ],
            issuer: Some(vec![(oid::COMMON_NAME, "Test Packed Root".to_string())]),
            version: 3,
            extensions: vec![(oid::BASIC_CONSTRAINTS.to_string(), false, basic_constraints(false))],
        };
        if let Some(aaguid) = aaguid {
            spec = spec.with_raw_extension(oid::FIDO_GEN_CE_AAGUID, false, der::octet_string(&aaguid));
        }
        spec
    }

    /// TPM attestation identity key certificate: empty subject, TPM
    /// directoryName in a critical subjectAltName, tcg-kp-aik-certificate EKU.
    pub(crate) fn tpm_aik(aaguid: [u8; 16]) -> Self {
        let tpm_name = encode_name(&[
            (oid::TPM_MANUFACTURER, "id:54534700".to_string()),
            (oid::TPM_MODEL, "TPM Test Model".to_string()),
            (oid::TPM_VERSION, "id:00020000".to_string()),
        ]);
        let san = der::sequence(&[der::tlv(0xa4, &tpm_name)]);
        let eku = der::sequence(&[der::oid(oid::TCG_KP_AIK_CERTIFICATE).unwrap()]);
        Self {
            subject: vec![],
            issuer: Some(vec![(oid::COMMON_NAME, "Test TPM Intermediate".to_string())]),
            version: 3,
            extensions: vec![
                (oid::BASIC_CONSTRAINTS.to_string(), false, basic_constraints(false)),
                (oid::SUBJECT_ALT_NAME.to_string(), true, san),
                (oid::EXT_KEY_USAGE.to_string(), false, eku),
                (oid::FIDO_GEN_CE_AAGUID.to_string(), false, der::octet_string(&aaguid)),
            ],
        }
    }

    pub(crate) fn issued_by(mut self, cn: &str) -> Self {
        self.issuer = Some(vec![(oid::COMMON_NAME, cn.to_string())]);
        self
    }

    pub(crate) fn with_subject(mut self, subject: Vec<(&'static str, String)>) -> Self {
        self.subject = subject;
        self
    }

    pub(crate) fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub(crate) fn with_raw_extension(mut self, oid: &str, critical: bool, value: Vec<u8>) -> Self {
        self.extensions.retain(|(o, _, _)| o != oid);
        self.extensions.push((oid.to_string(), critical, value));
        self
    }

    pub(crate) fn with_basic_constraints_ca(self, ca: bool) -> Self {
        self.with_raw_extension(oid::BASIC_CONSTRAINTS, false, basic_constraints(ca))
    }

    pub(crate) fn without_extension(mut self, oid: &str) -> Self {
        self.extensions.retain(|(o, _, _)| o != oid);
        self
    }
}

fn encode_name(attrs: &[(&str, String)]) -> Vec<u8> {
    let rdns: Vec<Vec<u8>> = attrs
        .iter()
        .map(|(attr_oid, value)| {
            // countryName is a PrintableString, everything else UTF8String
            let tag = if *attr_oid == oid::COUNTRY_NAME { 0x13 } else { 0x0c };
            let atv = der::sequence(&[der::oid(attr_oid).unwrap(), der::tlv(tag, value.as_bytes())]);
            der::tlv(0x31, &atv)
        })
        .collect();
    der::sequence(&rdns)
}

fn ecdsa_with_sha256() -> Vec<u8> {
    der::sequence(&[der::oid(ECDSA_WITH_SHA256).unwrap()])
}

fn random_serial() -> Vec<u8> {
    let mut serial = crate::utils::gen_random_bytes(8).unwrap();
    serial[0] = (serial[0] & 0x7f) | 0x01;
    serial
}

/// Builds a DER certificate for `subject_key`, signed by `issuer_key`.
pub(crate) fn create_test_cert(spec: &CertSpec, subject_key: &TestKey, issuer_key: &TestKey) -> Vec<u8> {
    let subject = encode_name(&spec.subject);
    let issuer = spec
        .issuer
        .as_ref()
        .map_or_else(|| subject.clone(), |attrs| encode_name(attrs));
    let validity = der::sequence(&[
        der::tlv(0x17, b"200101000000Z"),
        der::tlv(0x18, b"20991231235959Z"),
    ]);

    let mut tbs_items = Vec::new();
    if spec.version > 1 {
        tbs_items.push(der::tlv(0xa0, &der::unsigned_integer(&[spec.version - 1])));
    }
    tbs_items.push(der::unsigned_integer(&random_serial()));
    tbs_items.push(ecdsa_with_sha256());
    tbs_items.push(issuer);
    tbs_items.push(validity);
    tbs_items.push(subject);
    tbs_items.push(subject_key.spki_der());
    if spec.version == 3 && !spec.extensions.is_empty() {
        let exts: Vec<Vec<u8>> = spec
            .extensions
            .iter()
            .map(|(ext_oid, critical, value)| {
                let mut items = vec![der::oid(ext_oid).unwrap()];
                if *critical {
                    items.push(vec![0x01, 0x01, 0xff]);
                }
                items.push(der::octet_string(value));
                der::sequence(&items)
            })
            .collect();
        tbs_items.push(der::tlv(0xa3, &der::sequence(&exts)));
    }
    let tbs = der::sequence(&tbs_items);
    let sig = issuer_key.sign(&tbs);
    der::sequence(&[tbs, ecdsa_with_sha256(), der::bit_string(&sig)])
}

/// Builds a v2 CRL issued by `issuer_cn` revoking the given raw serials.
pub(crate) fn create_test_crl(issuer_cn: &str, serials: &[Vec<u8>], issuer_key: &TestKey) -> Vec<u8> {
    let revoked: Vec<Vec<u8>> = serials
        .iter()
        .map(|s| der::sequence(&[der::tlv(0x02, s), der::tlv(0x17, b"240101000000Z")]))
        .collect();
    let tbs = der::sequence(&[
        der::unsigned_integer(&[1]),
        ecdsa_with_sha256(),
        encode_name(&[(oid::COMMON_NAME, issuer_cn.to_string())]),
        der::tlv(0x17, b"240101000000Z"),
        der::tlv(0x17, b"491231235959Z"),
        der::sequence(&revoked),
    ]);
    let sig = issuer_key.sign(&tbs);
    der::sequence(&[tbs, ecdsa_with_sha256(), der::bit_string(&sig)])
}

/// Compact JWS signed with ES256 carrying `x5c` (standard base64 DER) in its header.
pub(crate) fn create_test_jws(
    payload: &serde_json::Value,
    key: &TestKey,
    x5c: &[Vec<u8>],
    kid: Option<&str>,
) -> String {
    let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::ES256);
    header.x5c = Some(x5c.iter().map(|c| STANDARD.encode(c)).collect());
    header.kid = kid.map(str::to_string);
    jsonwebtoken::encode(&header, payload, &jsonwebtoken::EncodingKey::from_ec_der(key.pkcs8()))
        .unwrap()
}

/// Parses a registration response built from the given parts into a
/// verification context with empty expectations.
pub(crate) fn create_test_attestation_context(
    fmt: &str,
    att_stmt: CborValue,
    auth_data: &[u8],
    client_data: Vec<u8>,
    raw_id: Vec<u8>,
) -> Result<AttestationContext, Fido2Error> {
    let att_obj = create_test_attestation_object(fmt, att_stmt, auth_data);
    let request = CredentialRequest::attestation(raw_id, client_data, att_obj);
    let registry = AttestationRegistry::with_default_formats();
    let client = parse_client_response(&request)?;
    let authnr = parse_authnr_attestation_response(&request, &registry)?;
    Ok(VerificationContext::new(
        client,
        authnr,
        Expectations::default(),
        Audit::default(),
        Arc::new(CertManager::new()),
    ))
}

pub(crate) fn create_test_assertion_context(
    auth_data: &[u8],
    client_data: Vec<u8>,
    sig: Vec<u8>,
    user_handle: Option<Vec<u8>>,
) -> Result<AssertionContext, Fido2Error> {
    let request = CredentialRequest::assertion(
        vec![1u8, 2, 3, 4],
        client_data,
        auth_data.to_vec(),
        sig,
        user_handle.map(Into::into),
    );
    let client = parse_client_response(&request)?;
    let authnr = parse_authnr_assertion_response(&request)?;
    Ok(VerificationContext::new(
        client,
        authnr,
        Expectations::default(),
        Audit::default(),
        Arc::new(CertManager::new()),
    ))
}
