//! Hashing and signature verification used by every attestation format.
//!
//! Keys arrive either as SubjectPublicKeyInfo DER (credential public keys
//! converted from COSE, or the key of a certificate) or as a whole certificate.

use std::collections::HashSet;

use jsonwebtoken::{DecodingKey, Header, Validation, decode, decode_header};
use ring::signature::{self, UnparsedPublicKey, VerificationAlgorithm};
use serde::Serialize;
use sha2::{Digest, Sha256, Sha384, Sha512};
use webpki::EndEntityCert;
use x509_parser::{certificate::X509Certificate, prelude::FromDer, x509::SubjectPublicKeyInfo};

use crate::errors::Fido2Error;
use crate::utils::coerce_to_bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HashAlg {
    #[serde(rename = "SHA1")]
    Sha1,
    #[serde(rename = "SHA256")]
    Sha256,
    #[serde(rename = "SHA384")]
    Sha384,
    #[serde(rename = "SHA512")]
    Sha512,
}

impl HashAlg {
    pub fn name(&self) -> &'static str {
        match self {
            HashAlg::Sha1 => "SHA1",
            HashAlg::Sha256 => "SHA256",
            HashAlg::Sha384 => "SHA384",
            HashAlg::Sha512 => "SHA512",
        }
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlg::Sha1 => {
                ring::digest::digest(&ring::digest::SHA1_FOR_LEGACY_USE_ONLY, data)
                    .as_ref()
                    .to_vec()
            }
            HashAlg::Sha256 => Sha256::digest(data).to_vec(),
            HashAlg::Sha384 => Sha384::digest(data).to_vec(),
            HashAlg::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

pub(crate) fn sha256(data: &[u8]) -> Vec<u8> {
    HashAlg::Sha256.digest(data)
}

/// Public key families the verifier understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyKind {
    Rsa,
    EcP256,
    EcP384,
    Ed25519,
}

impl KeyKind {
    /// Hash used when the caller does not name one (assertion signatures).
    pub(crate) fn default_hash(&self) -> Option<HashAlg> {
        match self {
            KeyKind::Rsa | KeyKind::EcP256 => Some(HashAlg::Sha256),
            KeyKind::EcP384 => Some(HashAlg::Sha384),
            KeyKind::Ed25519 => None,
        }
    }
}

/// Splits SPKI DER into the key family and the raw key bits ring expects.
pub(crate) fn classify_spki(spki_der: &[u8]) -> Result<(KeyKind, Vec<u8>), Fido2Error> {
    let (_, spki) = SubjectPublicKeyInfo::from_der(spki_der)
        .map_err(|e| Fido2Error::Decode(format!("could not parse public key: {e}")))?;
    let key_bits = spki.subject_public_key.data.to_vec();
    let alg = spki.algorithm.algorithm.as_bytes();
    let kind = if alg == oid_registry::OID_PKCS1_RSAENCRYPTION.as_bytes() {
        KeyKind::Rsa
    } else if alg == oid_registry::OID_KEY_TYPE_EC_PUBLIC_KEY.as_bytes() {
        match key_bits.len() {
            65 => KeyKind::EcP256,
            97 => KeyKind::EcP384,
            n => {
                return Err(Fido2Error::UnsupportedKey(format!(
                    "unsupported EC point length: {n}"
                )));
            }
        }
    } else if alg == oid_registry::OID_SIG_ED25519.as_bytes() {
        KeyKind::Ed25519
    } else {
        return Err(Fido2Error::UnsupportedKey(format!(
            "unsupported public key algorithm: {}",
            spki.algorithm.algorithm.to_id_string()
        )));
    };
    Ok((kind, key_bits))
}

fn ring_algorithm(
    kind: KeyKind,
    hash: Option<HashAlg>,
) -> Result<&'static dyn VerificationAlgorithm, Fido2Error> {
    let alg: &'static dyn VerificationAlgorithm = match (kind, hash) {
        (KeyKind::EcP256, Some(HashAlg::Sha256)) => &signature::ECDSA_P256_SHA256_ASN1,
        (KeyKind::EcP256, Some(HashAlg::Sha384)) => &signature::ECDSA_P256_SHA384_ASN1,
        (KeyKind::EcP384, Some(HashAlg::Sha256)) => &signature::ECDSA_P384_SHA256_ASN1,
        (KeyKind::EcP384, Some(HashAlg::Sha384)) => &signature::ECDSA_P384_SHA384_ASN1,
        (KeyKind::Rsa, Some(HashAlg::Sha1)) => {
            &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY
        }
        (KeyKind::Rsa, Some(HashAlg::Sha256)) => &signature::RSA_PKCS1_2048_8192_SHA256,
        (KeyKind::Rsa, Some(HashAlg::Sha384)) => &signature::RSA_PKCS1_2048_8192_SHA384,
        (KeyKind::Rsa, Some(HashAlg::Sha512)) => &signature::RSA_PKCS1_2048_8192_SHA512,
        (KeyKind::Ed25519, None) => &signature::ED25519,
        (kind, hash) => {
            return Err(Fido2Error::UnsupportedKey(format!(
                "no signature algorithm for {:?} with {}",
                kind,
                hash.map_or("no hash", |h| h.name())
            )));
        }
    };
    Ok(alg)
}

/// Verifies `sig` over `msg` with a SubjectPublicKeyInfo.
///
/// Returns `Ok(false)` for a signature that does not verify and an error when
/// the key or the key/hash combination is not supported.
pub(crate) fn verify_spki_signature(
    spki_der: &[u8],
    hash: Option<HashAlg>,
    msg: &[u8],
    sig: &[u8],
) -> Result<bool, Fido2Error> {
    let (kind, key_bits) = classify_spki(spki_der)?;
    let alg = ring_algorithm(kind, hash)?;
    Ok(UnparsedPublicKey::new(alg, key_bits).verify(msg, sig).is_ok())
}

/// Verifies with the hash implied by the key type.
pub(crate) fn verify_spki_signature_default(
    spki_der: &[u8],
    msg: &[u8],
    sig: &[u8],
) -> Result<bool, Fido2Error> {
    let (kind, _) = classify_spki(spki_der)?;
    verify_spki_signature(spki_der, kind.default_hash(), msg, sig)
}

pub(crate) fn spki_from_certificate(cert_der: &[u8]) -> Result<Vec<u8>, Fido2Error> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| Fido2Error::CertParse(format!("error parsing ASN.1: {e}")))?;
    Ok(cert.public_key().raw.to_vec())
}

static WEBPKI_SHA256: [&webpki::SignatureAlgorithm; 3] = [
    &webpki::ECDSA_P256_SHA256,
    &webpki::ECDSA_P384_SHA256,
    &webpki::RSA_PKCS1_2048_8192_SHA256,
];
static WEBPKI_SHA384: [&webpki::SignatureAlgorithm; 3] = [
    &webpki::ECDSA_P256_SHA384,
    &webpki::ECDSA_P384_SHA384,
    &webpki::RSA_PKCS1_2048_8192_SHA384,
];
static WEBPKI_SHA512: [&webpki::SignatureAlgorithm; 1] = [&webpki::RSA_PKCS1_2048_8192_SHA512];
static WEBPKI_EDDSA: [&webpki::SignatureAlgorithm; 1] = [&webpki::ED25519];

fn webpki_candidates(hash: Option<HashAlg>) -> &'static [&'static webpki::SignatureAlgorithm] {
    match hash {
        Some(HashAlg::Sha256) => &WEBPKI_SHA256,
        Some(HashAlg::Sha384) => &WEBPKI_SHA384,
        Some(HashAlg::Sha512) => &WEBPKI_SHA512,
        None => &WEBPKI_EDDSA,
        Some(HashAlg::Sha1) => &[],
    }
}

/// Verifies `sig` over `msg` with the public key of an attestation certificate.
///
/// webpki is tried first; certificates it refuses to parse (TPM AIK certificates
/// with an empty subject, for example) and SHA-1 signatures go through the
/// SubjectPublicKeyInfo path.
pub(crate) fn verify_with_certificate(
    cert_der: &[u8],
    hash: Option<HashAlg>,
    msg: &[u8],
    sig: &[u8],
) -> Result<bool, Fido2Error> {
    if let Ok(cert) = EndEntityCert::try_from(cert_der) {
        for alg in webpki_candidates(hash) {
            match cert.verify_signature(alg, msg, sig) {
                Ok(()) => return Ok(true),
                Err(webpki::Error::InvalidSignatureForPublicKey) => return Ok(false),
                Err(_) => continue,
            }
        }
    } else {
        tracing::debug!("webpki could not parse certificate, using x509-parser public key");
    }

    let spki = spki_from_certificate(cert_der)?;
    verify_spki_signature(&spki, hash, msg, sig)
}

/// Key for verifying a JWS signed by the holder of `cert_der`.
pub(crate) fn jws_decoding_key(cert_der: &[u8]) -> Result<DecodingKey, Fido2Error> {
    let spki = spki_from_certificate(cert_der)?;
    let (kind, key_bits) = classify_spki(&spki)?;
    Ok(match kind {
        KeyKind::EcP256 | KeyKind::EcP384 => DecodingKey::from_ec_der(&key_bits),
        KeyKind::Rsa => DecodingKey::from_rsa_der(&key_bits),
        KeyKind::Ed25519 => DecodingKey::from_ed_der(&key_bits),
    })
}

/// A compact JWS whose signature was checked against its `x5c` leaf.
#[derive(Debug)]
pub(crate) struct X5cJws {
    pub(crate) header: Header,
    pub(crate) claims: serde_json::Value,
    /// DER certificates from the header, leaf first.
    pub(crate) certs: Vec<Vec<u8>>,
}

/// Verifies a JWS with the key of the first certificate in its `x5c` header.
/// Time based claims are not checked. Error messages start with `prefix`.
pub(crate) fn verify_x5c_jws(token: &str, prefix: &str) -> Result<X5cJws, Fido2Error> {
    let header = decode_header(token)
        .map_err(|e| Fido2Error::Decode(format!("{prefix}could not decode JWS header: {e}")))?;

    let certs = header
        .x5c
        .as_ref()
        .filter(|certs| !certs.is_empty())
        .ok_or_else(|| {
            Fido2Error::Input(format!(
                "{prefix}JWS header did not contain 'x5c' certificates"
            ))
        })?
        .iter()
        .map(|cert| coerce_to_bytes(cert).map_err(Fido2Error::from))
        .collect::<Result<Vec<_>, _>>()?;

    let key = jws_decoding_key(&certs[0])?;
    let mut validation = Validation::new(header.alg);
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let token = decode::<serde_json::Value>(token, &key, &validation).map_err(|e| {
        Fido2Error::Verification(format!("{prefix}JWS signature verification failed: {e}"))
    })?;
    tracing::debug!("JWS verified with {:?}", header.alg);

    Ok(X5cJws {
        header,
        claims: token.claims,
        certs,
    })
}
