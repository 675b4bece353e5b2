use std::collections::BTreeMap;

use ciborium::value::Value as CborValue;
use serde::Serialize;

use p256::pkcs8::EncodePublicKey;
use rsa::{BigUint, RsaPublicKey};

use super::cbor::integer_to_i64;
use crate::crypto::HashAlg;
use crate::errors::Fido2Error;
use crate::utils::{base64url_decode, base64url_encode, der_to_pem};

const COSE_KTY: i64 = 1;
const COSE_KID: i64 = 2;
const COSE_ALG: i64 = 3;
const COSE_KEY_OPS: i64 = 4;
const COSE_BASE_IV: i64 = 5;

/// COSE algorithm identifier to its name.
pub fn alg_to_str(alg: i64) -> Option<&'static str> {
    match alg {
        -7 => Some("ECDSA_w_SHA256"),
        -8 => Some("EdDSA"),
        -35 => Some("ECDSA_w_SHA384"),
        -36 => Some("ECDSA_w_SHA512"),
        -257 => Some("RSASSA-PKCS1-v1_5_w_SHA256"),
        -258 => Some("RSASSA-PKCS1-v1_5_w_SHA384"),
        -259 => Some("RSASSA-PKCS1-v1_5_w_SHA512"),
        -65535 => Some("RSASSA-PKCS1-v1_5_w_SHA1"),
        _ => None,
    }
}

/// Hash used by a COSE algorithm. EdDSA and unknown algorithms have none.
pub fn alg_to_hash(alg: i64) -> Option<HashAlg> {
    match alg {
        -7 | -257 => Some(HashAlg::Sha256),
        -35 | -258 => Some(HashAlg::Sha384),
        -36 | -259 => Some(HashAlg::Sha512),
        -65535 => Some(HashAlg::Sha1),
        _ => None,
    }
}

fn kty_name(kty: i64) -> Option<&'static str> {
    match kty {
        2 => Some("EC"),
        3 => Some("RSA"),
        _ => None,
    }
}

fn crv_name(crv: i64) -> Option<&'static str> {
    match crv {
        1 => Some("P-256"),
        2 => Some("P-384"),
        3 => Some("P-521"),
        4 => Some("X25519"),
        5 => Some("X448"),
        6 => Some("Ed25519"),
        7 => Some("Ed448"),
        _ => None,
    }
}

fn ec_param_name(label: i64) -> Option<&'static str> {
    match label {
        -1 => Some("crv"),
        -2 => Some("x"),
        -3 => Some("y"),
        -4 => Some("d"),
        _ => None,
    }
}

fn rsa_param_name(label: i64) -> Option<&'static str> {
    match label {
        -1 => Some("n"),
        -2 => Some("e"),
        -3 => Some("d"),
        -4 => Some("p"),
        -5 => Some("q"),
        -6 => Some("dP"),
        -7 => Some("dQ"),
        -8 => Some("qInv"),
        -9 => Some("other"),
        -10 => Some("r_i"),
        -11 => Some("d_i"),
        -12 => Some("t_i"),
        _ => None,
    }
}

/// A credential public key in JWK form.
///
/// Binary members (`x`, `y`, `n`, `e`, ...) hold base64url text, named members
/// (`kty`, `alg`, `crv`) hold the registry name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Jwk(BTreeMap<String, String>);

impl Jwk {
    pub fn get(&self, member: &str) -> Option<&str> {
        self.0.get(member).map(String::as_str)
    }

    pub fn kty(&self) -> Option<&str> {
        self.get("kty")
    }

    pub fn alg(&self) -> Option<&str> {
        self.get("alg")
    }

    pub fn crv(&self) -> Option<&str> {
        self.get("crv")
    }

    pub(crate) fn insert(&mut self, member: &str, value: impl Into<String>) {
        self.0.insert(member.to_string(), value.into());
    }

    /// Decodes a base64url member.
    pub fn bytes(&self, member: &str) -> Result<Vec<u8>, Fido2Error> {
        let value = self.get(member).ok_or_else(|| {
            Fido2Error::UnsupportedKey(format!("JWK is missing member '{member}'"))
        })?;
        Ok(base64url_decode(value)?)
    }

    /// SubjectPublicKeyInfo DER for EC (P-256/384/521) and RSA keys.
    ///
    /// EC points must lie on the named curve.
    pub fn to_spki_der(&self) -> Result<Vec<u8>, Fido2Error> {
        let document = match self.kty() {
            Some("EC") => {
                let mut point = vec![0x04];
                point.extend(self.bytes("x")?);
                point.extend(self.bytes("y")?);
                match self.crv() {
                    Some("P-256") => p256::PublicKey::from_sec1_bytes(&point)
                        .map_err(invalid_point)?
                        .to_public_key_der(),
                    Some("P-384") => p384::PublicKey::from_sec1_bytes(&point)
                        .map_err(invalid_point)?
                        .to_public_key_der(),
                    Some("P-521") => p521::PublicKey::from_sec1_bytes(&point)
                        .map_err(invalid_point)?
                        .to_public_key_der(),
                    other => {
                        return Err(Fido2Error::UnsupportedKey(format!(
                            "unsupported EC curve: {}",
                            other.unwrap_or("undefined")
                        )));
                    }
                }
            }
            Some("RSA") => RsaPublicKey::new(
                BigUint::from_bytes_be(&self.bytes("n")?),
                BigUint::from_bytes_be(&self.bytes("e")?),
            )
            .map_err(|e| Fido2Error::UnsupportedKey(format!("invalid RSA public key: {e}")))?
            .to_public_key_der(),
            other => {
                return Err(Fido2Error::UnsupportedKey(format!(
                    "cannot export key type {} to PEM",
                    other.unwrap_or("undefined")
                )));
            }
        };
        let document = document
            .map_err(|e| Fido2Error::Decode(format!("could not encode public key: {e}")))?;
        Ok(document.as_bytes().to_vec())
    }

    pub fn to_pem(&self) -> Result<String, Fido2Error> {
        Ok(der_to_pem("PUBLIC KEY", &self.to_spki_der()?))
    }
}

fn invalid_point(e: p256::elliptic_curve::Error) -> Fido2Error {
    Fido2Error::UnsupportedKey(format!("invalid EC public key: {e}"))
}

fn label_of(value: &CborValue) -> Option<i64> {
    match value {
        CborValue::Integer(i) => integer_to_i64(i),
        _ => None,
    }
}

fn value_to_string(value: &CborValue) -> Result<String, Fido2Error> {
    match value {
        CborValue::Integer(i) => Ok(i128::from(*i).to_string()),
        CborValue::Text(t) => Ok(t.clone()),
        CborValue::Bytes(b) => Ok(base64url_encode(b)),
        _ => Err(Fido2Error::UnsupportedKey(
            "COSE key member had an unsupported value type".to_string(),
        )),
    }
}

/// Converts a decoded COSE_Key map into a JWK.
///
/// Common labels (kty, kid, alg, key_ops, base_iv) are mapped first; the
/// remaining labels must be known parameters of the key type.
pub fn cose_to_jwk(cose: &CborValue) -> Result<Jwk, Fido2Error> {
    let CborValue::Map(entries) = cose else {
        return Err(Fido2Error::Decode(
            "invalid parsing of authenticator.authData.attestationData CBOR".to_string(),
        ));
    };

    let mut jwk = Jwk::default();
    let mut key_params = Vec::new();

    for (key, value) in entries {
        let label = label_of(key);
        match label {
            Some(COSE_KTY) => {
                let kty = label_of(value)
                    .and_then(kty_name)
                    .map(str::to_string)
                    .map_or_else(|| value_to_string(value), Ok)?;
                jwk.insert("kty", kty);
            }
            Some(COSE_ALG) => {
                let alg = label_of(value)
                    .and_then(alg_to_str)
                    .map(str::to_string)
                    .map_or_else(|| value_to_string(value), Ok)?;
                jwk.insert("alg", alg);
            }
            Some(COSE_KID) => jwk.insert("kid", value_to_string(value)?),
            Some(COSE_KEY_OPS) => jwk.insert("key_ops", value_to_string(value)?),
            Some(COSE_BASE_IV) => jwk.insert("base_iv", value_to_string(value)?),
            _ => key_params.push((key, value)),
        }
    }

    let kty = jwk.kty().unwrap_or("undefined").to_string();
    for (key, value) in key_params {
        let label = label_of(key);
        let name = match kty.as_str() {
            "EC" => label.and_then(ec_param_name),
            "RSA" => label.and_then(rsa_param_name),
            _ => None,
        }
        .ok_or_else(|| {
            Fido2Error::UnsupportedKey(format!(
                "unknown COSE key label: {} {}",
                kty,
                label.map_or_else(|| super::cbor::describe(key), |l| l.to_string())
            ))
        })?;

        if name == "crv" {
            let crv = label_of(value).and_then(crv_name).ok_or_else(|| {
                Fido2Error::UnsupportedKey(format!(
                    "unknown COSE curve: {}",
                    super::cbor::describe(value)
                ))
            })?;
            jwk.insert("crv", crv);
        } else {
            jwk.insert(name, value_to_string(value)?);
        }
    }

    Ok(jwk)
}
