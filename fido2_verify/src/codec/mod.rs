//! Binary codecs: CBOR, COSE keys and TPM structures.

pub(crate) mod cbor;
pub(crate) mod cose;
#[cfg(test)]
pub(crate) mod der;
pub(crate) mod tpm;

pub use cose::{Jwk, alg_to_hash, alg_to_str, cose_to_jwk};
pub use tpm::{CertInfo, PubArea};
