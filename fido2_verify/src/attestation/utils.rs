use ciborium::value::Value as CborValue;

use super::AlgInfo;
use crate::audit::AttestationContext;
use crate::certificate::roots::YUBICO_U2F_ROOT;
use crate::certificate::{Certificate, Extensions, IssuerStatus};
use crate::codec::cbor::{integer_to_i64, map_get};
use crate::codec::{alg_to_hash, alg_to_str};
use crate::crypto::sha256;
use crate::errors::Fido2Error;

pub(super) fn get_bytes(att_stmt: &[(CborValue, CborValue)], key: &str) -> Option<Vec<u8>> {
    match map_get(att_stmt, key) {
        Some(CborValue::Bytes(b)) => Some(b.clone()),
        _ => None,
    }
}

pub(super) fn get_text(att_stmt: &[(CborValue, CborValue)], key: &str) -> Option<String> {
    match map_get(att_stmt, key) {
        Some(CborValue::Text(t)) => Some(t.clone()),
        _ => None,
    }
}

pub(super) fn get_alg(att_stmt: &[(CborValue, CborValue)]) -> Option<i64> {
    match map_get(att_stmt, "alg") {
        Some(CborValue::Integer(i)) => integer_to_i64(i),
        _ => None,
    }
}

pub(super) fn alg_info(id: i64) -> AlgInfo {
    AlgInfo {
        id,
        alg_name: alg_to_str(id),
        hash_alg: alg_to_hash(id),
    }
}

/// `x5c` as a list of DER certificates; `None` when the member is absent.
pub(super) fn get_x5c(
    att_stmt: &[(CborValue, CborValue)],
    not_array: &str,
) -> Result<Option<Vec<Vec<u8>>>, Fido2Error> {
    let Some(value) = map_get(att_stmt, "x5c") else {
        return Ok(None);
    };
    let CborValue::Array(items) = value else {
        return Err(Fido2Error::Input(not_array.to_string()));
    };
    items
        .iter()
        .map(|item| match item {
            CborValue::Bytes(b) => Ok(b.clone()),
            _ => Err(Fido2Error::Input(format!(
                "{not_array}: expected certificates to be byte strings"
            ))),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// SHA-256 of the raw client data JSON.
pub(super) fn client_data_hash(ctx: &AttestationContext) -> Vec<u8> {
    sha256(&ctx.client_data.raw_client_data_json)
}

/// `authData || clientDataHash`, the message signed by most formats.
pub(super) fn signed_data(ctx: &AttestationContext) -> Vec<u8> {
    let mut data = ctx.authnr_data.data.raw.clone();
    data.extend(client_data_hash(ctx));
    data
}

/// Adds the built-in U2F root when no trust anchors have been configured.
pub(super) fn ensure_default_roots(ctx: &AttestationContext) -> Result<(), Fido2Error> {
    if ctx.cert_manager.is_empty() {
        tracing::debug!("Certificate store is empty, loading built-in U2F root");
        ctx.cert_manager.add_cert(Certificate::parse(YUBICO_U2F_ROOT)?)?;
    }
    Ok(())
}

/// Checks the attestation certificate against the store.
///
/// An unknown issuer is not an error; it is recorded as an audit warning.
pub(super) fn verify_attestation_cert(
    ctx: &mut AttestationContext,
    cert: &Certificate,
) -> Result<(), Fido2Error> {
    if cert.verify(&ctx.cert_manager)? == IssuerStatus::NotFound {
        tracing::warn!("Root attestation certificate not found, attestation not validated");
        ctx.audit.add_warning(
            "attesation-not-validated",
            "could not validate attestation because the root attestation certification could not be found",
        );
    }
    Ok(())
}

/// Copies decoded certificate extensions into the audit.
pub(super) fn record_extensions(
    ctx: &mut AttestationContext,
    extensions: &Extensions,
) -> Result<(), Fido2Error> {
    for (name, value) in &extensions.values {
        ctx.audit.add_info(name, serde_json::to_value(value)?);
    }
    for (name, message) in &extensions.warning {
        ctx.audit.add_warning(name, message);
    }
    Ok(())
}
