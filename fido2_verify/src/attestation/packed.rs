use ciborium::value::Value as CborValue;

use super::utils::{
    alg_info, ensure_default_roots, get_alg, get_bytes, get_x5c, record_extensions, signed_data,
    verify_attestation_cert,
};
use super::{AlgInfo, AttestationFormat, AttestationStatement};
use crate::audit::AttestationContext;
use crate::certificate::{Certificate, ExtensionValue};
use crate::crypto::{verify_spki_signature, verify_with_certificate};
use crate::errors::Fido2Error;
use crate::utils::pem_to_der;

/// Algorithms accepted in a packed statement.
const PACKED_ALGS: [i64; 3] = [-7, -35, -36];

/// `packed`: basic (x5c), self or ECDAA attestation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackedFormat;

impl AttestationFormat for PackedFormat {
    fn name(&self) -> &str {
        "packed"
    }

    fn parse(&self, att_stmt: &[(CborValue, CborValue)]) -> Result<AttestationStatement, Fido2Error> {
        let alg_id = get_alg(att_stmt).ok_or_else(|| {
            Fido2Error::Input("packed attestation: expected 'alg' to be a number".to_string())
        })?;
        if !PACKED_ALGS.contains(&alg_id) {
            return Err(Fido2Error::UnsupportedKey(format!(
                "packed attestation: unknown algorithm: {alg_id}"
            )));
        }

        let sig = get_bytes(att_stmt, "sig").ok_or_else(|| {
            Fido2Error::Input("packed attestation: expected 'sig' to be ArrayBuffer".to_string())
        })?;

        let (att_cert, x5c) = match get_x5c(att_stmt, "packed attestation: expected 'x5c' to be an Array")? {
            Some(mut certs) => {
                if certs.is_empty() {
                    return Err(Fido2Error::Input(
                        "packed attestation: no certificates in x5c field".to_string(),
                    ));
                }
                let att_cert = certs.remove(0);
                (Some(att_cert), Some(certs))
            }
            None => (None, None),
        };

        Ok(AttestationStatement::Packed {
            alg: alg_info(alg_id),
            att_cert,
            x5c,
            ecdaa_key_id: get_bytes(att_stmt, "ecdaaKeyId"),
            sig,
        })
    }

    fn validate(&self, ctx: &mut AttestationContext) -> Result<(), Fido2Error> {
        let AttestationStatement::Packed {
            alg,
            att_cert,
            x5c,
            ecdaa_key_id,
            sig,
        } = ctx.authnr_data.statement.clone()
        else {
            return Err(Fido2Error::Input(
                "packed attestation: statement is not a packed statement".to_string(),
            ));
        };

        match (x5c.is_some(), ecdaa_key_id.is_some()) {
            (true, true) => Err(Fido2Error::Input(
                "packed attestation: should be 'basic' or 'ecdaa', got both".to_string(),
            )),
            (false, true) => Err(Fido2Error::NotImplemented(
                "packed attestation: ECDAA not implemented, please open a GitHub issue.".to_string(),
            )),
            (true, false) => validate_basic(ctx, alg, att_cert, &sig),
            (false, false) => validate_self(ctx, alg, &sig),
        }
    }
}

fn signature_failed() -> Fido2Error {
    Fido2Error::Verification("packed attestation signature verification failed".to_string())
}

fn validate_basic(
    ctx: &mut AttestationContext,
    alg: AlgInfo,
    att_cert: Option<Vec<u8>>,
    sig: &[u8],
) -> Result<(), Fido2Error> {
    let att_cert = att_cert.ok_or_else(|| {
        Fido2Error::Input("packed attestation: missing attestation certificate".to_string())
    })?;

    if !verify_with_certificate(&att_cert, alg.hash_alg, &signed_data(ctx), sig)? {
        return Err(signature_failed());
    }
    ctx.audit.journal("sig");
    ctx.audit.journal("alg");

    ensure_default_roots(ctx)?;
    let cert = Certificate::from_der(&att_cert)?;
    verify_attestation_cert(ctx, &cert)?;
    ctx.audit.journal("x5c");

    if cert.version()? != 3 {
        return Err(Fido2Error::Policy(
            "expected packed attestation certificate to be x.509v3".to_string(),
        ));
    }

    let extensions = cert.extensions()?;
    record_extensions(ctx, &extensions)?;
    ctx.audit.journal("attCert");

    let subject = cert.subject()?;
    if !subject.contains_key("country-name") {
        return Err(Fido2Error::Policy(
            "packed attestation: attestation certificate missing 'country name'".to_string(),
        ));
    }
    if !subject.contains_key("organization-name") {
        return Err(Fido2Error::Policy(
            "packed attestation: attestation certificate missing 'organization name'".to_string(),
        ));
    }
    if subject.get("organizational-unit-name").map(String::as_str)
        != Some("Authenticator Attestation")
    {
        return Err(Fido2Error::Policy(
            "packed attestation: attestation certificate 'organizational unit name' must be 'Authenticator Attestation'"
                .to_string(),
        ));
    }
    if !subject.contains_key("common-name") {
        return Err(Fido2Error::Policy(
            "packed attestation: attestation certificate missing 'common name'".to_string(),
        ));
    }

    match extensions.get("basic-constraints") {
        Some(ExtensionValue::BasicConstraints { ca: false, .. }) => {}
        _ => {
            return Err(Fido2Error::Policy(
                "packed attestation: basic constraints 'cA' must be 'false'".to_string(),
            ));
        }
    }

    if let Some(ExtensionValue::Aaguid(cert_aaguid)) = extensions.get("fido-aaguid") {
        let aaguid = ctx
            .authnr_data
            .data
            .attested
            .as_ref()
            .map(|a| a.aaguid.as_slice());
        if aaguid != Some(cert_aaguid.as_slice()) {
            return Err(Fido2Error::Policy(
                "packed attestation: authnrData AAGUID did not match AAGUID in attestation certificate"
                    .to_string(),
            ));
        }
    }

    ctx.audit.add_info("attestation-type", "basic");
    ctx.audit.journal("fmt");
    Ok(())
}

/// Self attestation: the statement is signed by the credential key itself.
fn validate_self(ctx: &mut AttestationContext, alg: AlgInfo, sig: &[u8]) -> Result<(), Fido2Error> {
    let pem = ctx
        .authnr_data
        .data
        .attested
        .as_ref()
        .map(|a| a.public_key_pem.clone())
        .ok_or_else(|| {
            Fido2Error::Input("packed attestation: missing credential public key".to_string())
        })?;
    let spki = pem_to_der(&pem)?;

    if !verify_spki_signature(&spki, alg.hash_alg, &signed_data(ctx), sig)? {
        return Err(signature_failed());
    }
    ctx.audit.journal("sig");
    ctx.audit.journal("alg");
    ctx.audit.journal("x5c");
    ctx.audit.add_info("attestation-type", "self");
    ctx.audit.journal("fmt");
    Ok(())
}
