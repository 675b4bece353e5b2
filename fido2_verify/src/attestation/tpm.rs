use ciborium::value::Value as CborValue;

use super::utils::{
    alg_info, get_alg, get_bytes, get_text, get_x5c, record_extensions, signed_data,
    verify_attestation_cert,
};
use super::{AttestationFormat, AttestationStatement};
use crate::audit::AttestationContext;
use crate::certificate::{Certificate, ExtensionValue};
use crate::codec::tpm::{TPM_GENERATED_VALUE, TPM_ST_ATTEST_CERTIFY, tpm_hash};
use crate::codec::{CertInfo, PubArea};
use crate::crypto::verify_with_certificate;
use crate::errors::Fido2Error;

/// `tpm`: attestation by a TPM 2.0 attestation identity key.
#[derive(Debug, Clone, Copy, Default)]
pub struct TpmFormat;

impl AttestationFormat for TpmFormat {
    fn name(&self) -> &str {
        "tpm"
    }

    fn parse(&self, att_stmt: &[(CborValue, CborValue)]) -> Result<AttestationStatement, Fido2Error> {
        if get_bytes(att_stmt, "ecdaaKeyId").is_some() {
            return Err(Fido2Error::NotImplemented(
                "tpm attestation: ECDAA not implemented, please open a GitHub issue.".to_string(),
            ));
        }

        let ver = get_text(att_stmt, "ver").ok_or_else(|| {
            Fido2Error::Input("tpm attestation: expected 'ver' to be a String".to_string())
        })?;
        let alg_id = get_alg(att_stmt).ok_or_else(|| {
            Fido2Error::Input("tpm attestation: expected 'alg' to be a number".to_string())
        })?;
        let mut x5c = get_x5c(att_stmt, "tpm attestation: expected 'x5c' to be an Array")?
            .filter(|certs| !certs.is_empty())
            .ok_or_else(|| {
                Fido2Error::Input("tpm attestation: no certificates in x5c field".to_string())
            })?;
        let att_cert = x5c.remove(0);
        let sig = get_bytes(att_stmt, "sig").ok_or_else(|| {
            Fido2Error::Input("tpm attestation: expected 'sig' to be ArrayBuffer".to_string())
        })?;
        let cert_info = get_bytes(att_stmt, "certInfo").ok_or_else(|| {
            Fido2Error::Input("tpm attestation: expected 'certInfo' to be ArrayBuffer".to_string())
        })?;
        let pub_area = get_bytes(att_stmt, "pubArea").ok_or_else(|| {
            Fido2Error::Input("tpm attestation: expected 'pubArea' to be ArrayBuffer".to_string())
        })?;

        Ok(AttestationStatement::Tpm {
            ver,
            alg: alg_info(alg_id),
            att_cert,
            x5c,
            sig,
            cert_info: CertInfo::parse(&cert_info)?,
            pub_area: PubArea::parse(&pub_area)?,
        })
    }

    fn validate(&self, ctx: &mut AttestationContext) -> Result<(), Fido2Error> {
        let AttestationStatement::Tpm {
            ver,
            alg,
            att_cert,
            sig,
            cert_info,
            pub_area,
            ..
        } = ctx.authnr_data.statement.clone()
        else {
            return Err(Fido2Error::Input(
                "tpm attestation: statement is not a tpm statement".to_string(),
            ));
        };

        if ver != "2.0" {
            return Err(Fido2Error::Policy(
                "tpm attestation: expected TPM version 2.0".to_string(),
            ));
        }
        ctx.audit.journal("ver");

        check_public_key_matches(ctx, &pub_area)?;

        if cert_info.magic != TPM_GENERATED_VALUE {
            return Err(Fido2Error::Verification(format!(
                "tpm attestation: certInfo had bad magic number: {:x}",
                cert_info.magic
            )));
        }
        if cert_info.type_ != TPM_ST_ATTEST_CERTIFY {
            return Err(Fido2Error::Verification(format!(
                "tpm attestation: got wrong type. expected 'TPM_ST_ATTEST_CERTIFY' got: {}",
                cert_info.type_
            )));
        }

        let hash = alg.hash_alg.ok_or_else(|| {
            Fido2Error::UnsupportedKey(format!("tpm attestation: unknown algorithm: {}", alg.id))
        })?;
        ctx.audit.journal("alg");

        if hash.digest(&signed_data(ctx)) != cert_info.extra_data {
            return Err(Fido2Error::Verification(
                "extraData hash did not match authnrData + clientDataHash hashed".to_string(),
            ));
        }

        // certInfo.attested.name = nameAlg || H_nameAlg(pubArea)
        let name_hash = tpm_hash(pub_area.name_alg)?;
        if cert_info.name_hash_type != pub_area.name_alg
            || name_hash.digest(&pub_area.raw) != cert_info.name
        {
            return Err(Fido2Error::Verification(
                "pubAreaName hash did not match hash of publicArea".to_string(),
            ));
        }
        ctx.audit.journal("pubArea");

        if !verify_with_certificate(&att_cert, Some(hash), &cert_info.raw, &sig)? {
            return Err(Fido2Error::Verification(
                "TPM attestation signature verification failed".to_string(),
            ));
        }
        ctx.audit.journal("sig");
        ctx.audit.journal("certInfo");

        validate_aik_certificate(ctx, &att_cert)?;

        ctx.audit.add_info("attestation-type", "AttCA");
        ctx.audit.journal("fmt");
        Ok(())
    }
}

/// The credential public key must be the RSA key described by pubArea.
fn check_public_key_matches(ctx: &AttestationContext, pub_area: &PubArea) -> Result<(), Fido2Error> {
    let jwk = ctx
        .authnr_data
        .data
        .attested
        .as_ref()
        .map(|a| &a.public_key_jwk)
        .ok_or_else(|| {
            Fido2Error::Input("tpm attestation: missing credential public key".to_string())
        })?;
    if jwk.kty() != Some("RSA") {
        return Err(Fido2Error::UnsupportedKey(
            "tpm attestation: only RSA keys are currently supported".to_string(),
        ));
    }

    let e = jwk.bytes("e")?;
    let exponent = e
        .iter()
        .try_fold(0u64, |acc, b| acc.checked_mul(256).map(|v| v + u64::from(*b)));
    if exponent != Some(u64::from(pub_area.exponent)) {
        return Err(Fido2Error::Verification(
            "tpm attestation: RSA exponents of WebAuthn credentialPublicKey and TPM publicArea did not match"
                .to_string(),
        ));
    }

    if jwk.bytes("n")? != pub_area.unique {
        return Err(Fido2Error::Verification(
            "tpm attestation: RSA 'n' of WebAuthn credentialPublicKey and TPM publicArea did not match"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_aik_certificate(ctx: &mut AttestationContext, att_cert: &[u8]) -> Result<(), Fido2Error> {
    let cert = Certificate::from_der(att_cert)?;
    verify_attestation_cert(ctx, &cert)?;

    if cert.version()? != 3 {
        return Err(Fido2Error::Policy(
            "expected TPM attestation certificate to be x.509v3".to_string(),
        ));
    }
    if !cert.subject()?.is_empty() {
        return Err(Fido2Error::Policy(
            "tpm attestation: attestation certificate MUST have empty subject".to_string(),
        ));
    }

    let extensions = cert.extensions()?;
    record_extensions(ctx, &extensions)?;

    let Some(ExtensionValue::AltNames(alt_names)) = extensions.get("subject-alt-name") else {
        return Err(Fido2Error::Policy(
            "tpm attestation: Subject Alternative Name extension MUST be set as defined in [TPMv2-EK-Profile] section 3.2.9"
                .to_string(),
        ));
    };
    let directory = alt_names
        .iter()
        .find_map(|name| name.directory_name())
        .ok_or_else(|| {
            Fido2Error::Policy(
                "tpm attestation: subject alternative name did not contain directory name"
                    .to_string(),
            )
        })?;
    for (attr, label) in [
        ("tcg-at-tpm-manufacturer", "manufacturer"),
        ("tcg-at-tpm-model", "model number"),
        ("tcg-at-tpm-version", "firmware version"),
    ] {
        if !directory.contains_key(attr) {
            return Err(Fido2Error::Policy(format!(
                "tpm attestation: subject alternative name did not list {label}"
            )));
        }
    }

    let has_aik_usage = matches!(
        extensions.get("ext-key-usage"),
        Some(ExtensionValue::Names(names)) if names.iter().any(|n| n == "tcg-kp-aik-certificate")
    );
    if !has_aik_usage {
        return Err(Fido2Error::Policy(
            "tpm attestation: the Extended Key Usage extension MUST contain 'tcg-kp-aik-certificate'"
                .to_string(),
        ));
    }

    if !matches!(
        extensions.get("basic-constraints"),
        Some(ExtensionValue::BasicConstraints { ca: false, .. })
    ) {
        return Err(Fido2Error::Policy(
            "tpm attestation: the Basic Constraints extension MUST have the CA component set to false"
                .to_string(),
        ));
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
                "tpm attestation: authnrData AAGUID did not match AAGUID in attestation certificate"
                    .to_string(),
            ));
        }
    }

    ctx.audit.journal("x5c");
    ctx.audit.journal("attCert");
    Ok(())
}
