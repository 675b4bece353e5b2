use ciborium::value::Value as CborValue;

use super::utils::{
    client_data_hash, ensure_default_roots, get_bytes, get_x5c, record_extensions,
    verify_attestation_cert,
};
use super::{AttestationFormat, AttestationStatement};
use crate::audit::AttestationContext;
use crate::certificate::Certificate;
use crate::crypto::{HashAlg, verify_with_certificate};
use crate::errors::Fido2Error;

/// `fido-u2f`: attestation from a legacy U2F authenticator.
#[derive(Debug, Clone, Copy, Default)]
pub struct FidoU2fFormat;

impl AttestationFormat for FidoU2fFormat {
    fn name(&self) -> &str {
        "fido-u2f"
    }

    fn parse(&self, att_stmt: &[(CborValue, CborValue)]) -> Result<AttestationStatement, Fido2Error> {
        let mut x5c = get_x5c(att_stmt, "expected U2F attestation x5c field to be of type Array")?
            .ok_or_else(|| {
                Fido2Error::Input(
                    "expected U2F attestation x5c field to be of type Array".to_string(),
                )
            })?;
        if x5c.is_empty() {
            return Err(Fido2Error::Input("no certificates in U2F x5c field".to_string()));
        }
        let att_cert = x5c.remove(0);
        let sig = get_bytes(att_stmt, "sig").ok_or_else(|| {
            Fido2Error::Input("expected U2F attestation sig field to be ArrayBuffer".to_string())
        })?;
        Ok(AttestationStatement::FidoU2f { att_cert, x5c, sig })
    }

    fn validate(&self, ctx: &mut AttestationContext) -> Result<(), Fido2Error> {
        let AttestationStatement::FidoU2f { att_cert, x5c, sig } = ctx.authnr_data.statement.clone()
        else {
            return Err(Fido2Error::Input(
                "fido-u2f attestation: statement is not a fido-u2f statement".to_string(),
            ));
        };

        // U2F devices send a single certificate
        if !x5c.is_empty() {
            return Err(Fido2Error::ChainValidation("cert chain not validated".to_string()));
        }
        ctx.audit.journal("x5c");

        ensure_default_roots(ctx)?;
        let cert = Certificate::from_der(&att_cert)?;
        verify_attestation_cert(ctx, &cert)?;
        if cert.version()? != 3 {
            return Err(Fido2Error::Policy(
                "expected U2F attestation certificate to be x.509v3".to_string(),
            ));
        }
        record_extensions(ctx, &cert.extensions()?)?;
        ctx.audit.journal("attCert");

        let attested = ctx.authnr_data.data.attested.as_ref().ok_or_else(|| {
            Fido2Error::Input("U2F attestation: missing attested credential data".to_string())
        })?;
        let jwk = &attested.public_key_jwk;
        if jwk.kty() != Some("EC") || jwk.crv() != Some("P-256") {
            return Err(Fido2Error::UnsupportedKey("bad U2F key type".to_string()));
        }
        let x = jwk.bytes("x")?;
        if x.len() != 32 {
            return Err(Fido2Error::Decode(
                "U2F public key x component was wrong size".to_string(),
            ));
        }
        let y = jwk.bytes("y")?;
        if y.len() != 32 {
            return Err(Fido2Error::Decode(
                "U2F public key y component was wrong size".to_string(),
            ));
        }

        let mut verification_data = vec![0x00];
        verification_data.extend_from_slice(&ctx.authnr_data.data.rp_id_hash);
        verification_data.extend(client_data_hash(ctx));
        verification_data.extend_from_slice(&attested.cred_id);
        verification_data.push(0x04);
        verification_data.extend(x);
        verification_data.extend(y);

        if !verify_with_certificate(&att_cert, Some(HashAlg::Sha256), &verification_data, &sig)? {
            return Err(Fido2Error::Verification(
                "U2F attestation signature verification failed".to_string(),
            ));
        }
        ctx.audit.journal("sig");
        ctx.audit.add_info("attestation-type", "basic");
        ctx.audit.journal("fmt");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sha256;
    use crate::test_utils::{
        CertSpec, TestKey, create_test_attestation_context, create_test_auth_data,
        create_test_cert, create_test_client_data,
    };

    const CRED_ID: [u8; 8] = [7; 8];

    fn u2f_statement(sig: Vec<u8>, certs: Vec<Vec<u8>>) -> CborValue {
        CborValue::Map(vec![
            (CborValue::Text("sig".into()), CborValue::Bytes(sig)),
            (
                CborValue::Text("x5c".into()),
                CborValue::Array(certs.into_iter().map(CborValue::Bytes).collect()),
            ),
        ])
    }

    /// Builds a U2F registration signed by a fresh attestation key.
    fn u2f_context(tamper: bool, extra_cert: bool) -> Result<AttestationContext, Fido2Error> {
        let cred_key = TestKey::generate_p256();
        let att_key = TestKey::generate_p256();
        let att_cert = create_test_cert(&CertSpec::leaf("Test U2F Device"), &att_key, &att_key);

        let auth_data = create_test_auth_data("example.com", 0x41, 0, [0; 16], &CRED_ID, &cred_key.cose_key());
        let client_data =
            create_test_client_data("webauthn.create", "Y2hhbGxlbmdl", "https://example.com");

        let mut data = vec![0x00];
        data.extend(sha256(b"example.com"));
        data.extend(sha256(&client_data));
        data.extend_from_slice(&CRED_ID);
        data.extend(cred_key.public_point());
        if tamper {
            data[1] ^= 0xff;
        }
        let sig = att_key.sign(&data);

        let mut certs = vec![att_cert];
        if extra_cert {
            certs.push(certs[0].clone());
        }
        let mut ctx = create_test_attestation_context(
            "fido-u2f",
            u2f_statement(sig, certs),
            &auth_data,
            client_data,
            CRED_ID.to_vec(),
        )?;
        FidoU2fFormat.validate(&mut ctx)?;
        Ok(ctx)
    }

    #[test]
    fn test_u2f_attestation() {
        let ctx = u2f_context(false, false).unwrap();
        assert_eq!(ctx.audit.info["attestation-type"], "basic");
        for field in ["x5c", "attCert", "sig", "fmt"] {
            assert!(ctx.audit.is_journaled(field), "{field}");
        }
    }

    #[test]
    fn test_u2f_bad_signature() {
        let err = u2f_context(true, false).unwrap_err();
        assert_eq!(err.message(), "U2F attestation signature verification failed");
    }

    #[test]
    fn test_u2f_chain_rejected() {
        let err = u2f_context(false, true).unwrap_err();
        assert!(matches!(err, Fido2Error::ChainValidation(_)));
        assert_eq!(err.message(), "cert chain not validated");
    }

    #[test]
    fn test_u2f_empty_x5c() {
        let stmt = vec![
            (CborValue::Text("sig".into()), CborValue::Bytes(vec![1])),
            (CborValue::Text("x5c".into()), CborValue::Array(vec![])),
        ];
        let err = FidoU2fFormat.parse(&stmt).unwrap_err();
        assert_eq!(err.message(), "no certificates in U2F x5c field");
    }

    #[test]
    fn test_u2f_x5c_must_be_array() {
        let stmt = vec![
            (CborValue::Text("sig".into()), CborValue::Bytes(vec![1])),
            (CborValue::Text("x5c".into()), CborValue::Bytes(vec![1])),
        ];
        let err = FidoU2fFormat.parse(&stmt).unwrap_err();
        assert_eq!(err.message(), "expected U2F attestation x5c field to be of type Array");
    }
}
