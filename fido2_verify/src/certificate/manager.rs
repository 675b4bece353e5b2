use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use x509_parser::{certificate::X509Certificate, time::ASN1Time};

use super::x509::{Certificate, Crl};
use crate::errors::Fido2Error;

/// Upper bound on issuer lookups while walking a chain.
const MAX_CHAIN_DEPTH: usize = 16;

/// Registry of trusted certificates keyed by the first subject attribute.
///
/// Roots and intermediates are added while the relying party is configured
/// (built-in roots, metadata attestation roots) and read during verification.
#[derive(Debug, Default)]
pub struct CertManager {
    certs: RwLock<BTreeMap<String, Certificate>>,
}

impl CertManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cert(&self, cert: Certificate) -> Result<(), Fido2Error> {
        let key = cert.registry_key().ok_or_else(|| {
            Fido2Error::CertParse("certificate subject has no attributes".to_string())
        })?;
        tracing::debug!("Adding certificate '{}' to the certificate store", key);
        self.certs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, cert);
        Ok(())
    }

    /// Snapshot of all registered certificates.
    pub fn certs(&self) -> BTreeMap<String, Certificate> {
        self.certs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn cert_by_key(&self, key: &str) -> Option<Certificate> {
        self.certs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.certs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn remove_all(&self) {
        self.certs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Validates `certs` (leaf first) up to one of `roots` at the current time.
    pub fn verify_cert_chain(
        certs: &[Certificate],
        roots: &[Certificate],
        crls: &[Crl],
    ) -> Result<(), Fido2Error> {
        Self::verify_cert_chain_at(certs, roots, crls, Utc::now())
    }

    /// Linear chain validation.
    ///
    /// Starting at the leaf, each certificate must be inside its validity
    /// window at `at`, must not be revoked by a CRL from its issuer, and must
    /// be signed by the next certificate found among `certs` or `roots` by
    /// issuer name. The walk succeeds once a root is reached.
    pub fn verify_cert_chain_at(
        certs: &[Certificate],
        roots: &[Certificate],
        crls: &[Crl],
        at: DateTime<Utc>,
    ) -> Result<(), Fido2Error> {
        if certs.is_empty() {
            return Err(Fido2Error::Input(
                "expected 'certs' to be non-empty Array".to_string(),
            ));
        }
        if roots.is_empty() {
            return Err(Fido2Error::Input(
                "expected 'roots' to be non-empty Array".to_string(),
            ));
        }

        let time = ASN1Time::from_timestamp(at.timestamp())
            .map_err(|e| Fido2Error::ChainValidation(format!("Failed to convert time: {e}")))?;

        let parsed_certs = certs
            .iter()
            .map(|c| Ok((c.der(), c.parsed()?)))
            .collect::<Result<Vec<_>, Fido2Error>>()?;
        let parsed_roots = roots
            .iter()
            .map(|c| Ok((c.der(), c.parsed()?)))
            .collect::<Result<Vec<_>, Fido2Error>>()?;

        let (mut current_der, mut current) = (parsed_certs[0].0, &parsed_certs[0].1);
        for _ in 0..MAX_CHAIN_DEPTH {
            check_validity(current, time)?;
            let issuer = parsed_roots
                .iter()
                .chain(parsed_certs.iter())
                .map(|(_, c)| c)
                .find(|c| c.subject().as_raw() == current.issuer().as_raw());
            for crl in crls {
                if crl.revokes(current, issuer)? {
                    return Err(Fido2Error::ChainValidation(
                        "One of certificates was revoked via CRL".to_string(),
                    ));
                }
            }

            if parsed_roots.iter().any(|(der, _)| *der == current_der) {
                return Ok(());
            }

            if let Some((_, root)) = parsed_roots
                .iter()
                .find(|(_, r)| r.subject().as_raw() == current.issuer().as_raw())
            {
                verify_issued_by(current, root)?;
                check_validity(root, time)?;
                tracing::debug!("Certificate chain reached trusted root {}", root.subject());
                return Ok(());
            }

            let next = parsed_certs.iter().find(|(der, c)| {
                *der != current_der && c.subject().as_raw() == current.issuer().as_raw()
            });
            match next {
                Some((der, issuer)) => {
                    verify_issued_by(current, issuer)?;
                    current_der = *der;
                    current = issuer;
                }
                None => break,
            }
        }

        Err(Fido2Error::ChainValidation(
            "No valid certificate paths found".to_string(),
        ))
    }
}

fn check_validity(cert: &X509Certificate<'_>, time: ASN1Time) -> Result<(), Fido2Error> {
    if !cert.validity().is_valid_at(time) {
        return Err(Fido2Error::ChainValidation(
            "The certificate is either not yet valid or expired".to_string(),
        ));
    }
    Ok(())
}

fn verify_issued_by(
    cert: &X509Certificate<'_>,
    issuer: &X509Certificate<'_>,
) -> Result<(), Fido2Error> {
    cert.verify_signature(Some(issuer.public_key()))
        .map_err(|e| {
            tracing::error!("Chain signature check failed for {}: {}", cert.subject(), e);
            Fido2Error::ChainValidation("Unable to verify certificate signature".to_string())
        })
}
