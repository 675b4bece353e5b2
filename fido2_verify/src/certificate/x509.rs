use std::collections::BTreeMap;

use serde::Serialize;
use x509_parser::{
    certificate::X509Certificate,
    der_parser::{ber::BerObjectContent, der::parse_der},
    extensions::{GeneralName as X509GeneralName, ParsedExtension, X509Extension},
    prelude::FromDer,
    revocation_list::CertificateRevocationList,
    x509::X509Name,
};

use super::manager::CertManager;
use super::oid::{self, resolve_oid};
use crate::errors::Fido2Error;
use crate::utils::{coerce_to_bytes, is_pem, pem_to_der, to_hex};

/// Outcome of checking a certificate against the issuer found in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuerStatus {
    /// Signature verified with the issuer certificate from the store
    Verified,
    /// Self-issued certificate whose signature verified with its own key
    SelfSigned,
    /// No issuer certificate registered; nothing was verified
    NotFound,
}

/// A general name as found in subjectAltName and authorityInfoAccess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GeneralName {
    DirectoryName(BTreeMap<String, String>),
    UniformResourceIdentifier(String),
}

impl GeneralName {
    pub fn directory_name(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            GeneralName::DirectoryName(attrs) => Some(attrs),
            GeneralName::UniformResourceIdentifier(_) => None,
        }
    }
}

/// Decoded value of a certificate extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExtensionValue {
    Transports(Vec<&'static str>),
    Aaguid(Vec<u8>),
    KeyUsage(Vec<&'static str>),
    BasicConstraints {
        ca: bool,
        #[serde(rename = "pathLenConstraint")]
        path_len_constraint: Option<u32>,
    },
    KeyIdentifier(Vec<u8>),
    AuthorityKeyIdentifier {
        #[serde(rename = "key-identifier")]
        key_identifier: Option<Vec<u8>>,
    },
    Names(Vec<String>),
    AltNames(Vec<GeneralName>),
    AccessDescriptions(BTreeMap<String, GeneralName>),
    Text(String),
    Raw(Vec<u8>),
}

/// Extensions of a certificate together with the decode failures that were
/// tolerated because the extension was not critical.
#[derive(Debug, Clone, Default)]
pub struct Extensions {
    pub values: BTreeMap<String, ExtensionValue>,
    pub warning: BTreeMap<String, String>,
}

impl Extensions {
    pub fn get(&self, name: &str) -> Option<&ExtensionValue> {
        self.values.get(name)
    }
}

/// An X.509 certificate held as DER and decoded on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self, Fido2Error> {
        if der.is_empty() {
            return Err(Fido2Error::CertParse("cert was empty (0 bytes)".to_string()));
        }
        let (rest, _) = X509Certificate::from_der(der)
            .map_err(|e| Fido2Error::CertParse(format!("error parsing ASN.1: {e}")))?;
        if !rest.is_empty() {
            return Err(Fido2Error::CertParse(format!(
                "cert had {} trailing bytes",
                rest.len()
            )));
        }
        Ok(Self { der: der.to_vec() })
    }

    /// Accepts PEM or base64/base64url encoded DER.
    pub fn parse(input: &str) -> Result<Self, Fido2Error> {
        let der = if is_pem(input) {
            pem_to_der(input)?
        } else {
            let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
            coerce_to_bytes(&compact)?
        };
        Self::from_der(&der)
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub(crate) fn parsed(&self) -> Result<X509Certificate<'_>, Fido2Error> {
        let (_, cert) = X509Certificate::from_der(&self.der)
            .map_err(|e| Fido2Error::CertParse(format!("error parsing ASN.1: {e}")))?;
        Ok(cert)
    }

    /// First attribute value of the issuer name.
    pub fn issuer_key(&self) -> Option<String> {
        let cert = self.parsed().ok()?;
        first_attribute(cert.issuer())
    }

    /// First attribute value of the subject name, the key used by [`CertManager`].
    pub fn registry_key(&self) -> Option<String> {
        let cert = self.parsed().ok()?;
        first_attribute(cert.subject())
    }

    /// X.509 version, 1-based.
    pub fn version(&self) -> Result<u32, Fido2Error> {
        Ok(self.parsed()?.version().0 + 1)
    }

    pub fn subject(&self) -> Result<BTreeMap<String, String>, Fido2Error> {
        let cert = self.parsed()?;
        Ok(name_to_map(cert.subject()))
    }

    pub fn is_self_issued(&self) -> Result<bool, Fido2Error> {
        let cert = self.parsed()?;
        Ok(cert.issuer().as_raw() == cert.subject().as_raw())
    }

    pub fn extensions(&self) -> Result<Extensions, Fido2Error> {
        let cert = self.parsed()?;
        let mut ret = Extensions::default();
        for ext in cert.extensions() {
            let id = ext.oid.to_id_string();
            match decode_extension(&id, ext) {
                Ok((name, value)) => {
                    ret.values.insert(name, value);
                }
                Err(e) if !ext.critical => {
                    tracing::warn!("Ignoring undecodable non-critical extension {}", id);
                    ret.warning
                        .insert("x509-extension-error".to_string(), format!("{id}: {}", e.message()));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(ret)
    }

    /// Verifies the signature against the issuer registered in `manager`.
    ///
    /// A self-issued certificate is verified with its own key. When the issuer
    /// is unknown nothing is verified and [`IssuerStatus::NotFound`] is returned
    /// so the caller can record the gap.
    pub fn verify(&self, manager: &CertManager) -> Result<IssuerStatus, Fido2Error> {
        let cert = self.parsed()?;
        let issuer = self.issuer_key().and_then(|key| manager.cert_by_key(&key));

        if let Some(issuer) = issuer {
            let issuer_cert = issuer.parsed()?;
            cert.verify_signature(Some(issuer_cert.public_key()))
                .map_err(|e| {
                    Fido2Error::Verification(format!(
                        "certificate signature did not verify with issuer: {e}"
                    ))
                })?;
            return Ok(IssuerStatus::Verified);
        }

        if cert.issuer().as_raw() == cert.subject().as_raw() {
            cert.verify_signature(None).map_err(|e| {
                Fido2Error::Verification(format!("self-signed certificate did not verify: {e}"))
            })?;
            return Ok(IssuerStatus::SelfSigned);
        }

        Ok(IssuerStatus::NotFound)
    }
}

fn attribute_value(attr: &x509_parser::x509::AttributeTypeAndValue<'_>) -> String {
    attr.as_str()
        .map(str::to_string)
        .unwrap_or_else(|_| to_hex(attr.attr_value().as_bytes()))
}

fn first_attribute(name: &X509Name<'_>) -> Option<String> {
    name.iter_attributes().next().map(attribute_value)
}

fn name_to_map(name: &X509Name<'_>) -> BTreeMap<String, String> {
    name.iter_attributes()
        .map(|attr| (resolve_oid(&attr.attr_type().to_id_string()), attribute_value(attr)))
        .collect()
}

fn cert_error(msg: impl Into<String>) -> Fido2Error {
    Fido2Error::CertParse(msg.into())
}

fn decode_extension(
    id: &str,
    ext: &X509Extension<'_>,
) -> Result<(String, ExtensionValue), Fido2Error> {
    let value = match id {
        oid::FIDO_U2F_TRANSPORTS => ExtensionValue::Transports(decode_u2f_transports(ext.value)?),
        oid::FIDO_GEN_CE_AAGUID => ExtensionValue::Aaguid(decode_fido_aaguid(ext.value)?),
        oid::EXT_KEY_USAGE => ExtensionValue::Names(decode_ext_key_usage(ext.value)?),
        oid::YUBICO_DEVICE_ID => {
            let device = std::str::from_utf8(ext.value)
                .map_err(|_| cert_error("yubico device id was not a string"))?;
            ExtensionValue::Text(resolve_oid(device))
        }
        _ => match ext.parsed_extension() {
            ParsedExtension::KeyUsage(ku) => {
                let mut usages = Vec::new();
                let flags = [
                    (ku.digital_signature(), "digitalSignature"),
                    (ku.non_repudiation(), "contentCommitment"),
                    (ku.key_encipherment(), "keyEncipherment"),
                    (ku.data_encipherment(), "dataEncipherment"),
                    (ku.key_agreement(), "keyAgreement"),
                    (ku.key_cert_sign(), "keyCertSign"),
                    (ku.crl_sign(), "cRLSign"),
                    (ku.encipher_only(), "encipherOnly"),
                    (ku.decipher_only(), "decipherOnly"),
                ];
                for (set, name) in flags {
                    if set {
                        usages.push(name);
                    }
                }
                ExtensionValue::KeyUsage(usages)
            }
            ParsedExtension::BasicConstraints(bc) => ExtensionValue::BasicConstraints {
                ca: bc.ca,
                path_len_constraint: bc.path_len_constraint,
            },
            ParsedExtension::SubjectKeyIdentifier(ki) => ExtensionValue::KeyIdentifier(ki.0.to_vec()),
            ParsedExtension::AuthorityKeyIdentifier(aki) => ExtensionValue::AuthorityKeyIdentifier {
                key_identifier: aki.key_identifier.as_ref().map(|ki| ki.0.to_vec()),
            },
            ParsedExtension::CertificatePolicies(policies) => ExtensionValue::Names(
                policies
                    .iter()
                    .map(|p| resolve_oid(&p.policy_id.to_id_string()))
                    .collect(),
            ),
            ParsedExtension::SubjectAlternativeName(san) => {
                let names = san
                    .general_names
                    .iter()
                    .map(|name| match name {
                        X509GeneralName::DirectoryName(_) => decode_general_name(name),
                        _ => Err(cert_error("expected all alternate names to be of general type")),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                ExtensionValue::AltNames(names)
            }
            ParsedExtension::AuthorityInfoAccess(aia) => {
                let mut descs = BTreeMap::new();
                for desc in &aia.accessdescs {
                    descs.insert(
                        resolve_oid(&desc.access_method.to_id_string()),
                        decode_general_name(&desc.access_location)?,
                    );
                }
                ExtensionValue::AccessDescriptions(descs)
            }
            ParsedExtension::ParseError { error } => {
                return Err(cert_error(format!("could not decode extension: {error}")));
            }
            _ => ExtensionValue::Raw(ext.value.to_vec()),
        },
    };
    Ok((resolve_oid(id), value))
}

fn decode_general_name(name: &X509GeneralName<'_>) -> Result<GeneralName, Fido2Error> {
    let unsupported = match name {
        X509GeneralName::DirectoryName(dn) => {
            return Ok(GeneralName::DirectoryName(name_to_map(dn)));
        }
        X509GeneralName::URI(uri) => {
            return Ok(GeneralName::UniformResourceIdentifier(uri.to_string()));
        }
        X509GeneralName::OtherName(..) => "other name",
        X509GeneralName::RFC822Name(_) => "rfc822Name",
        X509GeneralName::DNSName(_) => "dNSName",
        X509GeneralName::X400Address(_) => "x400Address",
        X509GeneralName::EDIPartyName(_) => "ediPartyName",
        X509GeneralName::IPAddress(_) => "iPAddress",
        X509GeneralName::RegisteredID(_) => "registeredID",
        _ => return Err(cert_error("malformed general name in x509 certificate")),
    };
    Err(cert_error(format!("general name '{unsupported}' not supported")))
}

/// FIDO U2F transports: a DER BIT STRING `03 02 <unused bits> <bits>`.
pub(crate) fn decode_u2f_transports(raw: &[u8]) -> Result<Vec<&'static str>, Fido2Error> {
    if raw.len() != 4 {
        return Err(cert_error("u2fRawTransports was malformatted"));
    }
    if raw[0] != 0x03 || raw[1] != 0x02 || raw[2] > 7 {
        return Err(cert_error("u2fRawTransports had unknown data"));
    }
    let unused_bits = raw[2];
    let bit_count = 8 - i32::from(unused_bits) - 1;
    let mut bits = raw[3] >> unused_bits;
    let mut transports = Vec::new();
    for i in (0..=bit_count).rev() {
        if bits & 0x1 == 1 {
            let name = match i {
                0 => "bluetooth-classic",
                1 => "bluetooth-low-energy",
                2 => "usb",
                3 => "nfc",
                4 => "usb-internal",
                _ => {
                    return Err(cert_error(format!("unknown U2F transport type: {bits}")));
                }
            };
            transports.push(name);
        }
        bits >>= 1;
    }
    Ok(transports)
}

/// id-fido-gen-ce-aaguid: an OCTET STRING of exactly 16 bytes.
pub(crate) fn decode_fido_aaguid(raw: &[u8]) -> Result<Vec<u8>, Fido2Error> {
    if raw.len() != 18 {
        return Err(cert_error(format!(
            "AAGUID ASN.1 was wrong size. Should be 18, got {}",
            raw.len()
        )));
    }
    if raw[0] != 0x04 {
        return Err(cert_error("AAGUID ASN.1 should start with 0x04 (octet string)"));
    }
    if raw[1] != 0x10 {
        return Err(cert_error("AAGUID ASN.1 should have length 16"));
    }
    Ok(raw[2..].to_vec())
}

fn decode_ext_key_usage(raw: &[u8]) -> Result<Vec<String>, Fido2Error> {
    let (_, parsed) =
        parse_der(raw).map_err(|_| cert_error("expected extended key purposes to be an Array"))?;
    match parsed.content {
        BerObjectContent::Sequence(ref items) => items
            .iter()
            .map(|item| match item.content {
                BerObjectContent::OID(ref oid) => Ok(resolve_oid(&oid.to_id_string())),
                _ => Err(cert_error("expected extended key purpose to be an OID")),
            })
            .collect(),
        _ => Err(cert_error("expected extended key purposes to be an Array")),
    }
}

/// A certificate revocation list held as DER.
#[derive(Debug, Clone)]
pub struct Crl {
    der: Vec<u8>,
}

impl Crl {
    pub fn from_der(der: &[u8]) -> Result<Self, Fido2Error> {
        let (rest, _) = CertificateRevocationList::from_der(der)
            .map_err(|e| Fido2Error::CertParse(format!("error parsing CRL: {e}")))?;
        if !rest.is_empty() {
            return Err(Fido2Error::CertParse(format!(
                "CRL had {} trailing bytes",
                rest.len()
            )));
        }
        Ok(Self { der: der.to_vec() })
    }

    /// Accepts PEM or base64/base64url encoded DER.
    pub fn parse(input: &str) -> Result<Self, Fido2Error> {
        let der = if is_pem(input) {
            pem_to_der(input)?
        } else {
            let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
            coerce_to_bytes(&compact)?
        };
        Self::from_der(&der)
    }

    /// Whether this list revokes `cert`.
    ///
    /// A list whose issuer name differs from the certificate's issuer does not
    /// apply. A list that does apply must carry a valid signature from `issuer`.
    pub(crate) fn revokes(
        &self,
        cert: &X509Certificate<'_>,
        issuer: Option<&X509Certificate<'_>>,
    ) -> Result<bool, Fido2Error> {
        let (_, crl) = CertificateRevocationList::from_der(&self.der)
            .map_err(|e| Fido2Error::CertParse(format!("error parsing CRL: {e}")))?;
        if crl.issuer().as_raw() != cert.issuer().as_raw() {
            return Ok(false);
        }
        let Some(issuer) = issuer else {
            return Err(Fido2Error::ChainValidation(
                "CRL issuer certificate not found".to_string(),
            ));
        };
        crl.verify_signature(issuer.public_key()).map_err(|e| {
            tracing::error!("CRL signature check failed for {}: {}", crl.issuer(), e);
            Fido2Error::ChainValidation("Unable to verify CRL signature".to_string())
        })?;
        Ok(crl
            .iter_revoked_certificates()
            .any(|revoked| revoked.raw_serial() == cert.raw_serial()))
    }
}
