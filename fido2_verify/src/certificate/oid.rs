//! Object identifiers and their names.

// FIDO
pub(crate) const FIDO_U2F_TRANSPORTS: &str = "1.3.6.1.4.1.45724.2.1.1";
pub(crate) const FIDO_GEN_CE_AAGUID: &str = "1.3.6.1.4.1.45724.1.1.4";

// Subject attributes
pub(crate) const COUNTRY_NAME: &str = "2.5.4.6";
pub(crate) const ORGANIZATION_NAME: &str = "2.5.4.10";
pub(crate) const ORGANIZATIONAL_UNIT_NAME: &str = "2.5.4.11";
pub(crate) const COMMON_NAME: &str = "2.5.4.3";

// Certificate extensions
pub(crate) const SUBJECT_KEY_IDENTIFIER: &str = "2.5.29.14";
pub(crate) const KEY_USAGE: &str = "2.5.29.15";
pub(crate) const SUBJECT_ALT_NAME: &str = "2.5.29.17";
pub(crate) const BASIC_CONSTRAINTS: &str = "2.5.29.19";
pub(crate) const CERTIFICATE_POLICIES: &str = "2.5.29.32";
pub(crate) const AUTHORITY_KEY_IDENTIFIER: &str = "2.5.29.35";
pub(crate) const EXT_KEY_USAGE: &str = "2.5.29.37";
pub(crate) const POLICY_QUALIFIERS: &str = "1.3.6.1.4.1.311.21.31";
pub(crate) const AUTHORITY_INFO_ACCESS: &str = "1.3.6.1.5.5.7.1.1";
pub(crate) const CA_ISSUERS: &str = "1.3.6.1.5.5.7.48.2";
pub(crate) const POLICY_QUALIFIER_UNOTICE: &str = "1.3.6.1.5.5.7.2.2";

// TPM
pub(crate) const TCG_KP_AIK_CERTIFICATE: &str = "2.23.133.8.3";
pub(crate) const TPM_MANUFACTURER: &str = "2.23.133.2.1";
pub(crate) const TPM_MODEL: &str = "2.23.133.2.2";
pub(crate) const TPM_VERSION: &str = "2.23.133.2.3";

// Yubico
pub(crate) const YUBICO_DEVICE_ID: &str = "1.3.6.1.4.1.41482.2";

// Key types, used when building test keys
#[cfg(test)]
pub(crate) const EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
#[cfg(test)]
pub(crate) const SECP256R1: &str = "1.2.840.10045.3.1.7";

/// Name of a known OID, `None` otherwise.
pub fn oid_name(oid: &str) -> Option<&'static str> {
    let name = match oid {
        FIDO_U2F_TRANSPORTS => "fido-u2f-transports",
        FIDO_GEN_CE_AAGUID => "fido-aaguid",
        COUNTRY_NAME => "country-name",
        ORGANIZATION_NAME => "organization-name",
        ORGANIZATIONAL_UNIT_NAME => "organizational-unit-name",
        COMMON_NAME => "common-name",
        SUBJECT_KEY_IDENTIFIER => "subject-key-identifier",
        KEY_USAGE => "key-usage",
        BASIC_CONSTRAINTS => "basic-constraints",
        AUTHORITY_KEY_IDENTIFIER => "authority-key-identifier",
        CERTIFICATE_POLICIES => "certificate-policies",
        POLICY_QUALIFIERS => "policy-qualifiers",
        EXT_KEY_USAGE => "ext-key-usage",
        SUBJECT_ALT_NAME => "subject-alt-name",
        AUTHORITY_INFO_ACCESS => "authority-info-access",
        CA_ISSUERS => "cert-authority-issuers",
        POLICY_QUALIFIER_UNOTICE => "policy-qualifier",
        TCG_KP_AIK_CERTIFICATE => "tcg-kp-aik-certificate",
        TPM_MANUFACTURER => "tcg-at-tpm-manufacturer",
        TPM_MODEL => "tcg-at-tpm-model",
        TPM_VERSION => "tcg-at-tpm-version",
        YUBICO_DEVICE_ID => "yubico-device-id",
        "1.3.6.1.4.1.41482.1.1" => "Security Key by Yubico",
        "1.3.6.1.4.1.41482.1.2" => "YubiKey NEO/NEO-n",
        "1.3.6.1.4.1.41482.1.3" => "YubiKey Plus",
        "1.3.6.1.4.1.41482.1.4" => "YubiKey Edge",
        "1.3.6.1.4.1.41482.1.5" => "YubiKey 4/YubiKey 4 Nano",
        _ => return None,
    };
    Some(name)
}

/// Name of an OID, or the dotted form itself when unknown.
pub fn resolve_oid(oid: &str) -> String {
    oid_name(oid).map_or_else(|| oid.to_string(), str::to_string)
}
