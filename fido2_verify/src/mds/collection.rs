use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use subtle::ConstantTimeEq;

use super::entry::{MdsEntry, MdsEntryId};
use crate::certificate::{CertManager, Certificate, Crl, roots};
use crate::crypto::{sha256, verify_x5c_jws};
use crate::errors::Fido2Error;
use crate::utils::{base64_encode, base64url_decode, coerce_to_bytes, to_hex};

const TOC_ERROR_PREFIX: &str = "could not parse and validate MDS TOC: ";
const TOC_SIGNER_3_KID: &str = "Metadata TOC Signer 3";

/// One entry of the metadata table of contents.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct TocEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aaid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aaguid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation_certificate_key_identifiers: Option<Vec<String>>,
    /// base64url SHA-256 of the statement (MDS v2).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub status_reports: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_of_last_status_change: Option<String>,
    /// Inline statement (MDS v3).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_statement: Option<Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl TocEntry {
    pub(crate) fn to_map(&self) -> Result<Map<String, Value>, Fido2Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    fn id(&self) -> Result<MdsEntryId, Fido2Error> {
        MdsEntryId::from_object(&self.to_map()?)
    }
}

/// Payload of the metadata TOC JWS.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MdsToc {
    pub no: Option<u64>,
    pub next_update: Option<String>,
    pub legal_header: Option<String>,
    pub entries: Vec<TocEntry>,
    /// The JWS the TOC was read from.
    #[serde(skip)]
    pub raw: String,
}

#[derive(Debug, Clone)]
struct PendingEntry {
    id: MdsEntryId,
    statement: Map<String, Value>,
    raw: String,
}

/// base64 of the JSON encoding with characters U+0080 to U+FFFF removed, the
/// form MDS v3 statements are hashed in.
fn statement_to_b64(statement: &Value) -> Result<String, Fido2Error> {
    let json = serde_json::to_string(statement)?;
    let ascii: String = json
        .chars()
        .filter(|c| !('\u{0080}'..='\u{FFFF}').contains(c))
        .collect();
    Ok(base64_encode(ascii.as_bytes()))
}

/// Metadata statements from one source, checked against a signed TOC.
///
/// Downloading is left to the caller: add the TOC with [`add_toc`], add each
/// statement with [`add_entry`], then [`validate`]. Only validated entries
/// are returned by [`find_entry`].
///
/// [`add_toc`]: MdsCollection::add_toc
/// [`add_entry`]: MdsCollection::add_entry
/// [`validate`]: MdsCollection::validate
/// [`find_entry`]: MdsCollection::find_entry
#[derive(Debug, Clone)]
pub struct MdsCollection {
    name: String,
    toc: Option<MdsToc>,
    pending: BTreeMap<String, PendingEntry>,
    entries: BTreeMap<String, MdsEntry>,
}

impl MdsCollection {
    pub fn new(name: &str) -> Result<Self, Fido2Error> {
        if name.is_empty() {
            return Err(Fido2Error::Input(
                "expected 'collectionName' to be non-empty string".to_string(),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            toc: None,
            pending: BTreeMap::new(),
            entries: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Verifies and stores the TOC.
    ///
    /// The JWS must verify with the key of the first `x5c` certificate and the
    /// `x5c` chain must lead to one of `roots`. Without `roots` the built-in
    /// MDS root selected by the JWS `kid` is used.
    pub fn add_toc(
        &mut self,
        toc: &str,
        roots: Option<&[Certificate]>,
        crls: &[Crl],
    ) -> Result<&MdsToc, Fido2Error> {
        if toc.is_empty() {
            return Err(Fido2Error::Input(
                "expected MDS TOC to be non-empty string".to_string(),
            ));
        }

        let jws = verify_x5c_jws(toc, TOC_ERROR_PREFIX)?;
        let mut parsed: MdsToc = serde_json::from_value(jws.claims)
            .map_err(|e| Fido2Error::Decode(format!("{TOC_ERROR_PREFIX}{e}")))?;

        let default_roots;
        let roots = match roots {
            Some(roots) => roots,
            None => {
                let pem = if jws.header.kid.as_deref() == Some(TOC_SIGNER_3_KID) {
                    roots::MDS_TOC_SIGNER_ROOT
                } else {
                    roots::GLOBALSIGN_ROOT_R3
                };
                default_roots = [Certificate::parse(pem)?];
                &default_roots[..]
            }
        };

        let chain = jws
            .certs
            .iter()
            .map(|der| Certificate::from_der(der))
            .collect::<Result<Vec<_>, _>>()?;
        CertManager::verify_cert_chain(&chain, roots, crls)?;

        if parsed.entries.iter().any(|e| e.metadata_statement.is_none()) {
            tracing::warn!(
                "MDS TOC for '{}' has entries without metadataStatement; MDS v2 is deprecated",
                self.name
            );
        }
        tracing::info!(
            "Added MDS TOC #{} with {} entries to '{}'",
            parsed.no.unwrap_or_default(),
            parsed.entries.len(),
            self.name
        );

        parsed.raw = toc.to_string();
        Ok(self.toc.insert(parsed))
    }

    pub fn toc(&self) -> Option<&MdsToc> {
        self.toc.as_ref()
    }

    /// Adds a base64url encoded statement. It becomes visible to
    /// [`find_entry`](Self::find_entry) after [`validate`](Self::validate).
    pub fn add_entry(&mut self, entry: &str) -> Result<(), Fido2Error> {
        if entry.is_empty() {
            return Err(Fido2Error::Input(
                "expected MDS entry to be non-empty string".to_string(),
            ));
        }

        let decoded = coerce_to_bytes(entry)?;
        let value: Value = serde_json::from_slice(&decoded)
            .map_err(|e| Fido2Error::Decode(format!("could not parse MDS entry: {e}")))?;

        let (statement, raw) = match value.get("metadataStatement") {
            Some(inline) => (inline.clone(), statement_to_b64(inline)?),
            None => (value, entry.to_string()),
        };
        let Value::Object(statement) = statement else {
            return Err(Fido2Error::Input(
                "expected MDS entry to be a JSON object".to_string(),
            ));
        };

        let id = MdsEntryId::from_object(&statement)?;
        tracing::debug!("Adding MDS entry '{}' to '{}'", id, self.name);
        self.pending.insert(
            id.to_string(),
            PendingEntry { id, statement, raw },
        );
        Ok(())
    }

    /// Checks every pending entry against the TOC and makes it searchable.
    ///
    /// Each entry needs exactly one TOC entry with the same id and its hash
    /// must match the TOC. Nothing is added, neither entries nor their
    /// attestation roots, if any entry fails.
    pub fn validate(&mut self, cert_manager: &CertManager) -> Result<(), Fido2Error> {
        let toc = self.toc.as_ref().ok_or_else(|| {
            Fido2Error::Mds("add MDS TOC before attempting to validate MDS collection".to_string())
        })?;
        if self.pending.is_empty() {
            return Err(Fido2Error::Mds(
                "add MDS entries before attempting to validate MDS collection".to_string(),
            ));
        }

        let mut validated = Vec::with_capacity(self.pending.len());
        let mut attestation_roots = Vec::new();
        for pending in self.pending.values() {
            let mut matching = Vec::new();
            for toc_entry in &toc.entries {
                if toc_entry.id()?.matches(&pending.id) {
                    matching.push(toc_entry);
                }
            }
            let [toc_entry] = matching.as_slice() else {
                return Err(Fido2Error::Mds(format!(
                    "found the wrong number of TOC entries for '{}': {}",
                    pending.id,
                    matching.len()
                )));
            };

            let entry_hash = sha256(pending.raw.as_bytes());
            let toc_hash = match (&toc_entry.hash, &toc_entry.metadata_statement) {
                (Some(hash), _) => coerce_to_bytes(hash)?,
                (None, Some(statement)) => sha256(statement_to_b64(statement)?.as_bytes()),
                (None, None) => Vec::new(),
            };
            if !bool::from(entry_hash.ct_eq(&toc_hash)) {
                return Err(Fido2Error::Verification(
                    "MDS entry hash did not match corresponding hash in MDS TOC".to_string(),
                ));
            }

            let (entry, entry_roots) = MdsEntry::new(&pending.statement, toc_entry, &self.name)?;
            attestation_roots.extend(entry_roots);
            validated.push((pending.id.keys(), entry));
        }

        for cert in attestation_roots {
            cert_manager.add_cert(cert)?;
        }

        for (keys, entry) in validated {
            for key in keys {
                self.entries.insert(key, entry.clone());
            }
        }
        self.pending.clear();
        tracing::info!("MDS collection '{}' has {} entries", self.name, self.entries.len());
        Ok(())
    }

    /// Looks up a validated entry by AAID, AAGUID (with or without dashes) or
    /// key identifier. A base64url id is also tried as hex.
    pub fn find_entry(&self, id: &str) -> Option<&MdsEntry> {
        if let Some(entry) = self.entries.get(&id.replace('-', "")) {
            return Some(entry);
        }
        let bytes = base64url_decode(id).ok()?;
        self.entries.get(&to_hex(&bytes))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CertSpec, TestKey, create_test_cert, create_test_jws};
    use crate::utils::base64url_encode;
    use serde_json::json;

    const AAGUID: &str = "0132d110-bf4e-4208-a403-ab4f5f12efe5";
    const KEY_ID: &str = "923881fe2f214ee465484371aeb72e97f5a58e0a";

    struct Fixture {
        root: Certificate,
        signer_key: TestKey,
        signer: Vec<u8>,
    }

    impl Fixture {
        fn new() -> Self {
            let root_key = TestKey::generate_p256();
            let signer_key = TestKey::generate_p256();
            let root = create_test_cert(&CertSpec::ca("Test MDS Root"), &root_key, &root_key);
            let signer = create_test_cert(
                &CertSpec::leaf("Test MDS Signer").issued_by("Test MDS Root"),
                &signer_key,
                &root_key,
            );
            Self {
                root: Certificate::from_der(&root).unwrap(),
                signer_key,
                signer,
            }
        }

        fn jws(&self, payload: &Value) -> String {
            create_test_jws(payload, &self.signer_key, &[self.signer.clone()], None)
        }

        fn collection_with(&self, payload: &Value) -> MdsCollection {
            let mut collection = MdsCollection::new("test").unwrap();
            collection
                .add_toc(&self.jws(payload), Some(&[self.root.clone()]), &[])
                .unwrap();
            collection
        }
    }

    fn u2f_statement() -> Value {
        json!({
            "attestationCertificateKeyIdentifiers": [KEY_ID],
            "description": "Test U2F Key",
            "protocolFamily": "u2f",
            "attestationTypes": [0x3E07],
            "authenticationAlgorithm": 1,
            "publicKeyAlgAndEncoding": 0x0100,
            "attachmentHint": 2,
            "keyProtection": 0x000A,
            "matcherProtection": 4,
            "userVerificationDetails": [[{"userVerification": 1}]]
        })
    }

    fn fido2_statement() -> Value {
        json!({
            "aaguid": AAGUID,
            "description": "Test FIDO2 Key \u{00e9}",
            "protocolFamily": "fido2",
            "attestationTypes": ["basic_full"],
            "authenticationAlgorithms": ["secp256r1_ecdsa_sha256_raw"],
            "publicKeyAlgAndEncodings": ["cose"],
            "attachmentHint": ["external"],
            "keyProtection": ["hardware"],
            "matcherProtection": ["on_chip"],
            "userVerificationDetails": [[{"userVerificationMethod": "presence_internal"}]]
        })
    }

    /// base64url text of a statement served from a URL (MDS v2)
    fn encoded(statement: &Value) -> String {
        base64url_encode(serde_json::to_string(statement).unwrap().as_bytes())
    }

    fn v2_toc(statement_b64: &str) -> Value {
        json!({
            "no": 7,
            "nextUpdate": "2030-01-01",
            "entries": [{
                "attestationCertificateKeyIdentifiers": [KEY_ID],
                "hash": base64url_encode(&sha256(statement_b64.as_bytes())),
                "url": "https://mds.example.com/metadata/1",
                "statusReports": [{"status": "FIDO_CERTIFIED"}],
                "timeOfLastStatusChange": "2020-01-01"
            }]
        })
    }

    fn v3_toc() -> Value {
        json!({
            "no": 8,
            "entries": [{
                "aaguid": AAGUID,
                "metadataStatement": fido2_statement(),
                "statusReports": []
            }]
        })
    }

    mod toc_tests {
        use super::*;

        #[test]
        fn test_empty_name() {
            let err = MdsCollection::new("").unwrap_err();
            assert_eq!(err.message(), "expected 'collectionName' to be non-empty string");
        }

        #[test]
        fn test_add_toc() {
            let fx = Fixture::new();
            let mut collection = MdsCollection::new("test").unwrap();
            let jws = fx.jws(&v3_toc());
            let toc = collection
                .add_toc(&jws, Some(&[fx.root.clone()]), &[])
                .unwrap();
            assert_eq!(toc.no, Some(8));
            assert_eq!(toc.entries.len(), 1);
            assert_eq!(toc.raw, jws);
            assert!(collection.toc().is_some());
        }

        #[test]
        fn test_empty_toc() {
            let mut collection = MdsCollection::new("test").unwrap();
            let err = collection.add_toc("", None, &[]).unwrap_err();
            assert_eq!(err.message(), "expected MDS TOC to be non-empty string");
        }

        #[test]
        fn test_toc_signed_by_other_key() {
            let fx = Fixture::new();
            let jws = create_test_jws(&v3_toc(), &TestKey::generate_p256(), &[fx.signer.clone()], None);
            let mut collection = MdsCollection::new("test").unwrap();
            let err = collection
                .add_toc(&jws, Some(&[fx.root.clone()]), &[])
                .unwrap_err();
            assert!(err.message().starts_with(TOC_ERROR_PREFIX), "{err}");
        }

        /// The chain must lead to one of the supplied roots
        #[test]
        fn test_toc_untrusted_root() {
            let fx = Fixture::new();
            let other_key = TestKey::generate_p256();
            let other_root = Certificate::from_der(&create_test_cert(
                &CertSpec::ca("Other Root"),
                &other_key,
                &other_key,
            ))
            .unwrap();
            let mut collection = MdsCollection::new("test").unwrap();
            let result = collection.add_toc(&fx.jws(&v3_toc()), Some(&[other_root]), &[]);
            assert!(matches!(result, Err(Fido2Error::ChainValidation(_))), "{result:?}");
            assert!(collection.toc().is_none());
        }

        /// Test chains do not lead to the built-in roots
        #[test]
        fn test_toc_default_root() {
            let fx = Fixture::new();
            let jws = create_test_jws(
                &v3_toc(),
                &fx.signer_key,
                &[fx.signer.clone()],
                Some(TOC_SIGNER_3_KID),
            );
            let mut collection = MdsCollection::new("test").unwrap();
            assert!(collection.add_toc(&jws, None, &[]).is_err());
        }
    }

    mod entry_tests {
        use super::*;

        #[test]
        fn test_v2_entry() {
            let fx = Fixture::new();
            let statement_b64 = encoded(&u2f_statement());
            let mut collection = fx.collection_with(&v2_toc(&statement_b64));
            collection.add_entry(&statement_b64).unwrap();
            collection.validate(&CertManager::new()).unwrap();

            let entry = collection.find_entry(KEY_ID).unwrap();
            assert_eq!(entry.description.as_deref(), Some("Test U2F Key"));
            assert_eq!(entry.protocol_family, "u2f");
            assert_eq!(entry.attachment_hint, vec!["external"]);
            assert_eq!(entry.status_reports, vec![json!({"status": "FIDO_CERTIFIED"})]);
            assert_eq!(entry.collection, "test");
            assert_eq!(collection.len(), 1);
        }

        #[test]
        fn test_v3_entry() {
            let fx = Fixture::new();
            let mut collection = fx.collection_with(&v3_toc());
            let blob = json!({"metadataStatement": fido2_statement()});
            collection.add_entry(&encoded(&blob)).unwrap();
            collection.validate(&CertManager::new()).unwrap();

            let entry = collection.find_entry(AAGUID).unwrap();
            assert_eq!(entry.aaguid.as_deref(), Some(AAGUID));
            assert_eq!(entry.public_key_alg_and_encoding, "ALG_KEY_COSE");
            assert!(collection.find_entry(&AAGUID.replace('-', "")).is_some());

            let aaguid_bytes: Vec<u8> = (0..16)
                .map(|i| u8::from_str_radix(&AAGUID.replace('-', "")[i * 2..i * 2 + 2], 16).unwrap())
                .collect();
            assert!(collection.find_entry(&base64url_encode(&aaguid_bytes)).is_some());
            assert!(collection.find_entry("unknown").is_none());
        }

        /// Statements with attestation roots register them for later chain checks
        #[test]
        fn test_entry_registers_roots() {
            let fx = Fixture::new();
            let mut statement = fido2_statement();
            statement["attestationRootCertificates"] =
                json!([crate::utils::base64_encode(fx.root.der())]);
            let toc = json!({"entries": [{"aaguid": AAGUID, "metadataStatement": statement}]});
            let mut collection = fx.collection_with(&toc);
            collection
                .add_entry(&encoded(&json!({"metadataStatement": statement})))
                .unwrap();

            let manager = CertManager::new();
            collection.validate(&manager).unwrap();
            assert!(manager.cert_by_key("Test MDS Root").is_some());
        }

        #[test]
        fn test_hash_mismatch() {
            let fx = Fixture::new();
            let statement_b64 = encoded(&u2f_statement());
            let mut collection = fx.collection_with(&v2_toc(&statement_b64));
            let mut tampered = u2f_statement();
            tampered["description"] = json!("Tampered");
            collection.add_entry(&encoded(&tampered)).unwrap();

            let err = collection.validate(&CertManager::new()).unwrap_err();
            assert_eq!(
                err.message(),
                "MDS entry hash did not match corresponding hash in MDS TOC"
            );
            assert!(collection.find_entry(KEY_ID).is_none());
        }

        /// A failing entry leaves the roots of entries validated before it unregistered
        #[test]
        fn test_failed_validation_registers_no_roots() {
            let fx = Fixture::new();
            let mut fido2 = fido2_statement();
            fido2["attestationRootCertificates"] =
                json!([crate::utils::base64_encode(fx.root.der())]);
            let u2f_b64 = encoded(&u2f_statement());
            let toc = json!({"entries": [
                {"aaguid": AAGUID, "metadataStatement": fido2},
                {
                    "attestationCertificateKeyIdentifiers": [KEY_ID],
                    "hash": base64url_encode(&sha256(u2f_b64.as_bytes()))
                }
            ]});
            let mut collection = fx.collection_with(&toc);
            collection
                .add_entry(&encoded(&json!({"metadataStatement": fido2})))
                .unwrap();
            let mut tampered = u2f_statement();
            tampered["description"] = json!("Tampered");
            collection.add_entry(&encoded(&tampered)).unwrap();

            let manager = CertManager::new();
            let err = collection.validate(&manager).unwrap_err();
            assert_eq!(
                err.message(),
                "MDS entry hash did not match corresponding hash in MDS TOC"
            );
            assert!(manager.is_empty());
            assert!(collection.is_empty());
            assert!(collection.find_entry(AAGUID).is_none());
        }

        #[test]
        fn test_entry_not_in_toc() {
            let fx = Fixture::new();
            let mut collection = fx.collection_with(&v3_toc());
            collection.add_entry(&encoded(&u2f_statement())).unwrap();
            let err = collection.validate(&CertManager::new()).unwrap_err();
            assert_eq!(
                err.message(),
                format!("found the wrong number of TOC entries for '{KEY_ID}': 0")
            );
        }

        #[test]
        fn test_validate_preconditions() {
            let mut collection = MdsCollection::new("test").unwrap();
            let err = collection.validate(&CertManager::new()).unwrap_err();
            assert_eq!(
                err.message(),
                "add MDS TOC before attempting to validate MDS collection"
            );

            let fx = Fixture::new();
            let mut collection = fx.collection_with(&v3_toc());
            let err = collection.validate(&CertManager::new()).unwrap_err();
            assert_eq!(
                err.message(),
                "add MDS entries before attempting to validate MDS collection"
            );
        }

        #[test]
        fn test_add_entry_errors() {
            let mut collection = MdsCollection::new("test").unwrap();
            let err = collection.add_entry("").unwrap_err();
            assert_eq!(err.message(), "expected MDS entry to be non-empty string");

            let err = collection
                .add_entry(&encoded(&json!({"description": "no id"})))
                .unwrap_err();
            assert_eq!(err.message(), "MDS entry didn't have a valid ID");
        }

        /// Non-ASCII characters below U+10000 are dropped before hashing
        #[test]
        fn test_statement_to_b64_strips_non_ascii() {
            let b64 = statement_to_b64(&json!({"d": "caf\u{00e9}"})).unwrap();
            assert_eq!(b64, base64_encode(br#"{"d":"caf"}"#));
        }
    }
}
