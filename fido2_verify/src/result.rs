//! Verification flows for registration and authentication responses.
//!
//! Each flow normalises the expectations, parses the request, runs every
//! field validator in a fixed order and finally checks the audit. A result is
//! only constructed once the audit is complete; any failing step returns its
//! error and nothing else.

use std::sync::Arc;

use crate::attestation::AttestationRegistry;
use crate::audit::{
    ASSERTION_OPTIONAL, ASSERTION_REQUIRED, ATTESTATION_OPTIONAL, ATTESTATION_REQUIRED, Audit,
    Expectations, ExpectationsInput, VerificationContext,
};
use crate::certificate::CertManager;
use crate::errors::Fido2Error;
use crate::parser::{
    AssertionAuthnrData, AttestationAuthnrData, AuthnrFields, ClientData, CredentialRequest,
    parse_authnr_assertion_response, parse_authnr_attestation_response, parse_client_response,
};

type Check<D> = (
    &'static str,
    fn(&mut VerificationContext<D>) -> Result<(), Fido2Error>,
);

/// Client data checks shared by both flows, followed by the authenticator
/// data checks that do not depend on the attestation.
macro_rules! common_checks {
    ($d:ty) => {
        [
            ("rawClientDataJson", VerificationContext::<$d>::validate_raw_client_data_json),
            ("origin", VerificationContext::<$d>::validate_origin),
            ("challenge", VerificationContext::<$d>::validate_challenge),
            ("tokenBinding", VerificationContext::<$d>::validate_token_binding),
            ("id", VerificationContext::<$d>::validate_id),
            ("rawAuthnrData", VerificationContext::<$d>::validate_raw_authnr_data),
            ("rpIdHash", VerificationContext::<$d>::validate_rp_id_hash),
            ("flags", VerificationContext::<$d>::validate_flags),
        ]
    };
}

const ATTESTATION_PRE_CHECKS: [Check<AttestationAuthnrData>; 3] = [
    ("createType", VerificationContext::<AttestationAuthnrData>::validate_create_type),
    ("aaguid", VerificationContext::<AttestationAuthnrData>::validate_aaguid),
    ("publicKey", VerificationContext::<AttestationAuthnrData>::validate_public_key),
];

const ATTESTATION_COMMON_CHECKS: [Check<AttestationAuthnrData>; 8] =
    common_checks!(AttestationAuthnrData);

const ATTESTATION_POST_CHECKS: [Check<AttestationAuthnrData>; 3] = [
    ("initialCounter", VerificationContext::<AttestationAuthnrData>::validate_initial_counter),
    ("credId", VerificationContext::<AttestationAuthnrData>::validate_cred_id),
    ("transports", VerificationContext::<AttestationAuthnrData>::validate_transports),
];

const ASSERTION_PRE_CHECKS: [Check<AssertionAuthnrData>; 1] = [(
    "getType",
    VerificationContext::<AssertionAuthnrData>::validate_get_type,
)];

const ASSERTION_COMMON_CHECKS: [Check<AssertionAuthnrData>; 8] =
    common_checks!(AssertionAuthnrData);

const ASSERTION_POST_CHECKS: [Check<AssertionAuthnrData>; 3] = [
    ("signature", VerificationContext::<AssertionAuthnrData>::validate_assertion_signature),
    ("userHandle", VerificationContext::<AssertionAuthnrData>::validate_user_handle),
    ("counter", VerificationContext::<AssertionAuthnrData>::validate_counter),
];

fn run_checks<D: AuthnrFields>(
    ctx: &mut VerificationContext<D>,
    checks: &[Check<D>],
) -> Result<(), Fido2Error> {
    for (name, check) in checks {
        tracing::debug!("Validating {}", name);
        check(ctx)?;
    }
    Ok(())
}

fn prepare_expectations(
    expected: &ExpectationsInput,
    required: &[&str],
    optional: &[&str],
) -> Result<(Expectations, Audit), Fido2Error> {
    let expectations = Expectations::parse(expected)?;
    expectations.validate(required, optional)?;
    let audit = Audit {
        valid_expectations: true,
        ..Default::default()
    };
    tracing::debug!("Expectations validated: {:?}", expectations.present_fields());
    Ok((expectations, audit))
}

/// A response that passed every check.
///
/// The fields are those of the verification run; `audit.complete` is always
/// `true` for a result handed out by [`Fido2AttestationResult::create`] or
/// [`Fido2AssertionResult::create`].
#[derive(Debug, Clone)]
pub struct Fido2Result<D> {
    pub client_data: ClientData,
    pub authnr_data: D,
    pub expectations: Expectations,
    pub audit: Audit,
}

pub type Fido2AttestationResult = Fido2Result<AttestationAuthnrData>;
pub type Fido2AssertionResult = Fido2Result<AssertionAuthnrData>;

impl<D> From<VerificationContext<D>> for Fido2Result<D> {
    fn from(ctx: VerificationContext<D>) -> Self {
        Self {
            client_data: ctx.client_data,
            authnr_data: ctx.authnr_data,
            expectations: ctx.expectations,
            audit: ctx.audit,
        }
    }
}

impl<D: AuthnrFields> Fido2Result<D> {
    pub fn counter(&self) -> u32 {
        self.authnr_data.authenticator_data().counter
    }

    pub fn flags(&self) -> Vec<&'static str> {
        self.authnr_data
            .authenticator_data()
            .flags
            .iter()
            .copied()
            .collect()
    }
}

impl Fido2AttestationResult {
    /// Verifies a registration response.
    ///
    /// `expected` must hold `origin`, `challenge` and `flags`, and may hold
    /// `rpId`.
    pub fn create(
        request: &CredentialRequest,
        expected: &ExpectationsInput,
        formats: &AttestationRegistry,
        cert_manager: Arc<CertManager>,
    ) -> Result<Self, Fido2Error> {
        let (expectations, mut audit) =
            prepare_expectations(expected, &ATTESTATION_REQUIRED, &ATTESTATION_OPTIONAL)?;

        request.validate_create()?;
        audit.valid_request = true;

        let client_data = parse_client_response(request)?;
        let authnr_data = parse_authnr_attestation_response(request, formats)?;
        tracing::debug!("Parsed '{}' attestation response", authnr_data.fmt);

        let mut ctx =
            VerificationContext::new(client_data, authnr_data, expectations, audit, cert_manager);
        run_checks(&mut ctx, &ATTESTATION_PRE_CHECKS)?;
        run_checks(&mut ctx, &ATTESTATION_COMMON_CHECKS)?;
        formats.validate(&mut ctx)?;
        run_checks(&mut ctx, &ATTESTATION_POST_CHECKS)?;
        ctx.validate_audit()?;

        Ok(ctx.into())
    }

    pub fn fmt(&self) -> &str {
        &self.authnr_data.fmt
    }

    /// Credential id of the new credential.
    pub fn credential_id(&self) -> Option<&[u8]> {
        self.authnr_data
            .data
            .attested
            .as_ref()
            .map(|a| a.cred_id.as_slice())
    }

    /// PEM public key to store and later pass as the `publicKey` expectation.
    pub fn credential_public_key_pem(&self) -> Option<&str> {
        self.authnr_data
            .data
            .attested
            .as_ref()
            .map(|a| a.public_key_pem.as_str())
    }

    pub fn aaguid(&self) -> Option<String> {
        self.authnr_data.data.aaguid_string()
    }
}

impl Fido2AssertionResult {
    /// Verifies an authentication response.
    ///
    /// `expected` must hold `origin`, `challenge`, `flags`, `prevCounter`,
    /// `publicKey` and `userHandle`, and may hold `rpId` and
    /// `allowCredentials`.
    pub fn create(
        request: &CredentialRequest,
        expected: &ExpectationsInput,
        cert_manager: Arc<CertManager>,
    ) -> Result<Self, Fido2Error> {
        let (expectations, mut audit) =
            prepare_expectations(expected, &ASSERTION_REQUIRED, &ASSERTION_OPTIONAL)?;

        request.validate_assertion()?;
        audit.valid_request = true;

        let client_data = parse_client_response(request)?;
        let authnr_data = parse_authnr_assertion_response(request)?;

        let mut ctx =
            VerificationContext::new(client_data, authnr_data, expectations, audit, cert_manager);
        run_checks(&mut ctx, &ASSERTION_PRE_CHECKS)?;
        run_checks(&mut ctx, &ASSERTION_COMMON_CHECKS)?;
        run_checks(&mut ctx, &ASSERTION_POST_CHECKS)?;
        ctx.validate_audit()?;

        Ok(ctx.into())
    }

    pub fn user_handle(&self) -> Option<&[u8]> {
        self.authnr_data.user_handle.as_deref()
    }

    /// Whether the authenticator implements a signature counter.
    pub fn counter_supported(&self) -> bool {
        self.audit
            .info
            .get("counter-supported")
            .and_then(serde_json::Value::as_str)
            != Some("false")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::BinaryInput;
    use crate::test_utils::{
        TEST_AAGUID, TestKey, create_test_assertion_auth_data,
        create_test_attestation_context, create_test_attestation_object, create_test_auth_data,
        create_test_client_data,
    };
    use crate::utils::base64url_encode;
    use ciborium::value::Value as CborValue;

    const ORIGIN: &str = "https://localhost:8443";
    const CHALLENGE: &str = "dGVzdC1jaGFsbGVuZ2UtMTIzNDU2Nzg5MA";
    const CRED_ID: [u8; 16] = [0xab; 16];

    fn empty_stmt() -> CborValue {
        CborValue::Map(vec![])
    }

    fn attestation_expectations(flags: &[&str]) -> ExpectationsInput {
        ExpectationsInput {
            origin: Some(ORIGIN.to_string()),
            challenge: Some(CHALLENGE.into()),
            flags: Some(flags.iter().map(|f| f.to_string()).collect()),
            ..Default::default()
        }
    }

    fn none_request(key: &TestKey, flags: u8, client_type: &str) -> CredentialRequest {
        let auth_data = create_test_auth_data(
            "localhost",
            flags,
            0,
            TEST_AAGUID,
            &CRED_ID,
            &key.cose_key(),
        );
        let att_obj = create_test_attestation_object("none", empty_stmt(), &auth_data);
        let client_data = create_test_client_data(client_type, CHALLENGE, ORIGIN);
        CredentialRequest::attestation(CRED_ID.to_vec(), client_data, att_obj)
    }

    fn attest(request: &CredentialRequest, expected: &ExpectationsInput) -> Result<Fido2AttestationResult, Fido2Error> {
        Fido2AttestationResult::create(
            request,
            expected,
            &AttestationRegistry::with_default_formats(),
            Arc::new(CertManager::new()),
        )
    }

    struct Assertion {
        key: TestKey,
        auth_data: Vec<u8>,
        client_data: Vec<u8>,
        user_handle: Option<Vec<u8>>,
    }

    impl Assertion {
        fn new(flags: u8, counter: u32) -> Self {
            Self {
                key: TestKey::generate_p256(),
                auth_data: create_test_assertion_auth_data("localhost", flags, counter),
                client_data: create_test_client_data("webauthn.get", CHALLENGE, ORIGIN),
                user_handle: Some(b"user-1234".to_vec()),
            }
        }

        fn request(&self) -> CredentialRequest {
            let mut signed = self.auth_data.clone();
            signed.extend(crate::crypto::sha256(&self.client_data));
            CredentialRequest::assertion(
                CRED_ID.to_vec(),
                self.client_data.clone(),
                self.auth_data.clone(),
                self.key.sign(&signed),
                self.user_handle.clone().map(BinaryInput::from),
            )
        }

        fn expectations(&self, prev_counter: i64, flags: &[&str]) -> ExpectationsInput {
            ExpectationsInput {
                origin: Some(ORIGIN.to_string()),
                challenge: Some(CHALLENGE.into()),
                flags: Some(flags.iter().map(|f| f.to_string()).collect()),
                prev_counter: Some(prev_counter),
                public_key: Some(self.key.pem()),
                user_handle: Some(
                    self.user_handle
                        .as_ref()
                        .map(|h| BinaryInput::Text(base64url_encode(h))),
                ),
                ..Default::default()
            }
        }

        fn verify(&self, prev_counter: i64, flags: &[&str]) -> Result<Fido2AssertionResult, Fido2Error> {
            Fido2AssertionResult::create(
                &self.request(),
                &self.expectations(prev_counter, flags),
                Arc::new(CertManager::new()),
            )
        }
    }

    mod attestation_tests {
        use super::*;

        /// A `none` attestation with matching expectations completes the audit
        #[test]
        fn test_none_attestation_end_to_end() {
            let key = TestKey::generate_p256();
            let request = none_request(&key, 0x41, "webauthn.create");
            let result = attest(&request, &attestation_expectations(&["UP"])).unwrap();

            assert!(result.audit.complete);
            assert!(result.audit.valid_expectations);
            assert!(result.audit.valid_request);
            assert_eq!(result.fmt(), "none");
            assert_eq!(result.credential_id(), Some(CRED_ID.as_slice()));
            assert_eq!(result.credential_public_key_pem(), Some(key.pem().as_str()));
            assert_eq!(result.counter(), 0);
            assert!(result.flags().contains(&"AT"));
            assert!(result.aaguid().is_some());
        }

        #[test]
        fn test_none_attestation_with_statement_fails() {
            let key = TestKey::generate_p256();
            let auth_data =
                create_test_auth_data("localhost", 0x41, 0, TEST_AAGUID, &CRED_ID, &key.cose_key());
            let stmt = CborValue::Map(vec![(
                CborValue::Text("sig".into()),
                CborValue::Bytes(vec![1, 2, 3]),
            )]);
            let att_obj = create_test_attestation_object("none", stmt, &auth_data);
            let client_data = create_test_client_data("webauthn.create", CHALLENGE, ORIGIN);
            let request = CredentialRequest::attestation(CRED_ID.to_vec(), client_data, att_obj);

            let err = attest(&request, &attestation_expectations(&["UP"])).unwrap_err();
            assert_eq!(err.message(), "'none' attestation format: attStmt had fields");
        }

        #[test]
        fn test_wrong_client_type() {
            let key = TestKey::generate_p256();
            let request = none_request(&key, 0x41, "webauthn.get");
            let err = attest(&request, &attestation_expectations(&["UP"])).unwrap_err();
            assert!(err.message().starts_with("clientData type should be 'webauthn.create'"));
        }

        #[test]
        fn test_challenge_mismatch() {
            let key = TestKey::generate_p256();
            let request = none_request(&key, 0x41, "webauthn.create");
            let mut expected = attestation_expectations(&["UP"]);
            expected.challenge = Some("b3RoZXItY2hhbGxlbmdl".into());
            let err = attest(&request, &expected).unwrap_err();
            assert_eq!(err.message(), "clientData challenge mismatch");
        }

        /// Padding and the standard alphabet in the expected challenge are normalised
        #[test]
        fn test_padded_challenge_accepted() {
            let key = TestKey::generate_p256();
            let request = none_request(&key, 0x41, "webauthn.create");
            let mut expected = attestation_expectations(&["UP"]);
            expected.challenge = Some(format!("{CHALLENGE}==").into());
            assert!(attest(&request, &expected).unwrap().audit.complete);
        }

        #[test]
        fn test_missing_expectation() {
            let key = TestKey::generate_p256();
            let request = none_request(&key, 0x41, "webauthn.create");
            let mut expected = attestation_expectations(&["UP"]);
            expected.challenge = None;
            let err = attest(&request, &expected).unwrap_err();
            assert_eq!(err.message(), "expectation did not contain value for 'challenge'");
        }

        #[test]
        fn test_extra_expectation_rejected() {
            let key = TestKey::generate_p256();
            let request = none_request(&key, 0x41, "webauthn.create");
            let mut expected = attestation_expectations(&["UP"]);
            expected.prev_counter = Some(0);
            let err = attest(&request, &expected).unwrap_err();
            assert_eq!(
                err.message(),
                "wrong number of expectations: should have 3 but got 4"
            );
        }

        #[test]
        fn test_missing_attestation_object() {
            let mut request = none_request(&TestKey::generate_p256(), 0x41, "webauthn.create");
            if let Some(response) = request.response.as_mut() {
                response.attestation_object = None;
            }
            let err = attest(&request, &attestation_expectations(&["UP"])).unwrap_err();
            assert!(matches!(err, Fido2Error::Input(_)));
        }

        #[test]
        fn test_unknown_format() {
            let key = TestKey::generate_p256();
            let auth_data =
                create_test_auth_data("localhost", 0x41, 0, TEST_AAGUID, &CRED_ID, &key.cose_key());
            let att_obj = create_test_attestation_object("apple", empty_stmt(), &auth_data);
            let client_data = create_test_client_data("webauthn.create", CHALLENGE, ORIGIN);
            let request = CredentialRequest::attestation(CRED_ID.to_vec(), client_data, att_obj);
            let err = attest(&request, &attestation_expectations(&["UP"])).unwrap_err();
            assert!(matches!(err, Fido2Error::UnsupportedFormat(_)));
        }

        #[test]
        fn test_origin_mismatch() {
            let key = TestKey::generate_p256();
            let request = none_request(&key, 0x41, "webauthn.create");
            let mut expected = attestation_expectations(&["UP"]);
            expected.origin = Some("https://localhost:9000".to_string());
            let err = attest(&request, &expected).unwrap_err();
            assert_eq!(err.message(), "clientData origin did not match expected origin");
        }

        #[test]
        fn test_rp_id_hash_mismatch() {
            let key = TestKey::generate_p256();
            let request = none_request(&key, 0x41, "webauthn.create");
            let mut expected = attestation_expectations(&["UP"]);
            expected.rp_id = Some("example.com".to_string());
            let err = attest(&request, &expected).unwrap_err();
            assert_eq!(err.message(), "authnrData rpIdHash mismatch");
        }

        #[test]
        fn test_expected_uv_without_uv_flag() {
            let key = TestKey::generate_p256();
            let request = none_request(&key, 0x41, "webauthn.create");
            let err = attest(&request, &attestation_expectations(&["UP", "UV"])).unwrap_err();
            assert_eq!(err.message(), "expected flag was not set: UV");
        }

        #[test]
        fn test_raw_id_differs_from_cred_id() {
            let key = TestKey::generate_p256();
            let mut request = none_request(&key, 0x41, "webauthn.create");
            request.raw_id = Some(vec![9u8; 16].into());
            let err = attest(&request, &attestation_expectations(&["UP"])).unwrap_err();
            assert_eq!(err.message(), "id and credId were not the same");
        }

        /// Base64url text input is accepted in place of raw bytes
        #[test]
        fn test_text_encoded_request() {
            let key = TestKey::generate_p256();
            let auth_data =
                create_test_auth_data("localhost", 0x45, 0, TEST_AAGUID, &CRED_ID, &key.cose_key());
            let att_obj = create_test_attestation_object("none", empty_stmt(), &auth_data);
            let client_data = create_test_client_data("webauthn.create", CHALLENGE, ORIGIN);
            let mut request = CredentialRequest::attestation(
                base64url_encode(&CRED_ID),
                base64url_encode(&client_data),
                base64url_encode(&att_obj),
            )
            .with_transports(vec!["usb".to_string()]);
            request.id = request.raw_id.take();

            let result = attest(&request, &attestation_expectations(&["UP-or-UV"])).unwrap();
            assert!(result.audit.complete);
            assert_eq!(result.authnr_data.transports, Some(vec!["usb".to_string()]));
        }
    }

    mod assertion_tests {
        use super::*;

        #[test]
        fn test_assertion_end_to_end() {
            let assertion = Assertion::new(0x05, 6);
            let result = assertion.verify(5, &["UV"]).unwrap();
            assert!(result.audit.complete);
            assert_eq!(result.counter(), 6);
            assert_eq!(result.user_handle(), Some(b"user-1234".as_slice()));
            assert!(result.counter_supported());
        }

        #[test]
        fn test_counter_rollback() {
            let assertion = Assertion::new(0x01, 5);
            let err = assertion.verify(5, &["UP"]).unwrap_err();
            assert_eq!(err.message(), "counter rollback detected");
        }

        /// Authenticators without a counter always report zero
        #[test]
        fn test_counter_not_supported() {
            let assertion = Assertion::new(0x01, 0);
            let result = assertion.verify(0, &["UP"]).unwrap();
            assert!(!result.counter_supported());
            assert_eq!(result.audit.info["counter-supported"], "false");
        }

        #[test]
        fn test_uv_without_up() {
            let assertion = Assertion::new(0x04, 1);
            let err = assertion.verify(0, &["UV"]).unwrap_err();
            assert_eq!(
                err.message(),
                "expected User Presence (UP) flag to be set if User Verification (UV) is set"
            );
        }

        #[test]
        fn test_up_satisfies_up_or_uv() {
            let assertion = Assertion::new(0x01, 1);
            assert!(assertion.verify(0, &["UP-or-UV"]).unwrap().audit.complete);
        }

        #[test]
        fn test_signature_by_other_key() {
            let assertion = Assertion::new(0x01, 1);
            let mut expected = assertion.expectations(0, &["UP"]);
            expected.public_key = Some(TestKey::generate_p256().pem());
            let err = Fido2AssertionResult::create(
                &assertion.request(),
                &expected,
                Arc::new(CertManager::new()),
            )
            .unwrap_err();
            assert_eq!(err.message(), "signature validation failed");
        }

        #[test]
        fn test_user_handle_mismatch() {
            let assertion = Assertion::new(0x01, 1);
            let mut expected = assertion.expectations(0, &["UP"]);
            expected.user_handle = Some(Some(BinaryInput::Text(base64url_encode(b"someone-else"))));
            let err = Fido2AssertionResult::create(
                &assertion.request(),
                &expected,
                Arc::new(CertManager::new()),
            )
            .unwrap_err();
            assert_eq!(err.message(), "unable to validate userHandle");
        }

        /// A response without a user handle passes when none is expected
        #[test]
        fn test_null_user_handle() {
            let mut assertion = Assertion::new(0x01, 1);
            assertion.user_handle = None;
            let result = assertion.verify(0, &["UP"]).unwrap();
            assert!(result.user_handle().is_none());
        }

        #[test]
        fn test_allow_credentials_mismatch() {
            let assertion = Assertion::new(0x01, 1);
            let mut expected = assertion.expectations(0, &["UP"]);
            expected.allow_credentials = Some(Some(vec![crate::audit::AllowCredentialInput {
                id: Some(vec![1u8, 1, 1].into()),
                type_: Some("public-key".to_string()),
                transports: None,
            }]));
            let err = Fido2AssertionResult::create(
                &assertion.request(),
                &expected,
                Arc::new(CertManager::new()),
            )
            .unwrap_err();
            assert_eq!(
                err.message(),
                "Credential ID does not match any value in allowCredentials"
            );
        }

        #[test]
        fn test_missing_signature() {
            let assertion = Assertion::new(0x01, 1);
            let mut request = assertion.request();
            if let Some(response) = request.response.as_mut() {
                response.signature = None;
            }
            let err = Fido2AssertionResult::create(
                &request,
                &assertion.expectations(0, &["UP"]),
                Arc::new(CertManager::new()),
            )
            .unwrap_err();
            assert_eq!(
                err.message(),
                "expected 'response.signature' to be base64 String or ArrayBuffer"
            );
        }
    }

    mod audit_tests {
        use super::*;

        /// Runs the attestation flow on a parsed `none` response, leaving out one check.
        fn attestation_without(skip: &str) -> Result<(), Fido2Error> {
            let key = TestKey::generate_p256();
            let auth_data =
                create_test_auth_data("localhost", 0x41, 0, TEST_AAGUID, &CRED_ID, &key.cose_key());
            let mut ctx = create_test_attestation_context(
                "none",
                empty_stmt(),
                &auth_data,
                create_test_client_data("webauthn.create", CHALLENGE, ORIGIN),
                CRED_ID.to_vec(),
            )?;
            ctx.expectations = Expectations::parse(&attestation_expectations(&["UP"]))?;
            ctx.audit.valid_expectations = true;
            ctx.audit.valid_request = true;

            let keep = |checks: &[Check<AttestationAuthnrData>]| -> Vec<Check<AttestationAuthnrData>> {
                checks.iter().filter(|(name, _)| *name != skip).copied().collect()
            };
            run_checks(&mut ctx, &keep(&ATTESTATION_PRE_CHECKS))?;
            run_checks(&mut ctx, &keep(&ATTESTATION_COMMON_CHECKS))?;
            if skip != "attestation" {
                AttestationRegistry::with_default_formats().validate(&mut ctx)?;
            }
            run_checks(&mut ctx, &keep(&ATTESTATION_POST_CHECKS))?;
            ctx.validate_audit()
        }

        #[test]
        fn test_all_checks_complete_audit() {
            assert!(attestation_without("").is_ok());
        }

        /// Leaving out any single check makes the audit fail
        #[test]
        fn test_each_skipped_check_fails_audit() {
            let names = ATTESTATION_PRE_CHECKS
                .iter()
                .chain(ATTESTATION_COMMON_CHECKS.iter())
                .chain(ATTESTATION_POST_CHECKS.iter())
                .map(|(name, _)| *name)
                .chain(std::iter::once("attestation"));
            for name in names {
                let err = attestation_without(name).unwrap_err();
                assert!(matches!(err, Fido2Error::Audit(_)), "{name}: {err:?}");
            }
        }

        #[test]
        fn test_unvalidated_request_fails_audit() {
            let key = TestKey::generate_p256();
            let auth_data =
                create_test_auth_data("localhost", 0x41, 0, TEST_AAGUID, &CRED_ID, &key.cose_key());
            let mut ctx = create_test_attestation_context(
                "none",
                empty_stmt(),
                &auth_data,
                create_test_client_data("webauthn.create", CHALLENGE, ORIGIN),
                CRED_ID.to_vec(),
            )
            .unwrap();
            ctx.expectations = Expectations::parse(&attestation_expectations(&["UP"])).unwrap();
            ctx.audit.valid_expectations = true;
            run_checks(&mut ctx, &ATTESTATION_PRE_CHECKS).unwrap();
            run_checks(&mut ctx, &ATTESTATION_COMMON_CHECKS).unwrap();
            AttestationRegistry::with_default_formats()
                .validate(&mut ctx)
                .unwrap();
            run_checks(&mut ctx, &ATTESTATION_POST_CHECKS).unwrap();

            let err = ctx.validate_audit().unwrap_err();
            assert_eq!(err.message(), "internal audit failed: request not validated");
            assert!(!ctx.audit.complete);
        }
    }
}
