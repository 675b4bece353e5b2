use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::attestation::AttestationRegistry;
use crate::audit::ExpectationsInput;
use crate::certificate::CertManager;
use crate::config::Fido2Config;
use crate::errors::Fido2Error;
use crate::extensions::ExtensionRegistry;
use crate::mds::{MdsCollection, MdsEntry};
use crate::options::{
    AssertionOptions, AttestationOptions, OptionsRequest, assertion_options, attestation_options,
};
use crate::parser::CredentialRequest;
use crate::result::{Fido2AssertionResult, Fido2AttestationResult};

/// Which authentication factor a ceremony is expected to provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Factor {
    /// User present and verified.
    First,
    /// User present.
    Second,
    /// User present or verified.
    Either,
}

impl Factor {
    fn flags(&self) -> &'static [&'static str] {
        match self {
            Factor::First => &["UP", "UV"],
            Factor::Second => &["UP"],
            Factor::Either => &["UP-or-UV"],
        }
    }
}

impl FromStr for Factor {
    type Err = Fido2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(Factor::First),
            "second" => Ok(Factor::Second),
            "either" => Ok(Factor::Either),
            _ => Err(Fido2Error::Input(
                "expectedFactor should be 'first', 'second' or 'either'".to_string(),
            )),
        }
    }
}

fn with_factor_flags(expected: &ExpectationsInput, base: &[&str], factor: Factor) -> ExpectationsInput {
    let flags = base
        .iter()
        .chain(factor.flags())
        .map(|f| f.to_string())
        .collect();
    ExpectationsInput {
        flags: Some(flags),
        ..expected.clone()
    }
}

/// A relying party: configuration plus the registries verification runs against.
///
/// Registries are mutated through `&mut self` while the relying party is set
/// up and read by every verification afterwards.
#[derive(Debug)]
pub struct Fido2 {
    config: Fido2Config,
    attestation_formats: AttestationRegistry,
    extensions: ExtensionRegistry,
    cert_manager: Arc<CertManager>,
    mds_collections: BTreeMap<String, MdsCollection>,
}

impl Fido2 {
    pub fn new(config: Fido2Config) -> Result<Self, Fido2Error> {
        config.validate()?;
        tracing::debug!(
            "Creating relying party '{}' (rpId: {:?})",
            config.rp_name,
            config.rp_id
        );
        Ok(Self {
            config,
            attestation_formats: AttestationRegistry::with_default_formats(),
            extensions: ExtensionRegistry::new(),
            cert_manager: Arc::new(CertManager::new()),
            mds_collections: BTreeMap::new(),
        })
    }

    /// Relying party configured from `FIDO2_*` environment variables.
    pub fn from_env() -> Result<Self, Fido2Error> {
        Self::new(Fido2Config::from_env())
    }

    pub fn config(&self) -> &Fido2Config {
        &self.config
    }

    pub fn attestation_formats(&self) -> &AttestationRegistry {
        &self.attestation_formats
    }

    pub fn attestation_formats_mut(&mut self) -> &mut AttestationRegistry {
        &mut self.attestation_formats
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.extensions
    }

    pub fn cert_manager(&self) -> &Arc<CertManager> {
        &self.cert_manager
    }

    /// Verifies a registration response. The expected flags are derived from
    /// `factor` (plus `AT`); any flags in `expected` are replaced.
    pub fn attestation_result(
        &self,
        request: &CredentialRequest,
        expected: &ExpectationsInput,
        factor: Factor,
    ) -> Result<Fido2AttestationResult, Fido2Error> {
        let expected = with_factor_flags(expected, &["AT"], factor);
        Fido2AttestationResult::create(
            request,
            &expected,
            &self.attestation_formats,
            Arc::clone(&self.cert_manager),
        )
    }

    /// Verifies an authentication response. The expected flags are derived
    /// from `factor`; any flags in `expected` are replaced.
    pub fn assertion_result(
        &self,
        request: &CredentialRequest,
        expected: &ExpectationsInput,
        factor: Factor,
    ) -> Result<Fido2AssertionResult, Fido2Error> {
        let expected = with_factor_flags(expected, &[], factor);
        Fido2AssertionResult::create(request, &expected, Arc::clone(&self.cert_manager))
    }

    pub fn attestation_options(
        &self,
        request: &OptionsRequest,
    ) -> Result<AttestationOptions, Fido2Error> {
        attestation_options(&self.config, &self.extensions, request)
    }

    pub fn assertion_options(
        &self,
        request: &OptionsRequest,
    ) -> Result<AssertionOptions, Fido2Error> {
        assertion_options(&self.config, &self.extensions, request)
    }

    /// Validates `collection` and makes its entries searchable, replacing any
    /// collection of the same name.
    pub fn add_mds_collection(&mut self, mut collection: MdsCollection) -> Result<(), Fido2Error> {
        collection.validate(&self.cert_manager)?;
        tracing::info!("Adding MDS collection '{}'", collection.name());
        self.mds_collections
            .insert(collection.name().to_string(), collection);
        Ok(())
    }

    pub fn clear_mds_collections(&mut self) {
        self.mds_collections.clear();
    }

    /// Entries for `id` from every collection that has one.
    pub fn find_mds_entry(&self, id: &str) -> Result<Vec<&MdsEntry>, Fido2Error> {
        if self.mds_collections.is_empty() {
            return Err(Fido2Error::Mds(
                "must set MDS collection before attempting to find an MDS entry".to_string(),
            ));
        }
        Ok(self
            .mds_collections
            .values()
            .filter_map(|collection| collection.find_entry(id))
            .collect())
    }
}
