//! WebAuthn extension option generators.
//!
//! Extensions are registered by name and produce the value that goes into the
//! `extensions` member of registration or authentication options. Generation
//! is disabled until an extension is enabled, unless a call passes its own
//! set of extensions.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::errors::Fido2Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    Attestation,
    Assertion,
}

impl ExtensionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionKind::Attestation => "attestation",
            ExtensionKind::Assertion => "assertion",
        }
    }
}

/// Produces the client input of one extension. Returning `None` leaves the
/// extension out of the options.
pub trait Extension: Send + Sync {
    fn generate_options(
        &self,
        name: &str,
        kind: ExtensionKind,
        options: Option<&Value>,
    ) -> Option<Value>;
}

impl<F> Extension for F
where
    F: Fn(&str, ExtensionKind, Option<&Value>) -> Option<Value> + Send + Sync,
{
    fn generate_options(
        &self,
        name: &str,
        kind: ExtensionKind,
        options: Option<&Value>,
    ) -> Option<Value> {
        self(name, kind, options)
    }
}

#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: BTreeMap<String, Box<dyn Extension>>,
    enabled: BTreeSet<String>,
    options: BTreeMap<String, Value>,
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .field("enabled", &self.enabled)
            .field("options", &self.options)
            .finish()
    }
}

fn not_found(name: &str) -> Fido2Error {
    Fido2Error::Config(format!("valid extension for '{name}' not found"))
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_extension(
        &mut self,
        name: &str,
        extension: Box<dyn Extension>,
    ) -> Result<(), Fido2Error> {
        if self.extensions.contains_key(name) {
            return Err(Fido2Error::Config(format!(
                "the extension '{name}' has already been added"
            )));
        }
        tracing::debug!("Adding extension '{}'", name);
        self.extensions.insert(name.to_string(), extension);
        Ok(())
    }

    pub fn delete_all_extensions(&mut self) {
        self.extensions.clear();
        self.enabled.clear();
        self.options.clear();
    }

    pub fn enable_extension(&mut self, name: &str) -> Result<(), Fido2Error> {
        if !self.extensions.contains_key(name) {
            return Err(not_found(name));
        }
        self.enabled.insert(name.to_string());
        Ok(())
    }

    pub fn disable_extension(&mut self, name: &str) -> Result<(), Fido2Error> {
        if !self.extensions.contains_key(name) {
            return Err(not_found(name));
        }
        self.enabled.remove(name);
        Ok(())
    }

    /// Default options handed to the generator of an enabled extension.
    pub fn set_extension_options(&mut self, name: &str, options: Value) -> Result<(), Fido2Error> {
        if !self.extensions.contains_key(name) {
            return Err(not_found(name));
        }
        self.options.insert(name.to_string(), options);
        Ok(())
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    pub fn generate_extension_options(
        &self,
        name: &str,
        kind: ExtensionKind,
        options: Option<&Value>,
    ) -> Result<Option<Value>, Fido2Error> {
        let extension = self.extensions.get(name).ok_or_else(|| not_found(name))?;
        Ok(extension.generate_options(name, kind, options))
    }

    /// Values of the enabled extensions, or of exactly the extensions named in
    /// `overrides` (with their options) when it is given.
    pub fn create_extensions(
        &self,
        kind: ExtensionKind,
        overrides: Option<&BTreeMap<String, Value>>,
    ) -> Result<BTreeMap<String, Value>, Fido2Error> {
        let selected: Vec<(&String, Option<&Value>)> = match overrides {
            Some(map) => map.iter().map(|(name, opts)| (name, Some(opts))).collect(),
            None => self
                .enabled
                .iter()
                .map(|name| (name, self.options.get(name)))
                .collect(),
        };

        let mut extensions = BTreeMap::new();
        for (name, options) in selected {
            if let Some(value) = self.generate_extension_options(name, kind, options)? {
                extensions.insert(name.clone(), value);
            }
        }
        tracing::debug!(
            "Generated {} {} extension(s)",
            extensions.len(),
            kind.as_str()
        );
        Ok(extensions)
    }
}
