use ciborium::value::Value as CborValue;

use super::{AttestationFormat, AttestationStatement};
use crate::audit::AttestationContext;
use crate::errors::Fido2Error;

/// `none`: the authenticator offers no attestation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneFormat;

impl AttestationFormat for NoneFormat {
    fn name(&self) -> &str {
        "none"
    }

    fn parse(&self, att_stmt: &[(CborValue, CborValue)]) -> Result<AttestationStatement, Fido2Error> {
        if !att_stmt.is_empty() {
            return Err(Fido2Error::Input(
                "'none' attestation format: attStmt had fields".to_string(),
            ));
        }
        Ok(AttestationStatement::None)
    }

    fn validate(&self, ctx: &mut AttestationContext) -> Result<(), Fido2Error> {
        ctx.audit.journal("fmt");
        Ok(())
    }
}
