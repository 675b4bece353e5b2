//! FIDO Metadata Service data.
//!
//! Downloading the table of contents and the statements it lists is left to
//! the caller. This module verifies what was downloaded (JWS signature,
//! certificate chain, per-entry hashes) and indexes the entries for lookup by
//! AAID, AAGUID or attestation certificate key identifier.

mod collection;
mod entry;

pub use collection::{MdsCollection, MdsToc, TocEntry};
pub use entry::{MdsEntry, MdsEntryId, UserVerificationDesc};
