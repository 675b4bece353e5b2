//! Certificate decoding, the certificate store and chain validation.

pub(crate) mod manager;
pub mod oid;
pub mod roots;
pub(crate) mod x509;

pub use manager::CertManager;
pub use x509::{Certificate, Crl, ExtensionValue, Extensions, GeneralName, IssuerStatus};
