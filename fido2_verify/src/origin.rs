//! Origin and relying party ID checks.

use std::net::IpAddr;

use url::Url;

use crate::errors::Fido2Error;

fn valid_domain_name(value: &str) -> bool {
    // Labels per RFC 1035 on the ASCII (punycode) form.
    if value.is_empty() || value.len() > 253 || !value.is_ascii() {
        return false;
    }
    value.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && label
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    })
}

/// Whether `value` is a registrable domain or a name below one.
pub(crate) fn valid_etld_plus_one(value: &str) -> bool {
    if value.parse::<IpAddr>().is_ok() {
        return false;
    }
    psl::domain(value.as_bytes()).is_some() && valid_domain_name(value)
}

/// Normalises an origin and checks it is an https origin on a registrable
/// domain. `localhost` is accepted over plain http.
///
/// The origin must already be in serialized form: a trailing slash, a path or
/// a default port make it malformed.
pub fn check_origin(value: &str) -> Result<String, Fido2Error> {
    let url = Url::parse(value)
        .map_err(|_| Fido2Error::Input("origin was malformatted".to_string()))?;
    let origin = url.origin().ascii_serialization();
    if origin != value {
        return Err(Fido2Error::Input("origin was malformatted".to_string()));
    }

    let host = url.host_str().unwrap_or_default();
    let is_localhost = is_localhost(host);
    if url.scheme() != "https" && !is_localhost {
        return Err(Fido2Error::Input("origin should be https".to_string()));
    }
    if !is_localhost && !valid_etld_plus_one(host) {
        return Err(Fido2Error::Input("origin is not a valid eTLD+1".to_string()));
    }
    Ok(origin)
}

fn is_localhost(host: &str) -> bool {
    host == "localhost" || host.ends_with(".localhost")
}

/// Hostname of a normalised origin.
pub(crate) fn origin_hostname(origin: &str) -> Result<String, Fido2Error> {
    Url::parse(origin)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .ok_or_else(|| Fido2Error::Input("origin was malformatted".to_string()))
}

fn check_url(value: &str, name: &str) -> Result<String, Fido2Error> {
    let url = Url::parse(value)
        .map_err(|_| Fido2Error::Input(format!("{name} is not a valid eTLD+1/url")))?;
    if !value.starts_with("http") {
        return Err(Fido2Error::Input(format!("{name} must be http protocol")));
    }
    let is_localhost = url.host_str().is_some_and(is_localhost);
    if url.scheme() != "https" && !is_localhost {
        return Err(Fido2Error::Input(format!("{name} should be https")));
    }
    if value.ends_with('/') || url.path() != "/" {
        return Err(Fido2Error::Input(format!("{name} should not include path in url")));
    }
    if url.fragment().is_some() {
        return Err(Fido2Error::Input(format!("{name} should not include hash in url")));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(Fido2Error::Input(format!(
            "{name} should not include credentials in url"
        )));
    }
    if url.query().is_some() {
        return Err(Fido2Error::Input(format!(
            "{name} should not include query string in url"
        )));
    }
    Ok(value.to_string())
}

fn check_domain_or_url(value: &str, name: &str) -> Result<String, Fido2Error> {
    if valid_etld_plus_one(value) {
        return Ok(value.to_string());
    }
    check_url(value, name)
}

/// Checks a relying party ID: a registrable domain, `localhost`, or an origin-like URL.
pub fn check_rp_id(value: &str) -> Result<String, Fido2Error> {
    if is_localhost(value) {
        return Ok(value.to_string());
    }
    check_domain_or_url(value, "rpId")
}
