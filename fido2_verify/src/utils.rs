use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use ring::rand::SecureRandom;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum UtilError {
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Invalid format: {0}")]
    Format(String),
}

pub(crate) fn base64url_decode(input: &str) -> Result<Vec<u8>, UtilError> {
    let decoded = URL_SAFE_NO_PAD
        .decode(input)
        .map_err(|_| UtilError::Format("Failed to decode base64url".to_string()))?;
    Ok(decoded)
}

pub(crate) fn base64url_encode(input: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

pub(crate) fn base64_encode(input: &[u8]) -> String {
    STANDARD.encode(input)
}

/// Decodes base64 in either alphabet, with or without padding.
pub(crate) fn coerce_to_bytes(input: &str) -> Result<Vec<u8>, UtilError> {
    let normalized: String = input
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();
    URL_SAFE_NO_PAD
        .decode(normalized)
        .map_err(|_| UtilError::Format(format!("could not coerce '{input}' to bytes")))
}

/// `^[A-Za-z0-9\-_]+={0,2}$`
pub(crate) fn is_base64url(input: &str) -> bool {
    let body = input.trim_end_matches('=');
    let padding = input.len() - body.len();
    !body.is_empty()
        && padding <= 2
        && body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

pub(crate) fn gen_random_bytes(len: usize) -> Result<Vec<u8>, UtilError> {
    let rng = ring::rand::SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|_| UtilError::Crypto("Failed to generate random bytes".to_string()))?;
    Ok(bytes)
}

pub fn gen_random_string(len: usize) -> Result<String, UtilError> {
    let bytes = gen_random_bytes(len)?;
    Ok(base64url_encode(&bytes))
}

pub(crate) fn to_hex(input: &[u8]) -> String {
    input.iter().map(|b| format!("{b:02x}")).collect()
}

fn is_pem_marker(line: &str, kind: &str) -> bool {
    line.strip_prefix("-----")
        .and_then(|l| l.strip_prefix(kind))
        .and_then(|l| l.strip_prefix(' '))
        .and_then(|l| l.strip_suffix("-----"))
        .is_some_and(|label| !label.is_empty())
}

/// Line based check: BEGIN marker, base64 body lines, END marker.
pub(crate) fn is_pem(input: &str) -> bool {
    let lines: Vec<&str> = input.trim_end().lines().map(str::trim_end).collect();
    if lines.len() < 2 {
        return false;
    }
    let (first, last) = (lines[0], lines[lines.len() - 1]);
    is_pem_marker(first, "BEGIN")
        && is_pem_marker(last, "END")
        && lines[1..lines.len() - 1].iter().all(|l| {
            l.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
        })
}

pub(crate) fn pem_to_der(input: &str) -> Result<Vec<u8>, UtilError> {
    if !is_pem(input) {
        return Err(UtilError::Format("expected PEM string as input".to_string()));
    }
    let lines: Vec<&str> = input.trim_end().lines().map(str::trim_end).collect();
    let body = lines[1..lines.len() - 1].concat();
    STANDARD
        .decode(body)
        .map_err(|_| UtilError::Format("PEM body was not valid base64".to_string()))
}

pub(crate) fn der_to_pem(label: &str, der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut pem = format!("-----BEGIN {label}-----\n");
    for chunk in body.as_bytes().chunks(64) {
        // chunks of an ASCII string stay valid UTF-8
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {label}-----\n"));
    pem
}
