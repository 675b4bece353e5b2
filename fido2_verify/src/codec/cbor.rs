use ciborium::value::{Integer, Value as CborValue};

use crate::errors::Fido2Error;

/// Decodes one CBOR item from the front of `input`, advancing the slice past it.
pub(crate) fn decode_first(input: &mut &[u8]) -> Result<CborValue, Fido2Error> {
    ciborium::de::from_reader(&mut *input)
        .map_err(|e| Fido2Error::Decode(format!("invalid CBOR: {e}")))
}

/// Decodes a buffer that must contain exactly one CBOR item.
pub(crate) fn decode_exact(input: &[u8]) -> Result<CborValue, Fido2Error> {
    let mut rest = input;
    let value = decode_first(&mut rest)?;
    if !rest.is_empty() {
        return Err(Fido2Error::Decode(format!(
            "{} unexpected bytes after CBOR item",
            rest.len()
        )));
    }
    Ok(value)
}

pub(crate) fn encode(value: &CborValue) -> Result<Vec<u8>, Fido2Error> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)
        .map_err(|e| Fido2Error::Decode(format!("could not encode CBOR: {e}")))?;
    Ok(bytes)
}

pub(crate) fn integer_to_i64(i: &Integer) -> Option<i64> {
    i64::try_from(*i).ok()
}

/// Looks up a text key in a CBOR map.
pub(crate) fn map_get<'a>(map: &'a [(CborValue, CborValue)], key: &str) -> Option<&'a CborValue> {
    map.iter().find_map(|(k, v)| match k {
        CborValue::Text(k) if k == key => Some(v),
        _ => None,
    })
}

/// Renders a value for error messages.
pub(crate) fn describe(value: &CborValue) -> String {
    match value {
        CborValue::Integer(i) => i128::from(*i).to_string(),
        CborValue::Text(t) => t.clone(),
        CborValue::Bytes(b) => format!("<{} bytes>", b.len()),
        CborValue::Bool(b) => b.to_string(),
        CborValue::Null => "null".to_string(),
        CborValue::Array(_) => "[array]".to_string(),
        CborValue::Map(_) => "[object]".to_string(),
        _ => "undefined".to_string(),
    }
}
