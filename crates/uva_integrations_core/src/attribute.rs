use serde_json::{Map, Number, Value};

/// A type-tagged store value failed to decode into a plain value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The value is not a single-entry `{tag: raw}` object.
    NotTagged,
    /// The tag is none of the tags this system consumes.
    UnknownTag(String),
    /// A numeric tag carried text that parses as neither integer nor float.
    MalformedNumber(String),
    /// The raw value under the tag has the wrong JSON shape for that tag.
    MalformedValue(&'static str),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotTagged => f.write_str("value is not a single-entry tagged object"),
            Self::UnknownTag(tag) => write!(f, "unknown value tag '{tag}'"),
            Self::MalformedNumber(raw) => write!(f, "numeric value '{raw}' is not a number"),
            Self::MalformedValue(tag) => write!(f, "malformed raw value under tag '{tag}'"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Strips the store-specific type tag from every field of an image,
/// returning a plain JSON object.
pub fn strip_image_types(image: &Map<String, Value>) -> Result<Map<String, Value>, DecodeError> {
    let mut plain = Map::with_capacity(image.len());
    for (field, tagged) in image {
        plain.insert(field.clone(), decode_attribute(tagged)?);
    }
    Ok(plain)
}

/// Decodes one `{tag: raw}` pair into a plain JSON value.
///
/// Numeric tags resolve to an integer when the text is losslessly integral,
/// otherwise to a float. Boolean tags are true only for the literal text
/// `"true"` (a native boolean passes through unchanged). Mapping and list
/// tags recurse. Unknown tags are an error, not a passthrough.
pub fn decode_attribute(tagged: &Value) -> Result<Value, DecodeError> {
    let Some(entries) = tagged.as_object() else {
        return Err(DecodeError::NotTagged);
    };
    let mut entries = entries.iter();
    let (Some((tag, raw)), None) = (entries.next(), entries.next()) else {
        return Err(DecodeError::NotTagged);
    };

    match tag.as_str() {
        "S" => match raw {
            Value::String(_) => Ok(raw.clone()),
            _ => Err(DecodeError::MalformedValue("S")),
        },
        "N" => match raw {
            Value::String(text) => decode_number(text),
            _ => Err(DecodeError::MalformedValue("N")),
        },
        "BOOL" => match raw {
            Value::String(text) => Ok(Value::Bool(text == "true")),
            Value::Bool(flag) => Ok(Value::Bool(*flag)),
            _ => Err(DecodeError::MalformedValue("BOOL")),
        },
        "M" => match raw {
            Value::Object(nested) => Ok(Value::Object(strip_image_types(nested)?)),
            _ => Err(DecodeError::MalformedValue("M")),
        },
        "L" => match raw {
            Value::Array(items) => {
                let mut decoded = Vec::with_capacity(items.len());
                for item in items {
                    decoded.push(decode_attribute(item)?);
                }
                Ok(Value::Array(decoded))
            }
            _ => Err(DecodeError::MalformedValue("L")),
        },
        other => Err(DecodeError::UnknownTag(other.to_string())),
    }
}

fn decode_number(text: &str) -> Result<Value, DecodeError> {
    if let Ok(integer) = text.parse::<i64>() {
        return Ok(Value::Number(Number::from(integer)));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| DecodeError::MalformedNumber(text.to_string()))
}
