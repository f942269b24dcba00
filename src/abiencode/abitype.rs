//! Parsing of ABI type strings and checking [Token] values against them.
//!
//! Apps register their state and action encodings as human readable strings
//! like `tuple(address to, uint256 amount)[]`. Component names are accepted
//! but ignored, only the shape matters for encoding.

use core::{fmt, str::FromStr};

use super::{
    token::Token,
    types::U256,
    Error, Result,
};

/// Deepest nesting of tuples and arrays a type string may have.
pub const MAX_TYPE_DEPTH: usize = 32;

/// Longest type string accepted.
pub const MAX_TYPE_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    Address,
    /// `uint<bits>`, `uint` is an alias for `uint256`.
    Uint(usize),
    Bool,
    /// `bytes<len>` with `1 <= len <= 32`.
    FixedBytes(usize),
    Bytes,
    String,
    Array(Box<AbiType>),
    FixedArray(Box<AbiType>, usize),
    Tuple(Vec<AbiType>),
}

impl FromStr for AbiType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() > MAX_TYPE_LEN {
            return Err(Error::InvalidType(format!(
                "type string of {} bytes exceeds {}",
                s.len(),
                MAX_TYPE_LEN
            )));
        }
        parse_type(s.trim(), 0)
    }
}

fn parse_type(s: &str, depth: usize) -> Result<AbiType> {
    if s.is_empty() {
        return Err(Error::InvalidType(s.to_string()));
    }
    if depth > MAX_TYPE_DEPTH {
        return Err(Error::InvalidType(format!(
            "nested deeper than {}",
            MAX_TYPE_DEPTH
        )));
    }

    // Array suffixes bind last: `uint256[2][]` is a dynamic array of uint256[2].
    if let Some(without_bracket) = s.strip_suffix(']') {
        let open = without_bracket
            .rfind('[')
            .ok_or_else(|| Error::InvalidType(s.to_string()))?;
        let inner = parse_type(without_bracket[..open].trim(), depth + 1)?;
        let len = &without_bracket[open + 1..];
        return if len.is_empty() {
            Ok(AbiType::Array(Box::new(inner)))
        } else {
            let len = len
                .parse::<usize>()
                .map_err(|_| Error::InvalidType(s.to_string()))?;
            Ok(AbiType::FixedArray(Box::new(inner), len))
        };
    }

    if let Some(body) = s
        .strip_prefix("tuple(")
        .or_else(|| s.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return split_components(body)?
            .into_iter()
            .map(|component| parse_component(component, depth + 1))
            .collect::<Result<Vec<_>>>()
            .map(AbiType::Tuple);
    }

    parse_elementary(s)
}

fn parse_elementary(s: &str) -> Result<AbiType> {
    match s {
        "address" => return Ok(AbiType::Address),
        "bool" => return Ok(AbiType::Bool),
        "string" => return Ok(AbiType::String),
        "bytes" => return Ok(AbiType::Bytes),
        "uint" => return Ok(AbiType::Uint(256)),
        _ => {}
    }

    if let Some(bits) = s.strip_prefix("uint") {
        return match bits.parse::<usize>() {
            Ok(bits) if bits > 0 && bits <= 256 && bits % 8 == 0 => Ok(AbiType::Uint(bits)),
            _ => Err(Error::InvalidType(s.to_string())),
        };
    }
    if let Some(len) = s.strip_prefix("bytes") {
        return match len.parse::<usize>() {
            Ok(len) if (1..=32).contains(&len) => Ok(AbiType::FixedBytes(len)),
            _ => Err(Error::InvalidType(s.to_string())),
        };
    }
    if s.starts_with("int") || s.starts_with("fixed") || s.starts_with("ufixed") || s == "function"
    {
        return Err(Error::TypeNotYetSupported(s.to_string()));
    }
    Err(Error::InvalidType(s.to_string()))
}

/// A tuple component is a type optionally followed by a name.
fn parse_component(component: &str, depth: usize) -> Result<AbiType> {
    let component = component.trim();
    let mut depth = 0usize;
    let mut split_at = None;
    for (i, c) in component.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => split_at = Some(i),
            _ => {}
        }
    }

    match split_at {
        Some(i) => {
            let name = component[i..].trim();
            if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(Error::InvalidType(component.to_string()));
            }
            parse_type(component[..i].trim(), depth)
        }
        None => parse_type(component, depth),
    }
}

/// Split on commas that are not nested inside parentheses.
fn split_components(body: &str) -> Result<Vec<&str>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        if depth < 0 {
            return Err(Error::InvalidType(body.to_string()));
        }
    }
    if depth != 0 {
        return Err(Error::InvalidType(body.to_string()));
    }
    parts.push(&body[start..]);
    Ok(parts)
}

impl AbiType {
    /// Check that `token` has the shape this type describes and that all
    /// values fit (e.g. a `uint8` must be below 256).
    pub fn check(&self, token: &Token) -> Result<()> {
        match (self, token) {
            (AbiType::Address, Token::Address(_)) => Ok(()),
            (AbiType::Bool, Token::Bool(_)) => Ok(()),
            (AbiType::String, Token::String(_)) => Ok(()),
            (AbiType::Bytes, Token::Bytes(_)) => Ok(()),
            (AbiType::Uint(bits), Token::Uint(v)) => {
                if *v > U256::max_for_bits(*bits) {
                    Err(Error::mismatch(self, format!("{} does not fit", v)))
                } else {
                    Ok(())
                }
            }
            (AbiType::FixedBytes(len), Token::FixedBytes(b)) => {
                if b.len() == *len {
                    Ok(())
                } else {
                    Err(Error::mismatch(self, format!("got {} bytes", b.len())))
                }
            }
            (AbiType::Array(inner), Token::Array(items)) => {
                items.iter().try_for_each(|item| inner.check(item))
            }
            (AbiType::FixedArray(inner, len), Token::FixedArray(items)) => {
                if items.len() != *len {
                    return Err(Error::mismatch(self, format!("got {} elements", items.len())));
                }
                items.iter().try_for_each(|item| inner.check(item))
            }
            (AbiType::Tuple(fields), Token::Tuple(items)) => {
                if items.len() != fields.len() {
                    return Err(Error::mismatch(self, format!("got {} fields", items.len())));
                }
                fields
                    .iter()
                    .zip(items)
                    .try_for_each(|(field, item)| field.check(item))
            }
            (_, other) => Err(Error::mismatch(self, format!("got {}", other.kind()))),
        }
    }
}

/// Parse `encoding` and check `token` against it in one go.
pub fn check_encoding(encoding: &str, token: &Token) -> Result<()> {
    encoding.parse::<AbiType>()?.check(token)
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiType::Address => f.write_str("address"),
            AbiType::Uint(bits) => write!(f, "uint{}", bits),
            AbiType::Bool => f.write_str("bool"),
            AbiType::FixedBytes(len) => write!(f, "bytes{}", len),
            AbiType::Bytes => f.write_str("bytes"),
            AbiType::String => f.write_str("string"),
            AbiType::Array(inner) => write!(f, "{}[]", inner),
            AbiType::FixedArray(inner, len) => write!(f, "{}[{}]", inner, len),
            AbiType::Tuple(fields) => {
                f.write_str("tuple(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", field)?;
                }
                f.write_str(")")
            }
        }
    }
}
