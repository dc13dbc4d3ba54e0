//! The typed parameter value codec.
//!
//! Parsing infers a [`Parameter`] variant from a raw token's prefix; encoding
//! is the exact inverse, including the "no leading zero-pad except the
//! all-zero case" rule for `DWORD`/`QWORD`.

use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{digit1, hex_digit1},
    combinator::{all_consuming, map_res, opt, recognize},
    sequence::{pair, preceded},
    IResult,
};
use xbdm_types::Parameter;

use crate::error::ValueError;

fn dword(input: &str) -> IResult<&str, u32> {
    preceded(
        tag_no_case("0x"),
        map_res(hex_digit1, |digits: &str| u32::from_str_radix(digits, 16)),
    )(input)
}

fn qword(input: &str) -> IResult<&str, u64> {
    preceded(
        tag_no_case("0q"),
        map_res(hex_digit1, |digits: &str| u64::from_str_radix(digits, 16)),
    )(input)
}

fn signed_integer(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(tag_no_case("-")), digit1)), |s: &str| {
        s.parse::<i64>()
    })(input)
}

fn quoted_string(raw: &str) -> Option<&str> {
    let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
    if inner.contains('"') {
        None
    } else {
        Some(inner)
    }
}

/// Infers a [`Parameter`] from a token's wire form. Anything that doesn't
/// match a typed prefix becomes a bare
/// `STRING`, which can never fail — so this only errors when a token *looks*
/// like a typed prefix but doesn't parse (e.g. `0xZZ`, an empty `""` quote
/// with no closing mark).
pub fn parse_value(raw: &str) -> Result<Parameter, ValueError> {
    if raw.len() >= 2 && raw[..2].eq_ignore_ascii_case("0x") {
        return all_consuming(dword)(raw)
            .map(|(_, v)| Parameter::Dword(v))
            .map_err(|_| ValueError::Malformed { kind: "DWORD", raw: raw.to_string() });
    }
    if raw.len() >= 2 && raw[..2].eq_ignore_ascii_case("0q") {
        return all_consuming(qword)(raw)
            .map(|(_, v)| Parameter::Qword(v))
            .map_err(|_| ValueError::Malformed { kind: "QWORD", raw: raw.to_string() });
    }
    if raw.starts_with('"') {
        return quoted_string(raw)
            .map(|s| Parameter::QuotedString(s.to_string()))
            .ok_or_else(|| ValueError::Malformed {
                kind: "QUOTED_STRING",
                raw: raw.to_string(),
            });
    }
    if let Ok((_, v)) = all_consuming(alt((signed_integer,)))(raw) {
        return Ok(Parameter::Integer(v));
    }
    Ok(Parameter::String(raw.to_string()))
}

/// Serializes a [`Parameter`] back to its wire form; the exact inverse of
/// [`parse_value`] for every variant it can produce.
pub fn encode_value(value: &Parameter) -> String {
    match value {
        Parameter::Integer(v) => v.to_string(),
        Parameter::Dword(v) => format!("0x{:X}", v),
        Parameter::Qword(v) => format!("0q{:X}", v),
        Parameter::String(s) => s.clone(),
        Parameter::QuotedString(s) => format!("\"{s}\""),
    }
}
