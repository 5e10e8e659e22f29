// src/core/token.rs

use crate::core::alias_resolver::AliasError;
use crate::models::AliasToken;
use lazy_static::lazy_static;
use regex::Regex;
use std::str::FromStr;

lazy_static! {
    // `@name` or `@group.name`.
    static ref TOKEN_RE: Regex =
        Regex::new(r"^@(?:([A-Za-z0-9_-]+)\.)?([A-Za-z0-9_-]+)$").expect("token regex is valid");
}

/// Parses an alias token. Surrounding whitespace is ignored.
pub fn parse_token(raw: &str) -> Result<AliasToken, AliasError> {
    let trimmed = raw.trim();
    let captures = TOKEN_RE
        .captures(trimmed)
        .ok_or_else(|| AliasError::MalformedToken(raw.to_string()))?;

    let group = captures.get(1).map(|m| m.as_str());
    let name = captures
        .get(2)
        .map(|m| m.as_str())
        .ok_or_else(|| AliasError::MalformedToken(raw.to_string()))?;

    let token = AliasToken::new(group, name);
    log::trace!("Parsed alias token '{}' -> {:?}", raw, token);
    Ok(token)
}

/// Parses a comma-separated token list, as used by `parent`.
pub fn parse_token_list(raw: &str) -> Result<Vec<AliasToken>, AliasError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_token)
        .collect()
}

/// Whether a command-line word names a site rather than a command.
pub fn looks_like_token(word: &str) -> bool {
    word.starts_with('@')
}

impl FromStr for AliasToken {
    type Err = AliasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_token(s)
    }
}
