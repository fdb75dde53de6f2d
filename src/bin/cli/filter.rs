//! Resource selection using Rez-style filters.

use std::str::FromStr;

use resfork::{ByteSource, Resource, ResType, text};

/// Error type for filter parsing
#[derive(Debug, PartialEq, Eq)]
pub struct FilterError(pub String);

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid resource filter: {}", self.0)
    }
}

impl std::error::Error for FilterError {}

/// One filter: a type code plus an ID range or a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFilter {
    res_type: ResType,
    min_id: i16,
    max_id: i16,
    name: Option<Vec<u8>>,
}

impl ResourceFilter {
    fn new(
        filter: &str,
        res_type: &[u8],
        min_id: i16,
        max_id: i16,
        name: Option<Vec<u8>>,
    ) -> Result<Self, FilterError> {
        let res_type: [u8; 4] = res_type.try_into().map_err(|_| {
            FilterError(format!(
                "{filter:?}: type code must be exactly 4 bytes, not {}",
                res_type.len()
            ))
        })?;
        if min_id > max_id {
            return Err(FilterError(format!(
                "{filter:?}: ID lower bound {min_id} is greater than upper bound {max_id}"
            )));
        }
        Ok(Self {
            res_type: ResType(res_type),
            min_id,
            max_id,
            name,
        })
    }

    /// Checks if a resource matches this filter
    pub fn matches<S: ByteSource>(&self, resource: &Resource<'_, S>) -> resfork::Result<bool> {
        if resource.res_type() != self.res_type
            || !(self.min_id..=self.max_id).contains(&resource.id())
        {
            return Ok(false);
        }
        match &self.name {
            Some(name) => Ok(resource.name_bytes()? == Some(name.as_slice())),
            None => Ok(true),
        }
    }
}

impl FromStr for ResourceFilter {
    type Err = FilterError;

    fn from_str(filter: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| FilterError(format!("{filter:?}: {reason}"));

        if filter.chars().count() == 4 {
            let res_type =
                text::encode(filter).ok_or_else(|| err("type code is not Mac OS Roman"))?;
            return Self::new(filter, &res_type, i16::MIN, i16::MAX, None);
        }
        if filter.len() >= 2 && filter.starts_with('\'') && filter.ends_with('\'') {
            let res_type = unescape(&filter[1..filter.len() - 1]).map_err(|e| err(&e))?;
            return Self::new(filter, &res_type, i16::MIN, i16::MAX, None);
        }

        let rest = filter
            .strip_prefix('\'')
            .ok_or_else(|| err("resource type must be single-quoted"))?;
        let close =
            find_closing(rest, '\'').ok_or_else(|| err("resource type must be single-quoted"))?;
        let res_type = unescape(&rest[..close]).map_err(|e| err(&e))?;
        let id_part = rest[close + 1..]
            .strip_prefix(' ')
            .ok_or_else(|| err("resource type and ID must be separated by a space"))?;
        let id_part = id_part
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| err("resource ID must be parenthesized"))?;

        if id_part.len() >= 2 && id_part.starts_with('"') && id_part.ends_with('"') {
            let name = unescape(&id_part[1..id_part.len() - 1]).map_err(|e| err(&e))?;
            return Self::new(filter, &res_type, i16::MIN, i16::MAX, Some(name));
        }

        let parse_id = |s: &str| {
            s.trim()
                .parse::<i16>()
                .map_err(|_| err(&format!("{s:?} is not a resource ID between -32768 and 32767")))
        };
        match id_part.split_once(':') {
            Some((low, high)) => {
                if high.contains(':') {
                    return Err(err("too many colons in ID range"));
                }
                Self::new(filter, &res_type, parse_id(low)?, parse_id(high)?, None)
            }
            None => {
                let id = parse_id(id_part)?;
                Self::new(filter, &res_type, id, id, None)
            }
        }
    }
}

/// Parses all filters.
pub fn parse_filters(filters: &[String]) -> Result<Vec<ResourceFilter>, FilterError> {
    filters.iter().map(|f| f.parse()).collect()
}

/// Checks a resource against a filter list. An empty list matches everything.
pub fn select<S: ByteSource>(
    filters: &[ResourceFilter],
    resource: &Resource<'_, S>,
) -> resfork::Result<bool> {
    if filters.is_empty() {
        return Ok(true);
    }
    for filter in filters {
        if filter.matches(resource)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Byte index of the first unescaped `quote` in `s`.
fn find_closing(s: &str, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            c if c == quote => return Some(i),
            _ => {}
        }
    }
    None
}

/// Converts text with `\xNN`, `\\`, `\'` and `\"` escapes to Mac OS Roman bytes.
pub fn unescape(s: &str) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let byte = text::encode_char(c)
                .ok_or_else(|| format!("{c:?} is not representable in Mac OS Roman"))?;
            out.push(byte);
            continue;
        }
        match chars.next() {
            Some(esc @ ('\\' | '\'' | '"')) => out.push(esc as u8),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                let byte = u8::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 2)
                    .ok_or_else(|| format!("invalid hex escape \\x{hex}"))?;
                out.push(byte);
            }
            Some(other) => return Err(format!("unknown escape character {other:?}")),
            None => return Err("end of string in escape sequence".to_string()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> ResourceFilter {
        s.parse().unwrap()
    }

    #[test]
    fn test_bare_type() {
        let filter = parse("ICN#");
        assert_eq!(filter.res_type, ResType(*b"ICN#"));
        assert_eq!((filter.min_id, filter.max_id), (i16::MIN, i16::MAX));
    }

    #[test]
    fn test_quoted_type_with_escape() {
        assert_eq!(parse(r"'a\x00b '").res_type, ResType(*b"a\x00b "));
        assert_eq!(parse("'snd '").res_type, ResType(*b"snd "));
    }

    #[test]
    fn test_id_and_range() {
        let filter = parse("'TEXT' (256)");
        assert_eq!((filter.min_id, filter.max_id), (256, 256));

        let filter = parse("'TEXT' (-16455:0)");
        assert_eq!((filter.min_id, filter.max_id), (-16455, 0));
    }

    #[test]
    fn test_name() {
        let filter = parse(r#"'STR#' ("Caf\x8e")"#);
        assert_eq!(filter.name.as_deref(), Some(&b"Caf\x8e"[..]));
    }

    #[test]
    fn test_invalid_filters() {
        for bad in [
            "TEXTS",
            "'TEXT'(1)",
            "'TEXT' 1",
            "'TEXT' (1:2:3)",
            "'TEXT' (2:1)",
            "'TEXT' (40000)",
            "'TXT' (1)",
            r"'\q   '",
        ] {
            assert!(bad.parse::<ResourceFilter>().is_err(), "{bad} should be rejected");
        }
    }
}
