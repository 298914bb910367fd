use crate::error::AppError;

/// Parse a count with an optional unit suffix: `k` (1e3), `M` (1e6) or
/// `G` (1e9). Suffixes are decimal, matching the historical capture tools.
///
/// e.g. "5" -> 5, "2k" -> 2000, "3M" -> 3000000
pub fn parse_size(s: &str) -> Result<u64, AppError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AppError::InvalidArgument("empty size".into()));
    }

    let (digits, multiplier) = match s.chars().last() {
        Some(c) if c.is_ascii_digit() => (s, 1u64),
        Some('k') | Some('K') => (&s[..s.len() - 1], 1_000),
        Some('M') => (&s[..s.len() - 1], 1_000_000),
        Some('G') => (&s[..s.len() - 1], 1_000_000_000),
        _ => {
            return Err(AppError::InvalidArgument(format!(
                "unknown size suffix in '{s}'"
            )))
        }
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| AppError::InvalidArgument(format!("invalid size '{s}'")))?;
    if value == 0 {
        return Err(AppError::InvalidArgument(format!(
            "size must be non-zero: '{s}'"
        )));
    }

    value
        .checked_mul(multiplier)
        .ok_or_else(|| AppError::InvalidArgument(format!("size overflows: '{s}'")))
}

/// Parse a USB product id given in hex, with or without a `0x` prefix.
pub fn parse_pid(s: &str) -> Result<u16, AppError> {
    let digits = s.trim().trim_start_matches("0x");
    u16::from_str_radix(digits, 16)
        .map_err(|_| AppError::InvalidArgument(format!("invalid product id '{s}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_numbers() {
        assert_eq!(parse_size("5").unwrap(), 5);
        assert_eq!(parse_size("16368000").unwrap(), 16_368_000);
    }

    #[test]
    fn suffixes() {
        assert_eq!(parse_size("2k").unwrap(), 2_000);
        assert_eq!(parse_size("2K").unwrap(), 2_000);
        assert_eq!(parse_size("3M").unwrap(), 3_000_000);
        assert_eq!(parse_size("1G").unwrap(), 1_000_000_000);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("x").is_err());
        assert!(parse_size("5T").is_err());
        assert!(parse_size("k").is_err());
        assert!(parse_size("0").is_err());
        assert!(parse_size("0k").is_err());
    }

    #[test]
    fn pid_parses_hex_with_or_without_prefix() {
        assert_eq!(parse_pid("0x8398").unwrap(), 0x8398);
        assert_eq!(parse_pid("8398").unwrap(), 0x8398);
        assert!(parse_pid("zz").is_err());
        assert!(parse_pid("0x18398").is_err());
    }
}
