use anyhow::{anyhow, Result};
use chrono::FixedOffset;

/// Accepts `Z`, `UTC`, `+HH:MM`, `-HH:MM` and `+HHMM`.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| anyhow!("invalid offset"));
    }
    let (sign, rest) = match trimmed.chars().next() {
        Some('+') => (1, &trimmed[1..]),
        Some('-') => (-1, &trimmed[1..]),
        _ => return Err(anyhow!("timezone must look like +03:00, got '{}'", trimmed)),
    };
    let digits = rest.replace(':', "");
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(anyhow!("timezone must look like +03:00, got '{}'", trimmed));
    }
    let hours: i32 = digits[..2].parse()?;
    let minutes: i32 = digits[2..].parse()?;
    if hours > 14 || minutes > 59 {
        return Err(anyhow!("timezone offset out of range: '{}'", trimmed));
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| anyhow!("timezone offset out of range: '{}'", trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_offsets() {
        assert_eq!(parse_utc_offset("+03:00").expect("offset").local_minus_utc(), 10800);
        assert_eq!(parse_utc_offset("-0530").expect("offset").local_minus_utc(), -19800);
        assert_eq!(parse_utc_offset("UTC").expect("offset").local_minus_utc(), 0);
    }

    #[test]
    fn rejects_named_zones_and_garbage() {
        assert!(parse_utc_offset("Africa/Nairobi").is_err());
        assert!(parse_utc_offset("+3").is_err());
        assert!(parse_utc_offset("+15:00").is_err());
    }
}
