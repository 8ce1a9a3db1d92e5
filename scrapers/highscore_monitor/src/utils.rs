use crate::error::MonitorError;

pub fn clean_text(raw: &str) -> String {
    raw.trim().to_string()
}

/// Online players have their name rendered in green.
pub fn is_online(style: Option<&str>) -> bool {
    style
        .map(|s| s.to_ascii_lowercase().contains("green"))
        .unwrap_or(false)
}

/// Removes every `strip` character, trims, then parses a non-negative
/// integer. A single leading `+` is accepted; anything else that is not a
/// digit (including a minus sign) is rejected, as are leading zeros on
/// multi-digit values. Values must fit in an SQLite INTEGER.
pub fn parse_count(field: &'static str, raw: &str, strip: &[char]) -> Result<u64, MonitorError> {
    let stripped: String = raw.chars().filter(|c| !strip.contains(c)).collect();
    let trimmed = stripped.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MonitorError::extraction(field, raw));
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(MonitorError::extraction(field, raw));
    }

    let value = digits
        .parse::<u64>()
        .map_err(|_| MonitorError::extraction(field, raw))?;
    if i64::try_from(value).is_err() {
        return Err(MonitorError::extraction(field, raw));
    }
    Ok(value)
}

pub fn parse_level_rank(raw: &str) -> Result<u32, MonitorError> {
    let value = parse_count("level_rank", raw, &[',', '.'])?;
    u32::try_from(value).map_err(|_| MonitorError::extraction("level_rank", raw))
}

pub fn parse_level(raw: &str) -> Result<u32, MonitorError> {
    let value = parse_count("level", raw, &[])?;
    u32::try_from(value).map_err(|_| MonitorError::extraction("level", raw))
}

pub fn parse_experience(raw: &str) -> Result<u64, MonitorError> {
    parse_count("experience", raw, &[' ', ','])
}
