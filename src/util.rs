use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

pub fn format_minutes(minutes: f64) -> String {
    if !minutes.is_finite() || minutes <= 0.0 {
        return "0 min".to_owned();
    }

    if minutes < 90.0 {
        format!("{minutes:.0} min")
    } else {
        let hours = minutes / 60.0;
        if hours < 48.0 {
            format!("{hours:.1} h")
        } else {
            format!("{:.1} d", hours / 24.0)
        }
    }
}

/// Claim numbers are stored with leading zeros, so a bare digit query is
/// left-padded to the catalog width before lookup.
pub fn normalize_claim_query(query: &str, pad_width: usize) -> String {
    let trimmed = query.trim();
    if pad_width > 0
        && !trimmed.is_empty()
        && trimmed.len() < pad_width
        && trimmed.chars().all(|c| c.is_ascii_digit())
    {
        let mut padded = "0".repeat(pad_width - trimmed.len());
        padded.push_str(trimmed);
        padded
    } else {
        trimmed.to_owned()
    }
}

pub fn stable_pair(id: &str) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let hash = hasher.finish();

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = (((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}
