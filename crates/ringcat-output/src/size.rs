use thiserror::Error;

/// Suffix letter to power of 1024
const MULTIPLIERS: [(char, u32); 3] = [('k', 1), ('m', 2), ('g', 3)];

/// Display labels, indexed by power of 1024
const UNIT_LABELS: [&str; 4] = ["", "K", "M", "G"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SizeParseError {
    #[error("size must start with a decimal number")]
    Empty,

    #[error("unknown size suffix in {0:?}, expected K, M or G")]
    InvalidSuffix(String),

    #[error("size {0:?} does not fit in 64 bits")]
    Overflow(String),
}

/// Parse a byte count with an optional `K`, `M` or `G` suffix (powers of 1024)
pub fn parse_size(text: &str) -> Result<u64, SizeParseError> {
    let digits_end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    if digits_end == 0 {
        return Err(SizeParseError::Empty);
    }

    let (digits, suffix) = text.split_at(digits_end);
    let value: u64 = digits
        .parse()
        .map_err(|_| SizeParseError::Overflow(text.to_string()))?;

    let mut chars = suffix.chars();
    let exponent = match (chars.next(), chars.next()) {
        (None, _) => 0,
        (Some(c), None) => MULTIPLIERS
            .iter()
            .find(|(letter, _)| *letter == c.to_ascii_lowercase())
            .map(|(_, exp)| *exp)
            .ok_or_else(|| SizeParseError::InvalidSuffix(text.to_string()))?,
        _ => return Err(SizeParseError::InvalidSuffix(text.to_string())),
    };

    value
        .checked_mul(1024u64.pow(exponent))
        .ok_or_else(|| SizeParseError::Overflow(text.to_string()))
}

/// Scale a byte count down by 1024 until it is below 1024 or the largest
/// unit is reached, returning the scaled value and its unit label
pub fn decompose(mut value: u64) -> (u64, &'static str) {
    let mut unit = 0;
    while value >= 1024 && unit + 1 < UNIT_LABELS.len() {
        value /= 1024;
        unit += 1;
    }
    (value, UNIT_LABELS[unit])
}

/// Displays a byte count as `<value><unit>`, e.g. `256K`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HumanSize(pub u64);

impl std::fmt::Display for HumanSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (value, unit) = decompose(self.0);
        write!(f, "{value}{unit}")
    }
}
