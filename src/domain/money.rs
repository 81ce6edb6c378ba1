use thiserror::Error;

/// Amounts are kept in minor units (paise, cents) so balances reconcile exactly.
/// `1250` is 12.50 in the shop's currency.
pub type Cents = i64;

/// Largest magnitude a single ledger entry may carry (ten billion in major units).
pub const MAX_AMOUNT_CENTS: Cents = 1_000_000_000_000;

/// Format minor units as a plain decimal string.
/// Example: 1250 -> "12.50", -75 -> "-0.75"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Format minor units with a currency symbol in front of the magnitude.
/// Example: ("₹", -1250) -> "-₹12.50"
pub fn format_money(symbol: &str, cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    format!("{}{}{}", sign, symbol, format_cents(cents.abs()))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCentsError {
    #[error("amount is empty")]
    Empty,

    #[error("invalid amount '{0}': expected digits with at most two decimals")]
    InvalidFormat(String),

    #[error("amount '{0}' is too large")]
    Overflow(String),
}

/// Parse a decimal string such as "12.5", "40" or "-3.25" into minor units.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseCentsError::Empty);
    }

    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let invalid = || ParseCentsError::InvalidFormat(trimmed.to_string());
    let overflow = || ParseCentsError::Overflow(trimmed.to_string());

    let (units_str, fraction_str) = digits.split_once('.').unwrap_or((digits, ""));
    if units_str.is_empty() && fraction_str.is_empty() {
        return Err(invalid());
    }
    if !units_str.chars().all(|c| c.is_ascii_digit())
        || !fraction_str.chars().all(|c| c.is_ascii_digit())
        || fraction_str.len() > 2
    {
        return Err(invalid());
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str.parse().map_err(|_| overflow())?
    };
    let fraction: i64 = match fraction_str.len() {
        0 => 0,
        1 => fraction_str.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => fraction_str.parse().map_err(|_| invalid())?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction))
        .ok_or_else(overflow)?;

    Ok(if negative { -cents } else { cents })
}
