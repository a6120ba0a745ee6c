//! Decimal and timing helpers

use crate::{Error, Result};
use bigdecimal::{BigDecimal, Zero};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

/// Decimals of the chain's native token
pub const NATIVE_DECIMALS: u32 = 18;
/// Decimals of the pool's CW20 tokens
pub const CW20_DECIMALS: u32 = 6;
/// Default deadline for a single chain query
pub const DEFAULT_QUERY_DEADLINE: Duration = Duration::from_secs(5);

fn parse_decimal(value: &str) -> Result<BigDecimal> {
    let value = value.strip_suffix('.').unwrap_or(value);
    BigDecimal::from_str(value)
        .map_err(|e| Error::InvalidArgument(format!("Invalid decimal '{}': {}", value, e)))
}

/// Drop trailing digits of a decimal string while each cut keeps the value within `err`
///
/// Digits are removed one at a time. Trimming stops once removing the next digit
/// would change the value by more than the relative error `err`, or at the integer
/// part. An all-zero result is returned as `"0"`.
///
/// ```
/// use ionflux_client::utils::trim_decimal;
/// assert_eq!(trim_decimal("1.23456789", "0.001").unwrap(), "1.234");
/// ```
pub fn trim_decimal(price: &str, err: &str) -> Result<String> {
    let price = price.trim();
    if !price.contains('.') {
        return Ok(price.to_string());
    }

    parse_decimal(price)?;
    let target = BigDecimal::from(1) - parse_decimal(err)?;
    let mut current = price.to_string();

    loop {
        current.pop();
        if current.ends_with('.') {
            current.pop();
            break;
        }

        let value = parse_decimal(&current)?;
        if value.is_zero() {
            break;
        }
        let next = parse_decimal(&current[..current.len() - 1])?;
        if next / value <= target {
            break;
        }
    }

    if current.chars().all(|c| c == '0' || c == '.') {
        return Ok("0".to_string());
    }
    Ok(current)
}

/// Format a raw integer amount with the given number of decimals
///
/// Trailing fractional zeros are dropped: `format_units(1_500_000, 6) == "1.5"`.
pub fn format_units(raw: u128, decimals: u32) -> String {
    let digits = raw.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');

    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

/// Parse a decimal amount into raw integer units
///
/// More fractional digits than `decimals` is an error rather than a silent truncation.
pub fn parse_units(amount: &str, decimals: u32) -> Result<u128> {
    let amount = amount.trim();
    let invalid = || Error::InvalidArgument(format!("Invalid amount: {}", amount));

    let (int_part, frac_part) = amount.split_once('.').unwrap_or((amount, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !int_part.chars().all(|c| c.is_ascii_digit()) || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    if frac_part.len() > decimals as usize {
        return Err(Error::InvalidArgument(format!(
            "Amount {} has more than {} decimals",
            amount, decimals
        )));
    }

    let digits = format!(
        "{}{:0<width$}",
        int_part,
        frac_part,
        width = decimals as usize
    );
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    digits.parse::<u128>().map_err(|_| invalid())
}

/// Race a future against a deadline
pub async fn with_deadline<F, T>(deadline: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| Error::Timeout(deadline))?
}
