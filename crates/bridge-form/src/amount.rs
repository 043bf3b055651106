use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::AmountError;
use crate::token::TokenKind;

/// Parse free-text user input into the token's smallest unit.
///
/// An empty input is a cleared field and parses to zero. ERC1155 amounts
/// must be whole numbers regardless of `decimals`.
pub fn parse_amount(input: &str, decimals: u8, kind: &TokenKind) -> Result<BigUint, AmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(BigUint::zero());
    }

    let (integer_part, fraction_part) = match input.split_once('.') {
        Some((int, frac)) => (int, frac),
        None => (input, ""),
    };

    if integer_part.is_empty() && fraction_part.is_empty() {
        return Err(AmountError::Invalid(input.to_string()));
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(integer_part) || !all_digits(fraction_part) {
        return Err(AmountError::Invalid(input.to_string()));
    }

    let significant_fraction = fraction_part.trim_end_matches('0');
    if *kind == TokenKind::Erc1155 && !significant_fraction.is_empty() {
        return Err(AmountError::FractionalNotAllowed);
    }
    if significant_fraction.len() > decimals as usize {
        return Err(AmountError::TooManyDecimals { max: decimals });
    }

    let mut digits = String::with_capacity(integer_part.len() + decimals as usize);
    digits.push_str(integer_part);
    digits.push_str(significant_fraction);
    digits.extend(std::iter::repeat_n(
        '0',
        decimals as usize - significant_fraction.len(),
    ));

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(BigUint::zero());
    }
    digits
        .parse::<BigUint>()
        .map_err(|e| AmountError::Invalid(format!("{input}: {e}")))
}

/// Format a smallest-unit amount with decimal places, trimming trailing zeros.
pub fn format_with_decimals(amount: &BigUint, decimals: u8) -> String {
    let s = amount.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return s;
    }

    if s.len() <= decimals {
        let zeros = decimals - s.len();
        let mut result = String::from("0.");
        result.extend(std::iter::repeat_n('0', zeros));
        result.push_str(&s);
        let trimmed = result.trim_end_matches('0');
        if trimmed.ends_with('.') {
            return format!("{trimmed}0");
        }
        return trimmed.to_string();
    }

    let (integer_part, decimal_part) = s.split_at(s.len() - decimals);
    let trimmed = decimal_part.trim_end_matches('0');
    if trimmed.is_empty() {
        integer_part.to_string()
    } else {
        format!("{integer_part}.{trimmed}")
    }
}
