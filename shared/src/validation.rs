//! Validation and formatting utilities
//!
//! Includes Brazil-specific helpers: BRL amount parsing/formatting and
//! CPF/CNPJ checksum validation for client documents.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use thiserror::Error;

use crate::models::PersonType;

// ============================================================================
// Money
// ============================================================================

/// Parse a Brazilian-formatted amount ("R$ 1.234,56") into a Decimal.
///
/// Blank or unparseable input yields zero. Dots are thousands separators
/// and the comma is the decimal separator.
pub fn parse_brl_amount(input: &str) -> Decimal {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Decimal::ZERO;
    }
    let cleaned: String = trimmed
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    Decimal::from_str(&cleaned).unwrap_or(Decimal::ZERO)
}

/// Format an amount as Brazilian currency ("R$ 1.234,56")
pub fn format_brl(value: Decimal) -> String {
    let rounded = round_money(value);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("{}R$ {},{}", if negative { "-" } else { "" }, grouped, frac_part)
}

/// Round a money amount to cents, half away from zero
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// An amount too large to be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Amount is too large")]
pub struct AmountOverflow;

/// `quantity` x `unit_price`, rounded to cents
pub fn line_total(quantity: i32, unit_price: Decimal) -> Result<Decimal, AmountOverflow> {
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .map(round_money)
        .ok_or(AmountOverflow)
}

pub fn sum_amounts<I>(amounts: I) -> Result<Decimal, AmountOverflow>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, a| acc.checked_add(a).ok_or(AmountOverflow))
}

/// Human-facing product code ("P001")
pub fn format_product_code(number: i64) -> String {
    format!("P{:03}", number)
}

// ============================================================================
// General Validations
// ============================================================================

/// True when the string is empty or only whitespace
pub fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

// ============================================================================
// Brazil-Specific Validations
// ============================================================================

fn digits_of(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let rest = sum % 11;
    if rest < 2 {
        0
    } else {
        11 - rest
    }
}

/// Validate a CPF (individual taxpayer number), 11 digits with two check digits.
/// Accepts formatted input ("123.456.789-09").
pub fn validate_cpf(cpf: &str) -> Result<(), &'static str> {
    let digits = digits_of(cpf);
    if digits.len() != 11 {
        return Err("CPF must have 11 digits");
    }
    if digits.iter().all(|d| *d == digits[0]) {
        return Err("Invalid CPF");
    }

    let first = check_digit(&digits[..9], &[10, 9, 8, 7, 6, 5, 4, 3, 2]);
    let second = check_digit(&digits[..10], &[11, 10, 9, 8, 7, 6, 5, 4, 3, 2]);
    if first != digits[9] || second != digits[10] {
        return Err("Invalid CPF checksum");
    }
    Ok(())
}

/// Validate a CNPJ (company taxpayer number), 14 digits with two check digits.
pub fn validate_cnpj(cnpj: &str) -> Result<(), &'static str> {
    let digits = digits_of(cnpj);
    if digits.len() != 14 {
        return Err("CNPJ must have 14 digits");
    }
    if digits.iter().all(|d| *d == digits[0]) {
        return Err("Invalid CNPJ");
    }

    let first = check_digit(&digits[..12], &[5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]);
    let second = check_digit(&digits[..13], &[6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]);
    if first != digits[12] || second != digits[13] {
        return Err("Invalid CNPJ checksum");
    }
    Ok(())
}

/// Validate a client document according to the person type
pub fn validate_document(person_type: PersonType, document: &str) -> Result<(), &'static str> {
    match person_type {
        PersonType::Individual => validate_cpf(document),
        PersonType::Company => validate_cnpj(document),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_brl_amount() {
        assert_eq!(parse_brl_amount("R$ 1.234,56"), dec("1234.56"));
        assert_eq!(parse_brl_amount("10,5"), dec("10.5"));
        assert_eq!(parse_brl_amount("  42 "), dec("42"));
        assert_eq!(parse_brl_amount("R$1.000.000,00"), dec("1000000.00"));
    }

    #[test]
    fn test_parse_brl_amount_blank_or_invalid_is_zero() {
        assert_eq!(parse_brl_amount(""), Decimal::ZERO);
        assert_eq!(parse_brl_amount("   "), Decimal::ZERO);
        assert_eq!(parse_brl_amount("abc"), Decimal::ZERO);
    }

    #[test]
    fn test_format_brl() {
        assert_eq!(format_brl(dec("1234.56")), "R$ 1.234,56");
        assert_eq!(format_brl(dec("0")), "R$ 0,00");
        assert_eq!(format_brl(dec("999.999")), "R$ 1.000,00");
        assert_eq!(format_brl(dec("1000000")), "R$ 1.000.000,00");
        assert_eq!(format_brl(dec("-5.5")), "-R$ 5,50");
    }

    #[test]
    fn test_format_product_code() {
        assert_eq!(format_product_code(1), "P001");
        assert_eq!(format_product_code(42), "P042");
        assert_eq!(format_product_code(1234), "P1234");
    }

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec("2.345")), dec("2.35"));
        assert_eq!(round_money(dec("2.344")), dec("2.34"));
        assert_eq!(round_money(dec("-2.345")), dec("-2.35"));
    }

    #[test]
    fn test_line_total_rounds_to_cents() {
        assert_eq!(line_total(3, dec("3.335")), Ok(dec("10.01")));
        assert_eq!(sum_amounts([dec("1.10"), dec("2.20")]), Ok(dec("3.30")));
    }

    #[test]
    fn test_line_total_overflow_is_an_error() {
        let huge = parse_brl_amount("79228162514264337593543950335");
        assert_eq!(line_total(3, huge), Err(AmountOverflow));
        assert_eq!(sum_amounts([huge, huge]), Err(AmountOverflow));
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(None));
        assert!(is_blank(Some("  ")));
        assert!(!is_blank(Some("NF-1")));
    }

    #[test]
    fn test_validate_cpf() {
        assert!(validate_cpf("529.982.247-25").is_ok());
        assert!(validate_cpf("52998224725").is_ok());
        assert!(validate_cpf("529.982.247-26").is_err());
        assert!(validate_cpf("111.111.111-11").is_err());
        assert!(validate_cpf("1234").is_err());
    }

    #[test]
    fn test_validate_cnpj() {
        assert!(validate_cnpj("11.222.333/0001-81").is_ok());
        assert!(validate_cnpj("11222333000181").is_ok());
        assert!(validate_cnpj("11.222.333/0001-82").is_err());
        assert!(validate_cnpj("00000000000000").is_err());
    }

    #[test]
    fn test_validate_document_by_person_type() {
        assert!(validate_document(PersonType::Individual, "529.982.247-25").is_ok());
        assert!(validate_document(PersonType::Company, "529.982.247-25").is_err());
        assert!(validate_document(PersonType::Company, "11.222.333/0001-81").is_ok());
    }
}
