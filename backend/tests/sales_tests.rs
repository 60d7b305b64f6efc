//! Sale tracking and money formatting tests

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use shared::{
    format_brl, parse_brl_amount, round_money, sale_document_number, BoletoStatus, InvoiceStatus,
    PaymentMethod, PaymentStatus, SaleRuleError, SaleTracking, SaleTrackingUpdate, ShippingStatus,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn payment_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::Boleto),
        Just(PaymentMethod::Pix),
        Just(PaymentMethod::Cash),
        Just(PaymentMethod::Card),
        Just(PaymentMethod::Transfer),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Only boleto sales carry a boleto status
    #[test]
    fn prop_boleto_status_follows_payment_method(
        initial in payment_method_strategy(),
        changed in payment_method_strategy(),
    ) {
        let tracking = SaleTracking::new(initial, None);
        prop_assert_eq!(tracking.boleto_status.is_some(), initial == PaymentMethod::Boleto);

        let updated = tracking
            .apply_update(&SaleTrackingUpdate {
                payment_method: Some(changed),
                ..Default::default()
            })
            .unwrap();
        prop_assert_eq!(updated.boleto_status.is_some(), changed == PaymentMethod::Boleto);
        if changed != PaymentMethod::Boleto {
            prop_assert!(updated.boleto_number.is_none());
        }
    }

    /// Formatting to BRL and reading it back yields the amount in cents
    #[test]
    fn prop_brl_text_reads_back(cents in -10_000_000i64..10_000_000) {
        let amount = Decimal::new(cents, 2);
        prop_assert_eq!(parse_brl_amount(&format_brl(amount)), amount);
    }
}

#[test]
fn test_new_sale_is_pending() {
    let tracking = SaleTracking::new(PaymentMethod::Pix, Some(date(2024, 5, 10)));
    assert_eq!(tracking.payment_status, PaymentStatus::Pending);
    assert_eq!(tracking.invoice_status, InvoiceStatus::Missing);
    assert_eq!(tracking.shipping_status, ShippingStatus::Pending);
    assert!(tracking.boleto_status.is_none());
}

#[test]
fn test_issuing_invoice_requires_number() {
    let tracking = SaleTracking::new(PaymentMethod::Cash, None);
    let err = tracking
        .apply_update(&SaleTrackingUpdate {
            invoice_status: Some(InvoiceStatus::Issued),
            invoice_number: Some("   ".to_string()),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err, SaleRuleError::InvoiceNumberRequired);

    let issued = tracking
        .apply_update(&SaleTrackingUpdate {
            invoice_status: Some(InvoiceStatus::Issued),
            invoice_number: Some(" NF-123 ".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(issued.invoice_status, InvoiceStatus::Issued);
    assert_eq!(issued.invoice_number.as_deref(), Some("NF-123"));
}

#[test]
fn test_boleto_number_recorded_when_issued() {
    let tracking = SaleTracking::new(PaymentMethod::Boleto, None);
    let issued = tracking
        .apply_update(&SaleTrackingUpdate {
            boleto_status: Some(BoletoStatus::Issued),
            boleto_number: Some("23790.12345".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(issued.boleto_status, Some(BoletoStatus::Issued));
    assert_eq!(issued.boleto_number.as_deref(), Some("23790.12345"));
}

#[test]
fn test_overdue_only_while_unpaid() {
    let today = date(2024, 6, 1);
    let tracking = SaleTracking::new(PaymentMethod::Pix, Some(date(2024, 5, 31)));
    assert!(tracking.is_overdue(today));

    let paid = tracking
        .apply_update(&SaleTrackingUpdate {
            payment_status: Some(PaymentStatus::Paid),
            ..Default::default()
        })
        .unwrap();
    assert!(!paid.is_overdue(today));

    let due_today = SaleTracking::new(PaymentMethod::Pix, Some(today));
    assert!(!due_today.is_overdue(today));
    assert!(!SaleTracking::new(PaymentMethod::Pix, None).is_overdue(today));
}

#[test]
fn test_sale_document_number() {
    assert_eq!(sale_document_number(42), "V-42");
}

#[test]
fn test_brl_helpers() {
    assert_eq!(parse_brl_amount("R$ 1.234,56"), dec("1234.56"));
    assert_eq!(parse_brl_amount(""), Decimal::ZERO);
    assert_eq!(parse_brl_amount("abc"), Decimal::ZERO);
    assert_eq!(format_brl(dec("1234.5")), "R$ 1.234,50");
    assert_eq!(round_money(dec("2.005")), dec("2.01"));
}
