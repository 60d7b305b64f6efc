//! Sale models and the tracking-status rules applied on update

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::is_blank;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Boleto,
    Pix,
    Cash,
    Card,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Boleto => "boleto",
            PaymentMethod::Pix => "pix",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "boleto" => Some(PaymentMethod::Boleto),
            "pix" => Some(PaymentMethod::Pix),
            "cash" => Some(PaymentMethod::Cash),
            "card" => Some(PaymentMethod::Card),
            "transfer" => Some(PaymentMethod::Transfer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

/// Fiscal invoice (NF) state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Missing,
    Issued,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Missing => "missing",
            InvoiceStatus::Issued => "issued",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "missing" => Some(InvoiceStatus::Missing),
            "issued" => Some(InvoiceStatus::Issued),
            _ => None,
        }
    }
}

/// Bank slip state, only meaningful for boleto payments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoletoStatus {
    Missing,
    Issued,
}

impl BoletoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoletoStatus::Missing => "missing",
            BoletoStatus::Issued => "issued",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "missing" => Some(BoletoStatus::Missing),
            "issued" => Some(BoletoStatus::Issued),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingStatus {
    Pending,
    Shipped,
}

impl ShippingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingStatus::Pending => "pending",
            ShippingStatus::Shipped => "shipped",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ShippingStatus::Pending),
            "shipped" => Some(ShippingStatus::Shipped),
            _ => None,
        }
    }
}

/// Lifecycle status shared by sales and rental orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Active,
    Canceled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Active => "active",
            DocumentStatus::Canceled => "canceled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(DocumentStatus::Active),
            "canceled" => Some(DocumentStatus::Canceled),
            _ => None,
        }
    }
}

/// Listing filter on the sales screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatusFilter {
    /// Not yet paid
    Pending,
    /// Paid
    Finished,
    /// Not paid and past the due date
    Overdue,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaleRuleError {
    #[error("Invoice number is required when the invoice is issued")]
    InvoiceNumberRequired,

    #[error("Canceled sales cannot be changed")]
    SaleCanceled,
}

/// The tracking fields of a sale that operators update after the fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTracking {
    pub payment_method: PaymentMethod,
    pub due_date: Option<NaiveDate>,
    pub payment_status: PaymentStatus,
    pub invoice_status: InvoiceStatus,
    pub invoice_number: Option<String>,
    pub boleto_status: Option<BoletoStatus>,
    pub boleto_number: Option<String>,
    pub shipping_status: ShippingStatus,
}

/// Requested changes; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTrackingUpdate {
    pub due_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: Option<PaymentStatus>,
    pub invoice_status: Option<InvoiceStatus>,
    pub invoice_number: Option<String>,
    pub boleto_status: Option<BoletoStatus>,
    pub boleto_number: Option<String>,
    pub shipping_status: Option<ShippingStatus>,
}

impl SaleTracking {
    /// Initial tracking state of a newly registered sale
    pub fn new(payment_method: PaymentMethod, due_date: Option<NaiveDate>) -> Self {
        Self {
            payment_method,
            due_date,
            payment_status: PaymentStatus::Pending,
            invoice_status: InvoiceStatus::Missing,
            invoice_number: None,
            boleto_status: (payment_method == PaymentMethod::Boleto).then_some(BoletoStatus::Missing),
            boleto_number: None,
            shipping_status: ShippingStatus::Pending,
        }
    }

    /// Apply an update, returning the new state. Nothing changes on error.
    pub fn apply_update(&self, update: &SaleTrackingUpdate) -> Result<Self, SaleRuleError> {
        let mut next = self.clone();

        if let Some(due) = update.due_date {
            next.due_date = Some(due);
        }

        if let Some(method) = update.payment_method {
            if method != next.payment_method {
                next.payment_method = method;
                if method != PaymentMethod::Boleto {
                    next.boleto_status = None;
                    next.boleto_number = None;
                } else if next.boleto_status.is_none() {
                    next.boleto_status = Some(BoletoStatus::Missing);
                }
            }
        }

        if let Some(status) = update.payment_status {
            next.payment_status = status;
        }

        if let Some(status) = update.invoice_status {
            if status == InvoiceStatus::Issued {
                if is_blank(update.invoice_number.as_deref()) {
                    return Err(SaleRuleError::InvoiceNumberRequired);
                }
                next.invoice_number = update.invoice_number.as_ref().map(|n| n.trim().to_string());
            }
            next.invoice_status = status;
        }

        if next.payment_method == PaymentMethod::Boleto {
            if let Some(status) = update.boleto_status {
                next.boleto_status = Some(status);
                if status == BoletoStatus::Issued {
                    next.boleto_number = update
                        .boleto_number
                        .as_ref()
                        .map(|n| n.trim().to_string())
                        .filter(|n| !n.is_empty());
                }
            }
        }

        if let Some(status) = update.shipping_status {
            next.shipping_status = status;
        }

        Ok(next)
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.payment_status != PaymentStatus::Paid && self.due_date.map(|d| d < today).unwrap_or(false)
    }
}

/// Document number written on the stock movements of a sale
pub fn sale_document_number(sale_number: i64) -> String {
    format!("V-{}", sale_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_boleto_sale_starts_missing() {
        let t = SaleTracking::new(PaymentMethod::Boleto, None);
        assert_eq!(t.boleto_status, Some(BoletoStatus::Missing));
        let t = SaleTracking::new(PaymentMethod::Pix, None);
        assert_eq!(t.boleto_status, None);
        assert_eq!(t.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_switch_away_from_boleto_clears_slip() {
        let mut t = SaleTracking::new(PaymentMethod::Boleto, None);
        t.boleto_status = Some(BoletoStatus::Issued);
        t.boleto_number = Some("123".into());
        let next = t
            .apply_update(&SaleTrackingUpdate {
                payment_method: Some(PaymentMethod::Pix),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(next.boleto_status, None);
        assert_eq!(next.boleto_number, None);
    }

    #[test]
    fn test_switch_to_boleto_sets_missing() {
        let t = SaleTracking::new(PaymentMethod::Cash, None);
        let next = t
            .apply_update(&SaleTrackingUpdate {
                payment_method: Some(PaymentMethod::Boleto),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(next.boleto_status, Some(BoletoStatus::Missing));
    }

    #[test]
    fn test_issued_invoice_requires_number() {
        let t = SaleTracking::new(PaymentMethod::Pix, None);
        let err = t
            .apply_update(&SaleTrackingUpdate {
                invoice_status: Some(InvoiceStatus::Issued),
                invoice_number: Some("  ".into()),
                payment_status: Some(PaymentStatus::Paid),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, SaleRuleError::InvoiceNumberRequired);

        let next = t
            .apply_update(&SaleTrackingUpdate {
                invoice_status: Some(InvoiceStatus::Issued),
                invoice_number: Some("NF-77".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(next.invoice_status, InvoiceStatus::Issued);
        assert_eq!(next.invoice_number.as_deref(), Some("NF-77"));
    }

    #[test]
    fn test_boleto_status_ignored_for_other_methods() {
        let t = SaleTracking::new(PaymentMethod::Card, None);
        let next = t
            .apply_update(&SaleTrackingUpdate {
                boleto_status: Some(BoletoStatus::Issued),
                boleto_number: Some("999".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(next.boleto_status, None);
        assert_eq!(next.boleto_number, None);
    }

    #[test]
    fn test_boleto_issued_stores_number() {
        let t = SaleTracking::new(PaymentMethod::Boleto, None);
        let next = t
            .apply_update(&SaleTrackingUpdate {
                boleto_status: Some(BoletoStatus::Issued),
                boleto_number: Some("34191.79001".into()),
                shipping_status: Some(ShippingStatus::Shipped),
                due_date: Some(date(2024, 5, 10)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(next.boleto_status, Some(BoletoStatus::Issued));
        assert_eq!(next.boleto_number.as_deref(), Some("34191.79001"));
        assert_eq!(next.shipping_status, ShippingStatus::Shipped);
        assert_eq!(next.due_date, Some(date(2024, 5, 10)));
    }

    #[test]
    fn test_overdue() {
        let t = SaleTracking::new(PaymentMethod::Pix, Some(date(2024, 3, 1)));
        assert!(t.is_overdue(date(2024, 3, 2)));
        assert!(!t.is_overdue(date(2024, 3, 1)));
        let mut paid = t.clone();
        paid.payment_status = PaymentStatus::Paid;
        assert!(!paid.is_overdue(date(2024, 4, 1)));
    }

    #[test]
    fn test_document_number() {
        assert_eq!(sale_document_number(12), "V-12");
    }
}
