//! Common types used across the platform

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::validation::parse_brl_amount;

/// A calendar month (year + month)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthPeriod {
    pub year: i32,
    pub month: u32,
}

impl MonthPeriod {
    /// Build a period, rejecting months outside 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// Period containing the given date
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The month before this one, crossing year boundaries
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// The month after this one, crossing year boundaries
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// First day of the month
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// First day of the following month (exclusive upper bound)
    pub fn end_exclusive(&self) -> NaiveDate {
        self.next().first_day()
    }

    /// Day `day` of this month, clamped to the month's last day
    pub fn day_clamped(&self, day: u32) -> NaiveDate {
        let last = self.end_exclusive().pred_opt().unwrap_or(NaiveDate::MAX).day();
        NaiveDate::from_ymd_opt(self.year, self.month, day.clamp(1, last))
            .unwrap_or_else(|| self.first_day())
    }
}

impl std::fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Period selector used by listing screens
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PeriodFilter {
    #[default]
    CurrentMonth,
    LastMonth,
    All,
}

impl PeriodFilter {
    /// Resolve the filter to a concrete month relative to `today`
    pub fn resolve(&self, today: NaiveDate) -> Option<MonthPeriod> {
        let current = MonthPeriod::containing(today);
        match self {
            PeriodFilter::CurrentMonth => Some(current),
            PeriodFilter::LastMonth => Some(current.previous()),
            PeriodFilter::All => None,
        }
    }
}

/// Date range for queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMoney {
    Text(String),
    Number(Decimal),
}

/// Deserialize a money amount sent either as a JSON number or as a
/// Brazilian-formatted string ("R$ 1.234,56").
pub fn deserialize_money<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawMoney::deserialize(deserializer)? {
        RawMoney::Text(text) => parse_brl_amount(&text),
        RawMoney::Number(value) => value,
    })
}

/// Optional variant of [`deserialize_money`]
pub fn deserialize_optional_money<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawMoney>::deserialize(deserializer)? {
        Some(RawMoney::Text(text)) => Some(parse_brl_amount(&text)),
        Some(RawMoney::Number(value)) => Some(value),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[derive(Deserialize)]
    struct Priced {
        #[serde(deserialize_with = "deserialize_money")]
        price: Decimal,
        #[serde(default, deserialize_with = "deserialize_optional_money")]
        freight: Option<Decimal>,
    }

    #[test]
    fn test_previous_month_crosses_year() {
        let jan = MonthPeriod::new(2024, 1).unwrap();
        assert_eq!(jan.previous(), MonthPeriod::new(2023, 12).unwrap());
        assert_eq!(MonthPeriod::new(2024, 12).unwrap().next(), MonthPeriod::new(2025, 1).unwrap());
    }

    #[test]
    fn test_invalid_month() {
        assert!(MonthPeriod::new(2024, 0).is_none());
        assert!(MonthPeriod::new(2024, 13).is_none());
    }

    #[test]
    fn test_period_bounds() {
        let feb = MonthPeriod::new(2024, 2).unwrap();
        assert_eq!(feb.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(feb.end_exclusive(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(feb.day_clamped(31), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(feb.to_string(), "2024-02");
    }

    #[test]
    fn test_period_filter_resolution() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert_eq!(
            PeriodFilter::LastMonth.resolve(today),
            MonthPeriod::new(2024, 12)
        );
        assert_eq!(
            PeriodFilter::CurrentMonth.resolve(today),
            MonthPeriod::new(2025, 1)
        );
        assert_eq!(PeriodFilter::All.resolve(today), None);
    }

    #[test]
    fn test_money_from_number_and_text() {
        let p: Priced = serde_json::from_str(r#"{"price": 12.5}"#).unwrap();
        assert_eq!(p.price, Decimal::from_str("12.5").unwrap());
        assert!(p.freight.is_none());

        let p: Priced =
            serde_json::from_str(r#"{"price": "R$ 1.234,56", "freight": "10,00"}"#).unwrap();
        assert_eq!(p.price, Decimal::from_str("1234.56").unwrap());
        assert_eq!(p.freight, Some(Decimal::from_str("10.00").unwrap()));
    }
}
