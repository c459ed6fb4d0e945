use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::Product;

// ============================================================================
// Order Value Objects
// ============================================================================

pub type OrderId = i64;
pub type OrderDetailId = i64;

/// Most integer digits a price may carry.
pub const PRICE_MAX_INTEGER_DIGITS: u32 = 10;
/// Fixed number of fractional digits of a price.
pub const PRICE_SCALE: u32 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    New,
    Accepted,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Failed => "failed",
        }
    }

    /// Transition table: which actions the lifecycle allows from this status.
    pub fn permits(&self, action: OrderAction) -> bool {
        match (self, action) {
            (OrderStatus::New, OrderAction::Accept)
            | (OrderStatus::New, OrderAction::Fail)
            | (OrderStatus::New, OrderAction::Update)
            | (OrderStatus::New, OrderAction::Delete)
            | (OrderStatus::Failed, OrderAction::Delete) => true,
            (OrderStatus::Accepted, _)
            | (OrderStatus::Failed, OrderAction::Accept)
            | (OrderStatus::Failed, OrderAction::Fail)
            | (OrderStatus::Failed, OrderAction::Update) => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(OrderStatus::New),
            "accepted" => Ok(OrderStatus::Accepted),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Status-gated operations on an existing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderAction {
    Accept,
    Fail,
    Update,
    Delete,
}

impl OrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::Accept => "accept",
            OrderAction::Fail => "fail",
            OrderAction::Update => "update",
            OrderAction::Delete => "delete",
        }
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line item of an order. `product` is `None` once the product was deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetail {
    pub id: OrderDetailId,
    pub amount: i32,
    pub price: Decimal,
    pub product: Option<Product>,
}

/// Checks the fixed-point shape of a price: at most two fractional digits
/// and ten integer digits. Returns the price rescaled to exactly two digits.
pub fn normalize_price(price: Decimal) -> Result<Decimal, String> {
    let normalized = price.normalize();
    if normalized.scale() > PRICE_SCALE {
        return Err(format!(
            "Ensure that there are no more than {} decimal places.",
            PRICE_SCALE
        ));
    }

    let integer_part = normalized.trunc().abs();
    let integer_digits = if integer_part.is_zero() {
        0
    } else {
        integer_part.to_string().len() as u32
    };
    if integer_digits > PRICE_MAX_INTEGER_DIGITS {
        return Err(format!(
            "Ensure that there are no more than {} digits before the decimal point.",
            PRICE_MAX_INTEGER_DIGITS
        ));
    }

    let mut rescaled = normalized;
    rescaled.rescale(PRICE_SCALE);
    Ok(rescaled)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_new() {
        assert_eq!(OrderStatus::default(), OrderStatus::New);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&OrderStatus::Accepted).unwrap(), "\"accepted\"");
        let parsed: OrderStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, OrderStatus::Failed);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("new".parse::<OrderStatus>().unwrap(), OrderStatus::New);
        assert!("New".parse::<OrderStatus>().is_err());
        assert!("".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_terminal_statuses_permit_no_status_change() {
        for status in [OrderStatus::Accepted, OrderStatus::Failed] {
            assert!(!status.permits(OrderAction::Accept));
            assert!(!status.permits(OrderAction::Fail));
        }
    }

    #[test]
    fn test_transition_table() {
        let actions = [
            OrderAction::Accept,
            OrderAction::Fail,
            OrderAction::Update,
            OrderAction::Delete,
        ];

        for action in actions {
            assert!(OrderStatus::New.permits(action), "new should permit {action}");
            assert!(!OrderStatus::Accepted.permits(action), "accepted should reject {action}");
        }

        assert!(OrderStatus::Failed.permits(OrderAction::Delete));
        assert!(!OrderStatus::Failed.permits(OrderAction::Accept));
        assert!(!OrderStatus::Failed.permits(OrderAction::Fail));
        assert!(!OrderStatus::Failed.permits(OrderAction::Update));
    }

    #[test]
    fn test_normalize_price_pads_to_two_places() {
        let price = normalize_price(Decimal::new(755, 2)).unwrap();
        assert_eq!(price.to_string(), "7.55");

        let whole = normalize_price(Decimal::new(100, 0)).unwrap();
        assert_eq!(whole.to_string(), "100.00");
    }

    #[test]
    fn test_normalize_price_accepts_trailing_zeros() {
        let price = normalize_price(Decimal::new(75500, 4)).unwrap();
        assert_eq!(price.to_string(), "7.55");
    }

    #[test]
    fn test_normalize_price_rejects_three_places() {
        assert!(normalize_price(Decimal::new(7555, 3)).is_err());
    }

    #[test]
    fn test_normalize_price_integer_digit_limit() {
        assert!(normalize_price(Decimal::new(9_999_999_999, 0)).is_ok());
        assert!(normalize_price(Decimal::new(10_000_000_000, 0)).is_err());
    }
}
