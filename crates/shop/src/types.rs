//! Typed results decoded from engine replies

use serde::{Deserialize, Serialize};

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub price: f64,
    pub stock: u32,
    pub category: String,
    /// Average rating, when the engine reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

/// One line of the cart
///
/// `subtotal` is the engine's `quantity * unit_price`; it is not recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub subtotal: f64,
}

/// Cart contents at the time of the exchange
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    pub total: f64,
}

impl CartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of units across all lines
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }
}

/// A product suggested alongside another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub name: String,
    pub price: f64,
}

/// Outcome of a checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckoutReceipt {
    /// The order went through; the engine may omit the amount
    Paid { total_paid: Option<f64> },
    /// The engine refused, with its reason line verbatim
    Declined { message: String },
}

impl CheckoutReceipt {
    pub fn success(&self) -> bool {
        matches!(self, Self::Paid { .. })
    }
}

/// Acknowledgement of an add or remove
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartAction {
    pub message: String,
}
