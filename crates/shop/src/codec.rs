//! Decoding engine replies into typed results
//!
//! The issued command picks the grammar. An `ERROR` first line wins over any
//! grammar. Inside a block, each data line decodes on its own: a bad line is
//! logged and dropped while the rest of the block still comes through.

use ipc::protocol::{self, keep_valid};
use ipc::{MalformedRecord, ProtocolError, Record, Scan};
use serde::Serialize;
use tracing::{debug, warn};

use crate::command::Command;
use crate::error::ShopError;
use crate::grammar::{grammar_for, Grammar, Records, Shape, TOTAL_PREFIX};
use crate::types::{CartAction, CartLine, CartSnapshot, CheckoutReceipt, Product, Recommendation};

/// A decoded reply
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Reply {
    Products(Vec<Product>),
    Cart(CartSnapshot),
    Recommendations(Vec<Recommendation>),
    Checkout(CheckoutReceipt),
    CartAction(CartAction),
}

impl Reply {
    pub fn shape(&self) -> Shape {
        match self {
            Reply::Products(_) => Shape::Products,
            Reply::Cart(_) => Shape::Cart,
            Reply::Recommendations(_) => Shape::Recommendations,
            Reply::Checkout(_) => Shape::Checkout,
            Reply::CartAction(_) => Shape::CartAction,
        }
    }

    pub fn into_products(self) -> Result<Vec<Product>, ShopError> {
        match self {
            Reply::Products(products) => Ok(products),
            other => Err(other.mismatch(Shape::Products)),
        }
    }

    pub fn into_cart(self) -> Result<CartSnapshot, ShopError> {
        match self {
            Reply::Cart(cart) => Ok(cart),
            other => Err(other.mismatch(Shape::Cart)),
        }
    }

    pub fn into_recommendations(self) -> Result<Vec<Recommendation>, ShopError> {
        match self {
            Reply::Recommendations(recommendations) => Ok(recommendations),
            other => Err(other.mismatch(Shape::Recommendations)),
        }
    }

    pub fn into_checkout(self) -> Result<CheckoutReceipt, ShopError> {
        match self {
            Reply::Checkout(receipt) => Ok(receipt),
            other => Err(other.mismatch(Shape::Checkout)),
        }
    }

    pub fn into_cart_action(self) -> Result<CartAction, ShopError> {
        match self {
            Reply::CartAction(action) => Ok(action),
            other => Err(other.mismatch(Shape::CartAction)),
        }
    }

    fn mismatch(&self, expected: Shape) -> ShopError {
        ShopError::UnexpectedReply {
            expected,
            found: self.shape(),
        }
    }
}

/// Decode the raw reply to `command`
pub fn decode(command: &Command, raw: &str) -> Result<Reply, ProtocolError> {
    let lines = protocol::lines(raw)?;
    let first = lines[0];
    protocol::check_engine_error(first)?;

    let verb = command.verb();
    let reply = match grammar_for(verb) {
        Grammar::Products(layout) => Reply::Products(block(&lines, layout, product)?),
        Grammar::Recommendations(layout) => {
            Reply::Recommendations(block(&lines, layout, recommendation)?)
        }
        Grammar::Cart(layout) => Reply::Cart(cart(&lines, layout)?),
        Grammar::Checkout { success, detail } => Reply::Checkout(checkout(&lines, success, detail)),
        Grammar::CartAction { success } => match protocol::strip_status(first, success) {
            Some(message) => Reply::CartAction(CartAction {
                message: message.to_string(),
            }),
            None => return Err(ProtocolError::unexpected(*success, first)),
        },
    };

    debug!(verb = %verb, shape = ?reply.shape(), "Decoded reply");
    Ok(reply)
}

/// Decode every data row of a scanned block, keeping failures
pub fn records<'a, T, F>(
    rows: &'a [(usize, &'a str)],
    min_fields: usize,
    decode_row: F,
) -> impl Iterator<Item = Result<T, MalformedRecord>> + 'a
where
    T: 'a,
    F: Fn(&Record<'a>) -> Result<T, MalformedRecord> + 'a,
{
    rows.iter().map(move |&(line_number, line)| {
        let record = Record::split(line_number, line, min_fields)?;
        decode_row(&record)
    })
}

fn block<T>(
    lines: &[&str],
    layout: &Records,
    decode_row: fn(&Record<'_>) -> Result<T, MalformedRecord>,
) -> Result<Vec<T>, ProtocolError> {
    match layout.block.scan(lines)? {
        Scan::Empty => Ok(Vec::new()),
        Scan::Body { rows, .. } => Ok(keep_valid(records(&rows, layout.min_fields, decode_row))),
    }
}

fn cart(lines: &[&str], layout: &Records) -> Result<CartSnapshot, ProtocolError> {
    let (rows, terminator) = match layout.block.scan(lines)? {
        Scan::Empty => return Ok(CartSnapshot::default()),
        Scan::Body {
            rows, terminator, ..
        } => (rows, terminator),
    };

    let cart_lines = keep_valid(records(&rows, layout.min_fields, cart_line));
    let total = terminator
        .and_then(|line| line.strip_prefix(TOTAL_PREFIX))
        .and_then(|value| non_negative(value.trim()));

    let total = match total {
        Some(total) => total,
        None => {
            warn!(terminator = ?terminator, "Cart total missing or invalid, summing line subtotals");
            cart_lines.iter().map(|line| line.subtotal).sum()
        }
    };

    Ok(CartSnapshot {
        lines: cart_lines,
        total,
    })
}

fn checkout(lines: &[&str], success: &str, detail: &str) -> CheckoutReceipt {
    let first = lines[0];
    if first != success {
        return CheckoutReceipt::Declined {
            message: first.to_string(),
        };
    }

    let amount = lines.get(1).and_then(|line| protocol::strip_status(line, detail));
    let total_paid = amount.and_then(non_negative);
    if let (Some(amount), None) = (amount, total_paid) {
        warn!(amount, "Ignoring invalid {} value", detail);
    }
    CheckoutReceipt::Paid { total_paid }
}

fn non_negative(value: &str) -> Option<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

fn name(record: &Record<'_>) -> Result<String, MalformedRecord> {
    match record.text(0) {
        "" => Err(record.invalid("name", "")),
        name => Ok(name.to_string()),
    }
}

fn amount(record: &Record<'_>, index: usize, field: &'static str) -> Result<f64, MalformedRecord> {
    let value: f64 = record.parse(index, field)?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(record.invalid(field, value))
    }
}

fn product(record: &Record<'_>) -> Result<Product, MalformedRecord> {
    let rating = match record.parse_optional::<f64>(4, "rating")? {
        Some(r) if !r.is_finite() || r < 0.0 => return Err(record.invalid("rating", r)),
        rating => rating,
    };
    let brand = match record.text(5) {
        "" => None,
        brand => Some(brand.to_string()),
    };

    Ok(Product {
        name: name(record)?,
        price: amount(record, 1, "price")?,
        stock: record.parse(2, "stock")?,
        category: record.text(3).to_string(),
        rating,
        brand,
    })
}

fn cart_line(record: &Record<'_>) -> Result<CartLine, MalformedRecord> {
    let quantity: u32 = record.parse(1, "quantity")?;
    if quantity == 0 {
        return Err(record.invalid("quantity", quantity));
    }
    Ok(CartLine {
        name: name(record)?,
        quantity,
        unit_price: amount(record, 2, "price")?,
        subtotal: amount(record, 3, "subtotal")?,
    })
}

fn recommendation(record: &Record<'_>) -> Result<Recommendation, MalformedRecord> {
    Ok(Recommendation {
        name: name(record)?,
        price: amount(record, 1, "price")?,
    })
}
