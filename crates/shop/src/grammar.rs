//! Reply grammar for each command verb
//!
//! Replies are not self-describing, so the decoder looks up the grammar of
//! the command that was issued. Supporting a new command means adding a row
//! here, not new parsing code.

use ipc::Block;

use crate::command::Verb;

pub const NO_RESULTS: &str = "NO_RESULTS";
pub const CART_EMPTY: &str = "CART_EMPTY";
pub const NO_RECOMMENDATIONS: &str = "NO_RECOMMENDATIONS";
pub const TOTAL_PREFIX: &str = "TOTAL:";
pub const CHECKOUT_SUCCESS: &str = "CHECKOUT_SUCCESS";
pub const TOTAL_PAID: &str = "TOTAL_PAID";
pub const SUCCESS: &str = "SUCCESS";

/// Fields every product record carries: name, price, stock, category
pub const PRODUCT_FIELDS: usize = 4;
/// name, quantity, unit price, subtotal
pub const CART_FIELDS: usize = 4;
/// name, price
pub const RECOMMENDATION_FIELDS: usize = 2;

/// Kind of typed result a grammar yields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Products,
    Cart,
    Recommendations,
    Checkout,
    CartAction,
}

/// Sentinel-bounded block of pipe-delimited records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Records {
    pub block: Block,
    pub min_fields: usize,
}

impl Records {
    const fn new(block: Block, min_fields: usize) -> Self {
        Self { block, min_fields }
    }
}

/// Wire layout and result kind of one reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    Products(Records),
    Cart(Records),
    Recommendations(Records),
    /// Status line, optionally followed by a `detail: amount` line
    Checkout {
        success: &'static str,
        detail: &'static str,
    },
    /// Single status line; the text after the token is the message
    CartAction { success: &'static str },
}

impl Grammar {
    pub fn shape(&self) -> Shape {
        match self {
            Grammar::Products(_) => Shape::Products,
            Grammar::Cart(_) => Shape::Cart,
            Grammar::Recommendations(_) => Shape::Recommendations,
            Grammar::Checkout { .. } => Shape::Checkout,
            Grammar::CartAction { .. } => Shape::CartAction,
        }
    }

    /// Record layout, for block-shaped replies
    pub fn records(&self) -> Option<&Records> {
        match self {
            Grammar::Products(records) | Grammar::Cart(records) | Grammar::Recommendations(records) => {
                Some(records)
            }
            Grammar::Checkout { .. } | Grammar::CartAction { .. } => None,
        }
    }
}

static SEARCH: Grammar = Grammar::Products(Records::new(
    Block::new(
        &["SEARCH_RESULTS", "CATEGORY_SEARCH_RESULTS"],
        &["SEARCH_END", "CATEGORY_SEARCH_END"],
    )
    .with_empty(NO_RESULTS),
    PRODUCT_FIELDS,
));

static LIST_ALL: Grammar = Grammar::Products(Records::new(
    Block::new(&["ALL_PRODUCTS"], &["PRODUCTS_END"]),
    PRODUCT_FIELDS,
));

static LIST_CATEGORY: Grammar = Grammar::Products(Records::new(
    Block::new(&["CATEGORY_PRODUCTS"], &["CATEGORY_PRODUCTS_END"]),
    PRODUCT_FIELDS,
));

static LIST_FILTERED: Grammar = Grammar::Products(Records::new(
    Block::new(&["ALL_PRODUCTS"], &["PRODUCTS_END"]).with_empty(NO_RESULTS),
    PRODUCT_FIELDS,
));

static SHOW_CART: Grammar = Grammar::Cart(Records::new(
    Block::new(&["CART_START"], &[])
        .with_empty(CART_EMPTY)
        .with_terminator(TOTAL_PREFIX)
        .skipping(&["CART_END"]),
    CART_FIELDS,
));

static RECOMMEND: Grammar = Grammar::Recommendations(Records::new(
    Block::new(&["RECOMMENDATIONS"], &["RECOMMEND_END"]).with_empty(NO_RECOMMENDATIONS),
    RECOMMENDATION_FIELDS,
));

static CHECKOUT: Grammar = Grammar::Checkout {
    success: CHECKOUT_SUCCESS,
    detail: TOTAL_PAID,
};

static CART_ACTION: Grammar = Grammar::CartAction { success: SUCCESS };

/// Reply grammar for a verb
pub fn grammar_for(verb: Verb) -> &'static Grammar {
    match verb {
        Verb::Search | Verb::SearchCat | Verb::SearchFilter => &SEARCH,
        Verb::ListAll => &LIST_ALL,
        Verb::ListCat => &LIST_CATEGORY,
        Verb::ListAllFilter => &LIST_FILTERED,
        Verb::ShowCart => &SHOW_CART,
        Verb::Recommend => &RECOMMEND,
        Verb::Checkout => &CHECKOUT,
        Verb::Add | Verb::Remove => &CART_ACTION,
    }
}
