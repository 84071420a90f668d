//! Engine commands and their wire encoding
//!
//! Encoding is plain string assembly. Arguments are written verbatim: the
//! protocol has no quoting, so a name containing a space or `|` reaches the
//! engine as-is and its meaning is up to the engine.

use std::fmt;

/// Leading token of a command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Search,
    SearchCat,
    ListAll,
    ListCat,
    ListAllFilter,
    SearchFilter,
    Add,
    Remove,
    ShowCart,
    Checkout,
    Recommend,
}

impl Verb {
    pub const ALL: [Verb; 11] = [
        Verb::Search,
        Verb::SearchCat,
        Verb::ListAll,
        Verb::ListCat,
        Verb::ListAllFilter,
        Verb::SearchFilter,
        Verb::Add,
        Verb::Remove,
        Verb::ShowCart,
        Verb::Checkout,
        Verb::Recommend,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Search => "SEARCH",
            Verb::SearchCat => "SEARCHCAT",
            Verb::ListAll => "LISTALL",
            Verb::ListCat => "LISTCAT",
            Verb::ListAllFilter => "LISTALLFILTER",
            Verb::SearchFilter => "SEARCHFILTER",
            Verb::Add => "ADD",
            Verb::Remove => "REMOVE",
            Verb::ShowCart => "SHOWCART",
            Verb::Checkout => "CHECKOUT",
            Verb::Recommend => "RECOMMEND",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product filters for the filtered list and search commands
///
/// Unset fields produce no clause. Brands share one `brand=` clause,
/// comma-separated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<f64>,
    pub brands: Vec<String>,
    pub category: Option<String>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_price(mut self, value: f64) -> Self {
        self.min_price = Some(value);
        self
    }

    pub fn max_price(mut self, value: f64) -> Self {
        self.max_price = Some(value);
        self
    }

    pub fn min_rating(mut self, value: f64) -> Self {
        self.min_rating = Some(value);
        self
    }

    pub fn brand(mut self, brand: impl Into<String>) -> Self {
        self.brands.push(brand.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// `key=value` clauses in wire order
    pub fn clauses(&self) -> Vec<String> {
        let mut clauses = Vec::new();
        if let Some(v) = self.min_price {
            clauses.push(format!("min_price={v}"));
        }
        if let Some(v) = self.max_price {
            clauses.push(format!("max_price={v}"));
        }
        if let Some(v) = self.min_rating {
            clauses.push(format!("min_rating={v}"));
        }
        let brands: Vec<&str> = self
            .brands
            .iter()
            .map(|b| b.trim())
            .filter(|b| !b.is_empty())
            .collect();
        if !brands.is_empty() {
            clauses.push(format!("brand={}", brands.join(",")));
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.trim().is_empty()) {
            clauses.push(format!("category={category}"));
        }
        clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses().is_empty()
    }
}

impl fmt::Display for Filters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.clauses().join(";"))
    }
}

/// One request to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Search { query: String },
    SearchInCategory { category: String, query: String },
    ListAll,
    ListCategory { category: String },
    /// Engine-side filtering of the whole catalog
    FilteredQuery { filters: Filters },
    /// Engine-side filtering of search matches
    FilteredSearch { query: String, filters: Filters },
    AddToCart { name: String, quantity: u32 },
    RemoveFromCart { name: String },
    ShowCart,
    Checkout,
    Recommend { name: String },
}

impl Command {
    pub fn verb(&self) -> Verb {
        match self {
            Command::Search { .. } => Verb::Search,
            Command::SearchInCategory { .. } => Verb::SearchCat,
            Command::ListAll => Verb::ListAll,
            Command::ListCategory { .. } => Verb::ListCat,
            Command::FilteredQuery { .. } => Verb::ListAllFilter,
            Command::FilteredSearch { .. } => Verb::SearchFilter,
            Command::AddToCart { .. } => Verb::Add,
            Command::RemoveFromCart { .. } => Verb::Remove,
            Command::ShowCart => Verb::ShowCart,
            Command::Checkout => Verb::Checkout,
            Command::Recommend { .. } => Verb::Recommend,
        }
    }

    /// The command line, without the trailing newline
    pub fn encode(&self) -> String {
        let verb = self.verb();
        match self {
            Command::Search { query } => format!("{verb} {query}"),
            Command::SearchInCategory { category, query } => format!("{verb} {category} {query}"),
            Command::ListCategory { category } => format!("{verb} {category}"),
            Command::FilteredQuery { filters } if filters.is_empty() => verb.to_string(),
            Command::FilteredQuery { filters } => format!("{verb} {filters}"),
            Command::FilteredSearch { query, filters } if filters.is_empty() => {
                format!("{verb} {query}")
            }
            Command::FilteredSearch { query, filters } => format!("{verb} {query}|{filters}"),
            Command::AddToCart { name, quantity } => format!("{verb} {name} {quantity}"),
            Command::RemoveFromCart { name } | Command::Recommend { name } => {
                format!("{verb} {name}")
            }
            Command::ListAll | Command::ShowCart | Command::Checkout => verb.to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
