//! CLI command definitions for the storefront
//!
//! The binary flattens these into its own command tree.

use clap::{Args, Subcommand};

use crate::command::Filters;

/// Catalog, cart and checkout commands
#[derive(Debug, Subcommand)]
pub enum ShopCommand {
    /// Search products by name
    Search {
        /// Search text
        query: String,
        /// Only search within this category
        #[arg(short, long)]
        category: Option<String>,
    },

    /// List the catalog
    List {
        /// Only list this category
        #[arg(short, long)]
        category: Option<String>,
    },

    /// List products matching price, rating, brand or category filters
    Filter {
        /// Only products whose name matches this text
        #[arg(short, long)]
        query: Option<String>,
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Show products often bought with another
    Recommend {
        /// Product name
        name: String,
    },

    /// Manage the cart
    #[command(subcommand)]
    Cart(CartCommand),

    /// Pay for the cart
    Checkout,
}

/// Filter flags shared by filtered listings
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Minimum price
    #[arg(long)]
    pub min_price: Option<f64>,
    /// Maximum price
    #[arg(long)]
    pub max_price: Option<f64>,
    /// Minimum average rating
    #[arg(long)]
    pub min_rating: Option<f64>,
    /// Brand to include (repeatable)
    #[arg(short, long = "brand")]
    pub brands: Vec<String>,
    /// Category to include
    #[arg(short, long)]
    pub category: Option<String>,
}

impl From<FilterArgs> for Filters {
    fn from(args: FilterArgs) -> Self {
        Filters {
            min_price: args.min_price,
            max_price: args.max_price,
            min_rating: args.min_rating,
            brands: args.brands,
            category: args.category,
        }
    }
}

/// Commands for the cart
#[derive(Debug, Subcommand)]
pub enum CartCommand {
    /// Add a product to the cart
    Add {
        /// Product name
        name: String,
        /// Number of units
        #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
        qty: u32,
    },

    /// Remove a product from the cart
    Remove {
        /// Product name
        name: String,
    },

    /// Show the cart contents and total
    Show,
}
