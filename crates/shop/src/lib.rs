//! Shop - typed catalog, cart and checkout operations for the storefront engine
//!
//! Commands are encoded to single text lines and exchanged with the engine
//! through [`ipc`]. Replies are decoded using the grammar of the command that
//! was sent, since the engine's output does not name its own shape.
//!
//! ```text
//! ShopClient::add_to_cart("Widget", 2)
//!     │
//!     ├─ Command::AddToCart ── encode ──► "ADD Widget 2"
//!     ├─ ipc::Exchange::send ──────────► raw reply text
//!     └─ codec::decode ────────────────► Reply::CartAction
//! ```

pub mod cli;
pub mod client;
pub mod codec;
pub mod command;
pub mod error;
pub mod grammar;
pub mod handler;
pub mod types;

pub use cli::{CartCommand, FilterArgs, ShopCommand};
pub use client::ShopClient;
pub use codec::{decode, Reply};
pub use command::{Command, Filters, Verb};
pub use error::{Result, ShopError};
pub use grammar::{grammar_for, Grammar, Shape};
pub use handler::handle_shop_command;
pub use types::{CartAction, CartLine, CartSnapshot, CheckoutReceipt, Product, Recommendation};
