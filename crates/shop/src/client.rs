//! Typed shop operations over the engine file pair
//!
//! Each operation is one exchange. The exchange slot is held from encoding
//! until the reply is decoded, so a concurrent call on the same file pair
//! never observes another call's response.

use std::time::Instant;

use ipc::{Channel, Client};
use tracing::debug;

use crate::codec::{decode, Reply};
use crate::command::{Command, Filters};
use crate::error::Result;
use crate::types::{CartAction, CartSnapshot, CheckoutReceipt, Product, Recommendation};

/// Client for catalog, cart and checkout operations
#[derive(Debug, Clone)]
pub struct ShopClient {
    client: Client,
}

impl ShopClient {
    pub fn new(channel: Channel) -> Self {
        Self::from_client(Client::new(channel))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn channel(&self) -> &Channel {
        self.client.channel()
    }

    /// Run one command and decode its reply
    pub async fn execute(&self, command: &Command) -> Result<Reply> {
        let exchange = self.client.lock().await;
        let start = Instant::now();

        let line = command.encode();
        let raw = exchange.send(&line).await?;
        let reply = decode(command, &raw)?;

        debug!(
            verb = %command.verb(),
            elapsed_ms = start.elapsed().as_micros() as f64 / 1000.0,
            "Command complete"
        );
        Ok(reply)
    }

    // ========== Catalog ==========

    pub async fn search(&self, query: &str) -> Result<Vec<Product>> {
        let command = Command::Search {
            query: query.to_string(),
        };
        self.execute(&command).await?.into_products()
    }

    pub async fn search_in_category(&self, category: &str, query: &str) -> Result<Vec<Product>> {
        let command = Command::SearchInCategory {
            category: category.to_string(),
            query: query.to_string(),
        };
        self.execute(&command).await?.into_products()
    }

    pub async fn list_all(&self) -> Result<Vec<Product>> {
        self.execute(&Command::ListAll).await?.into_products()
    }

    pub async fn list_category(&self, category: &str) -> Result<Vec<Product>> {
        let command = Command::ListCategory {
            category: category.to_string(),
        };
        self.execute(&command).await?.into_products()
    }

    /// Whole catalog, filtered by the engine
    pub async fn filtered_query(&self, filters: &Filters) -> Result<Vec<Product>> {
        let command = Command::FilteredQuery {
            filters: filters.clone(),
        };
        self.execute(&command).await?.into_products()
    }

    /// Search matches, filtered by the engine
    pub async fn filtered_search(&self, query: &str, filters: &Filters) -> Result<Vec<Product>> {
        let command = Command::FilteredSearch {
            query: query.to_string(),
            filters: filters.clone(),
        };
        self.execute(&command).await?.into_products()
    }

    pub async fn recommend(&self, name: &str) -> Result<Vec<Recommendation>> {
        let command = Command::Recommend {
            name: name.to_string(),
        };
        self.execute(&command).await?.into_recommendations()
    }

    // ========== Cart ==========

    pub async fn add_to_cart(&self, name: &str, quantity: u32) -> Result<CartAction> {
        let command = Command::AddToCart {
            name: name.to_string(),
            quantity,
        };
        self.execute(&command).await?.into_cart_action()
    }

    pub async fn remove_from_cart(&self, name: &str) -> Result<CartAction> {
        let command = Command::RemoveFromCart {
            name: name.to_string(),
        };
        self.execute(&command).await?.into_cart_action()
    }

    pub async fn show_cart(&self) -> Result<CartSnapshot> {
        self.execute(&Command::ShowCart).await?.into_cart()
    }

    /// Place the order
    ///
    /// A refused payment is a [`CheckoutReceipt::Declined`], not an error.
    pub async fn checkout(&self) -> Result<CheckoutReceipt> {
        self.execute(&Command::Checkout).await?.into_checkout()
    }
}
