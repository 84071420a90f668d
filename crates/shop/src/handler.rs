//! Command handlers for the storefront CLI

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::{CartCommand, ShopCommand};
use crate::client::ShopClient;
use crate::command::Filters;
use crate::types::{CartSnapshot, CheckoutReceipt, Product, Recommendation};

/// Handle a shop command, printing the result to stdout
pub async fn handle_shop_command(cmd: ShopCommand, client: &ShopClient, json: bool) -> Result<()> {
    match cmd {
        ShopCommand::Search { query, category } => {
            let products = match category {
                Some(category) => client.search_in_category(&category, &query).await,
                None => client.search(&query).await,
            }
            .with_context(|| format!("Search for {query:?} failed"))?;
            emit(json, &products, || print_products(&products))
        }

        ShopCommand::List { category } => {
            let products = match category {
                Some(category) => client.list_category(&category).await,
                None => client.list_all().await,
            }
            .context("Failed to list products")?;
            emit(json, &products, || print_products(&products))
        }

        ShopCommand::Filter { query, filters } => {
            let filters = Filters::from(filters);
            let products = match query {
                Some(query) => client.filtered_search(&query, &filters).await,
                None => client.filtered_query(&filters).await,
            }
            .context("Filtered listing failed")?;
            emit(json, &products, || print_products(&products))
        }

        ShopCommand::Recommend { name } => {
            let recommendations = client
                .recommend(&name)
                .await
                .with_context(|| format!("Failed to get recommendations for {name:?}"))?;
            emit(json, &recommendations, || print_recommendations(&name, &recommendations))
        }

        ShopCommand::Cart(cart_cmd) => handle_cart_command(cart_cmd, client, json).await,

        ShopCommand::Checkout => {
            let receipt = client.checkout().await.context("Checkout failed")?;
            emit(json, &receipt, || print_receipt(&receipt))
        }
    }
}

async fn handle_cart_command(cmd: CartCommand, client: &ShopClient, json: bool) -> Result<()> {
    match cmd {
        CartCommand::Add { name, qty } => {
            let action = client
                .add_to_cart(&name, qty)
                .await
                .with_context(|| format!("Failed to add {name:?} to cart"))?;
            emit(json, &action, || println!("{}", or_default(&action.message, "Added to cart")))
        }
        CartCommand::Remove { name } => {
            let action = client
                .remove_from_cart(&name)
                .await
                .with_context(|| format!("Failed to remove {name:?} from cart"))?;
            emit(json, &action, || println!("{}", or_default(&action.message, "Removed from cart")))
        }
        CartCommand::Show => {
            let cart = client.show_cart().await.context("Failed to show cart")?;
            emit(json, &cart, || print_cart(&cart))
        }
    }
}

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human();
    }
    Ok(())
}

fn or_default<'a>(message: &'a str, default: &'a str) -> &'a str {
    if message.is_empty() {
        default
    } else {
        message
    }
}

fn print_products(products: &[Product]) {
    if products.is_empty() {
        println!("No products found");
        return;
    }

    let width = products.iter().map(|p| p.name.len()).max().unwrap_or(0);
    for product in products {
        let rating = product
            .rating
            .map(|r| format!("{r:.1}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<width$}  {:>10.2}  stock:{:<4}  {}  rating:{}  {}",
            product.name,
            product.price,
            product.stock,
            product.category,
            rating,
            product.brand.as_deref().unwrap_or("-"),
        );
    }
}

fn print_recommendations(name: &str, recommendations: &[Recommendation]) {
    if recommendations.is_empty() {
        println!("No recommendations for {name}");
        return;
    }

    println!("Bought together with {name}:");
    for recommendation in recommendations {
        println!("  {} ({:.2})", recommendation.name, recommendation.price);
    }
}

fn print_cart(cart: &CartSnapshot) {
    if cart.is_empty() {
        println!("Cart is empty");
        return;
    }

    let width = cart.lines.iter().map(|l| l.name.len()).max().unwrap_or(0);
    for line in &cart.lines {
        println!(
            "{:<width$}  {:>4} x {:>10.2}  {:>10.2}",
            line.name, line.quantity, line.unit_price, line.subtotal
        );
    }
    println!("Total: {:.2} ({} items)", cart.total, cart.item_count());
}

fn print_receipt(receipt: &CheckoutReceipt) {
    match receipt {
        CheckoutReceipt::Paid {
            total_paid: Some(total),
        } => println!("Checkout complete, paid {total:.2}"),
        CheckoutReceipt::Paid { total_paid: None } => println!("Checkout complete"),
        CheckoutReceipt::Declined { message } => println!("Checkout declined: {message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_action_message_falls_back() {
        assert_eq!(or_default("", "Added to cart"), "Added to cart");
        assert_eq!(or_default("Added Widget", "Added to cart"), "Added Widget");
    }
}
