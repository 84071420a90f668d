//! IPC transport and line-protocol framing for storefront engine communication
//!
//! This crate provides the low-level infrastructure for talking to the
//! storefront engine: a separate executable that reads one command from a
//! request file and writes its reply to a response file before exiting. It has
//! no product or cart knowledge - it moves command lines in and raw text out,
//! and offers the sentinel/record framing the domain codec builds on.
//!
//! # Architecture
//!
//! ```text
//! Domain Crate (shop)             IPC Crate
//! ┌─────────────────────────┐    ┌─────────────────────────┐
//! │  ShopClient              │───>│  Client / Exchange      │
//! │  (encode, decode, typed) │    │  (one slot per file pair)│
//! └─────────────────────────┘    └───────────┬─────────────┘
//!                                            │ write request file
//!                                            │ spawn + wait (bounded)
//!                                            │ settle, read response file
//!                                            v
//!                                     ┌──────────────┐
//!                                     │    Engine    │
//!                                     └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use ipc::{Channel, Client};
//!
//! let channel = Channel::new("./engine", "input.txt", "output.txt");
//! let client = Client::new(channel);
//!
//! let raw = client.exchange("LISTALL").await?;
//! ```

mod client;
mod error;
pub mod protocol;

pub use client::{Channel, Client, Exchange, DEFAULT_SETTLE_DELAY, DEFAULT_TIMEOUT};
pub use error::TransportError;
pub use protocol::{Block, MalformedRecord, ProtocolError, Record, Scan};
