//! Apple Music service adapter: DTOs, adapter, and HTTP client.

mod adapter;
mod client;
mod dto;

pub use client::AppleMusicClient;
