//! licsync REST adapter
//!
//! Implements [`licsync_core::Inventory`] and [`licsync_core::HostRegistry`]
//! against an ARM-style resource API:
//! - `GET` listings follow `nextLink` until exhausted
//! - Patches are sent as `PATCH {"properties": ...}`
//! - HTTP failures map onto [`licsync_core::InventoryError`], with 404 as
//!   the only source of `NotFound`

#![warn(unreachable_pub)]

mod client;
mod error_body;
mod resource;

pub use client::RestInventory;
