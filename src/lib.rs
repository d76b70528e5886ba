//! Keep a microcontroller's Wi-Fi link alive and check that the network beyond it answers.
//!
//! The crate supervises a radio through the traits in [`platform`]; it never touches
//! hardware itself.
//!
//! - [`station`]: join a network, retry a bounded number of times on link loss, then fall
//!   back to a timed reconnect.
//! - [`probe`]: run a fixed number of echo requests against a host and aggregate the replies.
//! - [`access_point`]: host a network and log clients as they join and leave.
//! - [`time_sync`]: fetch the time from an SNTP server.
//! - [`sync_gate`]: the outcome flags that carry results from the platform's callback
//!   context back to the waiting caller.
//!
//! # Glossary
//!
//! - **Station mode:** the radio is a client joining an access point.
//! - **Access-point mode:** the radio is the access point other devices join.
//! - **Link-down event:** the platform reports that an established or attempted connection
//!   was lost.
//! - **Address-acquired event:** the platform reports that the interface has a usable
//!   address.
//! - **Echo probe:** one bounded-count reachability check (ping) against a target.
//!
//! # Features
//!
//! - `defmt` (default): log through `defmt` on target.
//! - `host`: build for the host (tests, simulation) and log through `log`.
//! - `wifi`: [`net_stack::EmbassyNetStack`], a [`platform::NetStack`] over `embassy-net`.
#![cfg_attr(not(feature = "host"), no_std)]
#![allow(async_fn_in_trait, reason = "single-threaded embedded")]

// Must come first so its macros are visible to the modules below.
mod fmt;

pub mod access_point;
pub mod config;
mod error;
#[cfg(feature = "wifi")]
pub mod net_stack;
pub mod platform;
pub mod probe;
pub mod station;
pub mod sync_gate;
pub mod time_sync;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};
