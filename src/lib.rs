//! Authenticated client for the Thryve learning-management API.
//!
//! The crate keeps a signed-in session alive: expired access tokens are
//! refreshed before use, rejected ones are refreshed and the request is
//! resubmitted once, and concurrent refreshes collapse into one call to the
//! backend. See [`client::ApiClient`] for the entry point and
//! [`session::SessionManager`] for the refresh coordination.
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod identity;
pub mod navigator;
pub mod protocol;
pub mod session;
pub mod store;
pub mod token;
pub mod util;
