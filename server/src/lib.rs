//! Merge arcade server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod game_loop;
pub mod qr;
pub mod state;
pub mod store;
pub mod ws;
