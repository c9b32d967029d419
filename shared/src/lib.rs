//! Game rules and wire types shared by the merge arcade server and web client.
//!
//! Everything here is deterministic and free of I/O so the same board code
//! can run authoritatively on the server or locally in the browser.

pub mod api;
pub mod board;
pub mod config;
pub mod icons;
pub mod physics;
pub mod protocol;
pub mod quiz;
pub mod vec2;
