#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod client;
pub mod clock;
pub mod config;
pub mod connection;
pub mod coord;
pub mod display;
pub mod error;
pub mod event;
pub mod force;
pub mod grid;
pub mod network;
pub mod phase;
pub mod piece;
pub mod preview;
pub mod quiz;
pub mod session;
pub mod test_util;
