#![deny(clippy::expect_used, clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

//! The root of the CSMA/ECA contention engine library.
//! CSMA/ECA 竞争引擎库的根。

pub mod config;
pub mod error;
pub mod time;

pub mod mac;
pub mod sim;
