//! The main crate of the osu! daily digest infrastructure.
//!
//! This crate is shared by the services that harvest and publish the daily
//! digests. It contains the configuration loading, the domain models and
//! enumerations, and the SQLite stores the harvest jobs write to.
//!
//! If you wish to see the crate of the daemon itself, take a look at the
//! [`digestd`](../digestd_lib/index.html) package.

#![warn(missing_docs)]

mod db;

pub mod config;
pub mod error;
pub mod gamemode;
pub mod models;
pub mod mods;
pub mod rank_range;
pub mod rankings;
pub mod subscriptions;
pub mod sync;
pub mod time;
pub mod top_plays;

use rand::Rng as _;

/// Returns a randomly-generated string with the `len` length. It contains alphanumeric characters.
pub fn gen_random_str(len: usize) -> String {
    rand::rng()
        .sample_iter(rand::distr::Alphanumeric)
        .map(char::from)
        .take(len)
        .collect()
}
