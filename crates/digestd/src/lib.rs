//! The osu! daily digest daemon.
//!
//! Two jobs run once per day: [`scrape_rankings`] harvests the top-10k
//! rankings of every mode and rolls their day-over-day movement forward;
//! [`top_plays`] harvests the day's best plays and cross-references them
//! against the osu!API. Both commit to the SQLite stores of
//! [`digest_lib`] and trigger the [`publish`] boundary when they finish.
//!
//! The binary lives in `main.rs`; this library target exists so integration
//! tests can drive the scheduler and the pipelines directly.

pub mod daily;
pub mod publish;
pub mod scrape_rankings;
pub mod top_plays;
