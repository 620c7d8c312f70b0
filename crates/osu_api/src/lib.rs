//! Clients of the two upstream APIs the daily digests are harvested from.
//!
//! The [`osu`] module speaks to the osu!API v2 (OAuth-protected rankings,
//! users, beatmaps and per-beatmap scores); the [`osutrack`] module speaks to
//! the osu!track best-plays API. Both share the single-shot [`http`]
//! transport, and the osu!API client shares one [`token`] manager across all
//! of its workers.

#![warn(missing_docs)]

pub mod backoff;
pub mod http;
pub mod osu;
pub mod osutrack;
pub mod token;
