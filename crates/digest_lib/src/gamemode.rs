//! The closed enumeration of the four osu! rulesets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the four osu! rulesets.
///
/// The lowercase name is the form used in osu!API URLs and in the
/// `statistics_rulesets` response keys; osu!track addresses rulesets by an
/// integer code instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gamemode {
    /// The standard circle-clicking ruleset.
    Osu,
    /// The drumming ruleset.
    Taiko,
    /// The fruit-catching ruleset.
    Catch,
    /// The key-mashing ruleset.
    Mania,
}

impl Gamemode {
    /// Every ruleset, in the order the daily jobs process them.
    pub const ALL: [Gamemode; 4] = [
        Gamemode::Osu,
        Gamemode::Taiko,
        Gamemode::Catch,
        Gamemode::Mania,
    ];

    /// The lowercase name of the ruleset.
    pub fn as_str(self) -> &'static str {
        match self {
            Gamemode::Osu => "osu",
            Gamemode::Taiko => "taiko",
            Gamemode::Catch => "catch",
            Gamemode::Mania => "mania",
        }
    }

    /// The integer code the osu!track API uses for the ruleset.
    pub fn osutrack_code(self) -> u8 {
        match self {
            Gamemode::Osu => 0,
            Gamemode::Taiko => 1,
            Gamemode::Catch => 2,
            Gamemode::Mania => 3,
        }
    }

    /// The name of the ruleset's rankings table.
    pub fn rankings_table(self) -> &'static str {
        match self {
            Gamemode::Osu => "OsuRankings",
            Gamemode::Taiko => "TaikoRankings",
            Gamemode::Catch => "CatchRankings",
            Gamemode::Mania => "ManiaRankings",
        }
    }

    /// The name of the ruleset's top plays table.
    pub fn top_plays_table(self) -> &'static str {
        match self {
            Gamemode::Osu => "OsuTopPlays",
            Gamemode::Taiko => "TaikoTopPlays",
            Gamemode::Catch => "CatchTopPlays",
            Gamemode::Mania => "ManiaTopPlays",
        }
    }
}

impl fmt::Display for Gamemode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned when parsing an unknown ruleset name.
#[derive(Debug, thiserror::Error)]
#[error("unknown gamemode `{0}`")]
pub struct UnknownGamemodeError(pub String);

impl FromStr for Gamemode {
    type Err = UnknownGamemodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "osu" => Ok(Gamemode::Osu),
            "taiko" => Ok(Gamemode::Taiko),
            "catch" => Ok(Gamemode::Catch),
            "mania" => Ok(Gamemode::Mania),
            other => Err(UnknownGamemodeError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn osutrack_codes_are_stable() {
        assert_eq!(Gamemode::Osu.osutrack_code(), 0);
        assert_eq!(Gamemode::Taiko.osutrack_code(), 1);
        assert_eq!(Gamemode::Catch.osutrack_code(), 2);
        assert_eq!(Gamemode::Mania.osutrack_code(), 3);
    }

    #[test]
    fn parses_every_lowercase_name() {
        for mode in Gamemode::ALL {
            assert_eq!(mode.as_str().parse::<Gamemode>().unwrap(), mode);
        }
        assert!("standard".parse::<Gamemode>().is_err());
    }

    #[test]
    fn table_names_are_distinct() {
        let mut tables: Vec<_> = Gamemode::ALL
            .iter()
            .flat_map(|m| [m.rankings_table(), m.top_plays_table()])
            .collect();
        tables.sort_unstable();
        tables.dedup();
        assert_eq!(tables.len(), 8);
    }
}
