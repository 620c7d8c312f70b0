//! Score mod sets and their canonical string form.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// The fixed vocabulary of two-letter mod codes.
pub const MOD_VOCABULARY: [&str; 29] = [
    "1K", "2K", "3K", "4K", "5K", "6K", "7K", "8K", "9K", "AP", "AT", "CM", "CP", "DT", "EZ",
    "FI", "FL", "HD", "HR", "HT", "MR", "NC", "NF", "PF", "RD", "RX", "SD", "SO", "TP",
];

/// The error returned when a mod code is not part of [`MOD_VOCABULARY`].
#[derive(Debug, thiserror::Error)]
#[error("unknown mod code `{0}`")]
pub struct UnknownModError(pub String);

/// An unordered set of score mods.
///
/// The canonical string form is the uppercase concatenation of the member
/// codes in lexicographic order; the empty string means "no mod".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mods(BTreeSet<&'static str>);

impl Mods {
    /// The empty mod set.
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds a mod set from the code list returned by the osu!API.
    pub fn from_codes<'a, I>(codes: I) -> Result<Self, UnknownModError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut mods = BTreeSet::new();
        for code in codes {
            mods.insert(lookup_code(code)?);
        }
        Ok(Self(mods))
    }

    /// Whether the set is the "no mod" set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if the set contains the given code.
    pub fn contains(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    /// The canonical string form of the set.
    pub fn canonical(&self) -> String {
        self.0.iter().copied().collect()
    }
}

fn lookup_code(code: &str) -> Result<&'static str, UnknownModError> {
    let upper = code.to_ascii_uppercase();
    MOD_VOCABULARY
        .iter()
        .find(|known| **known == upper)
        .copied()
        .ok_or_else(|| UnknownModError(code.to_owned()))
}

impl fmt::Display for Mods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for Mods {
    type Err = UnknownModError;

    /// Parses a concatenation of two-letter codes, e.g. `"HDDT"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() % 2 != 0 || !s.is_ascii() {
            return Err(UnknownModError(s.to_owned()));
        }
        Self::from_codes(s.as_bytes().chunks(2).map(|pair| {
            // Chunks of an even-length ASCII string are valid UTF-8.
            std::str::from_utf8(pair).expect("ASCII chunk")
        }))
    }
}

impl Serialize for Mods {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_is_sorted_and_idempotent() {
        let mods = Mods::from_codes(["DT", "HD"]).unwrap();
        assert_eq!(mods.canonical(), "DTHD");
        let reparsed: Mods = mods.canonical().parse().unwrap();
        assert_eq!(reparsed, mods);
        assert_eq!(reparsed.canonical(), mods.canonical());
    }

    #[test]
    fn parse_ignores_input_order_and_case() {
        let a: Mods = "HDDT".parse().unwrap();
        let b: Mods = "dthd".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_string_is_no_mod() {
        let mods: Mods = "".parse().unwrap();
        assert!(mods.is_empty());
        assert_eq!(mods.canonical(), "");
    }

    #[test]
    fn rejects_unknown_codes_and_odd_lengths() {
        assert!("ZZ".parse::<Mods>().is_err());
        assert!("HDD".parse::<Mods>().is_err());
        assert!(Mods::from_codes(["HD", "QQ"]).is_err());
    }

    #[test]
    fn duplicate_codes_collapse() {
        let mods = Mods::from_codes(["HD", "HD", "DT"]).unwrap();
        assert_eq!(mods.canonical(), "DTHD");
    }
}
