// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// An SNMP object identifier, stored as its numeric arcs.
#[derive(
    Clone,
    Default,
    Deserialize,
    Serialize,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
)]
#[serde(try_from = "String", into = "String")]
pub struct Oid {
    arcs: Vec<u64>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OidError {
    /// The identifier had no arcs at all
    #[error("empty object identifier")]
    Empty,
    /// One of the dot-separated components was not a number
    #[error("invalid arc in object identifier: {0:?}")]
    InvalidArc(String),
}

impl Oid {
    pub fn new(arcs: &[u64]) -> Self {
        Oid {
            arcs: arcs.to_vec(),
        }
    }

    pub fn arcs(&self) -> &[u64] {
        &self.arcs
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Return a new identifier with `arcs` appended to this one.
    pub fn child(&self, arcs: &[u64]) -> Oid {
        let mut child = self.arcs.clone();
        child.extend_from_slice(arcs);
        Oid { arcs: child }
    }

    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.arcs.starts_with(&prefix.arcs)
    }

    /// If `prefix` is a proper prefix of this identifier, return the
    /// remaining trailing arcs.  These identify a row within a table column.
    pub fn suffix(&self, prefix: &Oid) -> Option<&[u64]> {
        match self.arcs.strip_prefix(prefix.arcs.as_slice()) {
            Some(rest) if !rest.is_empty() => Some(rest),
            _ => None,
        }
    }
}

impl From<&[u64]> for Oid {
    fn from(arcs: &[u64]) -> Self {
        Oid::new(arcs)
    }
}

impl<const N: usize> From<[u64; N]> for Oid {
    fn from(arcs: [u64; N]) -> Self {
        Oid::new(&arcs)
    }
}

impl FromStr for Oid {
    type Err = OidError;

    fn from_str(s: &str) -> Result<Self, OidError> {
        // Accept the leading dot some tools print in front of the first arc
        let s = s.trim().trim_start_matches('.');
        if s.is_empty() {
            return Err(OidError::Empty);
        }
        let arcs = s
            .split('.')
            .map(|arc| {
                arc.parse::<u64>()
                    .map_err(|_| OidError::InvalidArc(arc.to_string()))
            })
            .collect::<Result<Vec<u64>, OidError>>()?;
        Ok(Oid { arcs })
    }
}

impl TryFrom<String> for Oid {
    type Error = OidError;

    fn try_from(s: String) -> Result<Self, OidError> {
        s.parse()
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> String {
        oid.to_string()
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{arc}")?;
            first = false;
        }
        Ok(())
    }
}

impl JsonSchema for Oid {
    fn schema_name() -> String {
        "Oid".to_string()
    }

    fn json_schema(
        gen: &mut schemars::gen::SchemaGenerator,
    ) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::Oid;
    use super::OidError;

    #[test]
    fn test_parse() {
        let oid: Oid = "1.3.6.1.2.1.1.5.0".parse().unwrap();
        assert_eq!(oid.arcs(), &[1, 3, 6, 1, 2, 1, 1, 5, 0]);

        let dotted: Oid = ".1.3.6.1".parse().unwrap();
        assert_eq!(dotted, Oid::from([1, 3, 6, 1]));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Oid>(), Err(OidError::Empty));
        assert_eq!(
            "1.3.x.1".parse::<Oid>(),
            Err(OidError::InvalidArc("x".to_string()))
        );
    }

    #[test]
    fn test_to_string() {
        let oid = Oid::from([1, 0, 8802, 1, 1, 2, 1, 4, 1, 1, 9]);
        assert_eq!(oid.to_string(), "1.0.8802.1.1.2.1.4.1.1.9");
    }

    #[test]
    fn test_suffix() {
        let column = Oid::from([1, 3, 6, 1, 2, 1, 2, 2, 1, 2]);
        let row = column.child(&[17]);
        assert_eq!(row.suffix(&column), Some(&[17u64][..]));

        // The column itself has no row suffix
        assert_eq!(column.suffix(&column), None);

        // Neither does an identifier from a different column
        let other = Oid::from([1, 3, 6, 1, 2, 1, 2, 2, 1, 3, 17]);
        assert_eq!(other.suffix(&column), None);
    }

    #[test]
    fn test_string_conversion() {
        let oid = Oid::from([1, 3, 6, 1, 4, 1, 9]);
        let s = String::from(oid.clone());
        assert_eq!(s, "1.3.6.1.4.1.9");
        assert_eq!(Oid::try_from(s).unwrap(), oid);
    }
}
