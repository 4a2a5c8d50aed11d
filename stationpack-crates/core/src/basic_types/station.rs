use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use serde::de::Visitor;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

/// A channel a station can be assigned to.
pub type Channel = u32;

/// A broadcast station, identified by its integer id.
///
/// The station's global domain and its interference relationships are not stored here; they are
/// looked up through the [`StationManager`] and [`ConstraintManager`] collaborators.
///
/// In JSON a station is written as a string (`"3"`), matching its use as an object key. Both
/// strings and integers are accepted when reading.
///
/// [`StationManager`]: crate::data::StationManager
/// [`ConstraintManager`]: crate::data::ConstraintManager
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Station {
    id: u32,
}

impl Station {
    pub const fn new(id: u32) -> Station {
        Station { id }
    }

    pub const fn id(self) -> u32 {
        self.id
    }
}

impl From<u32> for Station {
    fn from(id: u32) -> Self {
        Station::new(id)
    }
}

impl Display for Station {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl FromStr for Station {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(Station::new)
    }
}

impl Serialize for Station {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Station {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(StationVisitor)
    }
}

struct StationVisitor;

impl Visitor<'_> for StationVisitor {
    type Value = Station;

    fn expecting(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "a station id as a string or a non-negative integer")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse::<Station>()
            .map_err(|_| E::invalid_value(serde::de::Unexpected::Str(v), &self))
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
        u32::try_from(v)
            .map(Station::new)
            .map_err(|_| E::invalid_value(serde::de::Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u32::try_from(v)
            .map(Station::new)
            .map_err(|_| E::invalid_value(serde::de::Unexpected::Signed(v), &self))
    }
}
