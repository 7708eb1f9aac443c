use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Builder;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Fleet vehicle identifier, e.g. `truck_001`.
    VehicleId
);
string_id!(
    /// Posted load identifier, e.g. `load_007`.
    LoadId
);
string_id!(
    /// `trip_` followed by eight hex characters.
    TripId
);
string_id!(
    /// `evt_` followed by eight hex characters.
    EventId
);

/// Eight hex characters taken from a v4 UUID built out of `rng` bytes, so a
/// seeded generator yields reproducible identifiers.
fn short_hex<R: Rng>(rng: &mut R) -> String {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    let uuid = Builder::from_random_bytes(bytes).into_uuid();
    uuid.simple().to_string()[..8].to_string()
}

impl TripId {
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        Self(format!("trip_{}", short_hex(rng)))
    }
}

impl EventId {
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        Self(format!("evt_{}", short_hex(rng)))
    }
}
