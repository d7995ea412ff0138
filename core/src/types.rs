//! Domain types: identifiers, routes, riders and boarding records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Wrap a raw database identifier.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// The raw identifier.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a rider account (owned by the account subsystem).
    UserId
);
numeric_id!(
    /// Identifier of a shuttle route.
    RouteId
);
numeric_id!(
    /// Identifier of a named stop.
    LocationId
);
numeric_id!(
    /// Identifier of a boarding ledger row.
    BoardingId
);

/// A named stop with coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Location ID.
    pub id: LocationId,
    /// Display name (e.g. "Gwacheon Government Complex").
    pub name: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// A shuttle route. Reference data: looked up, never mutated by this system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShuttleRoute {
    /// Route ID.
    pub id: RouteId,
    /// Display name.
    pub name: String,
    /// Where the route starts.
    pub departure: Location,
    /// Where the route ends.
    pub destination: Location,
    /// `true` for morning commute routes, `false` for the evening return.
    pub is_commute: bool,
}

/// The identity a QR credential resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rider {
    /// User ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

/// A boarding about to be written to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewBoarding {
    /// Who boarded.
    pub user_id: UserId,
    /// Which route.
    pub route_id: RouteId,
    /// When the QR was verified.
    pub boarding_time: DateTime<Utc>,
    /// Calendar day (service time zone) the boarding counts against.
    pub service_day: NaiveDate,
}

/// One recorded boarding. Created once, never updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardingRecord {
    /// Ledger row ID.
    pub id: BoardingId,
    /// Who boarded.
    pub user_id: UserId,
    /// Which route.
    pub route_id: RouteId,
    /// When the QR was verified.
    pub boarding_time: DateTime<Utc>,
    /// Calendar day the boarding counts against.
    pub service_day: NaiveDate,
}

impl BoardingRecord {
    /// Materialize a stored record from a pending boarding and its assigned ID.
    #[must_use]
    pub const fn from_new(id: BoardingId, new: NewBoarding) -> Self {
        Self {
            id,
            user_id: new.user_id,
            route_id: new.route_id,
            boarding_time: new.boarding_time,
            service_day: new.service_day,
        }
    }
}
