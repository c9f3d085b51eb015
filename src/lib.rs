/// Reading `.miz` archives and probing their theater
pub mod data;
/// Localization dictionary lookups
pub mod dictionary;
/// Error definitions
pub mod error;
/// Field extraction outcomes that distinguish absent from malformed values.
pub mod extracted;
/// A reader for the table literals missions are serialized as.
pub mod lua;
/// The mission model and its builders
pub mod mission;
/// Mission coordinates to latitude/longitude, per theater
pub mod projection;
/// Brace-matching text scanner used when a mission does not tokenize.
pub mod scan;

pub use data::{CancelFlag, MizArchive, probe_theater};
pub use extracted::Extracted;
pub use mission::{MissionDetails, ParseOptions, parse_mission, parse_mission_with};
pub use projection::{LatLon, dcs_to_latlon};
