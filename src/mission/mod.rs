//! The mission model and how it is read out of an archive.

use std::fmt;

use bon::Builder;

/// Rewriting briefing text stored in the dictionary
pub mod briefing;
/// Walks a mission root and assembles the model
pub mod builder;
/// Archive-level entry points
pub mod parse;
/// Uniform field access over the parsed tree and over raw text
pub mod scope;

pub use briefing::{
    BriefingField, BriefingUpdate, SkipReason, UpdateError, UpdateReport, read_briefings, update_briefings,
};
pub use parse::{ParseOptions, mission_from_text, parse_mission, parse_mission_with, try_parse_mission};

/// Situation text used when a mission has none.
pub const NO_BRIEFING: &str = "No briefing available.";
pub const UNKNOWN_DATE: &str = "Unknown Date";
pub const MIDNIGHT: &str = "00:00:00";
pub const UNKNOWN_COUNTRY: &str = "Unknown";
pub const DEFAULT_SKILL: &str = "AI";
pub const MISSING_MISSION: &str = "Error: 'mission' file not found in archive.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Coalition {
    Blue,
    Red,
}

impl Coalition {
    pub const ALL: [Coalition; 2] = [Coalition::Blue, Coalition::Red];

    /// Key of this side under the mission's `coalition` table.
    pub fn key(self) -> &'static str {
        match self {
            Coalition::Blue => "blue",
            Coalition::Red => "red",
        }
    }
}

impl fmt::Display for Coalition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum GroupCategory {
    Plane,
    Helicopter,
    Vehicle,
    Ship,
    Static,
}

impl GroupCategory {
    pub const ALL: [GroupCategory; 5] = [
        GroupCategory::Plane,
        GroupCategory::Helicopter,
        GroupCategory::Vehicle,
        GroupCategory::Ship,
        GroupCategory::Static,
    ];

    /// Key of this category under a country table.
    pub fn key(self) -> &'static str {
        match self {
            GroupCategory::Plane => "plane",
            GroupCategory::Helicopter => "helicopter",
            GroupCategory::Vehicle => "vehicle",
            GroupCategory::Ship => "ship",
            GroupCategory::Static => "static",
        }
    }
}

impl fmt::Display for GroupCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Wind at one altitude band. Speed is in m/s and direction in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Wind {
    pub speed: f64,
    pub dir: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeatherInfo {
    pub at_ground: Wind,
    pub at_2000: Wind,
    pub at_8000: Wind,
    pub qnh: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Briefing {
    pub situation: String,
    pub blue_task: String,
    pub red_task: String,
    pub neutrals_task: String,
}

impl Default for Briefing {
    fn default() -> Self {
        Self {
            situation: NO_BRIEFING.to_string(),
            blue_task: String::new(),
            red_task: String::new(),
            neutrals_task: String::new(),
        }
    }
}

#[derive(Builder, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Unit {
    #[builder(default)]
    name: String,
    unit_type: String,
    unit_id: Option<u64>,
    #[builder(default = DEFAULT_SKILL.to_string())]
    skill: String,
    callsign: Option<String>,
    #[builder(default)]
    x: f64,
    #[builder(default)]
    y: f64,
    #[builder(default)]
    alt: f64,
    #[builder(default)]
    speed: f64,
    #[builder(default)]
    heading: f64,
}

impl Unit {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type identifier, e.g. `F-16C_50`.
    pub fn unit_type(&self) -> &str {
        &self.unit_type
    }

    pub fn unit_id(&self) -> Option<u64> {
        self.unit_id
    }

    pub fn skill(&self) -> &str {
        &self.skill
    }

    pub fn callsign(&self) -> Option<&str> {
        self.callsign.as_deref()
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn alt(&self) -> f64 {
        self.alt
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Heading in radians.
    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// Whether a human occupies this unit.
    pub fn is_player(&self) -> bool {
        self.skill == "Client" || self.skill == "Player"
    }
}

#[derive(Builder, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Waypoint {
    name: Option<String>,
    #[builder(default)]
    action: String,
    #[builder(default)]
    waypoint_type: String,
    #[builder(default)]
    x: f64,
    #[builder(default)]
    y: f64,
    #[builder(default)]
    alt: f64,
    #[builder(default)]
    speed: f64,
}

impl Waypoint {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn waypoint_type(&self) -> &str {
        &self.waypoint_type
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn alt(&self) -> f64 {
        self.alt
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }
}

#[derive(Builder, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitGroup {
    coalition: Coalition,
    country: String,
    category: GroupCategory,
    #[builder(default)]
    name: String,
    #[builder(default)]
    task: String,
    units: Vec<Unit>,
    /// Route points in flight order.
    #[builder(default)]
    route: Vec<Waypoint>,
}

impl UnitGroup {
    pub fn coalition(&self) -> Coalition {
        self.coalition
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn category(&self) -> GroupCategory {
        self.category
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn route(&self) -> &[Waypoint] {
        &self.route
    }
}

/// One seat in the mission: a unit together with the group it flies in.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlightSlot {
    pub coalition: Coalition,
    pub country: String,
    pub category: GroupCategory,
    pub group_name: String,
    pub task: String,
    pub unit_name: String,
    pub unit_type: String,
    pub skill: String,
    pub callsign: Option<String>,
    pub unit_id: Option<u64>,
    pub x: f64,
    pub y: f64,
    pub alt: f64,
    pub speed: f64,
    pub heading: f64,
    pub is_player: bool,
}

impl FlightSlot {
    pub fn new(group: &UnitGroup, unit: &Unit) -> Self {
        Self {
            coalition: group.coalition,
            country: group.country.clone(),
            category: group.category,
            group_name: group.name.clone(),
            task: group.task.clone(),
            unit_name: unit.name.clone(),
            unit_type: unit.unit_type.clone(),
            skill: unit.skill.clone(),
            callsign: unit.callsign.clone(),
            unit_id: unit.unit_id,
            x: unit.x,
            y: unit.y,
            alt: unit.alt,
            speed: unit.speed,
            heading: unit.heading,
            is_player: unit.is_player(),
        }
    }
}

/// Flattens groups into one slot per unit, keeping group then unit order.
pub fn flight_slots(groups: &[UnitGroup]) -> Vec<FlightSlot> {
    groups
        .iter()
        .flat_map(|group| group.units.iter().map(move |unit| FlightSlot::new(group, unit)))
        .collect()
}

/// An image stored in the archive.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmbeddedImage {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub bytes: Vec<u8>,
    /// Lowercase file extension of the detected format, e.g. `png`.
    pub format: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParseStatus {
    Complete,
    Cancelled,
    Failed(String),
}

/// Which reader produced a [`MissionDetails`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Backend {
    Tree,
    TextScan,
}

/// A field that was present but could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    /// Dotted location, e.g. `coalition.blue.country[1].plane.group[2].units[1].x`.
    pub path: String,
    pub raw: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: could not interpret {:?}", self.path, self.raw)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MissionDetails {
    pub theater: String,
    pub sortie: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM:SS` since midnight of `date`. Hours may exceed 23.
    pub start_time: String,
    pub weather: WeatherInfo,
    pub required_modules: Vec<String>,
    pub briefing: Briefing,
    pub images: Vec<EmbeddedImage>,
    pub kneeboard_images: Vec<EmbeddedImage>,
    pub flight_slots: Vec<FlightSlot>,
    pub groups: Vec<UnitGroup>,
    pub status: ParseStatus,
    pub diagnostics: Vec<Diagnostic>,
    pub backend: Backend,
}

impl Default for MissionDetails {
    fn default() -> Self {
        Self {
            theater: crate::data::UNKNOWN_THEATER.to_string(),
            sortie: String::new(),
            date: UNKNOWN_DATE.to_string(),
            start_time: MIDNIGHT.to_string(),
            weather: WeatherInfo::default(),
            required_modules: Vec::new(),
            briefing: Briefing::default(),
            images: Vec::new(),
            kneeboard_images: Vec::new(),
            flight_slots: Vec::new(),
            groups: Vec::new(),
            status: ParseStatus::Complete,
            diagnostics: Vec::new(),
            backend: Backend::Tree,
        }
    }
}

impl MissionDetails {
    /// The result for an archive that could not be read at all.
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            briefing: Briefing {
                situation: format!("Error parsing mission file: {message}"),
                ..Briefing::default()
            },
            status: ParseStatus::Failed(message),
            ..Self::default()
        }
    }

    /// The result for an archive without a mission entry.
    pub fn missing_mission() -> Self {
        Self {
            briefing: Briefing {
                situation: MISSING_MISSION.to_string(),
                ..Briefing::default()
            },
            ..Self::default()
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: ParseStatus::Cancelled,
            ..Self::default()
        }
    }

    pub fn unit_count(&self) -> usize {
        self.groups.iter().map(|g| g.units.len()).sum()
    }

    pub fn waypoint_count(&self) -> usize {
        self.groups.iter().map(|g| g.route.len()).sum()
    }

    /// One-line summary of what was extracted.
    pub fn debug_info(&self) -> String {
        format!(
            "Found {} groups, {} units, {} waypoints",
            self.groups.len(),
            self.unit_count(),
            self.waypoint_count()
        )
    }

    /// Player-flyable slots only.
    pub fn player_slots(&self) -> impl Iterator<Item = &FlightSlot> {
        self.flight_slots.iter().filter(|slot| slot.is_player)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn unit(skill: Option<&str>) -> Unit {
        Unit::builder()
            .unit_type("F-16C_50".to_string())
            .maybe_skill(skill.map(str::to_string))
            .build()
    }

    #[test]
    fn player_flag_follows_skill() {
        assert!(unit(Some("Client")).is_player());
        assert!(unit(Some("Player")).is_player());
        assert!(!unit(Some("Excellent")).is_player());
        let ai = unit(None);
        assert_eq!(ai.skill(), "AI");
        assert!(!ai.is_player());
    }

    #[test]
    fn slots_flatten_in_order() {
        let group = UnitGroup::builder()
            .coalition(Coalition::Red)
            .country("Russia".to_string())
            .category(GroupCategory::Helicopter)
            .name("Rotor".to_string())
            .units(vec![unit(Some("Client")), unit(None)])
            .build();
        let slots = flight_slots(std::slice::from_ref(&group));
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].coalition, Coalition::Red);
        assert_eq!(slots[0].group_name, "Rotor");
        assert!(slots[0].is_player);
        assert!(!slots[1].is_player);
    }

    #[test]
    fn summary_and_error_results() {
        let details = MissionDetails::failed("bad header");
        assert_eq!(details.briefing.situation, "Error parsing mission file: bad header");
        assert_eq!(details.status, ParseStatus::Failed("bad header".to_string()));
        assert_eq!(details.debug_info(), "Found 0 groups, 0 units, 0 waypoints");

        let missing = MissionDetails::missing_mission();
        assert_eq!(missing.briefing.situation, MISSING_MISSION);
        assert!(missing.groups.is_empty());
        assert_eq!(missing.theater, "Unknown");
    }
}
