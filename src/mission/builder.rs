use tracing::{debug, trace};

use super::scope::Scope;
use super::{
    Briefing, Coalition, Diagnostic, GroupCategory, MissionDetails, NO_BRIEFING, ParseStatus,
    UNKNOWN_COUNTRY, UNKNOWN_DATE, Unit, UnitGroup, Waypoint, WeatherInfo, Wind, flight_slots,
};
use crate::data::{CancelFlag, UNKNOWN_THEATER};
use crate::dictionary::Dictionary;
use crate::extracted::Extracted;

/// Spellings of the theater key, in order of preference.
const THEATER_KEYS: [&str; 3] = ["theatre", "theater", "map"];

/// Formats seconds since midnight as `HH:MM:SS`.
pub fn format_start_time(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn indexed(path: &str, key: &str, index: i64) -> String {
    format!("{}[{index}]", join(path, key))
}

/// Assembles a [`MissionDetails`] from the root table of a mission.
///
/// Malformed fields fall back to their defaults and are collected as
/// diagnostics. Nothing here fails.
pub struct MissionBuilder<'a> {
    dictionary: &'a Dictionary,
    cancel: &'a CancelFlag,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> MissionBuilder<'a> {
    pub fn new(dictionary: &'a Dictionary, cancel: &'a CancelFlag) -> Self {
        Self {
            dictionary,
            cancel,
            diagnostics: Vec::new(),
        }
    }

    fn take<T>(&mut self, path: &str, key: &str, value: Extracted<T>) -> Option<T> {
        match value {
            Extracted::Found(value) => Some(value),
            Extracted::Defaulted => None,
            Extracted::Malformed(raw) => {
                let path = join(path, key);
                debug!("ignoring malformed value at {path}: {raw:?}");
                self.diagnostics.push(Diagnostic { path, raw });
                None
            }
        }
    }

    fn string<S: Scope>(&mut self, scope: &S, path: &str, key: &str) -> Option<String> {
        let value = scope.str_field(key);
        self.take(path, key, value)
    }

    /// A string field passed through the dictionary display rule.
    fn display<S: Scope>(&mut self, scope: &S, path: &str, key: &str) -> Option<String> {
        self.string(scope, path, key)
            .map(|raw| self.dictionary.display(&raw))
    }

    fn number<S: Scope>(&mut self, scope: &S, path: &str, key: &str) -> f64 {
        let value = scope.num_field(key);
        self.take(path, key, value).unwrap_or(0.0)
    }

    fn integer<S: Scope>(&mut self, scope: &S, path: &str, key: &str) -> Option<i64> {
        let value = scope.int_field(key);
        self.take(path, key, value)
    }

    pub fn build<S: Scope>(mut self, root: &S) -> MissionDetails {
        let mut details = MissionDetails {
            theater: self.theater(root),
            sortie: self.display(root, "", "sortie").unwrap_or_default(),
            date: self.date(root),
            start_time: self.start_time(root),
            weather: self.weather(root),
            required_modules: root
                .child("requiredModules")
                .map(|modules| modules.string_values())
                .unwrap_or_default(),
            briefing: self.briefing(root),
            ..MissionDetails::default()
        };

        let (groups, cancelled) = self.groups(root);
        details.flight_slots = flight_slots(&groups);
        details.groups = groups;
        if cancelled {
            details.status = ParseStatus::Cancelled;
        }
        details.diagnostics = self.diagnostics;
        details
    }

    fn theater<S: Scope>(&mut self, root: &S) -> String {
        for key in THEATER_KEYS {
            if let Some(theater) = self.string(root, "", key).filter(|t| !t.is_empty()) {
                return theater;
            }
        }
        UNKNOWN_THEATER.to_string()
    }

    fn date<S: Scope>(&mut self, root: &S) -> String {
        let Some(date) = root.child("date") else {
            return UNKNOWN_DATE.to_string();
        };
        let year = self.integer(&date, "date", "Year");
        let month = self.integer(&date, "date", "Month");
        let day = self.integer(&date, "date", "Day");
        match (year, month, day) {
            (Some(year), Some(month), Some(day)) => format!("{year}-{month:02}-{day:02}"),
            _ => UNKNOWN_DATE.to_string(),
        }
    }

    fn start_time<S: Scope>(&mut self, root: &S) -> String {
        let value = root.num_field("start_time");
        let seconds = self.take("", "start_time", value).unwrap_or(0.0);
        format_start_time(seconds.max(0.0) as u64)
    }

    fn band<S: Scope>(&mut self, weather: &S, wind: Option<&S>, band: &str) -> Wind {
        let (scope, path) = match wind.and_then(|w| w.child(band)) {
            Some(scope) => (scope, format!("weather.wind.{band}")),
            None => match weather.child(band) {
                Some(scope) => (scope, format!("weather.{band}")),
                None => return Wind::default(),
            },
        };
        Wind {
            speed: self.number(&scope, &path, "speed"),
            dir: self.number(&scope, &path, "dir"),
        }
    }

    fn weather<S: Scope>(&mut self, root: &S) -> WeatherInfo {
        let Some(weather) = root.child("weather") else {
            return WeatherInfo::default();
        };

        let temperature = match weather.child("season") {
            Some(season) if !season.num_field("temperature").is_defaulted() => {
                self.number(&season, "weather.season", "temperature")
            }
            _ => self.number(&weather, "weather", "temperature"),
        };
        let wind = weather.child("wind");

        WeatherInfo {
            at_ground: self.band(&weather, wind.as_ref(), "atGround"),
            at_2000: self.band(&weather, wind.as_ref(), "at2000"),
            at_8000: self.band(&weather, wind.as_ref(), "at8000"),
            qnh: self.number(&weather, "weather", "qnh"),
            temperature,
        }
    }

    fn briefing<S: Scope>(&mut self, root: &S) -> Briefing {
        Briefing {
            situation: self
                .display(root, "", "descriptionText")
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| NO_BRIEFING.to_string()),
            blue_task: self.display(root, "", "descriptionBlueTask").unwrap_or_default(),
            red_task: self.display(root, "", "descriptionRedTask").unwrap_or_default(),
            neutrals_task: self
                .display(root, "", "descriptionNeutralsTask")
                .unwrap_or_default(),
        }
    }

    /// Every populated group in the mission. The flag is set when the walk
    /// stopped early because the parse was cancelled.
    fn groups<S: Scope>(&mut self, root: &S) -> (Vec<UnitGroup>, bool) {
        let mut groups = Vec::new();
        let Some(coalitions) = root.child("coalition") else {
            debug!("mission has no coalition table");
            return (groups, false);
        };

        for coalition in Coalition::ALL {
            if self.cancel.is_cancelled() {
                return (groups, true);
            }
            let Some(side) = coalitions.child(coalition.key()) else {
                continue;
            };
            let Some(countries) = side.child("country") else {
                continue;
            };
            let side_path = format!("coalition.{}", coalition.key());
            for (country_index, country) in countries.indexed_children() {
                let country_path = indexed(&side_path, "country", country_index);
                let country_name = self
                    .string(&country, &country_path, "name")
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());

                for category in GroupCategory::ALL {
                    let Some(list) = country
                        .child(category.key())
                        .and_then(|c| c.child("group"))
                    else {
                        continue;
                    };
                    let category_path = join(&country_path, category.key());
                    for (group_index, group) in list.indexed_children() {
                        let path = indexed(&category_path, "group", group_index);
                        if let Some(group) =
                            self.group(&group, &path, coalition, &country_name, category)
                        {
                            groups.push(group);
                        }
                    }
                }
            }
        }
        (groups, false)
    }

    fn group<S: Scope>(
        &mut self,
        group: &S,
        path: &str,
        coalition: Coalition,
        country: &str,
        category: GroupCategory,
    ) -> Option<UnitGroup> {
        let name = self.display(group, path, "name").unwrap_or_default();
        let task = self.string(group, path, "task").unwrap_or_default();

        let units: Vec<Unit> = group
            .child("units")
            .map(|units| units.indexed_children())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(index, unit)| self.unit(&unit, &indexed(path, "units", index)))
            .collect();
        if units.is_empty() {
            debug!("dropping group {name:?} at {path}: no usable units");
            return None;
        }

        let route: Vec<Waypoint> = group
            .child("route")
            .and_then(|route| route.child("points"))
            .map(|points| points.indexed_children())
            .unwrap_or_default()
            .into_iter()
            .map(|(index, point)| self.waypoint(&point, &indexed(path, "route.points", index)))
            .collect();

        trace!(
            "group {name:?}: {} units, {} waypoints",
            units.len(),
            route.len()
        );
        Some(
            UnitGroup::builder()
                .coalition(coalition)
                .country(country.to_string())
                .category(category)
                .name(name)
                .task(task)
                .units(units)
                .route(route)
                .build(),
        )
    }

    fn unit<S: Scope>(&mut self, unit: &S, path: &str) -> Option<Unit> {
        let Some(unit_type) = self.string(unit, path, "type").filter(|t| !t.is_empty()) else {
            debug!("dropping unit at {path}: no type");
            return None;
        };

        let callsign = match unit.child("callsign") {
            Some(table) => self.string(&table, &join(path, "callsign"), "name"),
            None => self.string(unit, path, "callsign"),
        };
        let unit_id = self
            .integer(unit, path, "unitId")
            .and_then(|id| u64::try_from(id).ok());

        Some(
            Unit::builder()
                .name(self.display(unit, path, "name").unwrap_or_default())
                .unit_type(unit_type)
                .maybe_unit_id(unit_id)
                .maybe_skill(self.string(unit, path, "skill").filter(|s| !s.is_empty()))
                .maybe_callsign(callsign)
                .x(self.number(unit, path, "x"))
                .y(self.number(unit, path, "y"))
                .alt(self.number(unit, path, "alt"))
                .speed(self.number(unit, path, "speed"))
                .heading(self.number(unit, path, "heading"))
                .build(),
        )
    }

    fn waypoint<S: Scope>(&mut self, point: &S, path: &str) -> Waypoint {
        Waypoint::builder()
            .maybe_name(self.display(point, path, "name"))
            .action(self.string(point, path, "action").unwrap_or_default())
            .waypoint_type(self.string(point, path, "type").unwrap_or_default())
            .x(self.number(point, path, "x"))
            .y(self.number(point, path, "y"))
            .alt(self.number(point, path, "alt"))
            .speed(self.number(point, path, "speed"))
            .build()
    }
}
