//! Conversion of mission-local coordinates to geographic latitude and longitude.
//!
//! Every theater is a Transverse Mercator projection on the WGS84 ellipsoid.
//! Mission coordinates use the north-east-up axis order: `x` is the northing
//! and `y` the easting, both offset by the theater's false origin.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::LazyLock;

use itertools::Itertools;
use tracing::debug;

use crate::mission::Waypoint;

/// WGS84 semi-major axis in meters.
const A: f64 = 6378137.0;
/// WGS84 flattening.
const F: f64 = 1.0 / 298.257223563;
/// First eccentricity squared.
const E2: f64 = 2.0 * F - F * F;

/// Theater used for unknown or empty names.
pub const DEFAULT_THEATER: &str = "Caucasus";

/// Route points further than this from the route's centroid, in degrees,
/// are treated as outliers.
pub const ROUTE_OUTLIER_DEGREES: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite() && self.lat.abs() <= 90.0 && self.lon.abs() <= 180.0
    }

    fn distance_degrees(&self, other: &LatLon) -> f64 {
        (self.lat - other.lat).hypot(self.lon - other.lon)
    }
}

/// Transverse Mercator parameters of one theater.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Projection {
    /// Longitude of the central meridian, in degrees.
    pub central_meridian: f64,
    pub scale_factor: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl Projection {
    const fn tm(central_meridian: f64, false_easting: f64, false_northing: f64) -> Self {
        Self {
            central_meridian,
            scale_factor: 0.9996,
            false_easting,
            false_northing,
        }
    }

    /// Inverse projection of a point given relative to the false origin.
    pub fn to_latlon(&self, x: f64, y: f64) -> LatLon {
        let northing = x - self.false_northing;
        let easting = y - self.false_easting;
        inverse_transverse_mercator(northing, easting, self.central_meridian, self.scale_factor)
    }
}

struct Theater {
    name: &'static str,
    projection: Projection,
    center: LatLon,
}

static CAUCASUS: Theater = Theater {
    name: DEFAULT_THEATER,
    projection: Projection::tm(33.0, -99516.9999999732, -4998114.999999984),
    center: LatLon::new(42.5, 42.0),
};

static THEATERS: LazyLock<HashMap<String, Theater>> = LazyLock::new(|| {
    let mariana = Projection::tm(147.0, 238417.99999989968, -1491840.000000048);
    let south_atlantic = Projection::tm(-57.0, 147639.99999997593, 5815417.000000032);
    [
        (CAUCASUS.name, CAUCASUS.projection, CAUCASUS.center),
        (
            "Syria",
            Projection::tm(39.0, 282801.00000003993, -3879865.9999999935),
            LatLon::new(35.0, 37.0),
        ),
        (
            "PersianGulf",
            Projection::tm(57.0, 75755.99999999645, -2894933.0000000377),
            LatLon::new(26.0, 56.0),
        ),
        (
            "Nevada",
            Projection::tm(-117.0, -193996.80999964548, -4410028.063999966),
            LatLon::new(36.5, -115.5),
        ),
        ("MarianaIslands", mariana, LatLon::new(15.0, 145.5)),
        ("MarianaIslandsWWII", mariana, LatLon::new(15.0, 145.5)),
        ("SouthAtlantic", south_atlantic, LatLon::new(-52.0, -59.0)),
        ("Falklands", south_atlantic, LatLon::new(-52.0, -59.0)),
        (
            "Normandy",
            Projection::tm(-3.0, -195526.00000000204, -5484812.999999951),
            LatLon::new(49.0, -1.0),
        ),
        (
            "TheChannel",
            Projection::tm(3.0, 99376.00000000288, -5636889.00000001),
            LatLon::new(50.5, 1.0),
        ),
        // Approximate origins for the newer maps.
        ("Sinai", Projection::tm(33.0, 250000.0, -3300000.0), LatLon::new(30.0, 33.5)),
        ("Kola", Projection::tm(33.0, 500000.0, -7550000.0), LatLon::new(68.5, 33.0)),
        (
            "Afghanistan",
            Projection::tm(69.0, 200000.0, -3850000.0),
            LatLon::new(34.5, 69.0),
        ),
    ]
    .into_iter()
    .map(|(name, projection, center)| {
        (
            name.to_ascii_lowercase(),
            Theater {
                name,
                projection,
                center,
            },
        )
    })
    .collect()
});

fn theater(name: &str) -> &'static Theater {
    THEATERS
        .get(&name.trim().to_ascii_lowercase())
        .unwrap_or_else(|| {
            debug!("no projection for theater {name:?}, using {DEFAULT_THEATER}");
            &CAUCASUS
        })
}

/// Projection parameters of `theater`, matched case-insensitively. Unknown
/// names get the Caucasus parameters.
pub fn projection_for(theater_name: &str) -> &'static Projection {
    &theater(theater_name).projection
}

/// Approximate center of `theater`, with the same fallback as
/// [`projection_for`].
pub fn theater_center(theater_name: &str) -> LatLon {
    theater(theater_name).center
}

/// Names of every theater with a projection, sorted.
pub fn known_theaters() -> Vec<&'static str> {
    THEATERS.values().map(|t| t.name).sorted_unstable().collect()
}

/// Converts mission coordinates on `theater` to latitude and longitude.
pub fn dcs_to_latlon(theater_name: &str, x: f64, y: f64) -> LatLon {
    projection_for(theater_name).to_latlon(x, y)
}

fn inverse_transverse_mercator(northing: f64, easting: f64, lon0_deg: f64, k0: f64) -> LatLon {
    let e1 = (1.0 - (1.0 - E2).sqrt()) / (1.0 + (1.0 - E2).sqrt());
    let lon0 = lon0_deg * PI / 180.0;

    let m = northing / k0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * E2.powi(2) / 64.0 - 5.0 * E2.powi(3) / 256.0));

    // Footpoint latitude.
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin_phi1, cos_phi1) = phi1.sin_cos();
    let tan_phi1 = phi1.tan();
    let w = 1.0 - E2 * sin_phi1 * sin_phi1;

    let n1 = A / w.sqrt();
    let r1 = A * (1.0 - E2) / w.powf(1.5);
    let ep2 = E2 / (1.0 - E2);
    let c1 = ep2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;

    let d = easting / (n1 * k0);
    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d3 * d;
    let d5 = d4 * d;
    let d6 = d5 * d;

    let phi = phi1
        - (n1 * tan_phi1 / r1)
            * (d2 / 2.0 - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1) * d6
                    / 720.0);

    let lambda = lon0
        + (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d5 / 120.0)
            / cos_phi1;

    LatLon::new(phi.to_degrees(), lambda.to_degrees())
}

/// Projects a route for display, keeping each point's index in `route`.
///
/// Points at the map origin are placeholders and are skipped, as are
/// projections outside the valid range. Points further than
/// [`ROUTE_OUTLIER_DEGREES`] from the centroid of the rest are dropped.
/// A route with fewer than two usable points yields nothing.
pub fn project_route(theater_name: &str, route: &[Waypoint]) -> Vec<(usize, LatLon)> {
    let projection = projection_for(theater_name);
    let points: Vec<(usize, LatLon)> = route
        .iter()
        .enumerate()
        .filter(|(_, wp)| wp.x().abs() >= 1.0 || wp.y().abs() >= 1.0)
        .map(|(i, wp)| (i, projection.to_latlon(wp.x(), wp.y())))
        .filter(|(_, point)| point.is_valid())
        .collect();
    if points.len() < 2 {
        return Vec::new();
    }

    let count = points.len() as f64;
    let centroid = LatLon::new(
        points.iter().map(|(_, p)| p.lat).sum::<f64>() / count,
        points.iter().map(|(_, p)| p.lon).sum::<f64>() / count,
    );
    let (kept, dropped): (Vec<_>, Vec<_>) = points
        .into_iter()
        .partition(|(_, point)| point.distance_degrees(&centroid) <= ROUTE_OUTLIER_DEGREES);
    if !dropped.is_empty() {
        debug!("dropped route points {} as outliers", dropped.iter().map(|(i, _)| i).join(", "));
    }

    if kept.len() < 2 { Vec::new() } else { kept }
}

#[cfg(test)]
mod test {
    use super::*;

    const EPS: f64 = 1e-9;

    fn waypoint(x: f64, y: f64) -> Waypoint {
        Waypoint::builder().x(x).y(y).build()
    }

    #[test]
    fn known_conversions() {
        let p = dcs_to_latlon("Caucasus", 0.0, 0.0);
        assert!((p.lat - 45.12949705935268).abs() < EPS);
        assert!((p.lon - 34.26551518844452).abs() < EPS);

        let p = dcs_to_latlon("Caucasus", -281000.0, 647000.0);
        assert!((p.lat - 42.24807391173788).abs() < EPS);
        assert!((p.lon - 42.04568071896472).abs() < EPS);

        let p = dcs_to_latlon("syria", 0.0, 0.0);
        assert!((p.lat - 35.02191823114693).abs() < EPS);
        assert!((p.lon - 35.90056044223452).abs() < EPS);
    }

    #[test]
    fn false_origin_maps_to_central_meridian() {
        for name in known_theaters() {
            let projection = projection_for(name);
            let p = dcs_to_latlon(name, projection.false_northing, projection.false_easting);
            assert!(p.lat.abs() < 1e-6, "{name}: {p:?}");
            assert!((p.lon - projection.central_meridian).abs() < 1e-6, "{name}: {p:?}");
        }
    }

    #[test]
    fn unknown_theater_uses_caucasus() {
        assert_eq!(projection_for("Narnia"), projection_for("Caucasus"));
        assert_eq!(projection_for(""), projection_for("CAUCASUS"));
        assert_eq!(theater_center("Narnia"), LatLon::new(42.5, 42.0));
        assert_eq!(theater_center("persiangulf"), LatLon::new(26.0, 56.0));
        assert_eq!(theater_center("MarianaIslandsWWII"), theater_center("marianaislands"));
        assert_eq!(known_theaters().len(), 13);
    }

    #[test]
    fn validity() {
        assert!(LatLon::new(90.0, -180.0).is_valid());
        assert!(!LatLon::new(90.5, 0.0).is_valid());
        assert!(!LatLon::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn route_keeps_indices_and_drops_outliers() {
        let route = [
            waypoint(0.0, 0.0),
            waypoint(-281000.0, 647000.0),
            waypoint(-282000.0, 648000.0),
            waypoint(-280000.0, 646000.0),
            waypoint(819000.0, 647000.0),
        ];
        let projected = project_route("Caucasus", &route);
        let indices: Vec<_> = projected.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, [1, 2, 3]);
        assert!((projected[0].1.lat - 42.24807391173788).abs() < EPS);
    }

    #[test]
    fn short_routes_are_empty() {
        assert!(project_route("Caucasus", &[]).is_empty());
        assert!(project_route("Caucasus", &[waypoint(0.5, 0.5), waypoint(-281000.0, 647000.0)]).is_empty());
    }
}
