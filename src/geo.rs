use serde::{Deserialize, Serialize};

// --- Constants ---

/// Mean earth radius in meters, used by the great-circle distance below.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Latitudes beyond this are clamped before projection. The projection is
/// singular at the poles and map data never reaches them.
pub const MAX_LATITUDE: f64 = 86.0;

const MAX_PROJECTED: f64 = 180.0;

// --- Projection ---

/// A point in projected map coordinates.
///
/// The projection is a degree-scaled pseudo-Mercator: `x` is the longitude in
/// degrees, `y` is `deg(ln(tan(45° + lat/2)))`, both clamped to ±180. All
/// candidate centers, pivots, and viewports in this crate live in this space;
/// only distance computations unproject back to geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Projects geographic coordinates (degrees) into map space.
    pub fn from_lat_lon(lat: f64, lon: f64) -> Self {
        Self {
            x: lon.clamp(-MAX_PROJECTED, MAX_PROJECTED),
            y: lat_to_y(lat),
        }
    }
}

pub fn lat_to_y(lat: f64) -> f64 {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let y = f64::ln(f64::tan(f64::to_radians(45.0 + lat * 0.5))).to_degrees();
    y.clamp(-MAX_PROJECTED, MAX_PROJECTED)
}

pub fn y_to_lat(y: f64) -> f64 {
    let y = y.clamp(-MAX_PROJECTED, MAX_PROJECTED);
    (2.0 * f64::atan(f64::tanh(0.5 * y.to_radians()))).to_degrees()
}

// --- Distance ---

/// Great-circle distance in meters between two projected points.
///
/// Unprojects both points and applies the haversine formula. Accurate to well
/// under a percent at the scales the pre-ranker cares about (meters to a few
/// hundred kilometers).
pub fn distance_on_earth(a: Point, b: Point) -> f64 {
    let lat1 = y_to_lat(a.y).to_radians();
    let lat2 = y_to_lat(b.y).to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (b.x - a.x).to_radians();

    let h = f64::sin(d_lat * 0.5).powi(2)
        + lat1.cos() * lat2.cos() * f64::sin(d_lon * 0.5).powi(2);
    2.0 * f64::asin(h.sqrt().min(1.0)) * EARTH_RADIUS_METERS
}

// --- Rectangles ---

/// An axis-aligned rectangle in projected map coordinates, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    /// Builds a rectangle from any two opposite corners.
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn center(&self) -> Point {
        Point::new((self.min.x + self.max.x) * 0.5, (self.min.y + self.max.y) * 0.5)
    }

    pub fn left_top(&self) -> Point {
        Point::new(self.min.x, self.max.y)
    }

    pub fn right_bottom(&self) -> Point {
        Point::new(self.max.x, self.min.y)
    }

    /// On-earth length of the rectangle's diagonal, in meters. Used to decide
    /// whether a viewport is zoomed in far enough to be "detailed".
    pub fn diagonal_meters(&self) -> f64 {
        distance_on_earth(self.left_top(), self.right_bottom())
    }
}
