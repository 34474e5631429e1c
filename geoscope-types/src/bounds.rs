use geo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// An axis-aligned latitude/longitude rectangle.
///
/// Invariant: `min_lat <= max_lat` and `min_lon <= max_lon`. The constructor does
/// not check it; the index validates bounds before using them.
///
/// # Examples
///
/// ```
/// use geoscope_types::bounds::Bounds;
///
/// let a = Bounds::new(10.0, 11.0, 10.0, 11.0);
/// let b = Bounds::new(11.0, 12.0, 10.5, 12.0);
/// assert!(a.intersects(&b)); // touching edges count as overlap
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    /// Create bounds from latitude and longitude extents.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// The whole globe.
    pub fn world() -> Self {
        Self::new(-90.0, 90.0, -180.0, 180.0)
    }

    /// Create bounds from a `geo::Rect` whose x axis is longitude.
    pub fn from_rect(rect: Rect) -> Self {
        Self::new(rect.min().y, rect.max().y, rect.min().x, rect.max().x)
    }

    /// Convert to a `geo::Rect` (x = longitude, y = latitude).
    pub fn to_rect(&self) -> Rect {
        Rect::new(
            geo::coord! { x: self.min_lon, y: self.min_lat },
            geo::coord! { x: self.max_lon, y: self.max_lat },
        )
    }

    /// Center of the rectangle as a `geo::Point` (x = longitude).
    pub fn center(&self) -> Point {
        Point::new(
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    /// Latitude extent in degrees.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Longitude extent in degrees.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Overlap test. Two boxes overlap unless one of the four separating-axis
    /// conditions holds, so shared edges count as overlap.
    pub fn intersects(&self, other: &Bounds) -> bool {
        !(self.max_lat < other.min_lat
            || self.min_lat > other.max_lat
            || self.max_lon < other.min_lon
            || self.min_lon > other.max_lon)
    }

    /// Inclusive point containment.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    /// Exclusive point containment: points on an edge are outside.
    pub fn contains_strictly(&self, lat: f64, lon: f64) -> bool {
        lat > self.min_lat && lat < self.max_lat && lon > self.min_lon && lon < self.max_lon
    }
}
