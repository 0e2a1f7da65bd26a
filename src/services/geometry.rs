/// Polygon area and centroid.
///
/// Area is measured in World Mercator (EPSG:3395, WGS84 ellipsoid) so it is in
/// square metres; the centroid is taken after projecting back to geographic
/// coordinates so it lines up with the weather lookup.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, Centroid, Coord, Line, LineString, MapCoords, Polygon};

use crate::error::{Result, SolarError};

// ─── WGS84 ellipsoid ─────────────────────────────────────────
const A: f64 = 6_378_137.0;
const F: f64 = 1.0 / 298.257_223_563;

#[derive(Debug, Clone, PartialEq)]
pub struct GeometrySummary {
    /// Area in square metres, measured in the projected system
    pub area_m2: f64,
    pub centroid_lat: f64,
    pub centroid_lon: f64,
    /// WKT of the ring in `lon lat` order, closed
    pub wkt: String,
}

impl GeometrySummary {
    /// Locations the simulation is run for. A single representative point today.
    pub fn sample_points(&self) -> Vec<(f64, f64)> {
        vec![(self.centroid_lat, self.centroid_lon)]
    }
}

fn eccentricity() -> f64 {
    (F * (2.0 - F)).sqrt()
}

/// Geographic degrees → World Mercator metres.
pub fn mercator_forward(c: Coord<f64>) -> Coord<f64> {
    let e = eccentricity();
    let phi = c.y.to_radians();
    let es = e * phi.sin();
    let y = A * ((std::f64::consts::FRAC_PI_4 + phi / 2.0).tan() * ((1.0 - es) / (1.0 + es)).powf(e / 2.0)).ln();
    Coord { x: A * c.x.to_radians(), y }
}

/// World Mercator metres → geographic degrees.
pub fn mercator_inverse(c: Coord<f64>) -> Coord<f64> {
    let e = eccentricity();
    let t = (-c.y / A).exp();
    let mut phi = std::f64::consts::FRAC_PI_2 - 2.0 * t.atan();
    for _ in 0..15 {
        let es = e * phi.sin();
        let next = std::f64::consts::FRAC_PI_2 - 2.0 * (t * ((1.0 - es) / (1.0 + es)).powf(e / 2.0)).atan();
        if (next - phi).abs() < 1e-12 {
            phi = next;
            break;
        }
        phi = next;
    }
    Coord { x: (c.x / A).to_degrees(), y: phi.to_degrees() }
}

/// Derives panel area and centroid from a `[lon, lat]` ring.
pub fn summarize(ring: &[[f64; 2]]) -> Result<GeometrySummary> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.len());
    for [lon, lat] in ring {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(SolarError::InvalidGeometry("non-finite coordinate".to_string()));
        }
        // Mercator diverges at the poles
        if lat.abs() >= 90.0 || lon.abs() > 180.0 {
            return Err(SolarError::InvalidGeometry(format!("vertex [{}, {}] outside projection domain", lon, lat)));
        }
        let c = Coord { x: *lon, y: *lat };
        // Consecutive duplicates would show up as zero-length edges
        if coords.last() != Some(&c) {
            coords.push(c);
        }
    }
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    if coords.len() < 3 {
        return Err(SolarError::InvalidGeometry(format!(
            "ring needs at least 3 distinct points, got {}",
            coords.len()
        )));
    }
    if let Some((i, j)) = self_intersection(&coords) {
        return Err(SolarError::InvalidGeometry(format!(
            "ring is self-intersecting (edges {} and {})",
            i, j
        )));
    }

    let geographic = Polygon::new(LineString::from(coords), vec![]);
    let projected = geographic.map_coords(mercator_forward);

    let area_m2 = projected.unsigned_area();
    if !area_m2.is_finite() || area_m2 <= 0.0 {
        return Err(SolarError::InvalidGeometry(format!("degenerate area {}", area_m2)));
    }

    let back = projected.map_coords(mercator_inverse);
    let centroid = back
        .centroid()
        .ok_or_else(|| SolarError::InvalidGeometry("no centroid".to_string()))?;

    Ok(GeometrySummary {
        area_m2,
        centroid_lat: centroid.y(),
        centroid_lon: centroid.x(),
        wkt: to_wkt(&geographic),
    })
}

/// First pair of edges of the closed ring that cross or fold onto each other.
fn self_intersection(coords: &[Coord<f64>]) -> Option<(usize, usize)> {
    let n = coords.len();
    let edges: Vec<Line<f64>> = (0..n).map(|i| Line::new(coords[i], coords[(i + 1) % n])).collect();

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(edges[i], edges[j]) {
                None => {}
                // Neighbouring edges always meet at their shared vertex
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(_) => return Some((i, j)),
            }
        }
    }
    None
}

fn to_wkt(polygon: &Polygon<f64>) -> String {
    let points: Vec<String> = polygon
        .exterior()
        .coords()
        .map(|c| format!("{} {}", c.x, c.y))
        .collect();
    format!("POLYGON (({}))", points.join(", "))
}
