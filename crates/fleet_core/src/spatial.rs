//! Great-circle distance and polyline helpers.

use crate::model::Location;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two (lat, lng) pairs in degrees.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

pub fn distance_km(a: &Location, b: &Location) -> f64 {
    haversine_km(a.as_lat_lng(), b.as_lat_lng())
}

/// Total length of a polyline of (lat, lng) points.
pub fn polyline_length_km(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_km(pair[0], pair[1]))
        .sum()
}

/// Point reached after travelling `fraction` (0..=1) of the polyline's length.
/// Returns `None` for an empty polyline.
pub fn point_at_fraction(points: &[(f64, f64)], fraction: f64) -> Option<(f64, f64)> {
    let first = *points.first()?;
    let last = *points.last()?;
    let fraction = fraction.clamp(0.0, 1.0);
    let total = polyline_length_km(points);
    if total <= 0.0 || fraction <= 0.0 {
        return Some(first);
    }
    if fraction >= 1.0 {
        return Some(last);
    }

    let target = total * fraction;
    let mut travelled = 0.0;
    for pair in points.windows(2) {
        let segment = haversine_km(pair[0], pair[1]);
        if segment > 0.0 && travelled + segment >= target {
            let t = (target - travelled) / segment;
            let lat = pair[0].0 + (pair[1].0 - pair[0].0) * t;
            let lng = pair[0].1 + (pair[1].1 - pair[0].1) * t;
            return Some((lat, lng));
        }
        travelled += segment;
    }
    Some(last)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELHI: (f64, f64) = (28.6139, 77.2090);
    const MUMBAI: (f64, f64) = (19.0760, 72.8777);

    #[test]
    fn haversine_delhi_mumbai() {
        let km = haversine_km(DELHI, MUMBAI);
        assert!((km - 1148.1).abs() < 1.0, "got {km}");
        assert_eq!(haversine_km(DELHI, DELHI), 0.0);
    }

    #[test]
    fn haversine_is_symmetric() {
        let a = haversine_km(DELHI, MUMBAI);
        let b = haversine_km(MUMBAI, DELHI);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn point_at_fraction_walks_segments() {
        let line = [(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)];
        let mid = point_at_fraction(&line, 0.5).expect("point");
        assert!((mid.1 - 1.0).abs() < 1e-6);
        let quarter = point_at_fraction(&line, 0.25).expect("point");
        assert!((quarter.1 - 0.5).abs() < 1e-6);
        assert_eq!(point_at_fraction(&line, 1.5), Some((0.0, 2.0)));
        assert_eq!(point_at_fraction(&[], 0.5), None);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(12.345, 1), 12.3);
    }
}
