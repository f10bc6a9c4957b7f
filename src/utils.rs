use geo::{Distance, Haversine, Point};

use crate::domain::types::Coordinate;

/// Great-circle distance in meters.
pub fn haversine_meters(a: &Coordinate, b: &Coordinate) -> f64 {
    Haversine.distance(Point::new(a.lon, a.lat), Point::new(b.lon, b.lat))
}

/// Position of `coordinate` on the unit sphere. Straight-line distance
/// between two such points grows with their great-circle distance.
pub fn unit_sphere_point(coordinate: &Coordinate) -> [f64; 3] {
    let (lat, lon) = (coordinate.lat.to_radians(), coordinate.lon.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Removes `segment_len` stops starting at `from` and returns them in order.
pub fn move_segment(source: &mut Vec<usize>, from: usize, segment_len: usize) -> Vec<usize> {
    source.drain(from..from + segment_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_is_zero_for_same_point() {
        let p = Coordinate::new(48.85, 2.35);
        assert_eq!(haversine_meters(&p, &p), 0.0);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(1.0, 0.0);
        let d = haversine_meters(&a, &b);
        assert!((d - 111_195.0).abs() < 50.0, "got {}", d);
    }

    #[test]
    fn sphere_points_order_like_haversine() {
        let origin = Coordinate::new(1.35, 103.82);
        let near = Coordinate::new(1.36, 103.82);
        let far = Coordinate::new(1.35, 103.95);
        let chord = |c: &Coordinate| {
            let (a, b) = (unit_sphere_point(&origin), unit_sphere_point(c));
            (0..3).map(|k| (a[k] - b[k]).powi(2)).sum::<f64>()
        };
        assert!(haversine_meters(&origin, &near) < haversine_meters(&origin, &far));
        assert!(chord(&near) < chord(&far));
    }

    #[test]
    fn move_segment_drains_in_order() {
        let mut visits = vec![1, 2, 3, 4];
        assert_eq!(move_segment(&mut visits, 1, 2), vec![2, 3]);
        assert_eq!(visits, vec![1, 4]);
    }
}
