/// 2D vector utilities for the board simulation.
/// Board space is in pixels with +y pointing down (canvas convention).

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../web/src/generated/")]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Shorthand constructor
pub fn vec2(x: f64, y: f64) -> Vec2 {
    Vec2::new(x, y)
}

/// Add two vectors
pub fn add(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x + b.x, a.y + b.y)
}

/// Subtract vectors (a - b)
pub fn sub(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x - b.x, a.y - b.y)
}

/// Scale vector by scalar
pub fn scale(v: Vec2, s: f64) -> Vec2 {
    Vec2::new(v.x * s, v.y * s)
}

/// Dot product
pub fn dot(a: Vec2, b: Vec2) -> f64 {
    a.x * b.x + a.y * b.y
}

/// Vector length
pub fn length(v: Vec2) -> f64 {
    (v.x * v.x + v.y * v.y).sqrt()
}

/// Distance between two points
pub fn distance(a: Vec2, b: Vec2) -> f64 {
    length(sub(a, b))
}

/// Midpoint of two points
pub fn midpoint(a: Vec2, b: Vec2) -> Vec2 {
    scale(add(a, b), 0.5)
}

/// Normalize vector to unit length.
/// Near-zero input falls back to the +x axis.
pub fn normalize(v: Vec2) -> Vec2 {
    let len = length(v);
    if len < 1e-10 {
        return Vec2::new(1.0, 0.0);
    }
    Vec2::new(v.x / len, v.y / len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_of_3_4_is_5() {
        assert!((length(vec2(3.0, 4.0)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn normalize_produces_unit_vector() {
        let n = normalize(vec2(-6.0, 8.0));
        assert!((length(n) - 1.0).abs() < 1e-12);
        assert!((n.x + 0.6).abs() < 1e-12);
        assert!((n.y - 0.8).abs() < 1e-12);
    }

    #[test]
    fn normalize_zero_falls_back_to_x_axis() {
        assert_eq!(normalize(Vec2::ZERO), vec2(1.0, 0.0));
    }

    #[test]
    fn midpoint_and_distance() {
        let a = vec2(10.0, 20.0);
        let b = vec2(30.0, 20.0);
        assert_eq!(midpoint(a, b), vec2(20.0, 20.0));
        assert!((distance(a, b) - 20.0).abs() < 1e-12);
        assert!((dot(a, b) - 700.0).abs() < 1e-12);
    }
}
