use super::Vec2;

/// Axis-aligned rectangle in world space (bottom-left origin, +Y up).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    #[inline]
    pub const fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self { origin, size }
    }

    #[inline]
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        Self {
            origin: center - size / 2.0,
            size,
        }
    }

    #[inline]
    pub fn min(self) -> Vec2 {
        self.origin
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        self.origin + self.size
    }

    #[inline]
    pub fn center(self) -> Vec2 {
        self.origin + self.size / 2.0
    }

    /// Half of the diagonal; the radius of the smallest circle around the rectangle.
    #[inline]
    pub fn bounding_radius(self) -> f32 {
        self.size.length() / 2.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.origin.is_finite() && self.size.is_finite()
    }

    /// Closed containment: [min, max].
    #[inline]
    pub fn contains(self, p: Vec2) -> bool {
        let max = self.max();
        p.x >= self.origin.x && p.y >= self.origin.y && p.x <= max.x && p.y <= max.y
    }

    /// Signed distance from `p` to the rectangle boundary (negative inside).
    pub fn signed_distance(self, p: Vec2) -> f32 {
        let half = self.size.abs() / 2.0;
        let d = (p - self.center()).abs() - half;
        let outside = d.max(Vec2::zero()).length();
        let inside = d.x.max(d.y).min(0.0);
        outside + inside
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> Rect { Rect::new(x, y, w, h) }

    // ── geometry ──────────────────────────────────────────────────────────

    #[test]
    fn center_and_max() {
        let rect = r(2.0, 4.0, 10.0, 20.0);
        assert_eq!(rect.center(), Vec2::new(7.0, 14.0));
        assert_eq!(rect.max(), Vec2::new(12.0, 24.0));
    }

    #[test]
    fn from_center_size_round_trips() {
        let rect = Rect::from_center_size(Vec2::new(5.0, 5.0), Vec2::new(4.0, 2.0));
        assert_eq!(rect, r(3.0, 4.0, 4.0, 2.0));
        assert_eq!(rect.center(), Vec2::new(5.0, 5.0));
    }

    #[test]
    fn bounding_radius_is_half_diagonal() {
        assert!((r(0.0, 0.0, 6.0, 8.0).bounding_radius() - 5.0).abs() < 1e-6);
    }

    // ── contains ──────────────────────────────────────────────────────────

    #[test]
    fn contains_edges_inclusive() {
        let rect = r(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains(Vec2::new(0.0, 0.0)));
        assert!(rect.contains(Vec2::new(10.0, 10.0)));
        assert!(!rect.contains(Vec2::new(10.5, 5.0)));
    }

    // ── signed_distance ───────────────────────────────────────────────────

    #[test]
    fn signed_distance_outside_along_axis() {
        let rect = r(0.0, 0.0, 10.0, 10.0);
        assert!((rect.signed_distance(Vec2::new(13.0, 5.0)) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn signed_distance_outside_corner() {
        let rect = r(0.0, 0.0, 10.0, 10.0);
        assert!((rect.signed_distance(Vec2::new(13.0, 14.0)) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn signed_distance_inside_is_negative() {
        let rect = r(0.0, 0.0, 10.0, 10.0);
        assert!((rect.signed_distance(Vec2::new(5.0, 8.0)) + 2.0).abs() < 1e-6);
    }

    #[test]
    fn is_empty_zero_size() {
        assert!(r(0.0, 0.0, 0.0, 5.0).is_empty());
        assert!(!r(0.0, 0.0, 1.0, 1.0).is_empty());
    }
}
