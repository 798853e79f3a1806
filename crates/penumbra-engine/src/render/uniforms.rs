use crate::coords::{Transform2d, Vec2};
use crate::drawable::SerializeCtx;

/// Mapping between world, NDC, UV and display coordinates for one view area.
///
/// World space has its origin bottom-left with +Y up. Display coordinates are
/// logical canvas pixels with a top-left origin. The longer edge of the view
/// maps to 2 NDC units, so drawables are serialized in aspect-corrected NDC.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewTransform {
    top_left: Vec2,
    size: Vec2,
    resolution: Vec2,
    bottom_left: Vec2,
    world_length_to_ndc: f32,
    square_to_aspect: Vec2,
    world_to_ndc: Transform2d,
    uv_to_world: Transform2d,
    display_to_world: Transform2d,
    world_to_display: Transform2d,
}

impl ViewTransform {
    /// `top_left` is the world position of the view's top-left corner.
    /// `resolution` is the canvas size in logical pixels.
    pub fn new(top_left: Vec2, size: Vec2, resolution: Vec2) -> Self {
        let size = Vec2::new(size.x.max(f32::EPSILON), size.y.max(f32::EPSILON));
        let resolution = Vec2::new(resolution.x.max(1.0), resolution.y.max(1.0));

        let bottom_left = top_left - Vec2::new(0.0, size.y);
        let longer = size.max_element();
        let world_length_to_ndc = 2.0 / longer;
        let square_to_aspect = size / longer;

        let world_to_ndc = Transform2d::from_scale(Vec2::splat(world_length_to_ndc))
            * Transform2d::from_translation(-(bottom_left + size / 2.0));
        let uv_to_world = Transform2d::from_translation(bottom_left) * Transform2d::from_scale(size);

        // Pixel centres: display (0, 0) lands half a pixel inside the top-left corner.
        let display_to_world = Transform2d::from_translation(bottom_left)
            * Transform2d::from_scale(Vec2::new(size.x / resolution.x, size.y / resolution.y))
            * Transform2d::from_translation(Vec2::new(0.5, resolution.y - 0.5))
            * Transform2d::from_scale(Vec2::new(1.0, -1.0));
        let world_to_display = display_to_world.inverse().unwrap_or(Transform2d::IDENTITY);

        Self {
            top_left,
            size,
            resolution,
            bottom_left,
            world_length_to_ndc,
            square_to_aspect,
            world_to_ndc,
            uv_to_world,
            display_to_world,
            world_to_display,
        }
    }

    /// The default view: one world unit per logical pixel, covering the canvas.
    pub fn for_canvas(resolution: Vec2) -> Self {
        Self::new(Vec2::new(0.0, resolution.y), resolution, resolution)
    }

    #[inline]
    pub fn top_left(&self) -> Vec2 {
        self.top_left
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.size
    }

    #[inline]
    pub fn resolution(&self) -> Vec2 {
        self.resolution
    }

    #[inline]
    pub fn bottom_left(&self) -> Vec2 {
        self.bottom_left
    }

    #[inline]
    pub fn world_length_to_ndc(&self) -> f32 {
        self.world_length_to_ndc
    }

    #[inline]
    pub fn square_to_aspect(&self) -> Vec2 {
        self.square_to_aspect
    }

    #[inline]
    pub fn world_to_ndc(&self) -> Transform2d {
        self.world_to_ndc
    }

    #[inline]
    pub fn uv_to_world(&self) -> Transform2d {
        self.uv_to_world
    }

    pub fn display_to_world(&self, p: Vec2) -> Vec2 {
        self.display_to_world.transform_point(p)
    }

    pub fn world_to_display(&self, p: Vec2) -> Vec2 {
        self.world_to_display.transform_point(p)
    }

    /// Serialization context for a drawable drawn with `lightness`.
    pub fn serialize_ctx(&self, lightness: f32) -> SerializeCtx {
        SerializeCtx {
            transform: self.world_to_ndc,
            scale: self.world_length_to_ndc,
            lightness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn view_centre_maps_to_ndc_origin() {
        let view = ViewTransform::new(Vec2::new(100.0, 400.0), Vec2::new(400.0, 200.0), Vec2::new(800.0, 400.0));
        assert!(close(view.world_to_ndc().transform_point(Vec2::new(300.0, 300.0)), Vec2::zero()));
        // Longer edge spans [-1, 1]; shorter one is aspect corrected.
        assert!(close(
            view.world_to_ndc().transform_point(Vec2::new(500.0, 400.0)),
            Vec2::new(1.0, 0.5)
        ));
        assert_eq!(view.square_to_aspect(), Vec2::new(1.0, 0.5));
        assert_eq!(view.world_length_to_ndc(), 2.0 / 400.0);
    }

    #[test]
    fn uv_spans_view_from_bottom_left() {
        let view = ViewTransform::new(Vec2::new(-10.0, 50.0), Vec2::new(40.0, 20.0), Vec2::new(400.0, 200.0));
        assert!(close(view.uv_to_world().transform_point(Vec2::zero()), Vec2::new(-10.0, 30.0)));
        assert!(close(view.uv_to_world().transform_point(Vec2::splat(1.0)), Vec2::new(30.0, 50.0)));
    }

    #[test]
    fn display_round_trip() {
        let view = ViewTransform::new(Vec2::new(-3.0, 7.0), Vec2::new(12.0, 9.0), Vec2::new(640.0, 480.0));
        for p in [Vec2::zero(), Vec2::new(10.5, 200.0), Vec2::new(639.0, 479.0)] {
            assert!(close(view.world_to_display(view.display_to_world(p)), p));
        }
        let w = Vec2::new(1.25, -4.0);
        assert!(close(view.display_to_world(view.world_to_display(w)), w));
    }

    #[test]
    fn default_view_is_pixel_aligned() {
        let view = ViewTransform::for_canvas(Vec2::new(800.0, 600.0));
        // Display y grows downwards, world y upwards.
        assert!(close(view.display_to_world(Vec2::new(0.0, 0.0)), Vec2::new(0.5, 599.5)));
        assert!(close(view.display_to_world(Vec2::new(799.0, 599.0)), Vec2::new(799.5, 0.5)));
    }
}
