use crate::coords::{Rect, Vec2};
use crate::device::PixelRect;

use super::ViewTransform;

/// One cell of the tile grid.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tile {
    /// Pixel rectangle in the target, origin top-left.
    pub scissor: PixelRect,
    /// The same area in world space.
    pub world: Rect,
}

impl Tile {
    #[inline]
    pub fn center(&self) -> Vec2 {
        self.world.center()
    }

    /// Half of the tile's world diagonal.
    #[inline]
    pub fn radius(&self) -> f32 {
        self.world.bounding_radius()
    }

    /// Broad-phase test for shapes: `min_distance` is a lower bound of the
    /// distance from the tile centre.
    #[inline]
    pub fn may_contain(&self, min_distance: f32) -> bool {
        min_distance < 2.0 * self.radius()
    }
}

/// Largest tile multiplier honoured per side.
pub const MAX_TILE_MULTIPLIER: u32 = 256;

/// Splits a `size` pixel target into `multiplier × multiplier` tiles.
///
/// Tile edges are rounded to whole pixels so the tiles cover the target exactly
/// without overlap. Tiles are ordered column by column starting bottom-left.
/// Empty tiles (more tiles than pixels) are skipped. `multiplier` is clamped
/// to `1..=MAX_TILE_MULTIPLIER`.
pub fn tile_grid(size: (u32, u32), multiplier: u32, view: &ViewTransform) -> Vec<Tile> {
    let m = multiplier.clamp(1, MAX_TILE_MULTIPLIER);
    let (width, height) = size;
    let edge = |i: u32, extent: u32| -> u32 {
        ((u64::from(i) * u64::from(extent) + u64::from(m) / 2) / u64::from(m)) as u32
    };
    let uv_to_world = view.uv_to_world();

    let mut tiles = Vec::with_capacity(m as usize * m as usize);
    for i in 0..m {
        let (x0, x1) = (edge(i, width), edge(i + 1, width));
        for j in 0..m {
            // `j` counts from the bottom; pixel rows count from the top.
            let (y0, y1) = (edge(j, height), edge(j + 1, height));
            if x1 == x0 || y1 == y0 {
                continue;
            }

            let uv_min = Vec2::new(x0 as f32 / width as f32, y0 as f32 / height as f32);
            let uv_max = Vec2::new(x1 as f32 / width as f32, y1 as f32 / height as f32);
            let min = uv_to_world.transform_point(uv_min);
            let max = uv_to_world.transform_point(uv_max);

            tiles.push(Tile {
                scissor: PixelRect::new(x0, height - y1, x1 - x0, y1 - y0),
                world: Rect::from_origin_size(min, max - min),
            });
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> ViewTransform {
        ViewTransform::new(Vec2::new(0.0, 100.0), Vec2::new(200.0, 100.0), Vec2::new(200.0, 100.0))
    }

    #[test]
    fn tiles_cover_target_exactly() {
        let size = (203, 101);
        let tiles = tile_grid(size, 8, &view());
        assert_eq!(tiles.len(), 64);
        let area: u32 = tiles.iter().map(|t| t.scissor.width * t.scissor.height).sum();
        assert_eq!(area, size.0 * size.1);
        for t in &tiles {
            assert!(t.scissor.x + t.scissor.width <= size.0);
            assert!(t.scissor.y + t.scissor.height <= size.1);
        }
    }

    #[test]
    fn first_tile_is_bottom_left_then_upwards() {
        let tiles = tile_grid((200, 100), 2, &view());
        assert_eq!(tiles[0].scissor, PixelRect::new(0, 50, 100, 50));
        assert_eq!(tiles[0].world, Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(tiles[1].scissor, PixelRect::new(0, 0, 100, 50));
        assert_eq!(tiles[1].world.origin, Vec2::new(0.0, 50.0));
        assert_eq!(tiles[2].scissor, PixelRect::new(100, 50, 100, 50));
    }

    #[test]
    fn radius_is_half_world_diagonal() {
        let tiles = tile_grid((200, 100), 1, &view());
        assert_eq!(tiles.len(), 1);
        let expected = (200.0f32 * 200.0 + 100.0 * 100.0).sqrt() / 2.0;
        assert!((tiles[0].radius() - expected).abs() < 1e-3);
        assert_eq!(tiles[0].center(), Vec2::new(100.0, 50.0));
    }

    #[test]
    fn culling_never_keeps_far_drawables() {
        let tiles = tile_grid((200, 100), 4, &view());
        for t in &tiles {
            let r = t.radius();
            assert!(t.may_contain(2.0 * r - 0.01));
            assert!(!t.may_contain(2.0 * r));
            assert!(!t.may_contain(2.0 * r + 5.0));
        }
    }

    #[test]
    fn tiny_targets_skip_empty_tiles() {
        let tiles = tile_grid((3, 2), 8, &view());
        let area: u32 = tiles.iter().map(|t| t.scissor.width * t.scissor.height).sum();
        assert_eq!(area, 6);
        assert!(tiles.iter().all(|t| !t.scissor.is_empty()));
    }

    #[test]
    fn huge_multiplier_is_clamped_to_one_tile_per_pixel() {
        let tiles = tile_grid((200, 100), u32::MAX, &view());
        assert_eq!(tiles.len(), 200 * 100);
        assert!(tiles.iter().all(|t| t.scissor.width == 1 && t.scissor.height == 1));
    }
}
