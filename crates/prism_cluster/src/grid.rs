use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use prism_core::{Camera, ClusterConfig};
use thiserror::Error;

use crate::bounds::Aabb;

pub const DEFAULT_TILE_SIZE: u32 = 128;
pub const DEFAULT_SLICE_COUNT: u32 = 256;
pub const DEFAULT_MAX_LIGHTS_PER_CLUSTER: u32 = 500;

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("viewport {width}x{height} has no area")]
    EmptyViewport { width: u32, height: u32 },
    #[error("tile size {width}x{height} must be non-zero")]
    EmptyTile { width: u32, height: u32 },
    #[error("slice count must be at least 1")]
    NoSlices,
    #[error("max lights per cluster must be at least 1")]
    NoCapacity,
    #[error("depth range near={near} far={far} is invalid")]
    DepthRange { near: f32, far: f32 },
    #[error("vertical field of view {0} rad is invalid")]
    FieldOfView(f32),
    #[error("cluster grid {tile_count_x}x{tile_count_y}x{slice_count} does not fit 32-bit light slot indices")]
    TooManyClusters {
        tile_count_x: u32,
        tile_count_y: u32,
        slice_count: u32,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Projection {
    pub near: f32,
    pub far: f32,
    pub fov_y: f32,
}

impl From<&Camera> for Projection {
    fn from(camera: &Camera) -> Self {
        Self {
            near: camera.near,
            far: camera.far,
            fov_y: camera.fov,
        }
    }
}

/// Fixed shape of the grid, independent of the viewport.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GridLayout {
    pub tile_width: u32,
    pub tile_height: u32,
    pub slice_count: u32,
    pub max_lights_per_cluster: u32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            slice_count: DEFAULT_SLICE_COUNT,
            max_lights_per_cluster: DEFAULT_MAX_LIGHTS_PER_CLUSTER,
        }
    }
}

impl From<&ClusterConfig> for GridLayout {
    fn from(config: &ClusterConfig) -> Self {
        Self {
            tile_width: config.tile_width,
            tile_height: config.tile_height,
            slice_count: config.slice_count,
            max_lights_per_cluster: config.max_lights_per_cluster,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClusterCoord {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl ClusterCoord {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// The 48 byte cluster parameter record read by the clustering and shading shaders.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ClusterParams {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub near: f32,
    pub far: f32,
    pub fov_y: f32,
    pub slice_count: u32,
    pub max_lights_per_cluster: u32,
    pub _reserved: [u32; 3],
}

/// Partition of the view frustum into screen tiles x depth slices.
///
/// Depth slices are spaced exponentially: slice `k` of `S` covers
/// `[near * (far/near)^(k/S), near * (far/near)^((k+1)/S)]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClusterGrid {
    viewport: Viewport,
    layout: GridLayout,
    projection: Projection,
    tile_count_x: u32,
    tile_count_y: u32,
    cluster_count: u32,
}

impl ClusterGrid {
    pub fn build(
        viewport: Viewport,
        layout: GridLayout,
        projection: Projection,
    ) -> Result<Self, GridError> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(GridError::EmptyViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }
        if layout.tile_width == 0 || layout.tile_height == 0 {
            return Err(GridError::EmptyTile {
                width: layout.tile_width,
                height: layout.tile_height,
            });
        }
        if layout.slice_count == 0 {
            return Err(GridError::NoSlices);
        }
        if layout.max_lights_per_cluster == 0 {
            return Err(GridError::NoCapacity);
        }
        if !(projection.near > 0.0 && projection.far > projection.near) {
            return Err(GridError::DepthRange {
                near: projection.near,
                far: projection.far,
            });
        }
        if !(projection.fov_y > 0.0 && projection.fov_y < std::f32::consts::PI) {
            return Err(GridError::FieldOfView(projection.fov_y));
        }

        let tile_count_x = viewport.width.div_ceil(layout.tile_width);
        let tile_count_y = viewport.height.div_ceil(layout.tile_height);
        // the flat light slot array is indexed with u32 in the shaders
        let cluster_count = tile_count_x
            .checked_mul(tile_count_y)
            .and_then(|tiles| tiles.checked_mul(layout.slice_count))
            .filter(|clusters| clusters.checked_mul(layout.max_lights_per_cluster).is_some())
            .ok_or(GridError::TooManyClusters {
                tile_count_x,
                tile_count_y,
                slice_count: layout.slice_count,
            })?;

        Ok(Self {
            viewport,
            layout,
            projection,
            tile_count_x,
            tile_count_y,
            cluster_count,
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn layout(&self) -> GridLayout {
        self.layout
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn tile_count_x(&self) -> u32 {
        self.tile_count_x
    }

    pub fn tile_count_y(&self) -> u32 {
        self.tile_count_y
    }

    pub fn slice_count(&self) -> u32 {
        self.layout.slice_count
    }

    pub fn cluster_count(&self) -> u32 {
        self.cluster_count
    }

    pub fn max_lights_per_cluster(&self) -> u32 {
        self.layout.max_lights_per_cluster
    }

    pub fn cluster_index(&self, coord: ClusterCoord) -> usize {
        debug_assert!(coord.x < self.tile_count_x);
        debug_assert!(coord.y < self.tile_count_y);
        debug_assert!(coord.z < self.layout.slice_count);
        let (x, y, z) = (coord.x as usize, coord.y as usize, coord.z as usize);
        let (tx, ty) = (self.tile_count_x as usize, self.tile_count_y as usize);
        z * ty * tx + y * tx + x
    }

    pub fn cluster_coord(&self, index: usize) -> ClusterCoord {
        let tx = self.tile_count_x as usize;
        let per_slice = tx * self.tile_count_y as usize;
        let z = index / per_slice;
        let rem = index % per_slice;
        ClusterCoord::new((rem % tx) as u32, (rem / tx) as u32, z as u32)
    }

    /// Slice holding view-space distance `depth`, clamped to the grid.
    pub fn slice_of_depth(&self, depth: f32) -> u32 {
        let Projection { near, far, .. } = self.projection;
        let last = self.layout.slice_count - 1;
        if !(depth > near) {
            return 0;
        }
        let t = (depth / near).ln() / (far / near).ln();
        let slice = (t * self.layout.slice_count as f32).floor();
        (slice.max(0.0) as u32).min(last)
    }

    /// Near and far distance of slice `z`.
    pub fn slice_depth_range(&self, z: u32) -> (f32, f32) {
        let Projection { near, far, .. } = self.projection;
        let ratio = far / near;
        let count = self.layout.slice_count as f32;
        let lo = if z == 0 {
            near
        } else {
            near * ratio.powf(z as f32 / count)
        };
        let hi = if z + 1 >= self.layout.slice_count {
            far
        } else {
            near * ratio.powf((z + 1) as f32 / count)
        };
        (lo, hi)
    }

    /// Tile under a framebuffer position (origin top-left, y down), clamped.
    pub fn tile_of_pixel(&self, frag_coord: Vec2) -> (u32, u32) {
        let tx = (frag_coord.x / self.layout.tile_width as f32).floor().max(0.0) as u32;
        let ty = (frag_coord.y / self.layout.tile_height as f32).floor().max(0.0) as u32;
        (tx.min(self.tile_count_x - 1), ty.min(self.tile_count_y - 1))
    }

    pub fn cluster_of_fragment(&self, frag_coord: Vec2, view_depth: f32) -> ClusterCoord {
        let (x, y) = self.tile_of_pixel(frag_coord);
        ClusterCoord::new(x, y, self.slice_of_depth(view_depth))
    }

    /// View-space box enclosing the frustum slab of `coord`.
    /// The tile rectangle is clipped to the viewport.
    pub fn cluster_aabb(&self, coord: ClusterCoord) -> Aabb {
        let Viewport { width, height } = self.viewport;
        let x0 = coord.x * self.layout.tile_width;
        let x1 = ((coord.x + 1) * self.layout.tile_width).min(width);
        let y0 = coord.y * self.layout.tile_height;
        let y1 = ((coord.y + 1) * self.layout.tile_height).min(height);

        let ndc_x0 = x0 as f32 / width as f32 * 2.0 - 1.0;
        let ndc_x1 = x1 as f32 / width as f32 * 2.0 - 1.0;
        // framebuffer y grows downwards, NDC y upwards
        let ndc_y0 = 1.0 - y1 as f32 / height as f32 * 2.0;
        let ndc_y1 = 1.0 - y0 as f32 / height as f32 * 2.0;

        let tan_half = (self.projection.fov_y * 0.5).tan();
        let scale_x = tan_half * self.viewport.aspect();
        let (near, far) = self.slice_depth_range(coord.z);

        let mut corners = [Vec3::ZERO; 8];
        let mut i = 0;
        for depth in [near, far] {
            for ndc_x in [ndc_x0, ndc_x1] {
                for ndc_y in [ndc_y0, ndc_y1] {
                    corners[i] = Vec3::new(
                        ndc_x * depth * scale_x,
                        ndc_y * depth * tan_half,
                        -depth,
                    );
                    i += 1;
                }
            }
        }
        Aabb::from_points(&corners)
    }

    pub fn params(&self) -> ClusterParams {
        ClusterParams {
            width: self.viewport.width,
            height: self.viewport.height,
            tile_width: self.layout.tile_width,
            tile_height: self.layout.tile_height,
            near: self.projection.near,
            far: self.projection.far,
            fov_y: self.projection.fov_y,
            slice_count: self.layout.slice_count,
            max_lights_per_cluster: self.layout.max_lights_per_cluster,
            _reserved: [0; 3],
        }
    }

    /// Worker groups needed to cover every cluster with groups of `workgroup` shape.
    pub fn dispatch_size(&self, workgroup: [u32; 3]) -> [u32; 3] {
        [
            self.tile_count_x.div_ceil(workgroup[0]),
            self.tile_count_y.div_ceil(workgroup[1]),
            self.layout.slice_count.div_ceil(workgroup[2]),
        ]
    }

    pub fn count_buffer_size(&self) -> u64 {
        self.cluster_count as u64 * 4
    }

    pub fn index_buffer_size(&self) -> u64 {
        self.cluster_count as u64 * self.layout.max_lights_per_cluster as u64 * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn projection() -> Projection {
        Projection {
            near: 0.1,
            far: 1000.0,
            fov_y: 45f32.to_radians(),
        }
    }

    fn hd_grid() -> ClusterGrid {
        ClusterGrid::build(Viewport::new(1920, 1080), GridLayout::default(), projection()).unwrap()
    }

    #[test]
    fn full_hd_grid_dimensions() {
        let grid = hd_grid();
        assert_eq!(grid.tile_count_x(), 15);
        assert_eq!(grid.tile_count_y(), 9);
        assert_eq!(grid.cluster_count(), 34560);
        assert_eq!(grid.dispatch_size([4, 4, 4]), [4, 3, 64]);
        assert_eq!(grid.count_buffer_size(), 34560 * 4);
        assert_eq!(grid.index_buffer_size(), 34560 * 500 * 4);
    }

    #[test]
    fn oversized_grid_is_rejected_instead_of_wrapping() {
        let layout = GridLayout {
            tile_width: 1,
            tile_height: 1,
            slice_count: 4096,
            ..Default::default()
        };
        let err = ClusterGrid::build(Viewport::new(1920, 1080), layout, projection()).unwrap_err();
        assert_eq!(
            err,
            GridError::TooManyClusters {
                tile_count_x: 1920,
                tile_count_y: 1080,
                slice_count: 4096,
            }
        );

        // cluster count fits but the light slots behind it do not
        let layout = GridLayout {
            tile_width: 1,
            tile_height: 1,
            slice_count: 16,
            max_lights_per_cluster: 500,
        };
        let err = ClusterGrid::build(Viewport::new(1920, 1080), layout, projection()).unwrap_err();
        assert!(matches!(err, GridError::TooManyClusters { .. }));
    }

    #[test]
    fn linear_index_round_trips_and_is_dense() {
        let layout = GridLayout {
            slice_count: 7,
            ..Default::default()
        };
        let grid = ClusterGrid::build(Viewport::new(300, 200), layout, projection()).unwrap();
        let mut seen = vec![false; grid.cluster_count() as usize];
        for z in 0..grid.slice_count() {
            for y in 0..grid.tile_count_y() {
                for x in 0..grid.tile_count_x() {
                    let coord = ClusterCoord::new(x, y, z);
                    let index = grid.cluster_index(coord);
                    assert!(index < grid.cluster_count() as usize);
                    assert!(!seen[index]);
                    seen[index] = true;
                    assert_eq!(grid.cluster_coord(index), coord);
                }
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn params_record_matches_byte_layout() {
        let grid = hd_grid();
        let params = grid.params();
        let bytes = bytemuck::bytes_of(&params);
        assert_eq!(bytes.len(), 48);

        let u32_at = |o: usize| u32::from_le_bytes(bytes[o..o + 4].try_into().unwrap());
        let f32_at = |o: usize| f32::from_le_bytes(bytes[o..o + 4].try_into().unwrap());
        assert_eq!(u32_at(0), 1920);
        assert_eq!(u32_at(4), 1080);
        assert_eq!(u32_at(8), 128);
        assert_eq!(u32_at(12), 128);
        assert_eq!(f32_at(16), 0.1);
        assert_eq!(f32_at(20), 1000.0);
        assert_eq!(f32_at(24), 45f32.to_radians());
        assert_eq!(u32_at(28), 256);
        assert_eq!(u32_at(32), 500);
        assert!(bytes[36..].iter().all(|b| *b == 0));
    }

    #[test]
    fn slices_cover_depth_range_monotonically() {
        let grid = hd_grid();
        let (first, _) = grid.slice_depth_range(0);
        let (_, last) = grid.slice_depth_range(grid.slice_count() - 1);
        assert_eq!(first, 0.1);
        assert_eq!(last, 1000.0);

        for z in 1..grid.slice_count() {
            let (_, prev_hi) = grid.slice_depth_range(z - 1);
            let (lo, hi) = grid.slice_depth_range(z);
            assert_eq!(prev_hi, lo);
            assert!(hi > lo);
        }

        let mut previous = 0;
        for step in 0..=10_000 {
            let depth = 0.1 + (1000.0 - 0.1) * step as f32 / 10_000.0;
            let slice = grid.slice_of_depth(depth);
            assert!(slice >= previous);
            assert!(slice < grid.slice_count());
            previous = slice;
        }
        assert_eq!(grid.slice_of_depth(0.1), 0);
        assert_eq!(grid.slice_of_depth(1000.0), grid.slice_count() - 1);
    }

    #[test]
    fn slice_of_depth_agrees_with_slice_bounds() {
        let grid = hd_grid();
        for z in [0, 1, 17, 128, 254, 255] {
            let (lo, hi) = grid.slice_depth_range(z);
            let mid = (lo * hi).sqrt();
            assert_eq!(grid.slice_of_depth(mid), z);
        }
    }

    #[test]
    fn out_of_range_inputs_clamp() {
        let grid = hd_grid();
        assert_eq!(grid.slice_of_depth(0.0), 0);
        assert_eq!(grid.slice_of_depth(-5.0), 0);
        assert_eq!(grid.slice_of_depth(5000.0), 255);
        assert_eq!(grid.tile_of_pixel(Vec2::new(-3.0, -3.0)), (0, 0));
        assert_eq!(grid.tile_of_pixel(Vec2::new(1919.5, 1079.5)), (14, 8));
        assert_eq!(grid.tile_of_pixel(Vec2::new(5000.0, 5000.0)), (14, 8));
    }

    #[test]
    fn cluster_aabb_spans_slice_depths() {
        let grid = hd_grid();
        let coord = ClusterCoord::new(3, 2, 40);
        let aabb = grid.cluster_aabb(coord);
        let (near, far) = grid.slice_depth_range(40);
        assert_relative_eq!(aabb.max.z, -near);
        assert_relative_eq!(aabb.min.z, -far);
    }

    #[test]
    fn fragment_inside_cluster_box() {
        let grid = hd_grid();
        let tan_half = (grid.projection().fov_y * 0.5).tan();
        let aspect = grid.viewport().aspect();
        for (px, py, depth) in [(10.0, 10.0, 0.5), (960.0, 540.0, 12.0), (1900.0, 1070.0, 700.0)] {
            let frag = Vec2::new(px, py);
            let ndc_x = px / 1920.0 * 2.0 - 1.0;
            let ndc_y = 1.0 - py / 1080.0 * 2.0;
            let view = Vec3::new(ndc_x * depth * tan_half * aspect, ndc_y * depth * tan_half, -depth);
            let coord = grid.cluster_of_fragment(frag, depth);
            assert!(grid.cluster_aabb(coord).contains(view), "{coord:?} misses {view:?}");
        }
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let layout = GridLayout::default();
        assert!(matches!(
            ClusterGrid::build(Viewport::new(0, 10), layout, projection()),
            Err(GridError::EmptyViewport { .. })
        ));
        let bad_depth = Projection {
            near: 5.0,
            far: 1.0,
            ..projection()
        };
        assert!(matches!(
            ClusterGrid::build(Viewport::new(10, 10), layout, bad_depth),
            Err(GridError::DepthRange { .. })
        ));
        let no_slices = GridLayout {
            slice_count: 0,
            ..layout
        };
        assert_eq!(
            ClusterGrid::build(Viewport::new(10, 10), no_slices, projection()),
            Err(GridError::NoSlices)
        );
    }
}
