use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use glam::Mat4;
use rayon::prelude::*;
use thiserror::Error;

use crate::{
    bounds::Sphere,
    grid::{ClusterCoord, ClusterGrid},
    light::LightView,
};

pub const DEFAULT_WORKGROUP_SIZE: [u32; 3] = [4, 4, 4];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssignError {
    #[error(
        "cluster buffers hold {buffer_clusters} clusters x {buffer_capacity} slots but the grid needs {grid_clusters} x {grid_capacity}; rebuild them after a resize"
    )]
    StaleGrid {
        buffer_clusters: u32,
        buffer_capacity: u32,
        grid_clusters: u32,
        grid_capacity: u32,
    },
}

/// Per-cluster light counts and fixed-size light index segments.
///
/// Any worker may append to any cluster. A slot is reserved by bumping the
/// count with a compare-and-swap that refuses to go past capacity, then the
/// light index is stored in the reserved slot. A refused reservation marks
/// the cluster as overflowed for the frame.
pub struct ClusterBuffers {
    counts: Vec<AtomicU32>,
    indices: Vec<AtomicU32>,
    overflowed: Vec<AtomicBool>,
    max_lights_per_cluster: u32,
}

impl ClusterBuffers {
    pub fn new(grid: &ClusterGrid) -> Self {
        let clusters = grid.cluster_count() as usize;
        let capacity = grid.max_lights_per_cluster();
        Self {
            counts: (0..clusters).map(|_| AtomicU32::new(0)).collect(),
            indices: (0..clusters * capacity as usize)
                .map(|_| AtomicU32::new(0))
                .collect(),
            overflowed: (0..clusters).map(|_| AtomicBool::new(false)).collect(),
            max_lights_per_cluster: capacity,
        }
    }

    pub fn cluster_count(&self) -> u32 {
        self.counts.len() as u32
    }

    pub fn max_lights_per_cluster(&self) -> u32 {
        self.max_lights_per_cluster
    }

    pub fn fits(&self, grid: &ClusterGrid) -> bool {
        self.cluster_count() == grid.cluster_count()
            && self.max_lights_per_cluster == grid.max_lights_per_cluster()
    }

    pub fn check(&self, grid: &ClusterGrid) -> Result<(), AssignError> {
        if self.fits(grid) {
            return Ok(());
        }
        Err(AssignError::StaleGrid {
            buffer_clusters: self.cluster_count(),
            buffer_capacity: self.max_lights_per_cluster,
            grid_clusters: grid.cluster_count(),
            grid_capacity: grid.max_lights_per_cluster(),
        })
    }

    /// Zeroes every count and overflow mark. Index slots are left as they
    /// are; nothing reads past a cluster's count.
    pub fn clear_counts(&mut self) {
        self.counts
            .par_iter_mut()
            .for_each(|count| *count.get_mut() = 0);
        self.overflowed
            .par_iter_mut()
            .for_each(|flag| *flag.get_mut() = false);
    }

    /// Appends `light` to `cluster`. Returns false when the cluster is full
    /// and the light was dropped.
    pub fn try_push(&self, cluster: usize, light: u32) -> bool {
        let capacity = self.max_lights_per_cluster;
        let reserved = self.counts[cluster].fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
            (c < capacity).then_some(c + 1)
        });
        match reserved {
            Ok(slot) => {
                let base = cluster * capacity as usize;
                self.indices[base + slot as usize].store(light, Ordering::Release);
                true
            }
            Err(_) => {
                self.overflowed[cluster].store(true, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn count(&self, cluster: usize) -> u32 {
        self.counts[cluster].load(Ordering::Acquire)
    }

    /// The recorded light indices of `cluster`, in slot order.
    pub fn lights(&self, cluster: usize) -> impl Iterator<Item = u32> + '_ {
        let base = cluster * self.max_lights_per_cluster as usize;
        let count = self.count(cluster) as usize;
        self.indices[base..base + count]
            .iter()
            .map(|slot| slot.load(Ordering::Acquire))
    }

    /// Clusters that refused at least one light since the last clear.
    pub fn overflowed_clusters(&self) -> u32 {
        self.overflowed
            .iter()
            .filter(|flag| flag.load(Ordering::Relaxed))
            .count() as u32
    }

    pub fn counts(&self) -> Vec<u32> {
        self.counts
            .iter()
            .map(|count| count.load(Ordering::Acquire))
            .collect()
    }

    /// The full index buffer image, `cluster_count * max_lights_per_cluster` slots.
    pub fn index_slots(&self) -> Vec<u32> {
        self.indices
            .iter()
            .map(|slot| slot.load(Ordering::Acquire))
            .collect()
    }
}

/// How assignment work is split between workers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DispatchOrder {
    /// One granule per cluster coordinate, grouped into worker groups.
    /// Each granule tests every light against its own slab.
    #[default]
    ClusterMajor,
    /// One granule per light, scattering into every cluster it touches.
    /// Several workers race on the same cluster.
    LightMajor,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AssignStats {
    /// Light indices written into cluster lists.
    pub assignments: u64,
    /// Overlaps dropped because the cluster was full.
    pub dropped: u64,
    /// Clusters that had to drop at least one light.
    pub overflowed_clusters: u32,
    pub max_cluster_occupancy: u32,
}

/// Bins lights into clusters every frame.
#[derive(Copy, Clone, Debug)]
pub struct ClusterAssigner {
    workgroup_size: [u32; 3],
    order: DispatchOrder,
}

impl Default for ClusterAssigner {
    fn default() -> Self {
        Self::new(DEFAULT_WORKGROUP_SIZE)
    }
}

impl ClusterAssigner {
    pub fn new(workgroup_size: [u32; 3]) -> Self {
        Self {
            workgroup_size: workgroup_size.map(|d| d.max(1)),
            order: DispatchOrder::ClusterMajor,
        }
    }

    pub fn with_order(mut self, order: DispatchOrder) -> Self {
        self.order = order;
        self
    }

    pub fn order(&self) -> DispatchOrder {
        self.order
    }

    /// Records, for every cluster, the active lights whose influence sphere
    /// overlaps the cluster's box, up to the per-cluster capacity.
    ///
    /// `buffers` must have been cleared for this frame.
    pub fn assign(
        &self,
        lights: LightView<'_>,
        view: Mat4,
        grid: &ClusterGrid,
        buffers: &ClusterBuffers,
    ) -> Result<AssignStats, AssignError> {
        buffers.check(grid)?;

        let spheres = view_space_spheres(lights, view);
        let mut stats = match self.order {
            DispatchOrder::ClusterMajor => self.assign_by_cluster(&spheres, grid, buffers),
            DispatchOrder::LightMajor => assign_by_light(&spheres, grid, buffers),
        };

        let capacity = grid.max_lights_per_cluster();
        let counts = buffers.counts();
        stats.max_cluster_occupancy = counts.iter().copied().max().unwrap_or(0);
        if stats.dropped > 0 {
            stats.overflowed_clusters = buffers.overflowed_clusters();
            log::warn!(
                "{} light overlaps dropped across {} full clusters (capacity {})",
                stats.dropped,
                stats.overflowed_clusters,
                capacity
            );
        }
        log::debug!(
            "Assigned {} lights: {} entries, max occupancy {}",
            spheres.len(),
            stats.assignments,
            stats.max_cluster_occupancy
        );
        Ok(stats)
    }

    fn assign_by_cluster(
        &self,
        spheres: &[Sphere],
        grid: &ClusterGrid,
        buffers: &ClusterBuffers,
    ) -> AssignStats {
        let [wx, wy, wz] = self.workgroup_size;
        let [gx, gy, gz] = grid.dispatch_size(self.workgroup_size);
        let group_count = gx as usize * gy as usize * gz as usize;

        (0..group_count)
            .into_par_iter()
            .map(|group| {
                let group = group as u32;
                let origin = [group % gx * wx, group / gx % gy * wy, group / (gx * gy) * wz];
                let mut local = AssignStats::default();

                for lz in 0..wz {
                    for ly in 0..wy {
                        for lx in 0..wx {
                            let coord = ClusterCoord::new(origin[0] + lx, origin[1] + ly, origin[2] + lz);
                            // groups on the grid edge overhang it
                            if coord.x >= grid.tile_count_x()
                                || coord.y >= grid.tile_count_y()
                                || coord.z >= grid.slice_count()
                            {
                                continue;
                            }
                            assign_cluster(coord, spheres, grid, buffers, &mut local);
                        }
                    }
                }
                local
            })
            .reduce(AssignStats::default, merge_stats)
    }
}

fn assign_cluster(
    coord: ClusterCoord,
    spheres: &[Sphere],
    grid: &ClusterGrid,
    buffers: &ClusterBuffers,
    stats: &mut AssignStats,
) {
    let cluster = grid.cluster_index(coord);
    let aabb = grid.cluster_aabb(coord);
    for (light, sphere) in spheres.iter().enumerate() {
        if !sphere.intersects_aabb(&aabb) {
            continue;
        }
        if buffers.try_push(cluster, light as u32) {
            stats.assignments += 1;
        } else {
            stats.dropped += 1;
        }
    }
}

fn assign_by_light(spheres: &[Sphere], grid: &ClusterGrid, buffers: &ClusterBuffers) -> AssignStats {
    spheres
        .par_iter()
        .enumerate()
        .map(|(light, sphere)| {
            let mut local = AssignStats::default();
            let depth = -sphere.center.z;
            if depth + sphere.radius < grid.projection().near {
                return local;
            }
            // one extra slice each way absorbs ln/powf rounding at slab edges
            let first = grid.slice_of_depth(depth - sphere.radius).saturating_sub(1);
            let last = (grid.slice_of_depth(depth + sphere.radius) + 1).min(grid.slice_count() - 1);

            for z in first..=last {
                for y in 0..grid.tile_count_y() {
                    for x in 0..grid.tile_count_x() {
                        let coord = ClusterCoord::new(x, y, z);
                        if !sphere.intersects_aabb(&grid.cluster_aabb(coord)) {
                            continue;
                        }
                        if buffers.try_push(grid.cluster_index(coord), light as u32) {
                            local.assignments += 1;
                        } else {
                            local.dropped += 1;
                        }
                    }
                }
            }
            local
        })
        .reduce(AssignStats::default, merge_stats)
}

fn merge_stats(a: AssignStats, b: AssignStats) -> AssignStats {
    AssignStats {
        assignments: a.assignments + b.assignments,
        dropped: a.dropped + b.dropped,
        overflowed_clusters: 0,
        max_cluster_occupancy: 0,
    }
}

/// Light spheres moved into view space, indexed like the light view.
pub fn view_space_spheres(lights: LightView<'_>, view: Mat4) -> Vec<Sphere> {
    lights
        .lights
        .par_iter()
        .map(|light| Sphere {
            center: view.transform_point3(light.position()),
            radius: lights.falloff.influence_radius(light.color()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use glam::Vec3;

    use super::*;
    use crate::{
        grid::{GridLayout, Projection, Viewport},
        light::{GpuLight, LightFalloff},
    };

    fn small_grid(capacity: u32) -> ClusterGrid {
        let layout = GridLayout {
            tile_width: 64,
            tile_height: 64,
            slice_count: 8,
            max_lights_per_cluster: capacity,
        };
        let projection = Projection {
            near: 0.5,
            far: 50.0,
            fov_y: 60f32.to_radians(),
        };
        ClusterGrid::build(Viewport::new(320, 192), layout, projection).unwrap()
    }

    fn falloff() -> LightFalloff {
        LightFalloff { cutoff: 0.025 }
    }

    #[test]
    fn try_push_never_exceeds_capacity() {
        let grid = small_grid(3);
        let buffers = ClusterBuffers::new(&grid);
        let accepted = (0..10).filter(|light| buffers.try_push(5, *light)).count();
        assert_eq!(accepted, 3);
        assert_eq!(buffers.count(5), 3);
        assert_eq!(buffers.lights(5).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn concurrent_pushes_fill_exactly_to_capacity() {
        let grid = small_grid(64);
        let buffers = ClusterBuffers::new(&grid);
        let accepted: usize = (0..1000u32)
            .into_par_iter()
            .filter(|light| buffers.try_push(0, *light))
            .count();
        assert_eq!(accepted, 64);
        assert_eq!(buffers.count(0), 64);
        let unique: BTreeSet<u32> = buffers.lights(0).collect();
        assert_eq!(unique.len(), 64);
    }

    #[test]
    fn clear_counts_resets_every_cluster() {
        let grid = small_grid(4);
        let mut buffers = ClusterBuffers::new(&grid);
        for cluster in 0..grid.cluster_count() as usize {
            buffers.try_push(cluster, 1);
            buffers.try_push(cluster, 2);
        }
        buffers.clear_counts();
        assert!(buffers.counts().iter().all(|c| *c == 0));
        buffers.clear_counts();
        assert!(buffers.counts().iter().all(|c| *c == 0));
    }

    #[test]
    fn stale_buffers_are_rejected() {
        let grid = small_grid(4);
        let buffers = ClusterBuffers::new(&grid);
        let resized = ClusterGrid::build(Viewport::new(640, 480), grid.layout(), grid.projection()).unwrap();
        let lights = [GpuLight::new(Vec3::new(0.0, 0.0, -5.0), Vec3::splat(0.1))];
        let err = ClusterAssigner::default()
            .assign(LightView::new(&lights, falloff()), Mat4::IDENTITY, &resized, &buffers)
            .unwrap_err();
        assert!(matches!(err, AssignError::StaleGrid { .. }));
    }

    #[test]
    fn light_behind_camera_touches_nothing() {
        let grid = small_grid(8);
        let buffers = ClusterBuffers::new(&grid);
        let lights = [GpuLight::new(Vec3::new(0.0, 0.0, 10.0), Vec3::splat(0.1))];
        for order in [DispatchOrder::ClusterMajor, DispatchOrder::LightMajor] {
            let stats = ClusterAssigner::default()
                .with_order(order)
                .assign(LightView::new(&lights, falloff()), Mat4::IDENTITY, &grid, &buffers)
                .unwrap();
            assert_eq!(stats.assignments, 0);
        }
        assert!(buffers.counts().iter().all(|c| *c == 0));
    }

    #[test]
    fn overflow_is_reported() {
        let grid = small_grid(2);
        let mut buffers = ClusterBuffers::new(&grid);
        buffers.clear_counts();
        let lights: Vec<GpuLight> = (0..5)
            .map(|_| GpuLight::new(Vec3::new(0.0, 0.0, -5.0), Vec3::splat(0.1)))
            .collect();
        let stats = ClusterAssigner::default()
            .assign(LightView::new(&lights, falloff()), Mat4::IDENTITY, &grid, &buffers)
            .unwrap();
        assert!(stats.dropped > 0);
        assert!(stats.overflowed_clusters > 0);
        assert_eq!(stats.max_cluster_occupancy, 2);
    }

    #[test]
    fn cluster_filled_exactly_to_capacity_is_not_overflowed() {
        let grid = small_grid(2);
        let mut buffers = ClusterBuffers::new(&grid);
        assert!(buffers.try_push(3, 0));
        assert!(buffers.try_push(3, 1));
        assert_eq!(buffers.overflowed_clusters(), 0);
        assert!(!buffers.try_push(3, 2));
        assert_eq!(buffers.overflowed_clusters(), 1);
        buffers.clear_counts();
        assert_eq!(buffers.overflowed_clusters(), 0);
    }

    #[test]
    fn only_clusters_that_dropped_lights_count_as_overflowed() {
        let grid = small_grid(2);
        let left = GpuLight::new(Vec3::new(-8.0, 0.0, -20.0), Vec3::splat(0.1));
        let right = GpuLight::new(Vec3::new(8.0, 0.0, -20.0), Vec3::splat(0.1));
        // two lights fill the left clusters exactly, three overflow the right ones
        let lights = [left, left, right, right, right];

        for order in [DispatchOrder::ClusterMajor, DispatchOrder::LightMajor] {
            let assigner = ClusterAssigner::default().with_order(order);

            let mut crowded = ClusterBuffers::new(&grid);
            crowded.clear_counts();
            assigner
                .assign(LightView::new(&lights[2..], falloff()), Mat4::IDENTITY, &grid, &crowded)
                .unwrap();
            let right_clusters = crowded.counts().iter().filter(|c| **c > 0).count() as u32;
            assert!(right_clusters > 0);

            let mut buffers = ClusterBuffers::new(&grid);
            buffers.clear_counts();
            let stats = assigner
                .assign(LightView::new(&lights, falloff()), Mat4::IDENTITY, &grid, &buffers)
                .unwrap();
            let full_clusters = buffers.counts().iter().filter(|c| **c == 2).count() as u32;
            assert_eq!(stats.dropped, u64::from(right_clusters));
            assert_eq!(stats.overflowed_clusters, right_clusters);
            assert!(full_clusters > right_clusters);
        }
    }
}
