//! Uniform voxel grid over the scene.
//!
//! Each cell lists the primitives whose triangles overlap it. Rays walk the
//! grid cell by cell with a 3-D DDA, so only primitives near the ray are
//! tested.

use canopy_core::Scene;
use canopy_math::{Aabb, BoundingSphere, DVec3, Interval};
use rayon::prelude::*;

use crate::error::{TraceError, TraceResult};
use crate::overlap::tri_box_overlap;
use crate::ray::Ray;

/// Padding added to the scene bounds so ray origins fit strictly inside.
pub const GRID_EPSILON: f64 = 1e-6;

/// Distance a relocated ray origin is pulled back outside the box.
const RETRACT: f64 = 1e-7;

/// Incremental DDA state of a ray walking the grid.
///
/// Distances are ray parameters measured from the ray origin the walk
/// started from.
#[derive(Debug, Clone, Copy)]
pub struct CellWalker {
    cell: [i64; 3],
    step: [i64; 3],
    t_max: DVec3,
    t_delta: DVec3,
}

impl CellWalker {
    /// Cell coordinates of the current cell.
    pub fn cell(&self) -> [usize; 3] {
        [self.cell[0] as usize, self.cell[1] as usize, self.cell[2] as usize]
    }

    /// Ray parameter at which the walk leaves the current cell.
    pub fn exit_distance(&self) -> f64 {
        self.t_max.min_element()
    }
}

#[derive(Debug, Clone)]
pub struct Grid {
    /// Unpadded bounds of everything bounded so far
    extent: Aabb,
    /// Padded bounds the cells tile
    bounds: Aabb,
    sphere: BoundingSphere,
    resolution: [usize; 3],
    cell_size: DVec3,
    cells: Vec<Vec<u32>>,
}

impl Grid {
    pub fn new(resolution: [usize; 3]) -> TraceResult<Self> {
        if resolution.iter().any(|&n| n == 0) {
            return Err(TraceError::GridResolution(resolution));
        }
        Ok(Self {
            extent: Aabb::EMPTY,
            bounds: Aabb::EMPTY,
            sphere: BoundingSphere::EMPTY,
            resolution,
            cell_size: DVec3::ZERO,
            cells: Vec::new(),
        })
    }

    /// Bound every primitive of `scene` and fill the cells.
    pub fn build(resolution: [usize; 3], scene: &Scene) -> TraceResult<Self> {
        let mut grid = Self::new(resolution)?;
        for primitive in &scene.primitives {
            grid.bound_primitive(primitive.vertices());
        }
        grid.fill_grid(scene)?;
        Ok(grid)
    }

    /// Grow the bounding box and bounding sphere to enclose `vertices`.
    pub fn bound_primitive(&mut self, vertices: &[DVec3]) {
        for &v in vertices {
            self.extent = self.extent.include_point(v);
            self.sphere.include_point(v);
        }
    }

    /// Lay out cells over the bounded region and insert every primitive into
    /// the cells its triangles overlap.
    pub fn fill_grid(&mut self, scene: &Scene) -> TraceResult<()> {
        if self.extent.is_empty() {
            return Err(TraceError::EmptyScene);
        }

        let mut bounds = self.extent;
        for axis in 0..3 {
            let slab = bounds.axis_interval(axis);
            // X and Y always get room for ray origins; Z only when flat
            if axis < 2 || slab.size() <= 0.0 {
                bounds.set_axis_interval(axis, slab.expand(2.0 * GRID_EPSILON));
            }
        }
        self.bounds = bounds;
        self.cell_size = bounds.size()
            / DVec3::new(
                self.resolution[0] as f64,
                self.resolution[1] as f64,
                self.resolution[2] as f64,
            );

        let overlaps: Vec<Vec<usize>> = scene
            .primitives
            .par_iter()
            .map(|p| self.overlapping_cells(p))
            .collect();

        self.cells = vec![Vec::new(); self.cell_count()];
        let mut references = 0;
        for (index, cells) in overlaps.iter().enumerate() {
            for &cell in cells {
                self.cells[cell].push(index as u32);
            }
            references += cells.len();
        }

        let empty = self.cells.iter().filter(|c| c.is_empty()).count();
        log::info!(
            "Grid {}x{}x{}: {} primitives, {} cell references, {} empty cells",
            self.resolution[0],
            self.resolution[1],
            self.resolution[2],
            scene.primitives.len(),
            references,
            empty
        );
        Ok(())
    }

    fn overlapping_cells(&self, primitive: &canopy_core::Primitive) -> Vec<usize> {
        let prim_box = Aabb::from_slice(primitive.vertices());
        let lo = self.cell_of(prim_box.min());
        let hi = self.cell_of(prim_box.max());
        // Slightly larger cells catch triangles lying exactly on a cell face
        let half = self.cell_size * (0.5 + 1e-9);

        let mut cells = Vec::new();
        for iz in lo[2]..=hi[2] {
            for iy in lo[1]..=hi[1] {
                for ix in lo[0]..=hi[0] {
                    let center = self.bounds.min()
                        + self.cell_size
                            * DVec3::new(ix as f64 + 0.5, iy as f64 + 0.5, iz as f64 + 0.5);
                    if primitive
                        .triangles()
                        .any(|tri| tri_box_overlap(center, half, &tri))
                    {
                        cells.push(self.cell_index([ix, iy, iz]));
                    }
                }
            }
        }
        cells
    }

    /// Cell containing `p`, clamped into the grid.
    fn cell_of(&self, p: DVec3) -> [usize; 3] {
        let rel = (p - self.bounds.min()) / self.cell_size;
        let mut cell = [0; 3];
        for axis in 0..3 {
            let max = self.resolution[axis] as i64 - 1;
            cell[axis] = (rel[axis].floor() as i64).clamp(0, max) as usize;
        }
        cell
    }

    #[inline]
    pub fn cell_index(&self, cell: [usize; 3]) -> usize {
        cell[0] + self.resolution[0] * (cell[1] + self.resolution[1] * cell[2])
    }

    /// Primitive indices listed in a cell.
    pub fn cell(&self, index: usize) -> &[u32] {
        &self.cells[index]
    }

    pub fn cell_count(&self) -> usize {
        self.resolution.iter().product()
    }

    pub fn resolution(&self) -> [usize; 3] {
        self.resolution
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn cell_size(&self) -> DVec3 {
        self.cell_size
    }

    pub fn bounding_sphere(&self) -> &BoundingSphere {
        &self.sphere
    }

    /// Set up the walk of `ray` from the cell holding its origin.
    ///
    /// The origin should lie in, or within [`GRID_EPSILON`] of, the padded
    /// bounds; [`Grid::find_box_intersection`] arranges that.
    pub fn find_first_cell(&self, ray: &Ray) -> (usize, CellWalker) {
        let origin = ray.origin();
        let direction = ray.direction();
        let cell = self.cell_of(origin);
        let min = self.bounds.min();

        let mut walker = CellWalker {
            cell: [cell[0] as i64, cell[1] as i64, cell[2] as i64],
            step: [0; 3],
            t_max: DVec3::splat(f64::INFINITY),
            t_delta: DVec3::splat(f64::INFINITY),
        };

        for axis in 0..3 {
            let d = direction[axis];
            if d == 0.0 {
                continue;
            }
            let size = self.cell_size[axis];
            let (step, boundary) = if d > 0.0 {
                (1, min[axis] + (cell[axis] + 1) as f64 * size)
            } else {
                (-1, min[axis] + cell[axis] as f64 * size)
            };
            walker.step[axis] = step;
            walker.t_max[axis] = ((boundary - origin[axis]) / d).max(0.0);
            walker.t_delta[axis] = size / d.abs();
        }

        (self.cell_index(cell), walker)
    }

    /// Step into the next cell along the ray, or `None` once the walk leaves
    /// the grid.
    pub fn find_next_cell(&self, walker: &mut CellWalker) -> Option<usize> {
        let t = walker.t_max;
        let axis = if t.x <= t.y && t.x <= t.z {
            0
        } else if t.y <= t.z {
            1
        } else {
            2
        };
        if walker.step[axis] == 0 {
            return None;
        }

        walker.cell[axis] += walker.step[axis];
        if walker.cell[axis] < 0 || walker.cell[axis] >= self.resolution[axis] as i64 {
            return None;
        }
        walker.t_max[axis] += walker.t_delta[axis];
        Some(self.cell_index(walker.cell()))
    }

    /// Bring the ray to the grid: rays starting inside keep their origin,
    /// rays starting outside are moved to just before the entry point.
    /// Returns false when the ray misses the grid.
    pub fn find_box_intersection(&self, ray: &mut Ray) -> bool {
        if self.bounds.contains(ray.origin()) {
            return true;
        }
        match self
            .bounds
            .clip(ray.origin(), ray.direction(), Interval::new(0.0, f64::INFINITY))
        {
            Some((t_enter, _)) => {
                let entry = ray.at((t_enter - RETRACT).max(0.0));
                ray.set_origin(entry);
                true
            }
            None => false,
        }
    }
}
