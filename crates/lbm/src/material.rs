//! Cell material classification.
//!
//! Every cell carries a small integer tag that selects its role inside the
//! compute kernel: `0` is inactive ghost padding, `1` is bulk fluid, and
//! tags `>= 2` are boundary classes whose physical meaning is defined by
//! the caller's boundary fragment (e.g. `2` no-slip wall, `3` velocity
//! inflow, `4` density outflow).

use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;
use crate::{Error, Result};

/// Inactive padding cell, never updated by the kernel.
pub const GHOST: u32 = 0;
/// Bulk fluid cell, full collide-and-stream without boundary correction.
pub const BULK: u32 = 1;

/// Coordinate predicate over the grid.
///
/// The predicate shapes are the ones material maps actually consist of:
/// the strict interior, single grid lines/planes, axis-aligned boxes,
/// discs and balls for obstacles, and the outer ghost frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Region {
    /// All cells strictly inside the ghost frame.
    Interior,
    /// The one-cell outer frame on every face.
    Frame,
    /// All cells with `x == plane`.
    PlaneX(usize),
    /// All cells with `y == plane`.
    PlaneY(usize),
    /// All cells with `z == plane`.
    PlaneZ(usize),
    /// Axis-aligned box with inclusive bounds. Use `min[2] == max[2] == 0` in 2-D.
    Box { min: [usize; 3], max: [usize; 3] },
    /// Disc in the xy plane: `(x - cx)^2 + (y - cy)^2 < r^2`.
    Circle { cx: i64, cy: i64, r: i64 },
    /// Ball: `(x - cx)^2 + (y - cy)^2 + (z - cz)^2 < r^2`.
    Sphere { cx: i64, cy: i64, cz: i64, r: i64 },
}

impl Region {
    /// Whether the cell at `(x, y, z)` lies in this region.
    pub fn contains(&self, geometry: &Geometry, x: usize, y: usize, z: usize) -> bool {
        match *self {
            Region::Interior => geometry.is_inner(x, y, z),
            Region::Frame => !geometry.is_inner(x, y, z),
            Region::PlaneX(plane) => x == plane,
            Region::PlaneY(plane) => y == plane,
            Region::PlaneZ(plane) => z == plane,
            Region::Box { min, max } => {
                x >= min[0] && x <= max[0]
                    && y >= min[1] && y <= max[1]
                    && z >= min[2] && z <= max[2]
            }
            Region::Circle { cx, cy, r } => {
                let dx = x as i64 - cx;
                let dy = y as i64 - cy;
                dx * dx + dy * dy < r * r
            }
            Region::Sphere { cx, cy, cz, r } => {
                let dx = x as i64 - cx;
                let dy = y as i64 - cy;
                let dz = z as i64 - cz;
                dx * dx + dy * dy + dz * dz < r * r
            }
        }
    }
}

/// One classification rule: cells matching `region` receive `tag`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialRule {
    pub region: Region,
    pub tag: u32,
}

/// Per-cell material tags for a whole grid.
///
/// Tags start out all-ghost and are assigned by ordered rule application;
/// the resulting array is uploaded to the device once per topology change
/// and treated read-only during stepping.
#[derive(Clone, Debug)]
pub struct MaterialMap {
    geometry: Geometry,
    tags: Vec<u32>,
}

impl MaterialMap {
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            geometry: *geometry,
            tags: vec![GHOST; geometry.volume()],
        }
    }

    /// Classify every cell against an ordered rule list.
    ///
    /// Rules are evaluated in order and the **first** matching rule wins;
    /// overlapping regions are resolved purely by list position, so carved
    /// obstacles must precede the regions they are carved out of. Cells no
    /// rule matches keep their previous tag.
    pub fn apply(&mut self, rules: &[MaterialRule]) -> Result<()> {
        if rules.is_empty() {
            return Err(Error::EmptyMaterialMap);
        }
        let g = self.geometry;
        for z in 0..g.size_z() {
            for y in 0..g.size_y() {
                for x in 0..g.size_x() {
                    for rule in rules {
                        if rule.region.contains(&g, x, y, z) {
                            self.tags[g.index(x, y, z)] = rule.tag;
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    #[inline]
    pub fn tag(&self, x: usize, y: usize, z: usize) -> u32 {
        self.tags[self.geometry.index(x, y, z)]
    }

    pub fn tags(&self) -> &[u32] {
        &self.tags
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Whether any cell carries the given tag.
    pub fn contains_tag(&self, tag: u32) -> bool {
        self.tags.iter().any(|&t| t == tag)
    }
}
