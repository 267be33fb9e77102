//! Regular lattice geometry with a one-cell ghost frame.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Grid extents and the coordinate-to-index mapping.
///
/// Cells are addressed row-major with x fastest:
/// `index = x + y * size_x + z * size_x * size_y`. A 2-D geometry is a 3-D
/// one with `size_z == 1`; the z axis then carries no ghost frame.
///
/// The outermost cell layer on every face is reserved as ghost padding, so
/// every extent must be at least 3. Geometry is immutable after
/// construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    size_x: usize,
    size_y: usize,
    size_z: usize,
}

impl Geometry {
    /// Create a 2-D geometry. Fails if either extent is below 3.
    pub fn new_2d(size_x: usize, size_y: usize) -> Result<Self> {
        check_extent('x', size_x)?;
        check_extent('y', size_y)?;
        Ok(Self { size_x, size_y, size_z: 1 })
    }

    /// Create a 3-D geometry. Fails if any extent is below 3.
    pub fn new_3d(size_x: usize, size_y: usize, size_z: usize) -> Result<Self> {
        check_extent('x', size_x)?;
        check_extent('y', size_y)?;
        check_extent('z', size_z)?;
        Ok(Self { size_x, size_y, size_z })
    }

    pub fn size_x(&self) -> usize {
        self.size_x
    }

    pub fn size_y(&self) -> usize {
        self.size_y
    }

    pub fn size_z(&self) -> usize {
        self.size_z
    }

    pub fn is_3d(&self) -> bool {
        self.size_z > 1
    }

    /// Total cell count including the ghost frame.
    pub fn volume(&self) -> usize {
        self.size_x * self.size_y * self.size_z
    }

    /// Cell count of the interior, excluding the ghost frame.
    pub fn inner_volume(&self) -> usize {
        let z = if self.is_3d() { self.size_z - 2 } else { 1 };
        (self.size_x - 2) * (self.size_y - 2) * z
    }

    /// Linear cell index for a coordinate tuple. Pass `z = 0` in 2-D.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < self.size_x && y < self.size_y && z < self.size_z);
        x + y * self.size_x + z * self.size_x * self.size_y
    }

    /// Inclusive interior coordinate range along one axis.
    pub fn inner_range(&self, axis: usize) -> (usize, usize) {
        let size = [self.size_x, self.size_y, self.size_z][axis];
        if size == 1 {
            (0, 0)
        } else {
            (1, size - 2)
        }
    }

    /// Whether a coordinate tuple lies strictly inside the ghost frame.
    pub fn is_inner(&self, x: usize, y: usize, z: usize) -> bool {
        let in_axis = |c: usize, size: usize| size == 1 || (c >= 1 && c <= size - 2);
        in_axis(x, self.size_x) && in_axis(y, self.size_y) && in_axis(z, self.size_z)
    }

    /// Lazily enumerate interior cells as `(x, y, z)`, x fastest.
    ///
    /// Each call returns a fresh iterator, so enumeration is restartable.
    pub fn inner_cells(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        let (x0, x1) = self.inner_range(0);
        let (y0, y1) = self.inner_range(1);
        let (z0, z1) = self.inner_range(2);
        (z0..=z1).flat_map(move |z| {
            (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| (x, y, z)))
        })
    }
}

fn check_extent(axis: char, extent: usize) -> Result<()> {
    if extent < 3 {
        return Err(Error::InvalidGeometry { axis, extent });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_extents() {
        assert!(matches!(
            Geometry::new_2d(2, 10),
            Err(Error::InvalidGeometry { axis: 'x', extent: 2 })
        ));
        assert!(matches!(
            Geometry::new_3d(10, 10, 1),
            Err(Error::InvalidGeometry { axis: 'z', extent: 1 })
        ));
    }

    #[test]
    fn index_is_row_major_bijection() {
        let g = Geometry::new_3d(4, 5, 3).unwrap();
        let mut seen = vec![false; g.volume()];
        for z in 0..3 {
            for y in 0..5 {
                for x in 0..4 {
                    let i = g.index(x, y, z);
                    assert!(!seen[i], "index {} hit twice", i);
                    seen[i] = true;
                }
            }
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(g.index(1, 0, 0), 1);
        assert_eq!(g.index(0, 1, 0), 4);
        assert_eq!(g.index(0, 0, 1), 20);
    }

    #[test]
    fn inner_cells_exclude_ghost_frame() {
        let g = Geometry::new_2d(5, 4).unwrap();
        let cells: Vec<_> = g.inner_cells().collect();
        assert_eq!(cells.len(), g.inner_volume());
        assert_eq!(cells.len(), 3 * 2);
        assert!(cells.iter().all(|&(x, y, z)| {
            x >= 1 && x <= 3 && y >= 1 && y <= 2 && z == 0
        }));
        // Restartable: a second pass yields the same sequence.
        assert_eq!(g.inner_cells().collect::<Vec<_>>(), cells);
    }

    #[test]
    fn inner_range_degenerates_in_2d() {
        let g = Geometry::new_2d(8, 8).unwrap();
        assert_eq!(g.inner_range(2), (0, 0));
        assert_eq!(g.inner_range(0), (1, 6));
    }

    #[test]
    fn inner_volume_3d() {
        let g = Geometry::new_3d(6, 5, 4).unwrap();
        assert_eq!(g.inner_volume(), 4 * 3 * 2);
        assert_eq!(g.inner_cells().count(), g.inner_volume());
    }
}
