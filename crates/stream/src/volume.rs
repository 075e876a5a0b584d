use glam::IVec3;
use std::iter::FusedIterator;
use viewsync_common::DistanceMetric;

/// Lazily enumerate every cell within `radius` of `center` under `metric`.
///
/// Cells come out in concentric Chebyshev shells, nearest first, and in
/// lexicographic `(x, y, z)` order inside each shell. Calling this again with
/// the same arguments yields the same sequence.
pub fn viewable(center: IVec3, radius: u32, metric: DistanceMetric) -> ViewableVolume {
    ViewableVolume {
        center,
        radius: radius.min(i32::MAX as u32) as i32,
        metric,
        shell: 0,
        cursor: IVec3::ZERO,
    }
}

/// Membership test matching [`viewable`].
pub fn in_view_volume(cell: IVec3, center: IVec3, radius: u32, metric: DistanceMetric) -> bool {
    metric.within(center, cell, radius)
}

/// Iterator returned by [`viewable`].
#[derive(Debug, Clone)]
pub struct ViewableVolume {
    center: IVec3,
    radius: i32,
    metric: DistanceMetric,
    shell: i32,
    /// Offset from the center of the next candidate in the current shell.
    cursor: IVec3,
}

impl ViewableVolume {
    /// Move the cursor to the next offset on the surface of the current shell,
    /// or to the first offset of the next shell.
    fn advance(&mut self) {
        let r = self.shell;
        let c = &mut self.cursor;
        if r == 0 {
            self.shell = 1;
            *c = IVec3::splat(-1);
            return;
        }
        // Rows that cross the shell's interior only touch its two z faces.
        let interior_row = c.x.abs() < r && c.y.abs() < r;
        if interior_row {
            if c.z == -r {
                c.z = r;
                return;
            }
        } else if c.z < r {
            c.z += 1;
            return;
        }
        if c.y < r {
            c.y += 1;
            c.z = -r;
            return;
        }
        if c.x < r {
            c.x += 1;
            c.y = -r;
            c.z = -r;
            return;
        }
        self.shell += 1;
        *c = IVec3::splat(-self.shell);
    }
}

impl Iterator for ViewableVolume {
    type Item = IVec3;

    fn next(&mut self) -> Option<IVec3> {
        while self.shell <= self.radius {
            let offset = self.cursor;
            self.advance();
            if self
                .metric
                .within(IVec3::ZERO, offset, self.radius as u32)
            {
                return Some(self.center + offset);
            }
        }
        None
    }
}

impl FusedIterator for ViewableVolume {}
