//! Batched point generation: the hot loop.
//!
//! A group is GRP_SIZE consecutive scalars centered on k_base + GRP_SIZE/2.
//! The center point is known; every other point is one affine addition of a
//! precomputed multiple of G, and all GRP_SIZE/2 + 1 slope denominators are
//! inverted together in a single grouped inverse. P + i·G and P - i·G share
//! the same delta-x, so one inverse serves both sides.

use once_cell::sync::Lazy;

use crate::error::Result;
use crate::secp::{batch_inverse, FieldElement, Point, G};

/// Scalars per group. GRP_SIZE/2 + 1 deltas fit one grouped inverse.
pub const GRP_SIZE: usize = 1024;
pub const HALF_GRP: usize = GRP_SIZE / 2;

/// Scalars swept per cursor update; the CPU cursor advances every group.
pub const STEP_SIZE: usize = GRP_SIZE;

/// Immutable multiples of G shared read-only by every worker:
/// `gn[i] = (i+1)·G` for i < GRP_SIZE/2, plus the group-step point
/// GRP_SIZE·G for the next-center transition. Built once at startup.
pub struct GroupTable {
    gn: Vec<Point>,
    step: Point,
}

impl GroupTable {
    fn build() -> Self {
        let mut gn = Vec::with_capacity(HALF_GRP);
        let mut p = G;
        for _ in 0..HALF_GRP {
            gn.push(p);
            p = p.next();
        }
        // gn ends at (GRP_SIZE/2)·G; doubling it gives the step point
        let step = gn[HALF_GRP - 1].double();
        Self { gn, step }
    }
}

static GROUP_TABLE: Lazy<GroupTable> = Lazy::new(GroupTable::build);

/// Stateless over the shared table; per-worker buffers are passed in so a
/// worker never allocates inside its loop.
pub struct GroupEngine {
    table: &'static GroupTable,
}

impl Default for GroupEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupEngine {
    pub fn new() -> Self {
        Self {
            table: &GROUP_TABLE,
        }
    }

    /// Compute the group around `start_p` (the center, at k_base + HALF_GRP).
    ///
    /// On return `pts[t]` holds (k_base + t)·G for t in [0, GRP_SIZE); the
    /// returned point is the next group's center (k_base + 3·GRP_SIZE/2)·G.
    /// `dx`/`dx_inv` must hold HALF_GRP + 1 elements. A degenerate delta
    /// aborts the whole group; the caller nudges its cursor and retries.
    pub fn fill_group(
        &self,
        start_p: &Point,
        pts: &mut [Point],
        dx: &mut [FieldElement],
        dx_inv: &mut [FieldElement],
    ) -> Result<Point> {
        debug_assert_eq!(pts.len(), GRP_SIZE);
        debug_assert_eq!(dx.len(), HALF_GRP + 1);
        debug_assert_eq!(dx_inv.len(), HALF_GRP + 1);

        let table = self.table;
        let h = HALF_GRP - 1;

        for i in 0..=h {
            dx[i] = table.gn[i].x.sub(&start_p.x);
        }
        dx[h + 1] = table.step.x.sub(&start_p.x);

        batch_inverse(dx, dx_inv)?;

        pts[HALF_GRP] = *start_p;

        // Symmetric expansion: one shared inverse per ± pair.
        for i in 0..h {
            let g = &table.gn[i];

            // P = startP + (i+1)·G
            let s = g.y.sub(&start_p.y).mul(&dx_inv[i]);
            let x = s.sqr().sub(&start_p.x).sub(&g.x);
            let y = s.mul(&g.x.sub(&x)).sub(&g.y);
            pts[HALF_GRP + i + 1] = Point::new(x, y);

            // P = startP - (i+1)·G; the second point is (g.x, -g.y)
            let s = g.y.neg().sub(&start_p.y).mul(&dx_inv[i]);
            let x = s.sqr().sub(&start_p.x).sub(&g.x);
            let y = s.mul(&g.x.sub(&x)).add(&g.y);
            pts[HALF_GRP - (i + 1)] = Point::new(x, y);
        }

        // First point of the group: startP - (GRP_SIZE/2)·G
        let g = &table.gn[h];
        let s = g.y.neg().sub(&start_p.y).mul(&dx_inv[h]);
        let x = s.sqr().sub(&start_p.x).sub(&g.x);
        let y = s.mul(&g.x.sub(&x)).add(&g.y);
        pts[0] = Point::new(x, y);

        // Next center: startP + GRP_SIZE·G
        let g = &table.step;
        let s = g.y.sub(&start_p.y).mul(&dx_inv[h + 1]);
        let x = s.sqr().sub(&start_p.x).sub(&g.x);
        let y = s.mul(&g.x.sub(&x)).sub(&g.y);
        Ok(Point::new(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secp::{public_key, Scalar};

    #[test]
    fn table_holds_true_multiples() {
        let table = GroupTable::build();
        assert_eq!(table.gn[0], G);
        assert_eq!(table.gn[4], public_key(&Scalar::from_u64(5)));
        assert_eq!(
            table.gn[HALF_GRP - 1],
            public_key(&Scalar::from_u64(HALF_GRP as u64))
        );
        assert_eq!(table.step, public_key(&Scalar::from_u64(GRP_SIZE as u64)));
    }

    #[test]
    fn group_points_match_scalar_multiplication() {
        let engine = GroupEngine::new();
        let base = Scalar::from_u64(1_000_000);
        let center = base.add_u64(HALF_GRP as u64);
        let start_p = public_key(&center);

        let mut pts = vec![Point::INFINITY; GRP_SIZE];
        let mut dx = vec![FieldElement::ZERO; HALF_GRP + 1];
        let mut dx_inv = vec![FieldElement::ZERO; HALF_GRP + 1];

        let next = engine
            .fill_group(&start_p, &mut pts, &mut dx, &mut dx_inv)
            .unwrap();

        // spot-check across the whole range, including both edges
        for t in [0usize, 1, 13, HALF_GRP - 1, HALF_GRP, HALF_GRP + 1, GRP_SIZE - 1] {
            let expect = public_key(&base.add_u64(t as u64));
            assert_eq!(pts[t], expect, "offset {t}");
        }

        // next center belongs to the following group
        let next_center = base.add_u64((GRP_SIZE + HALF_GRP) as u64);
        assert_eq!(next, public_key(&next_center));
    }

    #[test]
    fn consecutive_groups_chain() {
        let engine = GroupEngine::new();
        let base = Scalar::from_u64(424242);
        let mut start_p = public_key(&base.add_u64(HALF_GRP as u64));

        let mut pts = vec![Point::INFINITY; GRP_SIZE];
        let mut dx = vec![FieldElement::ZERO; HALF_GRP + 1];
        let mut dx_inv = vec![FieldElement::ZERO; HALF_GRP + 1];

        for j in 0..3u64 {
            let next = engine
                .fill_group(&start_p, &mut pts, &mut dx, &mut dx_inv)
                .unwrap();
            let first = base.add_u64(j * GRP_SIZE as u64);
            assert_eq!(pts[0], public_key(&first), "group {j} first point");
            start_p = next;
        }
    }
}
