//! Incremental Bowyer-Watson Delaunay triangulation.
//!
//! Points are inserted one at a time into a super-triangle that encloses the
//! whole sample cloud; triangles whose circumcircle contains the new point
//! are removed and the resulting cavity is re-triangulated against the new
//! vertex. Circumcircles are computed once per triangle and cached, and
//! live triangles are indexed by circumcircle bounding box so an insertion
//! only tests the triangles whose circumcircle can reach the new point.

use std::collections::HashMap;

/// A 2D sample vertex (x = longitude, y = latitude).
#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

impl Vertex {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Circumcircle of a triangle, kept as center + squared radius.
#[derive(Debug, Clone, Copy)]
struct Circumcircle {
    cx: f64,
    cy: f64,
    radius_sq: f64,
}

impl Circumcircle {
    fn of(a: &Vertex, b: &Vertex, c: &Vertex) -> Option<Self> {
        let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
        if d.abs() < 1e-12 {
            return None; // collinear
        }

        let a_sq = a.x * a.x + a.y * a.y;
        let b_sq = b.x * b.x + b.y * b.y;
        let c_sq = c.x * c.x + c.y * c.y;

        let cx = (a_sq * (b.y - c.y) + b_sq * (c.y - a.y) + c_sq * (a.y - b.y)) / d;
        let cy = (a_sq * (c.x - b.x) + b_sq * (a.x - c.x) + c_sq * (b.x - a.x)) / d;

        let dx = a.x - cx;
        let dy = a.y - cy;
        Some(Self {
            cx,
            cy,
            radius_sq: dx * dx + dy * dy,
        })
    }

    fn contains(&self, p: &Vertex) -> bool {
        let dx = p.x - self.cx;
        let dy = p.y - self.cy;
        dx * dx + dy * dy <= self.radius_sq
    }
}

/// A triangle as three vertex indices plus its cached circumcircle.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub a: usize,
    pub b: usize,
    pub c: usize,
    circum: Circumcircle,
}

/// Result of triangulating a point cloud.
pub struct Triangulation {
    pub triangles: Vec<Triangle>,
}

/// Barycentric coordinates of `(px, py)` in the triangle `(a, b, c)`.
///
/// The interpolated value at the point is `u*f(a) + v*f(b) + w*f(c)`; the
/// point is inside (or on the boundary of) the triangle when all three are
/// non-negative up to a small tolerance.
pub fn barycentric(
    px: f64,
    py: f64,
    a: &Vertex,
    b: &Vertex,
    c: &Vertex,
) -> Option<(f64, f64, f64)> {
    let v0x = b.x - a.x;
    let v0y = b.y - a.y;
    let v1x = c.x - a.x;
    let v1y = c.y - a.y;
    let v2x = px - a.x;
    let v2y = py - a.y;

    let dot00 = v0x * v0x + v0y * v0y;
    let dot01 = v0x * v1x + v0y * v1y;
    let dot02 = v0x * v2x + v0y * v2y;
    let dot11 = v1x * v1x + v1y * v1y;
    let dot12 = v1x * v2x + v1y * v2y;

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() < 1e-24 {
        return None;
    }

    let inv = 1.0 / denom;
    let v = (dot11 * dot02 - dot01 * dot12) * inv;
    let w = (dot00 * dot12 - dot01 * dot02) * inv;
    Some((1.0 - v - w, v, w))
}

/// Triangulate a point cloud. Returns no triangles for fewer than 3 points
/// or a fully collinear cloud.
pub fn triangulate(points: &[Vertex]) -> Triangulation {
    if points.len() < 3 {
        return Triangulation {
            triangles: Vec::new(),
        };
    }

    let mut min_x = f64::MAX;
    let mut min_y = f64::MAX;
    let mut max_x = f64::MIN;
    let mut max_y = f64::MIN;
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let dx = max_x - min_x;
    let dy = max_y - min_y;
    let delta = dx.max(dy).max(1.0);

    // Super-triangle far outside the cloud; its vertices occupy indices
    // 0..3 and are stripped at the end.
    let mut vertices: Vec<Vertex> = vec![
        Vertex::new(min_x - 10.0 * delta, min_y - delta),
        Vertex::new(min_x + 0.5 * dx, max_y + 10.0 * delta),
        Vertex::new(max_x + 10.0 * delta, min_y - delta),
    ];
    vertices.extend_from_slice(points);

    let super_circum = match Circumcircle::of(&vertices[0], &vertices[1], &vertices[2]) {
        Some(c) => c,
        None => {
            return Triangulation {
                triangles: Vec::new(),
            }
        }
    };

    // Any point inside a triangle is inside its circumcircle, and the
    // circumcircle bbox is always inside the index domain after clamping,
    // so every invalidated triangle is reachable from the point's bucket.
    let mut index = InsertionIndex::new(min_x, min_y, max_x, max_y, points.len());
    let mut triangles: Vec<Triangle> = Vec::with_capacity(points.len() * 2);
    let mut alive: Vec<bool> = Vec::with_capacity(points.len() * 2);

    triangles.push(Triangle {
        a: 0,
        b: 1,
        c: 2,
        circum: super_circum,
    });
    alive.push(true);
    index.insert(0, &super_circum);

    for vi in 3..vertices.len() {
        let point = vertices[vi];

        // Triangles invalidated by the new point. Dead entries linger in
        // the buckets and are skipped here.
        let mut bad: Vec<usize> = Vec::new();
        for &ti in index.candidates(&point) {
            if alive[ti] && triangles[ti].circum.contains(&point) {
                bad.push(ti);
            }
        }

        // Cavity boundary: edges owned by exactly one bad triangle.
        let mut edges: HashMap<(usize, usize), ((usize, usize), u32)> = HashMap::new();
        for &bi in &bad {
            let tri = triangles[bi];
            for (ea, eb) in [(tri.a, tri.b), (tri.b, tri.c), (tri.c, tri.a)] {
                let key = if ea < eb { (ea, eb) } else { (eb, ea) };
                edges
                    .entry(key)
                    .and_modify(|e| e.1 += 1)
                    .or_insert(((ea, eb), 1));
            }
            alive[bi] = false;
        }

        for ((ea, eb), count) in edges.into_values() {
            if count != 1 {
                continue;
            }
            if let Some(circum) = Circumcircle::of(&vertices[ea], &vertices[eb], &vertices[vi]) {
                let ti = triangles.len();
                triangles.push(Triangle {
                    a: ea,
                    b: eb,
                    c: vi,
                    circum,
                });
                alive.push(true);
                index.insert(ti, &circum);
            }
        }
    }

    // Drop dead triangles and those touching the super-triangle, remap to
    // input indices.
    let mut result: Vec<Triangle> = triangles
        .into_iter()
        .zip(alive)
        .filter(|(t, live)| *live && t.a >= 3 && t.b >= 3 && t.c >= 3)
        .map(|(t, _)| t)
        .collect();
    for tri in &mut result {
        tri.a -= 3;
        tri.b -= 3;
        tri.c -= 3;
    }

    Triangulation { triangles: result }
}

/// Uniform-bucket index over live triangles keyed by circumcircle bounding
/// box, used during insertion. Bucket ranges are clamped to the sample
/// cloud's bounds, so the huge early circumcircles cost one pass over the
/// buckets rather than a bigger grid.
struct InsertionIndex {
    min_x: f64,
    min_y: f64,
    inv_cell_x: f64,
    inv_cell_y: f64,
    nx: usize,
    ny: usize,
    buckets: Vec<Vec<usize>>,
}

impl InsertionIndex {
    fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64, n_points: usize) -> Self {
        let side = ((n_points as f64).sqrt().ceil() as usize).max(1);
        let span_x = (max_x - min_x).max(1e-12);
        let span_y = (max_y - min_y).max(1e-12);
        Self {
            min_x,
            min_y,
            inv_cell_x: side as f64 / span_x,
            inv_cell_y: side as f64 / span_y,
            nx: side,
            ny: side,
            buckets: vec![Vec::new(); side * side],
        }
    }

    fn insert(&mut self, ti: usize, circum: &Circumcircle) {
        let r = circum.radius_sq.sqrt();
        let bx0 = self.clamp_x(circum.cx - r);
        let bx1 = self.clamp_x(circum.cx + r);
        let by0 = self.clamp_y(circum.cy - r);
        let by1 = self.clamp_y(circum.cy + r);
        for by in by0..=by1 {
            for bx in bx0..=bx1 {
                self.buckets[by * self.nx + bx].push(ti);
            }
        }
    }

    fn candidates(&self, p: &Vertex) -> &[usize] {
        let bx = self.clamp_x(p.x);
        let by = self.clamp_y(p.y);
        &self.buckets[by * self.nx + bx]
    }

    fn clamp_x(&self, x: f64) -> usize {
        (((x - self.min_x) * self.inv_cell_x) as isize).clamp(0, self.nx as isize - 1) as usize
    }

    fn clamp_y(&self, y: f64) -> usize {
        (((y - self.min_y) * self.inv_cell_y) as isize).clamp(0, self.ny as isize - 1) as usize
    }
}

/// Uniform-bucket spatial index over triangles, for fast point location.
pub struct TriangleIndex {
    min_x: f64,
    min_y: f64,
    inv_cell_x: f64,
    inv_cell_y: f64,
    nx: usize,
    ny: usize,
    buckets: Vec<Vec<usize>>,
}

impl TriangleIndex {
    pub fn build(points: &[Vertex], triangulation: &Triangulation) -> Self {
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        let n_tris = triangulation.triangles.len().max(1);
        let side = (n_tris as f64).sqrt().ceil() as usize;
        let nx = side.max(1);
        let ny = side.max(1);

        let span_x = (max_x - min_x).max(1e-12);
        let span_y = (max_y - min_y).max(1e-12);
        let inv_cell_x = nx as f64 / span_x;
        let inv_cell_y = ny as f64 / span_y;

        let mut buckets = vec![Vec::new(); nx * ny];
        for (ti, tri) in triangulation.triangles.iter().enumerate() {
            let xs = [points[tri.a].x, points[tri.b].x, points[tri.c].x];
            let ys = [points[tri.a].y, points[tri.b].y, points[tri.c].y];
            let t_min_x = xs.iter().cloned().fold(f64::MAX, f64::min);
            let t_max_x = xs.iter().cloned().fold(f64::MIN, f64::max);
            let t_min_y = ys.iter().cloned().fold(f64::MAX, f64::min);
            let t_max_y = ys.iter().cloned().fold(f64::MIN, f64::max);

            let bx0 = (((t_min_x - min_x) * inv_cell_x) as isize).clamp(0, nx as isize - 1) as usize;
            let bx1 = (((t_max_x - min_x) * inv_cell_x) as isize).clamp(0, nx as isize - 1) as usize;
            let by0 = (((t_min_y - min_y) * inv_cell_y) as isize).clamp(0, ny as isize - 1) as usize;
            let by1 = (((t_max_y - min_y) * inv_cell_y) as isize).clamp(0, ny as isize - 1) as usize;

            for by in by0..=by1 {
                for bx in bx0..=bx1 {
                    buckets[by * nx + bx].push(ti);
                }
            }
        }

        Self {
            min_x,
            min_y,
            inv_cell_x,
            inv_cell_y,
            nx,
            ny,
            buckets,
        }
    }

    /// Candidate triangles whose bounding box covers the query point's bucket.
    pub fn candidates(&self, x: f64, y: f64) -> &[usize] {
        let bx = (((x - self.min_x) * self.inv_cell_x) as isize).clamp(0, self.nx as isize - 1);
        let by = (((y - self.min_y) * self.inv_cell_y) as isize).clamp(0, self.ny as isize - 1);
        &self.buckets[by as usize * self.nx + bx as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Vec<Vertex> {
        vec![
            Vertex::new(0.0, 0.0),
            Vertex::new(1.0, 0.0),
            Vertex::new(0.0, 1.0),
            Vertex::new(1.0, 1.0),
        ]
    }

    #[test]
    fn test_four_points_two_triangles() {
        let t = triangulate(&unit_square());
        assert_eq!(t.triangles.len(), 2);
    }

    #[test]
    fn test_collinear_points_yield_nothing() {
        let points = vec![
            Vertex::new(0.0, 0.0),
            Vertex::new(1.0, 1.0),
            Vertex::new(2.0, 2.0),
        ];
        let t = triangulate(&points);
        assert!(t.triangles.is_empty());
    }

    #[test]
    fn test_barycentric_vertices_and_centroid() {
        let a = Vertex::new(0.0, 0.0);
        let b = Vertex::new(10.0, 0.0);
        let c = Vertex::new(0.0, 10.0);

        let (u, v, w) = barycentric(0.0, 0.0, &a, &b, &c).unwrap();
        assert!((u - 1.0).abs() < 1e-10 && v.abs() < 1e-10 && w.abs() < 1e-10);

        let (u, v, w) = barycentric(10.0 / 3.0, 10.0 / 3.0, &a, &b, &c).unwrap();
        assert!((u - 1.0 / 3.0).abs() < 1e-10);
        assert!((v - 1.0 / 3.0).abs() < 1e-10);
        assert!((w - 1.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_index_finds_containing_triangle() {
        let points = unit_square();
        let t = triangulate(&points);
        let index = TriangleIndex::build(&points, &t);

        let candidates = index.candidates(0.25, 0.25);
        let found = candidates.iter().any(|&ti| {
            let tri = t.triangles[ti];
            barycentric(0.25, 0.25, &points[tri.a], &points[tri.b], &points[tri.c])
                .map(|(u, v, w)| u >= -1e-10 && v >= -1e-10 && w >= -1e-10)
                .unwrap_or(false)
        });
        assert!(found);
    }

    #[test]
    fn test_larger_cloud_covers_hull() {
        // 5x5 lattice: every interior point must fall inside some triangle.
        let mut points = Vec::new();
        for i in 0..5 {
            for j in 0..5 {
                points.push(Vertex::new(i as f64, j as f64));
            }
        }
        let t = triangulate(&points);
        assert!(!t.triangles.is_empty());
        let index = TriangleIndex::build(&points, &t);

        let probe = (1.3, 2.7);
        let hit = index.candidates(probe.0, probe.1).iter().any(|&ti| {
            let tri = t.triangles[ti];
            barycentric(probe.0, probe.1, &points[tri.a], &points[tri.b], &points[tri.c])
                .map(|(u, v, w)| u >= -1e-10 && v >= -1e-10 && w >= -1e-10)
                .unwrap_or(false)
        });
        assert!(hit);
    }

    #[test]
    fn test_dense_jittered_cloud_covers_hull() {
        // 40x40 jittered lattice. The triangle count must come out near 2n
        // and interior probes must all land in a containing triangle.
        let mut points = Vec::new();
        for i in 0..40 {
            for j in 0..40 {
                let jx = ((i * 7 + j * 13) % 10) as f64 * 0.02;
                let jy = ((i * 3 + j * 5) % 10) as f64 * 0.02;
                points.push(Vertex::new(i as f64 + jx, j as f64 + jy));
            }
        }

        let t = triangulate(&points);
        assert!(t.triangles.len() > 2 * points.len() - 200);
        assert!(t.triangles.len() < 2 * points.len());

        let index = TriangleIndex::build(&points, &t);
        for &(px, py) in &[(5.3, 7.7), (20.1, 20.9), (33.6, 2.4), (1.1, 38.2)] {
            let hit = index.candidates(px, py).iter().any(|&ti| {
                let tri = t.triangles[ti];
                barycentric(px, py, &points[tri.a], &points[tri.b], &points[tri.c])
                    .map(|(u, v, w)| u >= -1e-10 && v >= -1e-10 && w >= -1e-10)
                    .unwrap_or(false)
            });
            assert!(hit, "({}, {}) not covered", px, py);
        }
    }
}
