//! Tetrahedron geometry: plane equations, volumes and the affine reference map.
//!
//! The reference tetrahedron has vertices `[v0, v1, v2, v3]` mapped to
//! `(0,0,0)`, `(1,0,0)`, `(0,1,0)` and `(0,0,1)`.

use crate::source_error::SourceError;

const EPS: f64 = 1e-12;

/// Local vertex indices of each tetrahedron face.
pub const TET_FACES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [1, 2, 3], [0, 2, 3]];

/// Local vertex opposite to each face of [`TET_FACES`].
pub const TET_FACE_OPPOSITE: [usize; 4] = [3, 2, 0, 1];

/// Plane `n·x + d = 0` stored as `[nx, ny, nz, d]`.
pub type Plane = [f64; 4];

/// Evaluate a plane at a point.
#[inline]
pub fn eval_plane(plane: &Plane, x: [f64; 3]) -> f64 {
    plane[0] * x[0] + plane[1] * x[1] + plane[2] * x[2] + plane[3]
}

/// Plane through `p` with normal `n`: `d = -n·p`.
#[inline]
pub fn plane_from_normal(n: [f64; 3], p: [f64; 3]) -> Plane {
    [n[0], n[1], n[2], -dot(n, p)]
}

/// Negate a plane exactly (flips the half-space).
#[inline]
pub fn flip_plane(plane: Plane) -> Plane {
    [-plane[0], -plane[1], -plane[2], -plane[3]]
}

/// `true` if the first non-zero component of `n` is negative.
pub fn is_lex_negative(n: [f64; 3]) -> bool {
    n.iter()
        .find(|c| **c != 0.0)
        .is_some_and(|c| *c < 0.0)
}

/// Normal `(b - a) × (c - a)` of the triangle `(a, b, c)`, length twice its area.
///
/// Not normalised: for vertices on a coarse lattice every component is exact.
pub fn area_normal(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> Result<[f64; 3], SourceError> {
    let (ab, ac) = (sub(b, a), sub(c, a));
    let n = cross(ab, ac);
    if norm(n) <= EPS * norm(ab) * norm(ac) {
        return Err(SourceError::InvalidGeometry("degenerate face normal".into()));
    }
    Ok(n)
}

/// Six times the signed volume of `(a, b, c, d)`.
pub fn signed_volume6(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> f64 {
    dot(sub(b, a), cross(sub(c, a), sub(d, a)))
}

/// Volume of the tetrahedron.
pub fn volume(v: &[[f64; 3]; 4]) -> f64 {
    signed_volume6(v[0], v[1], v[2], v[3]).abs() / 6.0
}

/// Arithmetic mean of the four vertices.
pub fn centroid(v: &[[f64; 3]; 4]) -> [f64; 3] {
    let mut c = [0.0; 3];
    for p in v {
        c[0] += p[0];
        c[1] += p[1];
        c[2] += p[2];
    }
    [c[0] / 4.0, c[1] / 4.0, c[2] / 4.0]
}

/// Row-major Jacobian of the reference map, columns `v1-v0`, `v2-v0`, `v3-v0`.
pub fn jacobian(v: &[[f64; 3]; 4]) -> [f64; 9] {
    let e1 = sub(v[1], v[0]);
    let e2 = sub(v[2], v[0]);
    let e3 = sub(v[3], v[0]);
    [
        e1[0], e2[0], e3[0], //
        e1[1], e2[1], e3[1], //
        e1[2], e2[2], e3[2],
    ]
}

/// Map a physical point to reference coordinates `(xi, eta, zeta)`.
pub fn physical_to_reference(v: &[[f64; 3]; 4], x: [f64; 3]) -> Result<[f64; 3], SourceError> {
    let inv = invert_3x3(jacobian(v))?;
    let r = sub(x, v[0]);
    Ok([
        inv[0] * r[0] + inv[1] * r[1] + inv[2] * r[2],
        inv[3] * r[0] + inv[4] * r[1] + inv[5] * r[2],
        inv[6] * r[0] + inv[7] * r[1] + inv[8] * r[2],
    ])
}

pub fn determinant_3x3(m: [f64; 9]) -> f64 {
    m[0] * (m[4] * m[8] - m[5] * m[7]) - m[1] * (m[3] * m[8] - m[5] * m[6])
        + m[2] * (m[3] * m[7] - m[4] * m[6])
}

fn invert_3x3(mat: [f64; 9]) -> Result<[f64; 9], SourceError> {
    let det = determinant_3x3(mat);
    let scale = norm([mat[0], mat[1], mat[2]]) * norm([mat[3], mat[4], mat[5]])
        * norm([mat[6], mat[7], mat[8]]);
    if det.abs() <= EPS * scale {
        return Err(SourceError::InvalidGeometry("degenerate jacobian".into()));
    }
    let inv_det = 1.0 / det;
    Ok([
        (mat[4] * mat[8] - mat[5] * mat[7]) * inv_det,
        (mat[2] * mat[7] - mat[1] * mat[8]) * inv_det,
        (mat[1] * mat[5] - mat[2] * mat[4]) * inv_det,
        (mat[5] * mat[6] - mat[3] * mat[8]) * inv_det,
        (mat[0] * mat[8] - mat[2] * mat[6]) * inv_det,
        (mat[2] * mat[3] - mat[0] * mat[5]) * inv_det,
        (mat[3] * mat[7] - mat[4] * mat[6]) * inv_det,
        (mat[1] * mat[6] - mat[0] * mat[7]) * inv_det,
        (mat[0] * mat[4] - mat[1] * mat[3]) * inv_det,
    ])
}

#[inline]
pub fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}
