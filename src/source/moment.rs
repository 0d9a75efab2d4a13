//! Rotation of a fault-local moment tensor into the global frame.

/// Rotation matrix `R` with `R[j][i] = R_ij` for the given fault angles (radians).
///
/// Row `i` of `R` (column `i` of the returned array) is the global direction of
/// local axis `i`: the slip direction in the fault plane, the in-plane axis
/// perpendicular to it, and the fault normal.
pub fn fault_rotation(strike: f64, dip: f64, rake: f64) -> [[f64; 3]; 3] {
    let (sstrike, cstrike) = strike.sin_cos();
    let (sdip, cdip) = dip.sin_cos();
    let (srake, crake) = rake.sin_cos();
    [
        [
            crake * cstrike + cdip * srake * sstrike,
            cdip * crake * sstrike - cstrike * srake,
            sdip * sstrike,
        ],
        [
            cdip * cstrike * srake - crake * sstrike,
            srake * sstrike + cdip * crake * cstrike,
            cstrike * sdip,
        ],
        [-sdip * srake, -crake * sdip, cdip],
    ]
}

/// Rotate `local` (row-major 3×3) by the fault angles.
///
/// Returns `[M_xx, M_yy, M_zz, M_xy, M_yz, M_xz, 0, 0, 0]` of
/// `M_ij = Σ_kl R_ki local_kl R_lj`.
pub fn transform_moment_tensor(local: &[[f64; 3]; 3], strike: f64, dip: f64, rake: f64) -> [f64; 9] {
    let r = fault_rotation(strike, dip, rake);
    // r[j][i] holds R_ij
    let rot = |i: usize, j: usize| r[j][i];
    let mut m = [[0.0; 3]; 3];
    for (i, row) in m.iter_mut().enumerate() {
        for (j, mij) in row.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (k, local_k) in local.iter().enumerate() {
                for (l, &lkl) in local_k.iter().enumerate() {
                    acc += rot(k, i) * lkl * rot(l, j);
                }
            }
            *mij = acc;
        }
    }
    [
        m[0][0], m[1][1], m[2][2], m[0][1], m[1][2], m[0][2], 0.0, 0.0, 0.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const LOCAL: [[f64; 3]; 3] = [[1.0, 2.0, 3.0], [2.0, 4.0, 5.0], [3.0, 5.0, 6.0]];

    #[test]
    fn zero_angles_keep_the_tensor() {
        let m = transform_moment_tensor(&LOCAL, 0.0, 0.0, 0.0);
        assert_eq!(m, [1.0, 4.0, 6.0, 2.0, 5.0, 3.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn rotation_is_orthonormal_and_preserves_trace() {
        let r = fault_rotation(0.3, 1.1, -0.7);
        for a in 0..3 {
            for b in 0..3 {
                let d: f64 = (0..3).map(|k| r[a][k] * r[b][k]).sum();
                let expected = if a == b { 1.0 } else { 0.0 };
                assert!((d - expected).abs() < 1e-12);
            }
        }
        let m = transform_moment_tensor(&LOCAL, 0.3, 1.1, -0.7);
        assert!((m[0] + m[1] + m[2] - 11.0).abs() < 1e-12);
    }

    #[test]
    fn columns_are_the_local_axes() {
        let (strike, dip) = (0.4, 0.9);
        let r = fault_rotation(strike, dip, 0.0);
        let column = |i: usize| [r[0][i], r[1][i], r[2][i]];
        let normal = [dip.sin() * strike.sin(), dip.sin() * strike.cos(), dip.cos()];
        for (a, b) in column(2).iter().zip(normal) {
            assert!((a - b).abs() < 1e-12);
        }
        // zero rake: slip runs along strike, which is horizontal
        assert!(column(0)[2].abs() < 1e-12);
        assert!(r[0][2].abs() > 0.1);
    }

    #[test]
    fn quarter_strike_swaps_horizontal_axes() {
        // strike = 90°: R maps x to -y and y to x
        let m = transform_moment_tensor(&LOCAL, FRAC_PI_2, 0.0, 0.0);
        assert!((m[0] - 4.0).abs() < 1e-12);
        assert!((m[1] - 1.0).abs() < 1e-12);
        assert!((m[2] - 6.0).abs() < 1e-12);
        assert!((m[3] + 2.0).abs() < 1e-12);
    }
}
