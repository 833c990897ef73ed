use crate::utils;

/// Transform a set of points using a rotation and translation.
///
/// # Arguments
///
/// * `src_points` - A set of points to be transformed.
/// * `dst_r_src` - A rotation matrix.
/// * `dst_t_src` - A translation vector.
/// * `dst_points` - A pre-allocated vector to store the transformed points.
///
/// PRECONDITION: dst_points is a pre-allocated slice of the same size as source.
///
/// Example:
///
/// ```no_run
/// use arbor_3d::linalg::transform_points;
///
/// let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
/// let rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
/// let translation = [0.0, 0.0, 0.0];
/// let mut dst_points = vec![[0.0; 3]; src_points.len()];
/// transform_points(&src_points, &rotation, &translation, &mut dst_points);
/// ```
pub fn transform_points(
    src_points: &[[f64; 3]],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
    dst_points: &mut [[f64; 3]],
) {
    assert_eq!(src_points.len(), dst_points.len());

    // create views of the rotation and translation matrices
    let dst_r_src_mat = utils::array33_to_faer_mat33(dst_r_src);

    // create view of the source points
    let points_in_src = {
        let src_points_slice = unsafe {
            std::slice::from_raw_parts(src_points.as_ptr() as *const f64, src_points.len() * 3)
        };
        // SAFETY: src_points_slice is an Nx3 row-major matrix, one point per row
        faer::mat::from_row_major_slice(src_points_slice, src_points.len(), 3)
    };

    // create a mutable view of the destination points
    let mut points_in_dst = {
        let dst_points_slice = unsafe {
            std::slice::from_raw_parts_mut(
                dst_points.as_mut_ptr() as *mut f64,
                dst_points.len() * 3,
            )
        };
        // SAFETY: dst_points_slice is a 3xN matrix where each column represents a 3D point
        faer::mat::from_column_major_slice_mut(dst_points_slice, 3, dst_points.len())
    };

    // perform the matrix multiplication
    faer::linalg::matmul::matmul(
        &mut points_in_dst,
        dst_r_src_mat,
        points_in_src.transpose(),
        None,
        1.0,
        faer::Parallelism::None,
    );

    let (tx, ty, tz) = (dst_t_src[0], dst_t_src[1], dst_t_src[2]);
    for mut col in points_in_dst.col_iter_mut() {
        // SAFETY: each column holds exactly one 3D point
        unsafe {
            col.write_unchecked(0, col.read_unchecked(0) + tx);
            col.write_unchecked(1, col.read_unchecked(1) + ty);
            col.write_unchecked(2, col.read_unchecked(2) + tz);
        }
    }
}

/// Multiply two 3x3 matrices, `dst = lhs * rhs`.
pub fn matmul33(lhs: &[[f64; 3]; 3], rhs: &[[f64; 3]; 3], dst: &mut [[f64; 3]; 3]) {
    for (i, dst_row) in dst.iter_mut().enumerate() {
        for (j, dst_val) in dst_row.iter_mut().enumerate() {
            *dst_val = (0..3).map(|k| lhs[i][k] * rhs[k][j]).sum();
        }
    }
}

/// Transpose of a 3x3 matrix.
pub fn transpose33(m: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in m.iter().enumerate() {
        for (j, val) in row.iter().enumerate() {
            out[j][i] = *val;
        }
    }
    out
}

/// Determinant of a 3x3 matrix.
pub fn det33(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Apply a rigid transform to a single point.
#[inline]
pub fn transform_point(point: &[f64; 3], rotation: &[[f64; 3]; 3], translation: &[f64; 3]) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (i, out_val) in out.iter_mut().enumerate() {
        *out_val = rotation[i][0] * point[0]
            + rotation[i][1] * point[1]
            + rotation[i][2] * point[2]
            + translation[i];
    }
    out
}

/// Invert a rigid transform: `R' = R^T`, `t' = -R^T * t`.
pub fn invert_rigid(
    rotation: &[[f64; 3]; 3],
    translation: &[f64; 3],
) -> ([[f64; 3]; 3], [f64; 3]) {
    let rot_inv = transpose33(rotation);
    let mut t_inv = [0.0; 3];
    for (i, t_val) in t_inv.iter_mut().enumerate() {
        *t_val = -(rot_inv[i][0] * translation[0]
            + rot_inv[i][1] * translation[1]
            + rot_inv[i][2] * translation[2]);
    }
    (rot_inv, t_inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_points_identity() {
        let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
        let rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let translation = [0.0, 0.0, 0.0];
        let mut dst_points = vec![[0.0; 3]; src_points.len()];
        transform_points(&src_points, &rotation, &translation, &mut dst_points);

        assert_eq!(dst_points, src_points);
    }

    #[test]
    fn test_transform_points_roundtrip() {
        let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
        let rotation = [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]];
        let translation = [1.0, 2.0, 3.0];

        let mut dst_points = vec![[0.0; 3]; src_points.len()];
        transform_points(&src_points, &rotation, &translation, &mut dst_points);

        let (rotation_inv, translation_inv) = invert_rigid(&rotation, &translation);
        let mut roundtrip = vec![[0.0; 3]; dst_points.len()];
        transform_points(&dst_points, &rotation_inv, &translation_inv, &mut roundtrip);

        for (a, b) in roundtrip.iter().zip(src_points.iter()) {
            for (x, y) in a.iter().zip(b.iter()) {
                assert_relative_eq!(x, y, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_matmul33_identity() {
        let m = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let eye = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let mut out = [[0.0; 3]; 3];
        matmul33(&m, &eye, &mut out);
        assert_eq!(out, m);
    }

    #[test]
    fn test_det33_rotation_is_one() {
        let rotation = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        assert_relative_eq!(det33(&rotation), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_transform_point_matches_batch() {
        let rotation = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let translation = [0.5, -0.5, 1.0];
        let point = [1.0, 2.0, 3.0];

        let single = transform_point(&point, &rotation, &translation);
        let mut batch = vec![[0.0; 3]];
        transform_points(&[point], &rotation, &translation, &mut batch);

        for (a, b) in single.iter().zip(batch[0].iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }
}
