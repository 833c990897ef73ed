/// Convert degrees to radians.
#[inline]
pub fn deg_to_rad(deg: f64) -> f64 {
    deg * std::f64::consts::PI / 180.0
}

/// Compute the rotation matrix from an axis and angle.
///
/// # Arguments
///
/// * `axis` - The axis of rotation.
/// * `angle` - The angle of rotation.
///
/// # Returns
///
/// The rotation matrix.
///
/// Example:
///
/// ```no_run
/// use arbor_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let axis = [1.0, 0.0, 0.0];
/// let angle = std::f64::consts::PI / 2.0;
/// let rotation = axis_angle_to_rotation_matrix(&axis, angle).unwrap();
/// ```
pub fn axis_angle_to_rotation_matrix(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], &'static str> {
    // normalize the vector
    let [x, y, z] = {
        let magnitude = (axis[0].powi(2) + axis[1].powi(2) + axis[2].powi(2)).sqrt();
        if magnitude < 1e-10 {
            return Err("cannot compute rotation matrix from a zero vector");
        }
        [
            axis[0] / magnitude,
            axis[1] / magnitude,
            axis[2] / magnitude,
        ]
    };

    let c = angle.cos();
    let s = angle.sin();
    let t = 1.0 - c;

    Ok([
        [c + x * x * t, x * y * t - z * s, x * z * t + y * s],
        [x * y * t + z * s, c + y * y * t, y * z * t - x * s],
        [x * z * t - y * s, y * z * t + x * s, c + z * z * t],
    ])
}

/// Convert a (w, x, y, z) quaternion into a rotation matrix.
///
/// The quaternion is normalized first; a zero quaternion yields identity,
/// matching how PCD viewpoints with degenerate orientations are treated.
pub fn quaternion_to_rotation_matrix(quat: &[f64; 4]) -> [[f64; 3]; 3] {
    let norm = quat.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm < 1e-10 {
        return [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    }
    let [w, x, y, z] = [quat[0] / norm, quat[1] / norm, quat[2] / norm, quat[3] / norm];

    [
        [
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - w * z),
            2.0 * (x * z + w * y),
        ],
        [
            2.0 * (x * y + w * z),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - w * x),
        ],
        [
            2.0 * (x * z - w * y),
            2.0 * (y * z + w * x),
            1.0 - 2.0 * (x * x + y * y),
        ],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_axis_angle_quarter_turn_x() {
        let rotation =
            axis_angle_to_rotation_matrix(&[1.0, 0.0, 0.0], std::f64::consts::PI / 2.0).unwrap();
        let expected = [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]];
        for (row, expected_row) in rotation.iter().zip(expected.iter()) {
            for (a, b) in row.iter().zip(expected_row.iter()) {
                assert_relative_eq!(a, b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_axis_angle_zero_axis_fails() {
        assert!(axis_angle_to_rotation_matrix(&[0.0, 0.0, 0.0], 1.0).is_err());
    }

    #[test]
    fn test_quaternion_identity() {
        let rot = quaternion_to_rotation_matrix(&[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(rot, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
    }

    #[test]
    fn test_quaternion_x_flip() {
        // the writer demo's sensor orientation: 180 degrees about x
        let rot = quaternion_to_rotation_matrix(&[0.0, 1.0, 0.0, 0.0]);
        let expected = [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, -1.0]];
        for (row, expected_row) in rot.iter().zip(expected.iter()) {
            for (a, b) in row.iter().zip(expected_row.iter()) {
                assert_relative_eq!(a, b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_quaternion_matches_axis_angle() {
        let angle: f64 = 0.7;
        let quat = [(angle / 2.0).cos(), 0.0, (angle / 2.0).sin(), 0.0];
        let from_quat = quaternion_to_rotation_matrix(&quat);
        let from_axis = axis_angle_to_rotation_matrix(&[0.0, 1.0, 0.0], angle).unwrap();
        for (row_q, row_a) in from_quat.iter().zip(from_axis.iter()) {
            for (a, b) in row_q.iter().zip(row_a.iter()) {
                assert_relative_eq!(a, b, epsilon = 1e-12);
            }
        }
    }
}
