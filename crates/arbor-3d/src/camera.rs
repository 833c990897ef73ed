use crate::pointcloud::INVALID_POINT;

/// A struct representing the intrinsic parameters of a pinhole camera.
#[derive(Debug, Clone)]
pub struct PinholeIntrinsics {
    /// The focal length in pixels (fx, fy)
    pub focal_length: (f64, f64),
    /// The principal point in pixels (cx, cy)
    pub principal_point: (f64, f64),
    /// The image dimensions (width, height)
    pub image_size: (u32, u32),
}

impl PinholeIntrinsics {
    /// Creates a new PinholeIntrinsics with the given parameters.
    pub fn new(
        focal_length: (f64, f64),
        principal_point: (f64, f64),
        image_size: (u32, u32),
    ) -> Self {
        Self {
            focal_length,
            principal_point,
            image_size,
        }
    }

    /// Calibrated intrinsics of the capture phone's ToF module.
    pub fn tof_default() -> Self {
        Self::new((492.68967, 492.6062), (323.59485, 234.65974), (640, 480))
    }

    /// Unproject an image sample (u, v) with a depth reading into a 3D point.
    ///
    /// The sensor sits at the world origin looking down +z. A depth of zero
    /// marks an invalid reading and yields the all-NaN sentinel point.
    pub fn unproject(&self, u: f64, v: f64, depth: f64) -> [f64; 3] {
        if depth == 0.0 {
            return INVALID_POINT;
        }
        let (fx, fy) = self.focal_length;
        let (cx, cy) = self.principal_point;
        [depth * ((u - cx) / fx), depth * ((v - cy) / fy), depth]
    }

    /// Project a 3D point in the camera frame to image coordinates.
    ///
    /// Returns `None` for points at or behind the camera plane.
    pub fn project(&self, point: &[f64; 3]) -> Option<(f64, f64)> {
        if !point[2].is_finite() || point[2] <= 0.0 {
            return None;
        }
        let (fx, fy) = self.focal_length;
        let (cx, cy) = self.principal_point;
        Some((
            fx * point[0] / point[2] + cx,
            fy * point[1] / point[2] + cy,
        ))
    }

    /// Returns the camera matrix as a row-major 3x3 array.
    pub fn camera_matrix(&self) -> [[f64; 3]; 3] {
        let (fx, fy) = self.focal_length;
        let (cx, cy) = self.principal_point;
        [[fx, 0.0, cx], [0.0, fy, cy], [0.0, 0.0, 1.0]]
    }
}
