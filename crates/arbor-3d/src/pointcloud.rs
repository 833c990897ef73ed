/// Pose of the acquisition sensor carried alongside a point cloud.
///
/// Matches the PCD `VIEWPOINT` header entry: a translation followed by a
/// `w x y z` quaternion.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewpoint {
    /// Sensor origin in world coordinates.
    pub origin: [f64; 3],
    /// Sensor orientation as a quaternion (w, x, y, z).
    pub orientation: [f64; 4],
}

impl Default for Viewpoint {
    fn default() -> Self {
        Self {
            origin: [0.0, 0.0, 0.0],
            orientation: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

impl Viewpoint {
    /// Create a viewpoint from a translation and a (w, x, y, z) quaternion.
    pub fn new(origin: [f64; 3], orientation: [f64; 4]) -> Self {
        Self {
            origin,
            orientation,
        }
    }

    /// Sensor pose as a rotation matrix and translation vector.
    pub fn to_pose(&self) -> ([[f64; 3]; 3], [f64; 3]) {
        (
            crate::transforms::quaternion_to_rotation_matrix(&self.orientation),
            self.origin,
        )
    }
}

/// A point cloud with points, colors, and normals.
///
/// Invalid samples of an organized cloud are stored as all-NaN points, the
/// same convention PCD files use for non-dense clouds.
#[derive(Debug, Clone)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
    // The colors of the points.
    colors: Option<Vec<[u8; 3]>>,
    // The normals of the points.
    normals: Option<Vec<[f64; 3]>>,
    // Grid dimensions (width, height) when the cloud is organized.
    grid_size: Option<(usize, usize)>,
    // Acquisition sensor pose.
    viewpoint: Viewpoint,
}

impl PointCloud {
    /// Create a new point cloud from points, colors (optional), and normals (optional).
    pub fn new(
        points: Vec<[f64; 3]>,
        colors: Option<Vec<[u8; 3]>>,
        normals: Option<Vec<[f64; 3]>>,
    ) -> Self {
        Self {
            points,
            colors,
            normals,
            grid_size: None,
            viewpoint: Viewpoint::default(),
        }
    }

    /// Create an organized point cloud laid out on a `width` x `height` grid.
    ///
    /// PRECONDITION: `points.len() == width * height`.
    pub fn organized(points: Vec<[f64; 3]>, width: usize, height: usize) -> Self {
        debug_assert_eq!(points.len(), width * height);
        Self {
            points,
            colors: None,
            normals: None,
            grid_size: Some((width, height)),
            viewpoint: Viewpoint::default(),
        }
    }

    /// Replace the sensor viewpoint.
    pub fn with_viewpoint(mut self, viewpoint: Viewpoint) -> Self {
        self.viewpoint = viewpoint;
        self
    }

    /// Mark the cloud as organized on a `width` x `height` grid.
    ///
    /// PRECONDITION: `self.len() == width * height`.
    pub fn with_grid_size(mut self, width: usize, height: usize) -> Self {
        debug_assert_eq!(self.points.len(), width * height);
        self.grid_size = Some((width, height));
        self
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &Vec<[f64; 3]> {
        &self.points
    }

    /// Get as reference the colors of the points in the point cloud.
    pub fn colors(&self) -> Option<&Vec<[u8; 3]>> {
        self.colors.as_ref()
    }

    /// Get as reference the normals of the points in the point cloud.
    pub fn normals(&self) -> Option<&Vec<[f64; 3]>> {
        self.normals.as_ref()
    }

    /// Grid dimensions (width, height) when the cloud is organized.
    pub fn grid_size(&self) -> Option<(usize, usize)> {
        self.grid_size
    }

    /// The acquisition sensor pose.
    pub fn viewpoint(&self) -> &Viewpoint {
        &self.viewpoint
    }

    /// Count points with all-finite coordinates.
    pub fn num_finite(&self) -> usize {
        self.points
            .iter()
            .filter(|p| p.iter().all(|v| v.is_finite()))
            .count()
    }

    /// Get the minimum bound of the point cloud, ignoring non-finite points.
    pub fn min_bound(&self) -> [f64; 3] {
        self.fold_bound(f64::INFINITY, f64::min)
    }

    /// Get the maximum bound of the point cloud, ignoring non-finite points.
    pub fn max_bound(&self) -> [f64; 3] {
        self.fold_bound(f64::NEG_INFINITY, f64::max)
    }

    fn fold_bound(&self, init: f64, f: fn(f64, f64) -> f64) -> [f64; 3] {
        let mut bound = [init; 3];
        for p in self.points.iter().filter(|p| p.iter().all(|v| v.is_finite())) {
            for i in 0..3 {
                bound[i] = f(bound[i], p[i]);
            }
        }
        if bound[0] == init {
            return [0.0; 3];
        }
        bound
    }
}

/// The all-NaN sentinel used for invalid points.
pub const INVALID_POINT: [f64; 3] = [f64::NAN, f64::NAN, f64::NAN];

/// Check whether a point is the invalid sentinel (any NaN coordinate).
#[inline]
pub fn is_invalid_point(point: &[f64; 3]) -> bool {
    point.iter().any(|v| v.is_nan())
}
