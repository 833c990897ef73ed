use crate::linalg::{invert_rigid, matmul33, transform_point};
use crate::pointcloud::PointCloud;
use crate::transforms::deg_to_rad;

/// Error types for range image construction.
#[derive(Debug, thiserror::Error)]
pub enum RangeImageError {
    /// Non-positive angular resolution
    #[error("angular resolution must be positive, got {0}")]
    InvalidAngularResolution(f64),

    /// Non-positive angular span
    #[error("angular span must be positive")]
    InvalidAngularSpan,

    /// Unknown coordinate frame selector
    #[error("unknown coordinate frame index {0}")]
    UnknownCoordinateFrame(i32),
}

/// Coordinate frame convention of the virtual sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateFrame {
    /// x right, y down, z forward (optical convention).
    #[default]
    CameraFrame,
    /// x forward, y left, z up (lidar convention).
    LaserFrame,
}

impl CoordinateFrame {
    /// Resolve the numeric selector the CLI uses (0 camera, 1 laser).
    pub fn from_index(index: i32) -> Result<Self, RangeImageError> {
        match index {
            0 => Ok(Self::CameraFrame),
            1 => Ok(Self::LaserFrame),
            other => Err(RangeImageError::UnknownCoordinateFrame(other)),
        }
    }
}

// Rotation taking laser-frame coordinates into the optical camera frame.
const LASER_TO_CAMERA: [[f64; 3]; 3] = [
    [0.0, -1.0, 0.0],
    [0.0, 0.0, -1.0],
    [1.0, 0.0, 0.0],
];

/// Parameters controlling range image construction.
#[derive(Debug, Clone)]
pub struct RangeImageParams {
    /// Angular resolution along the image x axis, radians per pixel.
    pub angular_resolution_x: f64,
    /// Angular resolution along the image y axis, radians per pixel.
    pub angular_resolution_y: f64,
    /// Maximum horizontal field of view in radians.
    pub max_angle_width: f64,
    /// Maximum vertical field of view in radians.
    pub max_angle_height: f64,
    /// Sensor coordinate convention.
    pub coordinate_frame: CoordinateFrame,
    /// Ranges within this distance of a pixel's minimum are averaged.
    pub noise_level: f64,
    /// Points closer than this are discarded.
    pub min_range: f64,
    /// Pixels of unobserved margin kept around the cropped image.
    pub border_size: usize,
}

impl Default for RangeImageParams {
    fn default() -> Self {
        Self {
            angular_resolution_x: deg_to_rad(0.5),
            angular_resolution_y: deg_to_rad(0.5),
            max_angle_width: deg_to_rad(360.0),
            max_angle_height: deg_to_rad(180.0),
            coordinate_frame: CoordinateFrame::CameraFrame,
            noise_level: 0.0,
            min_range: 0.0,
            border_size: 1,
        }
    }
}

/// A 2D depth-indexed projection of a point cloud.
///
/// Each pixel holds the range (distance from the virtual sensor) of the
/// closest point falling into its angular bin, plus that point's world
/// coordinates. Unobserved pixels hold NaN.
#[derive(Debug, Clone)]
pub struct RangeImage {
    width: usize,
    height: usize,
    ranges: Vec<f64>,
    points: Vec<[f64; 3]>,
    angular_resolution_x: f64,
    angular_resolution_y: f64,
    // offset of the cropped window inside the full angular image
    image_offset_x: i64,
    image_offset_y: i64,
    // sensor-to-world pose the image was built with
    to_world_rotation: [[f64; 3]; 3],
    to_world_translation: [f64; 3],
}

struct ProjectedPoint {
    px: i64,
    py: i64,
    range: f64,
    world: [f64; 3],
}

impl RangeImage {
    /// Build a range image from a point cloud using the pose stored in the
    /// cloud's viewpoint as the virtual sensor pose.
    pub fn from_point_cloud(
        cloud: &PointCloud,
        params: &RangeImageParams,
    ) -> Result<Self, RangeImageError> {
        let (rotation, translation) = cloud.viewpoint().to_pose();
        Self::from_point_cloud_with_pose(cloud, params, &rotation, &translation)
    }

    /// Build a range image observing `cloud` from an explicit sensor pose
    /// (sensor-to-world rotation and translation).
    pub fn from_point_cloud_with_pose(
        cloud: &PointCloud,
        params: &RangeImageParams,
        sensor_rotation: &[[f64; 3]; 3],
        sensor_translation: &[f64; 3],
    ) -> Result<Self, RangeImageError> {
        for res in [params.angular_resolution_x, params.angular_resolution_y] {
            if !(res > 0.0) {
                return Err(RangeImageError::InvalidAngularResolution(res));
            }
        }
        if !(params.max_angle_width > 0.0) || !(params.max_angle_height > 0.0) {
            return Err(RangeImageError::InvalidAngularSpan);
        }

        // world -> sensor, with the laser convention folded in when selected
        let (world_r, world_t) = invert_rigid(sensor_rotation, sensor_translation);
        let (to_sensor_r, to_sensor_t) = match params.coordinate_frame {
            CoordinateFrame::CameraFrame => (world_r, world_t),
            CoordinateFrame::LaserFrame => {
                let mut rot = [[0.0; 3]; 3];
                matmul33(&LASER_TO_CAMERA, &world_r, &mut rot);
                let trans = transform_point(&world_t, &LASER_TO_CAMERA, &[0.0; 3]);
                (rot, trans)
            }
        };

        let projected = project_points(cloud, params, &to_sensor_r, &to_sensor_t);

        let Some((min_px, max_px, min_py, max_py)) = pixel_bounds(&projected) else {
            return Ok(Self::empty(params, sensor_rotation, sensor_translation));
        };

        let border = params.border_size as i64;
        let image_offset_x = min_px - border;
        let image_offset_y = min_py - border;
        let width = (max_px - min_px + 1 + 2 * border) as usize;
        let height = (max_py - min_py + 1 + 2 * border) as usize;

        let mut ranges = vec![f64::NAN; width * height];
        let mut points = vec![[f64::NAN; 3]; width * height];

        // z-buffer: keep the nearest range per pixel
        for p in &projected {
            let idx = ((p.py - image_offset_y) as usize) * width + (p.px - image_offset_x) as usize;
            if ranges[idx].is_nan() || p.range < ranges[idx] {
                ranges[idx] = p.range;
                points[idx] = p.world;
            }
        }

        // average points indistinguishable from the winner within noise_level
        if params.noise_level > 0.0 {
            let mut sums = vec![([0.0f64; 3], 0.0f64, 0usize); width * height];
            for p in &projected {
                let idx =
                    ((p.py - image_offset_y) as usize) * width + (p.px - image_offset_x) as usize;
                if p.range <= ranges[idx] + params.noise_level {
                    let (acc, range_acc, n) = &mut sums[idx];
                    for (a, w) in acc.iter_mut().zip(p.world.iter()) {
                        *a += w;
                    }
                    *range_acc += p.range;
                    *n += 1;
                }
            }
            for (idx, (acc, range_acc, n)) in sums.into_iter().enumerate() {
                if n > 0 {
                    points[idx] = [acc[0] / n as f64, acc[1] / n as f64, acc[2] / n as f64];
                    ranges[idx] = range_acc / n as f64;
                }
            }
        }

        log::debug!(
            "range image {}x{} from {} points ({} pixels observed)",
            width,
            height,
            cloud.len(),
            ranges.iter().filter(|r| r.is_finite()).count()
        );

        Ok(Self {
            width,
            height,
            ranges,
            points,
            angular_resolution_x: params.angular_resolution_x,
            angular_resolution_y: params.angular_resolution_y,
            image_offset_x,
            image_offset_y,
            to_world_rotation: *sensor_rotation,
            to_world_translation: *sensor_translation,
        })
    }

    fn empty(
        params: &RangeImageParams,
        sensor_rotation: &[[f64; 3]; 3],
        sensor_translation: &[f64; 3],
    ) -> Self {
        Self {
            width: 0,
            height: 0,
            ranges: Vec::new(),
            points: Vec::new(),
            angular_resolution_x: params.angular_resolution_x,
            angular_resolution_y: params.angular_resolution_y,
            image_offset_x: 0,
            image_offset_y: 0,
            to_world_rotation: *sensor_rotation,
            to_world_translation: *sensor_translation,
        }
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether no point projected into the image.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The per-pixel ranges, row major, NaN where unobserved.
    pub fn ranges(&self) -> &[f64] {
        &self.ranges
    }

    /// The per-pixel world points, row major, NaN where unobserved.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Range at pixel (x, y), `None` outside the image or where unobserved.
    pub fn range_at(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let r = self.ranges[y * self.width + x];
        r.is_finite().then_some(r)
    }

    /// World point at pixel (x, y), `None` outside the image or where unobserved.
    pub fn point_at(&self, x: usize, y: usize) -> Option<[f64; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let p = self.points[y * self.width + x];
        p.iter().all(|v| v.is_finite()).then_some(p)
    }

    /// Number of observed pixels.
    pub fn num_observed(&self) -> usize {
        self.ranges.iter().filter(|r| r.is_finite()).count()
    }

    /// Minimum and maximum observed range, `None` for an empty image.
    pub fn range_bounds(&self) -> Option<(f64, f64)> {
        let mut bounds: Option<(f64, f64)> = None;
        for r in self.ranges.iter().filter(|r| r.is_finite()) {
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(*r), hi.max(*r)),
                None => (*r, *r),
            });
        }
        bounds
    }

    /// Offset of the cropped window inside the full angular image.
    pub fn image_offset(&self) -> (i64, i64) {
        (self.image_offset_x, self.image_offset_y)
    }

    /// Sensor-to-world pose the image was built with.
    pub fn to_world(&self) -> (&[[f64; 3]; 3], &[f64; 3]) {
        (&self.to_world_rotation, &self.to_world_translation)
    }

    /// The world points of all observed pixels, for visualization.
    pub fn observed_points(&self) -> Vec<[f64; 3]> {
        self.points
            .iter()
            .filter(|p| p.iter().all(|v| v.is_finite()))
            .copied()
            .collect()
    }
}

impl std::fmt::Display for RangeImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "range image of size {}x{} with angular resolution {:.6}rad/pixel x {:.6}rad/pixel",
            self.width, self.height, self.angular_resolution_x, self.angular_resolution_y
        )?;
        write!(f, "{} of {} pixels observed", self.num_observed(), self.ranges.len())
    }
}

fn project_points(
    cloud: &PointCloud,
    params: &RangeImageParams,
    to_sensor_r: &[[f64; 3]; 3],
    to_sensor_t: &[f64; 3],
) -> Vec<ProjectedPoint> {
    let mut projected = Vec::with_capacity(cloud.len());

    for world in cloud.points() {
        if world.iter().any(|v| !v.is_finite()) {
            continue;
        }
        let p = transform_point(world, to_sensor_r, to_sensor_t);
        let range = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
        if range <= 0.0 || range < params.min_range {
            continue;
        }

        let azimuth = p[0].atan2(p[2]);
        let elevation = (p[1] / range).asin();
        if azimuth.abs() > params.max_angle_width / 2.0
            || elevation.abs() > params.max_angle_height / 2.0
        {
            continue;
        }

        projected.push(ProjectedPoint {
            px: (azimuth / params.angular_resolution_x).floor() as i64,
            py: (elevation / params.angular_resolution_y).floor() as i64,
            range,
            world: *world,
        });
    }

    projected
}

fn pixel_bounds(projected: &[ProjectedPoint]) -> Option<(i64, i64, i64, i64)> {
    let mut iter = projected.iter();
    let first = iter.next()?;
    let mut bounds = (first.px, first.px, first.py, first.py);
    for p in iter {
        bounds.0 = bounds.0.min(p.px);
        bounds.1 = bounds.1.max(p.px);
        bounds.2 = bounds.2.min(p.py);
        bounds.3 = bounds.3.max(p.py);
    }
    Some(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointcloud::{PointCloud, INVALID_POINT};
    use approx::assert_relative_eq;

    fn default_params() -> RangeImageParams {
        RangeImageParams::default()
    }

    #[test]
    fn empty_cloud_gives_empty_image() {
        let cloud = PointCloud::new(vec![], None, None);
        let image = RangeImage::from_point_cloud(&cloud, &default_params()).unwrap();
        assert!(image.is_empty());
        assert_eq!(image.width(), 0);
        assert_eq!(image.num_observed(), 0);
        assert!(image.range_bounds().is_none());
    }

    #[test]
    fn all_invalid_cloud_gives_empty_image() {
        let cloud = PointCloud::new(vec![INVALID_POINT; 5], None, None);
        let image = RangeImage::from_point_cloud(&cloud, &default_params()).unwrap();
        assert!(image.is_empty());
    }

    #[test]
    fn single_point_with_border() {
        let cloud = PointCloud::new(vec![[0.0, 0.0, 2.0]], None, None);
        let image = RangeImage::from_point_cloud(&cloud, &default_params()).unwrap();

        // one observed pixel plus one pixel of border on each side
        assert_eq!(image.width(), 3);
        assert_eq!(image.height(), 3);
        assert_eq!(image.num_observed(), 1);
        assert_relative_eq!(image.range_at(1, 1).unwrap(), 2.0, epsilon = 1e-12);
        assert!(image.range_at(0, 0).is_none());
        assert_eq!(image.point_at(1, 1).unwrap(), [0.0, 0.0, 2.0]);
    }

    #[test]
    fn nearest_point_wins_the_pixel() {
        // two points in the same angular bin at different ranges
        let cloud = PointCloud::new(vec![[0.0, 0.0, 5.0], [0.0, 0.0, 2.0]], None, None);
        let image = RangeImage::from_point_cloud(&cloud, &default_params()).unwrap();
        assert_eq!(image.num_observed(), 1);
        assert_relative_eq!(image.range_at(1, 1).unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn min_range_filters_points() {
        let cloud = PointCloud::new(vec![[0.0, 0.0, 0.5], [0.0, 0.0, 3.0]], None, None);
        let params = RangeImageParams {
            min_range: 1.0,
            ..default_params()
        };
        let image = RangeImage::from_point_cloud(&cloud, &params).unwrap();
        assert_eq!(image.num_observed(), 1);
        assert_relative_eq!(image.range_at(1, 1).unwrap(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn noise_level_averages_close_ranges() {
        let cloud = PointCloud::new(vec![[0.0, 0.0, 2.0], [0.0, 0.0, 2.01]], None, None);
        let params = RangeImageParams {
            noise_level: 0.1,
            ..default_params()
        };
        let image = RangeImage::from_point_cloud(&cloud, &params).unwrap();
        assert_relative_eq!(image.range_at(1, 1).unwrap(), 2.005, epsilon = 1e-9);
    }

    #[test]
    fn separated_points_span_the_image() {
        // two points 90 degrees apart horizontally
        let cloud = PointCloud::new(vec![[0.0, 0.0, 2.0], [2.0, 0.0, 0.0]], None, None);
        let params = default_params();
        let image = RangeImage::from_point_cloud(&cloud, &params).unwrap();

        // 90 degrees at 0.5 degrees per pixel, plus borders
        let expected_width = (deg_to_rad(90.0) / params.angular_resolution_x).round() as usize;
        assert!(image.width() >= expected_width && image.width() <= expected_width + 3);
        assert_eq!(image.num_observed(), 2);
    }

    #[test]
    fn laser_frame_changes_axes() {
        // a point straight ahead in laser convention (+x)
        let cloud = PointCloud::new(vec![[3.0, 0.0, 0.0]], None, None);
        let params = RangeImageParams {
            coordinate_frame: CoordinateFrame::LaserFrame,
            ..default_params()
        };
        let image = RangeImage::from_point_cloud(&cloud, &params).unwrap();
        assert_eq!(image.num_observed(), 1);
        assert_relative_eq!(image.range_at(1, 1).unwrap(), 3.0, epsilon = 1e-12);
        // straight ahead maps to the angular origin
        let (ox, oy) = image.image_offset();
        assert_eq!((ox, oy), (-1, -1));
    }

    #[test]
    fn sensor_translation_shifts_ranges() {
        let cloud = PointCloud::new(vec![[0.0, 0.0, 5.0]], None, None);
        let rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let translation = [0.0, 0.0, 2.0];
        let image = RangeImage::from_point_cloud_with_pose(
            &cloud,
            &default_params(),
            &rotation,
            &translation,
        )
        .unwrap();
        assert_relative_eq!(image.range_at(1, 1).unwrap(), 3.0, epsilon = 1e-12);
        let (_, to_world_t) = image.to_world();
        assert_eq!(*to_world_t, translation);
    }

    #[test]
    fn rejects_bad_parameters() {
        let cloud = PointCloud::new(vec![[0.0, 0.0, 1.0]], None, None);
        let params = RangeImageParams {
            angular_resolution_x: 0.0,
            ..default_params()
        };
        assert!(matches!(
            RangeImage::from_point_cloud(&cloud, &params),
            Err(RangeImageError::InvalidAngularResolution(_))
        ));
    }

    #[test]
    fn coordinate_frame_selector() {
        assert_eq!(
            CoordinateFrame::from_index(0).unwrap(),
            CoordinateFrame::CameraFrame
        );
        assert_eq!(
            CoordinateFrame::from_index(1).unwrap(),
            CoordinateFrame::LaserFrame
        );
        assert!(CoordinateFrame::from_index(7).is_err());
    }
}
