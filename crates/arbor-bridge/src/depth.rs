use crate::error::BridgeError;
use crate::image::ImagePlane;

use arbor_3d::camera::PinholeIntrinsics;
use arbor_3d::pointcloud::PointCloud;

/// An unpacked DEPTH16 frame: per-pixel range in meters plus sensor
/// confidence.
#[derive(Debug, Clone)]
pub struct DepthFrame {
    /// Frame width in pixels.
    pub width: usize,
    /// Frame height in pixels.
    pub height: usize,
    /// Depth per pixel in meters, row major. Zero marks an invalid reading.
    pub depths: Vec<f64>,
    /// Confidence per pixel in [0, 1], row major.
    pub confidences: Vec<f64>,
}

impl DepthFrame {
    /// Depth in meters at (x, y).
    #[inline]
    pub fn depth_at(&self, x: usize, y: usize) -> f64 {
        self.depths[y * self.width + x]
    }

    /// Confidence at (x, y).
    #[inline]
    pub fn confidence_at(&self, x: usize, y: usize) -> f64 {
        self.confidences[y * self.width + x]
    }

    /// Project the frame into an organized point cloud through a pinhole
    /// model. Zero-depth readings become invalid points.
    pub fn to_point_cloud(&self, intrinsics: &PinholeIntrinsics) -> PointCloud {
        let mut points = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                points.push(intrinsics.unproject(x as f64, y as f64, self.depth_at(x, y)));
            }
        }
        PointCloud::organized(points, self.width, self.height)
    }
}

/// Unpack a DEPTH16 plane into ranges and confidences.
///
/// Each 16-bit sample packs `[confidence:3 | range_mm:13]` after swapping the
/// byte order the device delivers. The row stride is interpreted in 16-bit
/// elements and rows are addressed as `y / 2 * stride`, matching the capture
/// device's interleaved buffer layout.
pub fn parse_depth16(
    plane: &ImagePlane,
    width: usize,
    height: usize,
) -> Result<DepthFrame, BridgeError> {
    if width == 0 || height == 0 {
        return Err(BridgeError::InvalidImage(format!(
            "non-positive dimensions {width}x{height}"
        )));
    }
    let stride = if plane.row_stride > 0 {
        plane.row_stride as usize
    } else {
        width
    };

    // the deepest sample the loop will touch
    let last_index = (height - 1) / 2 * stride + (width - 1);
    let needed = (last_index + 1) * 2;
    if plane.data.len() < needed {
        return Err(BridgeError::TruncatedBuffer {
            needed,
            got: plane.data.len(),
        });
    }

    let mut depths = Vec::with_capacity(width * height);
    let mut confidences = Vec::with_capacity(width * height);

    for y in 0..height {
        for x in 0..width {
            let index = (y / 2 * stride + x) * 2;
            let sample = u16::from_le_bytes([plane.data[index], plane.data[index + 1]]);

            let range_mm = sample & 0x1FFF;
            let confidence_raw = (sample >> 13) & 0x7;
            let confidence = if confidence_raw == 0 {
                1.0
            } else {
                (confidence_raw - 1) as f64 / 7.0
            };

            depths.push(range_mm as f64 / 1000.0);
            confidences.push(confidence);
        }
    }

    Ok(DepthFrame {
        width,
        height,
        depths,
        confidences,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Pack a (range_mm, confidence) pair the way the device delivers it.
    fn pack_sample(range_mm: u16, confidence: u16) -> [u8; 2] {
        let sample = (confidence << 13) | (range_mm & 0x1FFF);
        sample.to_le_bytes()
    }

    fn plane_from_samples(samples: &[(u16, u16)]) -> ImagePlane {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for (range, conf) in samples {
            data.extend_from_slice(&pack_sample(*range, *conf));
        }
        ImagePlane {
            pixel_stride: 2,
            row_stride: 0,
            data,
        }
    }

    #[test]
    fn unpacks_range_and_confidence() {
        let plane = plane_from_samples(&[(1500, 0), (250, 4)]);
        let frame = parse_depth16(&plane, 2, 1).unwrap();

        assert_relative_eq!(frame.depth_at(0, 0), 1.5, epsilon = 1e-12);
        // confidence 0 means the device gave no estimate, treated as full
        assert_relative_eq!(frame.confidence_at(0, 0), 1.0, epsilon = 1e-12);

        assert_relative_eq!(frame.depth_at(1, 0), 0.25, epsilon = 1e-12);
        assert_relative_eq!(frame.confidence_at(1, 0), 3.0 / 7.0, epsilon = 1e-12);
    }

    #[test]
    fn range_mask_ignores_confidence_bits() {
        // all confidence bits set, max 13-bit range
        let plane = plane_from_samples(&[(0x1FFF, 0x7)]);
        let frame = parse_depth16(&plane, 1, 1).unwrap();
        assert_relative_eq!(frame.depth_at(0, 0), 8.191, epsilon = 1e-12);
        assert_relative_eq!(frame.confidence_at(0, 0), 6.0 / 7.0, epsilon = 1e-12);
    }

    #[test]
    fn interleaved_rows_share_samples() {
        // height 2 with the y/2 addressing: both rows read the same samples
        let plane = plane_from_samples(&[(1000, 0), (2000, 0)]);
        let frame = parse_depth16(&plane, 2, 2).unwrap();
        assert_relative_eq!(frame.depth_at(0, 0), frame.depth_at(0, 1), epsilon = 1e-12);
        assert_relative_eq!(frame.depth_at(1, 0), frame.depth_at(1, 1), epsilon = 1e-12);
    }

    #[test]
    fn truncated_buffer_is_an_error() {
        let mut plane = plane_from_samples(&[(1000, 0)]);
        plane.data.pop();
        let err = parse_depth16(&plane, 1, 1).unwrap_err();
        assert!(matches!(err, BridgeError::TruncatedBuffer { .. }));
    }

    #[test]
    fn zero_depth_projects_to_invalid_point() {
        let plane = plane_from_samples(&[(0, 0), (1000, 0)]);
        let frame = parse_depth16(&plane, 2, 1).unwrap();
        let cloud = frame.to_point_cloud(&PinholeIntrinsics::tof_default());

        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.num_finite(), 1);
        assert_eq!(cloud.grid_size(), Some((2, 1)));
    }
}
