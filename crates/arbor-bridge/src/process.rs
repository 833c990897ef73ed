use crate::depth::parse_depth16;
use crate::error::BridgeError;
use crate::image::{ImageDesc, FORMAT_DEPTH16, FORMAT_YUV_420_888};

use arbor_3d::camera::PinholeIntrinsics;

/// Summary of one processed camera/depth frame pair.
#[derive(Debug, Clone)]
pub struct ProcessStats {
    /// Number of planes the RGB image carried.
    pub rgb_planes: usize,
    /// Valid (non-zero depth) points projected from the depth frame.
    pub valid_points: usize,
    /// Mean depth in meters over the valid points.
    pub mean_depth: f64,
}

/// Process a marshaled RGB + depth image pair: validate the descriptors,
/// unpack the depth plane and project it into a point cloud.
pub fn process_image_pair(
    rgb: &ImageDesc,
    depth: &ImageDesc,
) -> Result<ProcessStats, BridgeError> {
    rgb.validate()?;
    depth.validate()?;

    if rgb.format != FORMAT_YUV_420_888 {
        return Err(BridgeError::UnsupportedFormat(rgb.format));
    }
    if depth.format != FORMAT_DEPTH16 {
        return Err(BridgeError::UnsupportedFormat(depth.format));
    }

    let frame = parse_depth16(
        depth.plane(0)?,
        depth.width as usize,
        depth.height as usize,
    )?;

    let cloud = frame.to_point_cloud(&PinholeIntrinsics::tof_default());
    let valid_points = cloud.num_finite();
    let mean_depth = if valid_points > 0 {
        frame.depths.iter().filter(|d| **d > 0.0).sum::<f64>() / valid_points as f64
    } else {
        0.0
    };

    log::info!(
        "processed {}x{} depth frame: {} valid points, mean depth {:.3}m",
        depth.width,
        depth.height,
        valid_points,
        mean_depth
    );

    Ok(ProcessStats {
        rgb_planes: rgb.planes.len(),
        valid_points,
        mean_depth,
    })
}
