use std::io::BufRead;
use std::path::Path;

use crate::camera::PinholeIntrinsics;
use crate::pointcloud::{PointCloud, Viewpoint, INVALID_POINT};

/// Width of the phone's ToF depth stream.
pub const TOF_WIDTH: usize = 180;
/// Height of the phone's ToF depth stream.
pub const TOF_HEIGHT: usize = 240;

/// Error types for the ToF CSV reader.
#[derive(Debug, thiserror::Error)]
pub enum TofCsvError {
    /// Failed to read the capture file
    #[error("Failed to read ToF capture file")]
    Io(#[from] std::io::Error),

    /// A record with fewer than three fields
    #[error("Incorrect file format on line {0}")]
    MalformedRecord(usize),

    /// A field that does not parse as a number
    #[error("Invalid numeric value on line {0}")]
    InvalidValue(usize),
}

/// One (u, v, depth, confidence) sample of a ToF capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TofSample {
    /// Horizontal image coordinate.
    pub u: f64,
    /// Vertical image coordinate.
    pub v: f64,
    /// Depth reading in meters; zero marks an invalid sample.
    pub depth: f64,
    /// Sensor confidence in [0, 1], when the capture carries it.
    pub confidence: Option<f64>,
}

/// A parsed ToF capture frame.
#[derive(Debug, Clone)]
pub struct TofFrame {
    /// Grid width of the capture.
    pub width: usize,
    /// Grid height of the capture.
    pub height: usize,
    /// The samples, at most `width * height`, in file order.
    pub samples: Vec<TofSample>,
}

impl TofFrame {
    /// Project the frame into an organized point cloud.
    ///
    /// Each sample goes through the pinhole model; grid cells without a
    /// sample (short captures) and zero-depth samples become invalid points.
    /// The sensor sits at the world origin, flipped about x like the capture
    /// pipeline records it.
    pub fn to_point_cloud(&self, intrinsics: &PinholeIntrinsics) -> PointCloud {
        let mut points = vec![INVALID_POINT; self.width * self.height];
        for (slot, sample) in points.iter_mut().zip(self.samples.iter()) {
            *slot = intrinsics.unproject(sample.u, sample.v, sample.depth);
        }
        PointCloud::organized(points, self.width, self.height)
            .with_viewpoint(Viewpoint::new([0.0; 3], [0.0, 1.0, 0.0, 0.0]))
    }
}

/// Read a comma-separated ToF capture: one `u,v,depth[,confidence]` record
/// per line.
///
/// Reading stops after `TOF_WIDTH * TOF_HEIGHT` samples; a record with fewer
/// than three fields or a non-numeric field is an error naming the 1-based
/// line number.
pub fn read_tof_csv(path: impl AsRef<Path>) -> Result<TofFrame, TofCsvError> {
    let file = std::fs::File::open(path)?;
    read_tof_records(std::io::BufReader::new(file), TOF_WIDTH, TOF_HEIGHT)
}

fn read_tof_records<R: BufRead>(
    reader: R,
    width: usize,
    height: usize,
) -> Result<TofFrame, TofCsvError> {
    let max_samples = width * height;
    let mut samples = Vec::with_capacity(max_samples);

    for (line_idx, line) in reader.lines().enumerate() {
        if samples.len() >= max_samples {
            break;
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let values = line
            .split(',')
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| {
                t.parse::<f64>()
                    .map_err(|_| TofCsvError::InvalidValue(line_idx + 1))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if values.len() < 3 {
            return Err(TofCsvError::MalformedRecord(line_idx + 1));
        }

        samples.push(TofSample {
            u: values[0],
            v: values[1],
            depth: values[2],
            confidence: values.get(3).copied(),
        });
    }

    log::debug!("parsed {} ToF samples", samples.len());

    Ok(TofFrame {
        width,
        height,
        samples,
    })
}
