use crate::error::BridgeError;

/// Android `ImageFormat.YUV_420_888`.
pub const FORMAT_YUV_420_888: i32 = 35;
/// Android `ImageFormat.DEPTH16`.
pub const FORMAT_DEPTH16: i32 = 1144402265;

/// One plane of a managed camera image, copied across the native boundary.
#[derive(Debug, Clone)]
pub struct ImagePlane {
    /// Distance between adjacent pixel samples.
    pub pixel_stride: i32,
    /// Distance between adjacent rows, in the unit the device reports.
    pub row_stride: i32,
    /// The plane's buffer contents.
    pub data: Vec<u8>,
}

/// A managed camera image: dimensions, pixel format and its planes.
#[derive(Debug, Clone)]
pub struct ImageDesc {
    /// Image width in pixels.
    pub width: i32,
    /// Image height in pixels.
    pub height: i32,
    /// Android `ImageFormat` constant.
    pub format: i32,
    /// The image planes in buffer order.
    pub planes: Vec<ImagePlane>,
}

impl ImageDesc {
    /// Basic sanity checks on the marshaled metadata.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(BridgeError::InvalidImage(format!(
                "non-positive dimensions {}x{}",
                self.width, self.height
            )));
        }
        if self.planes.is_empty() {
            return Err(BridgeError::MissingPlane(0));
        }
        Ok(())
    }

    /// The plane at `index`, or a `MissingPlane` error.
    pub fn plane(&self, index: usize) -> Result<&ImagePlane, BridgeError> {
        self.planes.get(index).ok_or(BridgeError::MissingPlane(index))
    }
}
