/// PCD reader and writer module.
pub mod pcd;

/// ToF CSV capture reader module.
pub mod tof;
