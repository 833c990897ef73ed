#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

use kiddo::immutable::float::kdtree::ImmutableKdTree;

use arbor_3d::linalg::transform_points;
use arbor_3d::pointcloud::PointCloud;

mod ops;
use ops::{find_correspondences, fit_transformation, update_transformation};

/// Error types for the ICP module.
#[derive(Debug, thiserror::Error)]
pub enum IcpError {
    /// A cloud with too few points to estimate a transform
    #[error("point cloud needs at least 3 finite points, got {0}")]
    NotEnoughPoints(usize),
}

/// Result of the ICP algorithm.
///
/// The transformation is from the source to the target frame.
#[derive(Debug, Clone)]
pub struct IcpResult {
    /// Estimated rotation matrix.
    pub rotation: [[f64; 3]; 3],
    /// Estimated translation vector.
    pub translation: [f64; 3],
    /// The total number of iterations performed.
    pub num_iterations: usize,
    /// Last computed RMSE over the gated correspondences.
    pub rmse: f64,
    /// Whether the RMSE delta dropped below the tolerance before the
    /// iteration budget ran out.
    pub converged: bool,
}

impl IcpResult {
    /// The estimated transform as a homogeneous 4x4 row-major matrix.
    pub fn transformation(&self) -> [[f64; 4]; 4] {
        let r = &self.rotation;
        let t = &self.translation;
        [
            [r[0][0], r[0][1], r[0][2], t[0]],
            [r[1][0], r[1][1], r[1][2], t[1]],
            [r[2][0], r[2][1], r[2][2], t[2]],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }
}

/// Convergence criteria for the ICP loop.
#[derive(Debug, Clone)]
pub struct IcpCriteria {
    /// Maximum number of iterations to perform.
    pub max_iterations: usize,
    /// Convergence tolerance as the difference in RMSE between two
    /// consecutive iterations.
    pub tolerance: f64,
}

impl Default for IcpCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            tolerance: 1e-6,
        }
    }
}

/// Iterative Closest Point using point-to-point distance.
///
/// # Arguments
///
/// * `source` - Source point cloud.
/// * `target` - Target point cloud.
/// * `initial_rot` - Initial rotation from the source to the target frame.
/// * `initial_trans` - Initial translation from the source to the target frame.
/// * `criteria` - Convergence criteria.
///
/// Non-finite points in either cloud are ignored.
pub fn icp_point_to_point(
    source: &PointCloud,
    target: &PointCloud,
    initial_rot: [[f64; 3]; 3],
    initial_trans: [f64; 3],
    criteria: IcpCriteria,
) -> Result<IcpResult, IcpError> {
    let source_points = finite_points(source);
    let target_points = finite_points(target);
    for points in [&source_points, &target_points] {
        if points.len() < 3 {
            return Err(IcpError::NotEnoughPoints(points.len()));
        }
    }

    let mut result = IcpResult {
        rotation: initial_rot,
        translation: initial_trans,
        num_iterations: 0,
        rmse: f64::INFINITY,
        converged: false,
    };

    // build kdtree for target points to speed up the nearest neighbor search
    let kdtree: ImmutableKdTree<f64, u32, 3, 32> =
        ImmutableKdTree::new_from_slice(&target_points);

    // apply the initial transformation given by the user
    let mut current_source = vec![[0.0; 3]; source_points.len()];
    transform_points(
        &source_points,
        &result.rotation,
        &result.translation,
        &mut current_source,
    );

    // main icp loop
    for i in 0..criteria.max_iterations {
        let now = std::time::Instant::now();

        // find closest points between current source and target
        let (current_source_match, current_target_match, distances) =
            find_correspondences(&current_source, &target_points, &kdtree);

        log::debug!(
            "iteration {}: {} gated correspondences",
            i,
            current_source_match.len()
        );

        // compute the delta transformation between current source and the
        // matched targets
        let mut rr_delta = [[0.0; 3]; 3];
        let mut tt_delta = [0.0; 3];
        fit_transformation(
            &current_source_match,
            &current_target_match,
            &mut rr_delta,
            &mut tt_delta,
        );

        // advance the current source by the delta
        let mut transformed_points = vec![[0.0; 3]; current_source.len()];
        transform_points(&current_source, &rr_delta, &tt_delta, &mut transformed_points);

        // fold the delta into the accumulated transformation
        update_transformation(
            &mut result.rotation,
            &mut result.translation,
            &rr_delta,
            &tt_delta,
        );

        // error between transformed source and target
        let rmse = (distances.iter().sum::<f64>() / distances.len() as f64).sqrt();

        result.num_iterations += 1;

        // check convergence and exit if below tolerance
        if (result.rmse - rmse).abs() < criteria.tolerance {
            log::debug!("ICP converged in {} iterations with error {}", i, rmse);
            result.rmse = rmse;
            result.converged = true;
            break;
        }

        result.rmse = rmse;
        current_source = transformed_points;

        log::debug!("iteration {} took {:?}", i, now.elapsed());
    }

    Ok(result)
}

/// Mean squared distance from the transformed source to its nearest target
/// neighbors, the alignment quality score the registration demo reports.
pub fn fitness_score(
    source: &PointCloud,
    target: &PointCloud,
    rotation: &[[f64; 3]; 3],
    translation: &[f64; 3],
) -> Result<f64, IcpError> {
    let source_points = finite_points(source);
    let target_points = finite_points(target);
    for points in [&source_points, &target_points] {
        if points.is_empty() {
            return Err(IcpError::NotEnoughPoints(0));
        }
    }

    let mut transformed = vec![[0.0; 3]; source_points.len()];
    transform_points(&source_points, rotation, translation, &mut transformed);

    let kdtree: ImmutableKdTree<f64, u32, 3, 32> =
        ImmutableKdTree::new_from_slice(&target_points);

    let sum: f64 = transformed
        .iter()
        .map(|p| kdtree.nearest_one::<kiddo::SquaredEuclidean>(p).distance)
        .sum();
    Ok(sum / transformed.len() as f64)
}

fn finite_points(cloud: &PointCloud) -> Vec<[f64; 3]> {
    cloud
        .points()
        .iter()
        .filter(|p| p.iter().all(|v| v.is_finite()))
        .copied()
        .collect()
}

/// The identity rotation, the usual initial guess.
pub const IDENTITY_ROTATION: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
