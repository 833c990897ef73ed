use kiddo::immutable::float::kdtree::ImmutableKdTree;

use arbor_3d::linalg::det33;

/// Compute the centroids of two sets of points.
pub(crate) fn compute_centroids(
    points1: &[[f64; 3]],
    points2: &[[f64; 3]],
) -> ([f64; 3], [f64; 3]) {
    let mut centroid1 = [0.0; 3];
    let mut centroid2 = [0.0; 3];

    for (p1, p2) in points1.iter().zip(points2.iter()) {
        for i in 0..3 {
            centroid1[i] += p1[i];
            centroid2[i] += p2[i];
        }
    }

    let n1 = points1.len() as f64;
    let n2 = points2.len() as f64;
    for i in 0..3 {
        centroid1[i] /= n1;
        centroid2[i] /= n2;
    }

    (centroid1, centroid2)
}

/// Compute the rigid transformation between two matched point sets.
///
/// The SVD-based (Arun) method: center both sets, build the cross-covariance
/// matrix, and recover the rotation from its singular vectors, flipping a
/// sign when the product would be a reflection.
pub(crate) fn fit_transformation(
    points_in_src: &[[f64; 3]],
    points_in_dst: &[[f64; 3]],
    dst_r_src: &mut [[f64; 3]; 3],
    dst_t_src: &mut [f64; 3],
) {
    assert_eq!(points_in_src.len(), points_in_dst.len());
    assert!(
        points_in_src.len() >= 3,
        "Need at least 3 points for transformation estimation"
    );

    // Identity transformation is a special case
    if points_in_src == points_in_dst {
        *dst_r_src = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        *dst_t_src = [0.0, 0.0, 0.0];
        return;
    }

    let (src_centroid, dst_centroid) = compute_centroids(points_in_src, points_in_dst);

    // cross-covariance H = sum[(src - src_mean) * (dst - dst_mean)^T]
    let mut h = faer::Mat::<f64>::zeros(3, 3);
    for (p_in_src, p_in_dst) in points_in_src.iter().zip(points_in_dst.iter()) {
        for i in 0..3 {
            for j in 0..3 {
                let value = h.read(i, j)
                    + (p_in_src[i] - src_centroid[i]) * (p_in_dst[j] - dst_centroid[j]);
                h.write(i, j, value);
            }
        }
    }

    let svd = h.svd();
    let (u, v) = (svd.u(), svd.v());

    // R = V * U^T
    let mut rotation = [[0.0; 3]; 3];
    for (i, row) in rotation.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = (0..3).map(|k| v.read(i, k) * u.read(j, k)).sum();
        }
    }

    // Negative determinant means a reflection slipped in; negate V's last
    // column and recompute.
    if det33(&rotation) < 0.0 {
        for (i, row) in rotation.iter_mut().enumerate() {
            for (j, val) in row.iter_mut().enumerate() {
                *val = (0..2).map(|k| v.read(i, k) * u.read(j, k)).sum::<f64>()
                    - v.read(i, 2) * u.read(j, 2);
            }
        }
    }

    for (i, t_val) in dst_t_src.iter_mut().enumerate() {
        *t_val = dst_centroid[i]
            - (rotation[i][0] * src_centroid[0]
                + rotation[i][1] * src_centroid[1]
                + rotation[i][2] * src_centroid[2]);
    }
    *dst_r_src = rotation;
}

/// Find nearest-neighbor correspondences from `source` into the target tree.
///
/// Matches whose (squared) distance exceeds a robust median + 3*sigma gate
/// computed via the median absolute deviation are rejected as outliers.
/// If the gate would leave fewer than 3 matches, all of them are kept.
pub(crate) fn find_correspondences(
    source: &[[f64; 3]],
    target: &[[f64; 3]],
    kdtree: &ImmutableKdTree<f64, u32, 3, 32>,
) -> (Vec<[f64; 3]>, Vec<[f64; 3]>, Vec<f64>) {
    // find nearest neighbors for each point in source
    let nn_results = source
        .iter()
        .map(|p| kdtree.nearest_one::<kiddo::SquaredEuclidean>(p))
        .collect::<Vec<_>>();

    // compute median distance
    let mut distances = nn_results.iter().map(|nn| nn.distance).collect::<Vec<_>>();
    distances.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median_dist = distances[distances.len() / 2];

    // compute median absolute deviation
    let mut dmed = distances
        .iter()
        .map(|d| (d - median_dist).abs())
        .collect::<Vec<_>>();
    dmed.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mad = dmed[dmed.len() / 2];
    let sigma_d = 1.4826 * mad;

    // put the correspondences in a vector
    let mut res = nn_results
        .iter()
        .enumerate()
        .filter(|(_, nn)| nn.distance <= median_dist + 3.0 * sigma_d)
        .map(|(i, nn)| (source[i], target[nn.item as usize], nn.distance))
        .collect::<Vec<_>>();

    // a zero median and zero deviation collapse the gate to `d <= 0`;
    // fitting a transform needs at least 3 matches, so keep every
    // correspondence when the gate drops below that
    if res.len() < 3 {
        res = nn_results
            .iter()
            .enumerate()
            .map(|(i, nn)| (source[i], target[nn.item as usize], nn.distance))
            .collect();
    }

    // unzip the results to separate points and distances
    let (points_in_src, tmp): (Vec<_>, Vec<_>) =
        res.into_iter().map(|(a, b, c)| (a, (b, c))).unzip();
    let (points_in_dst, distances) = tmp.into_iter().unzip();

    (points_in_src, points_in_dst, distances)
}

/// Accumulate a per-iteration delta into the running transformation:
/// `R <- R_delta * R`, `t <- R_delta * t + t_delta`.
pub(crate) fn update_transformation(
    rr: &mut [[f64; 3]; 3],
    tt: &mut [f64; 3],
    rr_delta: &[[f64; 3]; 3],
    tt_delta: &[f64; 3],
) {
    let previous = *rr;
    arbor_3d::linalg::matmul33(rr_delta, &previous, rr);
    *tt = arbor_3d::linalg::transform_point(tt, rr_delta, tt_delta);
}
