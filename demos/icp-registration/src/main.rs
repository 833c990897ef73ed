use argh::FromArgs;
use std::path::PathBuf;

use arbor_3d::io::pcd::read_pcd;
use arbor_icp::{fitness_score, icp_point_to_point, IcpCriteria, IDENTITY_ROTATION};

#[derive(FromArgs)]
/// Align two point clouds with iterative closest point
struct Args {
    /// path to the source point cloud (.pcd)
    #[argh(option)]
    source: PathBuf,

    /// path to the target point cloud (.pcd)
    #[argh(option)]
    target: PathBuf,

    /// maximum number of iterations
    #[argh(option, default = "30")]
    max_iterations: usize,

    /// convergence tolerance on the rmse delta
    #[argh(option, default = "1e-6")]
    tolerance: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let source_cloud = read_pcd(&args.source)?;
    println!("source cloud: #{} points", source_cloud.len());

    let target_cloud = read_pcd(&args.target)?;
    println!("target cloud: #{} points", target_cloud.len());

    let result = icp_point_to_point(
        &source_cloud,
        &target_cloud,
        IDENTITY_ROTATION,
        [0.0; 3],
        IcpCriteria {
            max_iterations: args.max_iterations,
            tolerance: args.tolerance,
        },
    )?;

    let score = fitness_score(
        &source_cloud,
        &target_cloud,
        &result.rotation,
        &result.translation,
    )?;

    println!("has converged: {} score: {}", result.converged, score);
    for row in result.transformation() {
        println!(
            "{:10.6} {:10.6} {:10.6} {:10.6}",
            row[0], row[1], row[2], row[3]
        );
    }

    Ok(())
}
