use argh::FromArgs;
use std::path::PathBuf;

use arbor_3d::camera::PinholeIntrinsics;
use arbor_3d::io::pcd::write_pcd_ascii;
use arbor_3d::io::tof::read_tof_csv;

#[derive(FromArgs)]
/// Project a ToF capture (u,v,depth,confidence CSV) into a point cloud file
struct Args {
    /// path to the capture file (.txt / .csv)
    #[argh(option)]
    input: PathBuf,

    /// path of the point cloud to write (.pcd)
    #[argh(option)]
    output: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let frame = read_tof_csv(&args.input)?;
    log::info!(
        "read {} samples of a {}x{} capture",
        frame.samples.len(),
        frame.width,
        frame.height
    );

    let cloud = frame.to_point_cloud(&PinholeIntrinsics::tof_default());
    write_pcd_ascii(&cloud, &args.output)?;

    println!(
        "Saved {} data points to {}",
        cloud.len(),
        args.output.display()
    );

    Ok(())
}
