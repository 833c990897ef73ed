use argh::FromArgs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arbor_3d::io::pcd::read_pcd;
use arbor_3d::pointcloud::PointCloud;
use arbor_3d::rangeimage::{CoordinateFrame, RangeImage, RangeImageParams};
use arbor_3d::transforms::{axis_angle_to_rotation_matrix, deg_to_rad};

#[derive(FromArgs)]
/// Build and visualize a range image from a point cloud
struct Args {
    /// path to the scene point cloud (.pcd)
    #[argh(option)]
    pcd_path: PathBuf,

    /// angular resolution in degrees along image x
    #[argh(option, default = "0.5")]
    angular_resolution_x: f64,

    /// angular resolution in degrees along image y
    #[argh(option, default = "0.5")]
    angular_resolution_y: f64,

    /// coordinate frame (0 camera, 1 laser)
    #[argh(option, default = "0")]
    coordinate_frame: i32,

    /// rebuild the range image each frame from an orbiting sensor pose
    #[argh(switch)]
    live_update: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let params = RangeImageParams {
        angular_resolution_x: deg_to_rad(args.angular_resolution_x),
        angular_resolution_y: deg_to_rad(args.angular_resolution_y),
        coordinate_frame: CoordinateFrame::from_index(args.coordinate_frame)?,
        ..RangeImageParams::default()
    };
    println!(
        "angular_resolution_x: {}rad\nangular_resolution_y: {}rad\ncoordinate_frame: {:?}\nlive update: {}",
        params.angular_resolution_x,
        params.angular_resolution_y,
        params.coordinate_frame,
        args.live_update
    );

    let cloud = read_pcd(&args.pcd_path)?;
    println!("scene cloud: #{} points", cloud.len());

    let range_image = RangeImage::from_point_cloud(&cloud, &params)?;
    println!("{range_image}");

    let rec = rerun::RecordingStreamBuilder::new("Range Image Viewer").spawn()?;
    log_pointcloud(&rec, "scene", &cloud, rerun::Color::from_rgb(150, 150, 150))?;
    log_range_image(&rec, &range_image)?;

    if !args.live_update {
        return Ok(());
    }

    // rebuild the image each frame from a sensor pose orbiting the scene,
    // switching to the laser convention like the original live viewer
    let live_params = RangeImageParams {
        coordinate_frame: CoordinateFrame::LaserFrame,
        ..params
    };
    let center = orbit_center(&cloud);
    let radius = orbit_radius(&cloud, &center);

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_handler = cancel.clone();
    ctrlc::set_handler(move || {
        cancel_handler.store(true, Ordering::SeqCst);
    })?;

    let mut angle = 0.0f64;
    let mut frame = 0i64;
    while !cancel.load(Ordering::SeqCst) {
        let (rotation, translation) = orbit_pose(&live_params, &center, radius, angle)?;
        let range_image =
            RangeImage::from_point_cloud_with_pose(&cloud, &live_params, &rotation, &translation)?;

        rec.set_time_sequence("frame", frame);
        log_range_image(&rec, &range_image)?;
        log::debug!(
            "frame {frame}: {} observed pixels",
            range_image.num_observed()
        );

        angle += 0.01;
        frame += 1;
        std::thread::sleep(std::time::Duration::from_millis(10));
    }

    Ok(())
}

fn log_pointcloud(
    rec: &rerun::RecordingStream,
    name: &str,
    cloud: &PointCloud,
    color: rerun::Color,
) -> Result<(), Box<dyn std::error::Error>> {
    let points = cloud
        .points()
        .iter()
        .filter(|p| p.iter().all(|v| v.is_finite()))
        .map(|p| rerun::Position3D::new(p[0] as f32, p[1] as f32, p[2] as f32))
        .collect::<Vec<_>>();

    let colors = vec![color; points.len()];
    rec.log(name, &rerun::Points3D::new(points).with_colors(colors))?;
    Ok(())
}

fn log_range_image(
    rec: &rerun::RecordingStream,
    image: &RangeImage,
) -> Result<(), Box<dyn std::error::Error>> {
    // the image's world points, drawn black like the original viewer
    let points = image
        .observed_points()
        .iter()
        .map(|p| rerun::Position3D::new(p[0] as f32, p[1] as f32, p[2] as f32))
        .collect::<Vec<_>>();
    let colors = vec![rerun::Color::from_rgb(0, 0, 0); points.len()];
    rec.log(
        "range_image/points",
        &rerun::Points3D::new(points).with_colors(colors),
    )?;

    if image.is_empty() {
        return Ok(());
    }

    // the 2D range widget: ranges scaled into u8, far is bright
    let (lo, hi) = image.range_bounds().unwrap_or((0.0, 1.0));
    let span = if hi > lo { hi - lo } else { 1.0 };
    let pixels = image
        .ranges()
        .iter()
        .map(|r| {
            if r.is_finite() {
                (((r - lo) / span) * 255.0) as u8
            } else {
                0
            }
        })
        .collect::<Vec<_>>();

    let depth_image = rerun::DepthImage::new(
        pixels,
        rerun::ImageFormat::depth(
            [image.width() as u32, image.height() as u32],
            rerun::ChannelDatatype::U8,
        ),
    );
    rec.log("range_image/ranges", &depth_image)?;
    Ok(())
}

fn orbit_center(cloud: &PointCloud) -> [f64; 3] {
    let min = cloud.min_bound();
    let max = cloud.max_bound();
    [
        (min[0] + max[0]) / 2.0,
        (min[1] + max[1]) / 2.0,
        (min[2] + max[2]) / 2.0,
    ]
}

fn orbit_radius(cloud: &PointCloud, center: &[f64; 3]) -> f64 {
    let max = cloud.max_bound();
    let half_extent = (0..3)
        .map(|i| (max[i] - center[i]).powi(2))
        .sum::<f64>()
        .sqrt();
    (2.0 * half_extent).max(1.0)
}

fn orbit_pose(
    params: &RangeImageParams,
    center: &[f64; 3],
    radius: f64,
    angle: f64,
) -> Result<([[f64; 3]; 3], [f64; 3]), Box<dyn std::error::Error>> {
    let rotation = axis_angle_to_rotation_matrix(&[0.0, 1.0, 0.0], angle)?;

    // forward axis of the sensor in its own frame
    let forward = match params.coordinate_frame {
        CoordinateFrame::CameraFrame => [0.0, 0.0, 1.0],
        CoordinateFrame::LaserFrame => [1.0, 0.0, 0.0],
    };
    let forward_world = arbor_3d::linalg::transform_point(&forward, &rotation, &[0.0; 3]);

    // stand back from the center so the sensor looks at it
    let translation = [
        center[0] - radius * forward_world[0],
        center[1] - radius * forward_world[1],
        center[2] - radius * forward_world[2],
    ];
    Ok((rotation, translation))
}
