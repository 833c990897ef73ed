use std::io::{BufWriter, Write};
use std::path::Path;

use super::parser::PcdError;
use crate::pointcloud::PointCloud;

fn write_header<W: Write>(writer: &mut W, cloud: &PointCloud, data: &str) -> std::io::Result<()> {
    let has_rgb = cloud.colors().is_some();
    let has_normals = cloud.normals().is_some();

    let mut fields = vec!["x", "y", "z"];
    if has_rgb {
        fields.push("rgb");
    }
    if has_normals {
        fields.extend(["normal_x", "normal_y", "normal_z"]);
    }

    let sizes = vec!["4"; fields.len()].join(" ");
    let counts = vec!["1"; fields.len()].join(" ");
    let types = fields
        .iter()
        .map(|f| if *f == "rgb" { "U" } else { "F" })
        .collect::<Vec<_>>()
        .join(" ");

    let (width, height) = cloud.grid_size().unwrap_or((cloud.len(), 1));
    let vp = cloud.viewpoint();

    writeln!(writer, "# .PCD v0.7 - Point Cloud Data file format")?;
    writeln!(writer, "VERSION 0.7")?;
    writeln!(writer, "FIELDS {}", fields.join(" "))?;
    writeln!(writer, "SIZE {sizes}")?;
    writeln!(writer, "TYPE {types}")?;
    writeln!(writer, "COUNT {counts}")?;
    writeln!(writer, "WIDTH {width}")?;
    writeln!(writer, "HEIGHT {height}")?;
    writeln!(
        writer,
        "VIEWPOINT {} {} {} {} {} {} {}",
        vp.origin[0],
        vp.origin[1],
        vp.origin[2],
        vp.orientation[0],
        vp.orientation[1],
        vp.orientation[2],
        vp.orientation[3],
    )?;
    writeln!(writer, "POINTS {}", cloud.len())?;
    writeln!(writer, "DATA {data}")?;
    Ok(())
}

fn check_extension(path: &Path) -> Result<(), PcdError> {
    match path.extension() {
        Some(ext) if ext == "pcd" => Ok(()),
        Some(ext) => Err(PcdError::InvalidFileExtension(
            ext.to_string_lossy().to_string(),
        )),
        None => Err(PcdError::InvalidFileExtension("".into())),
    }
}

fn format_value(value: f64) -> String {
    let value = value as f32;
    if value.is_nan() {
        // PCL writes lowercase nan for invalid coordinates
        "nan".to_string()
    } else {
        format!("{value}")
    }
}

#[inline]
fn pack_rgb(color: &[u8; 3]) -> u32 {
    ((color[0] as u32) << 16) | ((color[1] as u32) << 8) | color[2] as u32
}

/// Write a point cloud as an ASCII PCD v0.7 file.
///
/// Organized clouds keep their WIDTH/HEIGHT in the header; invalid points
/// serialize as `nan nan nan`.
pub fn write_pcd_ascii(cloud: &PointCloud, path: impl AsRef<Path>) -> Result<(), PcdError> {
    check_extension(path.as_ref())?;

    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_header(&mut writer, cloud, "ascii")?;

    for (i, point) in cloud.points().iter().enumerate() {
        let mut record = vec![
            format_value(point[0]),
            format_value(point[1]),
            format_value(point[2]),
        ];
        if let Some(colors) = cloud.colors() {
            record.push(pack_rgb(&colors[i]).to_string());
        }
        if let Some(normals) = cloud.normals() {
            for v in normals[i] {
                record.push(format_value(v));
            }
        }
        writeln!(writer, "{}", record.join(" "))?;
    }

    writer.flush()?;
    Ok(())
}

/// Write a point cloud as a binary little-endian PCD v0.7 file.
pub fn write_pcd_binary(cloud: &PointCloud, path: impl AsRef<Path>) -> Result<(), PcdError> {
    check_extension(path.as_ref())?;

    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_header(&mut writer, cloud, "binary")?;

    for (i, point) in cloud.points().iter().enumerate() {
        for v in point {
            writer.write_all(&(*v as f32).to_le_bytes())?;
        }
        if let Some(colors) = cloud.colors() {
            writer.write_all(&pack_rgb(&colors[i]).to_le_bytes())?;
        }
        if let Some(normals) = cloud.normals() {
            for v in normals[i] {
                writer.write_all(&(v as f32).to_le_bytes())?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::read_pcd;
    use super::*;
    use crate::pointcloud::{Viewpoint, INVALID_POINT};

    fn sample_cloud() -> PointCloud {
        PointCloud::new(
            vec![[0.5, -1.25, 2.0], INVALID_POINT, [3.0, 4.0, 5.0]],
            None,
            None,
        )
        .with_viewpoint(Viewpoint::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]))
    }

    #[test]
    fn ascii_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pcd");

        let cloud = sample_cloud();
        write_pcd_ascii(&cloud, &path).unwrap();

        let read_back = read_pcd(&path).unwrap();
        assert_eq!(read_back.len(), 3);
        assert_eq!(read_back.num_finite(), 2);
        assert_eq!(read_back.points()[0], [0.5, -1.25, 2.0]);
        assert!(read_back.points()[1][2].is_nan());
        assert_eq!(read_back.viewpoint().orientation, [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn binary_roundtrip_with_colors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pcd");

        let cloud = PointCloud::new(
            vec![[1.0, 2.0, 3.0], [-4.0, 5.0, -6.0]],
            Some(vec![[10, 20, 30], [200, 100, 50]]),
            None,
        );
        write_pcd_binary(&cloud, &path).unwrap();

        let read_back = read_pcd(&path).unwrap();
        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back.colors().unwrap()[1], [200, 100, 50]);
        assert_eq!(read_back.points()[1], [-4.0, 5.0, -6.0]);
    }

    #[test]
    fn organized_grid_survives_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.pcd");

        let cloud = PointCloud::organized(vec![[0.0, 0.0, 1.0]; 6], 2, 3);
        write_pcd_ascii(&cloud, &path).unwrap();

        let read_back = read_pcd(&path).unwrap();
        assert_eq!(read_back.grid_size(), Some((2, 3)));
    }

    #[test]
    fn rejects_wrong_extension() {
        let cloud = sample_cloud();
        let err = write_pcd_ascii(&cloud, "out.txt").unwrap_err();
        assert!(matches!(err, PcdError::InvalidFileExtension(_)));
    }

    #[test]
    fn empty_cloud_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pcd");

        let cloud = PointCloud::new(vec![], None, None);
        write_pcd_ascii(&cloud, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("POINTS 0"));
        // an empty cloud is rejected by the reader, mirroring the header guards
        assert!(read_pcd(&path).is_err());
    }
}
