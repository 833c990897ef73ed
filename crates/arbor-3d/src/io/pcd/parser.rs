use std::collections::HashMap;
use std::io::{BufRead, Read};
use std::path::Path;

use crate::pointcloud::{PointCloud, Viewpoint};

const MAX_POINT_STEP: usize = 1024;
const MAX_POINTS: usize = 50_000_000;

/// Error types for the PCD module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PcdError {
    /// Failed to read PCD file
    #[error("Failed to read PCD file")]
    Io(#[from] std::io::Error),

    /// Unsupported field layout
    #[error("Unsupported PCD field layout")]
    UnsupportedProperty,

    /// Malformed PCD header
    #[error("Malformed PCD header")]
    MalformedHeader,

    /// Malformed record in the data section
    #[error("Malformed PCD record on line {0}")]
    MalformedRecord(usize),

    /// Invalid PCD file extension
    #[error("Invalid PCD file extension. Got:{0}")]
    InvalidFileExtension(String),
}

/// How the data section is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PcdData {
    Ascii,
    Binary,
}

/// Describes a single field in a PCD point record
#[derive(Debug)]
pub(crate) struct PcdField {
    /// byte offset within a binary point record
    pub offset: usize,
    /// token index within an ascii record
    pub index: usize,
    /// size of one element (bytes)
    pub size: usize,
    /// number of elements
    pub count: usize,
    /// PCD type: 'F' = float, 'U' = unsigned int, 'I' = signed int
    pub kind: char,
}

#[derive(Debug)]
pub(crate) struct PcdHeader {
    pub fields: HashMap<String, PcdField>,
    /// total bytes per binary point record
    pub point_step: usize,
    /// total tokens per ascii point record
    pub token_count: usize,
    pub num_points: usize,
    pub width: usize,
    pub height: usize,
    pub viewpoint: Viewpoint,
    pub data: PcdData,
}

impl PcdHeader {
    fn field(&self, name: &str) -> Result<&PcdField, PcdError> {
        self.fields.get(name).ok_or(PcdError::UnsupportedProperty)
    }

    fn optional_field<'a>(&'a self, names: &[&str]) -> Option<&'a PcdField> {
        names.iter().find_map(|n| self.fields.get(*n))
    }
}

/// Read a little-endian f32 from a byte buffer
#[inline]
fn read_f32(buf: &[u8], offset: usize) -> Result<f32, PcdError> {
    let slice = buf
        .get(offset..offset + 4)
        .ok_or(PcdError::UnsupportedProperty)?;
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(slice);
    Ok(f32::from_le_bytes(bytes))
}

/// Read a little-endian u32 from a byte buffer
#[inline]
fn read_u32(buf: &[u8], offset: usize) -> Result<u32, PcdError> {
    let slice = buf
        .get(offset..offset + 4)
        .ok_or(PcdError::UnsupportedProperty)?;
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(slice);
    Ok(u32::from_le_bytes(bytes))
}

fn parse_viewpoint(tokens: &mut std::str::SplitWhitespace<'_>) -> Result<Viewpoint, PcdError> {
    let mut values = [0.0f64; 7];
    for value in values.iter_mut() {
        let token = tokens.next().ok_or(PcdError::MalformedHeader)?;
        *value = token.parse().map_err(|_| PcdError::MalformedHeader)?;
    }
    Ok(Viewpoint::new(
        [values[0], values[1], values[2]],
        [values[3], values[4], values[5], values[6]],
    ))
}

pub(crate) fn parse_pcd_header<R: BufRead>(reader: &mut R) -> Result<PcdHeader, PcdError> {
    let mut field_names: Vec<String> = Vec::new();
    let mut sizes = Vec::new();
    let mut types = Vec::new();
    let mut counts = Vec::new();
    let mut num_points = 0usize;
    let mut width = 0usize;
    let mut height = 0usize;
    let mut viewpoint = Viewpoint::default();
    let data;

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Err(PcdError::MalformedHeader);
        }
        let line = line.trim();

        if let Some(kind) = line.strip_prefix("DATA") {
            data = match kind.trim() {
                "ascii" => PcdData::Ascii,
                "binary" => PcdData::Binary,
                _ => return Err(PcdError::UnsupportedProperty),
            };
            break;
        }

        let mut it = line.split_whitespace();
        match it.next() {
            Some("SIZE") => {
                sizes = it
                    .map(|v| v.parse::<usize>().map_err(|_| PcdError::MalformedHeader))
                    .collect::<Result<Vec<_>, _>>()?;
            }
            Some("TYPE") => {
                types = it
                    .map(|v| v.chars().next().ok_or(PcdError::MalformedHeader))
                    .collect::<Result<Vec<_>, _>>()?;
            }
            Some("COUNT") => {
                counts = it
                    .map(|v| v.parse::<usize>().map_err(|_| PcdError::MalformedHeader))
                    .collect::<Result<Vec<_>, _>>()?;
            }
            Some("WIDTH") => {
                let token = it.next().ok_or(PcdError::MalformedHeader)?;
                width = token.parse().map_err(|_| PcdError::MalformedHeader)?;
            }
            Some("HEIGHT") => {
                let token = it.next().ok_or(PcdError::MalformedHeader)?;
                height = token.parse().map_err(|_| PcdError::MalformedHeader)?;
            }
            Some("VIEWPOINT") => viewpoint = parse_viewpoint(&mut it)?,
            Some("POINTS") => {
                let token = it.next().ok_or(PcdError::MalformedHeader)?;
                num_points = token.parse().map_err(|_| PcdError::MalformedHeader)?;
            }
            Some("FIELDS") => field_names = it.map(String::from).collect(),
            _ => {}
        }
    }

    if field_names.is_empty()
        || sizes.len() != field_names.len()
        || types.len() != field_names.len()
        || (!counts.is_empty() && counts.len() != field_names.len())
    {
        return Err(PcdError::MalformedHeader);
    }

    // POINTS may be omitted when WIDTH/HEIGHT are present
    if num_points == 0 {
        num_points = width.checked_mul(height).ok_or(PcdError::MalformedHeader)?;
    }

    // Compute byte offsets and token indices for each field
    let mut offset = 0usize;
    let mut index = 0usize;
    let mut fields = HashMap::new();

    for i in 0..field_names.len() {
        // If COUNT is omitted, PCD spec defines default count as 1
        let count = counts.get(i).copied().unwrap_or(1);
        let size = sizes[i];

        match field_names[i].as_str() {
            "x" | "y" | "z" | "normal_x" | "normal_y" | "normal_z" | "nx" | "ny" | "nz" => {
                if !(size == 4 && count == 1 && types[i] == 'F') {
                    return Err(PcdError::UnsupportedProperty);
                }
            }
            "rgb" => {
                if !(size == 4
                    && count == 1
                    && (types[i] == 'U' || types[i] == 'I' || types[i] == 'F'))
                {
                    return Err(PcdError::UnsupportedProperty);
                }
            }
            _ => {}
        }

        let field = PcdField {
            offset,
            index,
            size,
            count,
            kind: types[i],
        };

        let field_bytes = size.checked_mul(count).ok_or(PcdError::MalformedHeader)?;
        offset = offset
            .checked_add(field_bytes)
            .ok_or(PcdError::MalformedHeader)?;
        index += count;

        if offset > MAX_POINT_STEP {
            return Err(PcdError::MalformedHeader);
        }

        if fields.contains_key(&field_names[i]) {
            return Err(PcdError::MalformedHeader);
        }
        fields.insert(field_names[i].clone(), field);
    }

    Ok(PcdHeader {
        fields,
        point_step: offset,
        token_count: index,
        num_points,
        width,
        height,
        viewpoint,
        data,
    })
}

/// Read a PCD file, ASCII or binary little-endian.
///
/// # Arguments
/// * `path` - Path to a `.pcd` file.
///
/// # Returns
/// A [`PointCloud`] containing:
/// - 3D points (always; invalid samples come back as NaN points)
/// - RGB colors (if present)
/// - Normals (if present)
/// - The file's `VIEWPOINT` pose and organized grid dimensions.
pub fn read_pcd(path: impl AsRef<Path>) -> Result<PointCloud, PcdError> {
    let Some(file_ext) = path.as_ref().extension() else {
        return Err(PcdError::InvalidFileExtension("".into()));
    };

    if file_ext != "pcd" {
        return Err(PcdError::InvalidFileExtension(
            file_ext.to_string_lossy().to_string(),
        ));
    }

    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);

    let header = parse_pcd_header(&mut reader)?;

    if header.num_points == 0 || header.num_points > MAX_POINTS {
        return Err(PcdError::MalformedHeader);
    }

    let mut cloud = match header.data {
        PcdData::Binary => read_binary_body(&mut reader, &header),
        PcdData::Ascii => read_ascii_body(&mut reader, &header),
    }?;

    if header.height > 1 && header.width * header.height == cloud.len() {
        cloud = cloud.with_grid_size(header.width, header.height);
    }
    Ok(cloud.with_viewpoint(header.viewpoint.clone()))
}

fn read_binary_body<R: Read>(reader: &mut R, header: &PcdHeader) -> Result<PointCloud, PcdError> {
    // Required fields
    let fx = header.field("x")?.offset;
    let fy = header.field("y")?.offset;
    let fz = header.field("z")?.offset;

    // Optional fields
    let frgb = header.fields.get("rgb").map(|f| f.offset);
    let fnx = header.optional_field(&["normal_x", "nx"]).map(|f| f.offset);
    let fny = header.optional_field(&["normal_y", "ny"]).map(|f| f.offset);
    let fnz = header.optional_field(&["normal_z", "nz"]).map(|f| f.offset);

    if header.point_step == 0 || header.point_step > MAX_POINT_STEP {
        return Err(PcdError::MalformedHeader);
    }

    let mut buffer = vec![0u8; header.point_step];

    let mut points = Vec::with_capacity(header.num_points);
    let mut colors = Vec::new();
    let mut normals = Vec::new();

    for _ in 0..header.num_points {
        reader.read_exact(&mut buffer)?;

        let x = read_f32(&buffer, fx)?;
        let y = read_f32(&buffer, fy)?;
        let z = read_f32(&buffer, fz)?;
        points.push([x as f64, y as f64, z as f64]);

        if let Some(off) = frgb {
            let rgb = read_u32(&buffer, off)?;
            colors.push(unpack_rgb(rgb));
        }

        if let (Some(ox), Some(oy), Some(oz)) = (fnx, fny, fnz) {
            normals.push([
                read_f32(&buffer, ox)? as f64,
                read_f32(&buffer, oy)? as f64,
                read_f32(&buffer, oz)? as f64,
            ]);
        }
    }

    Ok(PointCloud::new(
        points,
        (!colors.is_empty()).then_some(colors),
        (!normals.is_empty()).then_some(normals),
    ))
}

fn read_ascii_body<R: BufRead>(reader: &mut R, header: &PcdHeader) -> Result<PointCloud, PcdError> {
    let ix = header.field("x")?.index;
    let iy = header.field("y")?.index;
    let iz = header.field("z")?.index;

    let irgb = header.fields.get("rgb").map(|f| (f.index, f.kind));
    let inx = header.optional_field(&["normal_x", "nx"]).map(|f| f.index);
    let iny = header.optional_field(&["normal_y", "ny"]).map(|f| f.index);
    let inz = header.optional_field(&["normal_z", "nz"]).map(|f| f.index);

    let mut points = Vec::with_capacity(header.num_points);
    let mut colors = Vec::new();
    let mut normals = Vec::new();

    for (line_idx, line) in reader.lines().enumerate() {
        if points.len() >= header.num_points {
            break;
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != header.token_count {
            return Err(PcdError::MalformedRecord(line_idx + 1));
        }

        let parse_float = |idx: usize| -> Result<f64, PcdError> {
            tokens[idx]
                .parse::<f32>()
                .map(f64::from)
                .map_err(|_| PcdError::MalformedRecord(line_idx + 1))
        };

        points.push([parse_float(ix)?, parse_float(iy)?, parse_float(iz)?]);

        if let Some((idx, kind)) = irgb {
            // PCL historically stores packed rgb either as an integer or a
            // bit-punned float
            let packed = match kind {
                'U' | 'I' => tokens[idx]
                    .parse::<u32>()
                    .map_err(|_| PcdError::MalformedRecord(line_idx + 1))?,
                _ => tokens[idx]
                    .parse::<f32>()
                    .map_err(|_| PcdError::MalformedRecord(line_idx + 1))?
                    .to_bits(),
            };
            colors.push(unpack_rgb(packed));
        }

        if let (Some(ax), Some(ay), Some(az)) = (inx, iny, inz) {
            normals.push([parse_float(ax)?, parse_float(ay)?, parse_float(az)?]);
        }
    }

    if points.len() != header.num_points {
        return Err(PcdError::MalformedHeader);
    }

    Ok(PointCloud::new(
        points,
        (!colors.is_empty()).then_some(colors),
        (!normals.is_empty()).then_some(normals),
    ))
}

#[inline]
fn unpack_rgb(rgb: u32) -> [u8; 3] {
    [
        ((rgb >> 16) & 0xFF) as u8,
        ((rgb >> 8) & 0xFF) as u8,
        (rgb & 0xFF) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_valid_binary_header() {
        let data = b"FIELDS x y z
SIZE 4 4 4
TYPE F F F
COUNT 1 1 1
POINTS 10
DATA binary";
        let mut reader = Cursor::new(&data[..]);
        let header = parse_pcd_header(&mut reader).expect("valid binary header should parse");
        assert_eq!(header.num_points, 10);
        assert_eq!(header.data, PcdData::Binary);
        assert!(header.fields.contains_key("x"));
    }

    #[test]
    fn parses_ascii_header_with_viewpoint() {
        let data = b"# .PCD v0.7 - Point Cloud Data file format
VERSION 0.7
FIELDS x y z
SIZE 4 4 4
TYPE F F F
COUNT 1 1 1
WIDTH 180
HEIGHT 240
VIEWPOINT 0 0 0 0 1 0 0
POINTS 43200
DATA ascii";
        let mut reader = Cursor::new(&data[..]);
        let header = parse_pcd_header(&mut reader).expect("valid ascii header should parse");
        assert_eq!(header.data, PcdData::Ascii);
        assert_eq!(header.width, 180);
        assert_eq!(header.height, 240);
        assert_eq!(header.num_points, 43200);
        assert_eq!(header.viewpoint.orientation, [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn rejects_wrong_type_for_xyz() {
        let data = b"FIELDS x y z
SIZE 4 4 4
TYPE I I I
COUNT 1 1 1
POINTS 5
DATA binary";
        let mut reader = Cursor::new(&data[..]);
        assert!(parse_pcd_header(&mut reader).is_err());
    }

    #[test]
    fn rejects_unknown_data_encoding() {
        let data = b"FIELDS x y z
SIZE 4 4 4
TYPE F F F
COUNT 1 1 1
POINTS 5
DATA binary_compressed";
        let mut reader = Cursor::new(&data[..]);
        assert!(parse_pcd_header(&mut reader).is_err());
    }

    #[test]
    fn points_fall_back_to_grid_size() {
        let data = b"FIELDS x y z
SIZE 4 4 4
TYPE F F F
WIDTH 4
HEIGHT 3
DATA ascii";
        let mut reader = Cursor::new(&data[..]);
        let header = parse_pcd_header(&mut reader).unwrap();
        assert_eq!(header.num_points, 12);
    }

    #[test]
    fn ascii_body_with_nan_points() {
        let body = b"0.5 0.5 1.0
nan nan nan
1.5 -0.5 2.0
";
        let header_data = b"FIELDS x y z
SIZE 4 4 4
TYPE F F F
COUNT 1 1 1
POINTS 3
DATA ascii";
        let mut reader = Cursor::new(&header_data[..]);
        let header = parse_pcd_header(&mut reader).unwrap();

        let cloud = read_ascii_body(&mut Cursor::new(&body[..]), &header).unwrap();
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.num_finite(), 2);
        assert!(cloud.points()[1][0].is_nan());
    }

    #[test]
    fn ascii_body_rejects_short_record() {
        let body = b"0.5 0.5
";
        let header_data = b"FIELDS x y z
SIZE 4 4 4
TYPE F F F
COUNT 1 1 1
POINTS 1
DATA ascii";
        let mut reader = Cursor::new(&header_data[..]);
        let header = parse_pcd_header(&mut reader).unwrap();

        let err = read_ascii_body(&mut Cursor::new(&body[..]), &header).unwrap_err();
        assert!(matches!(err, PcdError::MalformedRecord(1)));
    }

    #[test]
    fn binary_body_rejects_truncation() {
        let header_data = b"FIELDS x y z
SIZE 4 4 4
TYPE F F F
COUNT 1 1 1
POINTS 3
DATA binary";
        let mut reader = Cursor::new(&header_data[..]);
        let header = parse_pcd_header(&mut reader).unwrap();

        // two full 12-byte records plus a partial third
        let mut body = Vec::new();
        for v in [0.5f32, 0.5, 1.0, 1.5, -0.5, 2.0, 3.0] {
            body.extend_from_slice(&v.to_le_bytes());
        }

        let err = read_binary_body(&mut Cursor::new(&body[..]), &header).unwrap_err();
        assert!(matches!(err, PcdError::Io(_)));
    }

    #[test]
    fn ascii_body_rejects_missing_records() {
        let body = b"0.5 0.5 1.0
1.5 -0.5 2.0
";
        let header_data = b"FIELDS x y z
SIZE 4 4 4
TYPE F F F
COUNT 1 1 1
POINTS 3
DATA ascii";
        let mut reader = Cursor::new(&header_data[..]);
        let header = parse_pcd_header(&mut reader).unwrap();

        let err = read_ascii_body(&mut Cursor::new(&body[..]), &header).unwrap_err();
        assert!(matches!(err, PcdError::MalformedHeader));
    }

    #[test]
    fn read_pcd_rejects_non_pcd_extension() {
        let err = read_pcd("scene.ply").unwrap_err();
        assert!(matches!(err, PcdError::InvalidFileExtension(_)));
    }
}
