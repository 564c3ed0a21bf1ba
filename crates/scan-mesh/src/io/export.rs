//! Export entry point.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::obj::{write_mtl, write_obj};
use super::ply::{write_ply_ascii, write_ply_binary};
use super::stl::{write_stl_ascii, write_stl_binary};
use super::{persist_all, stage_file, write_atomic};
use crate::Mesh;
use crate::error::{MeshError, MeshResult};
use crate::tracing_ext::{OperationTimer, log_io_result};

/// Output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Binary STL.
    StlBinary,
    /// ASCII STL.
    StlAscii,
    /// Wavefront OBJ, with an MTL and JPEG texture when the mesh is textured.
    Obj,
    /// ASCII PLY.
    PlyAscii,
    /// Binary little-endian PLY.
    PlyBinary,
    /// USDZ AR archive. Not implemented; exporting fails with
    /// [`MeshError::UnsupportedFormat`].
    Usdz,
}

impl ExportFormat {
    /// File extension written for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::StlBinary | ExportFormat::StlAscii => "stl",
            ExportFormat::Obj => "obj",
            ExportFormat::PlyAscii | ExportFormat::PlyBinary => "ply",
            ExportFormat::Usdz => "usdz",
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::StlBinary => "STL (binary)",
            ExportFormat::StlAscii => "STL (ASCII)",
            ExportFormat::Obj => "OBJ",
            ExportFormat::PlyAscii => "PLY (ASCII)",
            ExportFormat::PlyBinary => "PLY (binary)",
            ExportFormat::Usdz => "USDZ",
        }
    }
}

/// Options applied to every export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Uniform scale factor applied to positions. Must be finite and positive.
    pub scale: f32,

    /// Translate so the vertex centroid sits at the origin (after scaling).
    pub center: bool,

    /// Downscale the texture so neither side exceeds this many pixels.
    /// Aspect ratio is preserved. OBJ only.
    pub texture_max_dimension: Option<u32>,

    /// Pack the OBJ, MTL and texture into one `.zip` archive next to the
    /// requested path instead of writing them separately. OBJ only.
    pub bundle: bool,

    /// JPEG quality for the exported texture, 1 to 100.
    pub jpeg_quality: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            center: false,
            texture_max_dimension: None,
            bundle: false,
            jpeg_quality: 90,
        }
    }
}

impl ExportOptions {
    /// Options with a uniform scale factor.
    pub fn with_scale(scale: f32) -> Self {
        Self {
            scale,
            ..Self::default()
        }
    }

    /// Check every option against its accepted range.
    pub fn validate(&self) -> MeshResult<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(MeshError::invalid_parameter(
                "scale",
                self.scale,
                "export scale must be finite and greater than zero",
            ));
        }
        if self.texture_max_dimension == Some(0) {
            return Err(MeshError::invalid_parameter(
                "texture_max_dimension",
                0,
                "texture size limit must be at least one pixel",
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(MeshError::invalid_parameter(
                "jpeg_quality",
                self.jpeg_quality,
                "JPEG quality must be within [1, 100]",
            ));
        }
        Ok(())
    }
}

/// Files produced by an export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Every file written, main file first.
    pub files: Vec<PathBuf>,
    /// Total size of those files.
    pub bytes_written: u64,
}

/// Apply scale and recentering to a copy of the mesh.
pub fn prepare_for_export(mesh: &Mesh, options: &ExportOptions) -> MeshResult<Mesh> {
    options.validate()?;

    let mut prepared = mesh.clone();
    if options.scale != 1.0 {
        prepared.scale(options.scale);
    }
    if options.center {
        if let Some(centroid) = prepared.centroid() {
            let offset: Vector3<f32> = -centroid.coords.cast::<f32>();
            prepared.translate(offset);
        }
    }
    Ok(prepared)
}

/// Export a mesh.
///
/// OBJ exports of a textured mesh also write `<stem>.mtl` and `<stem>.jpg`
/// beside `path` (or bundle all three into `<stem>.zip`). Texture
/// coordinates are generated first if the textured mesh has none.
///
/// # Errors
///
/// - [`MeshError::UnsupportedFormat`] for [`ExportFormat::Usdz`]
/// - [`MeshError::InvalidParameter`] for out-of-range options
/// - [`MeshError::IoWrite`] if a file cannot be written; no partial file
///   remains
/// - [`MeshError::Texture`] if the texture cannot be encoded
pub fn export_mesh(
    mesh: &Mesh,
    path: &Path,
    format: ExportFormat,
    options: &ExportOptions,
) -> MeshResult<ExportSummary> {
    if format == ExportFormat::Usdz {
        return Err(MeshError::unsupported_format(format.name()));
    }

    let _timer = OperationTimer::start("export", mesh);
    info!(path = %path.display(), format = format.name(), "Exporting mesh");

    let prepared = prepare_for_export(mesh, options)?;
    let single = |bytes: u64| ExportSummary {
        files: vec![path.to_path_buf()],
        bytes_written: bytes,
    };

    let result = match format {
        ExportFormat::StlBinary => {
            write_atomic(path, |w| write_stl_binary(&prepared, w)).map(single)
        }
        ExportFormat::StlAscii => write_atomic(path, |w| write_stl_ascii(&prepared, w)).map(single),
        ExportFormat::PlyAscii => write_atomic(path, |w| write_ply_ascii(&prepared, w)).map(single),
        ExportFormat::PlyBinary => {
            write_atomic(path, |w| write_ply_binary(&prepared, w)).map(single)
        }
        ExportFormat::Obj => export_obj(prepared, path, options),
        ExportFormat::Usdz => Err(MeshError::unsupported_format(format.name())),
    };
    log_io_result("export", path, format.name(), &result);

    let summary = result?;
    info!(
        files = summary.files.len(),
        bytes = summary.bytes_written,
        "Export complete"
    );
    Ok(summary)
}

fn export_obj(mut mesh: Mesh, path: &Path, options: &ExportOptions) -> MeshResult<ExportSummary> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mesh")
        .to_string();
    let dir = path.parent().unwrap_or_else(|| Path::new(""));

    let texture = match mesh.texture.take() {
        Some(image) => {
            if mesh.ensure_texture_coordinates() {
                debug!("Generated texture coordinates for textured export");
            }
            Some(encode_texture(&image, options)?)
        }
        None => None,
    };

    let obj_name = format!("{stem}.obj");
    let mtl_name = format!("{stem}.mtl");
    let texture_name = format!("{stem}.jpg");

    let mut obj = Vec::new();
    let library = texture.as_ref().map(|_| mtl_name.as_str());
    write_obj(&mesh, library, &mut obj).map_err(|e| MeshError::io_write(path, e))?;

    let mut entries: Vec<(String, Vec<u8>)> = vec![(obj_name, obj)];
    if let Some(jpeg) = texture {
        let mut mtl = Vec::new();
        write_mtl(Some(&texture_name), &mut mtl).map_err(|e| MeshError::io_write(path, e))?;
        entries.push((mtl_name, mtl));
        entries.push((texture_name, jpeg));
    }

    if options.bundle {
        let archive_path = path.with_extension("zip");
        let archive = build_archive(&archive_path, &entries)?;
        let bytes = write_atomic(&archive_path, |w| w.write_all(&archive))?;
        return Ok(ExportSummary {
            files: vec![archive_path],
            bytes_written: bytes,
        });
    }

    // Companions replace existing files only once every part is written
    let mut staged = Vec::with_capacity(entries.len());
    for (index, (name, bytes)) in entries.iter().enumerate() {
        let target = if index == 0 {
            path.to_path_buf()
        } else {
            dir.join(name)
        };
        staged.push(stage_file(&target, |w| w.write_all(bytes))?);
    }

    let written = persist_all(staged)?;
    Ok(ExportSummary {
        bytes_written: written.iter().map(|(_, bytes)| bytes).sum(),
        files: written.into_iter().map(|(file, _)| file).collect(),
    })
}

/// Encode the texture as JPEG, downscaling first if it exceeds the limit.
fn encode_texture(image: &DynamicImage, options: &ExportOptions) -> MeshResult<Vec<u8>> {
    let rgb = match options.texture_max_dimension {
        Some(max) if image.width().max(image.height()) > max => {
            let resized = image.resize(max, max, FilterType::Triangle);
            debug!(
                from_width = image.width(),
                from_height = image.height(),
                to_width = resized.width(),
                to_height = resized.height(),
                "Downscaled texture"
            );
            resized.to_rgb8()
        }
        _ => image.to_rgb8(),
    };

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, options.jpeg_quality);
    DynamicImage::ImageRgb8(rgb)
        .write_with_encoder(encoder)
        .map_err(|e| MeshError::texture(e.to_string()))?;
    Ok(bytes)
}

fn build_archive(path: &Path, entries: &[(String, Vec<u8>)]) -> MeshResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options)
            .map_err(|e| MeshError::archive(path, e.to_string()))?;
        zip.write_all(bytes)
            .map_err(|e| MeshError::io_write(path, e))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| MeshError::archive(path, e.to_string()))?;
    Ok(cursor.into_inner())
}
