//! Mesh file I/O.
//!
//! Exports go through [`export_mesh`], which applies [`ExportOptions`] and
//! then writes one of the interchange formats. [`load_mesh`] reads STL, OBJ,
//! PLY and the internal `.scanmesh` snapshot back into a [`Mesh`].
//!
//! Every file is written to a temporary sibling and moved into place only
//! after the write completed, so a failed export never leaves a truncated
//! file behind.

mod export;
mod obj;
mod ply;
mod snapshot;
mod stl;

pub use export::{ExportFormat, ExportOptions, ExportSummary, export_mesh, prepare_for_export};
pub use obj::{MATERIAL_NAME, load_obj, write_mtl, write_obj};
pub use ply::{load_ply, write_ply_ascii, write_ply_binary};
pub use snapshot::{
    SNAPSHOT_EXTENSION, SNAPSHOT_HEADER_LEN, SNAPSHOT_MAX_COUNT, decode_snapshot, encode_snapshot,
    load_snapshot, save_snapshot, write_snapshot,
};
pub use stl::{STL_HEADER_LEN, load_stl, write_stl_ascii, write_stl_binary};

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::Mesh;
use crate::error::{MeshError, MeshResult};
use crate::tracing_ext::log_io_result;

/// Formats that [`load_mesh`] can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Stl,
    Obj,
    Ply,
    Snapshot,
}

impl MeshFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "stl" => Some(MeshFormat::Stl),
            "obj" => Some(MeshFormat::Obj),
            "ply" => Some(MeshFormat::Ply),
            SNAPSHOT_EXTENSION => Some(MeshFormat::Snapshot),
            _ => None,
        }
    }

    /// Short lowercase name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            MeshFormat::Stl => "stl",
            MeshFormat::Obj => "obj",
            MeshFormat::Ply => "ply",
            MeshFormat::Snapshot => SNAPSHOT_EXTENSION,
        }
    }
}

/// Load a mesh, choosing the reader by file extension.
///
/// Polygon faces are fan-triangulated and out-of-range faces dropped on the
/// way in (see [`crate::RawMesh::into_mesh`]).
pub fn load_mesh(path: &Path) -> MeshResult<Mesh> {
    let format = MeshFormat::from_path(path).ok_or_else(|| {
        MeshError::unsupported_format(
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or("<none>"),
        )
    })?;

    info!(path = %path.display(), format = format.name(), "Loading mesh");
    let result = match format {
        MeshFormat::Stl => load_stl(path),
        MeshFormat::Obj => load_obj(path),
        MeshFormat::Ply => load_ply(path),
        MeshFormat::Snapshot => load_snapshot(path),
    };
    log_io_result("load", path, format.name(), &result);

    let mesh = result?;
    info!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "Loaded mesh"
    );
    Ok(mesh)
}

pub(crate) fn open_for_read(path: &Path) -> MeshResult<std::io::BufReader<File>> {
    let file = File::open(path).map_err(|e| MeshError::io_read(path, e))?;
    Ok(std::io::BufReader::new(file))
}

/// Write a file atomically and return its final size in bytes.
///
/// `write` receives a buffered writer over a temporary file in the target
/// directory. The temporary file replaces `path` only after `write`
/// succeeded and the buffer was flushed; on any error it is deleted.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> MeshResult<u64>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    stage_file(path, write)?.persist()
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Output written to a temporary sibling of its destination.
///
/// Nothing at the destination changes until the file is persisted. Dropping
/// a staged file deletes it.
pub(crate) struct StagedFile {
    tmp: NamedTempFile,
    path: PathBuf,
}

/// Write the full contents for `path` without touching `path` itself.
pub(crate) fn stage_file<F>(path: &Path, write: F) -> MeshResult<StagedFile>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    let mut tmp =
        NamedTempFile::new_in(parent_dir(path)).map_err(|e| MeshError::io_write(path, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer).map_err(|e| MeshError::io_write(path, e))?;
        writer.flush().map_err(|e| MeshError::io_write(path, e))?;
    }
    Ok(StagedFile {
        tmp,
        path: path.to_path_buf(),
    })
}

impl StagedFile {
    /// Move the file into place and return its size.
    pub(crate) fn persist(self) -> MeshResult<u64> {
        let path = self.path;
        let file = self
            .tmp
            .persist(&path)
            .map_err(|e| MeshError::io_write(&path, e.error))?;
        let bytes = file
            .metadata()
            .map_err(|e| MeshError::io_write(&path, e))?
            .len();
        Ok(bytes)
    }
}

/// A persisted file, with whatever it replaced kept aside until the whole
/// group is in place.
struct Committed {
    path: PathBuf,
    bytes: u64,
    previous: Option<NamedTempFile>,
}

/// Persist a group of staged files as a unit.
///
/// Files already at a destination are moved aside first. If any file cannot
/// be put in place, every destination handled so far is restored: replaced
/// files come back and newly created ones are removed.
pub(crate) fn persist_all(staged: Vec<StagedFile>) -> MeshResult<Vec<(PathBuf, u64)>> {
    let mut committed: Vec<Committed> = Vec::with_capacity(staged.len());
    for file in staged {
        match commit(file) {
            Ok(done) => committed.push(done),
            Err(e) => {
                roll_back(committed);
                return Err(e);
            }
        }
    }
    // Dropping the set-aside originals deletes them
    Ok(committed
        .into_iter()
        .map(|done| (done.path, done.bytes))
        .collect())
}

fn commit(file: StagedFile) -> MeshResult<Committed> {
    let path = file.path.clone();
    let previous = if std::fs::symlink_metadata(&path).is_ok() {
        let aside = tempfile::Builder::new()
            .prefix(".replaced")
            .tempfile_in(parent_dir(&path))
            .map_err(|e| MeshError::io_write(&path, e))?;
        std::fs::rename(&path, aside.path()).map_err(|e| MeshError::io_write(&path, e))?;
        Some(aside)
    } else {
        None
    };

    match file.persist() {
        Ok(bytes) => Ok(Committed {
            path,
            bytes,
            previous,
        }),
        Err(e) => {
            roll_back(vec![Committed {
                path,
                bytes: 0,
                previous,
            }]);
            Err(e)
        }
    }
}

fn roll_back(committed: Vec<Committed>) {
    for done in committed.into_iter().rev() {
        let restored = match &done.previous {
            Some(aside) => std::fs::rename(aside.path(), &done.path),
            None => match std::fs::remove_file(&done.path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = restored {
            warn!(path = %done.path.display(), error = %e, "Failed to restore after export error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::unit_cube;
    use tempfile::tempdir;

    #[test]
    fn test_format_from_path() {
        assert_eq!(MeshFormat::from_path(Path::new("a.STL")), Some(MeshFormat::Stl));
        assert_eq!(MeshFormat::from_path(Path::new("a.obj")), Some(MeshFormat::Obj));
        assert_eq!(MeshFormat::from_path(Path::new("a.ply")), Some(MeshFormat::Ply));
        assert_eq!(
            MeshFormat::from_path(Path::new("a.scanmesh")),
            Some(MeshFormat::Snapshot)
        );
        assert_eq!(MeshFormat::from_path(Path::new("a.usdz")), None);
        assert_eq!(MeshFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_load_unknown_extension() {
        let err = load_mesh(Path::new("scan.fbx")).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::UnsupportedFormat);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_mesh(&dir.path().join("missing.stl")).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::IoRead);
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let result = write_atomic(&path, |w| {
            w.write_all(b"partial")?;
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        });
        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_atomic_reports_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cube.stl");
        let bytes = write_atomic(&path, |w| write_stl_binary(&unit_cube(), w)).unwrap();
        assert_eq!(bytes, 684);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 684);
    }
}
