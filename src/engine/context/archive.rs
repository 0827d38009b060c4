//! Tar serialisation of staged build-context entries.

use std::io;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::Metadata;
use cap_std::fs_utf8::Dir;
use tar::{Builder, EntryType, Header};

use super::{ContextEntry, ContextEntryKind, StagedEntry, StagedSource};
use crate::error::BuildError;

const DIRECTORY_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;
const SYMLINK_MODE: u32 = 0o777;

/// Finished archive bytes and every entry they contain, in order.
pub(super) struct ArchiveOutput {
    pub(super) bytes: Vec<u8>,
    pub(super) manifest: Vec<ContextEntry>,
}

/// In-memory tar writer that records a manifest entry for each header.
struct ArchiveWriter {
    builder: Builder<Vec<u8>>,
    manifest: Vec<ContextEntry>,
}

/// Serialise `entries` into a tar archive.
///
/// Headers carry no timestamps or ownership, so identical inputs produce
/// identical bytes. `scratch_dir` names the assembly in errors that are not
/// tied to a single input.
pub(super) fn build_archive(
    entries: &[StagedEntry],
    scratch_dir: &Utf8Path,
) -> Result<ArchiveOutput, BuildError> {
    let mut writer = ArchiveWriter {
        builder: Builder::new(vec![]),
        manifest: vec![],
    };

    for entry in entries {
        let archive_path = Utf8Path::new(&entry.archive_path);
        let result = match &entry.source {
            StagedSource::File(path) => writer.append_host_file(path, archive_path),
            StagedSource::Tree(path) => writer.append_host_tree(path, archive_path),
        };
        result.map_err(|error| assembly_failed(entry.source.host_path(), &error))?;
    }

    writer
        .finish()
        .map(|(bytes, manifest)| ArchiveOutput { bytes, manifest })
        .map_err(|error| assembly_failed(scratch_dir, &error))
}

fn assembly_failed(path: &Utf8Path, error: &io::Error) -> BuildError {
    BuildError::AssemblyFailed {
        path: path.as_std_path().to_path_buf(),
        message: error.to_string(),
    }
}

impl ArchiveWriter {
    fn finish(self) -> io::Result<(Vec<u8>, Vec<ContextEntry>)> {
        let Self {
            mut builder,
            manifest,
        } = self;
        builder.finish()?;
        Ok((builder.into_inner()?, manifest))
    }

    /// Symlinked inputs are resolved first, so the archive holds the content
    /// they point at.
    fn append_host_file(&mut self, host_path: &Utf8Path, archive_path: &Utf8Path) -> io::Result<()> {
        let resolved = host_path.canonicalize_utf8()?;
        let file_name = resolved.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name")
        })?;
        let parent = resolved.parent().unwrap_or_else(|| Utf8Path::new("/"));
        let parent_dir = Dir::open_ambient_dir(parent, ambient_authority())?;
        self.append_file(&parent_dir, file_name, archive_path)
    }

    fn append_host_tree(&mut self, host_path: &Utf8Path, archive_path: &Utf8Path) -> io::Result<()> {
        let resolved = host_path.canonicalize_utf8()?;
        let root = Dir::open_ambient_dir(&resolved, ambient_authority())?;
        self.append_directory(archive_path, &root.dir_metadata()?)?;
        self.append_tree_contents(&root, &resolved, archive_path)
    }

    /// Walks `dir` in name order. Symlinks inside the tree are archived as
    /// links with their target text unchanged.
    fn append_tree_contents(
        &mut self,
        dir: &Dir,
        host_dir: &Utf8Path,
        archive_dir: &Utf8Path,
    ) -> io::Result<()> {
        let mut children = dir
            .entries()?
            .map(|item| -> io::Result<(String, cap_std::fs::FileType)> {
                let child = item?;
                Ok((child.file_name()?, child.file_type()?))
            })
            .collect::<io::Result<Vec<_>>>()?;
        children.sort_unstable_by(|left, right| left.0.cmp(&right.0));

        for (name, file_type) in children {
            let child_archive_path = archive_dir.join(&name);

            if file_type.is_dir() {
                self.append_directory(&child_archive_path, &dir.metadata(&name)?)?;
                self.append_tree_contents(
                    &dir.open_dir(&name)?,
                    &host_dir.join(&name),
                    &child_archive_path,
                )?;
            } else if file_type.is_file() {
                self.append_file(dir, &name, &child_archive_path)?;
            } else if file_type.is_symlink() {
                let target = std::fs::read_link(host_dir.join(&name))?;
                self.append_symlink(&child_archive_path, &target)?;
            } else {
                tracing::warn!(
                    path = %host_dir.join(&name),
                    "skipping special file in conductor source tree"
                );
            }
        }

        Ok(())
    }

    fn append_directory(&mut self, archive_path: &Utf8Path, metadata: &Metadata) -> io::Result<()> {
        let mode = mode_of(metadata, DIRECTORY_MODE);
        let mut header = new_header(EntryType::Directory, 0, mode);
        let name = format!("{}/", tar_name(archive_path));
        self.builder.append_data(&mut header, &name, io::empty())?;
        self.record(name, ContextEntryKind::Directory, 0);
        Ok(())
    }

    fn append_file(
        &mut self,
        parent_dir: &Dir,
        file_name: &str,
        archive_path: &Utf8Path,
    ) -> io::Result<()> {
        let metadata = parent_dir.metadata(file_name)?;
        let mut file = parent_dir.open(file_name)?;
        let size = metadata.len();

        let mut header = new_header(EntryType::Regular, size, mode_of(&metadata, FILE_MODE));
        let name = tar_name(archive_path);
        self.builder.append_data(&mut header, &name, &mut file)?;
        self.record(name, ContextEntryKind::File, size);
        Ok(())
    }

    fn append_symlink(&mut self, archive_path: &Utf8Path, target: &Path) -> io::Result<()> {
        let mut header = new_header(EntryType::Symlink, 0, SYMLINK_MODE);
        let name = tar_name(archive_path);
        self.builder.append_link(&mut header, &name, target)?;
        self.record(name, ContextEntryKind::Symlink, 0);
        Ok(())
    }

    fn record(&mut self, path: String, kind: ContextEntryKind, size: u64) {
        self.manifest.push(ContextEntry { path, kind, size });
    }
}

fn new_header(entry_type: EntryType, size: u64, mode: u32) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_size(size);
    header.set_mode(mode);
    header
}

/// Archive names always use forward slashes.
fn tar_name(path: &Utf8Path) -> String {
    path.as_str().replace('\\', "/")
}

/// Convert a std path into a UTF-8 path, reporting non-UTF-8 paths as I/O
/// errors.
pub(super) fn utf8_path(path: &Path) -> io::Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).map_err(|non_utf8| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("path is not valid UTF-8: {}", non_utf8.display()),
        )
    })
}

#[cfg(unix)]
fn mode_of(metadata: &Metadata, _default: u32) -> u32 {
    use cap_std::fs::PermissionsExt;

    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(_metadata: &Metadata, default: u32) -> u32 {
    default
}
