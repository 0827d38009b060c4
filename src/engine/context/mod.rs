//! Build-context assembly for the conductor bootstrap image.
//!
//! The assembler stages every input under its archive path, renders the
//! build recipe into a scoped scratch directory, and serialises the staged
//! entries into a single tar archive. The scratch directory is removed on
//! every exit path, and the archive is only returned once assembly has fully
//! succeeded.

mod archive;

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};

use super::template::{PlaceholderRenderer, RenderRequest, RenderVariables, TemplateRenderer};
use crate::error::{BuildError, ConductorError};
use archive::{build_archive, utf8_path};

/// Project configuration files copied into the context when present.
pub const OPTIONAL_CONFIG_FILES: [&str; 3] =
    ["ansible.cfg", "ansible-requirements.txt", "requirements.yml"];

/// Template file rendered into the context's `Dockerfile`.
pub const CONDUCTOR_DOCKERFILE_TEMPLATE: &str = "conductor-dockerfile.j2";

const BUILD_SOURCE_PREFIX: &str = "build-src";
const MARKER_FILE: &str = ".touch";
const DOCKERFILE: &str = "Dockerfile";
const BASE_IMAGE_VARIABLE: &str = "conductor_base";

/// On-disk layout of the files baked into every conductor image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConductorAssets {
    root: Utf8PathBuf,
}

impl ConductorAssets {
    /// Describe the asset layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the assets.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Directory holding the build recipe template.
    #[must_use]
    pub fn templates_dir(&self) -> Utf8PathBuf {
        self.root.join("templates")
    }

    /// Bootstrap script installing the Python package manager.
    #[must_use]
    pub fn get_pip_script(&self) -> Utf8PathBuf {
        self.root.join("files").join("get-pip.py")
    }

    /// Source tree of the conductor program.
    #[must_use]
    pub fn conductor_source(&self) -> Utf8PathBuf {
        self.root.join("conductor")
    }

    /// Packaging script of the conductor program.
    #[must_use]
    pub fn setup_script(&self) -> Utf8PathBuf {
        self.root.join("conductor-setup.py")
    }

    /// Python requirements of the conductor program.
    #[must_use]
    pub fn requirements(&self) -> Utf8PathBuf {
        self.root.join("conductor-requirements.txt")
    }
}

/// Type of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextEntryKind {
    /// Regular file.
    File,
    /// Directory; its path ends with `/`.
    Directory,
    /// Symbolic link carried over from the conductor source tree.
    Symlink,
}

/// One entry of an assembled build context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    /// Path inside the archive.
    pub path: String,
    /// Entry type.
    pub kind: ContextEntryKind,
    /// Content length in bytes; zero for directories and links.
    pub size: u64,
}

/// A finalised build context ready to be sent to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    archive: Vec<u8>,
    manifest: Vec<ContextEntry>,
}

impl BuildContext {
    /// Tar archive bytes.
    #[must_use]
    pub fn archive(&self) -> &[u8] {
        &self.archive
    }

    /// Every archive entry, in archive order.
    #[must_use]
    pub fn manifest(&self) -> &[ContextEntry] {
        &self.manifest
    }

    /// Whether the archive holds an entry at `path`.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.manifest.iter().any(|entry| entry.path == path)
    }

    /// Hex-encoded SHA-256 of the archive bytes.
    #[must_use]
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.archive))
    }

    /// Consume the context, returning the archive bytes.
    #[must_use]
    pub fn into_archive(self) -> Vec<u8> {
        self.archive
    }
}

#[cfg(test)]
impl BuildContext {
    pub(crate) const fn from_archive(archive: Vec<u8>) -> Self {
        Self {
            archive,
            manifest: vec![],
        }
    }
}

/// Host-side origin of a staged entry.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StagedSource {
    File(Utf8PathBuf),
    Tree(Utf8PathBuf),
}

impl StagedSource {
    fn host_path(&self) -> &Utf8Path {
        match self {
            Self::File(path) | Self::Tree(path) => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StagedEntry {
    archive_path: String,
    source: StagedSource,
}

/// Ordered archive-path to source mapping.
///
/// Staging a path that is already present replaces the earlier source and
/// moves the entry to the end, so each archive path appears once.
#[derive(Debug, Default)]
struct StagedContext {
    entries: Vec<StagedEntry>,
}

impl StagedContext {
    fn insert(&mut self, path: impl Into<String>, source: StagedSource) {
        let archive_path: String = path.into();
        self.entries.retain(|entry| entry.archive_path != archive_path);
        self.entries.push(StagedEntry {
            archive_path,
            source,
        });
    }

    fn stage_file(
        &mut self,
        host_path: Utf8PathBuf,
        archive_path: &str,
    ) -> Result<(), BuildError> {
        require(&host_path, RequiredKind::File)?;
        self.insert(archive_path, StagedSource::File(host_path));
        Ok(())
    }

    fn stage_tree(
        &mut self,
        host_path: Utf8PathBuf,
        archive_path: &str,
    ) -> Result<(), BuildError> {
        require(&host_path, RequiredKind::Directory)?;
        self.insert(archive_path, StagedSource::Tree(host_path));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum RequiredKind {
    File,
    Directory,
}

fn require(path: &Utf8Path, kind: RequiredKind) -> Result<(), BuildError> {
    let missing = |message: String| BuildError::AssemblyFailed {
        path: path.as_std_path().to_path_buf(),
        message,
    };

    let metadata = path
        .metadata()
        .map_err(|error| missing(error.to_string()))?;

    match kind {
        RequiredKind::File if !metadata.is_file() => Err(missing(String::from("not a regular file"))),
        RequiredKind::Directory if !metadata.is_dir() => Err(missing(String::from("not a directory"))),
        RequiredKind::File | RequiredKind::Directory => Ok(()),
    }
}

/// Assembles conductor build contexts.
#[derive(Debug, Clone)]
pub struct ContextAssembler<R = PlaceholderRenderer> {
    assets: ConductorAssets,
    renderer: R,
    scratch_root: Option<Utf8PathBuf>,
}

impl ContextAssembler<PlaceholderRenderer> {
    /// Create an assembler using the built-in placeholder renderer.
    #[must_use]
    pub const fn new(assets: ConductorAssets) -> Self {
        Self::with_renderer(assets, PlaceholderRenderer)
    }
}

impl<R: TemplateRenderer> ContextAssembler<R> {
    /// Create an assembler with a custom template renderer.
    #[must_use]
    pub const fn with_renderer(assets: ConductorAssets, renderer: R) -> Self {
        Self {
            assets,
            renderer,
            scratch_root: None,
        }
    }

    /// Create scratch directories under `root` instead of the system
    /// temporary directory.
    #[must_use]
    pub fn with_scratch_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Asset layout used by this assembler.
    #[must_use]
    pub const fn assets(&self) -> &ConductorAssets {
        &self.assets
    }

    /// Assemble the conductor build context.
    ///
    /// Optional project configuration files are taken from `source_dir`; the
    /// recipe is rendered with `conductor_base` set to `base_image`.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::AssemblyFailed` when `source_dir` or a required
    /// asset is missing or unreadable, or when `base_image` is empty, and
    /// `BuildError::TemplateRenderFailed` when the recipe cannot be rendered.
    pub fn assemble(
        &self,
        source_dir: &Utf8Path,
        base_image: &str,
    ) -> Result<BuildContext, ConductorError> {
        if base_image.trim().is_empty() {
            return Err(ConductorError::from(BuildError::AssemblyFailed {
                path: source_dir.as_std_path().to_path_buf(),
                message: String::from("base image reference is empty"),
            }));
        }

        require(source_dir, RequiredKind::Directory)?;

        let scratch = self.create_scratch_dir()?;
        let scratch_path = utf8_path(scratch.path()).map_err(|error| {
            BuildError::AssemblyFailed {
                path: scratch.path().to_path_buf(),
                message: error.to_string(),
            }
        })?;

        let mut staged = StagedContext::default();
        for file_name in OPTIONAL_CONFIG_FILES {
            let host_path = source_dir.join(file_name);
            if host_path.is_file() {
                staged.insert(
                    format!("{BUILD_SOURCE_PREFIX}/{file_name}"),
                    StagedSource::File(host_path),
                );
            } else {
                tracing::debug!(file = file_name, "optional config file not present");
            }
        }

        let marker = scratch_path.join(MARKER_FILE);
        std::fs::write(&marker, b"").map_err(|error| BuildError::AssemblyFailed {
            path: marker.as_std_path().to_path_buf(),
            message: error.to_string(),
        })?;
        staged.insert(
            format!("{BUILD_SOURCE_PREFIX}/{MARKER_FILE}"),
            StagedSource::File(marker),
        );

        staged.stage_file(self.assets.get_pip_script(), "contrib/get-pip.py")?;
        staged.stage_tree(self.assets.conductor_source(), "conductor-src/conductor")?;
        staged.stage_file(self.assets.setup_script(), "conductor-src/setup.py")?;
        staged.stage_file(self.assets.requirements(), "conductor-src/requirements.txt")?;

        let templates_dir = self.assets.templates_dir();
        let variables = RenderVariables::new().with(BASE_IMAGE_VARIABLE, base_image);
        let dockerfile = self.renderer.render(
            &RenderRequest {
                template_dir: &templates_dir,
                template_name: CONDUCTOR_DOCKERFILE_TEMPLATE,
                output_dir: &scratch_path,
                output_name: DOCKERFILE,
            },
            &variables,
        )?;
        staged.insert(DOCKERFILE, StagedSource::File(dockerfile));

        let output = build_archive(&staged.entries, &scratch_path)?;
        scratch.close().map_err(|error| BuildError::AssemblyFailed {
            path: scratch_path.as_std_path().to_path_buf(),
            message: format!("failed to remove scratch directory: {error}"),
        })?;

        for entry in &output.manifest {
            tracing::debug!(
                path = %entry.path,
                kind = ?entry.kind,
                size = entry.size,
                "build context entry"
            );
        }

        Ok(BuildContext {
            archive: output.bytes,
            manifest: output.manifest,
        })
    }

    fn create_scratch_dir(&self) -> Result<tempfile::TempDir, BuildError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("conductor-build-");

        let result: io::Result<tempfile::TempDir> = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };

        result.map_err(|error| BuildError::AssemblyFailed {
            path: self
                .scratch_root
                .as_ref()
                .map_or_else(std::env::temp_dir, |root| root.as_std_path().to_path_buf()),
            message: format!("failed to create scratch directory: {error}"),
        })
    }
}
