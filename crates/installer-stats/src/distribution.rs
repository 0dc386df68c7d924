//! Installer distribution.
//!
//! Two installer builds live at fixed locations under a base directory chosen at
//! construction time:
//!
//! ```text
//! <base>/32/7z2600.exe
//! <base>/64/7z2600-x64.exe
//! ```
//!
//! [`Distributor`] resolves a selector (`"32"` or `"64"`) to one of them and reads it,
//! or reports which builds are currently present.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::DistributionError;

/// Route under which installers are served.
pub const DOWNLOAD_ROUTE: &str = "/download";

/// Installer architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    /// 32-bit build.
    X32,
    /// 64-bit build.
    X64,
}

impl Architecture {
    /// Both architectures, 32-bit first.
    pub const ALL: [Self; 2] = [Self::X32, Self::X64];

    /// Parse a client selector.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError::InvalidSelector`] for anything but `"32"` or `"64"`.
    pub fn from_selector(selector: &str) -> Result<Self, DistributionError> {
        match selector {
            "32" => Ok(Self::X32),
            "64" => Ok(Self::X64),
            other => Err(DistributionError::InvalidSelector(other.to_string())),
        }
    }

    /// The selector token for this architecture.
    #[must_use]
    pub fn selector(self) -> &'static str {
        match self {
            Self::X32 => "32",
            Self::X64 => "64",
        }
    }

    /// Subdirectory of the base directory holding this build.
    #[must_use]
    pub fn subdir(self) -> &'static str {
        self.selector()
    }

    /// Installer file name for this build.
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::X32 => "7z2600.exe",
            Self::X64 => "7z2600-x64.exe",
        }
    }

    /// Relative download link for this build.
    #[must_use]
    pub fn download_link(self) -> String {
        format!("{DOWNLOAD_ROUTE}/{}", self.selector())
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.selector())
    }
}

/// An installer that was found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installer {
    /// Which build this is.
    pub arch: Architecture,
    /// File name sent to the client.
    pub file_name: &'static str,
    /// Location on disk.
    pub path: PathBuf,
}

/// A fully read installer, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// File name sent to the client.
    pub file_name: &'static str,
    /// File contents.
    pub content: Vec<u8>,
}

impl Download {
    /// `Content-Disposition` header value naming the installer as an attachment.
    #[must_use]
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.file_name)
    }
}

/// Whether an installer is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Present on disk.
    Available,
    /// Missing, or could not be checked.
    Unavailable,
}

/// One value per architecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerArchitecture<T> {
    /// 32-bit value.
    pub x32: T,
    /// 64-bit value.
    pub x64: T,
}

/// Snapshot of which installers can be downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    /// Human-readable heading.
    pub message: String,
    /// Presence of each build.
    pub files: PerArchitecture<FileStatus>,
    /// Absolute path searched for each build.
    pub paths: PerArchitecture<PathBuf>,
    /// Download link for each present build, `null` otherwise.
    pub download_links: PerArchitecture<Option<String>>,
}

impl Availability {
    /// Presence of the given build.
    #[must_use]
    pub fn status(&self, arch: Architecture) -> FileStatus {
        match arch {
            Architecture::X32 => self.files.x32,
            Architecture::X64 => self.files.x64,
        }
    }
}

/// Resolves selectors to installers under a fixed base directory.
#[derive(Debug, Clone)]
pub struct Distributor {
    base_dir: PathBuf,
}

impl Distributor {
    /// Create a distributor rooted at `base_dir`.
    ///
    /// A relative `base_dir` is made absolute against the current directory once, here.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let base_dir = std::path::absolute(&base_dir).unwrap_or(base_dir);
        Self { base_dir }
    }

    /// The base directory installers are looked up under.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Where the given build is expected on disk.
    #[must_use]
    pub fn path_for(&self, arch: Architecture) -> PathBuf {
        self.base_dir.join(arch.subdir()).join(arch.file_name())
    }

    /// Resolve a selector to an installer that exists on disk.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError::InvalidSelector`] for an unknown selector and
    /// [`DistributionError::FileNotFound`] when the installer is absent.
    pub async fn resolve(&self, selector: &str) -> Result<Installer, DistributionError> {
        let arch = Architecture::from_selector(selector)?;
        let path = self.path_for(arch);
        debug!("Looking for {} installer at {}", arch, path.display());

        if !is_present(&path).await {
            warn!("{} installer not found at {}", arch, path.display());
            return Err(not_found(arch, path));
        }

        Ok(Installer {
            arch,
            file_name: arch.file_name(),
            path,
        })
    }

    /// Resolve a selector and read the whole installer.
    ///
    /// The file is read completely before returning, so a caller never sees a
    /// partial transfer reported as success.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Distributor::resolve`], plus
    /// [`DistributionError::TransferFailure`] if reading the file fails.
    pub async fn fetch(&self, selector: &str) -> Result<Download, DistributionError> {
        let installer = self.resolve(selector).await?;

        let content = match tokio::fs::read(&installer.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(not_found(installer.arch, installer.path));
            }
            Err(source) => {
                return Err(DistributionError::TransferFailure {
                    path: installer.path,
                    source,
                });
            }
        };

        info!(
            "Serving {} ({}), {} bytes",
            installer.file_name,
            installer.arch,
            content.len()
        );
        Ok(Download {
            file_name: installer.file_name,
            content,
        })
    }

    /// Report which installers are present.
    ///
    /// Never fails: a path that cannot be checked counts as unavailable.
    pub async fn list_available(&self) -> Availability {
        let (x32_status, x32_path) = self.locate(Architecture::X32).await;
        let (x64_status, x64_path) = self.locate(Architecture::X64).await;

        let link = |arch: Architecture, status: FileStatus| {
            (status == FileStatus::Available).then(|| arch.download_link())
        };

        Availability {
            message: "Installers available for download:".to_string(),
            files: PerArchitecture {
                x32: x32_status,
                x64: x64_status,
            },
            download_links: PerArchitecture {
                x32: link(Architecture::X32, x32_status),
                x64: link(Architecture::X64, x64_status),
            },
            paths: PerArchitecture {
                x32: x32_path,
                x64: x64_path,
            },
        }
    }

    async fn locate(&self, arch: Architecture) -> (FileStatus, PathBuf) {
        let path = self.path_for(arch);
        let status = if is_present(&path).await {
            FileStatus::Available
        } else {
            FileStatus::Unavailable
        };
        (status, path)
    }
}

async fn is_present(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_file())
}

fn not_found(arch: Architecture, path: PathBuf) -> DistributionError {
    DistributionError::FileNotFound {
        file_name: arch.file_name(),
        subdir: arch.subdir(),
        path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place_installer(base: &Path, arch: Architecture, content: &[u8]) -> PathBuf {
        let dir = base.join(arch.subdir());
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(arch.file_name());
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_from_selector() {
        assert_eq!(Architecture::from_selector("32").unwrap(), Architecture::X32);
        assert_eq!(Architecture::from_selector("64").unwrap(), Architecture::X64);

        for bad in ["99", "", "x64", " 32", "64 "] {
            assert!(matches!(
                Architecture::from_selector(bad),
                Err(DistributionError::InvalidSelector(_))
            ));
        }
    }

    #[test]
    fn test_fixed_layout() {
        let distributor = Distributor::new("/srv/installers");
        assert_eq!(
            distributor.path_for(Architecture::X32),
            PathBuf::from("/srv/installers/32/7z2600.exe")
        );
        assert_eq!(
            distributor.path_for(Architecture::X64),
            PathBuf::from("/srv/installers/64/7z2600-x64.exe")
        );
    }

    #[test]
    fn test_relative_base_dir_is_made_absolute() {
        let distributor = Distributor::new("installers");
        assert!(distributor.base_dir().is_absolute());
        assert!(distributor.base_dir().ends_with("installers"));
    }

    #[test]
    fn test_content_disposition() {
        let download = Download {
            file_name: "7z2600.exe",
            content: Vec::new(),
        };
        assert_eq!(
            download.content_disposition(),
            "attachment; filename=\"7z2600.exe\""
        );
    }

    #[tokio::test]
    async fn test_fetch_existing_installer() {
        let dir = tempfile::tempdir().unwrap();
        place_installer(dir.path(), Architecture::X32, b"MZ-32-bit");
        let distributor = Distributor::new(dir.path());

        let download = distributor.fetch("32").await.unwrap();
        assert_eq!(download.file_name, "7z2600.exe");
        assert_eq!(download.content, b"MZ-32-bit");
    }

    #[tokio::test]
    async fn test_fetch_missing_installer_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let distributor = Distributor::new(dir.path());

        let err = distributor.fetch("64").await.unwrap_err();
        match err {
            DistributionError::FileNotFound { path, file_name, .. } => {
                assert_eq!(path, distributor.path_for(Architecture::X64));
                assert_eq!(file_name, "7z2600-x64.exe");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_invalid_selector() {
        let dir = tempfile::tempdir().unwrap();
        let distributor = Distributor::new(dir.path());

        let err = distributor.fetch("99").await.unwrap_err();
        assert!(matches!(err, DistributionError::InvalidSelector(s) if s == "99"));
    }

    #[tokio::test]
    async fn test_directory_in_place_of_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("32").join("7z2600.exe")).unwrap();
        let distributor = Distributor::new(dir.path());

        let err = distributor.resolve("32").await.unwrap_err();
        assert!(matches!(err, DistributionError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_available_only_64() {
        let dir = tempfile::tempdir().unwrap();
        place_installer(dir.path(), Architecture::X64, b"MZ-64-bit");
        let distributor = Distributor::new(dir.path());

        let availability = distributor.list_available().await;

        assert_eq!(availability.status(Architecture::X32), FileStatus::Unavailable);
        assert_eq!(availability.status(Architecture::X64), FileStatus::Available);
        assert_eq!(availability.download_links.x32, None);
        assert_eq!(
            availability.download_links.x64.as_deref(),
            Some("/download/64")
        );
        assert_eq!(
            availability.paths.x32,
            distributor.path_for(Architecture::X32)
        );
        assert!(availability.paths.x64.is_absolute());
    }

    #[tokio::test]
    async fn test_list_available_serializes_null_links() {
        let dir = tempfile::tempdir().unwrap();
        let distributor = Distributor::new(dir.path());

        let json = serde_json::to_value(distributor.list_available().await).unwrap();
        assert_eq!(json["files"]["x32"], "unavailable");
        assert_eq!(json["files"]["x64"], "unavailable");
        assert!(json["download_links"]["x32"].is_null());
        assert!(json["download_links"]["x64"].is_null());
    }

    #[tokio::test]
    async fn test_list_available_missing_base_dir() {
        let distributor = Distributor::new("/definitely/not/a/real/base/dir");
        let availability = distributor.list_available().await;

        assert_eq!(availability.files.x32, FileStatus::Unavailable);
        assert_eq!(availability.files.x64, FileStatus::Unavailable);
    }
}
