//! Atomic target file persistence

use node_targets_core::{render_targets, NodeRecord};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Target file write errors
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("IO error writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to replace {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

/// Writes the rendered membership to the target file.
///
/// Content is written to a temporary file next to the target and renamed
/// over it, so readers see either the previous file or the new one.
pub struct TargetFileWriter {
    path: PathBuf,
    port: u16,
}

impl TargetFileWriter {
    pub fn new(path: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            path: path.into(),
            port,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Render `records` and atomically replace the target file.
    ///
    /// Returns the number of bytes written.
    pub fn write<'a, I>(&self, records: I) -> Result<usize, WriteError>
    where
        I: IntoIterator<Item = &'a NodeRecord>,
    {
        let rendered = render_targets(records, self.port);
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let io_err = |source| WriteError::Io {
            path: self.path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(rendered.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        set_readable(tmp.as_file()).map_err(io_err)?;

        tmp.persist(&self.path).map_err(|source| WriteError::Persist {
            path: self.path.clone(),
            source,
        })?;
        sync_dir(dir).map_err(io_err)?;

        debug!(path = %self.path.display(), bytes = rendered.len(), "Target file written");
        Ok(rendered.len())
    }
}

/// Temp files are created 0600; the scraper may run as another user
#[cfg(unix)]
fn set_readable(file: &std::fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_readable(_file: &std::fs::File) -> std::io::Result<()> {
    Ok(())
}

/// Flush the directory entry so the rename survives a crash
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_targets_core::{NodeAddress, NodeIdentity};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn node(name: &str, addr: &str) -> NodeRecord {
        NodeRecord::new(
            NodeIdentity::new("ns1", name),
            vec![NodeAddress::new("InternalIP", addr)],
        )
        .unwrap()
    }

    #[test]
    fn test_write_and_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nodes.yml");
        let writer = TargetFileWriter::new(&path, 9100);

        let nodes = vec![node("a", "10.0.0.1"), node("b", "10.0.0.2")];
        writer.write(&nodes).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "- targets:\n  - 10.0.0.1:9100\n  - 10.0.0.2:9100\n"
        );

        writer.write(&nodes[1..]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "- targets:\n  - 10.0.0.2:9100\n"
        );

        // only the target remains; no temp files left behind
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_empty_membership_is_valid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nodes.yml");
        let writer = TargetFileWriter::new(&path, 10255);

        let written = writer.write(std::iter::empty()).unwrap();
        assert_eq!(written, "- targets:\n".len());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "- targets:\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("nodes.yml");
        TargetFileWriter::new(&path, 10255)
            .write(std::iter::empty())
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn test_sync_dir() {
        let dir = tempdir().unwrap();
        assert!(sync_dir(dir.path()).is_ok());
        assert!(sync_dir(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_missing_directory_fails_without_touching_target() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("nodes.yml");
        let writer = TargetFileWriter::new(&path, 10255);

        assert!(matches!(
            writer.write(std::iter::empty()),
            Err(WriteError::Io { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_reader_never_sees_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nodes.yml");
        let writer = TargetFileWriter::new(&path, 9100);

        let small = vec![node("a", "10.0.0.1")];
        let large: Vec<_> = (0..500)
            .map(|i| node(&format!("n{i:03}"), &format!("10.1.{}.{}", i / 250, i % 250)))
            .collect();
        let small_text = render_targets(&small, 9100);
        let large_text = render_targets(&large, 9100);

        writer.write(&small).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let done = done.clone();
            let path = path.clone();
            std::thread::spawn(move || {
                let mut reads = 0usize;
                loop {
                    let content = std::fs::read_to_string(&path).unwrap();
                    assert!(
                        content == small_text || content == large_text,
                        "partial read of {} bytes",
                        content.len()
                    );
                    reads += 1;
                    if done.load(Ordering::Acquire) {
                        return reads;
                    }
                }
            })
        };

        for i in 0..200 {
            if i % 2 == 0 {
                writer.write(&large).unwrap();
            } else {
                writer.write(&small).unwrap();
            }
        }
        done.store(true, Ordering::Release);

        assert!(reader.join().unwrap() > 0);
    }
}
