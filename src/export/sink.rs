use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const GIF_MIME: &str = "image/gif";

/// Where a finished export ended up
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultLocation(PathBuf);

impl ResultLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn uri(&self) -> String {
        format!("file://{}", self.0.display())
    }
}

/// Destination for exported media
pub trait OutputSink: Send + Sync {
    /// Open a writable destination for content of `mime` type
    fn create(&self, mime: &str, display_name: &str) -> io::Result<(Box<dyn Write + Send>, ResultLocation)>;

    /// Remove a destination whose content is incomplete
    fn discard(&self, location: &ResultLocation) -> io::Result<()>;
}

/// Writes exports as files into one directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn extension_for(mime: &str) -> &str {
    match mime {
        GIF_MIME => "gif",
        "image/png" => "png",
        _ => "bin",
    }
}

impl OutputSink for DirectorySink {
    fn create(&self, mime: &str, display_name: &str) -> io::Result<(Box<dyn Write + Send>, ResultLocation)> {
        std::fs::create_dir_all(&self.dir)?;
        let file_name: String = display_name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let path = self
            .dir
            .join(format!("{}.{}", file_name, extension_for(mime)));
        let file = File::create(&path)?;
        log::debug!("Opened export destination {}", path.display());
        Ok((Box::new(BufWriter::new(file)), ResultLocation::new(path)))
    }

    fn discard(&self, location: &ResultLocation) -> io::Result<()> {
        match std::fs::remove_file(location.path()) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_sink_names_and_discards() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("out"));
        let (mut writer, location) = sink.create(GIF_MIME, "my message/1").unwrap();
        writer.write_all(b"GIF89a").unwrap();
        writer.flush().unwrap();
        drop(writer);

        assert_eq!(location.path(), dir.path().join("out").join("my_message_1.gif"));
        assert!(location.uri().starts_with("file://"));
        assert_eq!(std::fs::read(location.path()).unwrap(), b"GIF89a");

        sink.discard(&location).unwrap();
        assert!(!location.path().exists());
        sink.discard(&location).unwrap();
    }
}
