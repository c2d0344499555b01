use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::UploaderError;

/// Where the payload bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// A payload plus its declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    source: MediaSource,
    mimetype: String,
}

impl Media {
    pub fn from_bytes(data: impl Into<Vec<u8>>, mimetype: impl Into<String>) -> Self {
        Self {
            source: MediaSource::Bytes(data.into()),
            mimetype: mimetype.into(),
        }
    }

    pub fn from_file(path: impl Into<PathBuf>, mimetype: impl Into<String>) -> Self {
        Self {
            source: MediaSource::File(path.into()),
            mimetype: mimetype.into(),
        }
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    /// Human-readable origin, used in log lines and errors.
    pub fn describe(&self) -> String {
        match &self.source {
            MediaSource::Bytes(data) => format!("<{} in-memory bytes>", data.len()),
            MediaSource::File(path) => path.display().to_string(),
        }
    }

    /// Check the payload is still there: the file exists and is a regular
    /// file, or the buffer is non-empty.
    pub fn ensure_available(&self) -> Result<(), UploaderError> {
        match &self.source {
            MediaSource::Bytes(data) if data.is_empty() => Err(UploaderError::NotFound(
                "media buffer is empty".to_string(),
            )),
            MediaSource::Bytes(_) => Ok(()),
            MediaSource::File(path) if path.is_file() => Ok(()),
            MediaSource::File(path) => Err(UploaderError::NotFound(format!(
                "media file does not exist: {}",
                path.display()
            ))),
        }
    }

    /// Total payload size in bytes.
    pub fn len(&self) -> io::Result<u64> {
        match &self.source {
            MediaSource::Bytes(data) => Ok(data.len() as u64),
            MediaSource::File(path) => Ok(std::fs::metadata(path)?.len()),
        }
    }

    /// Up to `len` bytes starting at `offset`, as a reader that knows its
    /// exact length. File chunks stream from disk, so even a whole-payload
    /// chunk of a large video is never held in memory.
    pub fn chunk(&self, offset: u64, len: u64) -> io::Result<MediaChunk> {
        match &self.source {
            MediaSource::Bytes(data) => {
                let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
                let end = start
                    .saturating_add(usize::try_from(len).unwrap_or(usize::MAX))
                    .min(data.len());
                let part = data[start..end].to_vec();
                Ok(MediaChunk {
                    len: part.len() as u64,
                    reader: Box::new(Cursor::new(part)),
                })
            }
            MediaSource::File(path) => {
                let mut file = File::open(path)?;
                let size = file.metadata()?.len();
                let len = len.min(size.saturating_sub(offset));
                file.seek(SeekFrom::Start(offset))?;
                Ok(MediaChunk {
                    len,
                    reader: Box::new(BufReader::new(file).take(len)),
                })
            }
        }
    }
}

/// A byte range of a [`Media`] payload.
pub struct MediaChunk {
    len: u64,
    reader: Box<dyn Read + Send>,
}

impl MediaChunk {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Read for MediaChunk {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Guess an image MIME type from a file extension.
pub fn guess_image_mimetype(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn read_chunk(media: &Media, offset: u64, len: u64) -> Vec<u8> {
        let mut chunk = media.chunk(offset, len).unwrap();
        let mut buf = Vec::new();
        chunk.read_to_end(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, chunk.len());
        buf
    }

    #[test]
    fn test_chunk_bytes() {
        let media = Media::from_bytes(vec![1u8, 2, 3, 4, 5], "video/mp4");
        assert_eq!(media.len().unwrap(), 5);
        assert_eq!(read_chunk(&media, 1, 3), vec![2, 3, 4]);
        assert_eq!(read_chunk(&media, 3, 10), vec![4, 5]);
        assert!(media.chunk(9, 2).unwrap().is_empty());
        assert_eq!(read_chunk(&media, 0, u64::MAX), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_chunk_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");

        let data: Vec<u8> = (0..5000).map(|i| (i % 256) as u8).collect();
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(&data).unwrap();
        }

        let media = Media::from_file(&path, "video/mp4");
        assert_eq!(media.len().unwrap(), 5000);

        let mut reassembled = Vec::new();
        let mut offset = 0u64;
        while offset < 5000 {
            let part = read_chunk(&media, offset, 2000);
            offset += part.len() as u64;
            reassembled.extend_from_slice(&part);
        }
        assert_eq!(reassembled, data);

        // Whole-payload chunk reports the real size, not the requested one
        let whole = media.chunk(0, u64::MAX).unwrap();
        assert_eq!(whole.len(), 5000);
        assert_eq!(media.chunk(4000, u64::MAX).unwrap().len(), 1000);
        assert!(media.chunk(6000, 10).unwrap().is_empty());
    }

    #[test]
    fn test_ensure_available() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Media::from_file(dir.path().join("gone.mp4"), "video/mp4");
        assert!(matches!(
            missing.ensure_available(),
            Err(UploaderError::NotFound(_))
        ));

        // A directory is not a playable source
        let folder = Media::from_file(dir.path(), "video/mp4");
        assert!(folder.ensure_available().is_err());

        let empty = Media::from_bytes(Vec::new(), "video/mp4");
        assert!(matches!(empty.ensure_available(), Err(UploaderError::NotFound(_))));

        assert!(Media::from_bytes(vec![0u8; 4], "video/mp4")
            .ensure_available()
            .is_ok());
    }

    #[test]
    fn test_guess_image_mimetype() {
        assert_eq!(guess_image_mimetype(Path::new("a.JPG")), Some("image/jpeg"));
        assert_eq!(guess_image_mimetype(Path::new("a.png")), Some("image/png"));
        assert_eq!(guess_image_mimetype(Path::new("a.gif")), None);
        assert_eq!(guess_image_mimetype(Path::new("noext")), None);
    }
}
