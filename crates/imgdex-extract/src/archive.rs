//! Embedded image extraction from office archives.
//!
//! `.docx` and `.pptx` files are zip archives; their pictures live under a
//! fixed media folder. Entries are read one at a time so a large
//! presentation never has to sit in memory as a whole.

use imgdex_core::{ArchiveEntry, ContainerKind, ExtractError, is_image_extension, normalized_extension};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zip::ZipArchive;

/// Lazy iterator over the image entries under a container's media folder.
///
/// Directories, entries outside the media folder and media files that are
/// not images are skipped. After the first read error the iterator yields
/// that error and then ends.
pub struct MediaEntries<R> {
    archive: ZipArchive<R>,
    kind: ContainerKind,
    position: usize,
    failed: bool,
}

impl<R: Read + Seek> MediaEntries<R> {
    /// Open the zip directory of `reader`.
    pub fn new(reader: R, kind: ContainerKind) -> zip::result::ZipResult<Self> {
        Ok(Self {
            archive: ZipArchive::new(reader)?,
            kind,
            position: 0,
            failed: false,
        })
    }
}

impl MediaEntries<BufReader<File>> {
    /// Open the archive at `path`.
    pub fn open(path: &Path, kind: ContainerKind) -> Result<Self, ExtractError> {
        let open_error = |reason: String| ExtractError::Open {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| open_error(e.to_string()))?;
        Self::new(BufReader::new(file), kind).map_err(|e| open_error(e.to_string()))
    }
}

impl<R: Read + Seek> Iterator for MediaEntries<R> {
    type Item = Result<ArchiveEntry, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while self.position < self.archive.len() {
            let index = self.position;
            self.position += 1;
            match read_media_entry(&mut self.archive, index, self.kind) {
                None => {}
                Some(Ok(entry)) => return Some(Ok(entry)),
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

/// Read entry `index` if it is an image in the media folder.
fn read_media_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
    kind: ContainerKind,
) -> Option<Result<ArchiveEntry, ExtractError>> {
    let mut file = match archive.by_index(index) {
        Ok(file) => file,
        Err(e) => {
            return Some(Err(ExtractError::Entry {
                name: format!("#{index}"),
                reason: e.to_string(),
            }));
        }
    };
    if file.is_dir() {
        return None;
    }

    let name = file.name().to_string();
    let relative = name.strip_prefix(kind.media_prefix())?;
    if relative.is_empty() {
        return None;
    }
    let Some(extension) = normalized_extension(Path::new(relative)).filter(|e| is_image_extension(e))
    else {
        debug!("Skipping non-image media entry {}", name);
        return None;
    };

    let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or_default());
    if let Err(e) = file.read_to_end(&mut data) {
        return Some(Err(ExtractError::Entry {
            name,
            reason: e.to_string(),
        }));
    }
    Some(Ok(ArchiveEntry {
        name,
        extension,
        data,
    }))
}

/// Streams embedded images out of container archives.
///
/// The zip is read on the blocking pool and entries are handed over through
/// a bounded channel, so at most `capacity` decoded entries are buffered at
/// any time.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveExtractor {
    capacity: usize,
}

impl ArchiveExtractor {
    /// Entries buffered between the reader and the consumer by default.
    pub const DEFAULT_CAPACITY: usize = 4;

    /// Create an extractor with the default buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create an extractor buffering up to `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }

    /// Start extracting the images of the archive at `path`.
    ///
    /// An archive that cannot be opened yields a single
    /// [`ExtractError::Open`].
    pub fn images(&self, path: &Path, kind: ContainerKind) -> ArchiveImages {
        let (tx, rx) = mpsc::channel(self.capacity);
        let path = path.to_path_buf();
        let reader = tokio::task::spawn_blocking(move || read_archive(&path, kind, &tx));
        ArchiveImages {
            rx,
            reader: Some(reader),
        }
    }
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn read_archive(
    path: &Path,
    kind: ContainerKind,
    tx: &mpsc::Sender<Result<ArchiveEntry, ExtractError>>,
) {
    let entries = match MediaEntries::open(path, kind) {
        Ok(entries) => entries,
        Err(e) => {
            let _ = tx.blocking_send(Err(e));
            return;
        }
    };

    let mut sent = 0usize;
    for entry in entries {
        let failed = entry.is_err();
        if tx.blocking_send(entry).is_err() {
            debug!("Extraction of {:?} abandoned by consumer", path);
            return;
        }
        if failed {
            warn!("Extraction of {:?} stopped after {} images", path, sent);
            return;
        }
        sent += 1;
    }
    debug!("Read {} {} images from {:?}", sent, kind, path);
}

/// Receiving end of an [`ArchiveExtractor::images`] call.
pub struct ArchiveImages {
    rx: mpsc::Receiver<Result<ArchiveEntry, ExtractError>>,
    reader: Option<JoinHandle<()>>,
}

impl ArchiveImages {
    /// Next embedded image, or `None` once the archive is exhausted.
    pub async fn next(&mut self) -> Option<Result<ArchiveEntry, ExtractError>> {
        if let Some(entry) = self.rx.recv().await {
            return Some(entry);
        }
        // Channel closed: surface a panicked reader instead of a silent end.
        let reader = self.reader.take()?;
        match reader.await {
            Ok(()) => None,
            Err(e) => Some(Err(ExtractError::Entry {
                name: "<reader>".to_string(),
                reason: e.to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn build_archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            if name.ends_with('/') {
                writer
                    .add_directory(name.trim_end_matches('/'), options)
                    .unwrap();
            } else {
                writer
                    .start_file(*name, options)
                    .unwrap();
                writer.write_all(data.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    /// Flip the leading data bytes of a stored entry so its checksum fails.
    fn corrupt_entry(archive: &mut [u8], name: &str) {
        let at = archive
            .windows(name.len())
            .position(|w| w == name.as_bytes())
            .unwrap();
        let header = at - 30;
        assert_eq!(&archive[header..header + 4], b"PK\x03\x04");
        let extra = u16::from_le_bytes([archive[header + 28], archive[header + 29]]) as usize;
        let data = at + name.len() + extra;
        for byte in &mut archive[data..data + 20] {
            *byte ^= 0xff;
        }
    }

    fn docx_fixture() -> Vec<u8> {
        build_archive(&[
            ("[Content_Types].xml", "<Types/>"),
            ("word/document.xml", "<w:document/>"),
            ("word/media/", ""),
            ("word/media/image1.png", "png-bytes"),
            ("word/media/image2.JPEG", "jpeg-bytes"),
            ("word/media/chart.emf", "emf-bytes"),
            ("ppt/media/stray.png", "wrong-folder"),
        ])
    }

    #[test]
    fn test_media_entries_filters_docx() {
        let entries: Vec<ArchiveEntry> =
            MediaEntries::new(Cursor::new(docx_fixture()), ContainerKind::Docx)
                .unwrap()
                .collect::<Result<_, _>>()
                .unwrap();

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["word/media/image1.png", "word/media/image2.JPEG"]);
        assert_eq!(entries[0].extension, "png");
        assert_eq!(entries[0].data, b"png-bytes");
        assert_eq!(entries[1].extension, "jpeg");
    }

    #[test]
    fn test_media_entries_uses_pptx_folder() {
        let data = build_archive(&[
            ("ppt/slides/slide1.xml", "<p:sld/>"),
            ("ppt/media/image1.bmp", "bmp"),
            ("word/media/image9.png", "ignored"),
        ]);

        let entries: Vec<ArchiveEntry> = MediaEntries::new(Cursor::new(data), ContainerKind::Pptx)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "ppt/media/image1.bmp");
    }

    #[test]
    fn test_media_entries_archive_without_media() {
        let data = build_archive(&[("word/document.xml", "<w:document/>")]);
        let mut entries = MediaEntries::new(Cursor::new(data), ContainerKind::Docx).unwrap();
        assert!(entries.next().is_none());
    }

    #[test]
    fn test_media_entries_stops_after_unreadable_entry() {
        let mut data = build_archive(&[
            ("word/media/image1.png", "first-image-payload-bytes"),
            ("word/media/image2.png", "second-image-payload-bytes"),
            ("word/media/image3.png", "third-image-payload-bytes"),
        ]);
        corrupt_entry(&mut data, "word/media/image2.png");

        let mut entries = MediaEntries::new(Cursor::new(data), ContainerKind::Docx).unwrap();

        let first = entries.next().unwrap().unwrap();
        assert_eq!(first.name, "word/media/image1.png");
        assert_eq!(first.data, b"first-image-payload-bytes");
        assert!(matches!(
            entries.next(),
            Some(Err(ExtractError::Entry { name, .. })) if name == "word/media/image2.png"
        ));
        assert!(entries.next().is_none());
    }

    #[tokio::test]
    async fn test_extractor_streams_images_before_unreadable_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.docx");
        let mut data = build_archive(&[
            ("word/media/image1.png", "first-image-payload-bytes"),
            ("word/media/image2.png", "second-image-payload-bytes"),
        ]);
        corrupt_entry(&mut data, "word/media/image2.png");
        std::fs::write(&path, data).unwrap();

        let mut images = ArchiveExtractor::new().images(&path, ContainerKind::Docx);
        assert!(images.next().await.unwrap().is_ok());
        assert!(matches!(
            images.next().await,
            Some(Err(ExtractError::Entry { .. }))
        ));
        assert!(images.next().await.is_none());
    }

    #[test]
    fn test_media_entries_rejects_non_zip() {
        let result = MediaEntries::new(Cursor::new(b"not a zip".to_vec()), ContainerKind::Docx);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_extractor_streams_images() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.docx");
        std::fs::write(&path, docx_fixture()).unwrap();

        let mut images = ArchiveExtractor::with_capacity(1).images(&path, ContainerKind::Docx);
        let mut names = Vec::new();
        while let Some(entry) = images.next().await {
            names.push(entry.unwrap().name);
        }
        assert_eq!(names.len(), 2);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_extractor_corrupt_archive_yields_open_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, "PK garbage").unwrap();

        let mut images = ArchiveExtractor::new().images(&path, ContainerKind::Docx);
        let first = images.next().await.unwrap();
        assert!(matches!(first, Err(ExtractError::Open { .. })));
        assert!(images.next().await.is_none());
    }

    #[tokio::test]
    async fn test_extractor_missing_file_yields_open_error() {
        let dir = tempdir().unwrap();
        let mut images =
            ArchiveExtractor::new().images(&dir.path().join("gone.pptx"), ContainerKind::Pptx);
        assert!(matches!(
            images.next().await,
            Some(Err(ExtractError::Open { .. }))
        ));
    }

    #[tokio::test]
    async fn test_dropping_consumer_stops_reader() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("many.pptx");
        let names: Vec<String> = (0..32).map(|i| format!("ppt/media/image{i}.png")).collect();
        let entries: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "pixels")).collect();
        std::fs::write(&path, build_archive(&entries)).unwrap();

        let mut images = ArchiveExtractor::with_capacity(1).images(&path, ContainerKind::Pptx);
        assert!(images.next().await.unwrap().is_ok());
        drop(images);
    }
}
