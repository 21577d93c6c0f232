//! Routing of inbox files by extension.

use imgdex_core::{ContainerKind, FileKind, IMAGE_EXTENSIONS, normalized_extension};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Maps lower-cased file extensions to a [`FileKind`].
///
/// Matching is case-insensitive: `Photo.JPG` is an image, `Deck.PPTX` a
/// presentation. Files without an extension are unsupported.
#[derive(Debug, Clone)]
pub struct Classifier {
    images: HashSet<String>,
    containers: HashMap<String, ContainerKind>,
}

impl Classifier {
    /// Classifier for the standard image and container extensions.
    #[must_use]
    pub fn new() -> Self {
        let mut classifier = Self::empty();
        for ext in IMAGE_EXTENSIONS {
            classifier.register_image(ext);
        }
        for kind in [ContainerKind::Docx, ContainerKind::Pptx] {
            classifier.register_container(kind.extension(), kind);
        }
        classifier
    }

    /// Classifier that recognizes nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            images: HashSet::new(),
            containers: HashMap::new(),
        }
    }

    /// Treat `ext` as a bare image.
    pub fn register_image(&mut self, ext: &str) {
        self.images.insert(normalize(ext));
    }

    /// Treat `ext` as a container of the given kind.
    pub fn register_container(&mut self, ext: &str, kind: ContainerKind) {
        self.containers.insert(normalize(ext), kind);
    }

    /// Decide how `path` is handled.
    #[must_use]
    pub fn classify(&self, path: &Path) -> FileKind {
        let Some(ext) = normalized_extension(path) else {
            return FileKind::Unsupported;
        };
        if self.images.contains(&ext) {
            return FileKind::Image(ext);
        }
        self.containers
            .get(&ext)
            .map_or(FileKind::Unsupported, |kind| FileKind::Container(*kind))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}
