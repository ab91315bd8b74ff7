use std::fmt;
use std::path::Path;

use mime::Mime;
use serde::{Deserialize, Serialize};

use crate::errors::BackendError;

/// The category of an accepted upload.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Pdf,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Pdf => "pdf",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "image" => Some(FileKind::Image),
            "pdf" => Some(FileKind::Pdf),
            _ => None,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind and content type of an allowed file.
#[derive(Clone, Debug)]
pub struct MimeType {
    pub kind: FileKind,
    pub essence: Mime,
    pub extension: String,
}

impl MimeType {
    /// Classifies a filename by its extension. Only images and PDFs are
    /// accepted; anything else is a validation error.
    pub fn for_filename(filename: &str) -> Result<Self, BackendError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| BackendError::DisallowedFileType {
                filename: filename.to_owned(),
            })?;

        let (kind, essence) = match extension.as_str() {
            "pdf" => (FileKind::Pdf, mime::APPLICATION_PDF),
            "png" => (FileKind::Image, mime::IMAGE_PNG),
            "jpg" | "jpeg" => (FileKind::Image, mime::IMAGE_JPEG),
            "gif" => (FileKind::Image, mime::IMAGE_GIF),
            _ => {
                return Err(BackendError::DisallowedFileType {
                    filename: filename.to_owned(),
                })
            }
        };

        Ok(MimeType {
            kind,
            essence,
            extension,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{FileKind, MimeType};

    #[test]
    fn accepts_images_and_pdfs() {
        let pdf = MimeType::for_filename("cartao.PDF").unwrap();
        assert_eq!(pdf.kind, FileKind::Pdf);
        assert_eq!(pdf.essence.as_ref(), "application/pdf");

        let jpeg = MimeType::for_filename("rex.jpeg").unwrap();
        assert_eq!(jpeg.kind, FileKind::Image);
        assert_eq!(jpeg.essence.as_ref(), "image/jpeg");
    }

    #[test]
    fn rejects_everything_else() {
        assert!(MimeType::for_filename("notes.docx").is_err());
        assert!(MimeType::for_filename("pdf").is_err());
        assert!(MimeType::for_filename("archive.pdf.exe").is_err());
    }
}
