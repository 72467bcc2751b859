use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ACCEPTED_IMAGE_EXTENSIONS: [&str; 4] = ["jpeg", "jpg", "png", "svg"];

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum FileRejection {
    #[error("No files were provided")]
    NoFiles,
    #[error("Unsupported file type: {}", .0.display())]
    UnsupportedType(PathBuf),
}

/// An image file that passed the upload filter.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AcceptedFile {
    pub path: PathBuf,
    pub mime: String,
}

impl AcceptedFile {
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            ACCEPTED_IMAGE_EXTENSIONS
                .iter()
                .any(|accepted| extension.eq_ignore_ascii_case(accepted))
        })
}

/// Filters dropped files down to the image types posts may carry.
///
/// The whole drop is rejected if any file is not an accepted image.
pub fn accept_files<I, P>(paths: I) -> Result<Vec<AcceptedFile>, FileRejection>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let accepted = paths
        .into_iter()
        .map(Into::into)
        .map(|path| {
            if !has_image_extension(&path) {
                return Err(FileRejection::UnsupportedType(path));
            }
            let mime = mime_guess::from_path(&path)
                .first_or_octet_stream()
                .essence_str()
                .to_owned();

            Ok(AcceptedFile { path, mime })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if accepted.is_empty() {
        return Err(FileRejection::NoFiles);
    }

    Ok(accepted)
}
