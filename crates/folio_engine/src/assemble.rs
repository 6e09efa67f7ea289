use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_error, engine_info};

use crate::filename::compare_page_names;
use crate::format::is_page_extension;
use crate::pdf::{PageImage, PdfBuilder, PdfError};
use crate::persist::{split_output_path, AtomicFileWriter, PersistError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleSummary {
    pub output_path: PathBuf,
    pub page_count: usize,
    pub pages: Vec<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("image folder {0:?} does not exist or is not a directory")]
    MissingFolder(PathBuf),
    #[error("cannot read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no .jpg/.jpeg/.png/.gif/.webp images found in {0:?}")]
    EmptySet(PathBuf),
    #[error("cannot decode {path:?}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("cannot write output document: {0}")]
    Write(#[from] PersistError),
    #[error("cannot encode output document: {0}")]
    Encode(String),
}

/// Lists page images directly inside `folder`, in page order.
pub fn collect_image_set(folder: &Path) -> Result<Vec<PathBuf>, AssembleError> {
    if !folder.is_dir() {
        return Err(AssembleError::MissingFolder(folder.to_path_buf()));
    }
    let read_err = |source: io::Error| AssembleError::Read {
        path: folder.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(folder).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if !path.is_file() {
            continue;
        }
        let eligible = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(is_page_extension);
        if !eligible {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort_by(|a, b| compare_page_names(a, b));

    Ok(names.into_iter().map(|name| folder.join(name)).collect())
}

/// Merges the folder's images into one PDF at `output`, one image per page.
///
/// Any file that fails to decode aborts the whole assembly and nothing is
/// written.
pub fn assemble(folder: &Path, output: &Path) -> Result<AssembleSummary, AssembleError> {
    let pages = collect_image_set(folder)?;
    if pages.is_empty() {
        return Err(AssembleError::EmptySet(folder.to_path_buf()));
    }
    engine_info!("Assembling {} image(s) from {:?}", pages.len(), folder);

    let mut builder = PdfBuilder::new();
    for path in &pages {
        let bytes = fs::read(path).map_err(|source| AssembleError::Read {
            path: path.clone(),
            source,
        })?;
        let page = PageImage::from_bytes(bytes).map_err(|err| {
            engine_error!("Aborting assembly, {:?} is not a usable image: {}", path, err);
            AssembleError::Decode {
                path: path.clone(),
                message: err.to_string(),
            }
        })?;
        engine_debug!(
            "Page {} <- {:?} ({}x{})",
            builder.page_count() + 1,
            path,
            page.width,
            page.height
        );
        builder.add_page(page).map_err(encode_error)?;
    }
    let page_count = builder.page_count();
    let bytes = builder.finish().map_err(encode_error)?;

    let (dir, file_name) = split_output_path(output)?;
    let written = AtomicFileWriter::new(dir).write(&file_name, bytes)?;
    engine_info!("Wrote {} page(s) to {:?}", page_count, written);

    Ok(AssembleSummary {
        output_path: output.to_path_buf(),
        page_count,
        pages,
    })
}

fn encode_error(err: PdfError) -> AssembleError {
    AssembleError::Encode(err.to_string())
}
