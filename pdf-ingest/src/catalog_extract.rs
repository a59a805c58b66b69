//! Adapts this crate's page rasterization to [`catalog_core::PageExtractor`]
//! so a vision indexing pipeline can rasterize PDFs without depending on
//! this crate's OCR/XML pipeline at all.

use std::path::{Path, PathBuf};

use catalog_core::{CoreError, PageExtractor};
use pdfium_render::prelude::*;

use crate::error::PdfProcessError;
use crate::model::PdfProcessOptions;
use crate::pdfium::bind_pdfium;

/// Rasterizes every page of a PDF into `page_{0-based index:04}.png` files,
/// the default [`PageExtractor`] for vision indexing.
///
/// Pdfium calls are synchronous, so each call to [`extract_pages`] runs on
/// a blocking thread via [`blocking::unblock`].
///
/// [`extract_pages`]: PageExtractor::extract_pages
#[derive(Debug, Clone)]
pub struct PdfiumPageExtractor {
    dpi: u16,
    pdfium_library_path: String,
}

impl PdfiumPageExtractor {
    /// Builds an extractor that loads the Pdfium dynamic library at
    /// `pdfium_library_path` and rasterizes at `dpi`.
    #[must_use]
    pub fn new(pdfium_library_path: impl Into<String>, dpi: u16) -> Self {
        Self {
            dpi: dpi.max(72),
            pdfium_library_path: pdfium_library_path.into(),
        }
    }
}

impl PageExtractor for PdfiumPageExtractor {
    async fn extract_pages(
        &self,
        pdf_path: &Path,
        out_dir: &Path,
    ) -> catalog_core::Result<Vec<PathBuf>> {
        let pdf_path = pdf_path.to_path_buf();
        let out_dir = out_dir.to_path_buf();
        let options = PdfProcessOptions {
            pdfium_library_path: Some(self.pdfium_library_path.clone()),
            page_image_dpi: self.dpi,
            ..PdfProcessOptions::default()
        };

        blocking::unblock(move || rasterize_all_pages(&pdf_path, &out_dir, &options))
            .await
            .map_err(to_core_error)
    }
}

fn rasterize_all_pages(
    pdf_path: &Path,
    out_dir: &Path,
    options: &PdfProcessOptions,
) -> crate::error::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;

    let pdfium = bind_pdfium(options)?;
    let doc = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| PdfProcessError::Parse(e.to_string()))?;

    let dpi = options.page_image_dpi;
    let mut out_paths = Vec::with_capacity(doc.pages().len() as usize);

    for (zero_based_index, pdf_page) in doc.pages().iter().enumerate() {
        let width_pt = pdf_page.width().value.max(1.0);
        let target_width = ((width_pt / 72.0) * f32::from(dpi)).round().max(256.0) as i32;

        let render_config = PdfRenderConfig::new()
            .set_target_width(target_width)
            .rotate_if_landscape(PdfPageRenderRotation::None, true);

        let image = pdf_page
            .render_with_config(&render_config)
            .map_err(|e| PdfProcessError::Parse(e.to_string()))?
            .as_image()
            .into_rgb8();

        let filename = format!("page_{zero_based_index:04}.png");
        let path = out_dir.join(filename);
        image
            .save(&path)
            .map_err(|e| PdfProcessError::Parse(e.to_string()))?;
        out_paths.push(path);
    }

    Ok(out_paths)
}

fn to_core_error(err: PdfProcessError) -> CoreError {
    match err {
        PdfProcessError::Io(source) => CoreError::io(PathBuf::new(), source),
        other => CoreError::Format(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extractor_clamps_dpi_to_minimum() {
        let extractor = PdfiumPageExtractor::new("/opt/lib/libpdfium.so", 10);
        assert_eq!(extractor.dpi, 72);
    }
}
