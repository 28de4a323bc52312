//! Renders each PDF page to a PNG with poppler's `pdftoppm`.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::tools::{run_tool, scratch_dir};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub page: u32,
    pub path: PathBuf,
}

pub trait Renderer {
    /// Render every page of `pdf` into `out_dir`, in page order.
    fn render(&self, pdf: &Path, out_dir: &Path) -> AppResult<Vec<PageImage>>;
}

pub struct PdftoppmRenderer {
    pub program: String,
    pub dpi: u32,
}

impl PdftoppmRenderer {
    pub fn new(program: &str, dpi: u32) -> Self {
        Self {
            program: program.to_string(),
            dpi,
        }
    }
}

pub fn page_image_name(page: u32) -> String {
    format!("page_{:03}.png", page)
}

/// Page number of an image written by [`Renderer::render`].
pub fn page_number_from_image_name(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    if path.extension()? != "png" {
        return None;
    }
    stem.strip_prefix("page_")?.parse().ok()
}

/// pdftoppm names its output `<prefix>-<n>.png`, zero-padding `n` to the
/// width of the page count.
fn rendered_page_number(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    stem.rsplit('-').next()?.parse().ok()
}

impl Renderer for PdftoppmRenderer {
    fn render(&self, pdf: &Path, out_dir: &Path) -> AppResult<Vec<PageImage>> {
        fs::create_dir_all(out_dir)?;
        let temp_dir = scratch_dir(out_dir, ".render")?;
        self.render_into(pdf, temp_dir.path(), out_dir)
    }
}

impl PdftoppmRenderer {
    fn render_into(&self, pdf: &Path, temp_dir: &Path, out_dir: &Path) -> AppResult<Vec<PageImage>> {
        let prefix = temp_dir.join("page");
        let dpi = self.dpi.to_string();
        run_tool(
            &self.program,
            [
                OsStr::new("-png"),
                OsStr::new("-r"),
                OsStr::new(&dpi),
                pdf.as_os_str(),
                prefix.as_os_str(),
            ],
        )?;

        let mut images = Vec::new();
        for entry in fs::read_dir(temp_dir)?.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == "png").unwrap_or(false) {
                let page = rendered_page_number(&path).ok_or_else(|| {
                    AppError::Tool(format!("unexpected pdftoppm output {}", path.display()))
                })?;
                images.push((page, path));
            }
        }
        if images.is_empty() {
            return Err(AppError::Tool("pdftoppm produced no images".to_string()));
        }
        images.sort_by_key(|(page, _)| *page);

        let mut pages = Vec::with_capacity(images.len());
        for (page, path) in images {
            let target = out_dir.join(page_image_name(page));
            fs::rename(&path, &target)?;
            log::info!("Saved: {}", target.display());
            pages.push(PageImage { page, path: target });
        }
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_images_are_zero_padded() {
        assert_eq!(page_image_name(7), "page_007.png");
        assert_eq!(page_image_name(112), "page_112.png");
        assert_eq!(page_number_from_image_name(Path::new("page_112.png")), Some(112));
        assert_eq!(page_number_from_image_name(Path::new("page_112.txt")), None);
    }

    #[test]
    fn reads_page_number_from_pdftoppm_name() {
        assert_eq!(rendered_page_number(Path::new("/tmp/x/page-07.png")), Some(7));
        assert_eq!(rendered_page_number(Path::new("page-1.png")), Some(1));
        assert_eq!(rendered_page_number(Path::new("cover.png")), None);
    }
}
