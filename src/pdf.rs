//! Chapter PDF assembly: numbered page PNGs become one page each, in order.
//!
//! The document is written directly: one Flate-compressed RGB image
//! XObject per page, drawn to fill a page sized at [`PAGE_DPI`].

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

pub const PAGE_DPI: f64 = 100.0;

/// Turns a directory of page images into a single document.
pub trait PdfAssembler: Send + Sync {
    /// Returns the number of pages written.
    fn assemble(&self, images_dir: &Path, output: &Path) -> anyhow::Result<usize>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImagePdfAssembler;

impl PdfAssembler for ImagePdfAssembler {
    fn assemble(&self, images_dir: &Path, output: &Path) -> anyhow::Result<usize> {
        let pages = numbered_pages(images_dir)?;
        if pages.is_empty() {
            anyhow::bail!("no numbered PNG pages in {}", images_dir.display());
        }

        let mut encoded = Vec::with_capacity(pages.len());
        for (number, path) in &pages {
            let image = image::open(path)
                .with_context(|| format!("open page {number}: {}", path.display()))?
                .to_rgb8();
            let (width, height) = image.dimensions();
            if width == 0 || height == 0 {
                anyhow::bail!("page {number} is empty: {}", path.display());
            }
            encoded.push(EncodedPage {
                width,
                height,
                data: miniz_oxide::deflate::compress_to_vec_zlib(image.as_raw(), 6),
            });
        }

        let document = render(&encoded, PAGE_DPI);
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        std::fs::write(output, document).with_context(|| format!("write {}", output.display()))?;
        tracing::info!(pages = encoded.len(), output = %output.display(), "pdf written");
        Ok(encoded.len())
    }
}

/// `N.png` files in `dir`, sorted by `N`. Other files are ignored.
pub fn numbered_pages(dir: &Path) -> anyhow::Result<Vec<(u32, PathBuf)>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read dir: {}", dir.display()))?;
    let mut pages = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("read dir entry: {}", dir.display()))?
            .path();
        let is_png = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if !is_png || !path.is_file() {
            continue;
        }
        match path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<u32>().ok())
        {
            Some(number) => pages.push((number, path)),
            None => tracing::debug!(path = %path.display(), "skipping non-numbered image"),
        }
    }
    pages.sort_by_key(|(number, _)| *number);
    Ok(pages)
}

struct EncodedPage {
    width: u32,
    height: u32,
    /// zlib-compressed RGB8 samples.
    data: Vec<u8>,
}

fn points(pixels: u32, dpi: f64) -> f64 {
    f64::from(pixels) * 72.0 / dpi
}

fn render(pages: &[EncodedPage], dpi: f64) -> Vec<u8> {
    // 1: catalog, 2: page tree, then page / contents / image per page.
    let object_count = 2 + pages.len() * 3;
    let mut out = Vec::new();
    let mut offsets = Vec::with_capacity(object_count);

    out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

    let kids = (0..pages.len())
        .map(|i| format!("{} 0 R", 3 + i * 3))
        .collect::<Vec<_>>()
        .join(" ");
    offsets.push(out.len());
    let _ = write!(
        out,
        "2 0 obj\n<< /Type /Pages /Kids [{kids}] /Count {} >>\nendobj\n",
        pages.len()
    );

    for (i, page) in pages.iter().enumerate() {
        let page_id = 3 + i * 3;
        let contents_id = page_id + 1;
        let image_id = page_id + 2;
        let width = points(page.width, dpi);
        let height = points(page.height, dpi);

        offsets.push(out.len());
        let _ = write!(
            out,
            "{page_id} 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {width:.2} {height:.2}] \
             /Resources << /XObject << /Im0 {image_id} 0 R >> >> /Contents {contents_id} 0 R >>\nendobj\n"
        );

        let draw = format!("q {width:.2} 0 0 {height:.2} 0 0 cm /Im0 Do Q");
        offsets.push(out.len());
        let _ = write!(
            out,
            "{contents_id} 0 obj\n<< /Length {} >>\nstream\n{draw}\nendstream\nendobj\n",
            draw.len()
        );

        offsets.push(out.len());
        let _ = write!(
            out,
            "{image_id} 0 obj\n<< /Type /XObject /Subtype /Image /Width {} /Height {} \
             /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /FlateDecode /Length {} >>\nstream\n",
            page.width,
            page.height,
            page.data.len()
        );
        out.extend_from_slice(&page.data);
        out.extend_from_slice(b"\nendstream\nendobj\n");
    }

    let xref_offset = out.len();
    let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", object_count + 1);
    for offset in &offsets {
        let _ = write!(out, "{offset:010} 00000 n \n");
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
        object_count + 1
    );
    out
}
