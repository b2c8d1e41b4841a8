//! Page Capture Unit: one cropped PNG per reader page.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::browser::BrowserSession;
use crate::dom;
use crate::engine::CaptureSettings;
use crate::error::CaptureError;
use crate::geometry::{self, CssBox};
use crate::pacing::Pacer;
use crate::wait;

pub fn page_path(output_dir: &Path, page: u32) -> PathBuf {
    output_dir.join(format!("{page}.png"))
}

/// Captures the image element of the current reader page into
/// `{output_dir}/{page}.png`, overwriting any previous capture of that page.
pub async fn capture_page(
    session: &mut dyn BrowserSession,
    pacer: &dyn Pacer,
    settings: &CaptureSettings,
    output_dir: &Path,
    page: u32,
) -> Result<PathBuf, CaptureError> {
    let id = settings.image_id.as_str();

    if !wait::until_visible(session, pacer, settings.element_wait, id).await {
        return Err(CaptureError::ElementNotFound {
            id: id.to_owned(),
            timeout_secs: settings.element_wait.timeout.as_secs(),
        });
    }

    match dom::isolate(session, id).await {
        Ok(true) => {
            tracing::debug!(page, "image isolated");
            pacer.pause(settings.isolation_settle).await;
        }
        Ok(false) => {
            tracing::warn!(page, "isolation script found no image; scrolling instead");
            dom::scroll_into_view(session, id).await?;
            pacer.pause(settings.isolation_fallback_settle).await;
        }
        Err(err) => {
            tracing::warn!(page, "isolation script failed: {err:#}; scrolling instead");
            dom::scroll_into_view(session, id).await?;
            pacer.pause(settings.isolation_fallback_settle).await;
        }
    }

    if !wait::until_image_loaded(session, pacer, settings.element_wait, id).await {
        tracing::warn!(page, "image did not finish loading; the capture may be incomplete");
    }

    let element = current_box(session, id).await?;
    if element.is_degenerate() {
        return Err(CaptureError::InvalidGeometry {
            id: id.to_owned(),
            width: element.width,
            height: element.height,
        });
    }

    let document = dom::document_scroll_size(session).await?;
    let window = session.window_size().await?;
    let wanted = geometry::required_viewport(&settings.viewport, document, element, window);
    if wanted != window {
        tracing::info!(page, width = wanted.width, height = wanted.height, "resizing viewport");
        session.resize(wanted).await?;
        pacer.pause(settings.resize_settle).await;
    }

    let element = current_box(session, id).await?;
    let dpr = dom::device_pixel_ratio(session).await?;

    let png = session.screenshot().await?;
    let shot = image::load_from_memory(&png).context("decode screenshot")?;
    tracing::debug!(page, dpr, width = shot.width(), height = shot.height(), "screenshot taken");

    let crop = geometry::resolve_crop(
        element,
        settings.vertical_offset,
        dpr,
        shot.width(),
        shot.height(),
    )?;

    let path = page_path(output_dir, page);
    shot.crop_imm(crop.left, crop.top, crop.width(), crop.height())
        .save_with_format(&path, image::ImageFormat::Png)
        .with_context(|| format!("write {}", path.display()))?;
    tracing::info!(
        page,
        left = crop.left,
        top = crop.top,
        right = crop.right,
        bottom = crop.bottom,
        path = %path.display(),
        "page saved"
    );
    Ok(path)
}

async fn current_box(session: &mut dyn BrowserSession, id: &str) -> Result<CssBox, CaptureError> {
    dom::element_box(session, id)
        .await?
        .ok_or_else(|| CaptureError::ElementDetached { id: id.to_owned() })
}
