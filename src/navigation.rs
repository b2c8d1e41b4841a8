//! Navigation Unit: advance the reader by one page.
//!
//! A reader that stops responding looks exactly like one that reached its
//! last page; both come back as "did not advance".

use crate::browser::BrowserSession;
use crate::dom::{self, PaginationLink};
use crate::engine::CaptureSettings;
use crate::error::CaptureError;
use crate::pacing::Pacer;
use crate::wait;

const NEXT_PAGE_LABEL: &str = "下一页";
const NEXT_CHAPTER_LABEL: &str = "下一章";
const PAGE_SCRIPT: &str = "SMH.utils.goPage";
const CHAPTER_SCRIPT: &str = "nextC";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Advance {
    Next,
    NoNextLink,
}

/// First pagination link that moves to the next page and not to the next
/// chapter.
pub fn next_page_link(links: &[PaginationLink]) -> Option<&PaginationLink> {
    links.iter().find(|link| {
        let points_forward = link.class_name.contains("next")
            && (link.text.contains(NEXT_PAGE_LABEL) || link.href.contains(PAGE_SCRIPT));
        let leaves_chapter =
            link.onclick.contains(CHAPTER_SCRIPT) || link.text.contains(NEXT_CHAPTER_LABEL);
        points_forward && !leaves_chapter
    })
}

/// Clicks "next page" and waits for the new image. `false` means the chapter
/// is over or the reader stalled.
pub async fn advance(
    session: &mut dyn BrowserSession,
    pacer: &dyn Pacer,
    settings: &CaptureSettings,
) -> bool {
    match try_advance(session, pacer, settings).await {
        Ok(Advance::Next) => true,
        Ok(Advance::NoNextLink) => {
            tracing::info!("no next-page link; assuming end of chapter");
            false
        }
        Err(CaptureError::NavigationTimeout { stage }) => {
            tracing::warn!(stage, "navigation timed out; end of chapter or slow load");
            match dom::disabled_next_present(session).await {
                Ok(true) => tracing::info!("disabled next-page marker present; end of chapter"),
                Ok(false) => tracing::info!("no disabled next-page marker after timeout"),
                Err(err) => tracing::debug!("end-of-chapter probe failed: {err:#}"),
            }
            false
        }
        Err(err) => {
            tracing::error!("navigation failed: {err}");
            false
        }
    }
}

async fn try_advance(
    session: &mut dyn BrowserSession,
    pacer: &dyn Pacer,
    settings: &CaptureSettings,
) -> Result<Advance, CaptureError> {
    let links = dom::pagination_links(session).await?;
    let Some(link) = next_page_link(&links) else {
        return Ok(Advance::NoNextLink);
    };
    let index = link.index;
    tracing::debug!(index, text = %link.text.trim(), "next-page link found");

    dom::link_scroll_into_view(session, index).await?;
    pacer.pause(settings.link_scroll_settle).await;

    if !dom::mark_reference(session, &settings.image_id).await? {
        return Err(CaptureError::ElementDetached {
            id: settings.image_id.clone(),
        });
    }

    if !dom::link_displayed(session, index).await? {
        tracing::warn!("next-page link hidden after scrolling; clicking via script");
        dom::link_script_click(session, index).await?;
    } else {
        match wait::until_clickable(session, pacer, settings.clickable_wait, index).await {
            Some(point) => {
                if let Err(err) = session.click_at(point.x, point.y).await {
                    tracing::warn!("native click failed: {err:#}; clicking via script");
                    dom::link_script_click(session, index).await?;
                }
            }
            None => {
                tracing::warn!("next-page link never became clickable; clicking via script");
                dom::link_script_click(session, index).await?;
            }
        }
    }

    if !wait::until_stale(session, pacer, settings.element_wait).await {
        return Err(CaptureError::NavigationTimeout {
            stage: "previous image to detach",
        });
    }
    if !wait::until_visible(session, pacer, settings.element_wait, &settings.image_id).await {
        return Err(CaptureError::NavigationTimeout {
            stage: "next image to appear",
        });
    }

    tracing::info!("moved to next page");
    pacer.pause(settings.navigation_settle).await;
    Ok(Advance::Next)
}
