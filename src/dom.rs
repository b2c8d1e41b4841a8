//! Page probes and mutations, each an injected script run through
//! [`BrowserSession::execute_script`].
//!
//! Scripts are plain function declarations so a session only needs to call
//! them with JSON arguments. Pagination controls are addressed by their
//! index in `document.querySelectorAll(PAGINATION_LINKS)`, which is stable
//! for as long as the current page is.

use anyhow::Context as _;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::browser::BrowserSession;
use crate::geometry::{CssBox, ScrollSize};

pub const ELEMENT_VISIBLE: &str = r#"function (id) {
    const el = document.getElementById(id);
    if (!el) return false;
    const style = window.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') return false;
    const rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
}"#;

/// Hides every top-level body child, then re-shows the target's ancestor
/// chain and centers the target. Returns `false` if the target is missing.
pub const ISOLATE_ELEMENT: &str = r#"function (id) {
    const target = document.getElementById(id);
    if (!target) return false;
    for (const child of Array.from(document.body.children)) {
        child.style.setProperty('display', 'none', 'important');
    }
    let current = target;
    while (current && current !== document.body) {
        current.style.setProperty('display', '', '');
        current.style.setProperty('visibility', 'visible', 'important');
        if (current.parentElement) current.parentElement.style.overflow = 'visible';
        current = current.parentElement;
    }
    for (const el of [document.body, document.documentElement]) {
        if (!el) continue;
        el.style.setProperty('display', '', '');
        el.style.setProperty('visibility', 'visible', 'important');
        el.style.overflow = 'visible';
    }
    target.scrollIntoView({ block: 'center', inline: 'center' });
    return true;
}"#;

pub const SCROLL_INTO_VIEW: &str = r#"function (id) {
    const el = document.getElementById(id);
    if (!el) return false;
    el.scrollIntoView({ block: 'center', inline: 'center' });
    return true;
}"#;

pub const IMAGE_LOADED: &str = r#"function (id) {
    const img = document.getElementById(id);
    return !!img && img.complete === true
        && typeof img.naturalWidth !== 'undefined' && img.naturalWidth > 0
        && img.getClientRects().length > 0;
}"#;

/// Element box relative to the document origin, or `null` when missing.
pub const ELEMENT_BOX: &str = r#"function (id) {
    const el = document.getElementById(id);
    if (!el) return null;
    const rect = el.getBoundingClientRect();
    return {
        x: rect.left + window.scrollX,
        y: rect.top + window.scrollY,
        width: rect.width,
        height: rect.height,
    };
}"#;

pub const DOCUMENT_SCROLL_SIZE: &str = r#"function () {
    const root = document.documentElement;
    return { width: root.scrollWidth, height: root.scrollHeight };
}"#;

pub const DEVICE_PIXEL_RATIO: &str = r#"function () {
    return window.devicePixelRatio;
}"#;

pub const BODY_PRESENT: &str = r#"function () {
    return !!document.body;
}"#;

/// Remembers the current element so a later [`REFERENCE_STALE`] can tell
/// whether it was detached or the whole document replaced.
pub const MARK_REFERENCE: &str = r#"function (id) {
    window.__comicCaptureRef = document.getElementById(id);
    return window.__comicCaptureRef !== null;
}"#;

pub const REFERENCE_STALE: &str = r#"function () {
    const ref = window.__comicCaptureRef;
    return !ref || !ref.isConnected;
}"#;

pub const PAGINATION_LINKS: &str = "#pagination a";

pub const PAGINATION_CANDIDATES: &str = r#"function (selector) {
    return Array.from(document.querySelectorAll(selector)).map((a, index) => ({
        index,
        text: a.textContent || '',
        class_name: a.getAttribute('class') || '',
        href: a.getAttribute('href') || '',
        onclick: a.getAttribute('onclick') || '',
    }));
}"#;

pub const LINK_SCROLL_INTO_VIEW: &str = r#"function (selector, index) {
    const el = document.querySelectorAll(selector)[index];
    if (!el) return false;
    el.scrollIntoView({ block: 'center', inline: 'center' });
    return true;
}"#;

pub const LINK_DISPLAYED: &str = r#"function (selector, index) {
    const el = document.querySelectorAll(selector)[index];
    if (!el) return false;
    const style = window.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden') return false;
    return el.getClientRects().length > 0;
}"#;

/// Center of the link in viewport coordinates and whether a click there
/// would land on the link itself rather than an overlay.
pub const LINK_CLICK_POINT: &str = r#"function (selector, index) {
    const el = document.querySelectorAll(selector)[index];
    if (!el) return null;
    const rect = el.getBoundingClientRect();
    if (rect.width <= 0 || rect.height <= 0) return null;
    const x = rect.left + rect.width / 2;
    const y = rect.top + rect.height / 2;
    const hit = document.elementFromPoint(x, y);
    return { x, y, clickable: !!hit && (hit === el || el.contains(hit)) };
}"#;

pub const LINK_SCRIPT_CLICK: &str = r#"function (selector, index) {
    const el = document.querySelectorAll(selector)[index];
    if (!el) return false;
    el.click();
    return true;
}"#;

pub const DISABLED_NEXT_PRESENT: &str = r#"function () {
    return Array.from(document.querySelectorAll('#pagination span')).some((span) => {
        const cls = span.getAttribute('class') || '';
        const rect = span.getBoundingClientRect();
        return cls.includes('disabled') && (span.textContent || '').includes('下一页')
            && rect.width > 0 && rect.height > 0;
    });
}"#;

/// One `<a>` inside the reader's pagination area.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaginationLink {
    pub index: usize,
    pub text: String,
    pub class_name: String,
    pub href: String,
    pub onclick: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ClickPoint {
    pub x: f64,
    pub y: f64,
    pub clickable: bool,
}

async fn call<T: DeserializeOwned>(
    session: &mut dyn BrowserSession,
    script: &str,
    args: &[Value],
    what: &str,
) -> anyhow::Result<T> {
    let value = session.execute_script(script, args).await?;
    serde_json::from_value(value).with_context(|| format!("decode {what}"))
}

async fn flag(
    session: &mut dyn BrowserSession,
    script: &str,
    args: &[Value],
) -> anyhow::Result<bool> {
    let value = session.execute_script(script, args).await?;
    Ok(value.as_bool().unwrap_or(false))
}

pub async fn element_visible(session: &mut dyn BrowserSession, id: &str) -> anyhow::Result<bool> {
    flag(session, ELEMENT_VISIBLE, &[json!(id)]).await
}

pub async fn isolate(session: &mut dyn BrowserSession, id: &str) -> anyhow::Result<bool> {
    flag(session, ISOLATE_ELEMENT, &[json!(id)]).await
}

pub async fn scroll_into_view(session: &mut dyn BrowserSession, id: &str) -> anyhow::Result<bool> {
    flag(session, SCROLL_INTO_VIEW, &[json!(id)]).await
}

pub async fn image_loaded(session: &mut dyn BrowserSession, id: &str) -> anyhow::Result<bool> {
    flag(session, IMAGE_LOADED, &[json!(id)]).await
}

pub async fn element_box(
    session: &mut dyn BrowserSession,
    id: &str,
) -> anyhow::Result<Option<CssBox>> {
    call(session, ELEMENT_BOX, &[json!(id)], "element box").await
}

pub async fn document_scroll_size(session: &mut dyn BrowserSession) -> anyhow::Result<ScrollSize> {
    call(session, DOCUMENT_SCROLL_SIZE, &[], "document scroll size").await
}

/// `1.0` when the page does not report a usable ratio.
pub async fn device_pixel_ratio(session: &mut dyn BrowserSession) -> anyhow::Result<f64> {
    let value = session.execute_script(DEVICE_PIXEL_RATIO, &[]).await?;
    Ok(value
        .as_f64()
        .filter(|dpr| dpr.is_finite() && *dpr > 0.0)
        .unwrap_or(1.0))
}

pub async fn body_present(session: &mut dyn BrowserSession) -> anyhow::Result<bool> {
    flag(session, BODY_PRESENT, &[]).await
}

pub async fn mark_reference(session: &mut dyn BrowserSession, id: &str) -> anyhow::Result<bool> {
    flag(session, MARK_REFERENCE, &[json!(id)]).await
}

pub async fn reference_stale(session: &mut dyn BrowserSession) -> anyhow::Result<bool> {
    flag(session, REFERENCE_STALE, &[]).await
}

pub async fn pagination_links(
    session: &mut dyn BrowserSession,
) -> anyhow::Result<Vec<PaginationLink>> {
    call(
        session,
        PAGINATION_CANDIDATES,
        &[json!(PAGINATION_LINKS)],
        "pagination links",
    )
    .await
}

pub async fn link_scroll_into_view(
    session: &mut dyn BrowserSession,
    index: usize,
) -> anyhow::Result<bool> {
    flag(session, LINK_SCROLL_INTO_VIEW, &[json!(PAGINATION_LINKS), json!(index)]).await
}

pub async fn link_displayed(session: &mut dyn BrowserSession, index: usize) -> anyhow::Result<bool> {
    flag(session, LINK_DISPLAYED, &[json!(PAGINATION_LINKS), json!(index)]).await
}

pub async fn link_click_point(
    session: &mut dyn BrowserSession,
    index: usize,
) -> anyhow::Result<Option<ClickPoint>> {
    call(
        session,
        LINK_CLICK_POINT,
        &[json!(PAGINATION_LINKS), json!(index)],
        "link click point",
    )
    .await
}

pub async fn link_script_click(
    session: &mut dyn BrowserSession,
    index: usize,
) -> anyhow::Result<bool> {
    flag(session, LINK_SCRIPT_CLICK, &[json!(PAGINATION_LINKS), json!(index)]).await
}

pub async fn disabled_next_present(session: &mut dyn BrowserSession) -> anyhow::Result<bool> {
    flag(session, DISABLED_NEXT_PRESENT, &[]).await
}
