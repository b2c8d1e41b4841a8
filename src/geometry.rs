//! Mapping between CSS layout space and the physical pixels of a screenshot.

use serde::Deserialize;

use crate::error::CaptureError;

/// Element box in CSS pixels, relative to the document origin.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CssBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CssBox {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl WindowSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ScrollSize {
    pub width: u32,
    pub height: u32,
}

/// Physical-pixel rectangle, `left..right` x `top..bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRect {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Resolves the physical crop rectangle of `element` inside a screenshot of
/// `shot_width` x `shot_height` pixels.
///
/// `vertical_offset` is subtracted from the CSS top edge before scaling; the
/// scaled edges are truncated toward zero and clamped to the screenshot.
pub fn resolve_crop(
    element: CssBox,
    vertical_offset: f64,
    device_pixel_ratio: f64,
    shot_width: u32,
    shot_height: u32,
) -> Result<CropRect, CaptureError> {
    let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio
    } else {
        1.0
    };

    let top_css = element.y - vertical_offset;
    let left = (element.x * dpr) as i64;
    let top = (top_css * dpr) as i64;
    let right = ((element.x + element.width) * dpr) as i64;
    let bottom = ((top_css + element.height) * dpr) as i64;

    let left = left.max(0);
    let top = top.max(0);
    let right = right.min(i64::from(shot_width));
    let bottom = bottom.min(i64::from(shot_height));

    if left >= right || top >= bottom {
        return Err(CaptureError::InvalidCropRegion {
            left,
            top,
            right,
            bottom,
        });
    }

    Ok(CropRect {
        left: left as u32,
        top: top as u32,
        right: right as u32,
        bottom: bottom as u32,
    })
}

/// Viewport margins and floors used when growing the window so the whole
/// element is rendered in a single screenshot.
#[derive(Debug, Clone, Copy)]
pub struct ViewportPolicy {
    pub bottom_margin: f64,
    pub right_margin: f64,
    pub min_height: u32,
}

impl Default for ViewportPolicy {
    fn default() -> Self {
        Self {
            bottom_margin: 200.0,
            right_margin: 100.0,
            min_height: 3000,
        }
    }
}

pub fn required_viewport(
    policy: &ViewportPolicy,
    document: ScrollSize,
    element: CssBox,
    current: WindowSize,
) -> WindowSize {
    let element_bottom = (element.bottom() + policy.bottom_margin).ceil().max(0.0) as u32;
    let element_right = (element.right() + policy.right_margin).ceil().max(0.0) as u32;

    WindowSize {
        width: document.width.max(current.width).max(element_right),
        height: document.height.max(element_bottom).max(policy.min_height),
    }
}
