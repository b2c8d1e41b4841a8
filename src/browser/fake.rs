//! In-memory reader used by unit tests: a chapter of `pages` pages behind
//! a `#pagination` bar, driven through the same scripts as a real tab.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{BrowserLauncher, BrowserSession, LaunchOptions};
use crate::dom;
use crate::geometry::{CssBox, ScrollSize, WindowSize};

#[derive(Debug, Clone)]
pub struct ReaderState {
    pub pages: u32,
    pub current: u32,
    pub image_visible: bool,
    pub isolate_ok: bool,
    pub script_errors: bool,
    pub overlay_on_next: bool,
    pub native_click_fails: bool,
    pub next_link_inert: bool,
    pub launch_fails: bool,
    pub image_box: CssBox,
    pub dpr: f64,
    pub document: ScrollSize,
    pub screenshot_size: (u32, u32),
    pub marked_page: Option<u32>,
    pub window: WindowSize,

    pub launches: u32,
    pub navigated: Vec<String>,
    pub blocked: Vec<String>,
    pub resizes: Vec<WindowSize>,
    pub native_clicks: u32,
    pub script_clicks: u32,
    pub quit: bool,
}

impl ReaderState {
    pub fn with_pages(pages: u32) -> Self {
        Self {
            pages,
            current: 1,
            image_visible: true,
            isolate_ok: true,
            script_errors: false,
            overlay_on_next: false,
            native_click_fails: false,
            next_link_inert: false,
            launch_fails: false,
            image_box: CssBox {
                x: 10.0,
                y: 20.0,
                width: 100.0,
                height: 50.0,
            },
            dpr: 1.0,
            document: ScrollSize {
                width: 1920,
                height: 2000,
            },
            screenshot_size: (400, 300),
            marked_page: None,
            window: WindowSize::new(1920, 1080),
            launches: 0,
            navigated: Vec::new(),
            blocked: Vec::new(),
            resizes: Vec::new(),
            native_clicks: 0,
            script_clicks: 0,
            quit: false,
        }
    }

    fn links(&self) -> Value {
        let next = if self.current < self.pages {
            json!({
                "index": 1,
                "text": "下一页",
                "class_name": "next",
                "href": format!("javascript:SMH.utils.goPage({})", self.current + 1),
                "onclick": "",
            })
        } else {
            json!({
                "index": 1,
                "text": "下一章",
                "class_name": "next",
                "href": "javascript:void(0)",
                "onclick": "SMH.nextC();",
            })
        };
        json!([
            {
                "index": 0,
                "text": "上一页",
                "class_name": "prev",
                "href": "javascript:SMH.utils.goPage(0)",
                "onclick": "",
            },
            next,
        ])
    }

    fn follow_link(&mut self, index: usize) {
        if index == 1 && self.current < self.pages && !self.next_link_inert {
            self.current += 1;
        }
    }
}

#[derive(Clone)]
pub struct FakeReader {
    state: Arc<Mutex<ReaderState>>,
}

impl FakeReader {
    pub fn new(state: ReaderState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn session(&self) -> FakeSession {
        FakeSession {
            state: Arc::clone(&self.state),
        }
    }

    pub fn launcher(&self) -> FakeLauncher {
        FakeLauncher {
            state: Arc::clone(&self.state),
        }
    }

    pub fn snapshot(&self) -> ReaderState {
        self.state.lock().unwrap().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut ReaderState)) {
        f(&mut self.state.lock().unwrap());
    }
}

pub struct FakeLauncher {
    state: Arc<Mutex<ReaderState>>,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, options: &LaunchOptions) -> anyhow::Result<Box<dyn BrowserSession>> {
        let mut state = self.state.lock().unwrap();
        state.launches += 1;
        if state.launch_fails {
            anyhow::bail!("browser failed to start");
        }
        state.window = options.window;
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct FakeSession {
    state: Arc<Mutex<ReaderState>>,
}

fn index_arg(args: &[Value]) -> usize {
    args.get(1).and_then(Value::as_u64).unwrap_or(usize::MAX as u64) as usize
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn block_urls(&mut self, patterns: &[String]) -> anyhow::Result<()> {
        self.state.lock().unwrap().blocked = patterns.to_vec();
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.navigated.push(url.to_owned());
        state.current = 1;
        Ok(())
    }

    async fn execute_script(&mut self, function: &str, args: &[Value]) -> anyhow::Result<Value> {
        let mut state = self.state.lock().unwrap();
        if state.script_errors {
            anyhow::bail!("Execution context was destroyed");
        }
        let value = match function {
            dom::ELEMENT_VISIBLE => json!(state.image_visible),
            dom::ISOLATE_ELEMENT => json!(state.isolate_ok),
            dom::SCROLL_INTO_VIEW => json!(true),
            dom::IMAGE_LOADED => json!(true),
            dom::ELEMENT_BOX => {
                let b = state.image_box;
                json!({ "x": b.x, "y": b.y, "width": b.width, "height": b.height })
            }
            dom::DOCUMENT_SCROLL_SIZE => {
                json!({ "width": state.document.width, "height": state.document.height })
            }
            dom::DEVICE_PIXEL_RATIO => json!(state.dpr),
            dom::BODY_PRESENT => json!(true),
            dom::MARK_REFERENCE => {
                state.marked_page = Some(state.current);
                json!(true)
            }
            dom::REFERENCE_STALE => json!(state.marked_page != Some(state.current)),
            dom::PAGINATION_CANDIDATES => state.links(),
            dom::LINK_SCROLL_INTO_VIEW | dom::LINK_DISPLAYED => json!(index_arg(args) <= 1),
            dom::LINK_CLICK_POINT => {
                if index_arg(args) <= 1 {
                    json!({ "x": 100.0, "y": 40.0, "clickable": !state.overlay_on_next })
                } else {
                    Value::Null
                }
            }
            dom::LINK_SCRIPT_CLICK => {
                state.script_clicks += 1;
                state.follow_link(index_arg(args));
                json!(true)
            }
            dom::DISABLED_NEXT_PRESENT => json!(state.current >= state.pages),
            other => anyhow::bail!("unexpected script: {other}"),
        };
        Ok(value)
    }

    async fn click_at(&mut self, _x: f64, _y: f64) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.native_click_fails {
            anyhow::bail!("element click intercepted");
        }
        state.native_clicks += 1;
        state.follow_link(1);
        Ok(())
    }

    async fn screenshot(&mut self) -> anyhow::Result<Vec<u8>> {
        let (width, height, shade) = {
            let state = self.state.lock().unwrap();
            let (width, height) = state.screenshot_size;
            (width, height, (state.current % 256) as u8)
        };
        let image = image::RgbImage::from_pixel(width, height, image::Rgb([shade, 0, 0]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(bytes)
    }

    async fn window_size(&mut self) -> anyhow::Result<WindowSize> {
        Ok(self.state.lock().unwrap().window)
    }

    async fn resize(&mut self, size: WindowSize) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.window = size;
        state.resizes.push(size);
        Ok(())
    }

    async fn quit(self: Box<Self>) -> anyhow::Result<()> {
        self.state.lock().unwrap().quit = true;
        Ok(())
    }
}
