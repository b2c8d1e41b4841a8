//! Which installed browser drives the capture.
//!
//! Resolved once by the caller and passed down as a [`BrowserChoice`].

use std::fmt;
use std::path::{Path, PathBuf};

use crate::prompt::Prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserKind {
    Chrome,
    Edge,
}

impl BrowserKind {
    pub const ALL: [BrowserKind; 2] = [BrowserKind::Chrome, BrowserKind::Edge];

    fn known_paths(self) -> &'static [&'static str] {
        match self {
            BrowserKind::Chrome => &[
                "/usr/bin/google-chrome",
                "/usr/bin/google-chrome-stable",
                "/usr/bin/chromium",
                "/usr/bin/chromium-browser",
                "/snap/bin/chromium",
                "/opt/google/chrome/google-chrome",
                "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                "/Applications/Chromium.app/Contents/MacOS/Chromium",
                r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            ],
            BrowserKind::Edge => &[
                "/usr/bin/microsoft-edge",
                "/usr/bin/microsoft-edge-stable",
                "/opt/microsoft/msedge/msedge",
                "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
                r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
                r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
            ],
        }
    }

    fn path_commands(self) -> &'static [&'static str] {
        match self {
            BrowserKind::Chrome => &[
                "google-chrome",
                "google-chrome-stable",
                "chromium",
                "chromium-browser",
                "chrome",
            ],
            BrowserKind::Edge => &["microsoft-edge", "microsoft-edge-stable", "msedge"],
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserKind::Chrome => f.write_str("Chrome"),
            BrowserKind::Edge => f.write_str("Edge"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BrowserPreference {
    /// First available browser; ask when both are installed.
    #[default]
    Auto,
    Chrome,
    Edge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserChoice {
    pub kind: BrowserKind,
    pub executable: PathBuf,
}

/// Installed browsers in [`BrowserKind::ALL`] order.
pub fn detect_installed() -> Vec<BrowserChoice> {
    detect_with(
        |path| path.is_file(),
        |command| which::which(command).ok(),
    )
}

pub fn detect_with(
    exists: impl Fn(&Path) -> bool,
    lookup: impl Fn(&str) -> Option<PathBuf>,
) -> Vec<BrowserChoice> {
    let mut found = Vec::new();
    for kind in BrowserKind::ALL {
        let known = kind
            .known_paths()
            .iter()
            .map(Path::new)
            .find(|path| exists(*path))
            .map(Path::to_path_buf);
        let executable = known.or_else(|| {
            kind.path_commands()
                .iter()
                .find_map(|command| lookup(*command))
        });
        if let Some(executable) = executable {
            tracing::debug!(browser = %kind, path = %executable.display(), "found browser");
            found.push(BrowserChoice { kind, executable });
        }
    }
    found
}

pub fn resolve(
    preference: BrowserPreference,
    mut installed: Vec<BrowserChoice>,
    prompt: &mut dyn Prompt,
) -> anyhow::Result<BrowserChoice> {
    if installed.is_empty() {
        anyhow::bail!(
            "neither Chrome nor Edge was found; install one of them:\n\
             - Chrome: https://www.google.com/chrome/\n\
             - Edge: https://www.microsoft.com/edge"
        );
    }

    let wanted = match preference {
        BrowserPreference::Auto => None,
        BrowserPreference::Chrome => Some(BrowserKind::Chrome),
        BrowserPreference::Edge => Some(BrowserKind::Edge),
    };
    if let Some(kind) = wanted {
        return installed
            .into_iter()
            .find(|choice| choice.kind == kind)
            .ok_or_else(|| anyhow::anyhow!("{kind} is not installed"));
    }

    if installed.len() == 1
        && let Some(only) = installed.pop()
    {
        tracing::info!(browser = %only.kind, "using the only available browser");
        return Ok(only);
    }

    let labels = installed
        .iter()
        .map(|choice| format!("{} ({})", choice.kind, choice.executable.display()))
        .collect::<Vec<_>>();
    let index = prompt.choose("Several browsers are available. Which one should be used?", &labels)?;
    let choice = installed
        .into_iter()
        .nth(index)
        .ok_or_else(|| anyhow::anyhow!("browser choice out of range: {index}"))?;
    tracing::info!(browser = %choice.kind, "selected browser");
    Ok(choice)
}
