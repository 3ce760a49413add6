//! Capture area discovery through `xrandr` and `xwininfo`

use super::traits::{CaptureError, CaptureResult, DisplayInfo};
use serde::{Deserialize, Serialize};
use std::process::Command;

/// What part of the X screen is recorded
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSource {
    /// One xrandr output, the configured or the primary one
    #[default]
    Display,
    /// The whole X screen spanning every output
    Desktop,
    /// A window picked by clicking on it
    Window,
}

/// X display used when `DISPLAY` is unset
pub const DEFAULT_X_DISPLAY: &str = ":0.0";

/// The X display from the session environment
pub fn x_display() -> String {
    std::env::var("DISPLAY")
        .ok()
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_X_DISPLAY.to_string())
}

/// Get list of available displays
///
/// Falls back to a single entry for the whole X screen (named after
/// `DISPLAY`, `fallback_size` pixels at +0+0) when `xrandr` is missing, fails,
/// or reports no connected output.
pub fn get_displays(fallback_size: (u32, u32)) -> Vec<DisplayInfo> {
    let displays = query_xrandr()
        .map(|output| parse_xrandr(&output))
        .unwrap_or_default();

    if displays.is_empty() {
        return vec![default_display(fallback_size)];
    }
    displays
}

/// The whole X screen, sized from `xrandr` or `fallback_size`
pub fn desktop_display(fallback_size: (u32, u32)) -> DisplayInfo {
    let size = query_xrandr()
        .and_then(|output| parse_screen_size(&output))
        .unwrap_or(fallback_size);
    default_display(size)
}

/// Let the user click a window and return its area
///
/// Blocks until the click, as `xwininfo` does.
pub fn select_window() -> CaptureResult<DisplayInfo> {
    println!("Click on the window to record");
    let output = Command::new("xwininfo")
        .output()
        .map_err(|source| CaptureError::Spawn {
            program: "xwininfo".to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(CaptureError::Geometry(format!(
            "xwininfo failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let window = parse_xwininfo(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| CaptureError::Geometry("Could not parse window geometry".to_string()))?;
    tracing::info!(
        "Selected window {}x{} at +{}+{}",
        window.width,
        window.height,
        window.x,
        window.y
    );
    Ok(window)
}

/// Area to record for `source`
///
/// `display` names the xrandr output for [`CaptureSource::Display`].
pub fn capture_area(
    source: CaptureSource,
    display: Option<&str>,
    fallback_size: (u32, u32),
) -> CaptureResult<DisplayInfo> {
    match source {
        CaptureSource::Display => {
            let displays = get_displays(fallback_size);
            Ok(select_display(&displays, display)
                .cloned()
                .unwrap_or_else(|| default_display(fallback_size)))
        }
        CaptureSource::Desktop => Ok(desktop_display(fallback_size)),
        CaptureSource::Window => select_window(),
    }
}

fn query_xrandr() -> Option<String> {
    match Command::new("xrandr").arg("--query").output() {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            tracing::warn!(
                "xrandr failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            None
        }
        Err(e) => {
            tracing::warn!("Failed to run xrandr: {}", e);
            None
        }
    }
}

/// Find a display by output name, case-insensitively
pub fn find_display<'a>(displays: &'a [DisplayInfo], name: &str) -> Option<&'a DisplayInfo> {
    displays.iter().find(|d| d.name.eq_ignore_ascii_case(name))
}

/// Pick the named display, else the primary one, else the first
pub fn select_display<'a>(displays: &'a [DisplayInfo], name: Option<&str>) -> Option<&'a DisplayInfo> {
    if let Some(name) = name {
        match find_display(displays, name) {
            Some(display) => return Some(display),
            None => tracing::warn!("Display {} not found, using the primary display", name),
        }
    }
    displays.iter().find(|d| d.is_primary).or_else(|| displays.first())
}

/// The whole X screen at `size`
pub fn default_display(size: (u32, u32)) -> DisplayInfo {
    DisplayInfo {
        name: x_display(),
        width: size.0,
        height: size.1,
        x: 0,
        y: 0,
        is_primary: true,
    }
}

/// Parse connected outputs from `xrandr --query`
///
/// Output lines look like
/// `eDP-1 connected primary 1920x1080+0+0 (normal left inverted ...) 344mm x 194mm`.
/// Connected outputs without a mode (switched off) are skipped.
pub fn parse_xrandr(output: &str) -> Vec<DisplayInfo> {
    output
        .lines()
        .filter(|line| !line.starts_with(char::is_whitespace))
        .filter_map(|line| {
            let mut words = line.split_whitespace();
            let name = words.next()?;
            if words.next()? != "connected" {
                return None;
            }
            let rest: Vec<&str> = words.collect();
            let is_primary = rest.first() == Some(&"primary");
            let (width, height, x, y) = rest.iter().find_map(|w| parse_geometry(w))?;
            Some(DisplayInfo {
                name: name.to_string(),
                width,
                height,
                x,
                y,
                is_primary,
            })
        })
        .collect()
}

/// Current X screen size from the `Screen 0: ... current W x H, ...` line
pub fn parse_screen_size(output: &str) -> Option<(u32, u32)> {
    let line = output.lines().find(|line| line.starts_with("Screen "))?;
    let current = line.split(',').find_map(|part| part.trim().strip_prefix("current "))?;
    let (w, h) = current.split_once(" x ")?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Window area from `xwininfo` output
///
/// Uses the absolute upper-left corner and the `Width:`/`Height:` lines.
pub fn parse_xwininfo(output: &str) -> Option<DisplayInfo> {
    let field = |label: &str| -> Option<i64> {
        output
            .lines()
            .find_map(|line| line.trim().strip_prefix(label))
            .and_then(|value| value.trim().parse().ok())
    };
    let x = field("Absolute upper-left X:")?;
    let y = field("Absolute upper-left Y:")?;
    let width = field("Width:")?;
    let height = field("Height:")?;

    Some(DisplayInfo {
        name: "window".to_string(),
        width: u32::try_from(width).ok().filter(|w| *w > 0)?,
        height: u32::try_from(height).ok().filter(|h| *h > 0)?,
        x: i32::try_from(x).ok()?,
        y: i32::try_from(y).ok()?,
        is_primary: false,
    })
}

/// Parse `WxH+X+Y`
fn parse_geometry(word: &str) -> Option<(u32, u32, i32, i32)> {
    let (size, offset) = word.split_once('+')?;
    let (w, h) = size.split_once('x')?;
    let (x, y) = offset.split_once('+')?;
    Some((w.parse().ok()?, h.parse().ok()?, x.parse().ok()?, y.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const XRANDR: &str = "\
Screen 0: minimum 320 x 200, current 4480 x 1440, maximum 16384 x 16384
eDP-1 connected primary 1920x1080+0+0 (normal left inverted right x axis y axis) 344mm x 194mm
   1920x1080     60.03*+  48.03
HDMI-1 connected 2560x1440+1920+0 (normal left inverted right x axis y axis) 597mm x 336mm
   2560x1440     59.95*+
DP-1 disconnected (normal left inverted right x axis y axis)
DP-2 connected (normal left inverted right x axis y axis)
";

    #[test]
    fn test_parse_connected_outputs() {
        let displays = parse_xrandr(XRANDR);
        assert_eq!(displays.len(), 2);

        assert_eq!(displays[0].name, "eDP-1");
        assert!(displays[0].is_primary);
        assert_eq!(displays[0].size(), "1920x1080");

        assert_eq!(displays[1].name, "HDMI-1");
        assert!(!displays[1].is_primary);
        assert_eq!((displays[1].x, displays[1].y), (1920, 0));
    }

    #[test]
    fn test_find_display_ignores_case() {
        let displays = parse_xrandr(XRANDR);
        assert_eq!(find_display(&displays, "hdmi-1").map(|d| d.width), Some(2560));
        assert!(find_display(&displays, "DP-1").is_none());
    }

    #[test]
    fn test_select_display_falls_back_to_primary() {
        let displays = parse_xrandr(XRANDR);
        assert_eq!(select_display(&displays, Some("HDMI-1")).map(|d| d.x), Some(1920));
        assert_eq!(select_display(&displays, Some("VGA-9")).map(|d| d.name.as_str()), Some("eDP-1"));
        assert_eq!(select_display(&displays, None).map(|d| d.name.as_str()), Some("eDP-1"));
        assert!(select_display(&[], None).is_none());
    }

    #[test]
    fn test_parse_geometry_rejects_garbage() {
        assert_eq!(parse_geometry("1920x1080+0+0"), Some((1920, 1080, 0, 0)));
        assert_eq!(parse_geometry("(normal"), None);
        assert_eq!(parse_geometry("1920x1080"), None);
    }

    #[test]
    fn test_default_display_is_whole_screen() {
        let display = default_display((1280, 720));
        assert_eq!(display.size(), "1280x720");
        assert_eq!((display.x, display.y), (0, 0));
        assert!(display.is_primary);
    }

    const XWININFO: &str = "
xwininfo: Please select the window about which you
          would like information by clicking the
          mouse in that window.

xwininfo: Window id: 0x3a00007 \"Terminal\"

  Absolute upper-left X:  1930
  Absolute upper-left Y:  64
  Relative upper-left X:  10
  Relative upper-left Y:  45
  Width: 1280
  Height: 720
  Depth: 32
  Border width: 0
  -geometry 1280x720+1920+19
";

    #[test]
    fn test_parse_xwininfo() {
        let window = parse_xwininfo(XWININFO).unwrap();
        assert_eq!(window.size(), "1280x720");
        assert_eq!((window.x, window.y), (1930, 64));
        assert_eq!(window.grab_target(":0.0"), ":0.0+1930+64");
        assert!(!window.is_primary);
    }

    #[test]
    fn test_parse_xwininfo_needs_every_field() {
        let without_height = XWININFO.replace("Height: 720", "");
        assert!(parse_xwininfo(&without_height).is_none());
        assert!(parse_xwininfo(&XWININFO.replace("Width: 1280", "Width: 0")).is_none());
        assert!(parse_xwininfo("xwininfo: error: No such window").is_none());
    }

    #[test]
    fn test_parse_screen_size() {
        assert_eq!(parse_screen_size(XRANDR), Some((4480, 1440)));
        assert_eq!(parse_screen_size("eDP-1 connected 1920x1080+0+0"), None);
    }

    #[test]
    fn test_capture_source_names() {
        let source: CaptureSource = serde_json::from_str("\"desktop\"").unwrap();
        assert_eq!(source, CaptureSource::Desktop);
        assert_eq!(CaptureSource::default(), CaptureSource::Display);
    }
}
