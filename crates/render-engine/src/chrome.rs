//! Browser-chrome overlay.
//!
//! Draws a minimal browser frame along the top of each output frame:
//! traffic lights, an active tab, and an address bar showing the host and
//! path of the most recent navigation. Address text needs a system font;
//! when none is found the bar is drawn without text.

use ab_glyph::{FontArc, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

/// Height of the chrome bar in pixels.
pub const CHROME_HEIGHT: u32 = 48;

const BAR_BG: Rgba<u8> = Rgba([38, 38, 42, 255]);
const TAB_BG: Rgba<u8> = Rgba([58, 58, 64, 255]);
const ADDRESS_BG: Rgba<u8> = Rgba([28, 28, 32, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([200, 200, 205, 255]);
const LIGHT_RED: Rgba<u8> = Rgba([255, 95, 87, 255]);
const LIGHT_YELLOW: Rgba<u8> = Rgba([254, 188, 46, 255]);
const LIGHT_GREEN: Rgba<u8> = Rgba([40, 200, 64, 255]);

/// Reduce a URL to `host/path` for the address bar.
pub fn url_host_path(url: &str) -> String {
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    let without_fragment = without_scheme
        .split_once('#')
        .map(|(head, _)| head)
        .unwrap_or(without_scheme);
    let without_query = without_fragment
        .split_once('?')
        .map(|(head, _)| head)
        .unwrap_or(without_fragment);
    without_query.trim_end_matches('/').to_string()
}

/// Locate a usable system font for overlay text.
pub fn find_system_font() -> Option<FontArc> {
    const CANDIDATES: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
        "/Library/Fonts/Arial.ttf",
    ];
    for path in CANDIDATES {
        if let Ok(bytes) = std::fs::read(path) {
            if let Ok(font) = FontArc::try_from_vec(bytes) {
                return Some(font);
            }
        }
    }
    tracing::debug!("No system font found; chrome overlay text disabled");
    None
}

/// Draw the chrome bar onto `frame`.
pub fn draw_chrome(frame: &mut RgbaImage, url: &str, font: Option<&FontArc>) {
    let width = frame.width();
    if width < 200 || frame.height() <= CHROME_HEIGHT {
        return;
    }

    draw_filled_rect_mut(
        frame,
        Rect::at(0, 0).of_size(width, CHROME_HEIGHT),
        BAR_BG,
    );

    // Traffic lights.
    let cy = (CHROME_HEIGHT / 2) as i32;
    for (i, color) in [LIGHT_RED, LIGHT_YELLOW, LIGHT_GREEN].iter().enumerate() {
        draw_filled_circle_mut(frame, (20 + i as i32 * 22, cy), 6, *color);
    }

    // Active tab.
    draw_filled_rect_mut(frame, Rect::at(92, 8).of_size(160, CHROME_HEIGHT - 16), TAB_BG);

    // Address bar.
    let bar_x = 268i32;
    let bar_width = width.saturating_sub(bar_x as u32 + 16);
    if bar_width < 40 {
        return;
    }
    draw_filled_rect_mut(
        frame,
        Rect::at(bar_x, 10).of_size(bar_width, CHROME_HEIGHT - 20),
        ADDRESS_BG,
    );

    if let Some(font) = font {
        let display = url_host_path(url);
        let scale = PxScale::from(16.0);
        draw_text_mut(
            frame,
            TEXT_COLOR,
            bar_x + 12,
            (CHROME_HEIGHT as i32 - 16) / 2,
            scale,
            font,
            &display,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_path_strips_scheme_query_and_fragment() {
        assert_eq!(
            url_host_path("http://localhost:3000/app?tab=1#top"),
            "localhost:3000/app"
        );
        assert_eq!(url_host_path("https://example.com/"), "example.com");
        assert_eq!(url_host_path("example.com/x/y"), "example.com/x/y");
    }

    #[test]
    fn chrome_paints_the_top_bar() {
        let mut frame = RgbaImage::from_pixel(640, 360, Rgba([9, 9, 9, 255]));
        draw_chrome(&mut frame, "http://localhost:3000", None);

        assert_eq!(*frame.get_pixel(320, 4), BAR_BG);
        // Content below the bar is untouched.
        assert_eq!(*frame.get_pixel(320, CHROME_HEIGHT + 4), Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn tiny_frames_are_left_alone() {
        let mut frame = RgbaImage::from_pixel(100, 40, Rgba([1, 2, 3, 255]));
        let before = frame.clone();
        draw_chrome(&mut frame, "http://x", None);
        assert_eq!(frame, before);
    }
}
