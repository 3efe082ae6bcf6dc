//! Icon generation for the menu bar.
//!
//! The speaker glyph is drawn in black with alpha only, so it can be used as
//! a template image that the menu bar recolors for light and dark mode.

/// Icon size in pixels.
pub const ICON_SIZE: u32 = 32;

/// Create the menu bar icon.
#[cfg(target_os = "macos")]
pub fn create_speaker_icon() -> Result<tray_icon::Icon, String> {
    tray_icon::Icon::from_rgba(speaker_icon_rgba(), ICON_SIZE, ICON_SIZE)
        .map_err(|e| e.to_string())
}

/// Generate the speaker glyph as RGBA data.
pub fn speaker_icon_rgba() -> Vec<u8> {
    let size = ICON_SIZE as usize;
    let mut rgba = vec![0u8; size * size * 4];
    let mid = size as f32 / 2.0;

    for y in 0..size {
        for x in 0..size {
            let fx = x as f32 + 0.5;
            let fy = y as f32 + 0.5;
            if in_speaker_body(fx, fy, mid) || in_sound_wave(fx, fy, mid) {
                set_opaque(&mut rgba, size, x, y);
            }
        }
    }

    rgba
}

/// Driver box plus the flared cone.
fn in_speaker_body(x: f32, y: f32, mid: f32) -> bool {
    let dy = (y - mid).abs();

    // Box
    if (4.0..10.0).contains(&x) {
        return dy < 4.0;
    }

    // Cone widens from the box towards the front
    if (10.0..17.0).contains(&x) {
        return dy < 4.0 + (x - 10.0);
    }

    false
}

/// Two concentric arcs in front of the cone.
fn in_sound_wave(x: f32, y: f32, mid: f32) -> bool {
    let origin_x = 14.0;
    let dx = x - origin_x;
    let dy = y - mid;
    if dx <= 0.0 || dy.abs() > dx {
        return false;
    }

    let dist = (dx * dx + dy * dy).sqrt();
    (7.0..9.0).contains(&dist) || (11.5..13.5).contains(&dist)
}

fn set_opaque(rgba: &mut [u8], size: usize, x: usize, y: usize) {
    let idx = (y * size + x) * 4;
    rgba[idx] = 0;
    rgba[idx + 1] = 0;
    rgba[idx + 2] = 0;
    rgba[idx + 3] = 255;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alpha_at(rgba: &[u8], x: usize, y: usize) -> u8 {
        rgba[(y * ICON_SIZE as usize + x) * 4 + 3]
    }

    #[test]
    fn test_icon_dimensions() {
        let rgba = speaker_icon_rgba();
        assert_eq!(rgba.len(), (ICON_SIZE * ICON_SIZE * 4) as usize);
    }

    #[test]
    fn test_glyph_is_drawn() {
        let rgba = speaker_icon_rgba();
        // Inside the box, and the empty corner.
        assert_eq!(alpha_at(&rgba, 6, 16), 255);
        assert_eq!(alpha_at(&rgba, 0, 0), 0);
        // First wave straight ahead of the cone.
        assert_eq!(alpha_at(&rgba, 22, 16), 255);
    }
}
