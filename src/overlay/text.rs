/// Text measurement and rasterization for the metadata banner
///
/// The banner face is bundled with the binary so widths, and therefore the
/// right-aligned `Name:` line, come out the same on every machine.

use ab_glyph::{point, Font, FontRef, Glyph, PxScale, ScaleFont};
use image::RgbaImage;

use super::annotator::blend_over;
use super::AnnotateError;

/// DejaVu Sans Bold, see assets/fonts/DejaVu-LICENSE
static BANNER_FONT_DATA: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// A bold sans-serif face at a fixed em size
pub struct BannerFont {
    font: FontRef<'static>,
    scale: PxScale,
}

impl BannerFont {
    /// Load the bundled face sized so one em is `em_px` pixels, like a CSS `font-size`
    pub fn new(em_px: f32) -> Result<Self, AnnotateError> {
        let font = FontRef::try_from_slice(BANNER_FONT_DATA)?;

        // PxScale is the ascent-to-descent height, not the em box
        let units_per_em = font.units_per_em().unwrap_or(2048.0);
        let scale = PxScale::from(em_px * font.height_unscaled() / units_per_em);

        Ok(Self { font, scale })
    }

    /// Advance width of `text` in pixels, kerning included
    pub fn measure(&self, text: &str) -> f32 {
        self.layout(text, 0.0, 0.0).1
    }

    /// Draw `text` with its left edge at `x` and its alphabetic baseline at `baseline`
    ///
    /// Pixels falling outside the surface are skipped, so lines wider than
    /// the photo are clipped rather than rejected.
    pub fn draw(&self, surface: &mut RgbaImage, text: &str, x: f32, baseline: f32, color: [u8; 3]) {
        let (width, height) = (surface.width() as i64, surface.height() as i64);
        let (glyphs, _) = self.layout(text, x, baseline);

        for glyph in glyphs {
            let Some(outlined) = self.font.outline_glyph(glyph) else {
                // whitespace has no outline
                continue;
            };

            let bounds = outlined.px_bounds();
            let (left, top) = (bounds.min.x as i64, bounds.min.y as i64);

            outlined.draw(|gx, gy, coverage| {
                let px = left + gx as i64;
                let py = top + gy as i64;
                if px < 0 || py < 0 || px >= width || py >= height {
                    return;
                }
                blend_over(surface.get_pixel_mut(px as u32, py as u32), color, coverage);
            });
        }
    }

    /// Position every glyph along the baseline, returning them with the total advance
    fn layout(&self, text: &str, x: f32, baseline: f32) -> (Vec<Glyph>, f32) {
        let scaled = self.font.as_scaled(self.scale);
        let mut caret = x;
        let mut previous = None;
        let mut glyphs = Vec::with_capacity(text.len());

        for c in text.chars().filter(|c| !c.is_control()) {
            let id = scaled.glyph_id(c);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            glyphs.push(id.with_scale_and_position(self.scale, point(caret, baseline)));
            caret += scaled.h_advance(id);
            previous = Some(id);
        }

        (glyphs, caret - x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_empty_string_has_no_width() {
        let font = BannerFont::new(24.0).unwrap();
        assert_eq!(font.measure(""), 0.0);
    }

    #[test]
    fn test_width_grows_with_text() {
        let font = BannerFont::new(24.0).unwrap();
        let short = font.measure("Name: A");
        let long = font.measure("Name: Alexandria");
        assert!(short > 0.0);
        assert!(long > short);
    }

    #[test]
    fn test_em_size_scales_width() {
        let small = BannerFont::new(12.0).unwrap();
        let large = BannerFont::new(24.0).unwrap();
        let ratio = large.measure("Location") / small.measure("Location");
        assert!((ratio - 2.0).abs() < 0.05, "ratio was {ratio}");
    }

    #[test]
    fn test_draw_marks_pixels_near_baseline() {
        let font = BannerFont::new(24.0).unwrap();
        let mut surface = RgbaImage::from_pixel(200, 60, Rgba([0, 0, 0, 255]));
        font.draw(&mut surface, "PM#", 10.0, 40.0, [255, 255, 255]);

        let lit: Vec<(u32, u32)> = surface
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] > 128)
            .map(|(x, y, _)| (x, y))
            .collect();

        assert!(!lit.is_empty());
        // glyphs sit above the baseline and start at the left edge
        assert!(lit.iter().all(|&(_, y)| y <= 41));
        assert!(lit.iter().all(|&(x, _)| x >= 10));
    }

    #[test]
    fn test_draw_clips_outside_surface() {
        let font = BannerFont::new(24.0).unwrap();
        let mut surface = RgbaImage::from_pixel(30, 10, Rgba([0, 0, 0, 255]));
        font.draw(&mut surface, "Name: somebody with a long name", -50.0, 5.0, [255, 255, 255]);
    }
}
