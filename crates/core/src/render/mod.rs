//! Raster output for one tick: trail wash, spectrum bars, waveform trace and
//! particles, painted with `tiny-skia`.

use tiny_skia::{
    Color, FillRule, GradientStop, LinearGradient, Paint, PathBuilder, Pixmap, Point, Rect,
    SpreadMode, Stroke, Transform,
};

use crate::{particles::Particle, RenderConfig};

/// Extra pixels around a bar covered by each glow layer, with its opacity.
const BAR_GLOW: [(f32, f32); 2] = [(6.0, 0.12), (3.0, 0.3)];
/// Stroke width multiplier and opacity of each waveform glow layer.
const WAVE_GLOW: [(f32, f32); 2] = [(4.0, 0.15), (2.0, 0.35)];
/// Radius multiplier and opacity factor of the particle halo.
const PARTICLE_GLOW: (f32, f32) = (2.5, 0.3);

/// Read-only view of the analysis state drawn for a tick.
#[derive(Debug, Clone, Copy)]
pub struct RenderFrame<'a> {
    /// Smoothed bar heights in pixels.
    pub bars: &'a [f32],
    /// Raw magnitudes, used to decide which bars glow.
    pub magnitudes: &'a [u8],
    /// Smoothed waveform y coordinates in pixels.
    pub waveform: &'a [f32],
    pub particles: &'a [Particle],
}

/// Paints one visual frame onto a raster surface.
#[derive(Debug, Clone)]
pub struct Renderer {
    config: RenderConfig,
    particle_radius: f32,
}

impl Renderer {
    pub fn new(config: RenderConfig, particle_radius: f32) -> Self {
        Self {
            config,
            particle_radius,
        }
    }

    /// Fades the previous frame, then paints bars, the waveform and particles
    /// in that order. The surface keeps its size.
    pub fn draw(&self, surface: &mut Pixmap, frame: &RenderFrame<'_>) {
        self.fade(surface);
        self.draw_bars(surface, frame.bars, frame.magnitudes);
        self.draw_waveform(surface, frame.waveform);
        self.draw_particles(surface, frame.particles);
    }

    /// Translucent black wash that leaves fading trails of earlier frames.
    fn fade(&self, surface: &mut Pixmap) {
        let Some(rect) = Rect::from_xywh(0.0, 0.0, surface.width() as f32, surface.height() as f32)
        else {
            return;
        };
        let paint = solid_paint([0, 0, 0], self.config.trail_alpha);
        surface.fill_rect(rect, &paint, Transform::identity(), None);
    }

    fn draw_bars(&self, surface: &mut Pixmap, bars: &[f32], magnitudes: &[u8]) {
        if bars.is_empty() {
            return;
        }
        let width = surface.width() as f32;
        let height = surface.height() as f32;
        let slot = width / bars.len() as f32;
        let bar_width = (slot - self.config.bar_gap).max(1.0);

        for (i, &value) in bars.iter().enumerate() {
            let bar_height = value.clamp(0.0, height);
            if bar_height < 0.5 {
                continue;
            }
            let x = i as f32 * slot;
            let top = height - bar_height;
            let hue = i as f32 / bars.len() as f32 * 360.0;
            let tip = hsl_to_rgb(hue, 1.0, 0.5);
            let base = hsl_to_rgb(hue, 1.0, 0.2);

            let glowing = magnitudes
                .get(i)
                .is_some_and(|&m| m > self.config.glow_threshold);
            if glowing {
                for (spread, alpha) in BAR_GLOW {
                    if let Some(rect) = Rect::from_xywh(
                        x - spread,
                        top - spread,
                        bar_width + 2.0 * spread,
                        bar_height + spread,
                    ) {
                        surface.fill_rect(rect, &solid_paint(tip, alpha), Transform::identity(), None);
                    }
                }
            }

            let Some(rect) = Rect::from_xywh(x, top, bar_width, bar_height) else {
                continue;
            };
            let mut paint = Paint::default();
            paint.anti_alias = true;
            match LinearGradient::new(
                Point::from_xy(x, top),
                Point::from_xy(x, height),
                vec![
                    GradientStop::new(0.0, rgb_color(tip, 1.0)),
                    GradientStop::new(1.0, rgb_color(base, 1.0)),
                ],
                SpreadMode::Pad,
                Transform::identity(),
            ) {
                Some(shader) => paint.shader = shader,
                None => paint.set_color(rgb_color(tip, 1.0)),
            }
            surface.fill_rect(rect, &paint, Transform::identity(), None);
        }
    }

    fn draw_waveform(&self, surface: &mut Pixmap, points: &[f32]) {
        if points.len() < 2 {
            return;
        }
        let step = surface.width() as f32 / (points.len() - 1) as f32;
        let mut builder = PathBuilder::new();
        builder.move_to(0.0, points[0]);
        for (i, &y) in points.iter().enumerate().skip(1) {
            builder.line_to(i as f32 * step, y);
        }
        let Some(path) = builder.finish() else {
            return;
        };

        let color = self.config.waveform_color;
        let base_width = self.config.waveform_width;
        let layers = WAVE_GLOW
            .iter()
            .map(|&(scale, alpha)| (base_width * scale, alpha))
            .chain(std::iter::once((base_width, 1.0)));
        for (width, alpha) in layers {
            let stroke = Stroke {
                width,
                ..Stroke::default()
            };
            surface.stroke_path(
                &path,
                &solid_paint(color, alpha),
                &stroke,
                Transform::identity(),
                None,
            );
        }
    }

    fn draw_particles(&self, surface: &mut Pixmap, particles: &[Particle]) {
        let (halo_scale, halo_alpha) = PARTICLE_GLOW;
        for particle in particles {
            let opacity = particle.opacity();
            if opacity <= 0.0 {
                continue;
            }
            let color = particle.rgb();
            let layers = [
                (self.particle_radius * halo_scale, opacity * halo_alpha),
                (self.particle_radius, opacity),
            ];
            for (radius, alpha) in layers {
                if let Some(circle) = PathBuilder::from_circle(particle.x, particle.y, radius) {
                    surface.fill_path(
                        &circle,
                        &solid_paint(color, alpha),
                        FillRule::Winding,
                        Transform::identity(),
                        None,
                    );
                }
            }
        }
    }
}

fn rgb_color(rgb: [u8; 3], alpha: f32) -> Color {
    let alpha = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color::from_rgba8(rgb[0], rgb[1], rgb[2], alpha)
}

fn solid_paint(rgb: [u8; 3], alpha: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(rgb_color(rgb, alpha));
    paint.anti_alias = true;
    paint
}

/// Converts hue (degrees), saturation and lightness (0-1) to RGB bytes.
pub fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> [u8; 3] {
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    let to_byte = |v: f32| ((v + m).clamp(0.0, 1.0) * 255.0).round() as u8;
    [to_byte(r), to_byte(g), to_byte(b)]
}
