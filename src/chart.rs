// src/chart.rs
//! PNG trend charts.
//!
//! x = time, y = points, one line with square markers per clan over a light
//! grid. The title sits on top, tick values and the "Time"/"Points" axis
//! labels around the plot, the colour legend to its right. Text uses the
//! 8x8 bitmap glyphs from `font8x8`, scaled by whole pixels; anything outside
//! ASCII prints as `?`. The legend also travels with the notification caption
//! (see [`legend`]) where names keep their full spelling.

use std::path::Path;

use chrono::{NaiveDateTime, TimeDelta};
use font8x8::legacy::BASIC_LEGACY;
use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
use tracing::debug;

use crate::error::RenderError;
use crate::file::ensure_parent;
use crate::window::Series;

pub trait Renderer {
    fn render(&self, series: &Series, title: &str, out: &Path) -> Result<(), RenderError>;
}

const PALETTE: [(&str, [u8; 3]); 10] = [
    ("blue", [31, 119, 180]),
    ("orange", [255, 127, 14]),
    ("green", [44, 160, 44]),
    ("red", [214, 39, 40]),
    ("purple", [148, 103, 189]),
    ("brown", [140, 86, 75]),
    ("pink", [227, 119, 194]),
    ("gray", [127, 127, 127]),
    ("olive", [188, 189, 34]),
    ("cyan", [23, 190, 207]),
];

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const AXIS: Rgb<u8> = Rgb([40, 40, 40]);
const INK: Rgb<u8> = Rgb([20, 20, 20]);

const GLYPH: i64 = 8;
const DIVS: i64 = 6;
const TICK_FORMAT: &str = "%m-%d %H:%M";
const LEGEND_CHARS: usize = 22;

// Room around the plot area.
const MARGIN_LEFT: i64 = 100;
const MARGIN_TOP: i64 = 50;
const MARGIN_RIGHT: i64 = 220;
const MARGIN_BOTTOM: i64 = 130;

/// Colour name assigned to each series, in plotting order.
pub fn legend(series: &Series) -> Vec<(String, &'static str)> {
    series
        .keys()
        .enumerate()
        .map(|(i, name)| (name.clone(), PALETTE[i % PALETTE.len()].0))
        .collect()
}

pub struct PngChart {
    pub width: u32,
    pub height: u32,
}

impl Default for PngChart {
    fn default() -> Self {
        // matplotlib's 10x6 in at 100 dpi
        Self { width: 1000, height: 600 }
    }
}

struct Frame {
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
    t0: NaiveDateTime,
    t_span: f64,
    y0: f64,
    y_span: f64,
}

impl Frame {
    fn fit(width: u32, height: u32, series: &Series) -> Option<Self> {
        let points = series.values().flatten();
        let (mut t_min, mut t_max) = (None::<NaiveDateTime>, None::<NaiveDateTime>);
        let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(t, y) in points {
            t_min = Some(t_min.map_or(t, |m| m.min(t)));
            t_max = Some(t_max.map_or(t, |m| m.max(t)));
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
        let (t0, t1) = (t_min?, t_max?);

        let mut t_span = (t1 - t0).num_seconds() as f64;
        let mut t_origin = t0;
        if t_span <= 0.0 {
            // single instant: centre it in a one-hour span
            t_origin = t0 - TimeDelta::minutes(30);
            t_span = 3600.0;
        }

        let (y0, y_span) = if y_max - y_min <= f64::EPSILON {
            let pad = (y_max.abs() * 0.05).max(1.0);
            (y_min - pad, 2.0 * pad)
        } else {
            let pad = (y_max - y_min) * 0.05;
            (y_min - pad, (y_max - y_min) + 2.0 * pad)
        };

        let (w, h) = (width as i64, height as i64);
        let left = MARGIN_LEFT.min(w / 4);
        let top = MARGIN_TOP.min(h / 4);
        Some(Self {
            left,
            top,
            right: (w - MARGIN_RIGHT).max(left + 20),
            bottom: (h - MARGIN_BOTTOM).max(top + 20),
            t0: t_origin,
            t_span,
            y0,
            y_span,
        })
    }

    fn project(&self, t: NaiveDateTime, y: f64) -> (i64, i64) {
        let fx = (t - self.t0).num_seconds() as f64 / self.t_span;
        let fy = (y - self.y0) / self.y_span;
        let x = self.left + (fx * (self.right - self.left) as f64).round() as i64;
        let y = self.bottom - (fy * (self.bottom - self.top) as f64).round() as i64;
        (x, y)
    }

    fn tick_time(&self, k: i64) -> NaiveDateTime {
        self.t0 + TimeDelta::seconds((self.t_span * k as f64 / DIVS as f64).round() as i64)
    }

    fn tick_value(&self, k: i64) -> f64 {
        self.y0 + self.y_span * k as f64 / DIVS as f64
    }
}

impl PngChart {
    pub fn draw(&self, series: &Series, title: &str) -> Result<RgbImage, RenderError> {
        if series.values().all(|s| s.is_empty()) {
            return Err(RenderError::NoData);
        }
        let frame = Frame::fit(self.width, self.height, series).ok_or(RenderError::NoData)?;

        let mut img: RgbImage = ImageBuffer::from_pixel(self.width, self.height, BACKGROUND);
        draw_grid(&mut img, &frame);
        draw_ticks(&mut img, &frame);
        draw_labels(&mut img, &frame, title);

        for (i, (name, points)) in series.iter().enumerate() {
            let colour = Rgb(PALETTE[i % PALETTE.len()].1);
            let projected: Vec<(i64, i64)> =
                points.iter().map(|&(t, y)| frame.project(t, y)).collect();
            for pair in projected.windows(2) {
                draw_line(&mut img, pair[0], pair[1], colour);
            }
            for &p in &projected {
                draw_marker(&mut img, p, colour);
            }
            draw_legend_row(&mut img, &frame, i as i64, name, colour);
        }
        Ok(img)
    }
}

impl Renderer for PngChart {
    fn render(&self, series: &Series, title: &str, out: &Path) -> Result<(), RenderError> {
        let img = self.draw(series, title)?;
        ensure_parent(out).map_err(|source| RenderError::Io { path: out.to_path_buf(), source })?;
        img.save_with_format(out, ImageFormat::Png)
            .map_err(|source| RenderError::Image { path: out.to_path_buf(), source })?;
        debug!(%title, path = %out.display(), series = series.len(), "chart written");
        Ok(())
    }
}

/* ---------------- Chart furniture ---------------- */

fn draw_grid(img: &mut RgbImage, f: &Frame) {
    for k in 0..=DIVS {
        let x = f.left + (f.right - f.left) * k / DIVS;
        let y = f.top + (f.bottom - f.top) * k / DIVS;
        draw_line(img, (x, f.top), (x, f.bottom), GRID);
        draw_line(img, (f.left, y), (f.right, y), GRID);
    }
    draw_line(img, (f.left, f.bottom), (f.right, f.bottom), AXIS);
    draw_line(img, (f.left, f.top), (f.left, f.bottom), AXIS);
}

fn value_label(v: f64, span: f64) -> String {
    if span >= 10.0 { format!("{v:.0}") } else { format!("{v:.2}") }
}

fn draw_ticks(img: &mut RgbImage, f: &Frame) {
    for k in 0..=DIVS {
        // points, right-aligned against the y axis
        let y = f.bottom - (f.bottom - f.top) * k / DIVS;
        let label = value_label(f.tick_value(k), f.y_span);
        let x = f.left - 6 - text_width(&label, 1);
        draw_text(img, (x, y - GLYPH / 2), &label, 1, INK);

        // time, rotated so it reads upward and ends at the x axis
        let x = f.left + (f.right - f.left) * k / DIVS;
        let label = f.tick_time(k).format(TICK_FORMAT).to_string();
        draw_text_up(img, (x - GLYPH / 2, f.bottom + 6 + text_width(&label, 1)), &label, 1, INK);
    }
}

fn draw_labels(img: &mut RgbImage, f: &Frame, title: &str) {
    let width = img.width() as i64;
    let height = img.height() as i64;

    let x = ((width - text_width(title, 2)) / 2).max(0);
    draw_text(img, (x, (f.top - 2 * GLYPH) / 2), title, 2, INK);

    let x = f.left + (f.right - f.left - text_width("Time", 2)) / 2;
    draw_text(img, (x, height - 2 * GLYPH - 8), "Time", 2, INK);

    let y = f.top + (f.bottom - f.top + text_width("Points", 2)) / 2;
    draw_text_up(img, (8, y), "Points", 2, INK);
}

fn draw_legend_row(img: &mut RgbImage, f: &Frame, row: i64, name: &str, colour: Rgb<u8>) {
    let x = f.right + 16;
    let y = f.top + row * (GLYPH + 10);
    for dy in 0..GLYPH {
        for dx in 0..12 {
            put(img, x + dx, y + dy, colour);
        }
    }
    let name: String = name.chars().take(LEGEND_CHARS).collect();
    draw_text(img, (x + 18, y), &name, 1, INK);
}

/* ---------------- Text ---------------- */

fn glyph(c: char) -> [u8; 8] {
    let idx = if c.is_ascii() { c as usize } else { '?' as usize };
    BASIC_LEGACY[idx]
}

fn text_width(text: &str, scale: i64) -> i64 {
    text.chars().count() as i64 * GLYPH * scale
}

/// Horizontal text with its top-left corner at `origin`.
fn draw_text(img: &mut RgbImage, origin: (i64, i64), text: &str, scale: i64, c: Rgb<u8>) {
    for (i, ch) in text.chars().enumerate() {
        let cx = origin.0 + i as i64 * GLYPH * scale;
        plot_glyph(img, ch, scale, c, |gx, gy| (cx + gx, origin.1 + gy));
    }
}

/// Text turned a quarter left, reading bottom to top, starting at `origin`
/// (the bottom-left corner of the first glyph).
fn draw_text_up(img: &mut RgbImage, origin: (i64, i64), text: &str, scale: i64, c: Rgb<u8>) {
    for (i, ch) in text.chars().enumerate() {
        let cy = origin.1 - i as i64 * GLYPH * scale;
        plot_glyph(img, ch, scale, c, |gx, gy| (origin.0 + gy, cy - gx));
    }
}

fn plot_glyph(
    img: &mut RgbImage,
    ch: char,
    scale: i64,
    c: Rgb<u8>,
    place: impl Fn(i64, i64) -> (i64, i64),
) {
    for (row, &bits) in glyph(ch).iter().enumerate() {
        for col in 0..8i64 {
            if (bits >> col) & 1 == 0 {
                continue;
            }
            for sy in 0..scale {
                for sx in 0..scale {
                    let (x, y) = place(col * scale + sx, row as i64 * scale + sy);
                    put(img, x, y, c);
                }
            }
        }
    }
}

/* ---------------- Raster primitives ---------------- */

fn put(img: &mut RgbImage, x: i64, y: i64, c: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, c);
    }
}

// Bresenham, two pixels thick.
fn draw_line(img: &mut RgbImage, (x0, y0): (i64, i64), (x1, y1): (i64, i64), c: Rgb<u8>) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let (mut x, mut y, mut err) = (x0, y0, dx + dy);
    loop {
        put(img, x, y, c);
        if dx >= -dy { put(img, x, y + 1, c); } else { put(img, x + 1, y, c); }
        if x == x1 && y == y1 { break; }
        let e2 = 2 * err;
        if e2 >= dy { err += dy; x += sx; }
        if e2 <= dx { err += dx; y += sy; }
    }
}

fn draw_marker(img: &mut RgbImage, (cx, cy): (i64, i64), c: Rgb<u8>) {
    for y in cy - 3..=cy + 3 {
        for x in cx - 3..=cx + 3 {
            put(img, x, y, c);
        }
    }
}
