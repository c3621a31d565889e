//! Minimal SVG line charts.
//!
//! A [`Figure`] is a grid of [`Panel`]s. Every panel has its own axes, an optional secondary
//! y axis on the right, and a legend per axis.

use std::fmt::{self, Write as _};
use std::path::Path;

use crate::error::{ExperimentError, Result};

pub const RED: &str = "#d62728";
pub const BLUE: &str = "#1f77b4";
pub const GREEN: &str = "#2ca02c";
pub const PURPLE: &str = "#9467bd";
pub const ORANGE: &str = "#ff7f0e";

const MARGIN_LEFT: f64 = 70.;
const MARGIN_RIGHT: f64 = 20.;
const MARGIN_SECONDARY: f64 = 70.;
const MARGIN_TOP: f64 = 40.;
const MARGIN_BOTTOM: f64 = 60.;
const FONT: &str = "font-family=\"sans-serif\" font-size=\"12\"";

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub color: String,
    pub points: Vec<(f64, f64)>,
}

impl Series {
    pub fn new(label: &str, color: &str, points: Vec<(f64, f64)>) -> Self {
        Self {
            label: label.to_string(),
            color: color.to_string(),
            points,
        }
    }
}

/// How the x axis is labelled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum XTicks {
    Numeric,
    /// x is in hours: a "Day N" label every 24 hours, hour of day labels every `minor_hours`.
    Days { minor_hours: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub title: Option<String>,
    pub x_label: String,
    pub y_label: String,
    pub secondary_label: Option<String>,
    pub x_limits: Option<(f64, f64)>,
    pub y_limits: Option<(f64, f64)>,
    pub x_ticks: XTicks,
    pub series: Vec<Series>,
    pub secondary: Vec<Series>,
}

impl Panel {
    pub fn new(x_label: &str, y_label: &str) -> Self {
        Self {
            title: None,
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            secondary_label: None,
            x_limits: None,
            y_limits: None,
            x_ticks: XTicks::Numeric,
            series: Vec::new(),
            secondary: Vec::new(),
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn x_limits(mut self, min: f64, max: f64) -> Self {
        self.x_limits = Some((min, max));
        self
    }

    pub fn y_limits(mut self, min: f64, max: f64) -> Self {
        self.y_limits = Some((min, max));
        self
    }

    pub fn day_ticks(mut self, minor_hours: u32) -> Self {
        self.x_ticks = XTicks::Days { minor_hours };
        self
    }

    pub fn line(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    /// Adds a series drawn against the secondary y axis on the right.
    pub fn secondary_line(mut self, y_label: &str, series: Series) -> Self {
        self.secondary_label = Some(y_label.to_string());
        self.secondary.push(series);
        self
    }

    fn x_range(&self) -> (f64, f64) {
        self.x_limits.unwrap_or_else(|| {
            data_range(self.series.iter().chain(&self.secondary).flat_map(|s| s.points.iter().map(|p| p.0)))
        })
    }

    fn y_range(&self) -> (f64, f64) {
        self.y_limits.unwrap_or_else(|| padded(data_range(self.series.iter().flat_map(|s| s.points.iter().map(|p| p.1)))))
    }

    fn secondary_range(&self) -> (f64, f64) {
        padded(data_range(self.secondary.iter().flat_map(|s| s.points.iter().map(|p| p.1))))
    }
}

fn data_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min > max {
        (0., 1.)
    } else if min == max {
        (min - 1., max + 1.)
    } else {
        (min, max)
    }
}

fn padded((min, max): (f64, f64)) -> (f64, f64) {
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

/// Tick positions at a 1-2-5 step covering `[min, max]`.
pub fn nice_ticks(min: f64, max: f64, target: usize) -> Vec<f64> {
    let span = max - min;
    if !(span > 0.) || !span.is_finite() {
        return vec![min];
    }
    let raw = span / target.max(1) as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1., 2., 5., 10.].iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10. * magnitude);
    let first = (min / step).ceil() as i64;
    let last = (max / step).floor() as i64;
    (first..=last).map(|i| i as f64 * step).collect()
}

fn tick_label(value: f64, ticks: &[f64]) -> String {
    let step = if ticks.len() > 1 { ticks[1] - ticks[0] } else { 1. };
    let decimals = if step >= 1. { 0 } else { (-step.log10()).ceil() as usize };
    format!("{:.*}", decimals, value)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Maps data coordinates of a panel to pixels.
#[derive(Clone, Copy)]
struct Frame {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    x: (f64, f64),
    y: (f64, f64),
}

impl Frame {
    fn px(&self, x: f64) -> f64 {
        self.left + (x - self.x.0) / (self.x.1 - self.x.0) * self.width
    }

    fn py(&self, y: f64) -> f64 {
        self.top + self.height - (y - self.y.0) / (self.y.1 - self.y.0) * self.height
    }

    fn with_y(&self, y: (f64, f64)) -> Self {
        Self { y, ..*self }
    }
}

pub struct Figure {
    rows: usize,
    cols: usize,
    width: f64,
    height: f64,
    panels: Vec<Panel>,
}

impl Figure {
    pub fn single(panel: Panel, width: f64, height: f64) -> Self {
        Self::grid(1, 1, vec![panel], width, height)
    }

    /// Panels fill the grid row by row.
    pub fn grid(rows: usize, cols: usize, panels: Vec<Panel>, width: f64, height: f64) -> Self {
        Self { rows, cols, width, height, panels }
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn to_svg(&self) -> std::result::Result<String, fmt::Error> {
        let mut out = String::new();
        writeln!(out, "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
                 w = self.width, h = self.height)?;
        writeln!(out, "<rect width=\"100%\" height=\"100%\" fill=\"white\"/>")?;
        let cell_w = self.width / self.cols.max(1) as f64;
        let cell_h = self.height / self.rows.max(1) as f64;
        for (index, panel) in self.panels.iter().enumerate().take(self.rows * self.cols) {
            let (row, col) = (index / self.cols.max(1), index % self.cols.max(1));
            render_panel(&mut out, panel, index, col as f64 * cell_w, row as f64 * cell_h, cell_w, cell_h)?;
        }
        writeln!(out, "</svg>")?;
        Ok(out)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let svg = self.to_svg()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ExperimentError::io(parent, e))?;
        }
        std::fs::write(path, svg).map_err(|e| ExperimentError::io(path, e))
    }
}

fn render_panel(out: &mut String, panel: &Panel, index: usize, x0: f64, y0: f64, w: f64, h: f64) -> fmt::Result {
    let right = if panel.secondary.is_empty() { MARGIN_RIGHT } else { MARGIN_SECONDARY };
    let frame = Frame {
        left: x0 + MARGIN_LEFT,
        top: y0 + MARGIN_TOP,
        width: (w - MARGIN_LEFT - right).max(1.),
        height: (h - MARGIN_TOP - MARGIN_BOTTOM).max(1.),
        x: panel.x_range(),
        y: panel.y_range(),
    };
    let bottom = frame.top + frame.height;

    writeln!(out, "<g>")?;
    writeln!(out, "<clipPath id=\"plot-area-{}\"><rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\"/></clipPath>",
             index, frame.left, frame.top, frame.width, frame.height)?;
    writeln!(out, "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"none\" stroke=\"black\"/>",
             frame.left, frame.top, frame.width, frame.height)?;

    if let Some(title) = &panel.title {
        writeln!(out, "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" {} font-weight=\"bold\">{}</text>",
                 frame.left + frame.width / 2., y0 + MARGIN_TOP / 2. + 4., FONT, escape(title))?;
    }

    render_x_ticks(out, panel, &frame)?;
    let y_ticks = nice_ticks(frame.y.0, frame.y.1, 6);
    for tick in &y_ticks {
        let y = frame.py(*tick);
        writeln!(out, "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"black\"/>",
                 frame.left - 4., y, frame.left, y)?;
        writeln!(out, "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" {}>{}</text>",
                 frame.left - 6., y + 4., FONT, tick_label(*tick, &y_ticks))?;
    }

    writeln!(out, "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" {}>{}</text>",
             frame.left + frame.width / 2., bottom + 45., FONT, escape(&panel.x_label))?;
    let label_x = x0 + 16.;
    let label_y = frame.top + frame.height / 2.;
    writeln!(out, "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" transform=\"rotate(-90 {:.1} {:.1})\" {}>{}</text>",
             label_x, label_y, label_x, label_y, FONT, escape(&panel.y_label))?;

    for series in &panel.series {
        render_series(out, series, &frame, index)?;
    }
    render_legend(out, &panel.series, frame.left + 8., frame.top + 8., "start")?;

    if !panel.secondary.is_empty() {
        let secondary = frame.with_y(panel.secondary_range());
        let ticks = nice_ticks(secondary.y.0, secondary.y.1, 6);
        let axis_x = frame.left + frame.width;
        for tick in &ticks {
            let y = secondary.py(*tick);
            writeln!(out, "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"black\"/>",
                     axis_x, y, axis_x + 4., y)?;
            writeln!(out, "<text x=\"{:.1}\" y=\"{:.1}\" {}>{}</text>", axis_x + 6., y + 4., FONT, tick_label(*tick, &ticks))?;
        }
        if let Some(label) = &panel.secondary_label {
            let label_x = x0 + w - 12.;
            writeln!(out, "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" transform=\"rotate(90 {:.1} {:.1})\" {}>{}</text>",
                     label_x, label_y, label_x, label_y, FONT, escape(label))?;
        }
        for series in &panel.secondary {
            render_series(out, series, &secondary, index)?;
        }
        render_legend(out, &panel.secondary, frame.left + frame.width - 8., frame.top + 8., "end")?;
    }
    writeln!(out, "</g>")
}

fn render_x_ticks(out: &mut String, panel: &Panel, frame: &Frame) -> fmt::Result {
    let bottom = frame.top + frame.height;
    let in_range = |x: f64| x >= frame.x.0 && x <= frame.x.1;
    match panel.x_ticks {
        XTicks::Numeric => {
            let ticks = nice_ticks(frame.x.0, frame.x.1, 8);
            for tick in &ticks {
                let x = frame.px(*tick);
                writeln!(out, "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"black\"/>",
                         x, bottom, x, bottom + 4.)?;
                writeln!(out, "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" {}>{}</text>",
                         x, bottom + 18., FONT, tick_label(*tick, &ticks))?;
            }
        }
        XTicks::Days { minor_hours } => {
            let minor = minor_hours.max(1) as f64;
            let first = (frame.x.0 / minor).ceil() as i64;
            let last = (frame.x.1 / minor).floor() as i64;
            for step in first..=last {
                let hours = step as f64 * minor;
                if !in_range(hours) {
                    continue;
                }
                let x = frame.px(hours);
                let hour_of_day = hours.rem_euclid(24.);
                writeln!(out, "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"black\"/>",
                         x, bottom, x, bottom + 4.)?;
                writeln!(out, "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" {}>{:02}</text>",
                         x, bottom + 16., FONT, hour_of_day as u32)?;
                if hour_of_day == 0. {
                    writeln!(out, "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" {}>Day {}</text>",
                             x, bottom + 31., FONT, (hours / 24.) as i64 + 1)?;
                }
            }
        }
    }
    Ok(())
}

fn render_series(out: &mut String, series: &Series, frame: &Frame, index: usize) -> fmt::Result {
    let mut points = String::new();
    for (x, y) in series.points.iter().filter(|(x, y)| x.is_finite() && y.is_finite()) {
        write!(points, "{:.2},{:.2} ", frame.px(*x), frame.py(*y))?;
    }
    writeln!(out, "<polyline clip-path=\"url(#plot-area-{})\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.5\" points=\"{}\"/>",
             index, series.color, points.trim_end())
}

fn render_legend(out: &mut String, series: &[Series], x: f64, y: f64, anchor: &str) -> fmt::Result {
    for (row, s) in series.iter().enumerate() {
        let line_y = y + 6. + row as f64 * 16.;
        let (line_start, text_x) = if anchor == "end" { (x - 20., x - 24.) } else { (x, x + 24.) };
        writeln!(out, "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"2\"/>",
                 line_start, line_y, line_start + 20., line_y, s.color)?;
        writeln!(out, "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"{}\" {}>{}</text>",
                 text_x, line_y + 4., anchor, FONT, escape(&s.label))?;
    }
    Ok(())
}
