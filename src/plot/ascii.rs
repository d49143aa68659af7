//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Lines are drawn first and only fill blank cells; point series overlay them.

/// How a series is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesStyle {
    /// Consecutive points joined by line segments.
    Line,
    /// Isolated markers.
    Points,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    pub label: String,
    pub glyph: char,
    pub style: SeriesStyle,
    pub points: Vec<(f64, f64)>,
}

impl PlotSeries {
    pub fn line(label: impl Into<String>, glyph: char, x: &[f64], y: &[f64]) -> Self {
        Self::new(label, glyph, SeriesStyle::Line, x, y)
    }

    pub fn points(label: impl Into<String>, glyph: char, x: &[f64], y: &[f64]) -> Self {
        Self::new(label, glyph, SeriesStyle::Points, x, y)
    }

    fn new(label: impl Into<String>, glyph: char, style: SeriesStyle, x: &[f64], y: &[f64]) -> Self {
        Self {
            label: label.into(),
            glyph,
            style,
            points: x.iter().copied().zip(y.iter().copied()).collect(),
        }
    }
}

/// Render every series on one grid, followed by a legend line.
pub fn render_ascii_plot(series: &[PlotSeries], x_label: &str, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let all = || series.iter().flat_map(|s| s.points.iter().copied());
    let (x_min, x_max) = range(all().map(|(x, _)| x)).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = range(all().map(|(_, y)| y)).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    for s in series.iter().filter(|s| s.style == SeriesStyle::Line) {
        draw_curve(&mut grid, &s.points, s.glyph, (x_min, x_max), (y_min, y_max));
    }
    for s in series.iter().filter(|s| s.style == SeriesStyle::Points) {
        for &(x, y) in &s.points {
            if !(x.is_finite() && y.is_finite()) {
                continue;
            }
            let col = map_x(x, x_min, x_max, width);
            let row = map_y(y, y_min, y_max, height);
            grid[row][col] = s.glyph;
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {x_label}=[{x_min:.2}, {x_max:.2}] | y=[{y_min:.3}, {y_max:.3}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    let legend: Vec<String> = series.iter().map(|s| format!("{} {}", s.glyph, s.label)).collect();
    out.push_str(&legend.join("  "));
    out.push('\n');

    out
}

fn range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min.is_finite() && max.is_finite() && max > min {
        Some((min, max))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], glyph: char, xr: (f64, f64), yr: (f64, f64)) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        if !(x.is_finite() && y.is_finite()) {
            prev = None;
            continue;
        }
        let col = map_x(x, xr.0, xr.1, width);
        let row = map_y(y, yr.0, yr.1, height);
        match prev {
            Some((c0, r0)) => draw_line(grid, c0, r0, col, row, glyph),
            None if grid[row][col] == ' ' => grid[row][col] = glyph,
            None => {}
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_golden_snapshot_small() {
        let series = vec![
            PlotSeries::line("fit", '-', &[0.0, 10.0], &[0.0, 0.0]),
            PlotSeries::points("observed", 'o', &[0.0, 10.0], &[0.0, 1.0]),
        ];

        let txt = render_ascii_plot(&series, "TI (ms)", 10, 5);
        let expected = concat!(
            "Plot: TI (ms)=[0.00, 10.00] | y=[-0.050, 1.050]\n",
            "         o\n",
            "          \n",
            "          \n",
            "          \n",
            "o---------\n",
            "- fit  o observed\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn non_finite_points_are_skipped() {
        let series = vec![PlotSeries::points("observed", 'o', &[0.0, 1.0, 2.0], &[0.0, f64::NAN, 1.0])];
        let txt = render_ascii_plot(&series, "x", 10, 5);
        let markers: usize = txt.lines().skip(1).take(5).map(|l| l.matches('o').count()).sum();
        assert_eq!(markers, 2);
    }
}
