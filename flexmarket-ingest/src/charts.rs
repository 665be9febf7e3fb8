use std::{error::Error, fmt, fs, path::PathBuf};

use flexmarket_client::{
    analytics::{
        by_category, by_duration, by_hour, by_month, by_price_tier, by_weekday, by_year,
        clearing_events, cumulative_volume, ranked_by_count, ranked_by_volume, GroupStat,
    },
    DispatchRow, PtuRow,
};
use plotters::prelude::*;
use time::OffsetDateTime;

const BAR_COLOR: RGBColor = RGBColor(33, 150, 243);
const LINE_COLOR: RGBColor = RGBColor(255, 152, 0);
const TOP_PROVIDERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// One bar per group, in the given order.
    Bar,
    /// A value over time.
    Line,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bar => "bar",
            Self::Line => "line",
        })
    }
}

/// Aggregated data handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    Groups(Vec<(String, f64)>),
    Series(Vec<(OffsetDateTime, f64)>),
}

impl ChartData {
    fn shape(&self) -> &'static str {
        match self {
            Self::Groups(_) => "grouped",
            Self::Series(_) => "time series",
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Groups(g) => g.is_empty(),
            Self::Series(s) => s.is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub file_name: String,
    pub title: String,
    pub y_label: String,
    pub kind: ChartKind,
    pub data: ChartData,
}

impl ChartSpec {
    fn bar(name: &str, title: &str, y_label: &str, groups: Vec<(String, f64)>) -> Self {
        Self {
            file_name: format!("{name}.svg"),
            title: title.to_string(),
            y_label: y_label.to_string(),
            kind: ChartKind::Bar,
            data: ChartData::Groups(groups),
        }
    }

    fn line(name: &str, title: &str, y_label: &str, series: Vec<(OffsetDateTime, f64)>) -> Self {
        Self {
            file_name: format!("{name}.svg"),
            title: title.to_string(),
            y_label: y_label.to_string(),
            kind: ChartKind::Line,
            data: ChartData::Series(series),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("{kind} chart cannot draw {shape} data")]
    UnsupportedShape { kind: ChartKind, shape: &'static str },
    #[error("no data to draw")]
    NoData,
    #[error("chart backend error: {0}")]
    Backend(String),
    #[error("chart io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of rendering a chart set.
#[derive(Debug, Default)]
pub struct RenderSummary {
    pub rendered: Vec<PathBuf>,
    pub failed: usize,
}

/// Renders chart specs to SVG files in one directory.
pub struct ChartRenderer {
    output_dir: PathBuf,
    width: u32,
    height: u32,
}

impl ChartRenderer {
    pub fn new<P: Into<PathBuf>>(output_dir: P, width: u32, height: u32) -> Self {
        Self {
            output_dir: output_dir.into(),
            width,
            height,
        }
    }

    pub fn render(&self, spec: &ChartSpec) -> Result<PathBuf, RenderError> {
        let svg = self.to_svg(spec)?;

        fs::create_dir_all(&self.output_dir).map_err(|source| RenderError::Io {
            path: self.output_dir.clone(),
            source,
        })?;
        let path = self.output_dir.join(&spec.file_name);
        fs::write(&path, svg).map_err(|source| RenderError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Render every spec. A failed chart is logged and counted; the rest
    /// still render.
    pub fn render_all(&self, specs: &[ChartSpec]) -> RenderSummary {
        let mut summary = RenderSummary::default();
        for spec in specs {
            match self.render(spec) {
                Ok(path) => {
                    metrics::counter!("charts_rendered_total").increment(1);
                    tracing::info!(chart = %spec.file_name, path = %path.display(), "chart rendered");
                    summary.rendered.push(path);
                }
                Err(e) => {
                    metrics::counter!("charts_failed_total").increment(1);
                    tracing::warn!(chart = %spec.file_name, error = %e, "chart failed");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    fn to_svg(&self, spec: &ChartSpec) -> Result<String, RenderError> {
        let size = (self.width, self.height);
        let mut svg = String::new();
        let drawn = match (spec.kind, &spec.data) {
            (ChartKind::Bar, ChartData::Groups(_)) | (ChartKind::Line, ChartData::Series(_))
                if spec.data.is_empty() =>
            {
                return Err(RenderError::NoData)
            }
            (ChartKind::Bar, ChartData::Groups(groups)) => draw_bars(&mut svg, size, spec, groups),
            (ChartKind::Line, ChartData::Series(series)) => draw_line(&mut svg, size, spec, series),
            (kind, data) => {
                return Err(RenderError::UnsupportedShape {
                    kind,
                    shape: data.shape(),
                })
            }
        };
        drawn.map_err(|e| RenderError::Backend(e.to_string()))?;
        Ok(svg)
    }
}

/// Y range starting at zero (or below, for negative values) with headroom.
fn value_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let span = if max > min { max - min } else { 1.0 };
    let low = if min < 0.0 { min - span * 0.05 } else { 0.0 };
    (low, max + span * 0.05)
}

fn draw_bars(
    svg: &mut String,
    size: (u32, u32),
    spec: &ChartSpec,
    groups: &[(String, f64)],
) -> Result<(), Box<dyn Error>> {
    let root = SVGBackend::with_string(svg, size).into_drawing_area();
    root.fill(&WHITE)?;

    let (y_min, y_max) = value_range(groups.iter().map(|(_, v)| *v));
    let n = groups.len();
    let label_at = |x: &f64| {
        let idx = x.round();
        if (x - idx).abs() > 1e-6 || idx < 0.0 {
            return String::new();
        }
        groups
            .get(idx as usize)
            .map(|(label, _)| label.clone())
            .unwrap_or_default()
    };

    let mut chart = ChartBuilder::on(&root)
        .caption(&spec.title, ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5_f64..(n as f64 - 0.5), y_min..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&label_at)
        .y_desc(spec.y_label.as_str())
        .label_style(("sans-serif", 12))
        .draw()?;

    chart.draw_series(groups.iter().enumerate().map(|(i, (_, value))| {
        let x = i as f64;
        Rectangle::new([(x - 0.4, 0.0), (x + 0.4, *value)], BAR_COLOR.filled())
    }))?;

    root.present()?;
    Ok(())
}

fn draw_line(
    svg: &mut String,
    size: (u32, u32),
    spec: &ChartSpec,
    series: &[(OffsetDateTime, f64)],
) -> Result<(), Box<dyn Error>> {
    let root = SVGBackend::with_string(svg, size).into_drawing_area();
    root.fill(&WHITE)?;

    let points: Vec<(f64, f64)> = series
        .iter()
        .map(|(at, v)| (at.unix_timestamp() as f64, *v))
        .collect();
    let x_min = points.iter().map(|(x, _)| *x).fold(f64::INFINITY, f64::min);
    let mut x_max = points.iter().map(|(x, _)| *x).fold(f64::NEG_INFINITY, f64::max);
    if x_max <= x_min {
        x_max = x_min + 86_400.0;
    }
    let (y_min, y_max) = value_range(points.iter().map(|(_, y)| *y));

    let mut chart = ChartBuilder::on(&root)
        .caption(&spec.title, ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_labels(8)
        .x_label_formatter(&|x| day_label(*x))
        .x_desc("Date")
        .y_desc(spec.y_label.as_str())
        .label_style(("sans-serif", 12))
        .draw()?;

    chart.draw_series(LineSeries::new(points, &LINE_COLOR))?;

    root.present()?;
    Ok(())
}

fn day_label(unix_seconds: f64) -> String {
    OffsetDateTime::from_unix_timestamp(unix_seconds as i64)
        .map(|t| t.date().to_string())
        .unwrap_or_default()
}

fn volumes<K: fmt::Display>(stats: &[GroupStat<K>]) -> Vec<(String, f64)> {
    stats.iter().map(|s| (s.key.to_string(), s.volume)).collect()
}

fn counts<K: fmt::Display>(stats: &[GroupStat<K>]) -> Vec<(String, f64)> {
    stats.iter().map(|s| (s.key.to_string(), s.count as f64)).collect()
}

fn hour_labels(stats: &[GroupStat<u8>], value: impl Fn(&GroupStat<u8>) -> f64) -> Vec<(String, f64)> {
    stats.iter().map(|s| (format!("{:02}:00", s.key), value(s))).collect()
}

/// The UKPN chart set.
pub fn dispatch_charts(rows: &[DispatchRow]) -> Vec<ChartSpec> {
    let providers = ranked_by_count(&by_category(rows, |r| r.company_name.as_str()));
    let top_providers: Vec<_> = providers.into_iter().take(TOP_PROVIDERS).collect();

    vec![
        ChartSpec::bar(
            "ukpn_monthly_volume",
            "Utilisation volume per month",
            "MWh",
            volumes(&by_month(rows)),
        ),
        ChartSpec::bar(
            "ukpn_weekday_count",
            "Dispatches per weekday",
            "Dispatches",
            counts(&by_weekday(rows)),
        ),
        ChartSpec::bar(
            "ukpn_hourly_count",
            "Dispatches per start hour",
            "Dispatches",
            hour_labels(&by_hour(rows), |s| s.count as f64),
        ),
        ChartSpec::bar(
            "ukpn_technology_volume",
            "Utilisation volume per technology",
            "MWh",
            volumes(&ranked_by_volume(&by_category(rows, |r| r.technology.as_str()))),
        ),
        ChartSpec::bar(
            "ukpn_product_volume",
            "Utilisation volume per product",
            "MWh",
            volumes(&ranked_by_volume(&by_category(rows, |r| r.product.as_str()))),
        ),
        ChartSpec::bar(
            "ukpn_top_providers",
            "Top providers by dispatch count",
            "Dispatches",
            counts(&top_providers),
        ),
        ChartSpec::bar(
            "ukpn_price_tiers",
            "Dispatches per utilisation price tier",
            "Dispatches",
            counts(&by_price_tier(rows)),
        ),
        ChartSpec::line(
            "ukpn_cumulative_volume",
            "Cumulative utilisation volume",
            "MWh",
            cumulative_volume(rows)
                .into_iter()
                .map(|p| (p.at, p.running_volume))
                .collect(),
        ),
    ]
}

/// The GOPACS chart set.
pub fn clearing_charts(rows: &[PtuRow]) -> Vec<ChartSpec> {
    let events = clearing_events(rows);

    vec![
        ChartSpec::bar(
            "gopacs_yearly_volume",
            "Cleared buy volume per year",
            "MW",
            volumes(&by_year(rows)),
        ),
        ChartSpec::bar(
            "gopacs_operator_volume",
            "Cleared buy volume per operator",
            "MW",
            volumes(&ranked_by_volume(&by_category(rows, |r| r.organisation_name.as_str()))),
        ),
        ChartSpec::bar(
            "gopacs_weekday_volume",
            "Cleared buy volume per weekday",
            "MW",
            volumes(&by_weekday(rows)),
        ),
        ChartSpec::bar(
            "gopacs_hourly_volume",
            "Cleared buy volume per PTU start hour",
            "MW",
            hour_labels(&by_hour(rows), |s| s.volume),
        ),
        ChartSpec::bar(
            "gopacs_event_durations",
            "Clearing events per duration",
            "Events",
            counts(&by_duration(&events)),
        ),
        ChartSpec::line(
            "gopacs_cumulative_volume",
            "Cumulative cleared buy volume",
            "MW",
            cumulative_volume(rows)
                .into_iter()
                .map(|p| (p.at, p.running_volume))
                .collect(),
        ),
    ]
}
