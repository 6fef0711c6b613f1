// Figures are drawn once per backend: a PNG for quick viewing and an SVG for editing.
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

use super::combine::PlotSeries;
use super::constants::{MAX_CONDITION_PANELS, MAX_TRAJECTORY_PANELS, PLOT_HEIGHT, PLOT_WIDTH};
use super::error::PlotError;
use super::targets::Point;

const SERIES_COLORS: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(128, 0, 128),
    RGBColor(0, 0, 0),
    RGBColor(214, 39, 40),
    RGBColor(44, 160, 44),
    RGBColor(255, 127, 14),
];
const STIMULUS_COLOR: RGBColor = RGBColor(255, 0, 0);
const FONT: &str = "sans-serif";

fn drawing_err<E: std::fmt::Display>(e: E) -> PlotError {
    PlotError::DrawingError(e.to_string())
}

pub fn series_color(idx: usize) -> RGBColor {
    SERIES_COLORS[idx % SERIES_COLORS.len()]
}

/// A figure that can be drawn on any plotters backend
pub trait Figure {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<(), PlotError>;
}

/// Render a figure to `<stem>.png` and `<stem>.svg`. Returns the written paths.
pub fn render<F: Figure>(figure: &F, stem: &Path) -> Result<Vec<PathBuf>, PlotError> {
    if let Some(parent) = stem.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let png = stem.with_extension("png");
    let svg = stem.with_extension("svg");
    {
        let root = BitMapBackend::new(&png, (PLOT_WIDTH, PLOT_HEIGHT)).into_drawing_area();
        figure.draw(&root)?;
        root.present().map_err(drawing_err)?;
    }
    {
        let root = SVGBackend::new(&svg, (PLOT_WIDTH, PLOT_HEIGHT)).into_drawing_area();
        figure.draw(&root)?;
        root.present().map_err(drawing_err)?;
    }
    log::info!("Wrote {}", png.to_string_lossy());
    Ok(vec![png, svg])
}

/// Split points into runs of consecutive finite values
fn finite_runs(points: impl Iterator<Item = (f64, f64)>) -> Vec<Vec<(f64, f64)>> {
    let mut runs: Vec<Vec<(f64, f64)>> = vec![];
    let mut current = vec![];
    for (x, y) in points {
        if x.is_finite() && y.is_finite() {
            current.push((x, y));
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Smallest range covering every finite value, padded by 5%
fn data_range<'a>(values: impl Iterator<Item = &'a f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    let pad = if hi > lo { (hi - lo) * 0.05 } else { 0.5 };
    (lo - pad, hi + pad)
}

fn draw_spans<DB: DrawingBackend>(
    chart: &mut ChartContext<DB, Cartesian2d<plotters::coord::types::RangedCoordf64, plotters::coord::types::RangedCoordf64>>,
    spans: &[(f64, f64)],
    y_range: (f64, f64),
) -> Result<(), PlotError> {
    chart
        .draw_series(spans.iter().map(|(start, end)| {
            Rectangle::new(
                [(*start, y_range.0), (*end, y_range.1)],
                STIMULUS_COLOR.mix(0.15).filled(),
            )
        }))
        .map_err(drawing_err)?;
    Ok(())
}

/// Mean time series of several conditions with a shaded spread and the stimulus window
#[derive(Debug, Clone)]
pub struct TimeseriesFigure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub series: Vec<PlotSeries>,
    pub spans: Vec<(f64, f64)>,
    /// Shade +/- the standard error instead of the standard deviation
    pub use_sem: bool,
}

impl Figure for TimeseriesFigure {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<(), PlotError> {
        root.fill(&WHITE).map_err(drawing_err)?;
        let mut chart = ChartBuilder::on(root)
            .caption(&self.title, (FONT, 24))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(
                self.x_range.0..self.x_range.1,
                self.y_range.0..self.y_range.1,
            )
            .map_err(drawing_err)?;
        chart
            .configure_mesh()
            .x_desc(self.x_label.as_str())
            .y_desc(self.y_label.as_str())
            .draw()
            .map_err(drawing_err)?;

        draw_spans(&mut chart, &self.spans, self.y_range)?;

        for (idx, series) in self.series.iter().enumerate() {
            let color = series_color(idx);
            let spread: Vec<f64> = series
                .std
                .iter()
                .zip(series.n.iter())
                .map(|(std, n)| {
                    if self.use_sem {
                        std / (*n as f64).sqrt()
                    } else {
                        *std
                    }
                })
                .collect();

            let edge = |sign: f64| {
                finite_runs(
                    series
                        .xaxis
                        .iter()
                        .zip(series.value.iter().zip(spread.iter()))
                        .map(|(x, (v, e))| (*x, v + sign * e)),
                )
            };
            for (upper, lower) in edge(1.0).into_iter().zip(edge(-1.0)) {
                if upper.len() < 2 {
                    continue;
                }
                let mut polygon = upper;
                polygon.extend(lower.into_iter().rev());
                chart
                    .draw_series(std::iter::once(Polygon::new(polygon, color.mix(0.2).filled())))
                    .map_err(drawing_err)?;
            }

            let runs = finite_runs(
                series
                    .xaxis
                    .iter()
                    .copied()
                    .zip(series.value.iter().copied()),
            );
            for (run_idx, run) in runs.into_iter().enumerate() {
                let anno = chart
                    .draw_series(LineSeries::new(run, color.stroke_width(2)))
                    .map_err(drawing_err)?;
                if run_idx == 0 {
                    anno.label(series.label.as_str()).legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                    });
                }
            }
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(drawing_err)?;
        Ok(())
    }
}

/// Panel layout for a per-condition figure
pub fn condition_grid(n_panels: usize) -> Result<(usize, usize), PlotError> {
    match n_panels {
        0 | 1 => Ok((1, 1)),
        2 => Ok((2, 1)),
        3 | 4 => Ok((2, 2)),
        5 | 6 => Ok((3, 2)),
        7..=MAX_CONDITION_PANELS => Ok((3, 3)),
        n => Err(PlotError::TooManyPanels(n, MAX_CONDITION_PANELS)),
    }
}

/// Panel layout for a trajectory figure
pub fn trajectory_grid(n_panels: usize) -> Result<(usize, usize), PlotError> {
    match n_panels {
        0..=8 => Ok((2, 4)),
        9..=12 => Ok((3, 4)),
        13..=MAX_TRAJECTORY_PANELS => Ok((4, 4)),
        n => Err(PlotError::TooManyPanels(n, MAX_TRAJECTORY_PANELS)),
    }
}

/// One panel of a per-condition figure: the individual trials and their mean
#[derive(Debug, Clone)]
pub struct ConditionPanel {
    pub title: String,
    pub traces: Vec<Vec<(f64, f64)>>,
    pub mean: Vec<(f64, f64)>,
    pub spans: Vec<(f64, f64)>,
}

/// One measurement across conditions, one panel per condition
#[derive(Debug, Clone)]
pub struct ConditionPanelsFigure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub panels: Vec<ConditionPanel>,
}

impl Figure for ConditionPanelsFigure {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<(), PlotError> {
        root.fill(&WHITE).map_err(drawing_err)?;
        let root = root.titled(&self.title, (FONT, 24)).map_err(drawing_err)?;
        let (rows, cols) = condition_grid(self.panels.len())?;
        let x_range = data_range(
            self.panels
                .iter()
                .flat_map(|p| p.traces.iter().flatten().chain(p.mean.iter()))
                .map(|(x, _)| x),
        );
        let y_range = data_range(
            self.panels
                .iter()
                .flat_map(|p| p.traces.iter().flatten().chain(p.mean.iter()))
                .map(|(_, y)| y),
        );

        for (panel, area) in self.panels.iter().zip(root.split_evenly((rows, cols))) {
            let mut chart = ChartBuilder::on(&area)
                .caption(&panel.title, (FONT, 16))
                .margin(8)
                .x_label_area_size(30)
                .y_label_area_size(40)
                .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)
                .map_err(drawing_err)?;
            chart
                .configure_mesh()
                .x_desc(self.x_label.as_str())
                .y_desc(self.y_label.as_str())
                .draw()
                .map_err(drawing_err)?;
            draw_spans(&mut chart, &panel.spans, y_range)?;
            for (idx, trace) in panel.traces.iter().enumerate() {
                for run in finite_runs(trace.iter().copied()) {
                    chart
                        .draw_series(LineSeries::new(run, series_color(idx).mix(0.6)))
                        .map_err(drawing_err)?;
                }
            }
            for run in finite_runs(panel.mean.iter().copied()) {
                chart
                    .draw_series(LineSeries::new(run, BLACK.stroke_width(2)))
                    .map_err(drawing_err)?;
            }
        }
        Ok(())
    }
}

/// Trajectories of every trial of an experiment, with the target areas
#[derive(Debug, Clone)]
pub struct TrajectoryFigure {
    pub title: String,
    pub trials: Vec<(String, Vec<(f64, f64)>)>,
    pub targets: Vec<Point>,
    pub area_radius: f64,
}

impl Figure for TrajectoryFigure {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<(), PlotError> {
        root.fill(&WHITE).map_err(drawing_err)?;
        let root = root.titled(&self.title, (FONT, 24)).map_err(drawing_err)?;
        let (rows, cols) = trajectory_grid(self.trials.len())?;

        let xs = self
            .trials
            .iter()
            .flat_map(|(_, p)| p.iter().map(|(x, _)| x))
            .chain(self.targets.iter().map(|t| &t.x));
        let ys = self
            .trials
            .iter()
            .flat_map(|(_, p)| p.iter().map(|(_, y)| y))
            .chain(self.targets.iter().map(|t| &t.y));
        let (x_range, y_range) = (data_range(xs), data_range(ys));

        let areas: Vec<Vec<(f64, f64)>> = self
            .targets
            .iter()
            .map(|t| {
                (0..=36)
                    .map(|i| {
                        let a = i as f64 * std::f64::consts::PI / 18.0;
                        (t.x + self.area_radius * a.cos(), t.y + self.area_radius * a.sin())
                    })
                    .collect()
            })
            .collect();

        for ((label, path), area) in self.trials.iter().zip(root.split_evenly((rows, cols))) {
            // image coordinates: y grows downwards
            let mut chart = ChartBuilder::on(&area)
                .caption(label, (FONT, 14))
                .margin(5)
                .build_cartesian_2d(x_range.0..x_range.1, y_range.1..y_range.0)
                .map_err(drawing_err)?;
            chart
                .draw_series(
                    areas
                        .iter()
                        .map(|a| Polygon::new(a.clone(), STIMULUS_COLOR.mix(0.2).filled())),
                )
                .map_err(drawing_err)?;
            for run in finite_runs(path.iter().copied()) {
                chart
                    .draw_series(LineSeries::new(run, series_color(0)))
                    .map_err(drawing_err)?;
            }
        }
        Ok(())
    }
}

/// A labelled line, optionally with symmetric error bars
#[derive(Debug, Clone)]
pub struct Line {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub errors: Option<Vec<f64>>,
}

/// Several labelled lines on one set of axes
#[derive(Debug, Clone)]
pub struct LinesFigure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub lines: Vec<Line>,
}

impl Figure for LinesFigure {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<(), PlotError> {
        root.fill(&WHITE).map_err(drawing_err)?;
        let x_range = data_range(self.lines.iter().flat_map(|l| l.points.iter().map(|(x, _)| x)));
        let bounds: Vec<f64> = self
            .lines
            .iter()
            .flat_map(|l| {
                l.points.iter().enumerate().flat_map(move |(i, (_, y))| {
                    let e = l.errors.as_ref().map(|e| e[i]).filter(|e| e.is_finite());
                    let e = e.unwrap_or(0.0);
                    [y - e, y + e]
                })
            })
            .collect();
        let y_range = data_range(bounds.iter());

        let mut chart = ChartBuilder::on(root)
            .caption(&self.title, (FONT, 24))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)
            .map_err(drawing_err)?;
        chart
            .configure_mesh()
            .x_desc(self.x_label.as_str())
            .y_desc(self.y_label.as_str())
            .draw()
            .map_err(drawing_err)?;

        for (idx, line) in self.lines.iter().enumerate() {
            let color = series_color(idx);
            for (run_idx, run) in finite_runs(line.points.iter().copied()).into_iter().enumerate() {
                let anno = chart
                    .draw_series(LineSeries::new(run, color.stroke_width(2)))
                    .map_err(drawing_err)?;
                if run_idx == 0 {
                    anno.label(line.label.as_str()).legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                    });
                }
            }
            if let Some(errors) = &line.errors {
                chart
                    .draw_series(
                        line.points
                            .iter()
                            .zip(errors.iter())
                            .filter(|((_, y), e)| y.is_finite() && e.is_finite())
                            .map(|((x, y), e)| PathElement::new(vec![(*x, y - e), (*x, y + e)], color)),
                    )
                    .map_err(drawing_err)?;
            }
        }
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(drawing_err)?;
        Ok(())
    }
}

/// Grouped bars: one group per category (trial), one bar per experiment
#[derive(Debug, Clone)]
pub struct BarsFigure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub n_categories: usize,
    pub groups: Vec<Line>,
}

impl Figure for BarsFigure {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<(), PlotError> {
        root.fill(&WHITE).map_err(drawing_err)?;
        let n_groups = self.groups.len().max(1);
        let width = 0.8 / n_groups as f64;
        let top = self
            .groups
            .iter()
            .flat_map(|g| {
                g.points.iter().enumerate().map(move |(i, (_, v))| {
                    v + g.errors.as_ref().map(|e| e[i]).filter(|e| e.is_finite()).unwrap_or(0.0)
                })
            })
            .filter(|v| v.is_finite())
            .fold(0.0_f64, f64::max);

        let mut chart = ChartBuilder::on(root)
            .caption(&self.title, (FONT, 24))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(-0.5..(self.n_categories as f64 - 0.5), 0.0..(top * 1.1).max(1.0))
            .map_err(drawing_err)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(self.n_categories.max(1))
            .x_label_formatter(&|v| format!("{:.0}", v))
            .x_desc(self.x_label.as_str())
            .y_desc(self.y_label.as_str())
            .draw()
            .map_err(drawing_err)?;

        for (g_idx, group) in self.groups.iter().enumerate() {
            let color = series_color(g_idx);
            let offset = -0.4 + g_idx as f64 * width;
            let anno = chart
                .draw_series(
                    group
                        .points
                        .iter()
                        .filter(|(_, v)| v.is_finite())
                        .map(|(x, v)| {
                            Rectangle::new([(x + offset, 0.0), (x + offset + width, *v)], color.filled())
                        }),
                )
                .map_err(drawing_err)?;
            anno.label(group.label.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.filled()));
            if let Some(errors) = &group.errors {
                chart
                    .draw_series(
                        group
                            .points
                            .iter()
                            .zip(errors.iter())
                            .filter(|((_, v), e)| v.is_finite() && e.is_finite())
                            .map(|((x, v), e)| {
                                let cx = x + offset + width / 2.0;
                                PathElement::new(vec![(cx, v - e), (cx, v + e)], BLACK)
                            }),
                    )
                    .map_err(drawing_err)?;
            }
        }
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(drawing_err)?;
        Ok(())
    }
}

/// Open rendered plots with the platform viewer
pub fn show(paths: &[PathBuf]) -> Result<(), PlotError> {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    };
    for path in paths.iter().filter(|p| p.extension().is_some_and(|e| e == "png")) {
        std::process::Command::new(opener).arg(path).spawn()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_grid() {
        assert_eq!(condition_grid(1).unwrap(), (1, 1));
        assert_eq!(condition_grid(3).unwrap(), (2, 2));
        assert_eq!(condition_grid(9).unwrap(), (3, 3));
        assert!(matches!(
            condition_grid(10),
            Err(PlotError::TooManyPanels(10, 9))
        ));
    }

    #[test]
    fn test_trajectory_grid() {
        assert_eq!(trajectory_grid(8).unwrap(), (2, 4));
        assert_eq!(trajectory_grid(12).unwrap(), (3, 4));
        assert_eq!(trajectory_grid(16).unwrap(), (4, 4));
        assert!(trajectory_grid(17).is_err());
    }

    #[test]
    fn test_finite_runs_split_on_gaps() {
        let runs = finite_runs(
            vec![(0.0, 1.0), (1.0, f64::NAN), (2.0, 2.0), (3.0, 3.0)].into_iter(),
        );
        assert_eq!(runs, vec![vec![(0.0, 1.0)], vec![(2.0, 2.0), (3.0, 3.0)]]);
    }

    #[test]
    fn test_render_writes_png_and_svg() {
        let dir = tempfile::tempdir().unwrap();
        let figure = TimeseriesFigure {
            title: String::from("Wing Extension"),
            x_label: String::from("Time (s)"),
            y_label: String::from("Wing Ext. Index, +/- SEM"),
            x_range: (-10.0, 20.0),
            y_range: (-0.1, 0.6),
            series: vec![PlotSeries {
                label: String::from("P1>TRPA1"),
                xaxis: vec![-10.0, -5.0, 0.0, 5.0, 10.0],
                value: vec![0.1, 0.2, f64::NAN, 0.3, 0.2],
                std: vec![0.05, 0.05, f64::NAN, 0.1, f64::NAN],
                n: vec![3, 3, 0, 3, 1],
            }],
            spans: vec![(-10.0, 0.0)],
            use_sem: true,
        };
        let written = render(&figure, &dir.path().join("plots").join("wing")).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_every_figure_renders_labelled_png() {
        let dir = tempfile::tempdir().unwrap();
        let plots = dir.path().join("plots");
        let trace = vec![(-5.0, 0.0), (0.0, 0.5), (5.0, 1.0)];

        let panels = ConditionPanelsFigure {
            title: String::from("Wing Extension"),
            x_label: String::from("Time (s)"),
            y_label: String::from("Wing Ext. Index"),
            panels: vec![
                ConditionPanel {
                    title: String::from("wGP"),
                    traces: vec![trace.clone(), vec![(-5.0, 1.0), (5.0, f64::NAN)]],
                    mean: trace.clone(),
                    spans: vec![(-5.0, 0.0)],
                },
                ConditionPanel {
                    title: String::from("40347"),
                    traces: vec![],
                    mean: vec![],
                    spans: vec![],
                },
            ],
        };
        let trajectories = TrajectoryFigure {
            title: String::from("coupled"),
            trials: vec![
                (String::from("trial 0"), vec![(0.0, 0.0), (1.0, 2.0), (2.0, 1.0)]),
                (String::from("trial 1"), vec![(3.0, 3.0), (f64::NAN, 1.0), (2.0, 2.0)]),
            ],
            targets: vec![Point::new(1.0, 1.0)],
            area_radius: 0.5,
        };
        let lines = LinesFigure {
            title: String::from("Time in area"),
            x_label: String::from("Time (s)"),
            y_label: String::from("Percent in area"),
            lines: vec![
                Line {
                    label: String::from("coupled"),
                    points: vec![(0.0, 10.0), (30.0, 25.0), (60.0, f64::NAN)],
                    errors: Some(vec![2.0, f64::NAN, 1.0]),
                },
                Line {
                    label: String::from("uncoupled"),
                    points: vec![(0.0, 5.0), (30.0, 5.0)],
                    errors: None,
                },
            ],
        };
        let bars = BarsFigure {
            title: String::from("Latency to stay"),
            x_label: String::from("Visit"),
            y_label: String::from("Latency (s)"),
            n_categories: 2,
            groups: vec![Line {
                label: String::from("coupled"),
                points: vec![(0.0, 12.0), (1.0, 40.0)],
                errors: Some(vec![3.0, f64::NAN]),
            }],
        };

        let written = [
            render(&panels, &plots.join("panels")).unwrap(),
            render(&trajectories, &plots.join("trajectories")).unwrap(),
            render(&lines, &plots.join("lines")).unwrap(),
            render(&bars, &plots.join("bars")).unwrap(),
        ];
        for paths in written.iter() {
            let png = paths
                .iter()
                .find(|p| p.extension().map(|e| e == "png").unwrap_or(false))
                .unwrap();
            assert!(std::fs::metadata(png).unwrap().len() > 0);
            assert!(paths.iter().all(|p| p.exists()));
        }
    }
}
