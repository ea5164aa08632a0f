//! Visualization utilities for xytheta_lattice
//!
//! Provides a unified interface for plotting lattice poses, obstacles and
//! paths using gnuplot. All coordinates are millimeters.

use gnuplot::{Figure, Caption, Color, PointSymbol, PointSize, LineWidth, AxesCommon, AutoOption};
use crate::common::ContinuousPose;
use crate::path_planning::lattice::{MotionPrimitive, PathSegment, RotatedRectangle};

/// Sample spacing used when drawing curved segments
const SEGMENT_DRAW_STEP_MM: f32 = 1.0;
const SEGMENT_DRAW_STEP_RAD: f32 = 0.05;

/// Color palette for consistent styling
pub mod colors {
    pub const BLACK: &str = "#000000";
    pub const RED: &str = "#FF0000";
    pub const GREEN: &str = "#00FF00";
    pub const BLUE: &str = "#0000FF";
    pub const YELLOW: &str = "#FFFF00";
    pub const CYAN: &str = "#00FFFF";
    pub const MAGENTA: &str = "#FF00FF";
    pub const ORANGE: &str = "#FFA500";
    pub const PURPLE: &str = "#800080";
    pub const GRAY: &str = "#808080";

    // Semantic colors
    pub const OBSTACLE: &str = BLACK;
    pub const START: &str = GREEN;
    pub const GOAL: &str = BLUE;
    pub const PATH: &str = RED;
    pub const ROBOT: &str = CYAN;
    pub const PRIMITIVE: &str = GRAY;
    pub const SEGMENT: &str = ORANGE;
}

/// Style for path rendering
#[derive(Debug, Clone)]
pub struct PathStyle {
    pub color: String,
    pub line_width: f64,
    pub caption: String,
}

impl PathStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            line_width: 2.0,
            caption: caption.to_string(),
        }
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        Self {
            color: colors::PATH.to_string(),
            line_width: 2.0,
            caption: "Path".to_string(),
        }
    }
}

/// Style for point rendering
#[derive(Debug, Clone)]
pub struct PointStyle {
    pub color: String,
    pub size: f64,
    pub symbol: char,
    pub caption: String,
}

impl PointStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            size: 1.0,
            symbol: 'O',
            caption: caption.to_string(),
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_symbol(mut self, symbol: char) -> Self {
        self.symbol = symbol;
        self
    }
}

/// Main visualizer struct
pub struct Visualizer {
    figure: Figure,
    title: String,
    x_label: String,
    y_label: String,
    x_range: Option<(f64, f64)>,
    y_range: Option<(f64, f64)>,
    aspect_ratio: Option<f64>,
}

impl Visualizer {
    /// Create a new visualizer
    pub fn new() -> Self {
        Self {
            figure: Figure::new(),
            title: String::new(),
            x_label: "X [mm]".to_string(),
            y_label: "Y [mm]".to_string(),
            x_range: None,
            y_range: None,
            aspect_ratio: Some(1.0),
        }
    }

    /// Set the plot title
    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    /// Set X axis label
    pub fn set_x_label(&mut self, label: &str) -> &mut Self {
        self.x_label = label.to_string();
        self
    }

    /// Set Y axis label
    pub fn set_y_label(&mut self, label: &str) -> &mut Self {
        self.y_label = label.to_string();
        self
    }

    /// Set X axis range
    pub fn set_x_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.x_range = Some((min, max));
        self
    }

    /// Set Y axis range
    pub fn set_y_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.y_range = Some((min, max));
        self
    }

    /// Set aspect ratio (None for auto)
    pub fn set_aspect_ratio(&mut self, ratio: Option<f64>) -> &mut Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Get mutable reference to the internal figure for advanced usage
    pub fn figure_mut(&mut self) -> &mut Figure {
        &mut self.figure
    }

    /// Plot a sequence of poses as a line
    pub fn plot_poses(&mut self, poses: &[ContinuousPose], style: &PathStyle) -> &mut Self {
        let x: Vec<f64> = poses.iter().map(|p| f64::from(p.x_mm)).collect();
        let y: Vec<f64> = poses.iter().map(|p| f64::from(p.y_mm)).collect();
        self.plot_path_xy(&x, &y, style)
    }

    /// Plot a path from x,y vectors
    pub fn plot_path_xy(&mut self, x: &[f64], y: &[f64], style: &PathStyle) -> &mut Self {
        self.figure.axes2d()
            .lines(x, y, &[
                Caption(&style.caption),
                Color(&style.color),
                LineWidth(style.line_width),
            ]);
        self
    }

    /// Plot driveable segments, sampled densely enough to show arcs
    pub fn plot_segments<I>(&mut self, segments: I, style: &PathStyle) -> &mut Self
    where
        I: IntoIterator<Item = PathSegment>,
    {
        let poses: Vec<ContinuousPose> = segments
            .into_iter()
            .flat_map(|segment| segment.sample(SEGMENT_DRAW_STEP_MM, SEGMENT_DRAW_STEP_RAD))
            .collect();
        self.plot_poses(&poses, style)
    }

    /// Plot rectangle outlines; only the first one carries the caption
    pub fn plot_rectangles<'a, I>(&mut self, rectangles: I, color: &str, caption: &str) -> &mut Self
    where
        I: IntoIterator<Item = &'a RotatedRectangle>,
    {
        let axes = self.figure.axes2d();
        for (i, rectangle) in rectangles.into_iter().enumerate() {
            let (x, y) = rectangle_outline(rectangle);
            if i == 0 {
                axes.lines(&x, &y, &[Caption(caption), Color(color), LineWidth(1.5)]);
            } else {
                axes.lines(&x, &y, &[Color(color), LineWidth(1.5)]);
            }
        }
        self
    }

    /// Plot the sampled curves of primitives that start at the origin
    pub fn plot_primitives(&mut self, primitives: &[MotionPrimitive], style: &PathStyle) -> &mut Self {
        let axes = self.figure.axes2d();
        for (i, prim) in primitives.iter().enumerate() {
            let (x, y): (Vec<f64>, Vec<f64>) = std::iter::once((0.0, 0.0))
                .chain(prim.intermediate_positions.iter().map(|p| (f64::from(p.x_mm), f64::from(p.y_mm))))
                .unzip();
            if i == 0 {
                axes.lines(&x, &y, &[Caption(&style.caption), Color(&style.color), LineWidth(style.line_width)]);
            } else {
                axes.lines(&x, &y, &[Color(&style.color), LineWidth(style.line_width)]);
            }
        }
        self
    }

    /// Plot a single pose position (start, goal, etc.)
    pub fn plot_point(&mut self, pose: ContinuousPose, style: &PointStyle) -> &mut Self {
        self.figure.axes2d()
            .points(&[f64::from(pose.x_mm)], &[f64::from(pose.y_mm)], &[
                Caption(&style.caption),
                Color(&style.color),
                PointSymbol(style.symbol),
                PointSize(style.size),
            ]);
        self
    }

    /// Plot points from x,y vectors
    pub fn plot_points_xy(&mut self, x: &[f64], y: &[f64], style: &PointStyle) -> &mut Self {
        self.figure.axes2d()
            .points(x, y, &[
                Caption(&style.caption),
                Color(&style.color),
                PointSymbol(style.symbol),
                PointSize(style.size),
            ]);
        self
    }

    /// Plot robot pose with direction indicator
    pub fn plot_robot(&mut self, pose: ContinuousPose, size_mm: f64) -> &mut Self {
        let (x, y, yaw) = (f64::from(pose.x_mm), f64::from(pose.y_mm), f64::from(pose.theta_rad));
        self.figure.axes2d()
            .points(&[x], &[y], &[
                Caption("Robot"),
                Color(colors::ROBOT),
                PointSymbol('O'),
                PointSize(1.5),
            ]);

        // Plot direction line (arrow substitute)
        let end_x = x + size_mm * yaw.cos();
        let end_y = y + size_mm * yaw.sin();

        self.figure.axes2d()
            .lines(&[x, end_x], &[y, end_y], &[
                Color(colors::ROBOT),
                LineWidth(2.0),
            ]);
        self
    }

    /// Plot start position
    pub fn plot_start(&mut self, pose: ContinuousPose) -> &mut Self {
        self.plot_point(pose, &PointStyle::new(colors::START, "Start").with_size(1.5))
    }

    /// Plot goal position
    pub fn plot_goal(&mut self, pose: ContinuousPose) -> &mut Self {
        self.plot_point(pose, &PointStyle::new(colors::GOAL, "Goal").with_size(1.5))
    }

    /// Finalize and show the plot
    pub fn show(&mut self) -> Result<(), String> {
        self.apply_settings();
        self.figure.show().map_err(|e| e.to_string()).map(|_| ())
    }

    /// Save plot to PNG file
    pub fn save_png(&mut self, path: &str, width: u32, height: u32) -> Result<(), String> {
        self.apply_settings();
        self.figure.save_to_png(path, width, height).map_err(|e| e.to_string())
    }

    /// Save plot to SVG file
    pub fn save_svg(&mut self, path: &str) -> Result<(), String> {
        self.apply_settings();
        self.figure.save_to_svg(path, 800, 600).map_err(|e| e.to_string())
    }

    fn apply_settings(&mut self) {
        let axes = self.figure.axes2d();

        if !self.title.is_empty() {
            axes.set_title(&self.title, &[]);
        }
        axes.set_x_label(&self.x_label, &[]);
        axes.set_y_label(&self.y_label, &[]);

        if let Some((min, max)) = self.x_range {
            axes.set_x_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some((min, max)) = self.y_range {
            axes.set_y_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some(ratio) = self.aspect_ratio {
            axes.set_aspect_ratio(AutoOption::Fix(ratio));
        }
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Closed outline of a rectangle as x,y vectors
pub fn rectangle_outline(rectangle: &RotatedRectangle) -> (Vec<f64>, Vec<f64>) {
    let corners = rectangle.corners();
    corners
        .iter()
        .chain(corners.first())
        .map(|c| (f64::from(c.x), f64::from(c.y)))
        .unzip()
}

/// Quick plot function for a materialized plan
pub fn quick_plot_path(
    path: &[ContinuousPose],
    obstacles: &[RotatedRectangle],
    title: &str,
) -> Visualizer {
    let mut vis = Visualizer::new();
    vis.set_title(title);

    vis.plot_rectangles(obstacles, colors::OBSTACLE, "Obstacles");
    if let Some(&start) = path.first() {
        vis.plot_start(start);
    }
    if let Some(&goal) = path.last() {
        vis.plot_goal(goal);
    }
    vis.plot_poses(path, &PathStyle::default());

    vis
}
