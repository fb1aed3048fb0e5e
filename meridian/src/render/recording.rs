//! Surface that records drawing commands instead of rasterizing them.

use std::any::Any;

use meridian_types::cartesian::{Point2, Size};

use super::{DrawingSurface, IconPaint, LinePaint, Paint, Path, TextPaint, Transform};
use crate::Color;

/// Recorded drawing operation.
#[derive(Debug, Clone)]
pub enum DrawCommand {
    /// [`DrawingSurface::fill_path`]
    Fill {
        /// Filled path.
        path: Path,
        /// Paint.
        paint: Paint,
    },
    /// [`DrawingSurface::stroke_path`]
    Stroke {
        /// Stroked path.
        path: Path,
        /// Paint.
        paint: LinePaint,
    },
    /// [`DrawingSurface::draw_icon`]
    Icon(IconPaint),
    /// [`DrawingSurface::draw_text`]
    Text(TextPaint),
    /// [`DrawingSurface::draw_surface`] with a recording surface.
    Surface {
        /// Copy of the drawn surface.
        surface: RecordingSurface,
        /// Transform from the pixels of the drawn surface.
        transform: Transform,
    },
}

/// Command together with the surface state it was recorded in.
#[derive(Debug, Clone)]
pub struct RecordedCommand {
    /// The command.
    pub command: DrawCommand,
    /// Clip paths active when the command was recorded.
    pub clips: Vec<Path>,
    /// Global alpha active when the command was recorded.
    pub alpha: f64,
}

#[derive(Debug, Clone)]
struct SurfaceState {
    alpha: f64,
    clips: Vec<Path>,
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            clips: vec![],
        }
    }
}

/// [`DrawingSurface`] that keeps the list of drawing commands.
///
/// It can evaluate the composited color of any point, which is enough to check what a rasterizing surface would
/// show. Labels are recorded but not composited.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    size: Size,
    state: SurfaceState,
    stack: Vec<SurfaceState>,
    commands: Vec<RecordedCommand>,
}

impl RecordingSurface {
    /// Creates an empty surface of the given size in device pixels.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Size::new(width as f64, height as f64),
            state: SurfaceState::default(),
            stack: vec![],
            commands: vec![],
        }
    }

    /// All recorded commands.
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Labels drawn on the surface.
    pub fn texts(&self) -> impl Iterator<Item = &TextPaint> {
        self.commands.iter().filter_map(|c| match &c.command {
            DrawCommand::Text(text) => Some(text),
            _ => None,
        })
    }

    /// Icons drawn on the surface.
    pub fn icons(&self) -> impl Iterator<Item = &IconPaint> {
        self.commands.iter().filter_map(|c| match &c.command {
            DrawCommand::Icon(icon) => Some(icon),
            _ => None,
        })
    }

    /// Depth of the state stack.
    pub fn saved_states(&self) -> usize {
        self.stack.len()
    }

    /// Composited color of the point, starting from a transparent background.
    pub fn color_at(&self, point: &Point2) -> Color {
        self.commands
            .iter()
            .filter(|c| c.clips.iter().all(|clip| clip.contains(point)))
            .filter_map(|c| command_color(&c.command, point).map(|color| color.fade(c.alpha)))
            .fold(Color::TRANSPARENT, |acc, color| acc.blend(color))
    }
}

fn command_color(command: &DrawCommand, point: &Point2) -> Option<Color> {
    match command {
        DrawCommand::Fill { path, paint } => path.contains(point).then_some(paint.color),
        DrawCommand::Stroke { path, paint } => {
            let distance = path.distance_to_outline(point)?;
            (distance <= paint.width / 2.0).then_some(paint.color)
        }
        DrawCommand::Icon(icon) => {
            let bounds = icon.bounds();
            if !bounds.contains(point) || icon.size.is_zero() {
                return None;
            }

            let image_size = icon.image.size();
            let x = (point.x - bounds.x_min()) / bounds.width() * image_size.width();
            let y = (point.y - bounds.y_min()) / bounds.height() * image_size.height();
            let [r, g, b, a] = icon.image.pixel(x as u32, y as u32)?;
            Some(Color::rgba(r, g, b, a).fade(icon.opacity))
        }
        DrawCommand::Text(_) => None,
        DrawCommand::Surface { surface, transform } => {
            let inner = transform.invert()?.apply(point);
            let size = surface.size();
            if inner.x < 0.0 || inner.y < 0.0 || inner.x > size.width() || inner.y > size.height() {
                return None;
            }

            let color = surface.color_at(&inner);
            (!color.is_transparent()).then_some(color)
        }
    }
}

impl DrawingSurface for RecordingSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn global_alpha(&self) -> f64 {
        self.state.alpha
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.state.alpha = alpha;
    }

    fn clip(&mut self, path: &Path) {
        self.state.clips.push(path.clone());
    }

    fn fill_path(&mut self, path: &Path, paint: &Paint) {
        self.record(DrawCommand::Fill {
            path: path.clone(),
            paint: *paint,
        });
    }

    fn stroke_path(&mut self, path: &Path, paint: &LinePaint) {
        self.record(DrawCommand::Stroke {
            path: path.clone(),
            paint: *paint,
        });
    }

    fn draw_icon(&mut self, icon: &IconPaint) {
        self.record(DrawCommand::Icon(icon.clone()));
    }

    fn draw_text(&mut self, text: &TextPaint) {
        self.record(DrawCommand::Text(text.clone()));
    }

    fn create_offscreen(&self, width: u32, height: u32) -> Box<dyn DrawingSurface> {
        Box::new(RecordingSurface::new(width, height))
    }

    fn draw_surface(&mut self, surface: &dyn DrawingSurface, transform: &Transform) {
        match surface.as_any().downcast_ref::<RecordingSurface>() {
            Some(surface) => self.record(DrawCommand::Surface {
                surface: surface.clone(),
                transform: *transform,
            }),
            None => log::debug!("Recording surface cannot draw a surface of another type"),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RecordingSurface {
    fn record(&mut self, command: DrawCommand) {
        self.commands.push(RecordedCommand {
            command,
            clips: self.state.clips.clone(),
            alpha: self.state.alpha,
        });
    }
}
