use meridian_types::cartesian::Rect;
use web_time::{Duration, Instant};

use crate::render::{DeclutterTree, Transform};
use crate::view::MapView;

/// Time budget for rendering tile images while the view is animated.
const LOW_FIDELITY_RENDER_BUDGET: Duration = Duration::from_millis(8);

/// State of the user interaction with the map.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ViewHints {
    /// The view is being animated.
    pub animating: bool,
    /// The user is dragging or zooming the map.
    pub interacting: bool,
}

/// Everything the layer renderers need to know about the frame being rendered.
#[derive(Debug)]
pub struct FrameState {
    /// Position of the map.
    pub view: MapView,
    /// Ratio between device and logical pixels.
    pub pixel_ratio: f64,
    /// Interaction hints.
    pub view_hints: ViewHints,
    /// Time the frame started.
    pub time: Instant,
    /// Index of placed labels and icons. `None` if no layer declutters.
    pub declutter_tree: Option<DeclutterTree>,
}

impl FrameState {
    /// Creates a frame state for a static view, started now.
    pub fn new(view: MapView, pixel_ratio: f64) -> Self {
        Self {
            view,
            pixel_ratio,
            view_hints: ViewHints::default(),
            time: Instant::now(),
            declutter_tree: None,
        }
    }

    /// Sets interaction hints.
    pub fn with_view_hints(mut self, view_hints: ViewHints) -> Self {
        self.view_hints = view_hints;
        self
    }

    /// Enables decluttering for the frame.
    pub fn with_declutter(mut self) -> Self {
        self.declutter_tree = Some(DeclutterTree::new());
        self
    }

    /// High fidelity rendering is used when the view is static.
    pub fn is_hifi(&self) -> bool {
        !(self.view_hints.animating || self.view_hints.interacting)
    }

    /// Returns true if expensive work may still be done in this frame.
    pub fn has_render_budget(&self) -> bool {
        self.is_hifi() || self.time.elapsed() < LOW_FIDELITY_RENDER_BUDGET
    }

    /// Map area covered by the frame.
    pub fn extent(&self) -> Rect {
        self.view.extent()
    }

    /// Size of the drawing surface in device pixels.
    pub fn device_size(&self) -> (f64, f64) {
        let size = self.view.size();
        (
            (size.width() * self.pixel_ratio).round(),
            (size.height() * self.pixel_ratio).round(),
        )
    }

    /// Transform from map coordinates to logical pixels.
    pub fn coordinate_to_pixel_transform(&self) -> Transform {
        self.view.coordinate_to_pixel_transform()
    }

    /// Transform from logical pixels to map coordinates.
    pub fn pixel_to_coordinate_transform(&self) -> Option<Transform> {
        self.view.pixel_to_coordinate_transform()
    }
}
