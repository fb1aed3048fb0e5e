use maybe_sync::{MaybeSend, MaybeSync};

/// Change notification sink.
///
/// Sources call it when a tile finishes loading, style icons call it when their image settles. The application is
/// expected to render a new frame in response.
pub trait Messenger: MaybeSend + MaybeSync {
    /// Asks the application to render a new frame.
    fn request_redraw(&self);
}

/// Messenger that ignores all notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyMessenger;

impl Messenger for DummyMessenger {
    fn request_redraw(&self) {}
}
