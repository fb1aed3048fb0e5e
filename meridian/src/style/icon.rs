//! Icons used as point symbols.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use maybe_sync::{MaybeSend, MaybeSync};
use meridian_types::cartesian::Size;
use parking_lot::RwLock;

use crate::async_runtime;
use crate::error::MeridianError;
use crate::layer::LayerId;
use crate::messenger::Messenger;

/// An icon image loaded into memory.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedIcon {
    /// Raw bytes of the image, in RGBA order.
    pub(crate) bytes: Vec<u8>,
    /// Width and height of the image in pixels.
    pub(crate) dimensions: (u32, u32),
}

impl DecodedIcon {
    /// Wraps raw RGBA bytes. Fails if the buffer length does not match the dimensions.
    pub fn from_raw(bytes: Vec<u8>, width: u32, height: u32) -> Result<Self, MeridianError> {
        let expected = width as usize * height as usize * 4;
        if bytes.len() != expected {
            return Err(MeridianError::ResourceLoad(format!(
                "expected {expected} bytes for a {width}x{height} image, got {}",
                bytes.len()
            )));
        }

        Ok(Self {
            bytes,
            dimensions: (width, height),
        })
    }

    /// Size of the image in pixels.
    pub fn size(&self) -> Size {
        Size::new(self.dimensions.0 as f64, self.dimensions.1 as f64)
    }

    /// Color of the pixel in RGBA order.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.dimensions.0 || y >= self.dimensions.1 {
            return None;
        }

        let offset = (y as usize * self.dimensions.0 as usize + x as usize) * 4;
        let pixel = self.bytes.get(offset..offset + 4)?;
        Some([pixel[0], pixel[1], pixel[2], pixel[3]])
    }
}

/// Loads icon images by their source string.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait IconLoader: MaybeSend + MaybeSync {
    /// Loads and decodes the image.
    async fn load(&self, src: &str) -> Result<DecodedIcon, MeridianError>;
}

/// Load state of an icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconState {
    /// Loading was not requested yet.
    Idle,
    /// Loading is in progress.
    Loading,
    /// The image is available.
    Loaded,
    /// Loading failed. The icon is never drawn.
    Error,
}

struct IconInner {
    state: IconState,
    image: Option<Arc<DecodedIcon>>,
    listeners: HashMap<LayerId, Arc<dyn Messenger>>,
}

/// Icon image shared between styles.
///
/// Layers that tried to draw the icon before it was loaded register themselves as listeners and are asked to
/// redraw when loading settles.
pub struct IconImage {
    src: String,
    loader: Option<Arc<dyn IconLoader>>,
    inner: Arc<RwLock<IconInner>>,
}

impl Debug for IconImage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IconImage")
            .field("src", &self.src)
            .field("state", &self.state())
            .finish()
    }
}

impl IconImage {
    /// Creates an icon that is loaded by the `loader` on first use.
    pub fn new(src: impl Into<String>, loader: Arc<dyn IconLoader>) -> Self {
        Self {
            src: src.into(),
            loader: Some(loader),
            inner: Arc::new(RwLock::new(IconInner {
                state: IconState::Idle,
                image: None,
                listeners: HashMap::new(),
            })),
        }
    }

    /// Creates an icon from an already decoded image.
    pub fn loaded(src: impl Into<String>, image: DecodedIcon) -> Self {
        Self {
            src: src.into(),
            loader: None,
            inner: Arc::new(RwLock::new(IconInner {
                state: IconState::Loaded,
                image: Some(Arc::new(image)),
                listeners: HashMap::new(),
            })),
        }
    }

    /// Source string of the icon.
    pub fn src(&self) -> &str {
        &self.src
    }

    /// Current load state.
    pub fn state(&self) -> IconState {
        self.inner.read().state
    }

    /// Decoded image, if loaded.
    pub fn image(&self) -> Option<Arc<DecodedIcon>> {
        self.inner.read().image.clone()
    }

    /// Size of the image in pixels, if loaded.
    pub fn size(&self) -> Option<Size> {
        self.inner.read().image.as_ref().map(|image| image.size())
    }

    /// Registers a layer to be notified when loading settles.
    pub fn listen(&self, layer_id: LayerId, messenger: Arc<dyn Messenger>) {
        self.inner.write().listeners.insert(layer_id, messenger);
    }

    /// Removes the listener of the layer.
    pub fn unlisten(&self, layer_id: LayerId) {
        self.inner.write().listeners.remove(&layer_id);
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.read().listeners.len()
    }

    /// Starts loading the image. Does nothing unless the icon is idle.
    pub fn load(&self) {
        let Some(loader) = self.loader.clone() else {
            return;
        };

        {
            let mut inner = self.inner.write();
            if inner.state != IconState::Idle {
                return;
            }
            inner.state = IconState::Loading;
        }

        let inner = self.inner.clone();
        let src = self.src.clone();
        let spawned = async_runtime::spawn(async move {
            let result = loader.load(&src).await;
            let listeners = {
                let mut inner = inner.write();
                match result {
                    Ok(image) => {
                        inner.state = IconState::Loaded;
                        inner.image = Some(Arc::new(image));
                    }
                    Err(err) => {
                        log::warn!("Failed to load icon {src}: {err}");
                        inner.state = IconState::Error;
                    }
                }

                std::mem::take(&mut inner.listeners)
            };

            for messenger in listeners.values() {
                messenger.request_redraw();
            }
        });

        if let Err(err) = spawned {
            log::warn!("Cannot load icon {}: {err}", self.src);
            self.inner.write().state = IconState::Error;
        }
    }
}
