//! Video presentation options

use codecpump_core::RenderSurface;
use std::fmt;
use std::sync::Arc;

/// Default decoded frame width
pub const DEFAULT_WIDTH: u32 = 1280;
/// Default decoded frame height
pub const DEFAULT_HEIGHT: u32 = 720;

/// Where and at what size decoded video is presented.
///
/// Immutable; switching targets produces a new value.
#[derive(Clone)]
pub struct RenderOptions {
    target: Option<Arc<dyn RenderSurface>>,
    width: u32,
    height: u32,
}

impl RenderOptions {
    /// Options for `target` at the default size
    pub fn new(target: Arc<dyn RenderSurface>) -> Self {
        Self::with_size(Some(target), DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    /// Options with an explicit size
    pub fn with_size(target: Option<Arc<dyn RenderSurface>>, width: u32, height: u32) -> Self {
        Self {
            target,
            width,
            height,
        }
    }

    /// Same size, different target
    pub fn with_target(&self, target: Arc<dyn RenderSurface>) -> Self {
        Self::with_size(Some(target), self.width, self.height)
    }

    /// Render target, if bound
    pub fn target(&self) -> Option<&Arc<dyn RenderSurface>> {
        self.target.as_ref()
    }

    /// Frame width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height
    pub fn height(&self) -> u32 {
        self.height
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::with_size(None, DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("target", &self.target.as_ref().map(|t| t.id()))
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
