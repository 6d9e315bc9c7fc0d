//! Static viewer manifest output.

mod render;

pub(crate) use render::{Renderer, ViewerEntry, ViewerInfo};
