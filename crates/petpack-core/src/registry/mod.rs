//! Pack registry and overlay resolution.
//!
//! The registry owns every loaded pack plus an ordered active list
//! (index 0 = highest priority). From those two it derives the overlay: one
//! map from relative path to the locator of the highest-priority active pack
//! that ships that path. The overlay is rebuilt from scratch and swapped in
//! whole on every structural change, so readers never see a half-built map.

mod overlay;
mod pack_registry;
mod state;

pub use overlay::{Overlay, OverlayEntry, ResourcePaths};
pub use pack_registry::{InitReport, PackInfo, PackRegistry, SkippedPack};
pub use state::ActivePacksState;
