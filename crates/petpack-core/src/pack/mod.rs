//! Resource packs.
//!
//! A pack is a named, versioned set of files from one source:
//! - **Directory**: a folder with a `pack.json` at its root
//! - **Archive**: a `.zip` file with `pack.json` at the archive root
//! - **Builtin**: a shipped folder; metadata is synthesized when absent

mod locator;
mod metadata;
mod resource_pack;

pub use locator::ContentLocator;
pub use metadata::{validate_id, PackFormat, PackMetadata, PackVersion};
pub use resource_pack::{PackSource, ResourcePack};

/// Normalize a relative resource path to the form used as overlay keys:
/// forward slashes, no leading `./` or `/`, no empty or `.` segments.
pub fn normalize_path(path: &str) -> String {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}
