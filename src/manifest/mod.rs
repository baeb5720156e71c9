//! Bill-of-materials manifests: the component tree, its loader, and lint.

pub mod lint;
pub mod loader;
pub mod node;
pub mod position;

pub use lint::lint;
pub use loader::{load_file, load_str, MANIFEST_FILE_NAME};
pub use node::ManifestNode;
