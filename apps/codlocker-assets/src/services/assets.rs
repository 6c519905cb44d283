//! Asset resolution: fetches bytes from a storage backend and classifies them.
//!
//! Content types come from the file extension, except that SVG markup is
//! always served as `image/svg+xml`. Catalog placeholders are often SVGs saved
//! under raster names like `hero.jpg`, and an extension lookup would report
//! them as JPEG.

use crate::services::storage::{Storage, StorageError};

pub const SVG_CONTENT_TYPE: &str = "image/svg+xml";

/// Leading bytes inspected by the SVG sniff.
const SNIFF_LEN: usize = 5;

/// A resolved asset, owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Returns true when the content opens with `<svg` or `<?xml`.
///
/// Content shorter than five bytes never matches.
pub fn looks_like_svg(data: &[u8]) -> bool {
    data.len() >= SNIFF_LEN && (data.starts_with(b"<svg") || data.starts_with(b"<?xml"))
}

/// Determines the `Content-Type` for an asset.
pub fn content_type_for(path: &str, data: &[u8]) -> String {
    if looks_like_svg(data) {
        return SVG_CONTENT_TYPE.to_string();
    }

    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Reads the asset at `path` from `store` and classifies it.
pub async fn resolve(store: &dyn Storage, path: &str) -> Result<Asset, StorageError> {
    let bytes = store.get(path).await?;
    let content_type = content_type_for(path, &bytes);
    Ok(Asset {
        bytes,
        content_type,
    })
}
