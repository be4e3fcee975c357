use crate::identifier::CANONICAL_PREFIX;

/// Marker found in URLs produced by the old direct-upload endpoint.
pub const DEFAULT_LEGACY_MARKER: &str = "/direct-upload/";

/// Rewrites stored image references into canonical serving paths.
///
/// Uploads already return canonical paths; this is for references persisted
/// before that, in one of several historical shapes.
#[derive(Debug, Clone)]
pub struct PathResolver {
    legacy_markers: Vec<String>,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(vec![DEFAULT_LEGACY_MARKER.to_string()])
    }
}

impl PathResolver {
    pub fn new(legacy_markers: Vec<String>) -> Self {
        let legacy_markers = legacy_markers
            .into_iter()
            .filter(|m| !m.trim().is_empty())
            .collect();
        Self { legacy_markers }
    }

    /// Resolve a reference, in priority order:
    ///
    /// 1. absolute `http(s)` URLs are returned unchanged;
    /// 2. legacy direct-upload URLs become `/objects/<trailing id>`;
    /// 3. canonical paths are returned unchanged;
    /// 4. anything else is a bare identifier and gets the canonical prefix.
    ///
    /// Returns `None` for blank input.
    pub fn resolve(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        if is_absolute_url(reference) {
            return Some(reference.to_string());
        }

        if let Some(rest) = self
            .legacy_markers
            .iter()
            .find_map(|marker| reference.find(marker.as_str()).map(|at| &reference[at + marker.len()..]))
        {
            let identifier = trailing_segment(rest)?;
            return Some(format!("{CANONICAL_PREFIX}{identifier}"));
        }

        if reference.starts_with(CANONICAL_PREFIX) {
            return Some(reference.to_string());
        }

        let bare = reference.trim_start_matches('/');
        if bare.is_empty() {
            return None;
        }
        Some(format!("{CANONICAL_PREFIX}{bare}"))
    }

    /// The object identifier a reference points at, if it is served locally.
    pub fn identifier_of(&self, reference: &str) -> Option<String> {
        let resolved = self.resolve(reference)?;
        let identifier = resolved.strip_prefix(CANONICAL_PREFIX)?;
        trailing_segment(identifier).map(str::to_string)
    }
}

fn is_absolute_url(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Last path segment with any query string or fragment removed.
fn trailing_segment(s: &str) -> Option<&str> {
    let end = s.find(['?', '#']).unwrap_or(s.len());
    let segment = s[..end].trim_end_matches('/').rsplit('/').next()?;
    (!segment.is_empty()).then_some(segment)
}
