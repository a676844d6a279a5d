//! Page type classification
//!
//! Maps a URL path to one of the three supported directory layouts. The rule
//! table is authoritative: nothing else may infer a page type from any other
//! signal. Parsing is done directly on string slices, no regex.

use bitflags::bitflags;

// =============================================================================
// Page Types
// =============================================================================

/// The three supported directory layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageType {
    /// The site frontpage: a mixed strip of category and channel cards.
    Frontpage,
    /// The directory root: a grid of category cards.
    Categories,
    /// A channel listing, either site-wide or scoped to one category.
    Channels,
}

impl PageType {
    pub fn as_str(self) -> &'static str {
        match self {
            PageType::Frontpage => "frontpage",
            PageType::Categories => "categories",
            PageType::Channels => "channels",
        }
    }

    pub fn mask(self) -> PageSet {
        match self {
            PageType::Frontpage => PageSet::FRONTPAGE,
            PageType::Categories => PageSet::CATEGORIES,
            PageType::Channels => PageSet::CHANNELS,
        }
    }
}

bitflags! {
    /// Page type applicability mask, used by the selector tables.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageSet: u8 {
        const FRONTPAGE = 1 << 0;
        const CATEGORIES = 1 << 1;
        const CHANNELS = 1 << 2;

        /// Paginated directory layouts (everything but the frontpage).
        const DIRECTORY = Self::CATEGORIES.bits() | Self::CHANNELS.bits();
        const ALL = Self::FRONTPAGE.bits() | Self::DIRECTORY.bits();
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Classify a URL path. `None` means the page is unsupported and filtering
/// must be skipped entirely.
///
/// Rules, in order, after stripping one trailing slash:
/// - empty path: frontpage
/// - `/directory`: categories
/// - `/directory/all`: channels
/// - `/directory/{all|game}/<name>` with an optional two-letter language
///   suffix: channels
/// - anything else: unsupported
pub fn classify(path: &str) -> Option<PageType> {
    let path = path.strip_suffix('/').unwrap_or(path);

    match path {
        "" => return Some(PageType::Frontpage),
        "/directory" => return Some(PageType::Categories),
        "/directory/all" => return Some(PageType::Channels),
        _ => {}
    }

    let rest = path.strip_prefix("/directory/")?;
    let mut segments = rest.split('/');
    let head = segments.next()?;
    if head != "all" && head != "game" {
        return None;
    }

    segments.next().filter(|s| !s.is_empty())?;

    match (segments.next(), segments.next()) {
        (None, _) => Some(PageType::Channels),
        (Some(lang), None) if is_language_tag(lang) => Some(PageType::Channels),
        _ => None,
    }
}

/// A two-letter lowercase ASCII language code.
fn is_language_tag(segment: &str) -> bool {
    segment.len() == 2 && segment.bytes().all(|b| b.is_ascii_lowercase())
}
