//! Item extraction
//!
//! Page-type-specific scraping of the directory DOM into structured item
//! records. Containers are located via a small table of structural anchors
//! (several alternatives per page type, to tolerate markup variants); each
//! container yields a primary name, an optional parent category and a tag
//! list. Extraction is tolerant: a single malformed item is skipped, zero
//! tags is valid, and zero containers is reported as a structural mismatch
//! for the caller to act on.

use log::{debug, warn};

use crate::dom::{walk_to_selector, Dom, NodeId, Selector, HIDDEN_ATTR};
use crate::page::{PageSet, PageType};

// =============================================================================
// Item Records
// =============================================================================

/// Parent category of an extracted item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parent {
    /// The item is itself a category card.
    None,
    /// The item is a channel card whose category could not be determined.
    Unknown,
    /// The item is a channel card under this category.
    Category(String),
}

/// One extracted directory item. Owned by the current filter pass only;
/// node handles are invalidated by the next re-scrape.
#[derive(Debug, Clone)]
pub struct Item {
    pub name: String,
    pub parent: Parent,
    pub tags: Vec<String>,
    pub node: NodeId,
}

/// Result of one extraction pass.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub items: Vec<Item>,
    /// No item container matched any anchor. The caller decides whether the
    /// page simply has no items or the filter pass should be abandoned.
    pub structural_mismatch: bool,
}

// =============================================================================
// Structural Anchors
// =============================================================================

struct AnchorRow {
    pages: PageSet,
    selector: Selector,
}

/// Item container anchors, by page type. Rows are tried in order; the first
/// row that yields containers wins.
const CARD_ANCHORS: &[AnchorRow] = &[
    AnchorRow {
        pages: PageSet::CATEGORIES,
        selector: Selector::attr_value("data-a-target", "card-game-link"),
    },
    AnchorRow {
        pages: PageSet::CATEGORIES,
        selector: Selector::tag("a").with_class("game-card__link"),
    },
    AnchorRow {
        pages: PageSet::CHANNELS,
        selector: Selector::attr_value("data-a-target", "preview-card-image-link"),
    },
    AnchorRow {
        pages: PageSet::CHANNELS,
        selector: Selector::tag("a").with_class("preview-card__image-link"),
    },
    AnchorRow {
        pages: PageSet::FRONTPAGE,
        selector: Selector::attr_value("data-a-target", "frontpage-card-link"),
    },
    AnchorRow {
        pages: PageSet::FRONTPAGE,
        selector: Selector::tag("a").with_class("front-card__link"),
    },
];

/// Card root markers, by page type: the ancestor that gets hidden when an
/// item is removed, and the scope tags and sibling links are read from.
const CARD_ROOTS: &[AnchorRow] = &[
    AnchorRow {
        pages: PageSet::CATEGORIES,
        selector: Selector::class("game-card"),
    },
    AnchorRow {
        pages: PageSet::CHANNELS,
        selector: Selector::class("preview-card"),
    },
    AnchorRow {
        pages: PageSet::FRONTPAGE,
        selector: Selector::class("front-card"),
    },
    AnchorRow {
        pages: PageSet::ALL,
        selector: Selector::tag("article"),
    },
];

/// Sibling link to a channel card's category. Shared by the channels page
/// and frontpage channel-shaped cards.
const GAME_LINKS: &[Selector] = &[
    Selector::attr_value("data-a-target", "preview-card-game-link"),
    Selector::tag("a").with_class("preview-card__game-link"),
];

/// Tag badge selector, scoped to the card root.
const TAG_BADGE: Selector = Selector::attr_value("data-a-target", "tag-badge");

/// Selectors that stop the removal walk for `page`.
pub(crate) fn card_root_stops(page: PageType) -> Vec<Selector> {
    CARD_ROOTS
        .iter()
        .filter(|row| row.pages.contains(page.mask()))
        .map(|row| row.selector)
        .collect()
}

// =============================================================================
// Extraction
// =============================================================================

/// Extract all unprocessed items from the page.
pub fn extract<D: Dom>(dom: &D, page: PageType) -> Extraction {
    let containers = find_containers(dom, page);
    if containers.is_empty() {
        warn!("no item containers matched any anchor on {} page", page.as_str());
        return Extraction {
            items: Vec::new(),
            structural_mismatch: true,
        };
    }

    let mut items = Vec::new();
    for container in containers {
        // Already hidden by a previous pass.
        if dom.attr(container, HIDDEN_ATTR).is_some() {
            continue;
        }
        match build_item(dom, page, container) {
            Some(item) => items.push(item),
            None => debug!("skipping item with no derivable name on {} page", page.as_str()),
        }
    }

    Extraction {
        items,
        structural_mismatch: false,
    }
}

/// Cheap readiness probe: has the page rendered any item container yet?
pub(crate) fn page_has_containers<D: Dom>(dom: &D, page: PageType) -> bool {
    !find_containers(dom, page).is_empty()
}

fn find_containers<D: Dom>(dom: &D, page: PageType) -> Vec<NodeId> {
    let root = dom.root();
    for row in CARD_ANCHORS {
        if !row.pages.contains(page.mask()) {
            continue;
        }
        let found = dom.query_all(root, &row.selector);
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

fn build_item<D: Dom>(dom: &D, page: PageType, container: NodeId) -> Option<Item> {
    match page {
        PageType::Categories => build_category_item(dom, page, container),
        PageType::Channels => build_channel_item(dom, page, container),
        PageType::Frontpage => {
            // Category-shaped cards link into the directory; everything else
            // is a channel card.
            let href = dom.attr(container, "href").unwrap_or_default();
            if category_from_href(&href).is_some() {
                build_category_item(dom, page, container)
            } else {
                build_channel_item(dom, page, container)
            }
        }
    }
}

fn build_category_item<D: Dom>(dom: &D, page: PageType, container: NodeId) -> Option<Item> {
    // ARIA label and link target are preferred over visible text, which may
    // be truncated or localized.
    let name = dom
        .attr(container, "aria-label")
        .filter(|s| !s.is_empty())
        .or_else(|| dom.attr(container, "href").as_deref().and_then(category_from_href))
        .unwrap_or_else(|| dom.text(container));
    if name.is_empty() {
        return None;
    }

    Some(Item {
        name,
        parent: Parent::None,
        tags: collect_tags(dom, page, container),
        node: container,
    })
}

fn build_channel_item<D: Dom>(dom: &D, page: PageType, container: NodeId) -> Option<Item> {
    let name = dom
        .attr(container, "href")
        .as_deref()
        .and_then(channel_from_href)
        .or_else(|| dom.attr(container, "aria-label").filter(|s| !s.is_empty()))
        .unwrap_or_else(|| dom.text(container));
    if name.is_empty() {
        return None;
    }

    Some(Item {
        name,
        parent: lookup_parent(dom, page, container),
        tags: collect_tags(dom, page, container),
        node: container,
    })
}

/// Scope for sibling lookups: the card root when reachable, else the direct
/// parent, else the container itself.
fn sibling_scope<D: Dom>(dom: &D, page: PageType, container: NodeId) -> NodeId {
    walk_to_selector(dom, container, &card_root_stops(page))
        .or_else(|| dom.parent(container))
        .unwrap_or(container)
}

/// Sibling-navigation lookup of a channel card's parent category.
fn lookup_parent<D: Dom>(dom: &D, page: PageType, container: NodeId) -> Parent {
    let scope = sibling_scope(dom, page, container);
    for selector in GAME_LINKS {
        if let Some(link) = dom.query(scope, selector) {
            let name = dom
                .attr(link, "href")
                .as_deref()
                .and_then(category_from_href)
                .unwrap_or_else(|| dom.text(link));
            if !name.is_empty() {
                return Parent::Category(name);
            }
        }
    }
    Parent::Unknown
}

fn collect_tags<D: Dom>(dom: &D, page: PageType, container: NodeId) -> Vec<String> {
    let scope = sibling_scope(dom, page, container);
    let badges = dom.query_all(scope, &TAG_BADGE);
    if badges.is_empty() {
        // Zero tags is valid; noted for selector drift diagnosis only.
        debug!("no tag badges under card on {} page", page.as_str());
    }
    badges
        .into_iter()
        .filter_map(|badge| {
            let text = dom.text(badge);
            if text.is_empty() {
                dom.attr(badge, "aria-label").filter(|s| !s.is_empty())
            } else {
                Some(text)
            }
        })
        .collect()
}

// =============================================================================
// Href Parsing
// =============================================================================

/// Channel login from a profile href: a single non-empty path segment.
pub(crate) fn channel_from_href(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    let rest = path.strip_prefix('/')?;
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    Some(percent_decode(rest))
}

/// Category name from a directory href.
fn category_from_href(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    let rest = path.strip_prefix("/directory/game/")?;
    let name = rest.split('/').next().unwrap_or(rest);
    if name.is_empty() {
        return None;
    }
    Some(percent_decode(name))
}

/// Decode %XX escapes. Invalid escapes are kept literally; input that does
/// not decode to UTF-8 is returned unchanged.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    match String::from_utf8(out) {
        Ok(decoded) => decoded,
        Err(_) => input.to_string(),
    }
}
