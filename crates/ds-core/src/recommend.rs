//! Sidebar recommendation filtering
//!
//! A narrower sibling of the directory engine operating on the sidebar,
//! which mutates independently of directory pagination. Two card shapes
//! exist: expanded cards carry discrete channel/category title nodes,
//! collapsed cards only an href. Runs once after load/navigation and then on
//! sidebar mutations (observer-driven, wired by the host); never runs on the
//! frontpage, which has no recommendations.

use log::debug;

use crate::blacklist::{Blacklist, EntryKind};
use crate::dom::{walk_to_ancestor, walk_to_selector, Dom, NodeId, Selector, HIDDEN_ATTR};
use crate::extract::channel_from_href;

// =============================================================================
// Sidebar Anchors
// =============================================================================

/// Expanded recommendation card link.
const EXPANDED_CARD: Selector = Selector::attr_value("data-a-target", "side-nav-card");

/// Channel title node within an expanded card.
const EXPANDED_TITLE: Selector = Selector::attr_value("data-a-target", "side-nav-title");

/// Category title node within an expanded card; absent while offline hosts
/// or squads are shown.
const EXPANDED_GAME: Selector = Selector::attr_value("data-a-target", "side-nav-game-title");

/// Collapsed recommendation card link (href only).
const COLLAPSED_CARD: Selector = Selector::attr_value("data-a-target", "side-nav-card-collapsed");

/// Removal marker for collapsed cards.
const COLLAPSED_ROOT: Selector = Selector::class("side-nav-card--collapsed");

// =============================================================================
// Filtering
// =============================================================================

/// Filter the sidebar once. Returns the number of cards hidden.
pub fn run<D: Dom>(dom: &mut D, blacklist: &Blacklist) -> usize {
    let mut removed = 0;
    removed += filter_expanded(dom, blacklist);
    removed += filter_collapsed(dom, blacklist);
    if removed > 0 {
        debug!("sidebar pass hid {removed} recommendation cards");
    }
    removed
}

fn filter_expanded<D: Dom>(dom: &mut D, blacklist: &Blacklist) -> usize {
    let mut removed = 0;
    for card in dom.query_all(dom.root(), &EXPANDED_CARD) {
        if dom.attr(card, HIDDEN_ATTR).is_some() {
            continue;
        }
        let channel = dom.query(card, &EXPANDED_TITLE).map(|n| dom.text(n));
        let category = dom.query(card, &EXPANDED_GAME).map(|n| dom.text(n));
        if !should_remove(blacklist, channel.as_deref(), category.as_deref()) {
            continue;
        }

        // Expanded cards sit under an unstyled wrapper in the nav list: walk
        // to the first ancestor with no classes or data attributes.
        let ancestor =
            walk_to_ancestor(dom, card, |dom, node| !dom.has_structural_marks(node));
        if let Some(ancestor) = ancestor {
            dom.set_attr(card, HIDDEN_ATTR, "1");
            dom.hide(ancestor);
            removed += 1;
        }
    }
    removed
}

fn filter_collapsed<D: Dom>(dom: &mut D, blacklist: &Blacklist) -> usize {
    let mut removed = 0;
    for card in dom.query_all(dom.root(), &COLLAPSED_CARD) {
        if dom.attr(card, HIDDEN_ATTR).is_some() {
            continue;
        }
        let channel = dom.attr(card, "href").as_deref().and_then(channel_from_href);
        if !should_remove(blacklist, channel.as_deref(), None) {
            continue;
        }

        if let Some(ancestor) = collapsed_root(dom, card) {
            dom.set_attr(card, HIDDEN_ATTR, "1");
            dom.hide(ancestor);
            removed += 1;
        }
    }
    removed
}

fn should_remove(blacklist: &Blacklist, channel: Option<&str>, category: Option<&str>) -> bool {
    if let Some(channel) = channel {
        if blacklist.contains(EntryKind::Channel, channel) {
            return true;
        }
    }
    if let Some(category) = category {
        if blacklist.contains(EntryKind::Category, category) {
            return true;
        }
    }
    false
}

fn collapsed_root<D: Dom>(dom: &D, card: NodeId) -> Option<NodeId> {
    walk_to_selector(dom, card, std::slice::from_ref(&COLLAPSED_ROOT))
}
