//! Directory filter engine
//!
//! One pass: extract, classify each item against the blacklist, hide the
//! matches, then decide whether to ask the host page for more items. The
//! pass is synchronous; the `running` flag only guards against a separate
//! concurrent invocation (e.g. the scroll poller firing before the previous
//! pass reset its state).

use log::{debug, warn};

use crate::blacklist::{Blacklist, EntryKind};
use crate::dom::{walk_to_selector, Dom, Selector, HIDDEN_ATTR};
use crate::extract::{self, card_root_stops, Item, Parent};
use crate::page::PageType;

// =============================================================================
// Scroll Anchors
// =============================================================================

/// Scrollable container candidates for the scroll trigger.
const SCROLL_AREAS: &[Selector] = &[
    Selector::class("simplebar-scroll-content"),
    Selector::attr_value("data-a-target", "directory-scroll-area"),
];

/// Markers left by a known conflicting extension that drives its own
/// directory pagination; scroll-triggering is skipped when one is present.
const CONFLICTING_EXTENSION_MARKS: &[Selector] = &[
    Selector::attr("data-ffz-version"),
    Selector::class("ffz-addon"),
];

// =============================================================================
// Pass Results
// =============================================================================

/// Why an item was removed. Checked in a fixed order per page type; the
/// order only affects which reason is reported, not the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Channel,
    Category,
    Tag,
}

/// Outcome of one filter pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    /// Items scraped this pass (already-hidden containers excluded).
    pub scraped: usize,
    /// Items successfully hidden.
    pub removed: usize,
    /// Items left visible, for downstream UI augmentation (hide buttons).
    pub survivors: Vec<Item>,
    /// A synthetic scroll was dispatched to request more items.
    pub scroll_requested: bool,
    /// Extraction found no item containers at all.
    pub structural_mismatch: bool,
}

// =============================================================================
// Decision
// =============================================================================

/// Decide removal for one item under the page type's rule.
pub fn removal_reason(item: &Item, page: PageType, blacklist: &Blacklist) -> Option<RemovalReason> {
    let category_shaped = matches!(page, PageType::Categories)
        || (matches!(page, PageType::Frontpage) && item.parent == Parent::None);

    if category_shaped {
        if blacklist.contains(EntryKind::Category, &item.name) {
            return Some(RemovalReason::Category);
        }
        return blacklisted_tag(item, blacklist);
    }

    // Channel-shaped: channel name first, then parent category, then tags.
    if blacklist.contains(EntryKind::Channel, &item.name) {
        return Some(RemovalReason::Channel);
    }
    if let Parent::Category(parent) = &item.parent {
        if blacklist.contains(EntryKind::Category, parent) {
            return Some(RemovalReason::Category);
        }
    }
    blacklisted_tag(item, blacklist)
}

fn blacklisted_tag(item: &Item, blacklist: &Blacklist) -> Option<RemovalReason> {
    item.tags
        .iter()
        .any(|tag| blacklist.contains(EntryKind::Tag, tag))
        .then_some(RemovalReason::Tag)
}

// =============================================================================
// Engine
// =============================================================================

/// The directory filter engine. Holds only the re-entrancy guard; all pass
/// state is rebuilt per run.
#[derive(Debug, Default)]
pub struct FilterEngine {
    running: bool,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one filter pass. Returns `None` when a pass is already in flight.
    pub fn run<D: Dom>(
        &mut self,
        dom: &mut D,
        page: PageType,
        blacklist: &Blacklist,
    ) -> Option<PassReport> {
        if self.running {
            warn!("filter pass requested while one is in flight; skipping");
            return None;
        }
        self.running = true;
        let report = self.pass(dom, page, blacklist);
        self.running = false;
        Some(report)
    }

    fn pass<D: Dom>(&mut self, dom: &mut D, page: PageType, blacklist: &Blacklist) -> PassReport {
        let extraction = extract::extract(dom, page);
        let scraped = extraction.items.len();

        let mut removed = 0usize;
        let mut survivors = Vec::new();

        for item in extraction.items {
            match removal_reason(&item, page, blacklist) {
                Some(reason) => {
                    if remove_item(dom, page, &item, reason) {
                        removed += 1;
                    } else {
                        // Fail open: the item stays visible and keeps its
                        // hide button.
                        survivors.push(item);
                    }
                }
                None => survivors.push(item),
            }
        }

        let scroll_requested = removed > 0
            && matches!(page, PageType::Categories | PageType::Channels)
            && trigger_scroll(dom);

        debug!(
            "filter pass on {}: scraped {scraped}, removed {removed}, scroll {scroll_requested}",
            page.as_str()
        );

        PassReport {
            scraped,
            removed,
            survivors,
            scroll_requested,
            structural_mismatch: extraction.structural_mismatch,
        }
    }
}

/// Hide one item: mark the leaf, walk up to the page type's card root, hide
/// it. Reaching the document root without a match is a structural failure;
/// the item is left visible rather than hiding unrelated content.
fn remove_item<D: Dom>(dom: &mut D, page: PageType, item: &Item, reason: RemovalReason) -> bool {
    let stops = card_root_stops(page);
    let Some(ancestor) = walk_to_selector(dom, item.node, &stops) else {
        warn!(
            "no card root above removed item {:?} on {} page; leaving visible",
            item.name,
            page.as_str()
        );
        return false;
    };

    debug!("hiding {:?} ({reason:?})", item.name);
    // Idempotent marker; extraction skips marked containers on later passes.
    dom.set_attr(item.node, HIDDEN_ATTR, "1");
    dom.hide(ancestor);
    true
}

/// Ask the host page's own infinite scroll for more items, unless a
/// conflicting extension is driving pagination itself.
fn trigger_scroll<D: Dom>(dom: &mut D) -> bool {
    let root = dom.root();
    for mark in CONFLICTING_EXTENSION_MARKS {
        if dom.matches(root, mark) || dom.query(root, mark).is_some() {
            debug!("conflicting extension detected; skipping scroll trigger");
            return false;
        }
    }

    let target = SCROLL_AREAS
        .iter()
        .find_map(|selector| dom.query(root, selector))
        .unwrap_or(root);
    dom.dispatch_scroll(target);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeId;
    use crate::testdom::TestDom;

    fn blacklist(categories: &[&str], channels: &[&str], tags: &[&str]) -> Blacklist {
        let mut bl = Blacklist::new();
        for name in categories {
            bl.categories.insert(name);
        }
        for name in channels {
            bl.channels.insert(name);
        }
        for name in tags {
            bl.tags.insert(name);
        }
        bl
    }

    fn add_game_card(dom: &mut TestDom, name: &str, tags: &[&str]) -> (NodeId, NodeId) {
        let card = dom.add(dom.root(), "article");
        dom.add_class(card, "game-card");
        let link = dom.add(card, "a");
        dom.set_attr(link, "data-a-target", "card-game-link");
        dom.set_attr(link, "aria-label", name);
        for tag in tags {
            let badge = dom.add(card, "button");
            dom.set_attr(badge, "data-a-target", "tag-badge");
            dom.set_text(badge, tag);
        }
        (card, link)
    }

    fn add_preview_card(
        dom: &mut TestDom,
        channel: &str,
        category: Option<&str>,
        tags: &[&str],
    ) -> (NodeId, NodeId) {
        let card = dom.add(dom.root(), "article");
        dom.add_class(card, "preview-card");
        let link = dom.add(card, "a");
        dom.set_attr(link, "data-a-target", "preview-card-image-link");
        dom.set_attr(link, "href", &format!("/{channel}"));
        if let Some(category) = category {
            let game = dom.add(card, "a");
            dom.set_attr(game, "data-a-target", "preview-card-game-link");
            dom.set_text(game, category);
        }
        for tag in tags {
            let badge = dom.add(card, "button");
            dom.set_attr(badge, "data-a-target", "tag-badge");
            dom.set_text(badge, tag);
        }
        (card, link)
    }

    fn add_scroll_area(dom: &mut TestDom) -> NodeId {
        let area = dom.add(dom.root(), "div");
        dom.add_class(area, "simplebar-scroll-content");
        area
    }

    #[test]
    fn test_end_to_end_categories_scenario() {
        let mut dom = TestDom::new();
        let (sc2_card, sc2_link) = add_game_card(&mut dom, "StarCraft II", &["esports"]);
        let (chess_card, _) = add_game_card(&mut dom, "Chess", &[]);

        let bl = blacklist(&["starcraft ii"], &[], &[]);
        let mut engine = FilterEngine::new();
        let report = engine.run(&mut dom, PageType::Categories, &bl).unwrap();

        assert_eq!(report.scraped, 2);
        assert_eq!(report.removed, 1);
        assert_eq!(report.survivors.len(), 1);
        assert_eq!(report.survivors[0].name, "Chess");
        assert!(dom.is_hidden(sc2_card));
        assert_eq!(dom.attr(sc2_link, HIDDEN_ATTR).as_deref(), Some("1"));
        assert!(!dom.is_hidden(chess_card));
    }

    #[test]
    fn test_channel_removed_by_parent_category() {
        let mut dom = TestDom::new();
        let (card, _) = add_preview_card(&mut dom, "somechannel", Some("Slots"), &[]);
        add_preview_card(&mut dom, "otherchannel", Some("Chess"), &[]);

        let bl = blacklist(&["slots"], &[], &[]);
        let mut engine = FilterEngine::new();
        let report = engine.run(&mut dom, PageType::Channels, &bl).unwrap();

        assert_eq!(report.removed, 1);
        assert!(dom.is_hidden(card));
    }

    #[test]
    fn test_tag_removal_on_channels_page() {
        let mut dom = TestDom::new();
        let (card, _) = add_preview_card(&mut dom, "somechannel", None, &["Gambling"]);

        let bl = blacklist(&[], &[], &["gambling"]);
        let mut engine = FilterEngine::new();
        let report = engine.run(&mut dom, PageType::Channels, &bl).unwrap();

        assert_eq!(report.removed, 1);
        assert!(dom.is_hidden(card));
    }

    #[test]
    fn test_reason_precedence_channel_before_category() {
        let item = Item {
            name: "somechannel".to_string(),
            parent: Parent::Category("Slots".to_string()),
            tags: vec!["gambling".to_string()],
            node: 0,
        };
        let bl = blacklist(&["slots"], &["somechannel"], &["gambling"]);
        assert_eq!(
            removal_reason(&item, PageType::Channels, &bl),
            Some(RemovalReason::Channel)
        );

        let bl = blacklist(&["slots"], &[], &["gambling"]);
        assert_eq!(
            removal_reason(&item, PageType::Channels, &bl),
            Some(RemovalReason::Category)
        );

        let bl = blacklist(&[], &[], &["gambling"]);
        assert_eq!(
            removal_reason(&item, PageType::Channels, &bl),
            Some(RemovalReason::Tag)
        );
    }

    #[test]
    fn test_frontpage_category_shaped_rules() {
        let item = Item {
            name: "Minecraft".to_string(),
            parent: Parent::None,
            tags: vec![],
            node: 0,
        };
        // A blacklisted channel of the same name does not remove a category card.
        let bl = blacklist(&[], &["minecraft"], &[]);
        assert_eq!(removal_reason(&item, PageType::Frontpage, &bl), None);

        let bl = blacklist(&["minecraft"], &[], &[]);
        assert_eq!(
            removal_reason(&item, PageType::Frontpage, &bl),
            Some(RemovalReason::Category)
        );
    }

    #[test]
    fn test_scroll_triggered_once_after_removals() {
        let mut dom = TestDom::new();
        let area = add_scroll_area(&mut dom);
        for i in 0..20 {
            let category = if i < 5 { Some("Slots") } else { Some("Chess") };
            add_preview_card(&mut dom, &format!("channel{i}"), category, &[]);
        }

        let bl = blacklist(&["slots"], &[], &[]);
        let mut engine = FilterEngine::new();
        let report = engine.run(&mut dom, PageType::Channels, &bl).unwrap();

        assert_eq!(report.scraped, 20);
        assert_eq!(report.removed, 5);
        assert!(report.scroll_requested);
        assert_eq!(dom.scrolled, vec![area]);
    }

    #[test]
    fn test_no_scroll_without_removals() {
        let mut dom = TestDom::new();
        add_scroll_area(&mut dom);
        for i in 0..20 {
            add_preview_card(&mut dom, &format!("channel{i}"), Some("Chess"), &[]);
        }

        let bl = blacklist(&["slots"], &[], &[]);
        let mut engine = FilterEngine::new();
        let report = engine.run(&mut dom, PageType::Channels, &bl).unwrap();

        assert_eq!(report.removed, 0);
        assert!(!report.scroll_requested);
        assert!(dom.scrolled.is_empty());
    }

    #[test]
    fn test_no_scroll_on_frontpage() {
        let mut dom = TestDom::new();
        add_scroll_area(&mut dom);
        let card = dom.add(dom.root(), "article");
        dom.add_class(card, "front-card");
        let link = dom.add(card, "a");
        dom.set_attr(link, "data-a-target", "frontpage-card-link");
        dom.set_attr(link, "href", "/directory/game/Slots");

        let bl = blacklist(&["slots"], &[], &[]);
        let mut engine = FilterEngine::new();
        let report = engine.run(&mut dom, PageType::Frontpage, &bl).unwrap();

        assert_eq!(report.removed, 1);
        assert!(!report.scroll_requested);
        assert!(dom.scrolled.is_empty());
    }

    #[test]
    fn test_conflicting_extension_suppresses_scroll() {
        let mut dom = TestDom::new();
        add_scroll_area(&mut dom);
        let marker = dom.add(dom.root(), "div");
        dom.set_attr(marker, "data-ffz-version", "4");
        add_preview_card(&mut dom, "somechannel", Some("Slots"), &[]);

        let bl = blacklist(&["slots"], &[], &[]);
        let mut engine = FilterEngine::new();
        let report = engine.run(&mut dom, PageType::Channels, &bl).unwrap();

        assert_eq!(report.removed, 1);
        assert!(!report.scroll_requested);
        assert!(dom.scrolled.is_empty());
    }

    #[test]
    fn test_missing_card_root_fails_open() {
        let mut dom = TestDom::new();
        // A bare link with no card ancestor at all.
        let link = dom.add(dom.root(), "a");
        dom.set_attr(link, "data-a-target", "preview-card-image-link");
        dom.set_attr(link, "href", "/somechannel");

        let bl = blacklist(&[], &["somechannel"], &[]);
        let mut engine = FilterEngine::new();
        let report = engine.run(&mut dom, PageType::Channels, &bl).unwrap();

        assert_eq!(report.removed, 0);
        assert_eq!(report.survivors.len(), 1);
        assert!(!dom.is_hidden(link));
    }

    #[test]
    fn test_second_pass_skips_hidden_items() {
        let mut dom = TestDom::new();
        add_preview_card(&mut dom, "somechannel", Some("Slots"), &[]);
        add_preview_card(&mut dom, "otherchannel", Some("Chess"), &[]);

        let bl = blacklist(&["slots"], &[], &[]);
        let mut engine = FilterEngine::new();
        let first = engine.run(&mut dom, PageType::Channels, &bl).unwrap();
        assert_eq!(first.scraped, 2);
        assert_eq!(first.removed, 1);

        let second = engine.run(&mut dom, PageType::Channels, &bl).unwrap();
        assert_eq!(second.scraped, 1);
        assert_eq!(second.removed, 0);
    }
}
