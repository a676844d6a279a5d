//! WebAssembly bindings for dirsweep
//!
//! Thin shim between the content script and the core engine. The JS side owns
//! the real browser services: it forwards storage snapshots, timer ticks,
//! mutation-observer callbacks and runtime messages into these entry points,
//! and applies scheduler/storage effects the core requests back out. DOM
//! access happens directly from here through a `querySelectorAll`-backed
//! [`Dom`] implementation over live elements.

use std::cell::RefCell;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use ds_core::{
    classify, decode, encode, Blacklist, Dom, EntryKind, LifecycleController, MemoryBackend,
    NodeId, Parent, PassReport, PollTask, Scheduler, Selector, TransportMessage,
};

// =============================================================================
// Live DOM
// =============================================================================

/// [`Dom`] over live `web_sys` elements. Node handles index an arena of
/// element references built up as queries run; a fresh instance is created
/// for every pass, so handles never outlive the tick that produced them.
struct WebDom {
    nodes: RefCell<Vec<web_sys::Element>>,
}

impl WebDom {
    fn new(root: web_sys::Element) -> Self {
        WebDom {
            nodes: RefCell::new(vec![root]),
        }
    }

    fn element(&self, node: NodeId) -> Option<web_sys::Element> {
        self.nodes.borrow().get(node).cloned()
    }

    fn intern(&self, element: web_sys::Element) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(existing) = nodes.iter().position(|e| *e == element) {
            return existing;
        }
        nodes.push(element);
        nodes.len() - 1
    }
}

impl Dom for WebDom {
    fn root(&self) -> NodeId {
        0
    }

    fn query(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        let scope = self.element(scope)?;
        let found = scope.query_selector(&selector.to_css()).ok().flatten()?;
        Some(self.intern(found))
    }

    fn query_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        let Some(scope) = self.element(scope) else {
            return Vec::new();
        };
        let Ok(list) = scope.query_selector_all(&selector.to_css()) else {
            return Vec::new();
        };
        let mut found = Vec::with_capacity(list.length() as usize);
        for i in 0..list.length() {
            if let Some(element) = list.item(i).and_then(|n| n.dyn_into::<web_sys::Element>().ok())
            {
                found.push(self.intern(element));
            }
        }
        found
    }

    fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        self.element(node)
            .and_then(|e| e.matches(&selector.to_css()).ok())
            .unwrap_or(false)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.element(node)?.parent_element()?;
        Some(self.intern(parent))
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node)?.get_attribute(name)
    }

    fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(element) = self.element(node) {
            let _ = element.set_attribute(name, value);
        }
    }

    fn text(&self, node: NodeId) -> String {
        self.element(node)
            .and_then(|e| e.text_content())
            .map(|t| t.trim().to_string())
            .unwrap_or_default()
    }

    fn has_structural_marks(&self, node: NodeId) -> bool {
        let Some(element) = self.element(node) else {
            return false;
        };
        if !element.class_name().is_empty() {
            return true;
        }
        let attrs = element.attributes();
        for i in 0..attrs.length() {
            if let Some(attr) = attrs.item(i) {
                if attr.name().starts_with("data-") {
                    return true;
                }
            }
        }
        false
    }

    fn hide(&mut self, node: NodeId) {
        if let Some(element) = self.element(node) {
            let _ = element.set_attribute("style", "display: none !important;");
        }
    }

    fn dispatch_scroll(&mut self, node: NodeId) {
        let Some(element) = self.element(node) else {
            return;
        };
        if let Ok(event) = web_sys::Event::new("scroll") {
            let _ = element.dispatch_event(&event);
        }
    }
}

fn current_dom() -> Result<WebDom, JsValue> {
    let root = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.document_element())
        .ok_or_else(|| JsValue::from_str("No document available"))?;
    Ok(WebDom::new(root))
}

// =============================================================================
// Host Scheduler
// =============================================================================

/// Records arm/clear requests for the JS side, which owns the real
/// `setInterval` handles. Drained through [`take_scheduler_ops`].
#[derive(Default)]
struct HostScheduler {
    ops: Vec<(PollTask, Option<u32>)>,
}

impl Scheduler for HostScheduler {
    fn arm(&mut self, task: PollTask, interval_ms: u32) {
        self.ops.push((task, Some(interval_ms)));
    }

    fn clear(&mut self, task: PollTask) {
        self.ops.push((task, None));
    }
}

fn task_name(task: PollTask) -> &'static str {
    match task {
        PollTask::PathChange => "pathChange",
        PollTask::PageLoad => "pageLoad",
        PollTask::ScrollSettle => "scrollSettle",
    }
}

// =============================================================================
// State
// =============================================================================

struct App {
    controller: LifecycleController<MemoryBackend>,
    scheduler: HostScheduler,
}

thread_local! {
    static APP: RefCell<Option<App>> = RefCell::new(None);
}

fn with_app<R>(f: impl FnOnce(&mut App) -> Result<R, JsValue>) -> Result<R, JsValue> {
    APP.with(|cell| {
        let mut slot = cell.borrow_mut();
        let app = slot
            .as_mut()
            .ok_or_else(|| JsValue::from_str("Not initialized. Call init first."))?;
        f(app)
    })
}

// =============================================================================
// JSON Bridging
// =============================================================================

fn js_to_json(value: &JsValue) -> Result<serde_json::Value, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(serde_json::Value::Null);
    }
    let text = js_sys::JSON::stringify(value)
        .map_err(|_| JsValue::from_str("Value is not JSON-serializable"))?;
    let text = String::from(text);
    serde_json::from_str(&text).map_err(|e| JsValue::from_str(&format!("Malformed value: {e}")))
}

fn json_to_js(value: &serde_json::Value) -> JsValue {
    js_sys::JSON::parse(&value.to_string()).unwrap_or(JsValue::NULL)
}

fn js_record(value: &JsValue) -> Result<serde_json::Map<String, serde_json::Value>, JsValue> {
    match js_to_json(value)? {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(serde_json::Map::new()),
        _ => Err(JsValue::from_str("Expected a storage record object")),
    }
}

fn report_to_js(dom: &WebDom, report: Option<&PassReport>) -> JsValue {
    let result = js_sys::Object::new();
    let Some(report) = report else {
        let _ = js_sys::Reflect::set(&result, &"ran".into(), &JsValue::from(false));
        return result.into();
    };
    let _ = js_sys::Reflect::set(&result, &"ran".into(), &JsValue::from(true));
    let _ = js_sys::Reflect::set(&result, &"scraped".into(), &JsValue::from(report.scraped as u32));
    let _ = js_sys::Reflect::set(&result, &"removed".into(), &JsValue::from(report.removed as u32));
    let _ = js_sys::Reflect::set(
        &result,
        &"scrollRequested".into(),
        &JsValue::from(report.scroll_requested),
    );
    let _ = js_sys::Reflect::set(
        &result,
        &"structuralMismatch".into(),
        &JsValue::from(report.structural_mismatch),
    );

    // Survivors carry their live element so the content script can attach
    // hide buttons.
    let survivors = js_sys::Array::new();
    for item in &report.survivors {
        let entry = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&entry, &"name".into(), &JsValue::from_str(&item.name));
        let kind = match item.parent {
            Parent::None => "category",
            Parent::Unknown | Parent::Category(_) => "channel",
        };
        let _ = js_sys::Reflect::set(&entry, &"kind".into(), &JsValue::from_str(kind));
        if let Parent::Category(ref parent) = item.parent {
            let _ = js_sys::Reflect::set(&entry, &"parent".into(), &JsValue::from_str(parent));
        }
        let tags = js_sys::Array::new();
        for tag in &item.tags {
            tags.push(&JsValue::from_str(tag));
        }
        let _ = js_sys::Reflect::set(&entry, &"tags".into(), &tags);
        if let Some(element) = dom.element(item.node) {
            let _ = js_sys::Reflect::set(&entry, &"element".into(), &element.into());
        }
        survivors.push(&entry);
    }
    let _ = js_sys::Reflect::set(&result, &"survivors".into(), &survivors);
    result.into()
}

// =============================================================================
// Entry Points
// =============================================================================

/// Initialize the controller from the full storage snapshot and the current
/// location path. Re-initializing replaces the previous controller (the
/// content script does this on extension reload).
#[wasm_bindgen]
pub fn init(storage_record: JsValue, path: &str) -> Result<(), JsValue> {
    let record = js_record(&storage_record)?;
    let backend = MemoryBackend::with_items(record);
    let mut app = App {
        controller: LifecycleController::new(backend),
        scheduler: HostScheduler::default(),
    };
    app.controller
        .init(&mut app.scheduler, path)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    APP.with(|cell| cell.replace(Some(app)));
    Ok(())
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    APP.with(|cell| cell.borrow().is_some())
}

/// Path poll tick; `path` is the current `location.pathname`.
#[wasm_bindgen]
pub fn poll_path(path: &str) -> Result<(), JsValue> {
    with_app(|app| {
        app.controller.poll_path(&mut app.scheduler, path);
        Ok(())
    })
}

/// Page-load poll tick. Returns a pass report once the page came up, or
/// `{ran: false}` while it is still rendering.
#[wasm_bindgen]
pub fn poll_page_load() -> Result<JsValue, JsValue> {
    let mut dom = current_dom()?;
    with_app(|app| {
        let report = app.controller.poll_page_load(&mut dom, &mut app.scheduler);
        Ok(report_to_js(&dom, report.as_ref()))
    })
}

/// Scroll-settle poll tick.
#[wasm_bindgen]
pub fn poll_scroll() -> Result<JsValue, JsValue> {
    let mut dom = current_dom()?;
    with_app(|app| {
        let report = app.controller.poll_scroll(&mut dom);
        Ok(report_to_js(&dom, report.as_ref()))
    })
}

/// Sidebar mutation-observer callback. Returns the number of cards hidden.
#[wasm_bindgen]
pub fn sidebar_mutated() -> Result<u32, JsValue> {
    let mut dom = current_dom()?;
    with_app(|app| Ok(app.controller.on_sidebar_mutation(&mut dom) as u32))
}

/// Dispatch a runtime message (blacklist update or enable/disable toggle).
#[wasm_bindgen]
pub fn handle_message(message: JsValue) -> Result<JsValue, JsValue> {
    let message: TransportMessage = serde_json::from_value(js_to_json(&message)?)
        .map_err(|e| JsValue::from_str(&format!("Unrecognized message: {e}")))?;
    let mut dom = current_dom()?;
    with_app(|app| {
        let report = app
            .controller
            .on_message(&mut dom, message)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(report_to_js(&dom, report.as_ref()))
    })
}

/// Hide-button callback: blacklist `name` under `kind` ("categories",
/// "channels" or "tags") and re-filter.
#[wasm_bindgen]
pub fn hide_item(kind: &str, name: &str) -> Result<JsValue, JsValue> {
    let kind = EntryKind::from_wire_key(kind)
        .ok_or_else(|| JsValue::from_str("Unknown item kind"))?;
    let mut dom = current_dom()?;
    with_app(|app| {
        let report = app
            .controller
            .hide_item(&mut dom, kind, name)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(report_to_js(&dom, report.as_ref()))
    })
}

/// The full mirrored storage record. The content script persists this to the
/// real extension storage after any mutating call.
#[wasm_bindgen]
pub fn storage_record() -> Result<JsValue, JsValue> {
    with_app(|app| {
        let result = js_sys::Object::new();
        for (key, value) in app.controller.store().backend().items() {
            let _ = js_sys::Reflect::set(&result, &key.as_str().into(), &json_to_js(value));
        }
        Ok(result.into())
    })
}

/// Drain pending scheduler requests: an array of `{task, action, intervalMs}`
/// objects the JS side applies to its `setInterval` handles.
#[wasm_bindgen]
pub fn take_scheduler_ops() -> Result<JsValue, JsValue> {
    with_app(|app| {
        let ops = std::mem::take(&mut app.scheduler.ops);
        let result = js_sys::Array::new();
        for (task, interval) in ops {
            let op = js_sys::Object::new();
            let _ = js_sys::Reflect::set(&op, &"task".into(), &JsValue::from_str(task_name(task)));
            match interval {
                Some(ms) => {
                    let _ = js_sys::Reflect::set(&op, &"action".into(), &JsValue::from_str("arm"));
                    let _ = js_sys::Reflect::set(&op, &"intervalMs".into(), &JsValue::from(ms));
                }
                None => {
                    let _ =
                        js_sys::Reflect::set(&op, &"action".into(), &JsValue::from_str("clear"));
                }
            }
            result.push(&op);
        }
        Ok(result.into())
    })
}

/// Current session state, for the popup UI.
#[wasm_bindgen]
pub fn session_info() -> Result<JsValue, JsValue> {
    with_app(|app| {
        let session = app.controller.session();
        let result = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&result, &"enabled".into(), &JsValue::from(session.enabled));
        let _ = js_sys::Reflect::set(
            &result,
            &"pageLoading".into(),
            &JsValue::from(session.page_loading),
        );
        let _ = js_sys::Reflect::set(&result, &"path".into(), &JsValue::from_str(&session.path));
        match session.page {
            Some(page) => {
                let _ = js_sys::Reflect::set(
                    &result,
                    &"page".into(),
                    &JsValue::from_str(page.as_str()),
                );
            }
            None => {
                let _ = js_sys::Reflect::set(&result, &"page".into(), &JsValue::NULL);
            }
        }
        Ok(result.into())
    })
}

// =============================================================================
// Stateless Helpers
// =============================================================================

/// Classify a location path; returns the page-type name or `null`.
#[wasm_bindgen]
pub fn classify_path(path: &str) -> Option<String> {
    classify(path).map(|page| page.as_str().to_string())
}

/// Encode a blacklist entries object into its storage record, for the
/// management UI's import flow. Returns `{record, fragments}`.
#[wasm_bindgen]
pub fn encode_blacklist(entries: JsValue) -> Result<JsValue, JsValue> {
    let blacklist = Blacklist::from_wire(&js_to_json(&entries)?);
    let encoded = encode(&blacklist).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(
        &result,
        &"record".into(),
        &json_to_js(&serde_json::Value::Object(encoded.items)),
    );
    let _ = js_sys::Reflect::set(
        &result,
        &"fragments".into(),
        &JsValue::from(encoded.fragments as u32),
    );
    Ok(result.into())
}

/// Decode a full storage record back into canonical blacklist entries, for
/// the management UI's export flow.
#[wasm_bindgen]
pub fn decode_record(record: JsValue) -> Result<JsValue, JsValue> {
    let blacklist = decode(&js_record(&record)?);
    let entries =
        serde_json::to_value(&blacklist).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(json_to_js(&entries))
}
