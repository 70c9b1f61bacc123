//! WebAssembly bindings for the Habr content filter
//!
//! The userscript creates one [`ContentFilter`] at startup and keeps it for
//! the lifetime of the page. Rules persist in `window.localStorage`.

use hf_core::{
    evaluate, BackendError, BlockDuration, BlockEntry, Candidate, CandidateResult, Category, Clock,
    Evaluation, HideTracker, KeyValueBackend, Millis, ParseError, RuleStore,
};
use wasm_bindgen::prelude::*;

// =============================================================================
// Host Adapters
// =============================================================================

/// `window.localStorage`, if the page allows it.
pub struct LocalStorage {
    storage: Option<web_sys::Storage>,
}

impl LocalStorage {
    pub fn from_window() -> Self {
        let storage = web_sys::window().and_then(|w| w.local_storage().ok().flatten());
        if storage.is_none() {
            log::warn!("localStorage is unavailable; rules will not survive a reload");
        }
        Self { storage }
    }

    fn storage(&self) -> Result<&web_sys::Storage, BackendError> {
        self.storage
            .as_ref()
            .ok_or_else(|| BackendError::Unavailable("no localStorage".to_string()))
    }
}

impl KeyValueBackend for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        self.storage()?
            .get_item(key)
            .map_err(|e| BackendError::Unavailable(describe(&e)))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), BackendError> {
        self.storage()?
            .set_item(key, value)
            .map_err(|e| BackendError::Unavailable(describe(&e)))
    }
}

/// `Date.now()`.
pub struct JsClock;

impl Clock for JsClock {
    fn now_ms(&self) -> Millis {
        js_sys::Date::now() as Millis
    }
}

struct ConsoleLogger;

static CONSOLE_LOGGER: ConsoleLogger = ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = JsValue::from_str(&format!("[habr-filter] {}", record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&message),
            log::Level::Warn => web_sys::console::warn_1(&message),
            log::Level::Info => web_sys::console::info_1(&message),
            log::Level::Debug | log::Level::Trace => web_sys::console::debug_1(&message),
        }
    }

    fn flush(&self) {}
}

/// Route `log` output to the browser console.
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging(verbose: bool) {
    // Already installed on the second call; only the level changes.
    let _ = log::set_logger(&CONSOLE_LOGGER);
    log::set_max_level(if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    });
}

// =============================================================================
// Content Filter
// =============================================================================

#[wasm_bindgen]
pub struct ContentFilter {
    store: RuleStore<LocalStorage, JsClock>,
    tracker: HideTracker,
}

#[wasm_bindgen]
impl ContentFilter {
    /// Load rules from localStorage. Never fails; bad data starts empty.
    #[wasm_bindgen(constructor)]
    pub fn new() -> ContentFilter {
        if log::max_level() == log::LevelFilter::Off {
            init_logging(false);
        }
        let store = RuleStore::open(LocalStorage::from_window(), JsClock);
        log::info!(
            "loaded {} tag and {} author rules",
            store.data().tags.len(),
            store.data().authors.len()
        );
        ContentFilter { store, tracker: HideTracker::new() }
    }

    #[wasm_bindgen(js_name = addBlock)]
    pub fn add_block(&mut self, category: &str, name: &str, duration: Option<String>) -> Result<(), JsValue> {
        let category = parse_category(category).map_err(to_js_error)?;
        let duration = parse_duration(duration.as_deref()).map_err(to_js_error)?;
        self.store.add_block(category, &category.normalize(name), duration);
        Ok(())
    }

    #[wasm_bindgen(js_name = removeBlock)]
    pub fn remove_block(&mut self, category: &str, name: &str) -> Result<(), JsValue> {
        let category = parse_category(category).map_err(to_js_error)?;
        self.store.remove_block(category, &category.normalize(name));
        Ok(())
    }

    #[wasm_bindgen(js_name = incrementHidden)]
    pub fn increment_hidden(&mut self, category: &str, name: &str) -> Result<(), JsValue> {
        let category = parse_category(category).map_err(to_js_error)?;
        self.store.increment_hidden(category, &category.normalize(name));
        Ok(())
    }

    #[wasm_bindgen(js_name = isBlocked)]
    pub fn is_blocked(&mut self, category: &str, name: &str) -> Result<bool, JsValue> {
        let category = parse_category(category).map_err(to_js_error)?;
        Ok(self.store.is_blocked(category, &category.normalize(name)))
    }

    #[wasm_bindgen(js_name = getStats)]
    pub fn get_stats(&self, category: &str, name: &str) -> Result<JsValue, JsValue> {
        let category = parse_category(category).map_err(to_js_error)?;
        Ok(entry_to_js(&self.store.get_stats(category, &category.normalize(name))))
    }

    #[wasm_bindgen(js_name = totalHidden)]
    pub fn total_hidden(&self) -> f64 {
        self.store.total_hidden() as f64
    }

    #[wasm_bindgen(js_name = exportSnapshot)]
    pub fn export_snapshot(&self) -> Result<String, JsValue> {
        self.store.export_snapshot().map_err(to_js_error)
    }

    /// `false` when the payload was rejected; nothing changes in that case.
    #[wasm_bindgen(js_name = importSnapshot)]
    pub fn import_snapshot(&mut self, text: &str) -> bool {
        match self.store.import_snapshot(text) {
            Ok(()) => true,
            Err(e) => {
                log::error!("{e}");
                false
            }
        }
    }

    /// Re-read localStorage, e.g. after another tab changed the rules.
    pub fn reload(&mut self) {
        self.store.reload();
    }

    /// Hide decision for an item, without counting anything.
    pub fn evaluate(&mut self, tags: JsValue, author: Option<String>) -> JsValue {
        let candidates = candidates_from_js(&tags, author.as_deref());
        evaluation_to_js(&evaluate(&mut self.store, &candidates))
    }

    /// Evaluate an item and count its hide reasons once per item.
    ///
    /// `itemId` must be stable across re-scans of the same article.
    #[wasm_bindgen(js_name = applyItem)]
    pub fn apply_item(&mut self, item_id: &str, tags: JsValue, author: Option<String>) -> JsValue {
        let candidates = candidates_from_js(&tags, author.as_deref());
        let evaluation = evaluate(&mut self.store, &candidates);
        let outcome = self.tracker.apply(&mut self.store, item_id, &evaluation);

        let result = evaluation_to_js(&evaluation);
        set(&result, "transition", &JsValue::from_str(outcome.transition.as_str()));
        let counted = js_sys::Array::new();
        for reason in &outcome.counted {
            counted.push(&JsValue::from_str(&reason.to_string()));
        }
        set(&result, "counted", &counted);
        result
    }

    #[wasm_bindgen(js_name = forgetItem)]
    pub fn forget_item(&mut self, item_id: &str) -> bool {
        self.tracker.forget(item_id)
    }

    /// Control panel listings as a plain object.
    pub fn summary(&self) -> Result<JsValue, JsValue> {
        let json = serde_json::to_string(&self.store.summary()).map_err(to_js_error)?;
        js_sys::JSON::parse(&json)
    }

    #[wasm_bindgen(js_name = getSetting)]
    pub fn get_setting(&self, key: &str) -> Option<bool> {
        let settings = self.store.settings();
        match key {
            "showStats" => Some(settings.show_stats),
            "animateHiding" => Some(settings.animate_hiding),
            "showPreview" => Some(settings.show_preview),
            "focusMode" => Some(settings.focus_mode),
            _ => settings.extra.get(key).and_then(|v| v.as_bool()),
        }
    }

    #[wasm_bindgen(js_name = setSetting)]
    pub fn set_setting(&mut self, key: &str, value: bool) {
        self.store.update_settings(|settings| match key {
            "showStats" => settings.show_stats = value,
            "animateHiding" => settings.animate_hiding = value,
            "showPreview" => settings.show_preview = value,
            "focusMode" => settings.focus_mode = value,
            _ => {
                settings.extra.insert(key.to_string(), value.into());
            }
        });
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn parse_category(category: &str) -> Result<Category, ParseError> {
    category.parse()
}

fn parse_duration(duration: Option<&str>) -> Result<BlockDuration, ParseError> {
    match duration {
        Some(d) => d.parse(),
        None => Ok(BlockDuration::Permanent),
    }
}

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn describe(e: &JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{e:?}"))
}

fn candidates_from_js(tags: &JsValue, author: Option<&str>) -> Vec<Candidate> {
    let names: Vec<String> = js_sys::Array::from(tags)
        .iter()
        .filter_map(|value| value.as_string())
        .collect();
    Candidate::for_item(names.iter().map(String::as_str), author)
}

fn set(target: &JsValue, key: &str, value: &JsValue) {
    let _ = js_sys::Reflect::set(target, &JsValue::from_str(key), value);
}

fn entry_to_js(entry: &BlockEntry) -> JsValue {
    let result: JsValue = js_sys::Object::new().into();
    set(&result, "hidden", &JsValue::from(entry.hidden as f64));
    set(&result, "blocked", &JsValue::from(entry.blocked));
    if let Some(blocked_at) = entry.blocked_at {
        set(&result, "blockedAt", &JsValue::from(blocked_at as f64));
    }
    if let Some(duration) = entry.duration {
        set(&result, "duration", &JsValue::from_str(duration.as_str()));
    }
    result
}

fn candidate_to_js(candidate: &CandidateResult) -> JsValue {
    let result: JsValue = js_sys::Object::new().into();
    set(&result, "name", &JsValue::from_str(&candidate.name));
    set(&result, "blocked", &JsValue::from(candidate.blocked));
    set(&result, "stats", &entry_to_js(&candidate.stats));
    result
}

fn evaluation_to_js(evaluation: &Evaluation) -> JsValue {
    let result: JsValue = js_sys::Object::new().into();
    set(&result, "shouldHide", &JsValue::from(evaluation.should_hide));

    let reasons = js_sys::Array::new();
    for reason in evaluation.reason_strings() {
        reasons.push(&JsValue::from_str(&reason));
    }
    set(&result, "hideReasons", &reasons);

    let tags = js_sys::Array::new();
    for tag in &evaluation.tag_results {
        tags.push(&candidate_to_js(tag));
    }
    set(&result, "tagResults", &tags);

    let author = evaluation
        .author_result
        .as_ref()
        .map(candidate_to_js)
        .unwrap_or(JsValue::NULL);
    set(&result, "authorResult", &author);

    result
}
