use std::fs;
use std::io::Write;
use std::path::Path;

use hf_core::{
    evaluate, BlockDuration, BlockEntry, Candidate, Category, Clock, KeyValueBackend, Millis, NamedEntry,
    RuleStore,
};

pub fn cmd_block<B: KeyValueBackend, C: Clock>(
    store: &mut RuleStore<B, C>,
    out: &mut impl Write,
    category: Category,
    name: &str,
    duration: BlockDuration,
) -> Result<(), String> {
    let name = non_empty(category, name)?;
    store.add_block(category, &name, duration);
    flush(store)?;
    writeln!(out, "Blocked {category} '{name}' ({duration})").map_err(write_error)
}

pub fn cmd_unblock<B: KeyValueBackend, C: Clock>(
    store: &mut RuleStore<B, C>,
    out: &mut impl Write,
    category: Category,
    name: &str,
) -> Result<(), String> {
    let name = non_empty(category, name)?;
    if !store.get_stats(category, &name).blocked {
        return writeln!(out, "{category} '{name}' is not blocked").map_err(write_error);
    }
    store.remove_block(category, &name);
    flush(store)?;
    writeln!(out, "Unblocked {category} '{name}'").map_err(write_error)
}

pub fn cmd_check<B: KeyValueBackend, C: Clock>(
    store: &mut RuleStore<B, C>,
    out: &mut impl Write,
    category: Category,
    name: &str,
) -> Result<(), String> {
    let name = non_empty(category, name)?;
    let state = if store.is_blocked(category, &name) { "blocked" } else { "not blocked" };
    writeln!(out, "{category} '{name}': {state}").map_err(write_error)
}

pub fn cmd_stats<B: KeyValueBackend, C: Clock>(
    store: &RuleStore<B, C>,
    out: &mut impl Write,
    category: Category,
    name: &str,
) -> Result<(), String> {
    let name = non_empty(category, name)?;
    let entry = store.get_stats(category, &name);
    writeln!(out, "{category} '{name}'").map_err(write_error)?;
    write_entry(out, &entry, store.now_ms())
}

pub fn cmd_hide<B: KeyValueBackend, C: Clock>(
    store: &mut RuleStore<B, C>,
    out: &mut impl Write,
    category: Category,
    name: &str,
) -> Result<(), String> {
    let name = non_empty(category, name)?;
    store.increment_hidden(category, &name);
    flush(store)?;
    let hidden = store.get_stats(category, &name).hidden;
    writeln!(out, "{category} '{name}': hidden {hidden} time(s), {} total", store.total_hidden())
        .map_err(write_error)
}

pub fn cmd_list<B: KeyValueBackend, C: Clock>(
    store: &RuleStore<B, C>,
    out: &mut impl Write,
    json: bool,
) -> Result<(), String> {
    let summary = store.summary();
    if json {
        let text = serde_json::to_string_pretty(&summary)
            .map_err(|e| format!("Failed to serialize JSON: {}", e))?;
        return writeln!(out, "{text}").map_err(write_error);
    }

    let now = store.now_ms();
    writeln!(out, "Total hidden: {}", summary.total_hidden).map_err(write_error)?;
    write_section(out, "Blocked tags", &summary.blocked_tags, now)?;
    write_section(out, "Blocked authors", &summary.blocked_authors, now)?;
    write_section(out, "Previously hidden tags", &summary.inactive_tags, now)?;
    write_section(out, "Previously hidden authors", &summary.inactive_authors, now)?;
    Ok(())
}

pub fn cmd_export<B: KeyValueBackend, C: Clock>(
    store: &RuleStore<B, C>,
    out: &mut impl Write,
    output: Option<&Path>,
) -> Result<(), String> {
    let text = store.export_snapshot().map_err(|e| e.to_string())?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
            }
            fs::write(path, text).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
            writeln!(out, "Exported to '{}'", path.display()).map_err(write_error)
        }
        None => writeln!(out, "{text}").map_err(write_error),
    }
}

pub fn cmd_import<B: KeyValueBackend, C: Clock>(
    store: &mut RuleStore<B, C>,
    out: &mut impl Write,
    input: &Path,
) -> Result<(), String> {
    let text = fs::read_to_string(input)
        .map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?;
    store.import_snapshot(&text).map_err(|e| e.to_string())?;
    flush(store)?;

    let data = store.data();
    writeln!(
        out,
        "Imported {} tag(s) and {} author(s), {} hidden total",
        data.tags.len(),
        data.authors.len(),
        data.stats.total_hidden
    )
    .map_err(write_error)
}

pub fn cmd_evaluate<B: KeyValueBackend, C: Clock>(
    store: &mut RuleStore<B, C>,
    out: &mut impl Write,
    tags: &[String],
    author: Option<&str>,
) -> Result<(), String> {
    let candidates = Candidate::for_item(tags.iter().map(String::as_str), author);
    let evaluation = evaluate(store, &candidates);

    if evaluation.should_hide {
        writeln!(out, "hide").map_err(write_error)?;
        for reason in evaluation.reason_strings() {
            writeln!(out, "  {reason}").map_err(write_error)?;
        }
    } else {
        writeln!(out, "show").map_err(write_error)?;
    }
    Ok(())
}

fn non_empty(category: Category, name: &str) -> Result<String, String> {
    let name = category.normalize(name);
    if name.is_empty() {
        return Err("Name must not be empty".to_string());
    }
    Ok(name)
}

fn flush<B: KeyValueBackend, C: Clock>(store: &mut RuleStore<B, C>) -> Result<(), String> {
    store.save().map_err(|e| e.to_string())
}

fn write_error(e: std::io::Error) -> String {
    format!("Failed to write output: {}", e)
}

fn write_section(out: &mut impl Write, title: &str, entries: &[NamedEntry], now: Millis) -> Result<(), String> {
    writeln!(out, "{} ({}):", title, entries.len()).map_err(write_error)?;
    for item in entries {
        write!(out, "  {:<32} hidden {:>5}", item.name, item.entry.hidden).map_err(write_error)?;
        if let (true, Some(duration)) = (item.entry.blocked, item.entry.duration) {
            write!(out, "  {duration}").map_err(write_error)?;
            if item.entry.is_expired(now) {
                write!(out, " (expired)").map_err(write_error)?;
            }
        }
        writeln!(out).map_err(write_error)?;
    }
    Ok(())
}

fn write_entry(out: &mut impl Write, entry: &BlockEntry, now: Millis) -> Result<(), String> {
    writeln!(out, "  Hidden:      {}", entry.hidden).map_err(write_error)?;
    writeln!(out, "  Blocked:     {}", entry.blocked).map_err(write_error)?;
    if let Some(duration) = entry.duration {
        writeln!(out, "  Duration:    {duration}").map_err(write_error)?;
    }
    if let Some(blocked_at) = entry.blocked_at {
        writeln!(out, "  Blocked at:  {} ({})", blocked_at, describe_age(now.saturating_sub(blocked_at)))
            .map_err(write_error)?;
    }
    Ok(())
}

/// Coarse age of a block, e.g. `5 min ago`.
fn describe_age(elapsed: Millis) -> String {
    const MINUTE: Millis = 60_000;
    const HOUR: Millis = 3_600_000;
    const DAY: Millis = 86_400_000;

    if elapsed < HOUR {
        format!("{} min ago", elapsed / MINUTE)
    } else if elapsed < DAY {
        format!("{} h ago", elapsed / HOUR)
    } else {
        format!("{} d ago", elapsed / DAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_core::{FileBackend, ManualClock, StoreError, STORAGE_KEY};

    const T0: Millis = 1_700_000_000_000;

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_block_check_unblock() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(T0);
        let mut store = RuleStore::open(FileBackend::new(dir.path()), &clock);
        let mut out = Vec::new();

        cmd_block(&mut store, &mut out, Category::Tags, " Go ", BlockDuration::Day).unwrap();
        cmd_check(&mut store, &mut out, Category::Tags, "go").unwrap();
        cmd_unblock(&mut store, &mut out, Category::Tags, "GO").unwrap();
        cmd_unblock(&mut store, &mut out, Category::Tags, "go").unwrap();

        assert_eq!(
            output(out),
            "Blocked tags 'go' (day)\ntags 'go': blocked\nUnblocked tags 'go'\ntags 'go' is not blocked\n"
        );
        assert!(dir.path().join(format!("{STORAGE_KEY}.json")).exists());
    }

    #[test]
    fn test_block_rejects_blank_name() {
        let clock = ManualClock::new(T0);
        let mut store = RuleStore::open(hf_core::MemoryBackend::new(), &clock);
        let mut out = Vec::new();

        let err = cmd_block(&mut store, &mut out, Category::Authors, "  ", BlockDuration::Permanent);
        assert!(err.is_err());
        assert!(store.data().authors.is_empty());
    }

    #[test]
    fn test_check_reports_expiry() {
        let clock = ManualClock::new(T0);
        let mut store = RuleStore::open(hf_core::MemoryBackend::new(), &clock);
        let mut out = Vec::new();

        cmd_block(&mut store, &mut out, Category::Authors, "alice", BlockDuration::Week).unwrap();
        clock.advance(604_800_001);
        out.clear();
        cmd_check(&mut store, &mut out, Category::Authors, "alice").unwrap();

        assert_eq!(output(out), "authors 'alice': not blocked\n");
    }

    #[test]
    fn test_hide_and_stats() {
        let clock = ManualClock::new(T0);
        let mut store = RuleStore::open(hf_core::MemoryBackend::new(), &clock);
        let mut out = Vec::new();

        cmd_block(&mut store, &mut out, Category::Tags, "php", BlockDuration::Permanent).unwrap();
        cmd_hide(&mut store, &mut out, Category::Tags, "php").unwrap();
        clock.advance(2 * 3_600_000);
        out.clear();
        cmd_stats(&store, &mut out, Category::Tags, "php").unwrap();

        let text = output(out);
        assert!(text.contains("Hidden:      1"));
        assert!(text.contains("Blocked:     true"));
        assert!(text.contains("Duration:    permanent"));
        assert!(text.contains("(2 h ago)"));
    }

    #[test]
    fn test_list_text_and_json() {
        let clock = ManualClock::new(T0);
        let mut store = RuleStore::open(hf_core::MemoryBackend::new(), &clock);
        let mut sink = Vec::new();
        cmd_block(&mut store, &mut sink, Category::Tags, "go", BlockDuration::Day).unwrap();
        cmd_hide(&mut store, &mut sink, Category::Authors, "bob").unwrap();

        let mut out = Vec::new();
        cmd_list(&store, &mut out, false).unwrap();
        let text = output(out);
        assert!(text.starts_with("Total hidden: 1\n"));
        assert!(text.contains("Blocked tags (1):"));
        assert!(text.contains("Previously hidden authors (1):"));

        let mut out = Vec::new();
        cmd_list(&store, &mut out, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output(out)).unwrap();
        assert_eq!(value["badgeCount"], 1);
        assert_eq!(value["blockedTags"][0]["name"], "go");
        assert_eq!(value["inactiveAuthors"][0]["hidden"], 1);
    }

    #[test]
    fn test_export_import_between_dirs() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(T0);
        let mut sink = Vec::new();

        let mut src = RuleStore::open(FileBackend::new(src_dir.path()), &clock);
        cmd_block(&mut src, &mut sink, Category::Authors, "alice", BlockDuration::Month).unwrap();
        cmd_hide(&mut src, &mut sink, Category::Authors, "alice").unwrap();
        let export_path = src_dir.path().join("out").join("backup.json");
        cmd_export(&src, &mut sink, Some(export_path.as_path())).unwrap();

        let mut dst = RuleStore::open(FileBackend::new(dst_dir.path()), &clock);
        let mut out = Vec::new();
        cmd_import(&mut dst, &mut out, &export_path).unwrap();

        assert_eq!(output(out), "Imported 0 tag(s) and 1 author(s), 1 hidden total\n");
        let reopened = RuleStore::try_open(FileBackend::new(dst_dir.path()), &clock).unwrap();
        assert_eq!(reopened.get_stats(Category::Authors, "alice").hidden, 1);
        assert!(reopened.get_stats(Category::Authors, "alice").blocked);
    }

    #[test]
    fn test_import_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(T0);
        let mut store = RuleStore::open(FileBackend::new(dir.path()), &clock);
        let mut sink = Vec::new();
        cmd_block(&mut store, &mut sink, Category::Tags, "go", BlockDuration::Permanent).unwrap();
        let before = fs::read_to_string(dir.path().join(format!("{STORAGE_KEY}.json"))).unwrap();

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{not json").unwrap();
        let err = cmd_import(&mut store, &mut sink, &bad).unwrap_err();

        assert!(err.starts_with("import rejected"));
        let after = fs::read_to_string(dir.path().join(format!("{STORAGE_KEY}.json"))).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_corrupt_store_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(format!("{STORAGE_KEY}.json")), "[]").unwrap();

        let result = RuleStore::try_open(FileBackend::new(dir.path()), ManualClock::new(T0));
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_evaluate_dry_run() {
        let clock = ManualClock::new(T0);
        let mut store = RuleStore::open(hf_core::MemoryBackend::new(), &clock);
        let mut sink = Vec::new();
        cmd_block(&mut store, &mut sink, Category::Tags, "go", BlockDuration::Permanent).unwrap();
        cmd_block(&mut store, &mut sink, Category::Authors, "Alice", BlockDuration::Permanent).unwrap();

        let mut out = Vec::new();
        let tags = vec!["Go".to_string(), "Rust".to_string(), "go".to_string()];
        cmd_evaluate(&mut store, &mut out, &tags, Some("Alice")).unwrap();
        assert_eq!(output(out), "hide\n  тег: go\n  автор: Alice\n");
        assert_eq!(store.total_hidden(), 0);

        let mut out = Vec::new();
        cmd_evaluate(&mut store, &mut out, &["rust".to_string()], None).unwrap();
        assert_eq!(output(out), "show\n");
    }

    #[test]
    fn test_describe_age() {
        assert_eq!(describe_age(0), "0 min ago");
        assert_eq!(describe_age(5 * 60_000), "5 min ago");
        assert_eq!(describe_age(3 * 3_600_000), "3 h ago");
        assert_eq!(describe_age(2 * 86_400_000), "2 d ago");
    }
}
