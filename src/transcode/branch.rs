//! Menu branch resolution for imported menu records.

use serde_json::{Map, Value};
use tracing::debug;

use crate::model::{LegacyNodeRecord, MAX_MENU_OPTIONS, OptionKey, OptionsTarget, scalar_text};

/// Resolved routing of one menu record.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuBranches {
    /// Numeric option keys, ascending by value.
    pub options: Vec<OptionKey>,
    /// Holds at least one numeric key, `NI` and `NM`; with a declared
    /// option count N, every key of `1..=N` as well.
    pub options_target: OptionsTarget,
    /// Declared option count, else the number of numeric keys.
    pub option_count: u32,
}

/// Derives a complete `optionsTarget` table for a menu record.
///
/// The raw table is read from the record's top-level `optionsTarget`, then
/// `data.optionsTarget`, then `popupDetails.optionsTarget`. An empty table is
/// seeded with `1`, `NI` and `NM`. When the record declares an option count
/// N, every key in `1..=N` missing a target gets the record's fallback
/// `target`; the sentinels always do. Counts and keys above
/// [`MAX_MENU_OPTIONS`] are dropped.
pub fn resolve_menu_options(record: &LegacyNodeRecord) -> MenuBranches {
    let fallback = record.fallback_target();
    let mut table = raw_options_target(record);

    if table.digits().is_empty() {
        table.fill(OptionKey::Digit(1), fallback);
    }

    let declared = declared_option_count(record);
    for n in 1..=declared.unwrap_or(0) {
        table.fill(OptionKey::Digit(n), fallback);
    }
    table.fill(OptionKey::NoInput, fallback);
    table.fill(OptionKey::NoMatch, fallback);

    let options: Vec<OptionKey> = table.digits().into_iter().map(OptionKey::Digit).collect();
    let option_count = declared.unwrap_or(options.len() as u32);

    MenuBranches {
        options,
        options_target: table,
        option_count,
    }
}

fn raw_options_target(record: &LegacyNodeRecord) -> OptionsTarget {
    let raw = record
        .options_target
        .as_ref()
        .and_then(Value::as_object)
        .or_else(|| record.data.get("optionsTarget").and_then(Value::as_object))
        .or_else(|| record.popup_details.as_ref().and_then(|p| p.get("optionsTarget")).and_then(Value::as_object));

    let Some(raw) = raw else {
        return OptionsTarget::new();
    };
    parse_options_target(&record.id, raw)
}

fn parse_options_target(
    node_id: &str,
    raw: &Map<String, Value>,
) -> OptionsTarget {
    let mut table = OptionsTarget::new();
    for (key, target) in raw {
        let key = match key.parse::<OptionKey>() {
            Ok(key) if key.is_routable() => key,
            _ => {
                debug!("menu {}: drop options key '{}'", node_id, key);
                continue;
            }
        };
        match target.as_str() {
            Some(target) => table.insert(key, target),
            None => debug!("menu {}: drop non-text target for option {}", node_id, key),
        }
    }
    table
}

fn declared_option_count(record: &LegacyNodeRecord) -> Option<u32> {
    let popup = record.popup_details.as_ref().and_then(|p| p.get("menuoptions"));
    let data = record.data.get("menuoptions");
    let declared = [popup, data].into_iter().flatten().filter_map(scalar_text).find_map(|s| s.trim().parse::<u32>().ok().filter(|n| *n > 0))?;
    if declared > MAX_MENU_OPTIONS {
        debug!("menu {}: clamp menuoptions {} to {}", record.id, declared, MAX_MENU_OPTIONS);
    }
    Some(declared.min(MAX_MENU_OPTIONS))
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::model::LegacyRecord;

    fn menu(value: Value) -> LegacyNodeRecord {
        match LegacyRecord::from_value(value).unwrap() {
            Some(LegacyRecord::Node(node)) => node,
            other => panic!("expected node record, got {:?}", other),
        }
    }

    #[test]
    fn test_seed_empty_table() {
        let record = menu(json!({"id": "menu-1", "nodeType": "Menu", "target": "end-1", "data": {}}));
        let branches = resolve_menu_options(&record);

        assert_eq!(branches.options, vec![OptionKey::Digit(1)]);
        assert_eq!(branches.option_count, 1);
        assert_eq!(
            serde_json::to_value(&branches.options_target).unwrap(),
            json!({"1": "end-1", "NI": "end-1", "NM": "end-1"})
        );
    }

    #[test]
    fn test_numeric_option_order() {
        let record = menu(json!({
            "id": "menu-1",
            "nodeType": "Menu",
            "data": {"optionsTarget": {"10": "a", "2": "b", "1": "c", "NI": "d", "NM": "e"}}
        }));
        let branches = resolve_menu_options(&record);
        let options: Vec<String> = branches.options.iter().map(|k| k.to_string()).collect();

        assert_eq!(options, vec!["1", "2", "10"]);
        assert_eq!(branches.option_count, 3);
    }

    #[test]
    fn test_complete_for_declared_count() {
        for n in 1..=6u32 {
            let record = menu(json!({
                "id": "menu-1",
                "nodeType": "Menu",
                "target": "playPrompt-1",
                "popupDetails": {"menuoptions": n.to_string(), "optionsTarget": {"1": "end-1"}}
            }));
            let branches = resolve_menu_options(&record);

            let mut expected: Vec<OptionKey> = (1..=n).map(OptionKey::Digit).collect();
            expected.push(OptionKey::NoInput);
            expected.push(OptionKey::NoMatch);
            let keys: Vec<OptionKey> = branches.options_target.iter().map(|(k, _)| *k).collect();
            assert_eq!(keys, expected);
            assert!(branches.options_target.iter().all(|(_, v)| !v.is_empty()));
            assert_eq!(branches.options_target.get(&OptionKey::Digit(1)), Some("end-1"));
        }
    }

    #[test]
    fn test_source_priority() {
        let record = menu(json!({
            "id": "menu-1",
            "nodeType": "Menu",
            "optionsTarget": {"1": "top"},
            "data": {"optionsTarget": {"1": "data"}},
            "popupDetails": {"optionsTarget": {"1": "popup"}}
        }));
        assert_eq!(resolve_menu_options(&record).options_target.get(&OptionKey::Digit(1)), Some("top"));

        let record = menu(json!({
            "id": "menu-1",
            "nodeType": "Menu",
            "popupDetails": {"optionsTarget": {"1": "popup", "2": null, "x": "bad"}, "menuoptions": 2}
        }));
        let branches = resolve_menu_options(&record);
        assert_eq!(branches.options_target.get(&OptionKey::Digit(1)), Some("popup"));
        assert_eq!(branches.options_target.get(&OptionKey::Digit(2)), Some(""));
        assert_eq!(branches.options_target.len(), 4);
    }

    #[test]
    fn test_option_count_capped() {
        let record = menu(json!({
            "id": "menu-1",
            "nodeType": "Menu",
            "target": "end-1",
            "popupDetails": {"menuoptions": "3000000"}
        }));
        let branches = resolve_menu_options(&record);
        assert_eq!(branches.option_count, MAX_MENU_OPTIONS);
        assert_eq!(branches.options.len(), MAX_MENU_OPTIONS as usize);
        assert_eq!(branches.options_target.len(), MAX_MENU_OPTIONS as usize + 2);

        let record = menu(json!({
            "id": "menu-1",
            "nodeType": "Menu",
            "target": "end-1",
            "optionsTarget": {"3000000": "playPrompt-1", "4294967295": "playPrompt-2", "2": "playPrompt-3"}
        }));
        let branches = resolve_menu_options(&record);
        assert_eq!(branches.options, vec![OptionKey::Digit(2)]);
        assert_eq!(branches.options_target.len(), 3);
    }
}
