// ABOUTME: Operations over the recursive feature-module tree
// ABOUTME: Pre-order id assignment, selection filtering and text renderings for prompts

use std::collections::HashSet;

use crate::types::FeatureModule;

/// Every id already present anywhere in the tree
pub fn collect_ids(modules: &[FeatureModule]) -> HashSet<i64> {
    let mut ids = HashSet::new();
    collect_into(modules, &mut ids);
    ids
}

fn collect_into(modules: &[FeatureModule], ids: &mut HashSet<i64>) {
    for module in modules {
        if let Some(id) = module.id {
            ids.insert(id);
        }
        collect_into(module.children(), ids);
    }
}

/// Smallest id >= `candidate` that is not taken
pub fn next_free_id(candidate: i64, taken: &HashSet<i64>) -> i64 {
    let mut id = candidate;
    while taken.contains(&id) {
        id += 1;
    }
    id
}

/// Assign ids to modules lacking one, in pre-order, starting at 1.
///
/// Ids already present in the tree are never reused. Returns the next
/// unassigned counter value.
pub fn assign_ids(modules: &mut [FeatureModule]) -> i64 {
    let taken = collect_ids(modules);
    assign_ids_from(modules, 1, &taken)
}

fn assign_ids_from(modules: &mut [FeatureModule], mut next: i64, taken: &HashSet<i64>) -> i64 {
    for module in modules.iter_mut() {
        if module.id.is_none() {
            let id = next_free_id(next, taken);
            module.id = Some(id);
            next = id + 1;
        }
        if let Some(children) = module.sub_features.as_mut() {
            next = assign_ids_from(children, next, taken);
        }
    }
    next
}

/// Set `selected = true` on every module that lacks the flag
pub fn default_selected(modules: &mut [FeatureModule]) {
    for module in modules.iter_mut() {
        if module.selected.is_none() {
            module.selected = Some(true);
        }
        if let Some(children) = module.sub_features.as_mut() {
            default_selected(children);
        }
    }
}

/// Keep modules whose id is selected (with their subtree intact), or whose
/// filtered children are non-empty (as a copy carrying only those children)
pub fn filter_selected(modules: &[FeatureModule], selected: &HashSet<i64>) -> Vec<FeatureModule> {
    let mut result = Vec::new();
    for module in modules {
        if module.id.is_some_and(|id| selected.contains(&id)) {
            result.push(module.clone());
        } else if module.sub_features.is_some() {
            let children = filter_selected(module.children(), selected);
            if !children.is_empty() {
                let mut copy = module.clone();
                copy.sub_features = Some(children);
                result.push(copy);
            }
        }
    }
    result
}

/// Markdown-ish rendering used by the demo prompts
pub fn format_features_text(modules: &[FeatureModule]) -> String {
    let mut lines = Vec::new();
    for module in modules {
        let name = if module.name.is_empty() {
            "Module"
        } else {
            module.name.as_str()
        };
        lines.push(format!("## {}", name));
        lines.push(format!(
            "Description: {}",
            module.description.as_deref().unwrap_or("")
        ));
        if !module.children().is_empty() {
            lines.push("Sub-features:".to_string());
            for sub in module.children() {
                lines.push(format!(
                    "  - {}: {}",
                    sub.name,
                    sub.description.as_deref().unwrap_or("")
                ));
            }
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Indented `- [P] name: description` outline used by the PRD and prototype prompts
pub fn format_outline(modules: &[FeatureModule]) -> String {
    let mut lines = Vec::new();
    outline_into(modules, 0, &mut lines);
    lines.join("\n")
}

fn outline_into(modules: &[FeatureModule], depth: usize, lines: &mut Vec<String>) {
    for module in modules {
        lines.push(format!(
            "{}- [{}] {}: {}",
            "  ".repeat(depth),
            module.priority.as_deref().unwrap_or("P2"),
            module.name,
            module.description.as_deref().unwrap_or("")
        ));
        outline_into(module.children(), depth + 1, lines);
    }
}
