//! Structural diff between two resume documents.
//!
//! Top-level keys are "sections". Inside a section the comparison recurses:
//! objects key-by-key, arrays pairwise by index. Index pairing means an
//! insertion in the middle of a list reports every later element as modified.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::Document;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub sections_added: u32,
    pub sections_modified: u32,
    pub sections_removed: u32,
    pub total_changes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionChangeType {
    Added,
    Modified,
    Removed,
    Unchanged,
}

/// A leaf-level difference. `path` is the full route from the document root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDiff {
    pub section: String,
    #[serde(rename = "type")]
    pub change_type: SectionChangeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_content: Option<Value>,
    pub changes: Vec<FieldChange>,
}

fn sections(document: &Document) -> Option<&Map<String, Value>> {
    document.as_object()
}

/// Section-level change counts between two documents.
pub fn calculate_diff_stats(old: &Document, new: &Document) -> DiffStats {
    let mut stats = DiffStats::default();
    for diff in diff_sections(old, new) {
        match diff.change_type {
            SectionChangeType::Added => stats.sections_added += 1,
            SectionChangeType::Modified => stats.sections_modified += 1,
            SectionChangeType::Removed => stats.sections_removed += 1,
            SectionChangeType::Unchanged => continue,
        }
        stats.total_changes += 1;
    }
    stats
}

/// Per-section diff: added sections first, then removed, then every section
/// present on both sides (modified or unchanged) in `old`'s key order.
pub fn diff_sections(old: &Document, new: &Document) -> Vec<SectionDiff> {
    let empty = Map::new();
    let old_sections = sections(old).unwrap_or(&empty);
    let new_sections = sections(new).unwrap_or(&empty);
    let mut out = Vec::new();

    for (section, content) in new_sections {
        if !old_sections.contains_key(section) {
            out.push(SectionDiff {
                section: section.clone(),
                change_type: SectionChangeType::Added,
                old_content: None,
                new_content: Some(content.clone()),
                changes: Vec::new(),
            });
        }
    }

    for (section, content) in old_sections {
        if !new_sections.contains_key(section) {
            out.push(SectionDiff {
                section: section.clone(),
                change_type: SectionChangeType::Removed,
                old_content: Some(content.clone()),
                new_content: None,
                changes: Vec::new(),
            });
        }
    }

    for (section, old_content) in old_sections {
        let Some(new_content) = new_sections.get(section) else {
            continue;
        };
        let (change_type, changes) = if old_content == new_content {
            (SectionChangeType::Unchanged, Vec::new())
        } else {
            (
                SectionChangeType::Modified,
                compare_fields(old_content, new_content, &[section.clone()]),
            )
        };
        out.push(SectionDiff {
            section: section.clone(),
            change_type,
            old_content: Some(old_content.clone()),
            new_content: Some(new_content.clone()),
            changes,
        });
    }

    out
}

/// Recursive field diff rooted at `path`.
pub fn compare_fields(old: &Value, new: &Value, path: &[String]) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    walk(old, new, path, &mut changes);
    changes
}

fn last_segment(path: &[String]) -> String {
    path.last().cloned().unwrap_or_default()
}

fn child_path(path: &[String], segment: impl Into<String>) -> Vec<String> {
    let mut child = path.to_vec();
    child.push(segment.into());
    child
}

fn walk(old: &Value, new: &Value, path: &[String], out: &mut Vec<FieldChange>) {
    match (old, new) {
        (Value::Array(old_items), Value::Array(new_items)) => {
            let parent = last_segment(path);
            for i in 0..old_items.len().max(new_items.len()) {
                match (old_items.get(i), new_items.get(i)) {
                    (None, Some(added)) => out.push(FieldChange {
                        field: format!("{parent}[{i}]"),
                        change_type: ChangeType::Added,
                        old_value: None,
                        new_value: Some(added.clone()),
                        path: child_path(path, i.to_string()),
                    }),
                    (Some(removed), None) => out.push(FieldChange {
                        field: format!("{parent}[{i}]"),
                        change_type: ChangeType::Removed,
                        old_value: Some(removed.clone()),
                        new_value: None,
                        path: child_path(path, i.to_string()),
                    }),
                    (Some(a), Some(b)) if a != b => {
                        walk(a, b, &child_path(path, i.to_string()), out)
                    }
                    _ => {}
                }
            }
        }
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (key, value) in new_map {
                if !old_map.contains_key(key) {
                    out.push(FieldChange {
                        field: key.clone(),
                        change_type: ChangeType::Added,
                        old_value: None,
                        new_value: Some(value.clone()),
                        path: child_path(path, key.clone()),
                    });
                }
            }
            for (key, value) in old_map {
                match new_map.get(key) {
                    None => out.push(FieldChange {
                        field: key.clone(),
                        change_type: ChangeType::Removed,
                        old_value: Some(value.clone()),
                        new_value: None,
                        path: child_path(path, key.clone()),
                    }),
                    Some(other) if other != value => {
                        walk(value, other, &child_path(path, key.clone()), out)
                    }
                    Some(_) => {}
                }
            }
        }
        // Primitives, and values whose JSON kinds differ, bottom out here.
        _ if old != new => out.push(FieldChange {
            field: last_segment(path),
            change_type: ChangeType::Modified,
            old_value: Some(old.clone()),
            new_value: Some(new.clone()),
            path: path.to_vec(),
        }),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resume_a() -> Value {
        json!({
            "personal_info": {"full_name": "Ada Lovelace", "email": "ada@example.com"},
            "professional_summary": "Analyst",
            "skills": [{"name": "Math"}, {"name": "Poetry"}],
            "projects": []
        })
    }

    fn resume_b() -> Value {
        json!({
            "personal_info": {"full_name": "Ada King", "email": "ada@example.com", "phone": "555"},
            "professional_summary": "Analyst",
            "skills": [{"name": "Math"}],
            "certifications": [{"name": "Engines"}]
        })
    }

    fn changed_sections(diffs: &[SectionDiff]) -> Vec<String> {
        let mut names: Vec<_> = diffs
            .iter()
            .filter(|d| d.change_type != SectionChangeType::Unchanged)
            .map(|d| d.section.clone())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_section_classification() {
        let diffs = diff_sections(&resume_a(), &resume_b());
        let kind = |name: &str| {
            diffs
                .iter()
                .find(|d| d.section == name)
                .map(|d| d.change_type)
                .unwrap()
        };
        assert_eq!(kind("certifications"), SectionChangeType::Added);
        assert_eq!(kind("projects"), SectionChangeType::Removed);
        assert_eq!(kind("personal_info"), SectionChangeType::Modified);
        assert_eq!(kind("skills"), SectionChangeType::Modified);
        assert_eq!(kind("professional_summary"), SectionChangeType::Unchanged);
        assert_eq!(diffs[0].change_type, SectionChangeType::Added);
        assert_eq!(diffs[1].change_type, SectionChangeType::Removed);
    }

    #[test]
    fn test_stats_match_sections() {
        let stats = calculate_diff_stats(&resume_a(), &resume_b());
        assert_eq!(
            stats,
            DiffStats {
                sections_added: 1,
                sections_modified: 2,
                sections_removed: 1,
                total_changes: 4,
            }
        );
    }

    #[test]
    fn test_diff_is_structurally_symmetric() {
        let forward = diff_sections(&resume_a(), &resume_b());
        let backward = diff_sections(&resume_b(), &resume_a());
        assert_eq!(changed_sections(&forward), changed_sections(&backward));
        assert_eq!(
            calculate_diff_stats(&resume_a(), &resume_b()).total_changes,
            calculate_diff_stats(&resume_b(), &resume_a()).total_changes
        );
        let added_forward = forward
            .iter()
            .find(|d| d.section == "certifications")
            .unwrap();
        let removed_backward = backward
            .iter()
            .find(|d| d.section == "certifications")
            .unwrap();
        assert_eq!(added_forward.change_type, SectionChangeType::Added);
        assert_eq!(removed_backward.change_type, SectionChangeType::Removed);
    }

    #[test]
    fn test_self_diff_is_empty() {
        let diffs = diff_sections(&resume_a(), &resume_a());
        assert!(diffs
            .iter()
            .all(|d| d.change_type == SectionChangeType::Unchanged));
        assert_eq!(calculate_diff_stats(&resume_a(), &resume_a()).total_changes, 0);
    }

    #[test]
    fn test_field_paths_are_rooted_at_section() {
        let diffs = diff_sections(&resume_a(), &resume_b());
        let info = diffs.iter().find(|d| d.section == "personal_info").unwrap();
        let name = info
            .changes
            .iter()
            .find(|c| c.field == "full_name")
            .unwrap();
        assert_eq!(name.change_type, ChangeType::Modified);
        assert_eq!(name.path, vec!["personal_info", "full_name"]);
        assert_eq!(name.old_value, Some(json!("Ada Lovelace")));
        assert_eq!(name.new_value, Some(json!("Ada King")));

        let phone = info.changes.iter().find(|c| c.field == "phone").unwrap();
        assert_eq!(phone.change_type, ChangeType::Added);
        assert_eq!(phone.old_value, None);
    }

    #[test]
    fn test_array_tail_removal() {
        let changes = compare_fields(
            &json!([{"name": "Math"}, {"name": "Poetry"}]),
            &json!([{"name": "Math"}]),
            &["skills".to_string()],
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "skills[1]");
        assert_eq!(changes[0].change_type, ChangeType::Removed);
        assert_eq!(changes[0].path, vec!["skills", "1"]);
    }

    #[test]
    fn test_mid_list_insert_cascades_by_index() {
        let changes = compare_fields(
            &json!(["a", "b", "c"]),
            &json!(["a", "x", "b", "c"]),
            &["skills".to_string()],
        );
        let kinds: Vec<_> = changes.iter().map(|c| c.change_type).collect();
        assert_eq!(
            kinds,
            vec![ChangeType::Modified, ChangeType::Modified, ChangeType::Added]
        );
        assert_eq!(changes[0].path, vec!["skills", "1"]);
        assert_eq!(changes[0].field, "1");
        assert_eq!(changes[2].field, "skills[3]");
    }

    #[test]
    fn test_kind_mismatch_is_single_modification() {
        let changes = compare_fields(
            &json!({"gpa": "3.9"}),
            &json!({"gpa": 3.9}),
            &["education".to_string()],
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::Modified);
        assert_eq!(changes[0].path, vec!["education", "gpa"]);

        let changes = compare_fields(&json!([1]), &json!({"0": 1}), &["x".to_string()]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::Modified);
    }

    #[test]
    fn test_non_object_documents_have_no_sections() {
        assert!(diff_sections(&json!(null), &json!("text")).is_empty());
        let diffs = diff_sections(&json!(null), &json!({"skills": []}));
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].change_type, SectionChangeType::Added);
    }

    #[test]
    fn test_field_change_serializes_type_tag() {
        let change = FieldChange {
            field: "email".to_string(),
            change_type: ChangeType::Removed,
            old_value: Some(json!("a@b.c")),
            new_value: None,
            path: vec!["personal_info".to_string(), "email".to_string()],
        };
        let v = serde_json::to_value(change).unwrap();
        assert_eq!(v["type"], "removed");
        assert!(v.get("new_value").is_none());
    }
}
