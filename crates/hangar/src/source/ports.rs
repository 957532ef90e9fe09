//! Port trees flattened into an arena.
//!
//! Upstream nests ports recursively (`ports[].ports[]...`). The tree is walked with an
//! explicit work-list and stored as rows with a parent index; nothing recurses on the
//! call stack, and nesting beyond [`MAX_PORT_DEPTH`] is dropped.

use std::borrow::Cow;
use std::collections::HashMap;

use serde_json::Value;

/// Deepest port level kept (root ports are depth 0).
pub const MAX_PORT_DEPTH: u32 = 16;

/// One port in the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortNode {
    /// Index of the parent node in [`PortArena::nodes`].
    pub parent: Option<usize>,
    /// Slash-separated, unique within the vehicle. `%`, `/` and `#` inside a name are
    /// percent-escaped; a repeated sibling name gets a `#n` suffix.
    pub path: String,
    pub name: String,
    pub category: Option<String>,
    pub size_min: Option<i32>,
    pub size_max: Option<i32>,
    pub equipped_item_uuid: Option<String>,
    pub depth: u32,
}

/// Flattened port tree of one vehicle. Parents always precede their children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortArena {
    pub nodes: Vec<PortNode>,
    /// Entries dropped because they were not objects or exceeded the depth cap.
    pub dropped: usize,
}

impl PortArena {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Flatten an upstream `ports` array. Anything other than an array yields an empty arena.
    pub fn flatten(ports: &Value) -> Self {
        let mut arena = PortArena::default();
        let Some(roots) = ports.as_array() else {
            return arena;
        };

        let mut work: Vec<(&Value, Option<usize>, String, u32)> = Vec::new();
        push_children(&mut work, roots, None, "", 0);

        while let Some((value, parent, path, depth)) = work.pop() {
            if depth > MAX_PORT_DEPTH {
                tracing::warn!(path = %path, depth, "Port nesting exceeds depth cap, dropping subtree");
                arena.dropped += 1;
                continue;
            }
            let Some(obj) = value.as_object() else {
                arena.dropped += 1;
                continue;
            };

            let index = arena.nodes.len();
            arena.nodes.push(PortNode {
                parent,
                name: port_name(value).to_string(),
                category: str_field(obj, &["category", "type"]),
                size_min: int_field(obj, &["size_min", "min_size"]),
                size_max: int_field(obj, &["size_max", "max_size"]),
                equipped_item_uuid: obj
                    .get("equipped_item")
                    .and_then(|item| item.get("uuid"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                depth,
                path: path.clone(),
            });

            if let Some(children) = obj.get("ports").and_then(Value::as_array) {
                push_children(&mut work, children, Some(index), &path, depth + 1);
            }
        }

        arena
    }
}

fn push_children<'a>(
    work: &mut Vec<(&'a Value, Option<usize>, String, u32)>,
    children: &'a [Value],
    parent: Option<usize>,
    parent_path: &str,
    depth: u32,
) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut entries = Vec::with_capacity(children.len());
    for child in children {
        let name = port_name(child);
        let n = seen.entry(name).or_insert(0);
        let escaped = escape_segment(name);
        let segment = if *n == 0 {
            escaped.into_owned()
        } else {
            format!("{escaped}#{n}")
        };
        *n += 1;
        let path = if parent_path.is_empty() {
            segment
        } else {
            format!("{parent_path}/{segment}")
        };
        entries.push((child, parent, path, depth));
    }
    // Reversed so the stack pops siblings in upstream order.
    work.extend(entries.into_iter().rev());
}

/// Escape the characters that carry meaning in a port path.
fn escape_segment(name: &str) -> Cow<'_, str> {
    if !name.contains(['%', '/', '#']) {
        return Cow::Borrowed(name);
    }
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '#' => out.push_str("%23"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn port_name(value: &Value) -> &str {
    value
        .get("name")
        .or_else(|| value.get("port_name"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("unnamed")
}

fn str_field(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn int_field(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<i32> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_i64))
        .and_then(|v| i32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flattens_in_preorder_with_parent_indices() {
        let ports = json!([
            {"name": "hardpoint_nose", "category": "Weapon", "size_min": 1, "size_max": 3,
             "ports": [{"name": "gun", "equipped_item": {"uuid": "item-1"}}]},
            {"name": "hardpoint_wing"}
        ]);

        let arena = PortArena::flatten(&ports);
        let paths: Vec<&str> = arena.nodes.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["hardpoint_nose", "hardpoint_nose/gun", "hardpoint_wing"]
        );
        assert_eq!(arena.nodes[1].parent, Some(0));
        assert_eq!(arena.nodes[1].depth, 1);
        assert_eq!(arena.nodes[1].equipped_item_uuid.as_deref(), Some("item-1"));
        assert_eq!(arena.nodes[0].size_max, Some(3));
        assert_eq!(arena.nodes[2].parent, None);
        assert_eq!(arena.dropped, 0);
    }

    #[test]
    fn duplicate_sibling_names_get_unique_paths() {
        let ports = json!([{"name": "seat"}, {"name": "seat"}, {"name": "seat"}]);
        let arena = PortArena::flatten(&ports);
        let paths: Vec<&str> = arena.nodes.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec!["seat", "seat#1", "seat#2"]);
    }

    #[test]
    fn names_with_path_characters_do_not_collide() {
        let ports = json!([
            {"name": "turret/gun"},
            {"name": "turret", "ports": [{"name": "gun"}]},
            {"name": "seat"},
            {"name": "seat"},
            {"name": "seat#1"}
        ]);
        let arena = PortArena::flatten(&ports);
        let paths: Vec<&str> = arena.nodes.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["turret%2Fgun", "turret", "turret/gun", "seat", "seat#1", "seat%231"]
        );
        assert_eq!(arena.nodes[0].name, "turret/gun");

        let unique: std::collections::HashSet<&str> = paths.iter().copied().collect();
        assert_eq!(unique.len(), paths.len());
    }

    #[test]
    fn deep_nesting_is_capped_without_recursion() {
        let mut node = json!({"name": "leaf"});
        for i in 0..200 {
            node = json!({"name": format!("level{i}"), "ports": [node]});
        }
        let arena = PortArena::flatten(&json!([node]));

        assert_eq!(arena.len(), (MAX_PORT_DEPTH + 1) as usize);
        assert_eq!(arena.dropped, 1);
        assert!(arena.nodes.iter().all(|n| n.depth <= MAX_PORT_DEPTH));
    }

    #[test]
    fn non_objects_are_dropped_and_non_arrays_are_empty() {
        let arena = PortArena::flatten(&json!([42, "x", {"name": "ok"}]));
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.dropped, 2);

        assert!(PortArena::flatten(&json!(null)).is_empty());
        assert!(PortArena::flatten(&json!({"name": "not-a-list"})).is_empty());
    }
}
