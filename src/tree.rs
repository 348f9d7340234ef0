//! Tree Navigator - identity lookup and pure rewrites of the layout tree
//!
//! Nothing here mutates its input. Callers may drop a rewritten tree
//! without affecting the tree it was built from.

use crate::spec::{LayoutNode, Slot};

/// Path of the layout root, as reported in validation issues.
pub const ROOT_PATH: &str = "layout";

/// Depth-first, pre-order search. Slots are leaves.
pub fn find_by_id<'a>(root: &'a LayoutNode, id: &str) -> Option<&'a LayoutNode> {
    if root.id() == id {
        return Some(root);
    }
    root.children().iter().find_map(|c| find_by_id(c, id))
}

/// Rebuild the tree through `transform`.
///
/// Order: the node itself is transformed first, then the children declared
/// by the transformed node are mapped recursively. A slot returned by the
/// transform never acquires children.
pub fn map_tree<F>(root: &LayoutNode, transform: &mut F) -> LayoutNode
where
    F: FnMut(&LayoutNode) -> LayoutNode,
{
    let next = transform(root);
    if !next.is_container() {
        return next;
    }
    let children: Vec<LayoutNode> = next
        .children()
        .iter()
        .map(|c| map_tree(c, transform))
        .collect();
    next.with_children(children)
}

/// New tree with `new_child` appended to the children of `target_id`.
/// Returns an unchanged copy when the target is absent or is a slot.
pub fn insert_child(root: &LayoutNode, target_id: &str, new_child: LayoutNode) -> LayoutNode {
    let mut pending = Some(new_child);
    map_tree(root, &mut |node| {
        if node.id() == target_id && node.is_container() {
            if let Some(child) = pending.take() {
                let mut children = node.children().to_vec();
                children.push(child);
                return node.clone().with_children(children);
            }
        }
        node.clone()
    })
}

/// Pre-order walk handing each node its display path
/// (`layout`, `layout.children[0]`, `layout.children[0].children[2]`, ...).
pub fn walk<'a, F>(root: &'a LayoutNode, visit: &mut F)
where
    F: FnMut(&'a LayoutNode, &str),
{
    walk_at(root, ROOT_PATH, visit);
}

fn walk_at<'a, F>(node: &'a LayoutNode, path: &str, visit: &mut F)
where
    F: FnMut(&'a LayoutNode, &str),
{
    visit(node, path);
    for (i, child) in node.children().iter().enumerate() {
        walk_at(child, &format!("{path}.children[{i}]"), visit);
    }
}

/// All slots in render order.
pub fn slots(root: &LayoutNode) -> Vec<&Slot> {
    let mut out = vec![];
    walk(root, &mut |node, _| {
        if let LayoutNode::Slot(slot) = node {
            out.push(slot);
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LayoutNode {
        LayoutNode::section(
            "root",
            None,
            vec![
                LayoutNode::stack(
                    "content",
                    Some("content"),
                    vec![LayoutNode::slot("s1", Some("slot"), Some("f1".into()))],
                ),
                LayoutNode::stack("aside", None, vec![]),
            ],
        )
    }

    #[test]
    fn test_find_by_id() {
        let tree = sample();
        assert_eq!(find_by_id(&tree, "root").map(|n| n.id()), Some("root"));
        assert_eq!(find_by_id(&tree, "s1").map(|n| n.id()), Some("s1"));
        assert_eq!(find_by_id(&tree, "aside").map(|n| n.id()), Some("aside"));
        assert!(find_by_id(&tree, "missing").is_none());
    }

    #[test]
    fn test_identity_map_is_noop() {
        let tree = sample();
        let mapped = map_tree(&tree, &mut |n| n.clone());
        assert_eq!(mapped, tree);
    }

    #[test]
    fn test_insert_child_appends_in_order() {
        let tree = sample();
        let next = insert_child(&tree, "content", LayoutNode::slot("s2", None, None));
        let content = find_by_id(&next, "content").unwrap();
        let ids: Vec<_> = content.children().iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        // input untouched
        assert_eq!(find_by_id(&tree, "content").unwrap().children().len(), 1);
    }

    #[test]
    fn test_insert_child_into_slot_is_noop() {
        let tree = sample();
        let next = insert_child(&tree, "s1", LayoutNode::slot("s2", None, None));
        assert_eq!(next, tree);
    }

    #[test]
    fn test_insert_child_missing_target_is_noop() {
        let tree = sample();
        let next = insert_child(&tree, "nope", LayoutNode::stack("x", None, vec![]));
        assert_eq!(next, tree);
    }

    #[test]
    fn test_walk_paths() {
        let tree = sample();
        let mut seen = vec![];
        walk(&tree, &mut |n, path| seen.push((n.id().to_string(), path.to_string())));
        assert_eq!(
            seen,
            vec![
                ("root".to_string(), "layout".to_string()),
                ("content".to_string(), "layout.children[0]".to_string()),
                ("s1".to_string(), "layout.children[0].children[0]".to_string()),
                ("aside".to_string(), "layout.children[1]".to_string()),
            ]
        );
    }

    #[test]
    fn test_slots_in_render_order() {
        let tree = insert_child(&sample(), "aside", LayoutNode::slot("s9", None, None));
        let ids: Vec<_> = slots(&tree).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s9"]);
    }
}
