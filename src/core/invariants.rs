//! Semantic invariants checked when restoring a persisted tree.

use std::collections::HashSet;

use crate::tree::{NodeStatus, TaskTree};

/// Check consistency of a restored tree:
/// - ids match array positions (creation order)
/// - root has id 0, no parent
/// - `parent_id`/`children` agree in both directions
/// - children are unique, created after their parent, sorted ascending
/// - a waiting node carries no result
pub fn validate_tree(tree: &TaskTree) -> Vec<String> {
    let mut errors = Vec::new();
    let nodes = tree.nodes();

    if nodes.is_empty() {
        errors.push("tree has no nodes".to_string());
        return errors;
    }
    if nodes[0].id != 0 || nodes[0].parent_id.is_some() {
        errors.push("root must have id 0 and no parent".to_string());
    }

    for (index, node) in nodes.iter().enumerate() {
        let id = node.id;
        if id != index as u64 {
            errors.push(format!("node {id} stored at position {index}"));
        }

        if let Some(pid) = node.parent_id {
            match tree.get(pid) {
                Ok(parent) if parent.children.contains(&id) => {}
                Ok(_) => errors.push(format!("node {id} missing from parent {pid} children")),
                Err(_) => errors.push(format!("node {id} has unknown parent {pid}")),
            }
        } else if id != 0 {
            errors.push(format!("non-root node {id} has no parent"));
        }

        let mut seen = HashSet::new();
        for &child in &node.children {
            if !seen.insert(child) {
                errors.push(format!("node {id} lists child {child} twice"));
            }
            if child <= id {
                errors.push(format!("node {id} lists child {child} created before it"));
            }
            match tree.get(child) {
                Ok(c) if c.parent_id == Some(id) => {}
                Ok(_) => errors.push(format!("child {child} does not point back to {id}")),
                Err(_) => errors.push(format!("node {id} lists unknown child {child}")),
            }
        }
        if node.children.windows(2).any(|pair| pair[0] >= pair[1]) {
            errors.push(format!("node {id} children not in creation order"));
        }

        if node.status == NodeStatus::Waiting && node.result.is_some() {
            errors.push(format!("waiting node {id} carries a result"));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{SubtaskSpec, TaskNode, TaskTree};

    fn spec(task: &str) -> SubtaskSpec {
        SubtaskSpec {
            task: task.to_string(),
            criticism: None,
            milestones: Vec::new(),
        }
    }

    #[test]
    fn grown_tree_is_valid() {
        let mut tree = TaskTree::new("root");
        tree.add_subtasks(0, vec![spec("a"), spec("b")])
            .expect("divide");
        tree.add_subtasks(2, vec![spec("b1")]).expect("divide");
        assert!(validate_tree(&tree).is_empty());
    }

    #[test]
    fn detects_dangling_child_reference() {
        let mut tree = TaskTree::new("root");
        tree.add_subtasks(0, vec![spec("a")]).expect("divide");
        tree.get_mut(0).expect("root").children.push(9);
        let errors = validate_tree(&tree);
        assert!(errors.iter().any(|e| e.contains("unknown child 9")));
    }

    #[test]
    fn detects_orphaned_node() {
        let mut tree = TaskTree::new("root");
        tree.add_subtasks(0, vec![spec("a")]).expect("divide");
        tree.get_mut(0).expect("root").children.clear();
        let errors = validate_tree(&tree);
        assert!(
            errors
                .iter()
                .any(|e| e.contains("missing from parent 0 children"))
        );
    }

    #[test]
    fn detects_waiting_node_with_result() {
        let mut tree = TaskTree::new("root");
        tree.get_mut(0).expect("root").result = Some("early".to_string());
        let errors = validate_tree(&tree);
        assert!(errors.iter().any(|e| e.contains("carries a result")));
    }

    #[test]
    fn detects_misplaced_id() {
        let tree = TaskTree::from_nodes(vec![TaskNode {
            id: 3,
            task: "root".to_string(),
            criticism: "None".to_string(),
            milestones: Vec::new(),
            status: NodeStatus::Waiting,
            result: None,
            parent_id: None,
            children: Vec::new(),
            attempts: 0,
        }]);
        let errors = validate_tree(&tree);
        assert!(!errors.is_empty());
    }
}
