//! Reply tree stored as an arena keyed by reply id.
//!
//! Each reply owns its ordered `children` list; `parent_id` is only a
//! back-reference. Nodes are created by append and never reparented, so the
//! structure stays a tree.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::errors::{AppError, Result};
use crate::models::Reply;

/// Default nesting limit for interactive replying.
pub const DEFAULT_MAX_REPLY_DEPTH: usize = 5;

/// Presentation policy for how deep members may keep replying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadPolicy {
    pub max_reply_depth: usize,
}

impl Default for ThreadPolicy {
    fn default() -> Self {
        Self {
            max_reply_depth: DEFAULT_MAX_REPLY_DEPTH,
        }
    }
}

impl ThreadPolicy {
    /// `parent_depth` is one-based (root replies have depth 1).
    pub fn can_reply_under(&self, parent_depth: usize) -> bool {
        parent_depth <= self.max_reply_depth
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplyTree {
    nodes: HashMap<String, Reply>,
    roots: Vec<String>,
}

impl ReplyTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Reply> {
        self.nodes.get(id)
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn children(&self, id: &str) -> Option<&[String]> {
        self.nodes.get(id).map(|r| r.children.as_slice())
    }

    /// Appends `reply` under `parent_id`, or to the root sequence when `None`.
    ///
    /// Returns the new node's depth. An unknown parent or a duplicate id
    /// leaves the tree untouched.
    pub fn insert_reply(&mut self, parent_id: Option<&str>, mut reply: Reply) -> Result<usize> {
        if self.nodes.contains_key(&reply.id) {
            return Err(AppError::Conflict(format!(
                "Reply {} already exists",
                reply.id
            )));
        }
        reply.children.clear();

        let depth = match parent_id {
            None => {
                reply.parent_id = None;
                self.roots.push(reply.id.clone());
                1
            }
            Some(parent_id) => {
                let depth = self
                    .depth(parent_id)
                    .ok_or_else(|| AppError::not_found("Parent reply", parent_id))?;
                if let Some(parent) = self.nodes.get_mut(parent_id) {
                    parent.children.push(reply.id.clone());
                }
                reply.parent_id = Some(parent_id.to_string());
                depth + 1
            }
        };

        self.nodes.insert(reply.id.clone(), reply);
        Ok(depth)
    }

    /// One-based depth of `id`.
    pub fn depth(&self, id: &str) -> Option<usize> {
        let mut node = self.nodes.get(id)?;
        let mut depth = 1;
        while let Some(parent) = node.parent_id.as_deref() {
            node = self.nodes.get(parent)?;
            depth += 1;
        }
        Some(depth)
    }

    /// Ids from the root reply down to `id`, inclusive.
    pub fn path(&self, id: &str) -> Option<Vec<String>> {
        let mut path = vec![id.to_string()];
        let mut node = self.nodes.get(id)?;
        while let Some(parent) = node.parent_id.as_deref() {
            path.push(parent.to_string());
            node = self.nodes.get(parent)?;
        }
        path.reverse();
        Some(path)
    }

    /// Depth-first pre-order traversal, visiting each node once.
    pub fn walk(&self) -> Vec<(&Reply, usize)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(&str, usize)> = self.roots.iter().rev().map(|id| (id.as_str(), 1)).collect();
        while let Some((id, depth)) = stack.pop() {
            let Some(reply) = self.nodes.get(id) else {
                continue;
            };
            out.push((reply, depth));
            stack.extend(reply.children.iter().rev().map(|c| (c.as_str(), depth + 1)));
        }
        out
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Reply> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("Reply", id))
    }

    /// Replaces the body. Structure, quotes and votes are untouched.
    pub fn edit_body(&mut self, id: &str, body: String, at: DateTime<Utc>) -> Result<&Reply> {
        let reply = self.node_mut(id)?;
        if reply.deleted {
            return Err(AppError::Conflict(format!("Reply {} was deleted", id)));
        }
        reply.body = body;
        reply.updated_at = Some(at);
        Ok(reply)
    }

    /// Tombstones a reply. Its children stay where they are.
    pub fn mark_deleted(&mut self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let reply = self.node_mut(id)?;
        reply.deleted = true;
        reply.body.clear();
        reply.attachments.clear();
        reply.quoted_reply = None;
        reply.updated_at = Some(at);
        Ok(())
    }

    pub fn set_hidden(&mut self, id: &str, hidden: bool) -> Result<()> {
        self.node_mut(id)?.hidden = hidden;
        Ok(())
    }

    /// Removes a leaf node, undoing an insertion.
    pub fn retract(&mut self, id: &str) -> Result<Reply> {
        let reply = self
            .nodes
            .get(id)
            .ok_or_else(|| AppError::not_found("Reply", id))?;
        if !reply.children.is_empty() {
            return Err(AppError::Conflict(format!(
                "Reply {} has replies and cannot be retracted",
                id
            )));
        }
        let siblings = match reply.parent_id.clone() {
            Some(parent) => &mut self.node_mut(&parent)?.children,
            None => &mut self.roots,
        };
        siblings.retain(|c| c != id);
        self.nodes
            .remove(id)
            .ok_or_else(|| AppError::not_found("Reply", id))
    }

    /// Swaps the node `old_id` for `replacement`, keeping its position,
    /// parent and children.
    pub fn rekey(&mut self, old_id: &str, mut replacement: Reply) -> Result<()> {
        if replacement.id != old_id && self.nodes.contains_key(&replacement.id) {
            return Err(AppError::Conflict(format!(
                "Reply {} already exists",
                replacement.id
            )));
        }
        let old = self
            .nodes
            .remove(old_id)
            .ok_or_else(|| AppError::not_found("Reply", old_id))?;

        let new_id = replacement.id.clone();
        replacement.parent_id = old.parent_id.clone();
        replacement.children = old.children.clone();

        let siblings = match old.parent_id.as_deref() {
            Some(parent) => self.nodes.get_mut(parent).map(|p| &mut p.children),
            None => Some(&mut self.roots),
        };
        if let Some(slot) = siblings.and_then(|s| s.iter_mut().find(|c| c.as_str() == old_id)) {
            *slot = new_id.clone();
        }
        for child in &old.children {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent_id = Some(new_id.clone());
            }
        }
        self.nodes.insert(new_id, replacement);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthorRef;
    use proptest::prelude::*;

    fn author() -> AuthorRef {
        AuthorRef {
            id: "1".to_string(),
            username: "sarah-johnson".to_string(),
            display_name: "Sarah Johnson".to_string(),
        }
    }

    fn reply(id: &str) -> Reply {
        Reply::new(id.to_string(), "t1".to_string(), author(), format!("body {}", id), Utc::now())
    }

    #[test]
    fn test_root_insertion_preserves_order() {
        let mut tree = ReplyTree::new();
        for id in ["a", "b", "c"] {
            assert_eq!(tree.insert_reply(None, reply(id)).unwrap(), 1);
        }
        assert_eq!(tree.roots(), &["a", "b", "c"]);
        assert!(tree.get("b").unwrap().parent_id.is_none());
    }

    #[test]
    fn test_chain_of_three() {
        let mut tree = ReplyTree::new();
        tree.insert_reply(None, reply("r1")).unwrap();
        tree.insert_reply(Some("r1"), reply("r2")).unwrap();
        let depth = tree.insert_reply(Some("r2"), reply("r3")).unwrap();

        assert_eq!(depth, 3);
        assert_eq!(tree.path("r3").unwrap(), vec!["r1", "r2", "r3"]);
        assert_eq!(tree.children("r1").unwrap(), &["r2"]);
        assert_eq!(tree.get("r3").unwrap().parent_id.as_deref(), Some("r2"));
    }

    #[test]
    fn test_unknown_parent_is_not_found() {
        let mut tree = ReplyTree::new();
        tree.insert_reply(None, reply("r1")).unwrap();
        let before = tree.clone();

        let err = tree.insert_reply(Some("missing"), reply("r2")).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree, before);
    }

    #[test]
    fn test_duplicate_id_conflicts() {
        let mut tree = ReplyTree::new();
        tree.insert_reply(None, reply("r1")).unwrap();
        let err = tree.insert_reply(None, reply("r1")).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(tree.roots().len(), 1);
    }

    #[test]
    fn test_inserted_children_are_ignored() {
        let mut tree = ReplyTree::new();
        let mut node = reply("r1");
        node.children = vec!["ghost".to_string()];
        tree.insert_reply(None, node).unwrap();
        assert!(tree.children("r1").unwrap().is_empty());
    }

    #[test]
    fn test_walk_is_preorder() {
        let mut tree = ReplyTree::new();
        tree.insert_reply(None, reply("a")).unwrap();
        tree.insert_reply(Some("a"), reply("a1")).unwrap();
        tree.insert_reply(None, reply("b")).unwrap();
        tree.insert_reply(Some("a"), reply("a2")).unwrap();
        tree.insert_reply(Some("a1"), reply("a1x")).unwrap();

        let order: Vec<(&str, usize)> = tree.walk().into_iter().map(|(r, d)| (r.id.as_str(), d)).collect();
        assert_eq!(order, vec![("a", 1), ("a1", 2), ("a1x", 3), ("a2", 2), ("b", 1)]);
    }

    #[test]
    fn test_delete_keeps_children() {
        let mut tree = ReplyTree::new();
        tree.insert_reply(None, reply("r1")).unwrap();
        tree.insert_reply(Some("r1"), reply("r2")).unwrap();

        tree.mark_deleted("r1", Utc::now()).unwrap();

        let r1 = tree.get("r1").unwrap();
        assert!(r1.deleted);
        assert!(r1.body.is_empty());
        assert_eq!(r1.children, vec!["r2"]);
        assert!(matches!(
            tree.edit_body("r1", "again".to_string(), Utc::now()),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_retract_only_leaves() {
        let mut tree = ReplyTree::new();
        tree.insert_reply(None, reply("r1")).unwrap();
        tree.insert_reply(Some("r1"), reply("r2")).unwrap();

        assert!(matches!(tree.retract("r1"), Err(AppError::Conflict(_))));
        let removed = tree.retract("r2").unwrap();
        assert_eq!(removed.id, "r2");
        assert!(tree.children("r1").unwrap().is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_rekey_keeps_position() {
        let mut tree = ReplyTree::new();
        tree.insert_reply(None, reply("r1")).unwrap();
        tree.insert_reply(Some("r1"), reply("a")).unwrap();
        tree.insert_reply(Some("r1"), reply("pending")).unwrap();
        tree.insert_reply(Some("r1"), reply("b")).unwrap();

        tree.rekey("pending", reply("confirmed")).unwrap();

        assert_eq!(tree.children("r1").unwrap(), &["a", "confirmed", "b"]);
        assert_eq!(tree.get("confirmed").unwrap().parent_id.as_deref(), Some("r1"));
        assert!(!tree.contains("pending"));
    }

    proptest! {
        /// Inserting under any node yields depth + 1 and leaves every other
        /// subtree equal.
        #[test]
        fn insertion_touches_only_the_parent(
            parents in proptest::collection::vec(proptest::option::of(0usize..64), 1..40),
            target in 0usize..64,
        ) {
            let mut tree = ReplyTree::new();
            let mut ids: Vec<String> = Vec::new();
            for (i, parent) in parents.iter().enumerate() {
                let id = format!("n{}", i);
                let parent_id = parent.and_then(|p| ids.get(p % ids.len().max(1)).cloned());
                tree.insert_reply(parent_id.as_deref(), reply(&id)).unwrap();
                ids.push(id);
            }

            let parent_id = ids[target % ids.len()].clone();
            let parent_depth = tree.depth(&parent_id).unwrap();
            let before = tree.clone();

            let depth = tree.insert_reply(Some(&parent_id), reply("new")).unwrap();
            prop_assert_eq!(depth, parent_depth + 1);
            prop_assert_eq!(tree.len(), before.len() + 1);
            prop_assert_eq!(tree.roots(), before.roots());

            for id in &ids {
                let old = before.get(id).unwrap();
                let new = tree.get(id).unwrap();
                if *id == parent_id {
                    let mut expected = old.children.clone();
                    expected.push("new".to_string());
                    prop_assert_eq!(&new.children, &expected);
                } else {
                    prop_assert_eq!(new, old);
                }
            }
        }
    }
}
