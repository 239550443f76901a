//! Mention-graph adjacency building and cycle detection.
//!
//! # Responsibility
//! - Build the derived noteId -> mentioned noteIds adjacency mapping.
//! - Detect whether proposed outgoing edges would close a cycle.
//!
//! # Invariants
//! - Detection visits only nodes reachable from the candidate source.
//! - A self-mention is a one-edge cycle and is always detected.

use crate::model::note::{Mention, NoteId};
use std::collections::{HashMap, HashSet};

/// Derived adjacency mapping over stored mention rows.
pub type MentionGraph = HashMap<NoteId, Vec<NoteId>>;

/// Builds the adjacency mapping from mention rows.
///
/// Callers that re-validate an updated note pass its old outgoing edges
/// filtered out, so the proposed set replaces rather than augments them.
pub fn build_graph<'a>(mentions: impl IntoIterator<Item = &'a Mention>) -> MentionGraph {
    let mut graph = MentionGraph::new();
    for mention in mentions {
        graph
            .entry(mention.from_note_id.clone())
            .or_default()
            .push(mention.to_note_id.clone());
    }
    graph
}

/// Returns true when adding `proposed` edges out of `from` closes a cycle.
///
/// Depth-first search with gray/black coloring: reaching a node that is still
/// on the traversal stack signals a cycle. Existing edges out of `from` are
/// kept alongside the proposed ones.
pub fn detect_circular_reference(
    from: &NoteId,
    proposed: &[NoteId],
    graph: &MentionGraph,
) -> bool {
    enum Frame {
        Enter(NoteId),
        Leave(NoteId),
    }

    let neighbors = |node: &NoteId| -> Vec<NoteId> {
        let mut out = graph.get(node).cloned().unwrap_or_default();
        if node == from {
            out.extend(proposed.iter().cloned());
        }
        out
    };

    let mut on_stack: HashSet<NoteId> = HashSet::new();
    let mut done: HashSet<NoteId> = HashSet::new();
    let mut stack = vec![Frame::Enter(from.clone())];

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(node) => {
                if on_stack.contains(&node) {
                    return true;
                }
                if done.contains(&node) {
                    continue;
                }
                stack.push(Frame::Leave(node.clone()));
                for next in neighbors(&node) {
                    stack.push(Frame::Enter(next));
                }
                on_stack.insert(node);
            }
            Frame::Leave(node) => {
                on_stack.remove(&node);
                done.insert(node);
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::{build_graph, detect_circular_reference, MentionGraph};
    use crate::model::note::{Mention, NoteId};
    use uuid::Uuid;

    fn id(value: &str) -> NoteId {
        NoteId::parse(value).unwrap()
    }

    fn mention(from: &str, to: &str) -> Mention {
        Mention {
            mention_id: Uuid::new_v4(),
            from_note_id: id(from),
            to_note_id: id(to),
            position: 0,
            created_at: 0,
        }
    }

    fn graph_of(edges: &[(&str, &str)]) -> MentionGraph {
        let mentions: Vec<Mention> = edges.iter().map(|(f, t)| mention(f, t)).collect();
        build_graph(&mentions)
    }

    #[test]
    fn empty_graph_accepts_any_edges() {
        let graph = MentionGraph::new();
        assert!(!detect_circular_reference(
            &id("aaa111"),
            &[id("bbb222"), id("ccc333")],
            &graph
        ));
    }

    #[test]
    fn self_mention_is_a_cycle() {
        let graph = MentionGraph::new();
        assert!(detect_circular_reference(
            &id("aaa111"),
            &[id("aaa111")],
            &graph
        ));
    }

    #[test]
    fn direct_back_reference_is_a_cycle() {
        let graph = graph_of(&[("bbb222", "aaa111")]);
        assert!(detect_circular_reference(
            &id("aaa111"),
            &[id("bbb222")],
            &graph
        ));
    }

    #[test]
    fn transitive_back_reference_is_a_cycle() {
        // A -> B -> C already stored; proposing C -> A closes the loop.
        let graph = graph_of(&[("aaa111", "bbb222"), ("bbb222", "ccc333")]);
        assert!(detect_circular_reference(
            &id("ccc333"),
            &[id("aaa111")],
            &graph
        ));
    }

    #[test]
    fn diamond_shape_is_not_a_cycle() {
        // A -> B, A -> C, B -> D, C -> D: D reached twice, no cycle.
        let graph = graph_of(&[("bbb222", "ddd444"), ("ccc333", "ddd444")]);
        assert!(!detect_circular_reference(
            &id("aaa111"),
            &[id("bbb222"), id("ccc333")],
            &graph
        ));
    }

    #[test]
    fn unrelated_cycle_elsewhere_is_not_reported() {
        // X <-> Y cycle exists but is unreachable from A.
        let graph = graph_of(&[("xxx111", "yyy222"), ("yyy222", "xxx111")]);
        assert!(!detect_circular_reference(
            &id("aaa111"),
            &[id("bbb222")],
            &graph
        ));
    }

    #[test]
    fn existing_edges_out_of_source_still_count() {
        // A -> B stored, B -> A proposed check runs from B.
        let graph = graph_of(&[("aaa111", "bbb222")]);
        assert!(detect_circular_reference(
            &id("bbb222"),
            &[id("aaa111")],
            &graph
        ));
    }

    #[test]
    fn build_graph_groups_edges_by_source() {
        let mentions = vec![
            mention("aaa111", "bbb222"),
            mention("aaa111", "ccc333"),
            mention("bbb222", "ccc333"),
        ];
        let graph = build_graph(&mentions);
        assert_eq!(graph.get(&id("aaa111")).map(Vec::len), Some(2));
        assert_eq!(graph.get(&id("bbb222")).map(Vec::len), Some(1));
        assert!(!graph.contains_key(&id("ccc333")));
    }
}
