// Prerequisite cycle detection over the dependent -> requirements graph.
//
// Explicit work-list DFS with a visited/on-stack set pair; no native call
// recursion, so pathological inputs cannot blow the stack.

use std::collections::{BTreeMap, HashSet};

/// Find cycles in a dependent -> requirements adjacency map.
///
/// Each returned cycle is the path slice from the first occurrence of the
/// revisited node to the revisit, inclusive.
pub fn find_cycles(adjacency: &BTreeMap<String, Vec<String>>) -> Vec<Vec<String>> {
    let mut cycles = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();

    for root in adjacency.keys() {
        if visited.contains(root.as_str()) {
            continue;
        }

        // Work-list frames: (node, next child index to explore).
        let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
        let mut on_stack: HashSet<&str> = HashSet::new();
        on_stack.insert(root.as_str());
        visited.insert(root.as_str());

        while let Some((node, child_idx)) = stack.last().copied() {
            let children = adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]);
            if child_idx >= children.len() {
                stack.pop();
                on_stack.remove(node);
                continue;
            }
            if let Some(frame) = stack.last_mut() {
                frame.1 += 1;
            }

            let child = children[child_idx].as_str();
            if on_stack.contains(child) {
                // Path slice from the first occurrence of `child` back to
                // the revisit.
                let start = stack
                    .iter()
                    .position(|(n, _)| *n == child)
                    .unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..]
                    .iter()
                    .map(|(n, _)| n.to_string())
                    .collect();
                cycle.push(child.to_string());
                cycles.push(cycle);
            } else if !visited.contains(child) {
                visited.insert(child);
                on_stack.insert(child);
                stack.push((child, 0));
            }
        }
    }
    cycles
}
