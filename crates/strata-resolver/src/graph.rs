//! Resolved-package graph: cycle detection and dependency ordering.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};

/// Directed graph over resolved package families; an edge `a -> b` means
/// `a` requires `b`.
pub(crate) struct ResolveGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

impl ResolveGraph {
    pub fn new() -> ResolveGraph {
        ResolveGraph {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    pub fn add_edge(&mut self, from: &str, to: &str) {
        let from = self.add_node(from);
        let to = self.add_node(to);
        self.graph.update_edge(from, to, ());
    }

    /// The first dependency cycle, as the ordered list of names along it,
    /// or `None` for an acyclic graph.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut color = vec![Color::White; self.graph.node_count()];
        let mut path = Vec::new();
        for start in self.graph.node_indices() {
            if color[start.index()] == Color::White {
                if let Some(cycle) = self.dfs(start, &mut color, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn dfs(
        &self,
        node: NodeIndex,
        color: &mut Vec<Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<String>> {
        color[node.index()] = Color::Gray;
        path.push(node);

        // petgraph iterates newest edge first; restore insertion order
        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors(node).collect();
        neighbors.reverse();

        for next in neighbors {
            match color[next.index()] {
                Color::Gray => {
                    let pos = path.iter().position(|&n| n == next).unwrap_or(0);
                    return Some(path[pos..].iter().map(|&n| self.graph[n].clone()).collect());
                }
                Color::White => {
                    if let Some(cycle) = self.dfs(next, color, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        path.pop();
        color[node.index()] = Color::Black;
        None
    }

    /// Order names so that required packages come before their dependents,
    /// staying as close as possible to the incoming order otherwise. Only
    /// meaningful on acyclic graphs.
    pub fn dependency_order(&self, names: &[String]) -> Vec<String> {
        let mut deps: HashMap<String, HashSet<String>> = HashMap::new();
        for node in self.graph.node_indices() {
            let mut reachable = HashSet::new();
            let mut stack = vec![node];
            while let Some(n) = stack.pop() {
                for next in self.graph.neighbors(n) {
                    if reachable.insert(self.graph[next].clone()) {
                        stack.push(next);
                    }
                }
            }
            reachable.remove(&self.graph[node]);
            deps.insert(self.graph[node].clone(), reachable);
        }

        let mut nodes: Vec<String> = names.to_vec();
        for node in self.graph.node_indices() {
            let name = &self.graph[node];
            if !nodes.contains(name) {
                nodes.push(name.clone());
            }
        }

        let mut ordered: Vec<String> = Vec::with_capacity(nodes.len());
        while !nodes.is_empty() {
            let head = nodes[0].clone();
            let Some(head_deps) = deps.get(&head) else {
                nodes.remove(0);
                continue;
            };
            if ordered.contains(&head) {
                nodes.remove(0);
                continue;
            }

            // pull the first not-yet-placed dependency to the front
            let mut moved = false;
            for i in 1..nodes.len() {
                if head_deps.contains(&nodes[i]) {
                    let dep = nodes.remove(i);
                    nodes.insert(0, dep);
                    moved = true;
                    break;
                }
            }
            if !moved {
                ordered.push(head);
                nodes.remove(0);
            }
        }
        ordered
    }
}
