//! Call graph of a program and its strongly-connected groups.
//!
//! Functions that call each other (directly or indirectly) must be analyzed
//! together so that recursive calls share one signature. The graph is
//! condensed into [`CallGroup`]s, ordered callees-first, and grouped into
//! levels whose members have no dependency on one another and may be
//! analyzed in parallel.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use petgraph::Direction;
use rustc_hash::{FxHashMap, FxHashSet};

/// A directed graph of functions. An edge `f -> g` means "`f` calls `g`".
#[derive(Debug, Default)]
pub struct CallGraph {
    graph: DiGraph<String, ()>,
    nodes: FxHashMap<String, NodeIndex>,
}

/// A maximal set of mutually recursive functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallGroup {
    /// Index of this group in [`CallGraph::groups`] order.
    pub index: usize,
    /// Member function names, sorted.
    pub members: Vec<String>,
    /// Whether any member (transitively) calls itself.
    pub recursive: bool,
    /// Indices of the groups this group calls into, sorted.
    pub depends_on: Vec<usize>,
}

impl CallGraph {
    /// Create an empty call graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function (if not already present) and return its node.
    pub fn add_function(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), idx);
        idx
    }

    /// Record that `caller` calls `callee`. Self-calls are kept: they mark
    /// a function as recursive. Duplicate edges are ignored.
    pub fn add_call(&mut self, caller: &str, callee: &str) {
        let from = self.add_function(caller);
        let to = self.add_function(callee);
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, ());
        }
    }

    /// Whether `name` is a function of this graph.
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Number of functions in the graph.
    pub fn function_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Direct callees of `name`, sorted.
    pub fn callees(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.nodes.get(name) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.graph[n].as_str())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Every function reachable from `roots` (roots included). Unknown
    /// root names are ignored.
    pub fn reachable_from<'a>(&self, roots: impl IntoIterator<Item = &'a str>) -> FxHashSet<String> {
        let mut seen = FxHashSet::default();
        for root in roots {
            let Some(&start) = self.nodes.get(root) else {
                continue;
            };
            let mut dfs = Dfs::new(&self.graph, start);
            while let Some(node) = dfs.next(&self.graph) {
                seen.insert(self.graph[node].clone());
            }
        }
        seen
    }

    /// Strongly-connected groups in dependency order: every group appears
    /// after all groups it calls into.
    pub fn groups(&self) -> Vec<CallGroup> {
        // tarjan_scc yields components in reverse topological order of the
        // condensation, i.e. callees before callers for `caller -> callee`
        // edges.
        let sccs = tarjan_scc(&self.graph);

        let mut group_of: FxHashMap<NodeIndex, usize> = FxHashMap::default();
        for (index, component) in sccs.iter().enumerate() {
            for &node in component {
                group_of.insert(node, index);
            }
        }

        sccs.iter()
            .enumerate()
            .map(|(index, component)| {
                let mut members: Vec<String> =
                    component.iter().map(|&n| self.graph[n].clone()).collect();
                members.sort();

                let recursive = component.len() > 1
                    || component
                        .iter()
                        .any(|&n| self.graph.contains_edge(n, n));

                let mut depends_on: Vec<usize> = component
                    .iter()
                    .flat_map(|&n| self.graph.neighbors_directed(n, Direction::Outgoing))
                    .map(|callee| group_of[&callee])
                    .filter(|&g| g != index)
                    .collect();
                depends_on.sort_unstable();
                depends_on.dedup();

                CallGroup {
                    index,
                    members,
                    recursive,
                    depends_on,
                }
            })
            .collect()
    }

    /// Groups arranged in levels: a group's level is one more than the
    /// highest level among the groups it depends on, so every level only
    /// needs the results of earlier levels. Within a level groups are
    /// sorted by their first member name for determinism.
    pub fn levels(&self) -> Vec<Vec<CallGroup>> {
        let groups = self.groups();
        let mut level_of = vec![0usize; groups.len()];
        // `groups` is callees-first, so every dependency is already levelled.
        for group in &groups {
            level_of[group.index] = group
                .depends_on
                .iter()
                .map(|&dep| level_of[dep] + 1)
                .max()
                .unwrap_or(0);
        }

        let depth = level_of.iter().copied().max().map_or(0, |m| m + 1);
        let mut levels: Vec<Vec<CallGroup>> = vec![Vec::new(); depth];
        for group in groups {
            levels[level_of[group.index]].push(group);
        }
        for level in &mut levels {
            level.sort_by(|a, b| a.members.cmp(&b.members));
        }
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(group: &CallGroup) -> Vec<&str> {
        group.members.iter().map(String::as_str).collect()
    }

    #[test]
    fn callees_first_order() {
        // main -> helper -> leaf
        let mut graph = CallGraph::new();
        graph.add_call("main", "helper");
        graph.add_call("helper", "leaf");

        let groups = graph.groups();
        let order: Vec<Vec<&str>> = groups.iter().map(names).collect();
        assert_eq!(order, vec![vec!["leaf"], vec!["helper"], vec!["main"]]);
        assert!(groups.iter().all(|g| !g.recursive));
    }

    #[test]
    fn self_recursion_is_recursive() {
        let mut graph = CallGraph::new();
        graph.add_call("append", "append");
        let groups = graph.groups();
        assert_eq!(groups.len(), 1);
        assert!(groups[0].recursive);
        assert!(groups[0].depends_on.is_empty());
    }

    #[test]
    fn mutual_recursion_forms_one_group() {
        let mut graph = CallGraph::new();
        graph.add_call("even", "odd");
        graph.add_call("odd", "even");
        graph.add_call("main", "even");

        let groups = graph.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(names(&groups[0]), vec!["even", "odd"]);
        assert!(groups[0].recursive);
        assert_eq!(groups[1].depends_on, vec![groups[0].index]);
    }

    #[test]
    fn levels_group_independent_functions() {
        // a -> c, b -> c, d -> a, d -> b
        let mut graph = CallGraph::new();
        graph.add_call("a", "c");
        graph.add_call("b", "c");
        graph.add_call("d", "a");
        graph.add_call("d", "b");

        let levels = graph.levels();
        let shape: Vec<Vec<Vec<&str>>> = levels
            .iter()
            .map(|level| level.iter().map(names).collect())
            .collect();
        assert_eq!(
            shape,
            vec![vec![vec!["c"]], vec![vec!["a"], vec!["b"]], vec![vec!["d"]]]
        );
    }

    #[test]
    fn reachability_ignores_unknown_roots() {
        let mut graph = CallGraph::new();
        graph.add_call("f", "g");
        graph.add_function("h");
        let reach = graph.reachable_from(["f", "nope"]);
        assert!(reach.contains("f") && reach.contains("g"));
        assert!(!reach.contains("h"));
        assert_eq!(graph.callees("f"), vec!["g"]);
    }
}
