//! Knowledge graph types and the analysis result contract.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, FixedOffset};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

/// Node id for a commit.
pub fn commit_id(hash: &str) -> String {
    format!("commit:{hash}")
}

/// Node id for a file.
pub fn file_id(path: &str) -> String {
    format!("file:{path}")
}

/// Node id for a function. Two functions with the same name in one file
/// share an id.
pub fn function_id(path: &str, name: &str) -> String {
    format!("function:{path}:{name}")
}

/// Edge id for a commit touching a file.
pub fn modifies_edge_id(hash: &str, path: &str) -> String {
    format!("edge:{hash}-{path}")
}

/// Edge id for a file defining a function.
pub fn contains_edge_id(file_node: &str, function_node: &str) -> String {
    format!("edge:{file_node}-{function_node}")
}

/// A node of the knowledge graph.
///
/// # Examples
///
/// ```
/// use histograph_graph::{FileMetadata, GraphNode, NodeKind};
///
/// let node = GraphNode::file(FileMetadata {
///     path: "src/app.ts".into(),
///     extension: "ts".into(),
///     language: "TypeScript".into(),
///     modify_count: 0,
///     insertions: 0,
///     deletions: 0,
/// });
/// assert_eq!(node.id, "file:src/app.ts");
/// assert_eq!(node.label, "app.ts");
/// assert_eq!(node.kind(), NodeKind::File);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique id derived from the natural key.
    pub id: String,
    /// Short display name.
    pub label: String,
    /// Variant-specific attributes, tagged by node type.
    pub metadata: NodeMetadata,
}

impl GraphNode {
    /// Commit node keyed by its hash, labelled with the short hash.
    pub fn commit(metadata: CommitMetadata) -> Self {
        Self {
            id: commit_id(&metadata.hash),
            label: metadata.short_hash.clone(),
            metadata: NodeMetadata::Commit(metadata),
        }
    }

    /// File node keyed by its path, labelled with the file name.
    pub fn file(metadata: FileMetadata) -> Self {
        Self {
            id: file_id(&metadata.path),
            label: histograph_extract::file_name_of(&metadata.path),
            metadata: NodeMetadata::File(metadata),
        }
    }

    /// Function node keyed by path and name, labelled with the name.
    pub fn function(metadata: FunctionMetadata) -> Self {
        Self {
            id: function_id(&metadata.file_path, &metadata.name),
            label: metadata.name.clone(),
            metadata: NodeMetadata::Function(metadata),
        }
    }

    /// Which variant this node is.
    pub fn kind(&self) -> NodeKind {
        match self.metadata {
            NodeMetadata::Commit(_) => NodeKind::Commit,
            NodeMetadata::File(_) => NodeKind::File,
            NodeMetadata::Function(_) => NodeKind::Function,
        }
    }

    /// Commit attributes, if this is a commit node.
    pub fn as_commit(&self) -> Option<&CommitMetadata> {
        match &self.metadata {
            NodeMetadata::Commit(m) => Some(m),
            _ => None,
        }
    }

    /// File attributes, if this is a file node.
    pub fn as_file(&self) -> Option<&FileMetadata> {
        match &self.metadata {
            NodeMetadata::File(m) => Some(m),
            _ => None,
        }
    }

    /// Function attributes, if this is a function node.
    pub fn as_function(&self) -> Option<&FunctionMetadata> {
        match &self.metadata {
            NodeMetadata::Function(m) => Some(m),
            _ => None,
        }
    }
}

/// Node type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A revision.
    Commit,
    /// A repository path.
    File,
    /// A function inside a file.
    Function,
}

/// Per-variant node attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeMetadata {
    /// Commit attributes.
    Commit(CommitMetadata),
    /// File attributes.
    File(FileMetadata),
    /// Function attributes.
    Function(FunctionMetadata),
}

/// Attributes of a commit node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitMetadata {
    /// Full hash.
    pub hash: String,
    /// Abbreviated hash.
    pub short_hash: String,
    /// Author name.
    pub author: String,
    /// Author email.
    pub email: String,
    /// Author date.
    pub date: DateTime<FixedOffset>,
    /// Subject line.
    pub message: String,
    /// Parent hashes.
    pub parents: Vec<String>,
    /// Branch and tag decorations.
    pub refs: Vec<String>,
    /// Files changed per the shortstat summary.
    pub files_changed: u32,
    /// Lines inserted per the shortstat summary.
    pub insertions: u64,
    /// Lines deleted per the shortstat summary.
    pub deletions: u64,
}

impl From<histograph_vcs::Commit> for CommitMetadata {
    fn from(commit: histograph_vcs::Commit) -> Self {
        Self {
            hash: commit.hash,
            short_hash: commit.short_hash,
            author: commit.author,
            email: commit.email,
            date: commit.date,
            message: commit.subject,
            parents: commit.parents,
            refs: commit.refs,
            files_changed: commit.files_changed,
            insertions: commit.insertions,
            deletions: commit.deletions,
        }
    }
}

/// Attributes of a file node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Path relative to the repository root.
    pub path: String,
    /// Extension without the dot.
    pub extension: String,
    /// Display language derived from the extension.
    pub language: String,
    /// Expanded commits that touched the file.
    pub modify_count: u64,
    /// Lines inserted across expanded commits.
    pub insertions: u64,
    /// Lines deleted across expanded commits.
    pub deletions: u64,
}

impl FileMetadata {
    /// Fresh metadata for `path` with zero counters.
    pub fn for_path(path: &str) -> Self {
        let extension = histograph_extract::extension_of(path);
        Self {
            path: path.to_string(),
            language: histograph_extract::language_for_extension(&extension),
            extension,
            modify_count: 0,
            insertions: 0,
            deletions: 0,
        }
    }

    /// Inserted plus deleted lines.
    pub fn churn(&self) -> u64 {
        self.insertions + self.deletions
    }
}

/// Attributes of a function node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionMetadata {
    /// Declared name.
    pub name: String,
    /// Path of the defining file.
    pub file_path: String,
    /// First line, 1-based inclusive.
    pub start_line: usize,
    /// Last line, 1-based inclusive.
    pub end_line: usize,
    /// Parameter names.
    pub parameters: Vec<String>,
    /// Distinct commits in the line-range history.
    pub modify_count: u64,
    /// Whether the end line came from a balanced brace count.
    #[serde(default = "default_balanced")]
    pub balanced: bool,
}

fn default_balanced() -> bool {
    true
}

/// Relationship type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// Commit to a file it touched.
    Modifies,
    /// File to a function it defines.
    Contains,
    /// Function to a function it calls. Never produced by mining.
    Calls,
}

/// Line counts carried by a MODIFIES edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStats {
    /// Lines inserted.
    pub insertions: u64,
    /// Lines deleted.
    pub deletions: u64,
}

/// A directed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Edge id.
    pub id: String,
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Relationship type.
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    /// Line counts, MODIFIES only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ChangeStats>,
}

impl GraphEdge {
    /// MODIFIES edge from the commit to the file.
    pub fn modifies(hash: &str, path: &str, stats: ChangeStats) -> Self {
        Self {
            id: modifies_edge_id(hash, path),
            source: commit_id(hash),
            target: file_id(path),
            kind: EdgeKind::Modifies,
            stats: Some(stats),
        }
    }

    /// CONTAINS edge between two node ids.
    pub fn contains(file_node: &str, function_node: &str) -> Self {
        Self {
            id: contains_edge_id(file_node, function_node),
            source: file_node.to_string(),
            target: function_node.to_string(),
            kind: EdgeKind::Contains,
            stats: None,
        }
    }
}

/// Commits, files and functions with their relationships.
///
/// Nodes and edges keep insertion order. A new analysis run replaces the
/// whole graph.
///
/// # Examples
///
/// ```
/// use histograph_graph::{FileMetadata, GraphEdge, GraphNode, KnowledgeGraph};
///
/// let mut graph = KnowledgeGraph::default();
/// graph.nodes.push(GraphNode::file(FileMetadata::for_path("a.ts")));
/// graph.edges.push(GraphEdge::contains("file:a.ts", "function:a.ts:run"));
/// assert_eq!(graph.dangling_edges().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    /// Nodes in insertion order.
    pub nodes: Vec<GraphNode>,
    /// Edges in insertion order.
    pub edges: Vec<GraphEdge>,
}

impl KnowledgeGraph {
    /// Returns `true` if the graph has no nodes and no edges.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Nodes of one kind, in order.
    pub fn nodes_of(&self, kind: NodeKind) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(move |n| n.kind() == kind)
    }

    /// Commit nodes with their metadata.
    pub fn commit_nodes(&self) -> impl Iterator<Item = (&GraphNode, &CommitMetadata)> {
        self.nodes.iter().filter_map(|n| n.as_commit().map(|m| (n, m)))
    }

    /// File nodes with their metadata.
    pub fn file_nodes(&self) -> impl Iterator<Item = (&GraphNode, &FileMetadata)> {
        self.nodes.iter().filter_map(|n| n.as_file().map(|m| (n, m)))
    }

    /// Function nodes with their metadata.
    pub fn function_nodes(&self) -> impl Iterator<Item = (&GraphNode, &FunctionMetadata)> {
        self.nodes
            .iter()
            .filter_map(|n| n.as_function().map(|m| (n, m)))
    }

    /// Edges of one kind, in order.
    pub fn edges_of(&self, kind: EdgeKind) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    /// Nodes one edge away from `id` in either direction, in node order.
    ///
    /// # Examples
    ///
    /// ```
    /// use histograph_graph::{FileMetadata, GraphEdge, GraphNode, KnowledgeGraph};
    ///
    /// let mut graph = KnowledgeGraph::default();
    /// graph.nodes.push(GraphNode::file(FileMetadata::for_path("a.ts")));
    /// graph.nodes.push(GraphNode::file(FileMetadata::for_path("b.ts")));
    /// graph.edges.push(GraphEdge::contains("file:b.ts", "file:a.ts"));
    ///
    /// let around_a = graph.connected_nodes("file:a.ts");
    /// assert_eq!(around_a.len(), 1);
    /// assert_eq!(around_a[0].id, "file:b.ts");
    /// ```
    pub fn connected_nodes(&self, id: &str) -> Vec<&GraphNode> {
        let (graph, index) = self.to_petgraph();
        let Some(&start) = index.get(id) else {
            return Vec::new();
        };

        let neighbors: HashSet<usize> = graph
            .neighbors_undirected(start)
            .map(|n| graph[n])
            .collect();

        self.nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| neighbors.contains(i))
            .map(|(_, n)| n)
            .collect()
    }

    /// Edges whose source or target is not a node of this graph.
    pub fn dangling_edges(&self) -> Vec<&GraphEdge> {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        self.edges
            .iter()
            .filter(|e| !ids.contains(e.source.as_str()) || !ids.contains(e.target.as_str()))
            .collect()
    }

    /// Node and edge counts.
    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            edges: self.edges.len(),
            ..GraphStats::default()
        };
        for node in &self.nodes {
            match node.kind() {
                NodeKind::Commit => stats.commits += 1,
                NodeKind::File => stats.files += 1,
                NodeKind::Function => stats.functions += 1,
            }
        }
        stats
    }

    /// Directed petgraph view; node weights are positions in `nodes`.
    /// Edges with a missing endpoint are left out.
    fn to_petgraph(&self) -> (DiGraph<usize, EdgeKind>, HashMap<&str, NodeIndex>) {
        let mut graph = DiGraph::with_capacity(self.nodes.len(), self.edges.len());
        let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(self.nodes.len());

        for (i, node) in self.nodes.iter().enumerate() {
            index.entry(node.id.as_str()).or_insert_with(|| graph.add_node(i));
        }
        for edge in &self.edges {
            if let (Some(&a), Some(&b)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str())) {
                graph.add_edge(a, b, edge.kind);
            }
        }

        (graph, index)
    }
}

/// Node counts by kind plus the edge count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Commit nodes.
    pub commits: usize,
    /// File nodes.
    pub files: usize,
    /// Function nodes.
    pub functions: usize,
    /// Edges of every kind.
    pub edges: usize,
}

/// Outcome of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    /// Every stage ran.
    Completed,
    /// The run aborted; the graph is empty.
    Failed,
    /// The caller cancelled; the graph is empty.
    Cancelled,
}

/// Summary statistics of an analysis run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    /// Commit nodes.
    pub total_commits: usize,
    /// File nodes.
    pub total_files: usize,
    /// Function nodes.
    pub total_functions: usize,
    /// Edges.
    pub total_relationships: usize,
    /// Wall time in milliseconds.
    pub analysis_time: u64,
}

/// An item a stage skipped without aborting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    /// Stage that skipped it.
    pub stage: crate::progress::Stage,
    /// Commit hash, file path or function id.
    pub item: String,
    /// Error text.
    pub reason: String,
}

/// Successes of a stage plus what it skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialResult<T> {
    /// Items produced.
    pub items: Vec<T>,
    /// Items skipped with the reason.
    pub skipped: Vec<SkippedItem>,
}

impl<T> Default for PartialResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// What an analysis run returns.
///
/// A failed or cancelled run carries an empty graph and zeroed stats.
///
/// # Examples
///
/// ```
/// use histograph_graph::{AnalysisResult, AnalysisStatus};
///
/// let failed = AnalysisResult::failed("not a git repository");
/// assert!(!failed.success);
/// assert_eq!(failed.status, AnalysisStatus::Failed);
/// assert!(failed.graph.is_empty());
/// assert_eq!(failed.stats.total_commits, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// `true` only for a completed run.
    pub success: bool,
    /// Completed, failed or cancelled.
    pub status: AnalysisStatus,
    /// The built graph, empty unless completed.
    pub graph: KnowledgeGraph,
    /// Summary statistics, zero unless completed.
    pub stats: AnalysisStats,
    /// Human-readable failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Items skipped by the stages of a completed run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedItem>,
}

impl AnalysisResult {
    /// A completed run.
    pub fn completed(graph: KnowledgeGraph, analysis_time: u64, skipped: Vec<SkippedItem>) -> Self {
        let counts = graph.stats();
        Self {
            success: true,
            status: AnalysisStatus::Completed,
            stats: AnalysisStats {
                total_commits: counts.commits,
                total_files: counts.files,
                total_functions: counts.functions,
                total_relationships: counts.edges,
                analysis_time,
            },
            graph,
            error: None,
            skipped,
        }
    }

    /// An aborted run.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            status: AnalysisStatus::Failed,
            graph: KnowledgeGraph::default(),
            stats: AnalysisStats::default(),
            error: Some(error.into()),
            skipped: Vec::new(),
        }
    }

    /// A cancelled run.
    pub fn cancelled() -> Self {
        Self {
            status: AnalysisStatus::Cancelled,
            ..Self::failed("analysis cancelled")
        }
    }
}
