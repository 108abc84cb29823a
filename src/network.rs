//! Producer network graphs.
//!
//! Two graphs come out of the survey answers: the organisation network
//! (property → organisation → hub) and the bipartite difficulty graph
//! (respondent ↔ difficulty tag). Both serialise to the same JSON shape the
//! graph asset loader reads back.

use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    assets,
    cli::{GraphKind, NetworkArgs, NetworkBuildArgs, NetworkCommand, NetworkInspectArgs},
    config::SurveyConfig,
    data::Value,
    filter::SurveyFilter,
    frame::SurveyTable,
    io_utils, preprocess, table,
    tags::TagSplitter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Hub,
    Property,
    Organization,
    Respondent,
    Difficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub role: Option<NodeRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default = "default_size")]
    pub size: u32,
}

fn default_size() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(default = "default_size")]
    pub size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default, alias = "links")]
    pub edges: Vec<GraphEdge>,
}

impl Graph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.source == source && e.target == target)
    }

    /// Adds the node unless one with the same id exists; first insert wins.
    pub fn add_node(&mut self, node: GraphNode) {
        if self.node(&node.id).is_none() {
            self.nodes.push(node);
        }
    }

    pub fn add_edge(&mut self, edge: GraphEdge) {
        if !self.has_edge(&edge.source, &edge.target) {
            self.edges.push(edge);
        }
    }

    pub fn communities(&self) -> Vec<String> {
        let mut seen = self
            .nodes
            .iter()
            .filter_map(|n| n.community.clone())
            .collect::<Vec<_>>();
        seen.sort();
        seen.dedup();
        seen
    }

    /// Nodes left visible when showing one community: the hub and nodes
    /// without a community always stay.
    pub fn visible_in(&self, community: &str) -> Vec<&GraphNode> {
        self.nodes
            .iter()
            .filter(|n| n.community.as_deref().is_none_or(|c| c == community))
            .collect()
    }

    pub fn role_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for node in &self.nodes {
            let role = node
                .role
                .map(|r| format!("{r:?}").to_lowercase())
                .unwrap_or_else(|| "unknown".to_string());
            *counts.entry(role).or_insert(0) += 1;
        }
        counts
    }
}

fn node_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn text_cell(table: &SurveyTable, row: usize, field: &str) -> Option<String> {
    table
        .cell(row, field)
        .map(Value::as_display)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn build_organization_graph(table: &SurveyTable, config: &SurveyConfig) -> Graph {
    let fields = &config.fields;
    let network = &config.network;
    let hub = node_id(&network.hub_label);
    let mut graph = Graph::default();
    graph.add_node(GraphNode {
        id: hub.clone(),
        label: network.hub_label.clone(),
        role: Some(NodeRole::Hub),
        community: None,
        color: Some(network.hub_color.clone()),
        size: 20,
    });

    for row in 0..table.row_count() {
        let (Some(property), Some(organization)) = (
            text_cell(table, row, &fields.property),
            text_cell(table, row, &fields.organization),
        ) else {
            continue;
        };
        let community = text_cell(table, row, &fields.community);
        let property_id = node_id(&property);
        let organization_id = node_id(&organization);

        graph.add_node(GraphNode {
            id: property_id.clone(),
            label: property,
            role: Some(NodeRole::Property),
            community: community.clone(),
            color: Some(network.property_color.clone()),
            size: 7,
        });
        graph.add_node(GraphNode {
            id: organization_id.clone(),
            color: Some(
                network
                    .palette
                    .get(&organization_id)
                    .cloned()
                    .unwrap_or_else(|| network.fallback_color.clone()),
            ),
            label: organization,
            role: Some(NodeRole::Organization),
            community: None,
            size: 15,
        });
        graph.add_edge(GraphEdge {
            source: property_id.clone(),
            target: organization_id.clone(),
            size: 2,
            community: community.clone(),
        });
        graph.add_edge(GraphEdge {
            source: property_id,
            target: hub.clone(),
            size: 1,
            community,
        });
        graph.add_edge(GraphEdge {
            source: organization_id,
            target: hub.clone(),
            size: 3,
            community: None,
        });
    }
    graph
}

pub fn build_difficulty_graph(table: &SurveyTable, config: &SurveyConfig) -> Result<Graph> {
    let fields = &config.fields;
    let field = &config.network.difficulty_field;
    let splitter = TagSplitter::new(&config.tag_rule_for(field))?;
    let mut graph = Graph::default();
    let mut tags_seen = HashSet::new();

    for row in 0..table.row_count() {
        let Some(respondent) = text_cell(table, row, &fields.respondent) else {
            continue;
        };
        let Some(raw) = table.cell(row, field) else {
            continue;
        };
        let Some(raw) = raw.as_text() else {
            warn!("Skipping row {} of '{field}': not a text answer", row + 2);
            continue;
        };
        let community = text_cell(table, row, &fields.community);
        let respondent_id = node_id(&respondent);
        graph.add_node(GraphNode {
            id: respondent_id.clone(),
            label: respondent,
            role: Some(NodeRole::Respondent),
            community: community.clone(),
            color: None,
            size: 5,
        });
        for tag in splitter.split(raw) {
            let tag_id = node_id(&tag);
            if tags_seen.insert(tag_id.clone()) {
                graph.add_node(GraphNode {
                    id: tag_id.clone(),
                    label: tag,
                    role: Some(NodeRole::Difficulty),
                    community: None,
                    color: None,
                    size: 10,
                });
            }
            graph.add_edge(GraphEdge {
                source: tag_id,
                target: respondent_id.clone(),
                size: 1,
                community: community.clone(),
            });
        }
    }
    Ok(graph)
}

pub fn execute(args: &NetworkArgs) -> Result<()> {
    match &args.command {
        NetworkCommand::Build(build) => execute_build(build),
        NetworkCommand::Inspect(inspect) => execute_inspect(inspect),
    }
}

fn execute_build(args: &NetworkBuildArgs) -> Result<()> {
    let (config, source) = preprocess::load_from_args(&args.input)?;
    let view = SurveyFilter::from_args(&args.filters).apply(&source, &config.fields);
    let graph = match args.kind {
        GraphKind::Organizations => build_organization_graph(&view, &config),
        GraphKind::Difficulties => build_difficulty_graph(&view, &config)?,
    };
    let mut json = serde_json::to_string_pretty(&graph).context("Serializing graph")?;
    json.push('\n');
    io_utils::write_output(args.output.as_deref(), json.as_bytes())?;
    info!(
        "Wrote graph with {} node(s) and {} edge(s) to {}",
        graph.nodes.len(),
        graph.edges.len(),
        io_utils::describe_destination(args.output.as_deref())
    );
    Ok(())
}

fn execute_inspect(args: &NetworkInspectArgs) -> Result<()> {
    let loaded = assets::load_graph(&args.graph);
    for diagnostic in &loaded.diagnostics {
        eprintln!("Aviso: {diagnostic}");
    }
    let graph = loaded.value;
    let mut rows = graph
        .role_counts()
        .into_iter()
        .map(|(role, count)| vec![role, count.to_string()])
        .collect::<Vec<_>>();
    rows.push(vec!["edges".to_string(), graph.edges.len().to_string()]);
    rows.push(vec![
        "communities".to_string(),
        graph.communities().len().to_string(),
    ]);
    if let Some(community) = &args.community {
        rows.push(vec![
            format!("visible in '{community}'"),
            graph.visible_in(community).len().to_string(),
        ]);
    }
    table::print_table(&["item".to_string(), "count".to_string()], &rows);
    Ok(())
}
