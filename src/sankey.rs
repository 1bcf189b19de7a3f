//! Sankey graph construction for the trafficking flow chart.
//!
//! Each flow record is a two-hop chain (drug group → transportation
//! category → seizure location) carrying a weight. The builder dedups
//! nodes by name, merges parallel links by summing their values, and
//! substitutes a configurable fallback for weightless contributions so
//! thin flows stay renderable.

use serde::Serialize;
use std::collections::HashMap;

/// One source → intermediate → destination chain. Chains missing any of
/// the three labels are skipped by the builder.
#[derive(Debug, Clone, Default)]
pub struct FlowRecord {
    pub source: Option<String>,
    pub intermediate: Option<String>,
    pub destination: Option<String>,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SankeyNode {
    pub name: String,
}

/// A weighted edge between two node indices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SankeyLink {
    pub source: usize,
    pub target: usize,
    pub value: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SankeyGraph {
    pub nodes: Vec<SankeyNode>,
    pub links: Vec<SankeyLink>,
}

/// Builder policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct SankeyConfig {
    /// Value contributed by a record whose weight is zero or unparseable.
    /// Keeps zero-weight flows visible in the layout.
    pub fallback_weight: f64,
}

impl Default for SankeyConfig {
    fn default() -> Self {
        SankeyConfig { fallback_weight: 1.0 }
    }
}

fn label(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Build the deduplicated node list and merged link list for a set of
/// flow chains.
///
/// Node identity is the exact label string: the first occurrence of a
/// name assigns its index, and a label that appears at more than one
/// hierarchy level reuses the same node. Callers that need two distinct
/// nodes for a shared label must namespace the labels themselves.
pub fn build_graph(flows: &[FlowRecord], config: SankeyConfig) -> SankeyGraph {
    let mut graph = SankeyGraph::default();
    let mut node_index: HashMap<String, usize> = HashMap::new();
    let mut link_index: HashMap<(usize, usize), usize> = HashMap::new();

    let mut add_node = |graph: &mut SankeyGraph, name: &str| -> usize {
        if let Some(&index) = node_index.get(name) {
            return index;
        }
        let index = graph.nodes.len();
        node_index.insert(name.to_string(), index);
        graph.nodes.push(SankeyNode {
            name: name.to_string(),
        });
        index
    };
    let mut add_link = |graph: &mut SankeyGraph, source: usize, target: usize, value: f64| {
        match link_index.get(&(source, target)) {
            Some(&at) => graph.links[at].value += value,
            None => {
                link_index.insert((source, target), graph.links.len());
                graph.links.push(SankeyLink {
                    source,
                    target,
                    value,
                });
            }
        }
    };

    for flow in flows {
        let (Some(source), Some(intermediate), Some(destination)) = (
            label(&flow.source),
            label(&flow.intermediate),
            label(&flow.destination),
        ) else {
            continue;
        };

        let value = if flow.weight > 0.0 {
            flow.weight
        } else {
            config.fallback_weight
        };

        let source_node = add_node(&mut graph, source);
        let transport_node = add_node(&mut graph, intermediate);
        let location_node = add_node(&mut graph, destination);

        // One chain contributes to both hops.
        add_link(&mut graph, source_node, transport_node, value);
        add_link(&mut graph, transport_node, location_node, value);
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(source: &str, intermediate: &str, destination: &str, weight: f64) -> FlowRecord {
        FlowRecord {
            source: Some(source.to_string()),
            intermediate: Some(intermediate.to_string()),
            destination: Some(destination.to_string()),
            weight,
        }
    }

    #[test]
    fn chains_emit_two_links_sharing_the_intermediate() {
        let graph = build_graph(
            &[flow("Cocaine and Derivatives", "Maritime", "Port", 40.0)],
            SankeyConfig::default(),
        );
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.links.len(), 2);
        assert_eq!(graph.links[0], SankeyLink { source: 0, target: 1, value: 40.0 });
        assert_eq!(graph.links[1], SankeyLink { source: 1, target: 2, value: 40.0 });
    }

    #[test]
    fn parallel_links_merge_by_summing_values() {
        let graph = build_graph(
            &[
                flow("Cocaine and Derivatives", "Maritime", "Port", 40.0),
                flow("Cocaine and Derivatives", "Maritime", "Airport", 10.0),
            ],
            SankeyConfig::default(),
        );
        // The shared first hop is one link with the summed value.
        assert_eq!(graph.links[0].value, 50.0);
        // Second hops diverge into separate links.
        assert_eq!(graph.links.len(), 3);
    }

    #[test]
    fn node_indices_come_from_first_insertion() {
        let graph = build_graph(
            &[
                flow("Opioids and Opiates", "Air", "Airport", 1.0),
                flow("Cocaine and Derivatives", "Air", "Airport", 1.0),
            ],
            SankeyConfig::default(),
        );
        let names: Vec<&str> = graph.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Opioids and Opiates", "Air", "Airport", "Cocaine and Derivatives"]
        );
    }

    #[test]
    fn shared_labels_across_levels_reuse_one_node() {
        // A label seen as a destination and later as a source collapses
        // into a single node; the builder does not namespace by level.
        let graph = build_graph(
            &[
                flow("NPS", "Mail", "Hub", 1.0),
                flow("Hub", "Road", "Border", 1.0),
            ],
            SankeyConfig::default(),
        );
        let hubs = graph.nodes.iter().filter(|n| n.name == "Hub").count();
        assert_eq!(hubs, 1);
    }

    #[test]
    fn weightless_records_contribute_the_fallback_each() {
        let graph = build_graph(
            &[
                flow("NPS", "Mail", "Hub", 0.0),
                flow("NPS", "Mail", "Hub", 0.0),
            ],
            SankeyConfig::default(),
        );
        // Two falsy contributions merge into value 2 on each hop.
        assert_eq!(graph.links.len(), 2);
        assert_eq!(graph.links[0].value, 2.0);
        assert_eq!(graph.links[1].value, 2.0);

        let graph = build_graph(
            &[flow("NPS", "Mail", "Hub", 0.0)],
            SankeyConfig { fallback_weight: 0.5 },
        );
        assert_eq!(graph.links[0].value, 0.5);
    }

    #[test]
    fn incomplete_chains_and_empty_input_yield_empty_output() {
        assert!(build_graph(&[], SankeyConfig::default()).nodes.is_empty());

        let graph = build_graph(
            &[FlowRecord {
                source: Some("NPS".to_string()),
                intermediate: Some("  ".to_string()),
                destination: Some("Hub".to_string()),
                weight: 3.0,
            }],
            SankeyConfig::default(),
        );
        assert!(graph.nodes.is_empty());
        assert!(graph.links.is_empty());
    }
}
