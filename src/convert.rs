//! GConstruct to gsprocessing-v1.0 config conversion.
//!
//! The GConstruct dialect is loose: file lists may be a bare string,
//! `feature_col` may be a string or a list, transforms and split
//! percentages are optional. Conversion normalizes all of that into
//! [`NodeConfig`] / [`EdgeConfig`] records and can re-emit them as a
//! `gsprocessing-v1.0` JSON document.
//!
//! Only the `no-op` feature transform is supported; anything else is a
//! configuration error, as are wildcard file paths.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Error, Result};

const OUTPUT_VERSION: &str = "gsprocessing-v1.0";
const NOOP_TRANSFORM: &str = "no-op";
const DEFAULT_SPLIT: [f64; 3] = [0.8, 0.1, 0.1];

/// A string-or-list JSON field, normalized to a list on conversion.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawFormat {
    name: String,
    #[serde(default)]
    separator: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTransform {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawFeature {
    feature_col: OneOrMany,
    #[serde(default)]
    feature_name: Option<String>,
    #[serde(default)]
    transform: Option<RawTransform>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawLabel {
    label_col: String,
    task_type: String,
    #[serde(default)]
    split_pct: Option<[f64; 3]>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawNode {
    node_type: String,
    format: RawFormat,
    files: OneOrMany,
    node_id_col: String,
    #[serde(default)]
    features: Option<Vec<RawFeature>>,
    #[serde(default)]
    labels: Option<Vec<RawLabel>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawEdge {
    relation: [String; 3],
    format: RawFormat,
    files: OneOrMany,
    source_id_col: String,
    dest_id_col: String,
    #[serde(default)]
    features: Option<Vec<RawFeature>>,
    #[serde(default)]
    labels: Option<Vec<RawLabel>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawGConstruct {
    #[serde(default)]
    nodes: Vec<RawNode>,
    #[serde(default)]
    edges: Vec<RawEdge>,
}

/// A normalized feature: one input column, an optional output name and
/// the (always `no-op`) transform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSpec {
    pub column: String,
    pub transform: TransformSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The transform applied to a feature column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformSpec {
    pub name: String,
}

/// Train/validation/test fractions derived from a `split_pct` triple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitRate {
    pub train: f64,
    pub val: f64,
    pub test: f64,
}

impl From<[f64; 3]> for SplitRate {
    fn from([train, val, test]: [f64; 3]) -> Self {
        Self { train, val, test }
    }
}

/// A normalized label column with its task and split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelSpec {
    pub column: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub split_rate: SplitRate,
}

/// A normalized node input description.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub node_type: String,
    pub file_format: String,
    pub files: Vec<String>,
    pub separator: Option<String>,
    pub column: String,
    pub features: Option<Vec<FeatureSpec>>,
    pub labels: Option<Vec<LabelSpec>>,
}

/// A normalized edge input description.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeConfig {
    pub source_col: String,
    pub source_type: String,
    pub dest_col: String,
    pub dest_type: String,
    pub relation: String,
    pub file_format: String,
    pub files: Vec<String>,
    pub separator: Option<String>,
    pub features: Option<Vec<FeatureSpec>>,
    pub labels: Option<Vec<LabelSpec>>,
}

/// Converts GConstruct-dialect JSON into normalized records and the
/// gsprocessing-v1.0 document.
#[derive(Debug, Clone, Copy, Default)]
pub struct GConstructConverter;

impl GConstructConverter {
    pub fn new() -> Self {
        Self
    }

    /// Normalize the `nodes` array of a GConstruct document.
    pub fn convert_nodes(&self, nodes: &Value) -> Result<Vec<NodeConfig>> {
        let raw: Vec<RawNode> = serde_json::from_value(nodes.clone())?;
        raw.into_iter().map(convert_node).collect()
    }

    /// Normalize the `edges` array of a GConstruct document.
    pub fn convert_edges(&self, edges: &Value) -> Result<Vec<EdgeConfig>> {
        let raw: Vec<RawEdge> = serde_json::from_value(edges.clone())?;
        raw.into_iter().map(convert_edge).collect()
    }

    /// Convert a full GConstruct document into gsprocessing-v1.0 JSON.
    ///
    /// An empty input still yields the well-formed envelope with empty
    /// node and edge lists.
    pub fn convert_to_gsprocessing(&self, input: &Value) -> Result<Value> {
        let raw: RawGConstruct = serde_json::from_value(input.clone())?;
        let nodes: Vec<Value> = raw
            .nodes
            .into_iter()
            .map(|n| convert_node(n).map(node_to_json))
            .collect::<Result<_>>()?;
        let edges: Vec<Value> = raw
            .edges
            .into_iter()
            .map(|e| convert_edge(e).map(edge_to_json))
            .collect::<Result<_>>()?;
        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            "converted gconstruct document"
        );
        Ok(json!({
            "version": OUTPUT_VERSION,
            "graph": { "nodes": nodes, "edges": edges },
        }))
    }
}

fn check_files(files: Vec<String>, context: impl fmt::Display) -> Result<Vec<String>> {
    for file in &files {
        if file.contains('*') || file.contains('?') {
            return Err(Error::Configuration(format!(
                "wildcard file paths are not supported: {file} ({context})"
            )));
        }
    }
    Ok(files)
}

fn convert_features(features: Option<Vec<RawFeature>>) -> Result<Option<Vec<FeatureSpec>>> {
    let Some(features) = features else {
        return Ok(None);
    };
    let mut out = Vec::with_capacity(features.len());
    for feature in features {
        if let Some(transform) = &feature.transform {
            if transform.name != NOOP_TRANSFORM {
                return Err(Error::Configuration(format!(
                    "feature transform '{}' is not supported, only '{NOOP_TRANSFORM}'",
                    transform.name
                )));
            }
        }
        let column = feature
            .feature_col
            .into_vec()
            .into_iter()
            .next()
            .ok_or_else(|| Error::Configuration("feature with empty feature_col".into()))?;
        out.push(FeatureSpec {
            column,
            transform: TransformSpec {
                name: NOOP_TRANSFORM.into(),
            },
            name: feature.feature_name,
        });
    }
    Ok(Some(out))
}

fn convert_labels(labels: Option<Vec<RawLabel>>) -> Option<Vec<LabelSpec>> {
    labels.map(|labels| {
        labels
            .into_iter()
            .map(|label| LabelSpec {
                column: label.label_col,
                task_type: label.task_type,
                split_rate: label.split_pct.unwrap_or(DEFAULT_SPLIT).into(),
            })
            .collect()
    })
}

fn convert_node(raw: RawNode) -> Result<NodeConfig> {
    let files = check_files(raw.files.into_vec(), format!("node type {}", raw.node_type))?;
    Ok(NodeConfig {
        node_type: raw.node_type,
        file_format: raw.format.name,
        files,
        separator: raw.format.separator,
        column: raw.node_id_col,
        features: convert_features(raw.features)?,
        labels: convert_labels(raw.labels),
    })
}

fn convert_edge(raw: RawEdge) -> Result<EdgeConfig> {
    let [source_type, relation, dest_type] = raw.relation;
    let files = check_files(raw.files.into_vec(), format!("relation {relation}"))?;
    Ok(EdgeConfig {
        source_col: raw.source_id_col,
        source_type,
        dest_col: raw.dest_id_col,
        dest_type,
        relation,
        file_format: raw.format.name,
        files,
        separator: raw.format.separator,
        features: convert_features(raw.features)?,
        labels: convert_labels(raw.labels),
    })
}

fn data_json(file_format: &str, files: &[String]) -> Value {
    json!({ "format": file_format, "files": files })
}

fn node_to_json(config: NodeConfig) -> Value {
    let mut out = json!({
        "data": data_json(&config.file_format, &config.files),
        "type": config.node_type,
        "column": config.column,
    });
    if let Some(sep) = &config.separator {
        out["separator"] = json!(sep);
    }
    if let Some(features) = &config.features {
        out["features"] = json!(features);
    }
    if let Some(labels) = &config.labels {
        out["labels"] = json!(labels);
    }
    out
}

fn edge_to_json(config: EdgeConfig) -> Value {
    let mut out = json!({
        "data": data_json(&config.file_format, &config.files),
        "source": { "column": config.source_col, "type": config.source_type },
        "dest": { "column": config.dest_col, "type": config.dest_type },
        "relation": { "type": config.relation },
    });
    if let Some(sep) = &config.separator {
        out["separator"] = json!(sep);
    }
    if let Some(features) = &config.features {
        out["features"] = json!(features);
    }
    if let Some(labels) = &config.labels {
        out["labels"] = json!(labels);
    }
    out
}
