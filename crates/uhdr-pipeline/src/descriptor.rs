//! Serializable description of a whole pipe.
//!
//! A [`PipelineDescriptor`] is the persisted form of a
//! [`ProcessPipe`](crate::ProcessPipe): the ordered nodes with their
//! names, kinds, enabled flags and parameters, but no image.
//!
//! On the wire it is a JSON object keyed by node name, in pipeline
//! order:
//!
//! ```json
//! {
//!   "exposure": { "kind": "exposure", "enabled": true, "parameters": { "EV": 0.0 } },
//!   "contrast": { "kind": "contrast", "enabled": true, "parameters": { "contrast": 0.0 } }
//! }
//! ```
//!
//! Entries that hold a bare parameter map (no `kind`) are also accepted
//! when the name is one of the canonical node names; the kind is then
//! taken from the name and the node is enabled.

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::operators::{OperatorKind, OperatorParams};

/// The eleven canonical nodes, in evaluation order.
pub const CANONICAL_NODES: [(&str, OperatorKind); 11] = [
    ("exposure", OperatorKind::Exposure),
    ("contrast", OperatorKind::Contrast),
    ("tonecurve", OperatorKind::ToneCurve),
    ("lightnessmask", OperatorKind::LightnessMask),
    ("saturation", OperatorKind::Saturation),
    ("colorEditor0", OperatorKind::ColorEditor),
    ("colorEditor1", OperatorKind::ColorEditor),
    ("colorEditor2", OperatorKind::ColorEditor),
    ("colorEditor3", OperatorKind::ColorEditor),
    ("colorEditor4", OperatorKind::ColorEditor),
    ("geometry", OperatorKind::Geometry),
];

/// Kind of the canonical node called `name`, if there is one.
#[must_use]
pub fn canonical_kind(name: &str) -> Option<OperatorKind> {
    CANONICAL_NODES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, kind)| *kind)
}

/// One node of a pipe.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
    /// Node name, unique within the pipe.
    pub name: String,
    /// Disabled nodes keep their parameters but are skipped at evaluation.
    pub enabled: bool,
    /// Current parameters; their variant determines the node kind.
    pub parameters: OperatorParams,
}

impl NodeDescriptor {
    /// An enabled node.
    #[must_use]
    pub fn new(name: impl Into<String>, parameters: OperatorParams) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            parameters,
        }
    }

    /// The node's operator kind.
    #[must_use]
    pub const fn kind(&self) -> OperatorKind {
        self.parameters.kind()
    }
}

/// Ordered list of nodes describing one image's edit state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineDescriptor {
    /// Nodes in evaluation order.
    pub nodes: Vec<NodeDescriptor>,
}

impl PipelineDescriptor {
    /// The eleven canonical nodes at default parameters.
    #[must_use]
    pub fn canonical() -> Self {
        Self {
            nodes: CANONICAL_NODES
                .iter()
                .map(|(name, kind)| NodeDescriptor::new(*name, OperatorParams::default_for(*kind)))
                .collect(),
        }
    }

    /// Whether the nodes are exactly the canonical names and kinds, in
    /// canonical order.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.nodes.len() == CANONICAL_NODES.len()
            && self
                .nodes
                .iter()
                .zip(CANONICAL_NODES.iter())
                .all(|(node, (name, kind))| node.name == *name && node.kind() == *kind)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the descriptor has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&NodeDescriptor> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

#[derive(Serialize)]
struct NodeEntryRef<'a> {
    kind: OperatorKind,
    enabled: bool,
    parameters: &'a OperatorParams,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NodeEntry {
    kind: OperatorKind,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    parameters: serde_json::Value,
}

const fn enabled_by_default() -> bool {
    true
}

impl NodeEntry {
    /// Interpret one map value, either a full entry or a bare parameter
    /// map under a canonical name.
    fn parse(name: &str, value: serde_json::Value) -> Result<NodeDescriptor, String> {
        let is_entry = value.as_object().is_some_and(|m| m.contains_key("kind"));
        let (kind, enabled, parameters) = if is_entry {
            let entry: Self = serde_json::from_value(value).map_err(|e| format!("{name}: {e}"))?;
            (entry.kind, entry.enabled, entry.parameters)
        } else {
            let kind = canonical_kind(name)
                .ok_or_else(|| format!("{name}: missing \"kind\" for non-canonical node"))?;
            (kind, true, value)
        };
        let parameters = OperatorParams::from_value(kind, parameters)
            .map_err(|e| format!("{name}: {e}"))?;
        Ok(NodeDescriptor {
            name: name.to_owned(),
            enabled,
            parameters,
        })
    }
}

impl Serialize for PipelineDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.nodes.len()))?;
        for node in &self.nodes {
            map.serialize_entry(
                &node.name,
                &NodeEntryRef {
                    kind: node.kind(),
                    enabled: node.enabled,
                    parameters: &node.parameters,
                },
            )?;
        }
        map.end()
    }
}

struct DescriptorVisitor;

impl<'de> Visitor<'de> for DescriptorVisitor {
    type Value = PipelineDescriptor;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of node name to node entry")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut nodes: Vec<NodeDescriptor> = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((name, value)) = access.next_entry::<String, serde_json::Value>()? {
            if nodes.iter().any(|n| n.name == name) {
                return Err(de::Error::custom(format!("duplicate node name {name:?}")));
            }
            nodes.push(NodeEntry::parse(&name, value).map_err(de::Error::custom)?);
        }
        Ok(PipelineDescriptor { nodes })
    }
}

impl<'de> Deserialize<'de> for PipelineDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(DescriptorVisitor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operators::{ContrastParams, ExposureParams, SaturationMethod, SaturationParams};

    fn edited() -> PipelineDescriptor {
        let mut d = PipelineDescriptor::canonical();
        d.nodes[0].parameters = OperatorParams::Exposure(ExposureParams { ev: 1.25 });
        d.nodes[1].parameters = OperatorParams::Contrast(ContrastParams { contrast: -40.0 });
        d.nodes[4].parameters = OperatorParams::Saturation(SaturationParams {
            saturation: 30.0,
            method: SaturationMethod::Linear,
        });
        d.nodes[3].enabled = false;
        d
    }

    #[test]
    fn canonical_has_eleven_nodes_in_order() {
        let d = PipelineDescriptor::canonical();
        assert_eq!(d.len(), 11);
        assert!(d.is_canonical());
        assert_eq!(d.nodes[1].name, "contrast");
        assert_eq!(d.nodes[5].name, "colorEditor0");
        assert_eq!(d.nodes[9].name, "colorEditor4");
        assert_eq!(d.nodes[10].kind(), OperatorKind::Geometry);
    }

    #[test]
    fn reordered_nodes_are_not_canonical() {
        let mut d = PipelineDescriptor::canonical();
        d.nodes.swap(0, 1);
        assert!(!d.is_canonical());
        d.nodes.swap(0, 1);
        d.nodes.pop();
        assert!(!d.is_canonical());
    }

    #[test]
    fn json_preserves_node_order() {
        let json = serde_json::to_string(&PipelineDescriptor::canonical()).unwrap();
        let mut last = 0;
        for (name, _) in CANONICAL_NODES {
            let pos = json.find(&format!("\"{name}\":")).unwrap();
            assert!(pos >= last, "{name} out of order");
            last = pos;
        }
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let d = edited();
        let json = serde_json::to_string_pretty(&d).unwrap();
        let back: PipelineDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
        assert!(!back.nodes[3].enabled);
    }

    #[test]
    fn entry_layout() {
        let value = serde_json::to_value(&edited()).unwrap();
        assert_eq!(
            value["exposure"],
            serde_json::json!({ "kind": "exposure", "enabled": true, "parameters": { "EV": 1.25 } })
        );
        assert_eq!(value["colorEditor2"]["kind"], "coloreditor");
    }

    #[test]
    fn bare_parameter_maps_use_canonical_kinds() {
        let json = r#"{ "exposure": { "EV": 2.0 }, "saturation": { "saturation": 10.0, "method": "gamma" } }"#;
        let d: PipelineDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(
            d.nodes[0].parameters,
            OperatorParams::Exposure(ExposureParams { ev: 2.0 })
        );
        assert!(d.nodes[1].enabled);
    }

    #[test]
    fn bare_map_under_unknown_name_is_rejected() {
        let json = r#"{ "myexposure": { "EV": 2.0 } }"#;
        assert!(serde_json::from_str::<PipelineDescriptor>(json).is_err());
    }

    #[test]
    fn custom_named_nodes_round_trip() {
        let d = PipelineDescriptor {
            nodes: vec![NodeDescriptor::new(
                "extra-contrast",
                OperatorParams::Contrast(ContrastParams { contrast: 12.0 }),
            )],
        };
        let back: PipelineDescriptor =
            serde_json::from_str(&serde_json::to_string(&d).unwrap()).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn mismatched_parameters_are_rejected() {
        let json = r#"{ "contrast": { "kind": "contrast", "enabled": true, "parameters": { "EV": 1.0 } } }"#;
        let err = serde_json::from_str::<PipelineDescriptor>(json).unwrap_err();
        assert!(err.to_string().contains("contrast"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let json = r#"{ "exposure": { "EV": 0.0 }, "exposure": { "EV": 1.0 } }"#;
        assert!(serde_json::from_str::<PipelineDescriptor>(json).is_err());
    }
}
