//! The process pipe: an ordered, indexed list of nodes plus the source
//! image they are evaluated against.
//!
//! Node indices are stable identities. Nodes can be appended but never
//! removed or reordered, so index 1 of a default pipe is always the
//! contrast node.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::descriptor::{NodeDescriptor, PipelineDescriptor};
use crate::image::ColorImage;
use crate::operators::{OperatorKind, OperatorParams};
use crate::types::PipelineError;

/// Source generations are unique per process so the incremental
/// executor can tell images apart without comparing pixels.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Ordered nodes with per-node parameters and an optional bound source
/// image.
#[derive(Debug, Clone)]
pub struct ProcessPipe {
    nodes: Vec<NodeDescriptor>,
    image: Option<ColorImage>,
    image_generation: u64,
}

impl ProcessPipe {
    /// An empty pipe with no nodes and no image.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            image: None,
            image_generation: 0,
        }
    }

    /// Append a node and return its index.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameterSchema`] if `params` is
    /// not of `kind`, fails validation, or `name` is already used.
    pub fn append(
        &mut self,
        kind: OperatorKind,
        params: OperatorParams,
        name: impl Into<String>,
    ) -> Result<usize, PipelineError> {
        let name = name.into();
        check_kind(kind, &params)?;
        params.validate()?;
        if self.index_of(&name).is_some() {
            return Err(PipelineError::schema(format!("duplicate node name {name:?}")));
        }
        self.nodes.push(NodeDescriptor::new(name, params));
        Ok(self.nodes.len() - 1)
    }

    /// Replace the parameters of node `index`.
    ///
    /// The enabled flag is left as it is; parameters set on a disabled
    /// node take effect once it is enabled again.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IndexOutOfRange`] for a bad index and
    /// [`PipelineError::InvalidParameterSchema`] if `params` is of a
    /// different kind or fails validation.
    pub fn set_parameters(
        &mut self,
        index: usize,
        params: OperatorParams,
    ) -> Result<(), PipelineError> {
        let node = self.node_mut(index)?;
        check_kind(node.kind(), &params)?;
        params.validate()?;
        node.parameters = params;
        Ok(())
    }

    /// Replace the parameters of node `index` from a plain key/value map
    /// decoded against the node's kind.
    ///
    /// # Errors
    ///
    /// As [`set_parameters`](Self::set_parameters); unknown, missing or
    /// mistyped keys are [`PipelineError::InvalidParameterSchema`].
    pub fn set_parameters_json(
        &mut self,
        index: usize,
        value: serde_json::Value,
    ) -> Result<(), PipelineError> {
        let kind = self.node(index)?.kind();
        let params = OperatorParams::from_value(kind, value)?;
        self.set_parameters(index, params)
    }

    /// A copy of node `index`'s parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IndexOutOfRange`] for a bad index.
    pub fn parameters(&self, index: usize) -> Result<OperatorParams, PipelineError> {
        Ok(self.node(index)?.parameters.clone())
    }

    /// Enable or disable node `index`. Parameters are kept.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IndexOutOfRange`] for a bad index.
    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<(), PipelineError> {
        self.node_mut(index)?.enabled = enabled;
        Ok(())
    }

    /// Whether node `index` is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IndexOutOfRange`] for a bad index.
    pub fn is_enabled(&self, index: usize) -> Result<bool, PipelineError> {
        Ok(self.node(index)?.enabled)
    }

    /// Node `index`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IndexOutOfRange`] for a bad index.
    pub fn node(&self, index: usize) -> Result<&NodeDescriptor, PipelineError> {
        let len = self.nodes.len();
        self.nodes
            .get(index)
            .ok_or(PipelineError::IndexOutOfRange { index, len })
    }

    fn node_mut(&mut self, index: usize) -> Result<&mut NodeDescriptor, PipelineError> {
        let len = self.nodes.len();
        self.nodes
            .get_mut(index)
            .ok_or(PipelineError::IndexOutOfRange { index, len })
    }

    /// Index of the node called `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// All nodes, in evaluation order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the pipe has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bind the source image used as evaluation input.
    pub fn set_image(&mut self, image: ColorImage) {
        self.image = Some(image);
        self.image_generation = next_generation();
    }

    /// The bound source image.
    #[must_use]
    pub const fn image(&self) -> Option<&ColorImage> {
        self.image.as_ref()
    }

    /// Unbind and return the source image.
    pub fn take_image(&mut self) -> Option<ColorImage> {
        self.image_generation = 0;
        self.image.take()
    }

    /// Identifier that changes every time a new source image is bound.
    /// Zero means no image.
    #[must_use]
    pub const fn image_generation(&self) -> u64 {
        self.image_generation
    }

    /// Snapshot of the nodes, without the image.
    #[must_use]
    pub fn to_descriptor(&self) -> PipelineDescriptor {
        PipelineDescriptor {
            nodes: self.nodes.clone(),
        }
    }

    /// Build a pipe (without an image) from a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameterSchema`] if any node fails
    /// validation or two nodes share a name.
    pub fn from_descriptor(descriptor: PipelineDescriptor) -> Result<Self, PipelineError> {
        let mut pipe = Self::new();
        for node in descriptor.nodes {
            let index = pipe.append(node.kind(), node.parameters, node.name)?;
            pipe.nodes[index].enabled = node.enabled;
        }
        Ok(pipe)
    }
}

impl Default for ProcessPipe {
    /// The eleven canonical nodes at their default parameters.
    fn default() -> Self {
        Self {
            nodes: PipelineDescriptor::canonical().nodes,
            image: None,
            image_generation: 0,
        }
    }
}

impl PartialEq for ProcessPipe {
    /// Pipes are equal when their nodes and bound images are equal.
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.image == other.image
    }
}

fn check_kind(expected: OperatorKind, params: &OperatorParams) -> Result<(), PipelineError> {
    if params.kind() == expected {
        Ok(())
    } else {
        Err(PipelineError::schema(format!(
            "{} parameters given for a {expected} node",
            params.kind()
        )))
    }
}
