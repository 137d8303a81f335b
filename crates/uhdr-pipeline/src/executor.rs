//! Pipe evaluation.
//!
//! [`evaluate`] runs every node of a pipe in index order against the
//! bound source image. Each node consumes the previous node's output.
//! Disabled nodes pass their input through unchanged. Neither the pipe
//! nor the source image is modified.
//!
//! [`IncrementalExecutor`] produces the same output but remembers every
//! node's result, so an edit to node `k` only recomputes nodes `k..n`.

use log::debug;

use crate::descriptor::NodeDescriptor;
use crate::diagnostics::{Clock, EvaluationDiagnostics, NodeDiagnostics, NoopClock};
use crate::image::ColorImage;
use crate::pipe::ProcessPipe;
use crate::types::PipelineError;

/// Evaluate `pipe` from its bound source image.
///
/// The result carries the pipe's descriptor as metadata.
///
/// # Errors
///
/// Returns [`PipelineError::NoImage`] if no source image is bound.
pub fn evaluate(pipe: &ProcessPipe) -> Result<ColorImage, PipelineError> {
    evaluate_with_diagnostics(pipe, &NoopClock).map(|(image, _)| image)
}

/// Like [`evaluate`], also timing each node with `clock`.
///
/// # Errors
///
/// Returns [`PipelineError::NoImage`] if no source image is bound.
pub fn evaluate_with_diagnostics<C: Clock>(
    pipe: &ProcessPipe,
    clock: &C,
) -> Result<(ColorImage, EvaluationDiagnostics), PipelineError> {
    let start = clock.now();
    let source = pipe.image().ok_or(PipelineError::NoImage)?;

    let mut diagnostics = Vec::with_capacity(pipe.len());
    let mut current: Option<ColorImage> = None;
    for (index, node) in pipe.nodes().iter().enumerate() {
        let input = current.as_ref().unwrap_or(source);
        let (output, diag) = run_node(index, node, input, clock);
        diagnostics.push(diag);
        current = Some(output);
    }

    let mut result = current.unwrap_or_else(|| source.clone());
    result.set_metadata(Some(pipe.to_descriptor()));
    let diagnostics = EvaluationDiagnostics::new(
        source.dimensions(),
        source.is_hdr(),
        diagnostics,
        clock.elapsed(&start),
    );
    Ok((result, diagnostics))
}

/// Apply one node: its operator when enabled, a copy otherwise.
fn apply_node(node: &NodeDescriptor, input: &ColorImage) -> ColorImage {
    if node.enabled {
        node.parameters.compute(input)
    } else {
        input.clone()
    }
}

fn run_node<C: Clock>(
    index: usize,
    node: &NodeDescriptor,
    input: &ColorImage,
    clock: &C,
) -> (ColorImage, NodeDiagnostics) {
    let start = clock.now();
    let output = apply_node(node, input);
    let duration = clock.elapsed(&start);
    debug!(
        "node {index} ({}, {}) {} in {:.3}ms",
        node.name,
        node.kind(),
        if node.enabled { "computed" } else { "bypassed" },
        duration.as_secs_f64() * 1000.0,
    );
    let diag = NodeDiagnostics {
        index,
        name: node.name.clone(),
        kind: node.kind(),
        enabled: node.enabled,
        reused: false,
        duration,
        output: output.dimensions(),
    };
    (output, diag)
}

/// One cached node result.
#[derive(Debug, Clone)]
struct CachedNode {
    node: NodeDescriptor,
    output: ColorImage,
}

/// Evaluator that reuses upstream results between calls.
///
/// Cached outputs are keyed on the pipe's source image generation and on
/// each node's name, enabled flag and parameters. Evaluation starts at
/// the first node that differs from the cached run; everything before
/// it is reused. The output is identical to [`evaluate`].
///
/// One executor should serve one pipe (one edit session); feeding it a
/// different pipe simply causes recomputation.
#[derive(Debug, Clone, Default)]
pub struct IncrementalExecutor {
    source_generation: u64,
    cache: Vec<CachedNode>,
}

impl IncrementalExecutor {
    /// An executor with an empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            source_generation: 0,
            cache: Vec::new(),
        }
    }

    /// Drop all cached results.
    pub fn invalidate(&mut self) {
        self.cache.clear();
        self.source_generation = 0;
    }

    /// Number of node outputs currently cached.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Evaluate `pipe`, reusing cached upstream results.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoImage`] if no source image is bound.
    pub fn evaluate(&mut self, pipe: &ProcessPipe) -> Result<ColorImage, PipelineError> {
        self.evaluate_with_diagnostics(pipe, &NoopClock)
            .map(|(image, _)| image)
    }

    /// Like [`evaluate`](Self::evaluate), also timing each node with
    /// `clock`. Reused nodes report zero duration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoImage`] if no source image is bound.
    pub fn evaluate_with_diagnostics<C: Clock>(
        &mut self,
        pipe: &ProcessPipe,
        clock: &C,
    ) -> Result<(ColorImage, EvaluationDiagnostics), PipelineError> {
        let start = clock.now();
        let source = pipe.image().ok_or(PipelineError::NoImage)?;

        if self.source_generation != pipe.image_generation() {
            debug!("source image changed, dropping {} cached nodes", self.cache.len());
            self.cache.clear();
            self.source_generation = pipe.image_generation();
        }

        let nodes = pipe.nodes();
        let reuse = self
            .cache
            .iter()
            .zip(nodes)
            .take_while(|(cached, node)| cached.node == **node)
            .count();
        self.cache.truncate(reuse);
        debug!("reusing {reuse} of {} nodes", nodes.len());

        let mut diagnostics: Vec<NodeDiagnostics> = self
            .cache
            .iter()
            .enumerate()
            .map(|(index, cached)| NodeDiagnostics {
                index,
                name: cached.node.name.clone(),
                kind: cached.node.kind(),
                enabled: cached.node.enabled,
                reused: true,
                duration: std::time::Duration::ZERO,
                output: cached.output.dimensions(),
            })
            .collect();

        for (index, node) in nodes.iter().enumerate().skip(reuse) {
            let input = self.cache.last().map_or(source, |c| &c.output);
            let (output, diag) = run_node(index, node, input, clock);
            diagnostics.push(diag);
            self.cache.push(CachedNode {
                node: node.clone(),
                output,
            });
        }

        let mut result = self
            .cache
            .last()
            .map_or_else(|| source.clone(), |c| c.output.clone());
        result.set_metadata(Some(pipe.to_descriptor()));
        let diagnostics = EvaluationDiagnostics::new(
            source.dimensions(),
            source.is_hdr(),
            diagnostics,
            clock.elapsed(&start),
        );
        Ok((result, diagnostics))
    }
}
