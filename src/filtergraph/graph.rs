use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::filtergraph::chain::{FilterSpec, compose_chain, split_chain};
use crate::filtergraph::escape::{is_escaped_at, split_unescaped};
use crate::foundation::error::{FfpipeError, FfpipeResult};

/// Location of a pad: chain index within the graph and pad index within the chain.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct PadRef {
    /// Chain index.
    pub chain: usize,
    /// Pad index on the chain's first (input) or last (output) filter.
    pub pad: usize,
}

impl PadRef {
    /// Pad `pad` of chain `chain`.
    pub fn new(chain: usize, pad: usize) -> Self {
        Self { chain, pad }
    }

    /// Label used when none is given: `L<chain>_<pad>`.
    pub fn default_label(self) -> String {
        format!("L{}_{}", self.chain, self.pad)
    }
}

/// A bare chain index addresses pad 0.
impl From<usize> for PadRef {
    fn from(chain: usize) -> Self {
        Self::new(chain, 0)
    }
}

impl From<(usize, usize)> for PadRef {
    fn from((chain, pad): (usize, usize)) -> Self {
        Self::new(chain, pad)
    }
}

impl fmt::Display for PadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.chain, self.pad)
    }
}

/// Caller-supplied label assignments (label -> pad).
pub type LabelMap = BTreeMap<String, PadRef>;

/// One `(label, pad)` entry of a [`PadRegistry`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PadBinding {
    /// Link label.
    pub label: String,
    /// Chain index.
    pub chain: usize,
    /// Pad index.
    pub pad: usize,
}

/// Pad-label bookkeeping for one side (inputs or outputs) of a graph.
///
/// Keyed by pad: a pad carries at most one label, while one label may sit on several pads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PadRegistry {
    slots: BTreeMap<PadRef, String>,
}

impl PadRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Label `pad`, returning the label that ends up on it.
    ///
    /// `None` requests the default label. Re-assigning the current label is a no-op, a default
    /// label never overrides a custom one, and a second distinct custom label is an error.
    pub fn assign(&mut self, pad: PadRef, label: Option<&str>) -> FfpipeResult<String> {
        let default = pad.default_label();
        let label = label.map(str::to_string).unwrap_or_else(|| default.clone());
        match self.slots.get(&pad) {
            None => {
                self.slots.insert(pad, label.clone());
                Ok(label)
            }
            Some(existing) if *existing == label || label == default => Ok(existing.clone()),
            Some(existing) => Err(FfpipeError::composition(format!(
                "duplicate filter pad labels found for chain #{} pad #{}: {existing}, {label}",
                pad.chain, pad.pad
            ))),
        }
    }

    /// Move `label` onto `pad`, dropping it from every other pad and replacing whatever `pad`
    /// carried before.
    pub fn rebind(&mut self, label: &str, pad: PadRef) {
        self.slots.retain(|_, l| l != label);
        self.slots.insert(pad, label.to_string());
    }

    /// Label on `pad`, if any.
    pub fn label_at(&self, pad: PadRef) -> Option<&str> {
        self.slots.get(&pad).map(String::as_str)
    }

    /// First pad carrying `label`.
    pub fn get(&self, label: &str) -> Option<PadRef> {
        self.pads(label).into_iter().next()
    }

    /// All pads carrying `label`, in pad order.
    pub fn pads(&self, label: &str) -> Vec<PadRef> {
        self.slots
            .iter()
            .filter(|(_, l)| l.as_str() == label)
            .map(|(p, _)| *p)
            .collect()
    }

    /// `true` when some pad carries `label`.
    pub fn contains(&self, label: &str) -> bool {
        self.slots.values().any(|l| l == label)
    }

    /// Labels of `chain`, ordered by pad index.
    pub fn chain_labels(&self, chain: usize) -> Vec<String> {
        self.slots
            .range(PadRef::new(chain, 0)..=PadRef::new(chain, usize::MAX))
            .map(|(_, l)| l.clone())
            .collect()
    }

    /// Labels of `chain` laid out positionally from pad 0; unlabeled pads are empty strings.
    pub fn chain_slots(&self, chain: usize) -> Vec<String> {
        let entries: Vec<(usize, &String)> = self
            .slots
            .range(PadRef::new(chain, 0)..=PadRef::new(chain, usize::MAX))
            .map(|(p, l)| (p.pad, l))
            .collect();
        let Some(&(max_pad, _)) = entries.last() else {
            return Vec::new();
        };
        let mut out = vec![String::new(); max_pad + 1];
        for (pad, label) in entries {
            out[pad] = label.clone();
        }
        out
    }

    /// Label -> first pad view.
    pub fn to_label_map(&self) -> LabelMap {
        let mut out = LabelMap::new();
        for (pad, label) in &self.slots {
            out.entry(label.clone()).or_insert(*pad);
        }
        out
    }

    /// All bindings in pad order.
    pub fn bindings(&self) -> Vec<PadBinding> {
        self.slots
            .iter()
            .map(|(p, l)| PadBinding {
                label: l.clone(),
                chain: p.chain,
                pad: p.pad,
            })
            .collect()
    }

    /// Highest chain index referenced.
    fn max_chain(&self) -> Option<usize> {
        self.slots.keys().map(|p| p.chain).max()
    }

    /// Number of labeled pads.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// `true` when no pad is labeled.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl serde::Serialize for PadRegistry {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.bindings())
    }
}

/// Labels of `chain` in `registry`, ordered by pad index.
pub fn get_chain_labels(registry: &PadRegistry, chain: usize) -> Vec<String> {
    registry.chain_labels(chain)
}

/// Input- and output-pad registries of one graph.
///
/// A label present in both registries is an internal link; one present only in `inputs` is a
/// graph input and one present only in `outputs` a graph output.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct GraphLabels {
    /// Labels on chain input pads.
    pub inputs: PadRegistry,
    /// Labels on chain output pads.
    pub outputs: PadRegistry,
}

impl GraphLabels {
    /// Registries seeded from caller-supplied label maps.
    pub fn seeded(input_labels: &LabelMap, output_labels: &LabelMap) -> FfpipeResult<Self> {
        let mut labels = Self::default();
        for (label, pad) in input_labels {
            labels.inputs.assign(*pad, Some(label))?;
        }
        for (label, pad) in output_labels {
            labels.outputs.assign(*pad, Some(label))?;
        }
        Ok(labels)
    }

    /// Apply the declared downstream links of `chains`.
    fn link(&mut self, chains: &[ChainSpec]) -> FfpipeResult<()> {
        for (i, chain) in chains.iter().enumerate() {
            for (j, targets) in chain.links.iter().enumerate() {
                let label = self.outputs.assign(PadRef::new(i, j), None)?;
                for target in targets {
                    self.inputs.assign(*target, Some(&label))?;
                }
            }
        }
        Ok(())
    }

    fn check_chain_count(&self, nchains: usize) -> FfpipeResult<()> {
        let max = self.inputs.max_chain().max(self.outputs.max_chain());
        match max {
            Some(c) if c >= nchains => Err(FfpipeError::composition(format!(
                "pad label refers to chain #{c} but the graph has {nchains} chain(s)"
            ))),
            _ => Ok(()),
        }
    }
}

/// One chain of a graph: its filters and the downstream links of each output pad.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct ChainSpec {
    /// Filters in processing order.
    pub filters: Vec<FilterSpec>,
    /// `links[j]` lists the input pads fed by output pad `j`.
    pub links: Vec<Vec<PadRef>>,
}

impl ChainSpec {
    /// Chain without declared links.
    pub fn new<F: Into<FilterSpec>>(filters: impl IntoIterator<Item = F>) -> Self {
        Self {
            filters: filters.into_iter().map(Into::into).collect(),
            links: Vec::new(),
        }
    }

    /// Declare the targets of the next output pad.
    pub fn link<P: Into<PadRef>>(mut self, targets: impl IntoIterator<Item = P>) -> Self {
        self.links.push(targets.into_iter().map(Into::into).collect());
        self
    }
}

/// Compose a complex filtergraph from chains, their links and boundary labels.
pub fn compose_graph(
    chains: &[ChainSpec],
    input_labels: &LabelMap,
    output_labels: &LabelMap,
) -> FfpipeResult<String> {
    let mut labels = GraphLabels::seeded(input_labels, output_labels)?;
    labels.link(chains)?;
    labels.check_chain_count(chains.len())?;
    Ok(render(chains, &labels))
}

fn render(chains: &[ChainSpec], labels: &GraphLabels) -> String {
    chains
        .iter()
        .enumerate()
        .map(|(i, chain)| {
            let heads = labels.inputs.chain_slots(i);
            let tails = labels.outputs.chain_slots(i);
            if heads.iter().chain(tails.iter()).any(String::is_empty) {
                tracing::warn!(chain = i, "non-contiguous pad labels; emitting empty slots");
            }
            compose_chain(&chain.filters, &heads, &tails)
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// A filtergraph: chains plus their pad-label registries.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct Filtergraph {
    /// Chains in emission order.
    pub chains: Vec<ChainSpec>,
    /// Pad-label bookkeeping.
    pub labels: GraphLabels,
}

impl Filtergraph {
    /// Parse a filtergraph description.
    pub fn parse(expr: &str) -> FfpipeResult<Self> {
        parse_graph(expr)
    }

    /// Number of chains.
    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    /// Graph-input labels mapped to the pad that consumes them.
    pub fn input_labels(&self) -> LabelMap {
        self.labels.inputs.to_label_map()
    }

    /// Graph-output labels mapped to the pad that produces them.
    pub fn output_labels(&self) -> LabelMap {
        self.labels.outputs.to_label_map()
    }

    /// Render back to filtergraph text, applying any declared chain links.
    pub fn compose(&self) -> FfpipeResult<String> {
        let mut labels = self.labels.clone();
        labels.link(&self.chains)?;
        labels.check_chain_count(self.chains.len())?;
        Ok(render(&self.chains, &labels))
    }

    /// [`trace_graph_downstream`], additionally rejecting labels bound to missing chains.
    pub fn trace_downstream(&self, start_label: &str, allow_split: bool) -> FfpipeResult<Vec<String>> {
        trace(&self.labels, Some(self.chains.len()), start_label, allow_split)
    }

    /// Splice `new_chain` onto the link named `insert_at` and return the fresh label created
    /// for the newly exposed side.
    ///
    /// With `keep_output_label` the producing pad keeps `insert_at` and the new chain emits the
    /// fresh label towards the former consumers; otherwise the consuming pads keep `insert_at`
    /// and the new chain takes the fresh label from the former producer. A graph input (no
    /// producer) is always spliced the first way.
    pub fn extend_chain(
        &mut self,
        new_chain: ChainSpec,
        insert_at: &str,
        keep_output_label: bool,
    ) -> FfpipeResult<String> {
        let src = self.labels.outputs.get(insert_at);
        let dst = self.labels.inputs.pads(insert_at);
        if src.is_none() && dst.is_empty() {
            return Err(FfpipeError::graph(format!(
                "label '{insert_at}' is not bound to any pad"
            )));
        }

        let cid = self.chains.len();
        let new_label = self.fresh_label(cid);
        let new_pad = PadRef::new(cid, 0);
        self.chains.push(new_chain);

        // a graph input has no producer to hand the fresh label to
        if keep_output_label || src.is_none() {
            // src -[insert_at]-> new -[new_label]-> dst
            self.labels.inputs.rebind(insert_at, new_pad);
            self.labels.outputs.rebind(&new_label, new_pad);
            for pad in dst {
                self.labels.inputs.slots.insert(pad, new_label.clone());
            }
        } else {
            // src -[new_label]-> new -[insert_at]-> dst
            self.labels.outputs.rebind(insert_at, new_pad);
            self.labels.inputs.rebind(&new_label, new_pad);
            if let Some(pad) = src {
                self.labels.outputs.rebind(&new_label, pad);
            }
        }

        tracing::debug!(chain = cid, label = %new_label, insert_at, keep_output_label, "extended filtergraph");
        Ok(new_label)
    }

    fn fresh_label(&self, cid: usize) -> String {
        let taken = |l: &str| self.labels.inputs.contains(l) || self.labels.outputs.contains(l);
        let base = format!("L{cid}");
        if !taken(&base) {
            return base;
        }
        (1..)
            .map(|n| format!("L{cid}.{n}"))
            .find(|l| !taken(l))
            .unwrap_or(base)
    }
}

/// Splice `new_chain` into `graph`; see [`Filtergraph::extend_chain`].
pub fn extend_chain(
    graph: &mut Filtergraph,
    new_chain: ChainSpec,
    insert_at: &str,
    keep_output_label: bool,
) -> FfpipeResult<String> {
    graph.extend_chain(new_chain, insert_at, keep_output_label)
}

/// Parse a filtergraph description into chains and pad-label registries.
///
/// Chains are split on unescaped `;`. The leading run of `[label]` groups of each chain binds
/// input pads and the trailing run binds output pads, both in appearance order. Empty labels
/// (`[]`) reserve their pad without binding it.
#[tracing::instrument(level = "debug", skip_all, fields(len = expr.len()))]
pub fn parse_graph(expr: &str) -> FfpipeResult<Filtergraph> {
    let mut graph = Filtergraph::default();
    for (i, text) in split_unescaped(expr, ';').into_iter().enumerate() {
        if text.trim().is_empty() {
            return Err(FfpipeError::graph(format!("filter chain #{i} is empty")));
        }
        let (heads, rest) = take_leading_labels(text)?;
        let (body, tails) = take_trailing_labels(rest)?;

        for (j, label) in heads.iter().enumerate() {
            if !label.is_empty() {
                graph.labels.inputs.assign(PadRef::new(i, j), Some(label))?;
            }
        }
        for (j, label) in tails.iter().enumerate() {
            if !label.is_empty() {
                graph.labels.outputs.assign(PadRef::new(i, j), Some(label))?;
            }
        }

        graph.chains.push(ChainSpec {
            filters: split_chain(body),
            links: Vec::new(),
        });
    }
    Ok(graph)
}

fn take_leading_labels(text: &str) -> FfpipeResult<(Vec<String>, &str)> {
    let mut labels = Vec::new();
    let mut rest = text.trim_start();
    while let Some(after) = rest.strip_prefix('[') {
        let end = after.find(']').ok_or_else(|| {
            FfpipeError::graph(format!("unterminated pad label in '{text}'"))
        })?;
        labels.push(after[..end].to_string());
        rest = after[end + 1..].trim_start();
    }
    Ok((labels, rest))
}

fn take_trailing_labels(text: &str) -> FfpipeResult<(&str, Vec<String>)> {
    let mut labels = Vec::new();
    let mut rest = text.trim_end();
    while rest.ends_with(']') && !is_escaped_at(rest, rest.len() - 1) {
        let close = rest.len() - 1;
        let open = rfind_unescaped(&rest[..close], '[').ok_or_else(|| {
            FfpipeError::graph(format!("unbalanced pad label in '{text}'"))
        })?;
        labels.push(rest[open + 1..close].to_string());
        rest = rest[..open].trim_end();
    }
    labels.reverse();
    Ok((rest, labels))
}

fn rfind_unescaped(s: &str, c: char) -> Option<usize> {
    let mut end = s.len();
    while let Some(i) = s[..end].rfind(c) {
        if !is_escaped_at(s, i) {
            return Some(i);
        }
        end = i;
    }
    None
}

/// Follow `start_label` downstream to the graph output label(s) it ends up feeding.
///
/// A chain with several output labels is a split: with `allow_split` every branch is traced and
/// the results flattened, otherwise it is an error. A consumer chain without registered outputs
/// is an error.
pub fn trace_graph_downstream(
    labels: &GraphLabels,
    start_label: &str,
    allow_split: bool,
) -> FfpipeResult<Vec<String>> {
    trace(labels, None, start_label, allow_split)
}

fn trace(
    labels: &GraphLabels,
    nchains: Option<usize>,
    start_label: &str,
    allow_split: bool,
) -> FfpipeResult<Vec<String>> {
    let mut out = Vec::new();
    trace_from(
        labels,
        nchains,
        start_label.to_string(),
        allow_split,
        BTreeSet::new(),
        &mut out,
    )?;
    let mut seen = BTreeSet::new();
    out.retain(|l| seen.insert(l.clone()));
    Ok(out)
}

fn trace_from(
    labels: &GraphLabels,
    nchains: Option<usize>,
    mut label: String,
    allow_split: bool,
    mut visited: BTreeSet<String>,
    out: &mut Vec<String>,
) -> FfpipeResult<()> {
    loop {
        let consumers = labels.inputs.pads(&label);
        if consumers.is_empty() {
            out.push(label);
            return Ok(());
        }
        if !visited.insert(label.clone()) {
            return Err(FfpipeError::graph(format!(
                "invalid filter graph (cycle through label '{label}')"
            )));
        }

        let chains: BTreeSet<usize> = consumers.iter().map(|p| p.chain).collect();
        let mut next = Vec::new();
        for chain in chains {
            if let Some(n) = nchains
                && chain >= n
            {
                return Err(FfpipeError::graph(format!(
                    "invalid filter graph (missing input link info for label '{label}')"
                )));
            }
            let outs = labels.outputs.chain_labels(chain);
            if outs.is_empty() {
                return Err(FfpipeError::graph(format!(
                    "invalid filter graph (missing output link of chain #{chain})"
                )));
            }
            next.extend(outs);
        }

        if next.len() == 1 {
            label = next.remove(0);
            continue;
        }
        if !allow_split {
            return Err(FfpipeError::graph(format!(
                "split in filter graph found downstream of label '{label}'"
            )));
        }
        for branch in next {
            trace_from(labels, nchains, branch, true, visited.clone(), out)?;
        }
        return Ok(());
    }
}

#[cfg(test)]
#[path = "../../tests/unit/filtergraph/graph.rs"]
mod tests;
