//! Nodes, edges and consumer tracking
//!
//! A node owns its inputs (`Arc` edges to producers) and keeps a non-owning list of
//! consumers per output port (`Weak` back-references). Consumer lists are kept exact:
//! rewiring updates both ends, and a dropped node removes itself from its producers.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::error::{OptResult, TransformError};
use crate::tensor::{ElementType, PartialShape, TensorDesc};

use super::attributes::{AttributeValue, Attributes};
use super::ops::infer_outputs;

/// Shared handle to a node
pub type NodeRef = Arc<Node>;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Node identity, allocated in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw creation sequence number
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Back-reference from an output port to one consuming input
#[derive(Debug, Clone)]
pub(crate) struct ConsumerEntry {
    pub(crate) node: Weak<Node>,
    pub(crate) id: NodeId,
    pub(crate) input_index: usize,
}

#[derive(Debug, Clone)]
struct OutputSlot {
    desc: TensorDesc,
    consumers: SmallVec<[ConsumerEntry; 4]>,
}

/// An operation instance
pub struct Node {
    id: NodeId,
    op_type: String,
    friendly_name: RwLock<String>,
    attributes: RwLock<Attributes>,
    inputs: RwLock<SmallVec<[Output; 4]>>,
    outputs: RwLock<Vec<OutputSlot>>,
}

impl Node {
    /// Create a node and register it as a consumer of its inputs.
    ///
    /// `Output` values can only be obtained for existing ports, so every input
    /// reference is valid by construction. Output descriptors are taken as given;
    /// use [`NodeBuilder`] or the constructors in [`super::ops`] to have them inferred.
    pub fn new(
        op_type: impl Into<String>,
        inputs: Vec<Output>,
        outputs: Vec<TensorDesc>,
        attributes: Attributes,
    ) -> NodeRef {
        let op_type = op_type.into();
        let id = NodeId::next();

        let node = Arc::new(Node {
            id,
            friendly_name: RwLock::new(format!("{}_{}", op_type, id)),
            op_type,
            attributes: RwLock::new(attributes),
            inputs: RwLock::new(inputs.iter().cloned().collect()),
            outputs: RwLock::new(
                outputs
                    .into_iter()
                    .map(|desc| OutputSlot {
                        desc,
                        consumers: SmallVec::new(),
                    })
                    .collect(),
            ),
        });

        let weak = Arc::downgrade(&node);
        for (input_index, input) in inputs.iter().enumerate() {
            input.node.add_consumer(
                input.index,
                ConsumerEntry {
                    node: weak.clone(),
                    id,
                    input_index,
                },
            );
        }

        node
    }

    /// Start building a node of the given op type
    pub fn builder(op_type: impl Into<String>) -> NodeBuilder {
        NodeBuilder::new(op_type)
    }

    // ========================================================================
    // Identity and facts
    // ========================================================================

    /// Creation-ordered identity
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Op-kind tag
    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    /// Check the op-kind tag
    pub fn is_type(&self, op_type: &str) -> bool {
        self.op_type == op_type
    }

    /// Display name
    pub fn friendly_name(&self) -> String {
        self.friendly_name.read().clone()
    }

    /// Set the display name
    pub fn set_friendly_name(&self, name: impl Into<String>) {
        *self.friendly_name.write() = name.into();
    }

    /// Snapshot of all attributes
    pub fn attributes(&self) -> Attributes {
        self.attributes.read().clone()
    }

    /// Get one attribute
    pub fn attribute(&self, name: &str) -> Option<AttributeValue> {
        self.attributes.read().get(name).cloned()
    }

    /// Check if an attribute is present
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.read().contains_key(name)
    }

    /// Set or update an attribute
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.write().insert(name.into(), value.into());
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    /// Number of inputs
    pub fn input_count(&self) -> usize {
        self.inputs.read().len()
    }

    /// Producer output feeding input `index`
    pub fn input_value(&self, index: usize) -> Option<Output> {
        self.inputs.read().get(index).cloned()
    }

    /// Producer outputs feeding every input, in order
    pub fn input_values(&self) -> Vec<Output> {
        self.inputs.read().iter().cloned().collect()
    }

    /// Producer node of input `index`
    pub fn input_node(&self, index: usize) -> Option<NodeRef> {
        self.inputs.read().get(index).map(|o| o.node.clone())
    }

    // ========================================================================
    // Outputs
    // ========================================================================

    /// Number of outputs
    pub fn output_count(&self) -> usize {
        self.outputs.read().len()
    }

    /// Output port `index`, if it exists
    pub fn output(self: &Arc<Self>, index: usize) -> Option<Output> {
        if index < self.output_count() {
            Some(Output {
                node: Arc::clone(self),
                index,
            })
        } else {
            None
        }
    }

    /// All output ports
    pub fn outputs(self: &Arc<Self>) -> Vec<Output> {
        (0..self.output_count())
            .map(|index| Output {
                node: Arc::clone(self),
                index,
            })
            .collect()
    }

    /// Descriptor of output `index`
    pub fn output_desc(&self, index: usize) -> Option<TensorDesc> {
        self.outputs.read().get(index).map(|s| s.desc.clone())
    }

    /// Descriptors of all outputs
    pub fn output_descs(&self) -> Vec<TensorDesc> {
        self.outputs.read().iter().map(|s| s.desc.clone()).collect()
    }

    /// Element type of output `index` (dynamic when the port does not exist)
    pub fn element_type(&self, index: usize) -> ElementType {
        self.outputs
            .read()
            .get(index)
            .map(|s| s.desc.element_type)
            .unwrap_or_default()
    }

    /// Shape of output `index` (dynamic when the port does not exist)
    pub fn shape(&self, index: usize) -> PartialShape {
        self.outputs
            .read()
            .get(index)
            .map(|s| s.desc.shape.clone())
            .unwrap_or_default()
    }

    // ========================================================================
    // Consumers
    // ========================================================================

    /// Live consumers of output `port`
    pub fn consumers(&self, port: usize) -> Vec<Input> {
        self.outputs
            .read()
            .get(port)
            .map(|slot| {
                slot.consumers
                    .iter()
                    .filter_map(|c| {
                        c.node.upgrade().map(|node| Input {
                            node,
                            index: c.input_index,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of consumers of output `port`
    pub fn consumer_count(&self, port: usize) -> usize {
        self.outputs
            .read()
            .get(port)
            .map(|slot| slot.consumers.len())
            .unwrap_or(0)
    }

    /// Number of consumers over every output
    pub fn total_consumer_count(&self) -> usize {
        self.outputs.read().iter().map(|s| s.consumers.len()).sum()
    }

    /// Whether `(consumer, input_index)` is registered on output `port`
    pub(crate) fn has_consumer_entry(&self, port: usize, consumer: NodeId, input_index: usize) -> bool {
        self.outputs
            .read()
            .get(port)
            .map(|slot| {
                slot.consumers
                    .iter()
                    .any(|c| c.id == consumer && c.input_index == input_index)
            })
            .unwrap_or(false)
    }

    /// Raw consumer entries of output `port`, including ones that no longer upgrade
    pub(crate) fn consumer_entries(&self, port: usize) -> Vec<ConsumerEntry> {
        self.outputs
            .read()
            .get(port)
            .map(|slot| slot.consumers.to_vec())
            .unwrap_or_default()
    }

    fn add_consumer(&self, port: usize, entry: ConsumerEntry) {
        if let Some(slot) = self.outputs.write().get_mut(port) {
            slot.consumers.push(entry);
        }
    }

    fn remove_consumer(&self, port: usize, consumer: NodeId, input_index: usize) {
        if let Some(slot) = self.outputs.write().get_mut(port) {
            slot.consumers
                .retain(|c| !(c.id == consumer && c.input_index == input_index));
        }
    }

    /// Point input `input_index` at `source`, keeping both consumer lists exact.
    ///
    /// Callers check the edit against graph invariants first; this never fails.
    pub(crate) fn set_input(self: &Arc<Self>, input_index: usize, source: Output) {
        let previous = {
            let mut inputs = self.inputs.write();
            match inputs.get_mut(input_index) {
                Some(slot) => std::mem::replace(slot, source.clone()),
                None => return,
            }
        };

        previous
            .node
            .remove_consumer(previous.index, self.id, input_index);
        source.node.add_consumer(
            source.index,
            ConsumerEntry {
                node: Arc::downgrade(self),
                id: self.id,
                input_index,
            },
        );
        // `previous` is released here and may take its producer with it
    }
}

/// Unregister `consumer` from its producers and queue the released edges.
fn detach_inputs(consumer: NodeId, inputs: &mut SmallVec<[Output; 4]>, pending: &mut Vec<Output>) {
    for (input_index, input) in std::mem::take(inputs).into_iter().enumerate() {
        input.node.remove_consumer(input.index, consumer, input_index);
        pending.push(input);
    }
}

impl Drop for Node {
    /// Releases the producer chain with a worklist, so dropping a deep graph
    /// uses constant stack.
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach_inputs(self.id, self.inputs.get_mut(), &mut pending);

        while let Some(edge) = pending.pop() {
            // Last strong edge: empty the producer here so its own drop is shallow
            if let Some(mut producer) = Arc::into_inner(edge.node) {
                let id = producer.id;
                detach_inputs(id, producer.inputs.get_mut(), &mut pending);
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("op_type", &self.op_type)
            .field("name", &*self.friendly_name.read())
            .finish()
    }
}

/// One output port of a node; the strong edge held by consumers
#[derive(Clone)]
pub struct Output {
    node: NodeRef,
    index: usize,
}

impl Output {
    /// Producer node
    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    /// Port index on the producer
    pub fn index(&self) -> usize {
        self.index
    }

    /// Descriptor of this port
    pub fn desc(&self) -> TensorDesc {
        self.node.output_desc(self.index).unwrap_or_default()
    }

    /// Element type of this port
    pub fn element_type(&self) -> ElementType {
        self.node.element_type(self.index)
    }

    /// Shape of this port
    pub fn shape(&self) -> PartialShape {
        self.node.shape(self.index)
    }

    /// Live consumers of this port
    pub fn consumers(&self) -> Vec<Input> {
        self.node.consumers(self.index)
    }

    /// Number of consumers of this port
    pub fn consumer_count(&self) -> usize {
        self.node.consumer_count(self.index)
    }
}

impl PartialEq for Output {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node) && self.index == other.index
    }
}

impl Eq for Output {}

impl Hash for Output {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.id().hash(state);
        self.index.hash(state);
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node.friendly_name(), self.index)
    }
}

impl From<&NodeRef> for Output {
    /// Port 0 of the node. Every node built through this crate has at least one output.
    fn from(node: &NodeRef) -> Self {
        Output {
            node: Arc::clone(node),
            index: 0,
        }
    }
}

impl From<NodeRef> for Output {
    fn from(node: NodeRef) -> Self {
        Output { node, index: 0 }
    }
}

impl From<&Output> for Output {
    fn from(output: &Output) -> Self {
        output.clone()
    }
}

/// One input port of a consumer node
#[derive(Clone)]
pub struct Input {
    node: NodeRef,
    index: usize,
}

impl Input {
    /// Consumer node
    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    /// Input index on the consumer
    pub fn index(&self) -> usize {
        self.index
    }

    /// Producer output this input reads
    pub fn source_output(&self) -> Option<Output> {
        self.node.input_value(self.index)
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<-{}", self.node.friendly_name(), self.index)
    }
}

/// Builder for nodes of arbitrary op type
#[derive(Debug)]
pub struct NodeBuilder {
    op_type: String,
    name: Option<String>,
    inputs: Vec<Output>,
    outputs: Vec<TensorDesc>,
    attributes: Attributes,
}

impl NodeBuilder {
    /// Create a builder
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            name: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    /// Append an input
    pub fn input(mut self, value: impl Into<Output>) -> Self {
        self.inputs.push(value.into());
        self
    }

    /// Append several inputs
    pub fn inputs<I, O>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Output>,
    {
        self.inputs.extend(values.into_iter().map(Into::into));
        self
    }

    /// Declare an output explicitly
    pub fn output(mut self, desc: TensorDesc) -> Self {
        self.outputs.push(desc);
        self
    }

    /// Set an attribute
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the display name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Build the node.
    ///
    /// Without declared outputs the descriptors are inferred for built-in op types;
    /// unknown op types must declare at least one output.
    pub fn build(self) -> OptResult<NodeRef> {
        let outputs = if self.outputs.is_empty() {
            let input_descs: Vec<TensorDesc> = self.inputs.iter().map(|o| o.desc()).collect();
            match infer_outputs(&self.op_type, &self.attributes, &input_descs) {
                Some(inferred) => inferred?,
                None => {
                    return Err(TransformError::InvalidNode(format!(
                        "op `{}` has no declared outputs and no type inference",
                        self.op_type
                    )))
                }
            }
        } else {
            self.outputs
        };

        if outputs.is_empty() {
            return Err(TransformError::InvalidNode(format!(
                "op `{}` must produce at least one output",
                self.op_type
            )));
        }

        let node = Node::new(self.op_type, self.inputs, outputs, self.attributes);
        if let Some(name) = self.name {
            node.set_friendly_name(name);
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ops;

    #[test]
    fn test_consumers_are_tracked() {
        let param = ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(4));
        let relu_a = ops::relu(&param);
        let relu_b = ops::relu(&param);

        assert_eq!(param.consumer_count(0), 2);
        let consumers: Vec<NodeId> = param.consumers(0).iter().map(|c| c.node().id()).collect();
        assert!(consumers.contains(&relu_a.id()));
        assert!(consumers.contains(&relu_b.id()));
    }

    #[test]
    fn test_drop_removes_consumer_entry() {
        let param = ops::parameter(ElementType::F32, PartialShape::dynamic());
        let relu = ops::relu(&param);
        assert_eq!(param.consumer_count(0), 1);

        drop(relu);
        assert_eq!(param.consumer_count(0), 0);
    }

    #[test]
    fn test_dropping_deep_chain_uses_constant_stack() {
        let param = ops::parameter(ElementType::F32, PartialShape::dynamic_of_rank(2));
        let side = ops::relu(&param);

        let mut tail = ops::relu(&param);
        for _ in 0..200_000 {
            tail = ops::relu(&tail);
        }
        assert_eq!(param.consumer_count(0), 2);

        drop(tail);

        // The whole chain is gone; the producer shared with `side` is intact
        assert_eq!(param.consumer_count(0), 1);
        assert_eq!(param.consumers(0)[0].node().id(), side.id());
        assert_eq!(side.input_value(0).unwrap().node().id(), param.id());
    }

    #[test]
    fn test_set_input_rewires_both_ends() {
        let a = ops::parameter(ElementType::F32, PartialShape::dynamic());
        let b = ops::parameter(ElementType::F32, PartialShape::dynamic());
        let relu = ops::relu(&a);

        relu.set_input(0, Output::from(&b));

        assert_eq!(a.consumer_count(0), 0);
        assert_eq!(b.consumer_count(0), 1);
        assert!(Arc::ptr_eq(relu.input_node(0).as_ref().unwrap(), &b));
    }

    #[test]
    fn test_ids_follow_creation_order() {
        let a = ops::parameter(ElementType::F32, PartialShape::dynamic());
        let b = ops::relu(&a);
        assert!(a.id() < b.id());
    }

    #[test]
    fn test_output_port_bounds() {
        let param = ops::parameter(ElementType::I64, PartialShape::scalar());
        assert!(param.output(0).is_some());
        assert!(param.output(1).is_none());
        assert_eq!(param.element_type(0), ElementType::I64);
    }

    #[test]
    fn test_builder_infers_known_ops() {
        let param = ops::parameter(ElementType::F32, PartialShape::from_static(&[2, 3]));
        let relu = Node::builder("Relu").input(&param).name("act").build().unwrap();
        assert_eq!(relu.friendly_name(), "act");
        assert_eq!(relu.output_desc(0).unwrap(), param.output_desc(0).unwrap());
    }

    #[test]
    fn test_builder_unknown_op_requires_outputs() {
        let param = ops::parameter(ElementType::F32, PartialShape::dynamic());
        assert!(Node::builder("CustomOp").input(&param).build().is_err());

        let custom = Node::builder("CustomOp")
            .input(&param)
            .output(TensorDesc::dynamic())
            .attr("alpha", 0.5)
            .build()
            .unwrap();
        assert_eq!(custom.attribute("alpha"), Some(AttributeValue::Float(0.5)));
    }
}
