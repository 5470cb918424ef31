//! Building a graph from decoders
//!
//! Input arguments become Parameters, output arguments become Results and every other
//! decoder becomes a node of its op type. Producers are built before their consumers
//! regardless of descriptor order. Any reference that does not resolve fails the
//! whole conversion; no partial graph is returned.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::{OptResult, TransformError};
use crate::graph::ops::{self, infer_outputs};
use crate::graph::{AttributeValue, Attributes, Graph, Node, NodeRef, Output};
use crate::tensor::{ElementType, PartialShape, TensorDesc};

use super::argdef::ArgRole;
use super::decoder::{Decoder, OpTypeByName};

/// Decoder for a plain operator descriptor
#[derive(Debug, Clone)]
pub struct NodeDefDecoder {
    name: String,
    op_type: String,
    inputs: Vec<String>,
    attributes: Attributes,
    output_size: usize,
}

impl NodeDefDecoder {
    /// Operator `name` of type `op_type` reading the producer references `inputs`.
    ///
    /// References starting with `^` are control dependencies and carry no data.
    pub fn new<I, S>(name: impl Into<String>, op_type: impl Into<String>, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            op_type: op_type.into(),
            inputs: inputs
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.starts_with('^'))
                .collect(),
            attributes: Attributes::new(),
            output_size: 1,
        }
    }

    /// Add an attribute
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the number of outputs
    pub fn with_output_size(mut self, output_size: usize) -> Self {
        self.output_size = output_size;
        self
    }
}

impl Decoder for NodeDefDecoder {
    fn op_type(&self) -> &str {
        &self.op_type
    }

    fn op_name(&self) -> &str {
        &self.name
    }

    fn input_size(&self) -> usize {
        self.inputs.len()
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn get_input_node(
        &self,
        port: usize,
        op_type_by_name: Option<&OpTypeByName>,
    ) -> OptResult<(String, usize)> {
        let text = self.inputs.get(port).ok_or_else(|| {
            TransformError::internal(
                super::decoder::FRONTEND,
                format!("`{}` has no input {}", self.name, port),
            )
        })?;
        super::decoder::parse_producer_name(text, op_type_by_name)
    }

    fn get_attribute(&self, name: &str) -> OptResult<AttributeValue> {
        self.attributes.get(name).cloned().ok_or_else(|| {
            TransformError::internal(
                super::decoder::FRONTEND,
                format!("`{}` has no attribute `{}`", self.name, name),
            )
        })
    }

    fn attribute_names(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }
}

/// Graph under construction
struct Builder<'a> {
    decoders: FxHashMap<&'a str, &'a dyn Decoder>,
    op_type_by_name: OpTypeByName,
    built: FxHashMap<String, NodeRef>,
    in_progress: FxHashSet<String>,
}

/// Descriptor whose producers are being built; `port` is the next input to visit
struct Frame<'a> {
    decoder: &'a dyn Decoder,
    port: usize,
}

impl<'a> Builder<'a> {
    fn decoder(&self, name: &str) -> OptResult<&'a dyn Decoder> {
        self.decoders
            .get(name)
            .copied()
            .ok_or_else(|| TransformError::InvalidGraph(format!("no descriptor named `{}`", name)))
    }

    /// Build `name` and everything it reads.
    ///
    /// Producers are visited depth-first on an explicit stack, so long chains of
    /// descriptors do not grow the call stack.
    fn build(&mut self, name: &str) -> OptResult<NodeRef> {
        if let Some(node) = self.built.get(name) {
            return Ok(node.clone());
        }
        let root = self.decoder(name)?;
        self.in_progress.insert(name.to_string());
        let mut stack = vec![Frame {
            decoder: root,
            port: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let decoder = frame.decoder;
            if frame.port < decoder.input_size() {
                let port = frame.port;
                frame.port += 1;

                let producer = self.producer_name(decoder, port)?;
                if self.built.contains_key(&producer) {
                    continue;
                }
                if !self.in_progress.insert(producer.clone()) {
                    return Err(TransformError::CycleDetected { node: producer });
                }
                let next = self.decoder(&producer)?;
                stack.push(Frame {
                    decoder: next,
                    port: 0,
                });
                continue;
            }

            // Every producer of the top frame is built
            let inputs = self.resolve_inputs(decoder)?;
            let node = self.make_node(decoder, inputs)?;
            node.set_friendly_name(decoder.op_name());
            self.in_progress.remove(decoder.op_name());
            self.built.insert(decoder.op_name().to_string(), node);
            stack.pop();
        }

        self.built
            .get(name)
            .cloned()
            .ok_or_else(|| TransformError::internal(super::decoder::FRONTEND, "build lost its root"))
    }

    /// Producer named by input `port`, which must be a known descriptor
    fn producer_name(&self, decoder: &dyn Decoder, port: usize) -> OptResult<String> {
        let (producer, _) = decoder.get_input_node(port, Some(&self.op_type_by_name))?;
        if !self.decoders.contains_key(producer.as_str()) {
            return Err(TransformError::UnresolvedReference {
                node: decoder.op_name().to_string(),
                producer,
            });
        }
        Ok(producer)
    }

    /// Outputs feeding `decoder`; its producers are already built
    fn resolve_inputs(&self, decoder: &dyn Decoder) -> OptResult<Vec<Output>> {
        let mut inputs = Vec::with_capacity(decoder.input_size());
        for port in 0..decoder.input_size() {
            let (producer, index) = decoder.get_input_node(port, Some(&self.op_type_by_name))?;
            let node = self.built.get(&producer).ok_or_else(|| TransformError::UnresolvedReference {
                node: decoder.op_name().to_string(),
                producer: producer.clone(),
            })?;
            let output = node.output(index).ok_or_else(|| TransformError::DanglingReference {
                node: producer.clone(),
                port: index,
            })?;
            inputs.push(output);
        }
        Ok(inputs)
    }

    fn make_node(&self, decoder: &dyn Decoder, inputs: Vec<Output>) -> OptResult<NodeRef> {
        if decoder.op_type() == ArgRole::Input.op_type() {
            let element_type = decoder
                .get_attribute("type")?
                .as_type()
                .unwrap_or(ElementType::Dynamic);
            return Ok(ops::parameter(element_type, PartialShape::dynamic()));
        }
        if decoder.op_type() == ArgRole::Output.op_type() {
            let input = inputs.into_iter().next().ok_or_else(|| {
                TransformError::InvalidNode(format!("`{}` reads nothing", decoder.op_name()))
            })?;
            return Ok(ops::result(input));
        }

        let mut attributes = Attributes::new();
        for name in decoder.attribute_names() {
            let value = decoder.get_attribute(&name)?;
            attributes.insert(name, value);
        }

        let input_descs: Vec<TensorDesc> = inputs.iter().map(Output::desc).collect();
        let outputs = match infer_outputs(decoder.op_type(), &attributes, &input_descs) {
            Some(inferred) => inferred?,
            None => vec![TensorDesc::dynamic(); decoder.output_size()],
        };
        Ok(Node::new(decoder.op_type(), inputs, outputs, attributes))
    }
}

/// Build a graph from operator descriptors.
///
/// Parameters and Results keep descriptor order. Descriptors nothing reads are
/// dropped with the rest of the unreachable nodes.
pub fn convert_model(decoders: &[&dyn Decoder]) -> OptResult<Graph> {
    let mut builder = Builder {
        decoders: FxHashMap::default(),
        op_type_by_name: OpTypeByName::default(),
        built: FxHashMap::default(),
        in_progress: FxHashSet::default(),
    };
    for &decoder in decoders {
        if builder.decoders.insert(decoder.op_name(), decoder).is_some() {
            return Err(TransformError::InvalidGraph(format!(
                "duplicate descriptor name `{}`",
                decoder.op_name()
            )));
        }
        builder
            .op_type_by_name
            .insert(decoder.op_name().to_string(), decoder.op_type().to_string());
    }

    let mut parameters = Vec::new();
    let mut results = Vec::new();
    for &decoder in decoders {
        let node = builder.build(decoder.op_name())?;
        if decoder.op_type() == ArgRole::Input.op_type() {
            parameters.push(node);
        } else if decoder.op_type() == ArgRole::Output.op_type() {
            results.push(node);
        }
    }

    let graph = Graph::new(results, parameters)?;
    debug!(
        descriptors = decoders.len(),
        nodes = graph.node_count(),
        "model converted"
    );
    Ok(graph)
}
