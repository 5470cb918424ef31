//! Built-in operations and their type inference
//!
//! Each op-kind is described by a tag, a typed attribute map and a pure inference
//! function from input descriptors to output descriptors. Op types without an
//! inference rule are still valid; their outputs are taken as declared.

use crate::error::{OptResult, TransformError};
use crate::tensor::{broadcast_shape, Dimension, ElementType, PartialShape, TensorDesc};

use super::attributes::Attributes;
use super::node::{Node, NodeRef, Output};

/// Op type tags of the built-in operations
pub mod op_types {
    /// Graph entry point
    pub const PARAMETER: &str = "Parameter";
    /// Graph output
    pub const RESULT: &str = "Result";
    /// Constant (descriptor only)
    pub const CONSTANT: &str = "Constant";
    /// Rectified linear unit
    pub const RELU: &str = "Relu";
    /// Pass-through
    pub const IDENTITY: &str = "Identity";
    /// Element type conversion
    pub const CONVERT: &str = "Convert";
    /// Indices of non-zero elements
    pub const NON_ZERO: &str = "NonZero";
    /// Element-wise addition with broadcasting
    pub const ADD: &str = "Add";
}

/// Attribute: element type of a Parameter/Constant
pub const ATTR_ELEMENT_TYPE: &str = "element_type";
/// Attribute: shape of a Parameter/Constant
pub const ATTR_SHAPE: &str = "shape";
/// Attribute: index type produced by NonZero
pub const ATTR_OUTPUT_TYPE: &str = "output_type";
/// Attribute: target type of Convert
pub const ATTR_DESTINATION_TYPE: &str = "destination_type";

fn expect_inputs(op_type: &str, inputs: &[TensorDesc], count: usize) -> OptResult<()> {
    if inputs.len() != count {
        return Err(TransformError::InvalidNode(format!(
            "{} expects {} input(s), got {}",
            op_type,
            count,
            inputs.len()
        )));
    }
    Ok(())
}

fn type_attr(op_type: &str, attrs: &Attributes, name: &str) -> OptResult<ElementType> {
    attrs
        .get(name)
        .and_then(|v| v.as_type())
        .ok_or_else(|| {
            TransformError::InvalidNode(format!("{} requires type attribute `{}`", op_type, name))
        })
}

/// Infer output descriptors of a built-in op.
///
/// Returns `None` for op types without an inference rule.
pub fn infer_outputs(
    op_type: &str,
    attrs: &Attributes,
    inputs: &[TensorDesc],
) -> Option<OptResult<Vec<TensorDesc>>> {
    let inferred = match op_type {
        op_types::PARAMETER | op_types::CONSTANT => infer_source(op_type, attrs, inputs),
        op_types::RESULT | op_types::RELU | op_types::IDENTITY => {
            expect_inputs(op_type, inputs, 1).map(|_| vec![inputs[0].clone()])
        }
        op_types::CONVERT => infer_convert(attrs, inputs),
        op_types::NON_ZERO => infer_non_zero(attrs, inputs),
        op_types::ADD => infer_add(inputs),
        _ => return None,
    };
    Some(inferred)
}

fn infer_source(op_type: &str, attrs: &Attributes, inputs: &[TensorDesc]) -> OptResult<Vec<TensorDesc>> {
    expect_inputs(op_type, inputs, 0)?;
    let element_type = type_attr(op_type, attrs, ATTR_ELEMENT_TYPE)?;
    let shape = attrs
        .get(ATTR_SHAPE)
        .and_then(|v| v.as_shape())
        .cloned()
        .unwrap_or_default();
    Ok(vec![TensorDesc::new(element_type, shape)])
}

fn infer_convert(attrs: &Attributes, inputs: &[TensorDesc]) -> OptResult<Vec<TensorDesc>> {
    expect_inputs(op_types::CONVERT, inputs, 1)?;
    let destination = type_attr(op_types::CONVERT, attrs, ATTR_DESTINATION_TYPE)?;
    Ok(vec![TensorDesc::new(destination, inputs[0].shape.clone())])
}

fn infer_non_zero(attrs: &Attributes, inputs: &[TensorDesc]) -> OptResult<Vec<TensorDesc>> {
    expect_inputs(op_types::NON_ZERO, inputs, 1)?;
    let output_type = type_attr(op_types::NON_ZERO, attrs, ATTR_OUTPUT_TYPE)?;
    if !matches!(output_type, ElementType::I32 | ElementType::I64) {
        return Err(TransformError::InvalidNode(format!(
            "NonZero output type must be i32 or i64, got {}",
            output_type
        )));
    }

    // [rank(input), number of non-zero elements]
    let rank = match inputs[0].shape.rank() {
        Some(r) => Dimension::Static(r as u64),
        None => Dimension::Dynamic,
    };
    Ok(vec![TensorDesc::new(
        output_type,
        PartialShape::Ranked(vec![rank, Dimension::Dynamic]),
    )])
}

fn infer_add(inputs: &[TensorDesc]) -> OptResult<Vec<TensorDesc>> {
    expect_inputs(op_types::ADD, inputs, 2)?;
    let element_type = inputs[0]
        .element_type
        .merge(inputs[1].element_type)
        .ok_or_else(|| TransformError::TypeMismatch {
            node: op_types::ADD.to_string(),
            port: 1,
            expected: inputs[0].element_type.to_string(),
            actual: inputs[1].element_type.to_string(),
        })?;
    let shape = broadcast_shape(&inputs[0].shape, &inputs[1].shape)?;
    Ok(vec![TensorDesc::new(element_type, shape)])
}

fn source_node(op_type: &str, element_type: ElementType, shape: PartialShape) -> NodeRef {
    let mut attrs = Attributes::new();
    attrs.insert(ATTR_ELEMENT_TYPE.to_string(), element_type.into());
    attrs.insert(ATTR_SHAPE.to_string(), shape.clone().into());
    Node::new(op_type, Vec::new(), vec![TensorDesc::new(element_type, shape)], attrs)
}

fn passthrough_node(op_type: &str, input: Output) -> NodeRef {
    let desc = input.desc();
    Node::new(op_type, vec![input], vec![desc], Attributes::new())
}

/// Graph entry point
pub fn parameter(element_type: ElementType, shape: PartialShape) -> NodeRef {
    source_node(op_types::PARAMETER, element_type, shape)
}

/// Constant placeholder (no data is held)
pub fn constant(element_type: ElementType, shape: PartialShape) -> NodeRef {
    source_node(op_types::CONSTANT, element_type, shape)
}

/// Graph output wrapping `input`
pub fn result(input: impl Into<Output>) -> NodeRef {
    passthrough_node(op_types::RESULT, input.into())
}

/// Relu of `input`
pub fn relu(input: impl Into<Output>) -> NodeRef {
    passthrough_node(op_types::RELU, input.into())
}

/// Identity of `input`
pub fn identity(input: impl Into<Output>) -> NodeRef {
    passthrough_node(op_types::IDENTITY, input.into())
}

/// Convert `input` to `destination`
pub fn convert(input: impl Into<Output>, destination: ElementType) -> NodeRef {
    let input = input.into();
    let shape = input.shape();
    let mut attrs = Attributes::new();
    attrs.insert(ATTR_DESTINATION_TYPE.to_string(), destination.into());
    Node::new(
        op_types::CONVERT,
        vec![input],
        vec![TensorDesc::new(destination, shape)],
        attrs,
    )
}

/// NonZero of `input` producing indices of `output_type` (i32 or i64)
pub fn non_zero(input: impl Into<Output>, output_type: ElementType) -> OptResult<NodeRef> {
    let input = input.into();
    let mut attrs = Attributes::new();
    attrs.insert(ATTR_OUTPUT_TYPE.to_string(), output_type.into());
    let outputs = infer_non_zero(&attrs, &[input.desc()])?;
    Ok(Node::new(op_types::NON_ZERO, vec![input], outputs, attrs))
}

/// Element-wise `a + b`
pub fn add(a: impl Into<Output>, b: impl Into<Output>) -> OptResult<NodeRef> {
    let (a, b) = (a.into(), b.into());
    let outputs = infer_add(&[a.desc(), b.desc()])?;
    Ok(Node::new(op_types::ADD, vec![a, b], outputs, Attributes::new()))
}
