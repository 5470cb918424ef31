//! Decoder for function argument definitions
//!
//! A function signature declares input arguments (entry points without a producer)
//! and output arguments (each reading exactly one producer). Both are exposed as
//! decoders so the graph builder treats them like any other operator.

use crate::error::{OptResult, TransformError};
use crate::graph::AttributeValue;
use crate::tensor::ElementType;

use super::decoder::{parse_producer_name, Decoder, OpTypeByName, FRONTEND};

/// Which side of the signature an argument is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgRole {
    /// Entry point; becomes a Parameter
    Input,
    /// Exit point; becomes a Result
    Output,
}

impl ArgRole {
    /// Op type exposed by decoders of this role
    pub fn op_type(self) -> &'static str {
        match self {
            ArgRole::Input => "input_arg",
            ArgRole::Output => "output_arg",
        }
    }
}

/// Argument definition decoder
#[derive(Debug, Clone)]
pub struct ArgDefDecoder {
    role: ArgRole,
    name: String,
    element_type: ElementType,
    producer: Option<String>,
}

impl ArgDefDecoder {
    /// Input argument `name` of type `element_type`
    pub fn input(name: impl Into<String>, element_type: ElementType) -> Self {
        Self {
            role: ArgRole::Input,
            name: name.into(),
            element_type,
            producer: None,
        }
    }

    /// Output argument `name` reading the producer reference `producer`
    pub fn output(
        name: impl Into<String>,
        element_type: ElementType,
        producer: impl Into<String>,
    ) -> Self {
        Self {
            role: ArgRole::Output,
            name: name.into(),
            element_type,
            producer: Some(producer.into()),
        }
    }

    /// Build from a textual op type (`input_arg` or `output_arg`)
    pub fn from_op_type(
        op_type: &str,
        name: impl Into<String>,
        element_type: ElementType,
        producer: Option<String>,
    ) -> OptResult<Self> {
        match (op_type, producer) {
            ("input_arg", None) => Ok(Self::input(name, element_type)),
            ("output_arg", Some(producer)) => Ok(Self::output(name, element_type, producer)),
            _ => Err(TransformError::internal(
                FRONTEND,
                "Incorrect use of ArgDefDecoder: expected `input_arg` without a producer \
                 or `output_arg` with one",
            )),
        }
    }

    /// Role of the argument
    pub fn role(&self) -> ArgRole {
        self.role
    }

    /// Declared element type
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }
}

impl Decoder for ArgDefDecoder {
    fn op_type(&self) -> &str {
        self.role.op_type()
    }

    fn op_name(&self) -> &str {
        &self.name
    }

    fn input_size(&self) -> usize {
        match self.role {
            ArgRole::Input => 0,
            ArgRole::Output => 1,
        }
    }

    fn get_input_node(
        &self,
        port: usize,
        op_type_by_name: Option<&OpTypeByName>,
    ) -> OptResult<(String, usize)> {
        let producer = match (&self.role, &self.producer) {
            (ArgRole::Output, Some(producer)) => producer,
            _ => {
                return Err(TransformError::RoleMismatch {
                    arg: self.name.clone(),
                    accessor: "get_input_node".to_string(),
                })
            }
        };
        if port != 0 {
            return Err(TransformError::internal(
                FRONTEND,
                format!("Output argument `{}` has no input {}", self.name, port),
            ));
        }
        parse_producer_name(producer, op_type_by_name)
    }

    fn get_attribute(&self, name: &str) -> OptResult<AttributeValue> {
        if name != "type" {
            return Err(TransformError::internal(
                FRONTEND,
                format!(
                    "ArgDefDecoder supports only `type` attribute, `{}` requested on `{}`",
                    name, self.name
                ),
            ));
        }
        Ok(AttributeValue::Type(self.element_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_arg() {
        let arg = ArgDefDecoder::input("x", ElementType::F32);

        assert_eq!(arg.op_type(), "input_arg");
        assert_eq!(arg.op_name(), "x");
        assert_eq!(arg.input_size(), 0);
        assert_eq!(
            arg.get_attribute("type").unwrap(),
            AttributeValue::Type(ElementType::F32)
        );

        let err = arg.get_input_node(0, None).unwrap_err();
        assert_eq!(
            err,
            TransformError::RoleMismatch {
                arg: "x".to_string(),
                accessor: "get_input_node".to_string(),
            }
        );
    }

    #[test]
    fn test_output_arg() {
        let arg = ArgDefDecoder::output("y", ElementType::I64, "body:z:2");

        assert_eq!(arg.op_type(), "output_arg");
        assert_eq!(arg.input_size(), 1);
        assert_eq!(arg.get_input_node(0, None).unwrap(), ("body".to_string(), 2));
        assert!(arg.get_input_node(1, None).is_err());
    }

    #[test]
    fn test_only_type_attribute_is_supported() {
        let arg = ArgDefDecoder::input("x", ElementType::F32);
        let err = arg.get_attribute("shape").unwrap_err();

        assert!(matches!(err, TransformError::Internal { .. }));
        assert!(err.to_string().contains("only `type` attribute"));
    }

    #[test]
    fn test_from_op_type() {
        let arg = ArgDefDecoder::from_op_type("output_arg", "y", ElementType::F32, Some("a".into()))
            .unwrap();
        assert_eq!(arg.role(), ArgRole::Output);

        let err = ArgDefDecoder::from_op_type("Relu", "r", ElementType::F32, None).unwrap_err();
        assert!(err.to_string().contains("Incorrect use of ArgDefDecoder"));
        assert!(ArgDefDecoder::from_op_type("input_arg", "x", ElementType::F32, Some("a".into()))
            .is_err());
    }
}
