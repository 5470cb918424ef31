//! Decoder interface
//!
//! A decoder exposes one serialized operator descriptor to
//! [`convert_model`](crate::frontend::convert_model): its op type, its name, where its
//! inputs come from and its attributes. Producers are referenced by text (`name`, `name:port`
//! or `name:tag:port`), resolved with [`parse_producer_name`].

use rustc_hash::FxHashMap;

use crate::error::{OptResult, TransformError};
use crate::graph::AttributeValue;

/// Component name used in frontend errors
pub const FRONTEND: &str = "Frontend";

/// Producer name to op type, used to resolve tagged output references
pub type OpTypeByName = FxHashMap<String, String>;

/// One serialized operator descriptor
pub trait Decoder: Send + Sync {
    /// Op type of the descriptor
    fn op_type(&self) -> &str;

    /// Unique name of the descriptor
    fn op_name(&self) -> &str;

    /// Number of data inputs
    fn input_size(&self) -> usize;

    /// Number of outputs
    fn output_size(&self) -> usize {
        1
    }

    /// Producer name and output port feeding input `port`
    fn get_input_node(
        &self,
        port: usize,
        op_type_by_name: Option<&OpTypeByName>,
    ) -> OptResult<(String, usize)>;

    /// Typed attribute `name`
    fn get_attribute(&self, name: &str) -> OptResult<AttributeValue>;

    /// Names of the attributes carried over to the built node
    fn attribute_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Output tags of multi-output ops, in port order
fn output_tags(op_type: &str) -> Option<&'static [&'static str]> {
    match op_type {
        "Unique" => Some(&["y", "idx"]),
        "TopKV2" => Some(&["values", "indices"]),
        "Switch" => Some(&["output_false", "output_true"]),
        "Split" | "SplitV" | "Unpack" | "Identity" | "NonZero" => Some(&["output"]),
        _ => None,
    }
}

fn parse_port(text: &str, port: &str) -> OptResult<usize> {
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TransformError::internal(
            FRONTEND,
            format!("Port index of producer reference `{}` is not a number", text),
        ));
    }
    port.parse().map_err(|_| {
        TransformError::internal(
            FRONTEND,
            format!("Port index of producer reference `{}` is out of range", text),
        )
    })
}

/// Split a producer reference into producer name and output port.
///
/// - `name` reads port 0
/// - `name:port` reads `port`
/// - `name:tag:port` is a body-graph reference. When `op_type_by_name` knows the
///   producer's op type and that type has named outputs, `tag` must be one of them and
///   the port counts from that output; otherwise the tag is ignored.
pub fn parse_producer_name(
    text: &str,
    op_type_by_name: Option<&OpTypeByName>,
) -> OptResult<(String, usize)> {
    let mut fields = text.split(':');
    let name = fields.next().unwrap_or_default();
    if name.is_empty() {
        return Err(TransformError::internal(
            FRONTEND,
            format!("Producer reference `{}` has no producer name", text),
        ));
    }

    match (fields.next(), fields.next(), fields.next()) {
        (None, _, _) => Ok((name.to_string(), 0)),
        (Some(port), None, _) => Ok((name.to_string(), parse_port(text, port)?)),
        (Some(tag), Some(port), None) => {
            let port = parse_port(text, port)?;
            let tags = op_type_by_name
                .and_then(|table| table.get(name))
                .and_then(|op_type| output_tags(op_type));

            match tags {
                Some(tags) => match tags.iter().position(|t| *t == tag) {
                    Some(base) => Ok((name.to_string(), base + port)),
                    None => Err(TransformError::internal(
                        FRONTEND,
                        format!("Unknown output tag `{}` in producer reference `{}`", tag, text),
                    )),
                },
                None => Ok((name.to_string(), port)),
            }
        }
        _ => Err(TransformError::internal(
            FRONTEND,
            format!("Producer reference `{}` has too many fields", text),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("relu", "relu", 0 ; "bare_name")]
    #[test_case("relu:0", "relu", 0 ; "explicit_port")]
    #[test_case("split:2", "split", 2 ; "second_output")]
    #[test_case("body:z:3", "body", 3 ; "body_graph_reference")]
    fn test_parse_producer_name(text: &str, name: &str, port: usize) {
        assert_eq!(
            parse_producer_name(text, None).unwrap(),
            (name.to_string(), port)
        );
    }

    #[test_case("relu:x" ; "non_numeric_port")]
    #[test_case("relu:" ; "empty_port")]
    #[test_case(":1" ; "empty_name")]
    #[test_case("a:b:c:1" ; "too_many_fields")]
    fn test_parse_producer_name_rejects(text: &str) {
        let err = parse_producer_name(text, None).unwrap_err();
        assert!(matches!(err, TransformError::Internal { .. }));
    }

    #[test]
    fn test_tagged_reference_with_lookup_table() {
        let mut table = OpTypeByName::default();
        table.insert("uniq".to_string(), "Unique".to_string());

        assert_eq!(
            parse_producer_name("uniq:idx:0", Some(&table)).unwrap(),
            ("uniq".to_string(), 1)
        );
        assert!(parse_producer_name("uniq:bogus:0", Some(&table)).is_err());

        // Producers of unknown type keep the raw port
        assert_eq!(
            parse_producer_name("call:output:2", Some(&table)).unwrap(),
            ("call".to_string(), 2)
        );
    }
}
