//! Entity interfaces and the collection-interface transform
//!
//! An [`Interface`] is an ordered list of declared input and output fields.
//! Declaration order matters: the fan-out width is taken from the first
//! mapped (non-bound) input encountered in declaration order.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::value::ValueType;

/// A single declared interface field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field name
    pub name: String,

    /// Declared type
    pub ty: ValueType,
}

/// Declared interface of an invocable entity
///
/// Field order is declaration order and is preserved through the
/// collection transform.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Interface {
    inputs: SmallVec<[Field; 4]>,
    outputs: SmallVec<[Field; 1]>,
}

impl Interface {
    /// Create an empty interface
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a declared input field
    pub fn input(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.inputs.push(Field {
            name: name.into(),
            ty,
        });
        self
    }

    /// Append a declared output field
    pub fn output(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.outputs.push(Field {
            name: name.into(),
            ty,
        });
        self
    }

    /// Declared inputs, in declaration order
    pub fn inputs(&self) -> &[Field] {
        &self.inputs
    }

    /// Declared outputs, in declaration order
    pub fn outputs(&self) -> &[Field] {
        &self.outputs
    }

    /// Look up a declared input type by name
    pub fn input_type(&self, name: &str) -> Option<&ValueType> {
        self.inputs.iter().find(|f| f.name == name).map(|f| &f.ty)
    }

    /// The single declared output, if the entity declares exactly one
    pub fn single_output(&self) -> Option<&Field> {
        match self.outputs.as_slice() {
            [field] => Some(field),
            _ => None,
        }
    }

    /// Derive the collection interface advertised by a fan-out construct.
    ///
    /// Every input not in `bound` becomes a collection of its declared
    /// type; bound inputs keep their scalar type. The single output becomes
    /// a collection of its type, element-wise Optional-wrapped when
    /// `optional_output` is set (partial tolerance configured). The
    /// receiver is never mutated.
    pub fn to_collection_interface(
        &self,
        bound: &HashSet<String>,
        optional_output: bool,
    ) -> Interface {
        let inputs = self
            .inputs
            .iter()
            .map(|f| {
                if bound.contains(&f.name) {
                    f.clone()
                } else {
                    Field {
                        name: f.name.clone(),
                        ty: ValueType::Collection(Box::new(f.ty.clone())),
                    }
                }
            })
            .collect();

        let outputs = self
            .outputs
            .iter()
            .map(|f| {
                let element = if optional_output {
                    ValueType::Optional(Box::new(f.ty.clone()))
                } else {
                    f.ty.clone()
                };
                Field {
                    name: f.name.clone(),
                    ty: ValueType::Collection(Box::new(element)),
                }
            })
            .collect();

        Interface { inputs, outputs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_interface() -> Interface {
        Interface::new()
            .input("x", ValueType::Integer)
            .input("factor", ValueType::Float)
            .output("o0", ValueType::Integer)
    }

    #[test]
    fn test_declaration_order_preserved() {
        let iface = scalar_interface();
        let names: Vec<_> = iface.inputs().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["x", "factor"]);
    }

    #[test]
    fn test_single_output() {
        let iface = scalar_interface();
        assert_eq!(iface.single_output().unwrap().name, "o0");

        let two = scalar_interface().output("o1", ValueType::Float);
        assert!(two.single_output().is_none());

        let none = Interface::new().input("x", ValueType::Integer);
        assert!(none.single_output().is_none());
    }

    #[test]
    fn test_collection_transform_maps_unbound_inputs() {
        let iface = scalar_interface();
        let derived = iface.to_collection_interface(&HashSet::new(), false);

        assert_eq!(
            derived.input_type("x"),
            Some(&ValueType::Collection(Box::new(ValueType::Integer)))
        );
        assert_eq!(
            derived.input_type("factor"),
            Some(&ValueType::Collection(Box::new(ValueType::Float)))
        );
        assert_eq!(
            derived.single_output().unwrap().ty,
            ValueType::Collection(Box::new(ValueType::Integer))
        );
    }

    #[test]
    fn test_collection_transform_leaves_bound_inputs() {
        let iface = scalar_interface();
        let bound: HashSet<String> = ["factor".to_string()].into_iter().collect();
        let derived = iface.to_collection_interface(&bound, false);

        assert_eq!(derived.input_type("factor"), Some(&ValueType::Float));
        assert_eq!(
            derived.input_type("x"),
            Some(&ValueType::Collection(Box::new(ValueType::Integer)))
        );
    }

    #[test]
    fn test_collection_transform_optional_output() {
        let iface = scalar_interface();
        let derived = iface.to_collection_interface(&HashSet::new(), true);

        assert_eq!(
            derived.single_output().unwrap().ty,
            ValueType::Collection(Box::new(ValueType::Optional(Box::new(ValueType::Integer))))
        );
    }

    #[test]
    fn test_transform_does_not_mutate_source() {
        let iface = scalar_interface();
        let _ = iface.to_collection_interface(&HashSet::new(), true);
        assert_eq!(iface.input_type("x"), Some(&ValueType::Integer));
    }

    #[test]
    fn test_void_interface_transform() {
        let iface = Interface::new().input("x", ValueType::Integer);
        let derived = iface.to_collection_interface(&HashSet::new(), false);
        assert!(derived.outputs().is_empty());
    }
}
