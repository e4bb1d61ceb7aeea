//! Closed type-kind catalogue, runtime values, and conversion tables.
//!
//! The kind catalogue is configuration data: the directed conversion
//! legality relation and the per-kind default-construction values live in an
//! injectable [`KindTable`] whose `Default` impl carries the standard
//! catalogue.  Consumers never reach for open-ended dynamic typing; every
//! runtime value is a [`Value`] and every declared type is a [`TypeKind`].

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::errors::{PlugboardError, PlugboardResult};

// ---------------------------------------------------------------------------
// TypeKind
// ---------------------------------------------------------------------------

/// The closed set of declarable type kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Any,
    None,
    Bool,
    Int,
    Float,
    Str,
    List,
    Tuple,
    Set,
    Dict,
}

impl TypeKind {
    /// Parse a lowercase kind name.  Unknown names return `None`.
    pub fn parse(name: &str) -> Option<TypeKind> {
        match name {
            "any" => Some(TypeKind::Any),
            "none" => Some(TypeKind::None),
            "bool" => Some(TypeKind::Bool),
            "int" => Some(TypeKind::Int),
            "float" => Some(TypeKind::Float),
            "str" => Some(TypeKind::Str),
            "list" => Some(TypeKind::List),
            "tuple" => Some(TypeKind::Tuple),
            "set" => Some(TypeKind::Set),
            "dict" => Some(TypeKind::Dict),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TypeKind::Any => "any",
            TypeKind::None => "none",
            TypeKind::Bool => "bool",
            TypeKind::Int => "int",
            TypeKind::Float => "float",
            TypeKind::Str => "str",
            TypeKind::List => "list",
            TypeKind::Tuple => "tuple",
            TypeKind::Set => "set",
            TypeKind::Dict => "dict",
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            TypeKind::List | TypeKind::Tuple | TypeKind::Set | TypeKind::Dict
        )
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            TypeKind::Bool | TypeKind::Int | TypeKind::Float | TypeKind::Str
        )
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// Runtime value passed into and out of candidate callables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Insertion-ordered, deduplicated.
    Set(Vec<Value>),
    Dict(IndexMap<String, Value>),
}

impl Value {
    pub fn kind(&self) -> TypeKind {
        match self {
            Value::None => TypeKind::None,
            Value::Bool(_) => TypeKind::Bool,
            Value::Int(_) => TypeKind::Int,
            Value::Float(_) => TypeKind::Float,
            Value::Str(_) => TypeKind::Str,
            Value::List(_) => TypeKind::List,
            Value::Tuple(_) => TypeKind::Tuple,
            Value::Set(_) => TypeKind::Set,
            Value::Dict(_) => TypeKind::Dict,
        }
    }

    /// Element list of a container value, if the value is one.
    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) | Value::Tuple(v) | Value::Set(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("none"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::List(v) | Value::Tuple(v) | Value::Set(v) => {
                let parts: Vec<String> = v.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Dict(m) => {
                let parts: Vec<String> = m.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

fn dedup_in_order(values: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(values.len());
    for v in values {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// KindTable
// ---------------------------------------------------------------------------

/// Conversion legality relation and default-construction values.
///
/// Both tables are configuration data consumed by identification and
/// synthesis; neither is computed by the core.  The `Default` impl holds the
/// standard catalogue.
#[derive(Debug, Clone)]
pub struct KindTable {
    conversions: IndexMap<TypeKind, IndexSet<TypeKind>>,
    defaults: IndexMap<TypeKind, Value>,
}

impl Default for KindTable {
    fn default() -> Self {
        use TypeKind::*;
        let mut conversions: IndexMap<TypeKind, IndexSet<TypeKind>> = IndexMap::new();
        let scalar_targets = |extra: &[TypeKind]| -> IndexSet<TypeKind> {
            let mut set: IndexSet<TypeKind> = [Str, List, Tuple, Set].into_iter().collect();
            for k in extra {
                set.insert(*k);
            }
            set
        };
        conversions.insert(Bool, scalar_targets(&[Int, Float]));
        conversions.insert(Int, scalar_targets(&[Bool, Float]));
        conversions.insert(Float, scalar_targets(&[Bool, Int]));
        conversions.insert(Str, scalar_targets(&[Bool, Int, Float]));
        conversions.insert(List, [Tuple, Set, Str].into_iter().collect());
        conversions.insert(Tuple, [List, Set, Str].into_iter().collect());
        conversions.insert(Set, [List, Tuple, Str].into_iter().collect());
        conversions.insert(Dict, [List, Tuple, Set, Str].into_iter().collect());
        conversions.insert(TypeKind::None, [Str].into_iter().collect());

        let mut defaults: IndexMap<TypeKind, Value> = IndexMap::new();
        defaults.insert(TypeKind::None, Value::None);
        defaults.insert(Bool, Value::Bool(true));
        defaults.insert(Int, Value::Int(1));
        defaults.insert(Float, Value::Float(1.0));
        defaults.insert(Str, Value::Str(String::new()));
        defaults.insert(List, Value::List(vec![]));
        defaults.insert(Tuple, Value::Tuple(vec![]));
        defaults.insert(Set, Value::Set(vec![]));
        defaults.insert(Dict, Value::Dict(IndexMap::new()));

        KindTable {
            conversions,
            defaults,
        }
    }
}

impl KindTable {
    /// Whether a declared `from` kind may legally convert to `to`.
    ///
    /// `Any` as either side is always legal: an `any` target is skipped by
    /// the call pipeline, and an `any` source defers the check to runtime.
    pub fn can_convert(&self, from: TypeKind, to: TypeKind) -> bool {
        if to == TypeKind::Any || from == TypeKind::Any || from == to {
            return true;
        }
        self.conversions
            .get(&from)
            .is_some_and(|targets| targets.contains(&to))
    }

    /// Default-construction value for a kind.  Kinds without an entry fall
    /// back to `1`.
    pub fn default_value(&self, kind: TypeKind) -> Value {
        self.defaults.get(&kind).cloned().unwrap_or(Value::Int(1))
    }

    /// Convert a runtime value to the target kind.
    ///
    /// An `Any` target leaves the value untouched.  A scalar converted to a
    /// container-like kind is first wrapped as a single-element container
    /// before the kind constructor applies; this holds uniformly for
    /// parameter and return conversions.
    pub fn convert(&self, value: &Value, target: TypeKind) -> PlugboardResult<Value> {
        if target == TypeKind::Any || value.kind() == target {
            return Ok(value.clone());
        }
        match target {
            TypeKind::Str => Ok(Value::Str(value.to_string())),
            TypeKind::Bool => match value {
                Value::Int(i) => Ok(Value::Bool(*i != 0)),
                Value::Float(x) => Ok(Value::Bool(*x != 0.0)),
                Value::Str(s) => Ok(Value::Bool(!s.is_empty())),
                _ => Err(conversion_error(value, target)),
            },
            TypeKind::Int => match value {
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                Value::Float(x) => Ok(Value::Int(*x as i64)),
                Value::Str(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| conversion_error(value, target)),
                _ => Err(conversion_error(value, target)),
            },
            TypeKind::Float => match value {
                Value::Bool(b) => Ok(Value::Float(f64::from(u8::from(*b)))),
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Str(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| conversion_error(value, target)),
                _ => Err(conversion_error(value, target)),
            },
            TypeKind::List | TypeKind::Tuple | TypeKind::Set => {
                let elements: Vec<Value> = match value {
                    Value::List(v) | Value::Tuple(v) | Value::Set(v) => v.clone(),
                    Value::Dict(m) => m.keys().map(|k| Value::Str(k.clone())).collect(),
                    // Single-element wrapping for scalar sources.
                    other => vec![other.clone()],
                };
                Ok(construct_sequence(target, elements))
            }
            TypeKind::Dict | TypeKind::None | TypeKind::Any => {
                Err(conversion_error(value, target))
            }
        }
    }

    /// Construct a value of the given kind directly from input values, the
    /// way a `create` statement naming a built-in kind does.
    pub fn construct(&self, kind: TypeKind, inputs: Vec<Value>) -> PlugboardResult<Value> {
        match kind {
            TypeKind::List | TypeKind::Tuple | TypeKind::Set => {
                Ok(construct_sequence(kind, inputs))
            }
            TypeKind::Dict => {
                let mut map: IndexMap<String, Value> = IndexMap::new();
                for entry in inputs {
                    match entry {
                        Value::Tuple(pair) | Value::List(pair) if pair.len() == 2 => {
                            let key = match &pair[0] {
                                Value::Str(s) => s.clone(),
                                other => other.to_string(),
                            };
                            map.insert(key, pair[1].clone());
                        }
                        other => {
                            return Err(PlugboardError::Conversion(format!(
                                "dict construction expects key/value pairs, got {other}"
                            )))
                        }
                    }
                }
                Ok(Value::Dict(map))
            }
            scalar => match inputs.len() {
                0 => Ok(self.default_value(scalar)),
                1 => self.convert(&inputs[0], scalar),
                n => Err(PlugboardError::Conversion(format!(
                    "{scalar} construction takes at most one input, got {n}"
                ))),
            },
        }
    }
}

fn construct_sequence(kind: TypeKind, elements: Vec<Value>) -> Value {
    match kind {
        TypeKind::List => Value::List(elements),
        TypeKind::Tuple => Value::Tuple(elements),
        TypeKind::Set => Value::Set(dedup_in_order(elements)),
        _ => unreachable!("construct_sequence called with non-sequence kind"),
    }
}

fn conversion_error(value: &Value, target: TypeKind) -> PlugboardError {
    PlugboardError::Conversion(format!(
        "cannot convert {} value `{value}` to {target}",
        value.kind()
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_names() {
        for kind in [
            TypeKind::Any,
            TypeKind::None,
            TypeKind::Bool,
            TypeKind::Int,
            TypeKind::Float,
            TypeKind::Str,
            TypeKind::List,
            TypeKind::Tuple,
            TypeKind::Set,
            TypeKind::Dict,
        ] {
            assert_eq!(TypeKind::parse(kind.name()), Some(kind));
        }
        assert_eq!(TypeKind::parse("object"), None);
    }

    #[test]
    fn test_container_to_int_is_illegal() {
        let table = KindTable::default();
        assert!(!table.can_convert(TypeKind::List, TypeKind::Int));
        assert!(!table.can_convert(TypeKind::Dict, TypeKind::Int));
    }

    #[test]
    fn test_any_is_always_legal() {
        let table = KindTable::default();
        assert!(table.can_convert(TypeKind::List, TypeKind::Any));
        assert!(table.can_convert(TypeKind::Any, TypeKind::Int));
    }

    #[test]
    fn test_any_target_leaves_value_untouched() {
        let table = KindTable::default();
        let v = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(table.convert(&v, TypeKind::Any).unwrap(), v);
    }

    #[test]
    fn test_scalar_wraps_into_single_element_container() {
        let table = KindTable::default();
        assert_eq!(
            table.convert(&Value::Int(3), TypeKind::Set).unwrap(),
            Value::Set(vec![Value::Int(3)])
        );
        assert_eq!(
            table.convert(&Value::Str("ab".into()), TypeKind::List).unwrap(),
            Value::List(vec![Value::Str("ab".into())])
        );
    }

    #[test]
    fn test_set_conversion_dedupes_in_order() {
        let table = KindTable::default();
        let list = Value::List(vec![Value::Int(2), Value::Int(1), Value::Int(2)]);
        assert_eq!(
            table.convert(&list, TypeKind::Set).unwrap(),
            Value::Set(vec![Value::Int(2), Value::Int(1)])
        );
    }

    #[test]
    fn test_str_to_int_parses_or_fails() {
        let table = KindTable::default();
        assert_eq!(
            table.convert(&Value::Str(" 42 ".into()), TypeKind::Int).unwrap(),
            Value::Int(42)
        );
        assert!(table.convert(&Value::Str("abc".into()), TypeKind::Int).is_err());
    }

    #[test]
    fn test_default_value_falls_back_to_one() {
        let table = KindTable {
            conversions: IndexMap::new(),
            defaults: IndexMap::new(),
        };
        assert_eq!(table.default_value(TypeKind::Str), Value::Int(1));
    }

    #[test]
    fn test_standard_defaults() {
        let table = KindTable::default();
        assert_eq!(table.default_value(TypeKind::Str), Value::Str(String::new()));
        assert_eq!(table.default_value(TypeKind::Int), Value::Int(1));
    }

    #[test]
    fn test_construct_dict_from_pairs() {
        let table = KindTable::default();
        let pairs = vec![
            Value::Tuple(vec![Value::Str("a".into()), Value::Int(1)]),
            Value::Tuple(vec![Value::Str("b".into()), Value::Int(2)]),
        ];
        let dict = table.construct(TypeKind::Dict, pairs).unwrap();
        match dict {
            Value::Dict(m) => {
                assert_eq!(m.get("a"), Some(&Value::Int(1)));
                assert_eq!(m.get("b"), Some(&Value::Int(2)));
            }
            other => panic!("expected dict, got {other:?}"),
        }
    }
}
