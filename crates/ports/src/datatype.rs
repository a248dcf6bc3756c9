//! The closed data-type algebra ports are drawn from.
//!
//! `any` is both bottom and top of the primitive lattice: an `any` source
//! connects to anything, and an `any` target accepts anything. Contract types
//! are nominal — compatibility is by name plus the credential flag, never
//! structural.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Names of the primitive port types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    /// Wildcard — compatible with every primitive in both directions.
    Any,
    /// UTF-8 text.
    Text,
    /// IEEE-754 number.
    Number,
    /// Boolean.
    Boolean,
    /// Secret value — redacted from logs and summaries.
    Secret,
    /// Reference to a stored file.
    File,
    /// Arbitrary JSON document.
    Json,
}

impl PrimitiveType {
    /// All primitives, lattice order with `any` first.
    pub const ALL: [Self; 7] = [
        Self::Any,
        Self::Text,
        Self::Number,
        Self::Boolean,
        Self::Secret,
        Self::File,
        Self::Json,
    ];

    /// The wire name of this primitive.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Text => "text",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Secret => "secret",
            Self::File => "file",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A port's data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataType {
    /// A primitive type, optionally widened by a declared coercion set.
    Primitive {
        /// Which primitive.
        name: PrimitiveType,
        /// Additional primitives this port accepts by declared coercion.
        #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
        coercion_from: BTreeSet<PrimitiveType>,
    },
    /// Homogeneous list.
    List {
        /// Element type.
        element: Box<DataType>,
    },
    /// String-keyed map with homogeneous values.
    Map {
        /// Value type.
        value: Box<DataType>,
    },
    /// Nominal shared-schema type (e.g. an LLM provider payload).
    Contract {
        /// Schema name the contract is identified by.
        name: String,
        /// Whether the payload carries credential material.
        #[serde(default)]
        credential: bool,
    },
}

impl DataType {
    /// A plain primitive with no declared coercions.
    #[must_use]
    pub fn primitive(name: PrimitiveType) -> Self {
        Self::Primitive {
            name,
            coercion_from: BTreeSet::new(),
        }
    }

    /// The `any` wildcard.
    #[must_use]
    pub fn any() -> Self {
        Self::primitive(PrimitiveType::Any)
    }

    /// Text.
    #[must_use]
    pub fn text() -> Self {
        Self::primitive(PrimitiveType::Text)
    }

    /// Number.
    #[must_use]
    pub fn number() -> Self {
        Self::primitive(PrimitiveType::Number)
    }

    /// Boolean.
    #[must_use]
    pub fn boolean() -> Self {
        Self::primitive(PrimitiveType::Boolean)
    }

    /// Secret.
    #[must_use]
    pub fn secret() -> Self {
        Self::primitive(PrimitiveType::Secret)
    }

    /// File reference.
    #[must_use]
    pub fn file() -> Self {
        Self::primitive(PrimitiveType::File)
    }

    /// Arbitrary JSON.
    #[must_use]
    pub fn json() -> Self {
        Self::primitive(PrimitiveType::Json)
    }

    /// A primitive that also accepts the given source primitives.
    #[must_use]
    pub fn primitive_coercible(
        name: PrimitiveType,
        from: impl IntoIterator<Item = PrimitiveType>,
    ) -> Self {
        Self::Primitive {
            name,
            coercion_from: from.into_iter().collect(),
        }
    }

    /// List of `element`.
    #[must_use]
    pub fn list(element: DataType) -> Self {
        Self::List {
            element: Box::new(element),
        }
    }

    /// Map of `value`.
    #[must_use]
    pub fn map(value: DataType) -> Self {
        Self::Map {
            value: Box::new(value),
        }
    }

    /// Nominal contract type.
    #[must_use]
    pub fn contract(name: impl Into<String>, credential: bool) -> Self {
        Self::Contract {
            name: name.into(),
            credential,
        }
    }

    /// Returns `true` if this is the `any` wildcard.
    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(
            self,
            Self::Primitive {
                name: PrimitiveType::Any,
                ..
            }
        )
    }

    /// Returns `true` if this is a list type.
    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List { .. })
    }

    /// Returns `true` if this type carries secret material anywhere.
    #[must_use]
    pub fn contains_secret(&self) -> bool {
        match self {
            Self::Primitive { name, .. } => *name == PrimitiveType::Secret,
            Self::List { element } => element.contains_secret(),
            Self::Map { value } => value.contains_secret(),
            Self::Contract { credential, .. } => *credential,
        }
    }

    /// Connection compatibility: can a value of type `source` flow into a
    /// port of type `self`?
    ///
    /// Two ports are compatible iff source = target, or the target is `any`,
    /// or the source is `any`, or the target primitive lists the source in
    /// its coercion set, or both are lists/maps with compatible element
    /// types, or both are contracts with equal name and credential flag.
    #[must_use]
    pub fn accepts(&self, source: &DataType) -> bool {
        if self == source || self.is_any() || source.is_any() {
            return true;
        }
        match (self, source) {
            (
                Self::Primitive {
                    coercion_from: accepted,
                    ..
                },
                Self::Primitive { name: src, .. },
            ) => accepted.contains(src),
            (Self::List { element: target }, Self::List { element: src }) => target.accepts(src),
            (Self::Map { value: target }, Self::Map { value: src }) => target.accepts(src),
            (
                Self::Contract {
                    name: target,
                    credential: target_cred,
                },
                Self::Contract {
                    name: src,
                    credential: src_cred,
                },
            ) => target == src && target_cred == src_cred,
            _ => false,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive { name, .. } => write!(f, "{name}"),
            Self::List { element } => write!(f, "list<{element}>"),
            Self::Map { value } => write!(f, "map<{value}>"),
            Self::Contract { name, credential } => {
                if *credential {
                    write!(f, "contract<{name}, credential>")
                } else {
                    write!(f, "contract<{name}>")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn equal_types_are_compatible() {
        assert!(DataType::text().accepts(&DataType::text()));
        assert!(
            DataType::contract("llm.chat", false).accepts(&DataType::contract("llm.chat", false))
        );
    }

    #[test]
    fn any_target_accepts_everything() {
        let target = DataType::any();
        assert!(target.accepts(&DataType::text()));
        assert!(target.accepts(&DataType::list(DataType::number())));
        assert!(target.accepts(&DataType::contract("x", true)));
    }

    #[test]
    fn any_source_connects_everywhere() {
        assert!(DataType::number().accepts(&DataType::any()));
        assert!(DataType::list(DataType::text()).accepts(&DataType::any()));
    }

    #[test]
    fn mismatched_primitives_are_incompatible() {
        assert!(!DataType::number().accepts(&DataType::text()));
        assert!(!DataType::boolean().accepts(&DataType::file()));
    }

    #[test]
    fn declared_coercion_widens_target() {
        let target = DataType::primitive_coercible(PrimitiveType::Number, [PrimitiveType::Text]);
        assert!(target.accepts(&DataType::text()));
        assert!(!target.accepts(&DataType::boolean()));
    }

    #[test]
    fn lists_compare_element_wise() {
        assert!(DataType::list(DataType::text()).accepts(&DataType::list(DataType::text())));
        assert!(!DataType::list(DataType::number()).accepts(&DataType::list(DataType::text())));
        assert!(DataType::list(DataType::any()).accepts(&DataType::list(DataType::file())));
    }

    #[test]
    fn maps_compare_value_wise() {
        assert!(DataType::map(DataType::json()).accepts(&DataType::map(DataType::json())));
        assert!(!DataType::map(DataType::text()).accepts(&DataType::map(DataType::number())));
    }

    #[test]
    fn nested_coercion_applies_inside_lists() {
        let target = DataType::list(DataType::primitive_coercible(
            PrimitiveType::Number,
            [PrimitiveType::Text],
        ));
        assert!(target.accepts(&DataType::list(DataType::text())));
    }

    #[test]
    fn contracts_require_equal_name_and_flag() {
        let chat = DataType::contract("llm.chat", false);
        assert!(!chat.accepts(&DataType::contract("llm.embed", false)));
        assert!(!chat.accepts(&DataType::contract("llm.chat", true)));
    }

    #[test]
    fn list_is_not_compatible_with_scalar() {
        assert!(!DataType::list(DataType::text()).accepts(&DataType::text()));
        assert!(!DataType::text().accepts(&DataType::list(DataType::text())));
    }

    #[test]
    fn contains_secret_walks_structure() {
        assert!(DataType::secret().contains_secret());
        assert!(DataType::list(DataType::secret()).contains_secret());
        assert!(DataType::map(DataType::list(DataType::secret())).contains_secret());
        assert!(DataType::contract("provider.key", true).contains_secret());
        assert!(!DataType::text().contains_secret());
        assert!(!DataType::contract("llm.chat", false).contains_secret());
    }

    #[test]
    fn serde_tagged_shape() {
        let json = serde_json::to_value(DataType::text()).unwrap();
        assert_eq!(json, serde_json::json!({"type": "primitive", "name": "text"}));

        let json = serde_json::to_value(DataType::list(DataType::number())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "list", "element": {"type": "primitive", "name": "number"}})
        );
    }

    #[test]
    fn serde_roundtrip() {
        let types = [
            DataType::any(),
            DataType::primitive_coercible(PrimitiveType::Number, [PrimitiveType::Text]),
            DataType::list(DataType::map(DataType::json())),
            DataType::contract("llm.chat", true),
        ];
        for ty in &types {
            let json = serde_json::to_string(ty).unwrap();
            let back: DataType = serde_json::from_str(&json).unwrap();
            assert_eq!(ty, &back);
        }
    }

    #[test]
    fn display_formatting() {
        assert_eq!(DataType::text().to_string(), "text");
        assert_eq!(DataType::list(DataType::number()).to_string(), "list<number>");
        assert_eq!(
            DataType::map(DataType::list(DataType::any())).to_string(),
            "map<list<any>>"
        );
        assert_eq!(
            DataType::contract("llm.chat", true).to_string(),
            "contract<llm.chat, credential>"
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_primitive() -> impl Strategy<Value = PrimitiveType> {
            proptest::sample::select(PrimitiveType::ALL.to_vec())
        }

        fn arb_type() -> impl Strategy<Value = DataType> {
            let leaf = prop_oneof![
                arb_primitive().prop_map(DataType::primitive),
                ("[a-z]{1,8}", any::<bool>())
                    .prop_map(|(name, credential)| DataType::contract(name, credential)),
            ];
            leaf.prop_recursive(3, 16, 2, |inner| {
                prop_oneof![
                    inner.clone().prop_map(DataType::list),
                    inner.prop_map(DataType::map),
                ]
            })
        }

        proptest! {
            #[test]
            fn accepts_is_reflexive(ty in arb_type()) {
                prop_assert!(ty.accepts(&ty));
            }

            #[test]
            fn any_is_top_and_bottom(ty in arb_type()) {
                prop_assert!(DataType::any().accepts(&ty));
                prop_assert!(ty.accepts(&DataType::any()));
            }

            #[test]
            fn serde_preserves_meaning(ty in arb_type()) {
                let json = serde_json::to_string(&ty).unwrap();
                let back: DataType = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(ty, back);
            }
        }
    }
}
