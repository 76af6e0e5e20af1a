//! Method signatures
//!
//! Signatures carry custom modifiers on the return type and on each parameter.
//! Two comparisons exist:
//!
//! - exact (`==`), modifiers included
//! - relaxed (`parameters_match_relaxed`), ignoring modifiers and the return
//!   type, which is what override lookup and partial-method pairing use

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the error type produced when a type could not be bound
pub const ERROR_TYPE_NAME: &str = "?";

/// A (possibly modifier-qualified) type reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_modifiers: Vec<String>,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            custom_modifiers: Vec::new(),
        }
    }

    pub fn void() -> Self {
        Self::named("void")
    }

    /// The type produced when binding failed
    pub fn error() -> Self {
        Self::named(ERROR_TYPE_NAME)
    }

    pub fn is_error(&self) -> bool {
        self.name == ERROR_TYPE_NAME
    }

    pub fn with_modifiers(mut self, modifiers: Vec<String>) -> Self {
        self.custom_modifiers = modifiers;
        self
    }

    /// Same type, ignoring custom modifiers
    pub fn matches_relaxed(&self, other: &TypeRef) -> bool {
        self.name == other.name
    }

    /// Generic shape of the type: `Task<int>` becomes `Task<T>` and
    /// `Pair<int, string>` becomes `Pair<T1, T2>`.
    pub fn shape(&self) -> String {
        let Some(open) = self.name.find('<') else {
            return self.name.clone();
        };
        let base = &self.name[..open];
        let inner = self.name[open + 1..].trim_end_matches('>');

        let mut depth = 0usize;
        let mut arity = 1usize;
        for ch in inner.chars() {
            match ch {
                '<' => depth += 1,
                '>' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => arity += 1,
                _ => {}
            }
        }

        if arity == 1 {
            format!("{}<T>", base)
        } else {
            let params: Vec<String> = (1..=arity).map(|i| format!("T{}", i)).collect();
            format!("{}<{}>", base, params.join(", "))
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.custom_modifiers {
            write!(f, "modopt({}) ", modifier)?;
        }
        f.write_str(&self.name)
    }
}

/// How a parameter is passed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    #[default]
    None,
    Ref,
    Out,
    In,
}

impl RefKind {
    pub fn is_by_ref(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Ref => Some("ref"),
            Self::Out => Some("out"),
            Self::In => Some("in"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub ref_kind: RefKind,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            ref_kind: RefKind::None,
        }
    }

    pub fn with_ref_kind(mut self, ref_kind: RefKind) -> Self {
        self.ref_kind = ref_kind;
        self
    }
}

/// Parameters, return type and vararg flag of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub return_type: TypeRef,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub is_vararg: bool,
}

impl Signature {
    pub fn new(return_type: TypeRef, parameters: Vec<Parameter>) -> Self {
        Self {
            return_type,
            parameters,
            is_vararg: false,
        }
    }

    /// Signature used when nothing could be bound
    pub fn error() -> Self {
        Self::new(TypeRef::error(), Vec::new())
    }

    /// Same parameter list ignoring custom modifiers: equal arity, vararg flag,
    /// parameter types and ref kinds. Return types are not compared.
    pub fn parameters_match_relaxed(&self, other: &Signature) -> bool {
        self.is_vararg == other.is_vararg
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.ref_kind == b.ref_kind && a.ty.matches_relaxed(&b.ty))
    }

    /// Replace this signature's custom modifiers with those of `source`,
    /// position by position. Call only after `parameters_match_relaxed`.
    pub fn borrow_modifiers_from(&mut self, source: &Signature) {
        if self.return_type.matches_relaxed(&source.return_type) {
            self.return_type.custom_modifiers = source.return_type.custom_modifiers.clone();
        }
        for (mine, theirs) in self.parameters.iter_mut().zip(&source.parameters) {
            mine.ty.custom_modifiers = theirs.ty.custom_modifiers.clone();
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.return_type)?;
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if let Some(keyword) = parameter.ref_kind.keyword() {
                write!(f, "{} ", keyword)?;
            }
            write!(f, "{} {}", parameter.ty, parameter.name)?;
        }
        if self.is_vararg {
            if !self.parameters.is_empty() {
                f.write_str(", ")?;
            }
            f.write_str("__arglist")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(params: &[(&str, &[&str])]) -> Signature {
        Signature::new(
            TypeRef::void(),
            params
                .iter()
                .enumerate()
                .map(|(i, (ty, mods))| {
                    Parameter::new(
                        format!("p{}", i),
                        TypeRef::named(*ty).with_modifiers(mods.iter().map(|m| m.to_string()).collect()),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_shape_of_generic_types() {
        assert_eq!(TypeRef::named("Task").shape(), "Task");
        assert_eq!(TypeRef::named("Task<int>").shape(), "Task<T>");
        assert_eq!(
            TypeRef::named("Task<Dictionary<string, int>>").shape(),
            "Task<T>"
        );
        assert_eq!(TypeRef::named("Pair<int, string>").shape(), "Pair<T1, T2>");
    }

    #[test]
    fn test_relaxed_match_ignores_modifiers() {
        let plain = sig(&[("int", &[])]);
        let qualified = sig(&[("int", &["IsConst"])]);
        assert!(plain.parameters_match_relaxed(&qualified));
        assert_ne!(plain, qualified);
        assert!(!plain.parameters_match_relaxed(&sig(&[("long", &[])])));
        assert!(!plain.parameters_match_relaxed(&sig(&[])));
    }

    #[test]
    fn test_relaxed_match_respects_ref_kind() {
        let by_value = sig(&[("int", &[])]);
        let mut by_ref = by_value.clone();
        by_ref.parameters[0].ref_kind = RefKind::Ref;
        assert!(!by_value.parameters_match_relaxed(&by_ref));
    }

    #[test]
    fn test_borrow_modifiers_copies_positionally() {
        let mut provisional = sig(&[("int", &[]), ("string", &[])]);
        let overridden = sig(&[("int", &["IsVolatile"]), ("string", &[])]);
        provisional.borrow_modifiers_from(&overridden);
        assert_eq!(provisional, overridden);
    }

    #[test]
    fn test_display() {
        let mut s = Signature::new(
            TypeRef::named("int"),
            vec![Parameter::new("x", TypeRef::named("int")).with_ref_kind(RefKind::Ref)],
        );
        s.is_vararg = true;
        assert_eq!(s.to_string(), "int (ref int x, __arglist)");
    }
}
