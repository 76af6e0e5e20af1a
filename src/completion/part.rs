//! Completion parts
//!
//! A `CompletionPart` is a set of bits drawn from one ordered enumeration that
//! every symbol kind shares. The bit order is the canonical completion order:
//! the driver always works on the lowest incomplete bit first.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use serde::{Serialize, Serializer};

/// Ordered, flags-style set of completion parts
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct CompletionPart(u32);

impl CompletionPart {
    /// No parts
    pub const NONE: Self = Self(0);

    /// Declared attributes bound and decoded
    pub const ATTRIBUTES: Self = Self(1 << 0);
    /// Referenced-assembly validation claimed by a thread (modules)
    pub const START_VALIDATING_REFERENCED_ASSEMBLIES: Self = Self(1 << 1);
    /// Referenced-assembly validation finished and published (modules)
    pub const FINISH_VALIDATING_REFERENCED_ASSEMBLIES: Self = Self(1 << 2);
    /// Ordinary signature checks claimed by a thread (methods)
    pub const START_METHOD_CHECKS: Self = Self(1 << 3);
    /// Ordinary signature checks finished and published (methods)
    pub const FINISH_METHOD_CHECKS: Self = Self(1 << 4);
    /// Async shape checks claimed by a thread (methods)
    pub const START_ASYNC_METHOD_CHECKS: Self = Self(1 << 5);
    /// Async shape checks finished and published (methods)
    pub const FINISH_ASYNC_METHOD_CHECKS: Self = Self(1 << 6);
    /// Constant value evaluated and its diagnostics published (locals)
    pub const CONSTANT_VALUE: Self = Self(1 << 7);
    /// Name lookup table built (namespaces)
    pub const NAME_TO_MEMBERS_MAP: Self = Self(1 << 8);
    /// Every child fully completed (composite symbols)
    pub const MEMBERS_COMPLETED: Self = Self(1 << 9);

    /// Every defined part
    pub const ALL: Self = Self((1 << 10) - 1);

    /// Both halves of the referenced-assembly validation pair
    pub const VALIDATING_REFERENCED_ASSEMBLIES: Self = Self(
        Self::START_VALIDATING_REFERENCED_ASSEMBLIES.0
            | Self::FINISH_VALIDATING_REFERENCED_ASSEMBLIES.0,
    );
    /// Both halves of the ordinary method checks pair
    pub const METHOD_CHECKS: Self =
        Self(Self::START_METHOD_CHECKS.0 | Self::FINISH_METHOD_CHECKS.0);
    /// Both halves of the async method checks pair
    pub const ASYNC_METHOD_CHECKS: Self =
        Self(Self::START_ASYNC_METHOD_CHECKS.0 | Self::FINISH_ASYNC_METHOD_CHECKS.0);

    const NAMES: [(Self, &'static str); 10] = [
        (Self::ATTRIBUTES, "Attributes"),
        (
            Self::START_VALIDATING_REFERENCED_ASSEMBLIES,
            "StartValidatingReferencedAssemblies",
        ),
        (
            Self::FINISH_VALIDATING_REFERENCED_ASSEMBLIES,
            "FinishValidatingReferencedAssemblies",
        ),
        (Self::START_METHOD_CHECKS, "StartMethodChecks"),
        (Self::FINISH_METHOD_CHECKS, "FinishMethodChecks"),
        (Self::START_ASYNC_METHOD_CHECKS, "StartAsyncMethodChecks"),
        (Self::FINISH_ASYNC_METHOD_CHECKS, "FinishAsyncMethodChecks"),
        (Self::CONSTANT_VALUE, "ConstantValue"),
        (Self::NAME_TO_MEMBERS_MAP, "NameToMembersMap"),
        (Self::MEMBERS_COMPLETED, "MembersCompleted"),
    ];

    /// Build from raw bits, dropping bits outside `ALL`
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Raw bit representation
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when no bits are set
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is also set in `self`
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when `self` and `other` share at least one bit
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Bits of `self` that are not in `other`
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Lowest (earliest in canonical order) bit of `self`, or `NONE`
    pub const fn lowest(self) -> Self {
        Self(self.0 & self.0.wrapping_neg())
    }

    /// Iterate over the single-bit parts of this set in canonical order
    pub fn iter(self) -> impl Iterator<Item = CompletionPart> {
        Self::NAMES
            .into_iter()
            .map(|(part, _)| part)
            .filter(move |part| self.contains(*part))
    }

    /// Name of a single-bit part, if it is one
    pub fn name(self) -> Option<&'static str> {
        Self::NAMES
            .iter()
            .find(|(part, _)| *part == self)
            .map(|(_, name)| *name)
    }
}

impl BitOr for CompletionPart {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for CompletionPart {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for CompletionPart {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for CompletionPart {
    type Output = Self;

    fn not(self) -> Self {
        Self::ALL.difference(self)
    }
}

impl fmt::Debug for CompletionPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("None");
        }
        if *self == Self::ALL {
            return f.write_str("All");
        }
        let mut first = true;
        for part in self.iter() {
            if !first {
                f.write_str(" | ")?;
            }
            first = false;
            f.write_str(part.name().unwrap_or("?"))?;
        }
        Ok(())
    }
}

impl fmt::Display for CompletionPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Serialize for CompletionPart {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
