///
/// FieldModel
/// Runtime field metadata: attribute column, classification and cascade policy.
///

#[derive(Debug)]
pub struct FieldModel {
    /// Field name as passed to `Entity::value` / `Entity::relation`.
    pub name: &'static str,
    /// Attribute name written to the store.
    pub column: &'static str,
    pub kind: FieldKind,
    pub cascade: CascadePolicy,
    /// Owning-side field name for inverse relations.
    pub mapped_by: Option<&'static str>,
}

impl FieldModel {
    const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            column: name,
            kind,
            cascade: CascadePolicy::NONE,
            mapped_by: None,
        }
    }

    #[must_use]
    pub const fn id(name: &'static str) -> Self {
        Self::new(name, FieldKind::Id)
    }

    #[must_use]
    pub const fn plain(name: &'static str) -> Self {
        Self::new(name, FieldKind::Plain)
    }

    #[must_use]
    pub const fn version(name: &'static str) -> Self {
        Self::new(name, FieldKind::Version)
    }

    #[must_use]
    pub const fn lob(name: &'static str) -> Self {
        Self::new(name, FieldKind::Lob)
    }

    #[must_use]
    pub const fn enumeration(
        name: &'static str,
        mode: EnumMode,
        variants: &'static [&'static str],
    ) -> Self {
        Self::new(name, FieldKind::Enum { mode, variants })
    }

    /// Single-valued reference to another entity.
    #[must_use]
    pub const fn many_to_one(name: &'static str, cascade: CascadePolicy) -> Self {
        Self::new(name, FieldKind::ForeignKey { many: false }).with_cascade(cascade)
    }

    /// Multi-valued reference, one attribute value per referenced id.
    #[must_use]
    pub const fn many_to_many(name: &'static str, cascade: CascadePolicy) -> Self {
        Self::new(name, FieldKind::ForeignKey { many: true }).with_cascade(cascade)
    }

    /// Inverse side of a one-to-many; never written, only cascaded.
    #[must_use]
    pub const fn one_to_many(
        name: &'static str,
        mapped_by: &'static str,
        cascade: CascadePolicy,
    ) -> Self {
        let mut field = Self::new(name, FieldKind::Inverse).with_cascade(cascade);
        field.mapped_by = Some(mapped_by);
        field
    }

    #[must_use]
    pub const fn with_column(mut self, column: &'static str) -> Self {
        self.column = column;
        self
    }

    #[must_use]
    pub const fn with_cascade(mut self, cascade: CascadePolicy) -> Self {
        self.cascade = cascade;
        self
    }
}

///
/// FieldKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    /// Represented by the item key; never written as an attribute.
    Id,
    ForeignKey {
        many: bool,
    },
    Inverse,
    Version,
    /// Offloaded to blob storage; only the blob key is written.
    Lob,
    Enum {
        mode: EnumMode,
        variants: &'static [&'static str],
    },
    /// Scalar or plain collection.
    Plain,
}

///
/// EnumMode
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EnumMode {
    /// Store the variant name.
    String,
    /// Store the zero-based declared index.
    Ordinal,
}

///
/// CascadePolicy
///
/// Which lifecycle operations propagate across a relationship.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CascadePolicy {
    bits: u8,
}

impl CascadePolicy {
    pub const NONE: Self = Self { bits: 0 };
    pub const PERSIST: Self = Self { bits: 1 };
    pub const MERGE: Self = Self { bits: 1 << 1 };
    pub const REMOVE: Self = Self { bits: 1 << 2 };
    pub const REFRESH: Self = Self { bits: 1 << 3 };
    pub const ALL: Self = Self { bits: 0b1111 };

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }

    /// Persist propagates when the policy names `PERSIST` or `ALL`.
    #[must_use]
    pub const fn cascades_persist(self) -> bool {
        self.contains(Self::PERSIST)
    }
}

///
/// TESTS
///
