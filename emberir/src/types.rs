//! The type side of the IR model.
//!
//! Effect summaries only need two facts about a type: whether it is
//! *trivial* (no ownership operations are ever required for it, so copy and
//! destroy effects are structurally impossible) and whether it is a *class*
//! reference (the value is a pointer to shared heap storage, which is what
//! makes whole-value escape claims meaningful without an explicit projection
//! path). Both queries are answered by the [`TypeRegistry`], which stores
//! deduplicated [`IrType`] descriptions behind stable [`TypeRef`] handles.
use std::collections::BTreeMap;

use log::debug;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use smallvec::SmallVec;
use strum::EnumIs;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A stable reference to a type stored inside a [`TypeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TypeRef(u32);

/// A type description, deduplicated by the [`TypeRegistry`].
///
/// Aggregates reference their element types through [`TypeRef`], so a type
/// can only be built from types that were interned before it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IrType {
    /// An integer of the given bit width, e.g. `i64`.
    Int(u16),
    /// A floating-point value of the given bit width, e.g. `f32`.
    Float(u16),
    Bool,
    /// An opaque untyped address. Trivial: the pointer itself carries no
    /// ownership.
    RawPointer,
    /// A reference to a class instance. Non-trivial, and the only type for
    /// which a whole-value reference in effect syntax may omit its path.
    Class { name: String },
    /// A nominal aggregate with ordered fields.
    Struct {
        name: String,
        fields: SmallVec<[TypeRef; 4]>,
    },
    /// An anonymous ordered aggregate.
    Tuple { elements: SmallVec<[TypeRef; 4]> },
    /// A nominal sum type; each case carries one payload type entry.
    Enum {
        name: String,
        payloads: SmallVec<[TypeRef; 4]>,
    },
}

/// A central registry that stores and deduplicates [`IrType`] values.
///
/// Identical type descriptions map to the same [`TypeRef`]. The registry is
/// shared by every function of a module and may be read concurrently.
///
/// Example:
///
/// ```rust
/// # use emberir::types::{IrType, TypeRegistry};
/// let registry = TypeRegistry::new();
/// let int = registry.intern(IrType::Int(32));
/// assert_eq!(registry.intern(IrType::Int(32)), int);
/// assert!(registry.is_trivial(int));
/// assert!(!registry.is_class(int));
/// ```
#[derive(Default)]
pub struct TypeRegistry {
    // Lock ordering: take `storage` before `dedup` when both are needed.
    storage: RwLock<Vec<IrType>>,
    dedup: RwLock<BTreeMap<IrType, TypeRef>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the [`TypeRef`] for `ty`, interning it first if it has not
    /// been seen before.
    pub fn intern(&self, ty: IrType) -> TypeRef {
        if let Some(existing) = self.dedup.read().get(&ty) {
            return *existing;
        }

        let mut storage = self.storage.write();
        let mut dedup = self.dedup.write();
        // A racing intern of the same type may have won between the read
        // above and taking the write locks.
        if let Some(existing) = dedup.get(&ty) {
            return *existing;
        }

        let type_ref = TypeRef(storage.len() as u32);
        debug!("interned type {} as {:?}", Self::describe(&ty), type_ref);
        storage.push(ty.clone());
        dedup.insert(ty, type_ref);
        type_ref
    }

    /// Retrieve a borrowed [`IrType`] for the given `type_ref`, or [`None`]
    /// if the handle does not belong to this registry.
    ///
    /// The returned guard holds a read lock on the storage; do not keep it
    /// across a call to [`Self::intern`].
    pub fn get(&self, type_ref: TypeRef) -> Option<MappedRwLockReadGuard<'_, IrType>> {
        let storage = self.storage.read_recursive();
        RwLockReadGuard::try_map(storage, |types| types.get(type_ref.0 as usize)).ok()
    }

    /// Whether the type needs no ownership operations: no copy or destroy
    /// effect can ever apply to a value of a trivial type. An unknown handle
    /// is conservatively non-trivial.
    pub fn is_trivial(&self, type_ref: TypeRef) -> bool {
        let storage = self.storage.read_recursive();
        Self::trivial_in(&storage, type_ref)
    }

    fn trivial_in(storage: &[IrType], type_ref: TypeRef) -> bool {
        match storage.get(type_ref.0 as usize) {
            None => false,
            Some(IrType::Int(_)) | Some(IrType::Float(_)) | Some(IrType::Bool)
            | Some(IrType::RawPointer) => true,
            Some(IrType::Class { .. }) => false,
            Some(IrType::Struct { fields, .. }) => {
                fields.iter().all(|f| Self::trivial_in(storage, *f))
            }
            Some(IrType::Tuple { elements }) => {
                elements.iter().all(|e| Self::trivial_in(storage, *e))
            }
            Some(IrType::Enum { payloads, .. }) => {
                payloads.iter().all(|p| Self::trivial_in(storage, *p))
            }
        }
    }

    /// Whether the type is a class reference. An unknown handle is not.
    pub fn is_class(&self, type_ref: TypeRef) -> bool {
        matches!(self.get(type_ref).as_deref(), Some(IrType::Class { .. }))
    }

    /// Build a formatting helper that renders the type, resolving aggregate
    /// element types through this registry.
    ///
    /// ```rust
    /// # use emberir::types::{IrType, TypeRegistry};
    /// let registry = TypeRegistry::new();
    /// let int = registry.intern(IrType::Int(8));
    /// let tuple = registry.intern(IrType::Tuple { elements: [int, int].into_iter().collect() });
    /// assert_eq!(format!("{}", registry.fmt(tuple)), "(i8, i8)");
    /// ```
    pub fn fmt(&self, type_ref: TypeRef) -> impl std::fmt::Display + '_ {
        struct Fmt<'a> {
            registry: &'a TypeRegistry,
            type_ref: TypeRef,
        }

        impl std::fmt::Display for Fmt<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let storage = self.registry.storage.read_recursive();
                TypeRegistry::write_type(&storage, self.type_ref, f)
            }
        }

        Fmt {
            registry: self,
            type_ref,
        }
    }

    fn write_type(
        storage: &[IrType],
        type_ref: TypeRef,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let Some(ty) = storage.get(type_ref.0 as usize) else {
            return write!(f, "<unknown>");
        };
        match ty {
            IrType::Int(bits) => write!(f, "i{}", bits),
            IrType::Float(bits) => write!(f, "f{}", bits),
            IrType::Bool => write!(f, "bool"),
            IrType::RawPointer => write!(f, "ptr"),
            IrType::Class { name } => write!(f, "{}", name),
            IrType::Struct { name, .. } => write!(f, "{}", name),
            IrType::Enum { name, .. } => write!(f, "{}", name),
            IrType::Tuple { elements } => {
                write!(f, "(")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    Self::write_type(storage, *element, f)?;
                }
                write!(f, ")")
            }
        }
    }

    fn describe(ty: &IrType) -> String {
        match ty {
            IrType::Int(bits) => format!("i{}", bits),
            IrType::Float(bits) => format!("f{}", bits),
            IrType::Bool => "bool".to_owned(),
            IrType::RawPointer => "ptr".to_owned(),
            IrType::Class { name } | IrType::Struct { name, .. } | IrType::Enum { name, .. } => {
                name.clone()
            }
            IrType::Tuple { elements } => format!("tuple of {} elements", elements.len()),
        }
    }
}
