// Operation Registry
//
// This module provides the catalog of operation definitions, the links from
// base operations to their derived variants, and the capability table used to
// decide which methods a graph node of a given type exposes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use opgraph_error::{RegistryError, RegistryResult};
use opgraph_types::{Type, TypeCategory};

use crate::op_def::{OpArgs, OpDef};

/// Kind under which an element-wise variant is linked to its base.
pub const MAPPED: &str = "mapped";

/// Categories a type contributes to the capability table. Literals and tags
/// are looked through, unions contribute each non-`none` member, and run types
/// also contribute the categories of their eventual output.
pub fn type_categories(ty: &Type) -> Vec<TypeCategory> {
    match ty.untagged().without_const() {
        Type::Union(members) => {
            let mut categories: Vec<TypeCategory> = members
                .iter()
                .filter(|m| **m != Type::NoneType)
                .flat_map(type_categories)
                .collect();
            categories.sort();
            categories.dedup();
            categories
        }
        Type::Run(output) => {
            let mut categories = vec![TypeCategory::Run];
            categories.extend(type_categories(output));
            categories
        }
        other => vec![other.category()],
    }
}

//-----------------------------------------------------------------------------
// Registry state
//-----------------------------------------------------------------------------

/// Unsynchronized registry state
#[derive(Default)]
struct RegistryInner {
    /// Operations in registration order
    ops: Vec<Arc<OpDef>>,

    /// Index into `ops` by fully-qualified name
    by_name: HashMap<String, usize>,

    /// Base name -> derivation kind -> derived name
    derived: HashMap<String, BTreeMap<String, String>>,

    /// Common names of the operations applicable to each type category
    capabilities: BTreeMap<TypeCategory, BTreeSet<String>>,
}

impl RegistryInner {
    fn register(&mut self, op: OpDef) -> RegistryResult<Arc<OpDef>> {
        if self.by_name.contains_key(op.name()) {
            return Err(RegistryError::DuplicateOperation(op.name().to_string()));
        }

        if let OpArgs::Named(params) = op.input_type() {
            if let Some((_, first)) = params.first() {
                for category in type_categories(first) {
                    self.capabilities
                        .entry(category)
                        .or_default()
                        .insert(op.common_name().to_string());
                }
            }
        }

        let op = Arc::new(op);
        self.by_name.insert(op.name().to_string(), self.ops.len());
        self.ops.push(op.clone());
        Ok(op)
    }

    fn get(&self, name: &str) -> Option<&Arc<OpDef>> {
        self.by_name.get(name).map(|&index| &self.ops[index])
    }
}

/// Process-lifetime catalog of operation definitions.
///
/// Registrations happen while operations are being declared. Lookups and
/// dispatch only take the read lock, so a populated registry can be shared
/// between threads.
pub struct OpRegistry {
    inner: RwLock<RegistryInner>,
}

impl OpRegistry {
    /// Create a new, empty registry
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    fn read_inner(&self) -> RegistryResult<RwLockReadGuard<'_, RegistryInner>> {
        self.inner
            .read()
            .map_err(|e| RegistryError::LockPoisoned(format!("Failed to acquire read lock: {}", e)))
    }

    fn write_inner(&self) -> RegistryResult<RwLockWriteGuard<'_, RegistryInner>> {
        self.inner
            .write()
            .map_err(|e| RegistryError::LockPoisoned(format!("Failed to acquire write lock: {}", e)))
    }

    /// Register an operation. Fails if the name is taken; the existing
    /// registration is left untouched.
    pub fn register(&self, op: OpDef) -> RegistryResult<Arc<OpDef>> {
        let op = self.write_inner()?.register(op)?;
        tracing::debug!(op = op.name(), "registered op");
        Ok(op)
    }

    /// Register `base` together with its `kind` variant `derived`, linked.
    /// Nothing is registered unless both names are free.
    pub fn register_linked(
        &self,
        base: OpDef,
        kind: &str,
        derived: OpDef,
    ) -> RegistryResult<(Arc<OpDef>, Arc<OpDef>)> {
        let mut inner = self.write_inner()?;
        for name in [base.name(), derived.name()] {
            if inner.by_name.contains_key(name) {
                return Err(RegistryError::DuplicateOperation(name.to_string()));
            }
        }
        let base = inner.register(base)?;
        let derived = inner.register(derived)?;
        inner
            .derived
            .entry(base.name().to_string())
            .or_default()
            .insert(kind.to_string(), derived.name().to_string());
        drop(inner);
        tracing::debug!(base = base.name(), kind, derived = derived.name(), "registered linked ops");
        Ok((base, derived))
    }

    /// Look up an operation by fully-qualified name.
    pub fn get(&self, name: &str) -> RegistryResult<Arc<OpDef>> {
        self.read_inner()?
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownOperation(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> RegistryResult<bool> {
        Ok(self.read_inner()?.by_name.contains_key(name))
    }

    pub fn len(&self) -> RegistryResult<usize> {
        Ok(self.read_inner()?.ops.len())
    }

    pub fn is_empty(&self) -> RegistryResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every registration.
    pub fn clear(&self) -> RegistryResult<()> {
        *self.write_inner()? = RegistryInner::default();
        Ok(())
    }

    /// All operations, in registration order.
    pub fn ops(&self) -> RegistryResult<Vec<Arc<OpDef>>> {
        Ok(self.read_inner()?.ops.clone())
    }

    /// Operations sharing `common`, in registration order.
    pub fn ops_with_common_name(&self, common: &str) -> RegistryResult<Vec<Arc<OpDef>>> {
        Ok(self
            .read_inner()?
            .ops
            .iter()
            .filter(|op| op.common_name() == common)
            .cloned()
            .collect())
    }

    /// Record that `derived` is the `kind` variant of `base`. Both must be
    /// registered.
    pub fn link_derived(&self, base: &str, kind: &str, derived: &str) -> RegistryResult<()> {
        let mut inner = self.write_inner()?;
        for name in [base, derived] {
            if inner.get(name).is_none() {
                return Err(RegistryError::UnknownOperation(name.to_string()));
            }
        }
        inner
            .derived
            .entry(base.to_string())
            .or_default()
            .insert(kind.to_string(), derived.to_string());
        tracing::debug!(base, kind, derived, "linked derived op");
        Ok(())
    }

    /// The `kind` variant of `base`, if one was linked.
    pub fn derived_op(&self, base: &str, kind: &str) -> RegistryResult<Option<Arc<OpDef>>> {
        let inner = self.read_inner()?;
        Ok(inner
            .derived
            .get(base)
            .and_then(|kinds| kinds.get(kind))
            .and_then(|name| inner.get(name))
            .cloned())
    }

    /// Base operation of `op` when `op` is the linked mapped variant of it.
    pub fn mapped_base(&self, op: &OpDef) -> RegistryResult<Option<Arc<OpDef>>> {
        let Some(base) = op.derived_from() else {
            return Ok(None);
        };
        match self.derived_op(base, MAPPED)? {
            Some(mapped) if mapped.name() == op.name() => self.get(base).map(Some),
            _ => Ok(None),
        }
    }

    /// Common names of the operations applicable to values of type `ty`.
    /// Operations accepting `unknown` apply to every type.
    pub fn capabilities_for(&self, ty: &Type) -> RegistryResult<BTreeSet<String>> {
        let inner = self.read_inner()?;
        let mut categories = type_categories(ty);
        categories.push(TypeCategory::Unknown);
        Ok(categories
            .iter()
            .filter_map(|category| inner.capabilities.get(category))
            .flatten()
            .cloned()
            .collect())
    }
}

impl Default for OpRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OpRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.read_inner() {
            Ok(inner) => f
                .debug_struct("OpRegistry")
                .field("ops", &inner.ops.iter().map(|op| op.name()).collect::<Vec<_>>())
                .finish(),
            Err(_) => f.write_str("OpRegistry(<poisoned>)"),
        }
    }
}
