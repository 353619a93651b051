//! Process-wide map from (process, module) to the symbol set describing that module.

use ahash::AHashMap;
use tracing::debug;

use crate::error::{SymbolError, SymbolResult};
use crate::prog::symbols::{ModuleInfo, SymbolSet, SymbolSetConfig};

/// Identifies an address space; kernel and user processes may share numeric ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessKey {
    pub is_kernel: bool,
    pub pid: u64,
}

impl ProcessKey {
    pub fn user(pid: u64) -> Self {
        Self { is_kernel: false, pid }
    }

    pub fn kernel(pid: u64) -> Self {
        Self { is_kernel: true, pid }
    }
}

/// A module within a process, keyed by its load base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleKey(pub u64);

impl From<&ModuleInfo> for ModuleKey {
    fn from(module: &ModuleInfo) -> Self {
        ModuleKey(module.base)
    }
}

#[derive(Default)]
pub struct SymbolRegistry {
    sets: AHashMap<(ProcessKey, ModuleKey), SymbolSet>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn try_get_symbols_for_module(&self, process: ProcessKey, module: ModuleKey) -> Option<&SymbolSet> {
        self.sets.get(&(process, module))
    }

    pub fn try_get_symbols_for_module_mut(
        &mut self,
        process: ProcessKey,
        module: ModuleKey,
    ) -> Option<&mut SymbolSet> {
        self.sets.get_mut(&(process, module))
    }

    /// Creates the set for `module`; a second creation for the same key is refused.
    pub fn create_symbols_for_module(
        &mut self,
        process: ProcessKey,
        module: ModuleInfo,
        config: SymbolSetConfig,
    ) -> SymbolResult<&mut SymbolSet> {
        let key = (process, ModuleKey::from(&module));
        if self.sets.contains_key(&key) {
            return Err(SymbolError::invalid(format!(
                "symbols for {} at 0x{:X} already exist in {process:?}",
                module.name, module.base
            )));
        }
        debug!(?process, module = %module.name, base = module.base, "creating symbol set");
        Ok(self.sets.entry(key).or_insert(SymbolSet::with_config(module, config)))
    }

    pub fn remove_symbols_for_module(&mut self, process: ProcessKey, module: ModuleKey) -> Option<SymbolSet> {
        self.sets.remove(&(process, module))
    }

    /// Drops every module set of `process`, returning how many were removed.
    pub fn remove_process(&mut self, process: ProcessKey) -> usize {
        let before = self.sets.len();
        self.sets.retain(|(owner, _), _| *owner != process);
        let removed = before - self.sets.len();
        if removed > 0 {
            debug!(?process, removed, "dropped process symbol sets");
        }
        removed
    }

    pub fn modules(&self, process: ProcessKey) -> impl Iterator<Item = (ModuleKey, &SymbolSet)> + '_ {
        self.sets
            .iter()
            .filter(move |((owner, _), _)| *owner == process)
            .map(|((_, module), set)| (*module, set))
    }
}
