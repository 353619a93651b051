use std::cell::Cell;
use std::ops::Range;
use std::rc::Rc;
use std::sync::Arc;

use synthsym::prog::import::{
    BackendResult, ForeignDataKind, ForeignHandle, ForeignSymbol, ForeignTag, ImportOptions,
    MemoryReader, StaticBackend, SymbolBackend,
};
use synthsym::prog::symbols::{ModuleInfo, SearchKind, SymbolSet};
use synthsym::prog::types::{BasicEncoding, UdtKind};

pub const BASE: u64 = 0x7FF6_0000_0000;

pub fn module() -> ModuleInfo {
    ModuleInfo::new("target.exe", BASE, 0x10_0000)
}

/// Observable side of a [`CountingBackend`] after it has been moved into an importer.
#[derive(Clone, Default)]
pub struct Probe {
    pub enumerations: Rc<Cell<usize>>,
    pub connected: Rc<Cell<bool>>,
}

pub struct CountingBackend {
    inner: StaticBackend,
    probe: Probe,
}

impl CountingBackend {
    pub fn new(inner: StaticBackend) -> (Self, Probe) {
        let probe = Probe::default();
        (
            Self {
                inner,
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl SymbolBackend for CountingBackend {
    fn connect(
        &mut self,
        module: &ModuleInfo,
        options: &ImportOptions,
        memory: Arc<dyn MemoryReader>,
    ) -> BackendResult<()> {
        self.inner.connect(module, options, memory)?;
        self.probe.connected.set(true);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.inner.disconnect();
        self.probe.connected.set(false);
    }

    fn enumerate(&mut self, mask: Option<&str>, kind: SearchKind) -> BackendResult<Vec<ForeignHandle>> {
        self.probe.enumerations.set(self.probe.enumerations.get() + 1);
        self.inner.enumerate(mask, kind)
    }

    fn lookup_by_address(&mut self, address: u64, kind: SearchKind) -> BackendResult<Option<ForeignHandle>> {
        self.inner.lookup_by_address(address, kind)
    }

    fn describe(&mut self, handle: ForeignHandle) -> BackendResult<ForeignSymbol> {
        self.inner.describe(handle)
    }

    fn children(&mut self, handle: ForeignHandle) -> BackendResult<Vec<ForeignHandle>> {
        self.inner.children(handle)
    }

    fn unwind_range(&mut self, address: u64) -> BackendResult<Option<Range<u64>>> {
        self.inner.unwind_range(address)
    }
}

fn member(name: &str, ty: ForeignHandle, offset: u64) -> ForeignSymbol {
    ForeignSymbol::new(ForeignTag::Data(ForeignDataKind::Member), name)
        .base(ty)
        .offset(offset)
}

/// `struct Node { int value; Node *next; }`, a global `head`, a function `walk`, and a
/// public `_start`.
pub fn program_table() -> StaticBackend {
    let mut table = StaticBackend::new();
    let int = table.add(ForeignSymbol::new(ForeignTag::BaseType(BasicEncoding::Signed), "").size(4));
    let node = table.add(ForeignSymbol::new(ForeignTag::Udt(UdtKind::Struct), "Node").size(16));
    let node_ptr = table.add(ForeignSymbol::new(ForeignTag::Pointer, "").size(8).base(node));
    table.add_child(node, member("value", int, 0));
    table.add_child(node, member("next", node_ptr, 8));

    table.add(
        ForeignSymbol::new(ForeignTag::Data(ForeignDataKind::Global), "head")
            .base(node_ptr)
            .address(BASE + 0x3000),
    );
    let walk = table.add(
        ForeignSymbol::new(ForeignTag::Function, "walk")
            .address(BASE + 0x1000)
            .size(0x80),
    );
    table.add_child(
        walk,
        ForeignSymbol::new(ForeignTag::Data(ForeignDataKind::Parameter), "list").base(node_ptr),
    );
    table.add(ForeignSymbol::new(ForeignTag::Public, "_start").address(BASE + 0x2000));
    table.add_unwind_range(BASE + 0x2000..BASE + 0x2040);
    table
}

pub fn connected_set() -> (SymbolSet, Probe) {
    let (backend, probe) = CountingBackend::new(program_table());
    let mut set = SymbolSet::new(module());
    set.connect_importer(
        Box::new(backend),
        Arc::new(synthsym::prog::import::NoMemory),
        ImportOptions::default(),
    )
    .expect("connect importer");
    (set, probe)
}
