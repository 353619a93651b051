use std::cell::Cell;
use std::rc::Rc;

use crate::common::{self, BASE};
use synthsym::prog::import::ImportOutcome;
use synthsym::prog::symbols::{
    FieldPlacement, InvalidationSink, ModuleInfo, SearchKind, SymbolSet, SymbolSource, SymbolTag,
};
use synthsym::prog::types::TypeRecord;
use synthsym::{SymbolError, SymbolResult};

struct CountingSink(Rc<Cell<usize>>);

impl InvalidationSink for CountingSink {
    fn invalidate(&self, _module: &ModuleInfo) -> SymbolResult<()> {
        self.0.set(self.0.get() + 1);
        Ok(())
    }
}

fn pointer_count(set: &SymbolSet) -> usize {
    set.iter()
        .filter(|symbol| matches!(symbol.as_type().map(|ty| &ty.record), Some(TypeRecord::Pointer(_))))
        .count()
}

#[test]
fn repeated_misses_enumerate_once() {
    let (mut set, probe) = common::connected_set();
    for _ in 0..3 {
        let err = set.find_type_by_name("Missing", false).expect_err("unknown type");
        assert!(err.is_not_found(), "got {err:?}");
    }
    assert_eq!(probe.enumerations.get(), 1, "the name query is memoized");
}

#[test]
fn self_referential_struct_imports_one_node_and_one_pointer() {
    let (mut set, _) = common::connected_set();
    let node = set.find_type_by_name("Node", false).expect("Node");
    assert_eq!(set.symbol_ids_by_name("Node"), &[node]);
    assert_eq!(pointer_count(&set), 1);
    assert_eq!(set.type_layout(node).expect("layout").bytes, 16);

    let next = set.get(node).expect("Node").children()[1];
    let pointer = set.get(next).expect("next").as_positional().expect("field").ty;
    assert_eq!(set.find_type_by_name("Node *", false).expect("Node *"), pointer);
}

#[test]
fn globals_resolve_by_name_and_offset() {
    let (mut set, _) = common::connected_set();
    let head = set.get_symbol_id_by_name("head").expect("head");
    assert_eq!(set.get(head).expect("head").tag(), SymbolTag::Data);
    assert_eq!(set.find_symbol_at_offset(0x3004).expect("inside head"), (head, 4));
    assert_eq!(pointer_count(&set), 1, "global and member share Node *");
}

#[test]
fn functions_import_on_address_lookup() {
    let (mut set, _) = common::connected_set();
    let (walk, displacement) = set.find_symbol_at_offset(0x1010).expect("walk");
    assert_eq!(displacement, 0x10);
    let symbol = set.get(walk).expect("walk");
    assert_eq!(symbol.name(), "walk");
    assert!(symbol.source().contains(SymbolSource::IMPORTED));
    let param = symbol.children()[0];
    assert_eq!(set.get(param).expect("param").tag(), SymbolTag::Parameter);
    assert_eq!(set.get(param).expect("param").name(), "list");
}

#[test]
fn public_promotes_using_unwind_extent() {
    let (mut set, _) = common::connected_set();
    let start = set.get_symbol_id_by_name("_start").expect("_start");
    assert_eq!(set.get(start).expect("public").tag(), SymbolTag::Public);

    let void = set.find_type_by_name("void", true).expect("void");
    let promoted = set.promote_public(start, void, &[], None).expect("promote");
    assert_eq!(promoted, start, "promotion keeps the id");
    let function = set.get(start).expect("function").as_function().expect("is a function");
    assert_eq!(function.code_size(), 0x40);
    assert_eq!(set.find_symbol_at_offset(0x2020).expect("inside"), (start, 0x20));
}

#[test]
fn public_found_by_offset_is_not_shadowed_by_unwind_data() {
    let (mut set, _) = common::connected_set();
    let (start, displacement) = set.find_symbol_at_offset(0x2000).expect("_start");
    assert_eq!(displacement, 0);
    assert_eq!(set.get(start).expect("public").name(), "_start");
    assert_eq!(set.get(start).expect("public").tag(), SymbolTag::Public);
    assert_eq!(set.ranges().count(), 0, "no function synthesized over a named address");

    let void = set.find_type_by_name("void", true).expect("void");
    set.promote_public(start, void, &[], None).expect("promote");
    let function = set.get(start).expect("function").as_function().expect("is a function");
    assert_eq!(function.code_size(), 0x40);
}

#[test]
fn full_import_answers_later_queries() {
    let (mut set, probe) = common::connected_set();
    let outcome = set.import_for_name_query(SearchKind::all(), None).expect("full import");
    assert!(matches!(outcome, ImportOutcome::Imported { count } if count >= 4), "got {outcome:?}");
    assert!(set.lookup_type("Node").is_some());
    let err = set.get_symbol_id_by_name("nothing").expect_err("absent");
    assert!(matches!(err, SymbolError::NotFound(_)));
    assert_eq!(probe.enumerations.get(), 1);
}

#[test]
fn imports_do_not_signal_invalidation() {
    let (mut set, _) = common::connected_set();
    let flushes = Rc::new(Cell::new(0));
    set.set_invalidation_sink(Box::new(CountingSink(Rc::clone(&flushes))));

    let node = set.find_type_by_name("Node", false).expect("Node");
    assert_eq!(flushes.get(), 0, "imported symbols are not user edits");
    assert!(!set.is_invalidation_disabled(), "flag restored after import");

    let int = set.lookup_type("int").expect("int");
    set.create_field(node, FieldPlacement::AutomaticAppend, int, "extra")
        .expect("manual field");
    assert!(flushes.get() > 0);
}

#[test]
fn detaching_or_dropping_disconnects_backend() {
    let (mut set, probe) = common::connected_set();
    assert!(probe.connected.get());
    let importer = set.detach_importer().expect("attached");
    assert!(!probe.connected.get());
    drop(importer);

    let (set, probe) = common::connected_set();
    drop(set);
    assert!(!probe.connected.get(), "dropping the set closes the session");
}

#[test]
fn unknown_offset_is_not_found() {
    let (mut set, _) = common::connected_set();
    assert_eq!(set.module().address_of(0x3000), BASE + 0x3000);
    let err = set.find_symbol_at_offset(0x50_0000).expect_err("nothing there");
    assert!(err.is_not_found(), "got {err:?}");
}
