use synthsym::SymbolError;
use synthsym::prog::symbols::{FieldPlacement, ModuleInfo, SymbolId, SymbolSet, type_name};
use synthsym::prog::types::{BasicEncoding, ConstValue, UdtKind};

fn fresh() -> (SymbolSet, SymbolId) {
    let mut set = SymbolSet::new(ModuleInfo::new("layout", 0, 0));
    let int = set.find_type_by_name("int", true).expect("int");
    (set, int)
}

fn offsets(set: &SymbolSet, owner: SymbolId) -> Vec<(String, Option<u64>)> {
    set.get(owner)
        .expect("owner")
        .children()
        .iter()
        .map(|child| {
            let symbol = set.get(*child).expect("child");
            (
                symbol.name().to_owned(),
                symbol.as_positional().and_then(|pos| pos.actual_offset),
            )
        })
        .collect()
}

#[test]
fn enum_auto_increment_continues_after_explicit_value() {
    let (mut set, _) = fresh();
    let color = set
        .enum_builder("Color", None)
        .member("A")
        .member("B")
        .member_value("C", ConstValue::I4(10))
        .member("D")
        .finish()
        .expect("enum");
    let values: Vec<_> = set
        .get(color)
        .expect("enum")
        .children()
        .iter()
        .map(|child| set.get(*child).expect("member").as_positional().and_then(|pos| pos.actual_value))
        .collect();
    assert_eq!(
        values,
        vec![
            Some(ConstValue::I4(0)),
            Some(ConstValue::I4(1)),
            Some(ConstValue::I4(10)),
            Some(ConstValue::I4(11)),
        ]
    );
    assert_eq!(set.type_layout(color).expect("layout").bytes, 4, "enum sized like int");
}

#[test]
fn array_follows_element_growth() {
    let (mut set, int) = fresh();
    let pair = set.udt_builder("Pair", UdtKind::Struct).field("a", int).finish().expect("Pair");
    let array = set.create_array(pair, 4).expect("array");
    assert_eq!(set.type_layout(array).expect("layout").bytes, 16);

    set.create_field(pair, FieldPlacement::AutomaticAppend, int, "b")
        .expect("second field");
    assert_eq!(set.type_layout(pair).expect("layout").bytes, 8);
    assert_eq!(
        set.type_layout(array).expect("layout").bytes,
        32,
        "array size should be recomputed when its element grows"
    );
}

#[test]
fn move_before_repacks_mixed_fields() {
    let (mut set, int) = fresh();
    let byte = set.find_type_by_name("char", true).expect("char");
    let mixed = set
        .udt_builder("Mixed", UdtKind::Struct)
        .field("a", byte)
        .field("b", int)
        .field("c", byte)
        .finish()
        .expect("Mixed");
    assert_eq!(set.type_layout(mixed).expect("layout").bytes, 12);

    let c = set.get(mixed).expect("Mixed").children()[2];
    set.move_before(c, 1).expect("move c before b");
    assert_eq!(
        offsets(&set, mixed),
        vec![("a".to_owned(), Some(0)), ("c".to_owned(), Some(1)), ("b".to_owned(), Some(4))]
    );
    assert_eq!(set.type_layout(mixed).expect("layout").bytes, 8);
}

#[test]
fn reordering_same_type_fields_keeps_size() {
    let (mut set, int) = fresh();
    let triple = set
        .udt_builder("Triple", UdtKind::Struct)
        .field("x", int)
        .field("y", int)
        .field("z", int)
        .finish()
        .expect("Triple");
    let z = set.get(triple).expect("Triple").children()[2];
    set.move_before(z, 0).expect("move z first");
    assert_eq!(set.type_layout(triple).expect("layout").bytes, 12);
    assert_eq!(offsets(&set, triple)[0], ("z".to_owned(), Some(0)));
}

#[test]
fn union_takes_largest_member() {
    let (mut set, int) = fresh();
    let double = set.find_type_by_name("double", true).expect("double");
    let value = set
        .udt_builder("Value", UdtKind::Union)
        .field("i", int)
        .field("d", double)
        .finish()
        .expect("union");
    let layout = set.type_layout(value).expect("layout");
    assert_eq!((layout.bytes, layout.align), (8, 8));
    assert!(offsets(&set, value).iter().all(|(_, offset)| *offset == Some(0)));
}

#[test]
fn derived_names_round_trip() {
    let (mut set, _) = fresh();
    for name in ["int *", "int *[3]", "char[16]"] {
        let id = set.find_type_by_name(name, true).expect("auto-created");
        assert_eq!(type_name(&set, id), name);
        assert_eq!(set.find_type_by_name(name, false).expect("existing"), id, "{name} is shared");
    }
}

#[test]
fn cascade_is_idempotent() {
    let (mut set, int) = fresh();
    let inner = set.udt_builder("Inner", UdtKind::Struct).field("v", int).finish().expect("Inner");
    let outer = set
        .udt_builder("Outer", UdtKind::Struct)
        .field("head", inner)
        .field("tail", inner)
        .finish()
        .expect("Outer");
    let before = (set.type_layout(outer).expect("layout"), offsets(&set, outer));
    set.notify_dependent_change(inner).expect("notify");
    set.notify_dependent_change(inner).expect("notify again");
    assert_eq!((set.type_layout(outer).expect("layout"), offsets(&set, outer)), before);
}

#[test]
fn deleting_a_used_type_is_refused() {
    let (mut set, int) = fresh();
    let holder = set.udt_builder("Holder", UdtKind::Struct).field("n", int).finish().expect("Holder");
    let err = set.delete_symbol(int).expect_err("int is in use");
    assert!(matches!(err, SymbolError::ConstraintViolation(_)), "got {err:?}");
    assert!(set.contains(int));
    assert_eq!(set.type_layout(holder).expect("layout").bytes, 4, "layout untouched");

    let field = set.get(holder).expect("Holder").children()[0];
    set.delete_symbol(field).expect("delete field");
    assert_eq!(set.type_layout(holder).expect("layout").bytes, 0);
    set.delete_symbol(holder).expect("delete holder");
    set.delete_symbol(int).expect("int is free now");
}

#[test]
fn custom_basic_type_is_found_by_name() {
    let mut set = SymbolSet::new(ModuleInfo::new("layout", 0, 0));
    let id = set.create_basic_type("u24", BasicEncoding::Unsigned, 3).expect("u24");
    let layout = set.type_layout(id).expect("layout");
    assert_eq!(layout.bytes, 3);
    assert_eq!(set.find_type_by_name("u24", false).expect("lookup"), id);
}
