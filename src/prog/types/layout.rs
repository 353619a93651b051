//! Layout engine: pure functions computing UDT offsets/sizes and enum member values.
//!
//! The symbol table gathers each member's declared placement plus the current layout of
//! its type, calls into here, and writes the results back onto the symbols.

use crate::prog::symbols::{FieldPlacement, SymbolId};

use super::record::LayoutSize;
use super::udt::UdtKind;
use super::value::{ConstValue, VariantPacking};

pub fn align_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        value
    } else {
        value.next_multiple_of(align)
    }
}

/// One positional child of a UDT as seen by the layout pass.
#[derive(Clone, Debug, PartialEq)]
pub struct MemberSlot {
    pub id: SymbolId,
    pub placement: FieldPlacement,
    pub layout: LayoutSize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UdtLayout {
    pub layout: LayoutSize,
    /// Resolved offset per member; `None` for members that occupy no storage.
    pub offsets: Vec<(SymbolId, Option<u64>)>,
}

/// Lays out a UDT's members in declaration order.
///
/// Automatic members are packed at the running offset aligned to their type; explicit
/// members sit at their declared offset and do not move the running offset, but still
/// count toward the extent and alignment. Union members all start at zero.
pub fn layout_udt(kind: UdtKind, members: &[MemberSlot]) -> UdtLayout {
    let mut running = 0u64;
    let mut extent = 0u64;
    let mut max_align = 1u64;
    let mut offsets = Vec::with_capacity(members.len());

    for member in members {
        let size = member.layout.bytes;
        let align = member.layout.align.max(1);
        let offset = match member.placement {
            FieldPlacement::AutomaticAppend => {
                let offset = if kind == UdtKind::Union {
                    0
                } else {
                    align_up(running, align)
                };
                running = running.max(offset.saturating_add(size));
                Some(offset)
            }
            FieldPlacement::Offset(offset) => Some(offset),
            FieldPlacement::Constant(_) | FieldPlacement::AutomaticIncrement => None,
        };
        if let Some(offset) = offset {
            extent = extent.max(offset.saturating_add(size));
            max_align = max_align.max(align);
        }
        offsets.push((member.id, offset));
    }

    let end = running.max(extent);
    UdtLayout {
        layout: LayoutSize::new(align_up(end, max_align), max_align),
        offsets,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumLayout {
    pub values: Vec<(SymbolId, Option<ConstValue>)>,
    /// Members whose automatic value wrapped around the packing's range.
    pub wrapped: Vec<SymbolId>,
}

/// Assigns enum member values: automatic members take the previous resolved value plus
/// one (zero for the first), explicit constants are kept as declared.
pub fn layout_enum(packing: VariantPacking, members: &[(SymbolId, FieldPlacement)]) -> EnumLayout {
    let mut previous: Option<ConstValue> = None;
    let mut values = Vec::with_capacity(members.len());
    let mut wrapped = Vec::new();

    for (id, placement) in members {
        let value = match placement {
            FieldPlacement::Constant(value) => Some(value.convert(packing).unwrap_or(*value)),
            FieldPlacement::AutomaticIncrement => match previous {
                None => Some(ConstValue::zero(packing)),
                Some(prev) => match prev.wrapping_increment() {
                    Some((next, did_wrap)) => {
                        if did_wrap {
                            wrapped.push(*id);
                        }
                        Some(next)
                    }
                    None => Some(ConstValue::zero(packing)),
                },
            },
            FieldPlacement::Offset(_) | FieldPlacement::AutomaticAppend => None,
        };
        if value.is_some() {
            previous = value;
        }
        values.push((*id, value));
    }

    EnumLayout { values, wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> SymbolId {
        SymbolId::from_u64(raw).expect("non-zero")
    }

    fn slot(raw: u64, placement: FieldPlacement, bytes: u64, align: u64) -> MemberSlot {
        MemberSlot {
            id: id(raw),
            placement,
            layout: LayoutSize::new(bytes, align),
        }
    }

    #[test]
    fn automatic_members_pad_to_alignment() {
        let members = [
            slot(1, FieldPlacement::AutomaticAppend, 1, 1),
            slot(2, FieldPlacement::AutomaticAppend, 4, 4),
            slot(3, FieldPlacement::AutomaticAppend, 1, 1),
        ];
        let result = layout_udt(UdtKind::Struct, &members);
        assert_eq!(
            result.offsets,
            vec![(id(1), Some(0)), (id(2), Some(4)), (id(3), Some(8))],
            "u32 should be padded up to offset four"
        );
        assert_eq!(result.layout, LayoutSize::new(12, 4), "tail padding rounds to alignment");
    }

    #[test]
    fn explicit_offsets_do_not_advance_packing() {
        let members = [
            slot(1, FieldPlacement::Offset(8), 4, 4),
            slot(2, FieldPlacement::AutomaticAppend, 4, 4),
        ];
        let result = layout_udt(UdtKind::Struct, &members);
        assert_eq!(result.offsets[1], (id(2), Some(0)), "automatic member starts at the running offset");
        assert_eq!(result.layout.bytes, 12, "explicit member still extends the size");
    }

    #[test]
    fn constants_consume_no_space() {
        let members = [
            slot(1, FieldPlacement::Constant(ConstValue::I4(7)), 4, 4),
            slot(2, FieldPlacement::AutomaticAppend, 2, 2),
        ];
        let result = layout_udt(UdtKind::Class, &members);
        assert_eq!(result.offsets[0], (id(1), None));
        assert_eq!(result.offsets[1], (id(2), Some(0)));
        assert_eq!(result.layout, LayoutSize::new(2, 2));
    }

    #[test]
    fn union_members_overlap() {
        let members = [
            slot(1, FieldPlacement::AutomaticAppend, 2, 2),
            slot(2, FieldPlacement::AutomaticAppend, 8, 8),
        ];
        let result = layout_udt(UdtKind::Union, &members);
        assert_eq!(result.offsets, vec![(id(1), Some(0)), (id(2), Some(0))]);
        assert_eq!(result.layout, LayoutSize::new(8, 8));
    }

    #[test]
    fn empty_udt_has_zero_size_and_unit_alignment() {
        let result = layout_udt(UdtKind::Struct, &[]);
        assert_eq!(result.layout, LayoutSize::new(0, 1));
    }

    #[test]
    fn layout_is_idempotent() {
        let members = [
            slot(1, FieldPlacement::AutomaticAppend, 8, 8),
            slot(2, FieldPlacement::AutomaticAppend, 1, 1),
        ];
        let first = layout_udt(UdtKind::Struct, &members);
        let second = layout_udt(UdtKind::Struct, &members);
        assert_eq!(first, second, "re-running layout must not change anything");
    }

    #[test]
    fn enum_values_continue_after_explicit_constants() {
        let members = [
            (id(1), FieldPlacement::AutomaticIncrement),
            (id(2), FieldPlacement::AutomaticIncrement),
            (id(3), FieldPlacement::Constant(ConstValue::I4(10))),
            (id(4), FieldPlacement::AutomaticIncrement),
        ];
        let result = layout_enum(VariantPacking::I4, &members);
        let values: Vec<_> = result.values.iter().map(|(_, value)| *value).collect();
        assert_eq!(
            values,
            vec![
                Some(ConstValue::I4(0)),
                Some(ConstValue::I4(1)),
                Some(ConstValue::I4(10)),
                Some(ConstValue::I4(11)),
            ]
        );
        assert!(result.wrapped.is_empty());
    }

    #[test]
    fn enum_auto_increment_wraps() {
        let members = [
            (id(1), FieldPlacement::Constant(ConstValue::UI1(255))),
            (id(2), FieldPlacement::AutomaticIncrement),
        ];
        let result = layout_enum(VariantPacking::UI1, &members);
        assert_eq!(result.values[1], (id(2), Some(ConstValue::UI1(0))));
        assert_eq!(result.wrapped, vec![id(2)], "wrap should be reported for logging");
    }
}
