//! Entry point for the `prog::types` subsystem: type records, constants, and layout.

pub mod array;
pub mod basic;
pub mod callable;
pub mod layout;
pub mod pointer;
pub mod record;
pub mod udt;
pub mod value;

pub use array::ArrayType;
pub use basic::{BUILTIN_TYPES, BasicEncoding, BasicType, BuiltinType, EnumType, builtin};
pub use callable::FunctionType;
pub use layout::{EnumLayout, MemberSlot, UdtLayout, align_up, layout_enum, layout_udt};
pub use pointer::{PointerKind, PointerType};
pub use record::{LayoutSize, TypeKind, TypeRecord, TypeSymbol, TypedefType};
pub use udt::{UdtKind, UdtType};
pub use value::{ConstValue, VariantPacking};
