//! User-defined type record for structs, classes, and unions.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UdtKind {
    Struct,
    Class,
    Union,
}

impl UdtKind {
    pub fn keyword(self) -> &'static str {
        match self {
            UdtKind::Struct => "struct",
            UdtKind::Class => "class",
            UdtKind::Union => "union",
        }
    }
}

/// Members are the positional children of the UDT symbol; the record only carries the kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UdtType {
    pub kind: UdtKind,
}

impl UdtType {
    pub fn new(kind: UdtKind) -> Self {
        Self { kind }
    }

    pub fn is_union(&self) -> bool {
        matches!(self.kind, UdtKind::Union)
    }
}

impl Default for UdtType {
    fn default() -> Self {
        Self::new(UdtKind::Struct)
    }
}
