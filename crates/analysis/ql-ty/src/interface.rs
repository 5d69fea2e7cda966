//! Interface types

use ql_hir::InterfaceDefId;
use ql_intern::Name;
use ql_ty_id::TyId;

/// Shape of one required interface member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberShape {
    /// `name: T`
    Field(TyId),
    /// `name(...)`, holding the function type
    Method(TyId),
    /// `get`/`set` pair; either half may be missing
    Accessor {
        /// Getter value type
        getter: Option<TyId>,
        /// Setter value type
        setter: Option<TyId>,
    },
}

impl MemberShape {
    /// Type produced by reading the member
    #[must_use]
    pub const fn read_type(self) -> Option<TyId> {
        match self {
            Self::Field(ty) => Some(ty),
            Self::Method(_) => None,
            Self::Accessor { getter, .. } => getter,
        }
    }
}

/// An interface: ordered required members, no runtime identity
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    /// Interface name
    pub name: Name,
    /// Declaration, `None` for builtin namespaces
    pub def: Option<InterfaceDefId>,
    /// Required members in declaration order
    pub members: Vec<(Name, MemberShape)>,
    /// Position in the builtin table, for builtin namespaces
    pub builtin: Option<usize>,
}

impl InterfaceInfo {
    /// Required member named `name`
    pub fn member(&self, name: Name) -> Option<MemberShape> {
        self.members
            .iter()
            .find(|(member, _)| *member == name)
            .map(|(_, shape)| *shape)
    }

    /// Record a member, merging `get` and `set` halves of one accessor
    pub fn push_member(&mut self, name: Name, shape: MemberShape) {
        if let MemberShape::Accessor { getter, setter } = shape {
            if let Some((_, MemberShape::Accessor { getter: old_get, setter: old_set })) =
                self.members.iter_mut().find(|(member, _)| *member == name)
            {
                *old_get = getter.or(*old_get);
                *old_set = setter.or(*old_set);
                return;
            }
        }
        self.members.push((name, shape));
    }
}
