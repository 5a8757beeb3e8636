// Object handles for collectable values.
//
// The engine does not run a tracing collector of its own: the host VM owns
// object lifetimes through reference-counted handles, and weak table slots
// hold non-owning references that are re-checked for liveness at each
// access. The host's collection pass is simply "drop the strong handles,
// then call LuaTable::collect_dead on weak tables".

use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use crate::lua_value::{LuaFunction, LuaTable, LuaThread, LuaUserdata, LuaValue};

/// Owning handle for a collectable object. Identity (equality, hashing,
/// `tostring` address) is the identity of the underlying allocation.
pub struct GcPtr<T>(Rc<RefCell<T>>);

impl<T> GcPtr<T> {
    pub fn new(data: T) -> Self {
        GcPtr(Rc::new(RefCell::new(data)))
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    pub fn downgrade(&self) -> GcWeak<T> {
        GcWeak(Rc::downgrade(&self.0))
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the allocation, used for identity hashing and Display.
    #[inline]
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl<T> Clone for GcPtr<T> {
    fn clone(&self) -> Self {
        GcPtr(Rc::clone(&self.0))
    }
}

/// Non-owning counterpart of [`GcPtr`]. The allocation's address stays
/// stable (and unique) for as long as any weak handle to it exists, so dead
/// handles still compare correctly against live keys.
pub struct GcWeak<T>(Weak<RefCell<T>>);

impl<T> GcWeak<T> {
    pub fn upgrade(&self) -> Option<GcPtr<T>> {
        self.0.upgrade().map(GcPtr)
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.0.strong_count() == 0
    }

    #[inline]
    pub fn addr(&self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl<T> Clone for GcWeak<T> {
    fn clone(&self) -> Self {
        GcWeak(Weak::clone(&self.0))
    }
}

pub type TablePtr = GcPtr<LuaTable>;
pub type FunctionPtr = GcPtr<LuaFunction>;
pub type UserdataPtr = GcPtr<LuaUserdata>;
pub type ThreadPtr = GcPtr<LuaThread>;

/// A weak reference to any collectable value, stored in weak table slots.
#[derive(Clone)]
pub enum WeakRef {
    Table(GcWeak<LuaTable>),
    Function(GcWeak<LuaFunction>),
    Userdata(GcWeak<LuaUserdata>),
    Thread(GcWeak<LuaThread>),
}

impl WeakRef {
    /// Downgrade a collectable value to a weak reference.
    /// Returns None for non-collectable values (nil, booleans, numbers,
    /// strings), which are always stored strongly.
    pub fn demote(value: &LuaValue) -> Option<WeakRef> {
        match value {
            LuaValue::Table(t) => Some(WeakRef::Table(t.downgrade())),
            LuaValue::Function(f) => Some(WeakRef::Function(f.downgrade())),
            LuaValue::Userdata(u) => Some(WeakRef::Userdata(u.downgrade())),
            LuaValue::Thread(t) => Some(WeakRef::Thread(t.downgrade())),
            _ => None,
        }
    }

    /// Recover the strong value, or None if the host has collected it.
    pub fn upgrade(&self) -> Option<LuaValue> {
        match self {
            WeakRef::Table(w) => w.upgrade().map(LuaValue::Table),
            WeakRef::Function(w) => w.upgrade().map(LuaValue::Function),
            WeakRef::Userdata(w) => w.upgrade().map(LuaValue::Userdata),
            WeakRef::Thread(w) => w.upgrade().map(LuaValue::Thread),
        }
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        match self {
            WeakRef::Table(w) => w.is_dead(),
            WeakRef::Function(w) => w.is_dead(),
            WeakRef::Userdata(w) => w.is_dead(),
            WeakRef::Thread(w) => w.is_dead(),
        }
    }

    /// Identity address; stable even after the referent dies.
    #[inline]
    pub fn addr(&self) -> usize {
        match self {
            WeakRef::Table(w) => w.addr(),
            WeakRef::Function(w) => w.addr(),
            WeakRef::Userdata(w) => w.addr(),
            WeakRef::Thread(w) => w.addr(),
        }
    }
}
