// Value representation and the table engine built on it.
mod lua_table;
mod lua_thread;
mod lua_value;

use std::any::Any;
use std::fmt;

use smol_str::SmolStr;

use crate::error::LuaResult;

pub use lua_table::{LuaTable, Pairs, WeakMode};
pub use lua_thread::{CoroutineStatus, LuaThread};
pub use lua_value::{LuaValue, LuaValueKind};

/// Userdata - arbitrary host data with identity
pub struct LuaUserdata {
    data: Box<dyn Any>,
}

impl LuaUserdata {
    pub fn new<T: Any>(data: T) -> Self {
        LuaUserdata {
            data: Box::new(data),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.data.downcast_mut()
    }
}

impl fmt::Debug for LuaUserdata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Userdata({:p})", self.data.as_ref())
    }
}

/// Signature for functions the host exposes to scripts.
pub type CFunction = fn(&[LuaValue]) -> LuaResult<Vec<LuaValue>>;

/// Host function object. Two values are the same function only when they
/// share a handle, regardless of the underlying fn pointer.
pub struct LuaFunction {
    pub name: SmolStr,
    pub func: CFunction,
}

impl LuaFunction {
    pub fn new(name: impl Into<SmolStr>, func: CFunction) -> Self {
        LuaFunction {
            name: name.into(),
            func,
        }
    }
}
