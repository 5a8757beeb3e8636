// Lua table engine
// Hybrid array/hash storage with weak-reference support, extracted behind
// the interface a bytecode interpreter consumes: raw get/set, border
// length, the next() cursor protocol, and list insert/remove.

#[cfg(test)]
mod test;

pub mod error;
pub mod gc;
pub mod lua_value;

pub use error::{LuaError, LuaResult};
pub use gc::{FunctionPtr, GcPtr, GcWeak, TablePtr, ThreadPtr, UserdataPtr, WeakRef};
pub use lua_value::{
    CFunction, CoroutineStatus, LuaFunction, LuaTable, LuaThread, LuaUserdata, LuaValue,
    LuaValueKind, Pairs, WeakMode,
};
