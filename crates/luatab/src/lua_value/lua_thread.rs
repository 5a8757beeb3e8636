/// Host coroutine handle.
///
/// Scheduling and stacks live in the host VM; the table engine only needs
/// thread identity, so a thread value can serve as a (possibly weak) table
/// key or value.
pub struct LuaThread {
    /// Coroutine status as tracked by the host
    pub status: CoroutineStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineStatus {
    Suspended,
    Running,
    Normal,
    Dead,
}

impl LuaThread {
    pub fn new() -> Self {
        LuaThread {
            status: CoroutineStatus::Suspended,
        }
    }
}

impl Default for LuaThread {
    fn default() -> Self {
        Self::new()
    }
}
