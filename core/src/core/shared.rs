// agentline/src/core/shared.rs
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Cross-run aggregate behind a `parking_lot::RwLock`. Clones share the same value.
///
/// Guards are synchronous; drop them before the next `.await`.
#[derive(Debug)]
pub struct SharedData<T: Send + Sync + 'static>(Arc<RwLock<T>>);

impl<T: Send + Sync + 'static> SharedData<T> {
  pub fn new(data: T) -> Self {
    SharedData(Arc::new(RwLock::new(data)))
  }

  pub fn read(&self) -> RwLockReadGuard<'_, T> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, T> {
    self.0.write()
  }

  /// `None` if any other guard is live.
  pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
    self.0.try_write()
  }

  pub fn map_read<F, U: ?Sized>(&self, f: F) -> MappedRwLockReadGuard<'_, U>
  where
    F: FnOnce(&T) -> &U,
  {
    RwLockReadGuard::map(self.read(), f)
  }
}

impl<T: Send + Sync + 'static> Clone for SharedData<T> {
  fn clone(&self) -> Self {
    SharedData(Arc::clone(&self.0))
  }
}

impl<T: Send + Sync + 'static + Default> Default for SharedData<T> {
  fn default() -> Self {
    Self::new(Default::default())
  }
}
