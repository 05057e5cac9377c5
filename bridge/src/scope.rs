//! Execution context manager.
//!
//! [`acquire`] creates a context and wraps it in a [`ContextScope`]. The
//! scope destroys the context exactly once: on [`ContextScope::release`] or,
//! failing that, on drop. Early returns and `?` therefore cannot leak it.

use std::fmt;

use callshim_hostapi::GuestInstance;

use crate::error::BridgeError;

/// Exclusively owned execution context bound to one instance.
///
/// Not `Clone`; one scope serves one invocation sequence.
pub struct ContextScope<'a, I: GuestInstance> {
    instance: &'a I,
    context: Option<I::Context<'a>>,
    stack_size: u32,
}

/// Create an execution context on `instance` with a `stack_size` byte budget.
pub fn acquire<I>(instance: &I, stack_size: u32) -> Result<ContextScope<'_, I>, BridgeError>
where
    I: GuestInstance,
{
    let context = instance
        .create_execution_context(stack_size)
        .map_err(BridgeError::ContextCreationFailed)?;
    Ok(ContextScope {
        instance,
        context: Some(context),
        stack_size,
    })
}

impl<'a, I: GuestInstance> ContextScope<'a, I> {
    pub fn instance(&self) -> &'a I {
        self.instance
    }

    pub fn stack_size(&self) -> u32 {
        self.stack_size
    }

    pub fn is_live(&self) -> bool {
        self.context.is_some()
    }

    /// Borrow the instance together with the live context, or `None` once
    /// released.
    pub(crate) fn parts(&mut self) -> Option<(&'a I, &mut I::Context<'a>)> {
        let instance = self.instance;
        self.context.as_mut().map(|ctx| (instance, ctx))
    }

    /// Destroy the context now. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(context) = self.context.take() {
            self.instance.destroy_execution_context(context);
        }
    }
}

impl<I: GuestInstance> Drop for ContextScope<'_, I> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<I: GuestInstance> fmt::Debug for ContextScope<'_, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextScope")
            .field("instance", &self.instance.id())
            .field("stack_size", &self.stack_size)
            .field("live", &self.is_live())
            .finish()
    }
}
