//! Host-application ports: action execution and page context.

use serde_json::Value;

use crate::domain::KioskAction;

/// Trait for performing UI transitions in the host application.
///
/// Implementations should match exhaustively on [`KioskAction`] so that a new
/// action is a compile-time concern. `KioskAction::None` is a no-op.
///
/// # Implementations
///
/// - `NoopActionExecutor` - For tests and headless contexts
/// - Host-specific implementations (kiosk UI bridge, console logger)
pub trait ActionExecutor: Send + Sync {
    /// Perform the action. Must not block.
    fn execute(&self, action: &KioskAction);
}

/// An executor that ignores every action.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopActionExecutor;

impl ActionExecutor for NoopActionExecutor {
    fn execute(&self, _action: &KioskAction) {
        // Intentionally do nothing
    }
}

/// Trait for reading the state of the screen currently shown.
pub trait PageContextProvider: Send + Sync {
    /// Name of the screen currently shown (e.g. `"electricity_bill"`).
    fn current_screen(&self) -> String;

    /// Serialisable snapshot of the screen's state, used for narration.
    fn snapshot(&self) -> Value;
}

/// A provider for hosts without screen state.
#[derive(Debug, Clone, Default)]
pub struct StaticPageContext {
    pub screen: String,
}

impl StaticPageContext {
    pub fn new(screen: impl Into<String>) -> Self {
        Self {
            screen: screen.into(),
        }
    }
}

impl PageContextProvider for StaticPageContext {
    fn current_screen(&self) -> String {
        self.screen.clone()
    }

    fn snapshot(&self) -> Value {
        serde_json::json!({ "screen": self.screen })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_noop_executor() {
        let executor: Arc<dyn ActionExecutor> = Arc::new(NoopActionExecutor);

        // Should not panic
        executor.execute(&KioskAction::GoBack);
        executor.execute(&KioskAction::None);
    }

    #[test]
    fn test_static_page_context() {
        let provider = StaticPageContext::new("home");
        assert_eq!(provider.current_screen(), "home");
        assert_eq!(provider.snapshot()["screen"], "home");
    }
}
