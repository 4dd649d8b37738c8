use core::fmt::Display;

/// Holds the context for the current backup operation. Used for prefixing logs.
#[derive(Default, Debug)]
pub struct Context {
    /// The backup this operation is for.
    pub backup: Option<String>,
    /// The current context
    pub current_context: &'static str,
}

impl Context {
    /// Create a context for an operation on a backup.
    pub fn new(backup: &str, current_context: &'static str) -> Self {
        Self {
            backup: Some(backup.to_string()),
            current_context,
        }
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(backup) = &self.backup {
            write!(f, "[{backup}] ")?;
        }

        write!(f, "[{}] ", self.current_context)?;

        Ok(())
    }
}
