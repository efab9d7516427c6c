use async_trait::async_trait;

use crate::errors::OracleError;

/// External text-completion capability used to predict execution behavior.
///
/// Cancellation is by dropping the returned future; implementations must not
/// leave work running after that (e.g. child processes are killed on drop).
#[async_trait]
pub trait Oracle: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, OracleError>;
}
