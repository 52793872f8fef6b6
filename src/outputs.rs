//! Match output destinations.

use async_trait::async_trait;

/// Destination for rendered match lines. The pipeline decides what a line
/// contains (bare name or JSON); outputs only deliver it.
#[async_trait]
pub trait Output: Send + Sync {
    async fn write_line(&self, line: &str);
}

/// The default output: one line per match on stdout.
pub struct StdoutOutput;

#[async_trait]
impl Output for StdoutOutput {
    async fn write_line(&self, line: &str) {
        println!("{}", line);
    }
}
