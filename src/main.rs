/*
 * Responsibility
 * - tokio runtime startup
 * - delegate to app::run() (no logic here)
 */
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    route_gate::app::run().await
}
