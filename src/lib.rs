pub mod adapters;
pub mod config;
pub mod dap;
pub mod debug;
pub mod error;
pub mod mcp;

pub use config::EngineConfig;
pub use error::Error;
pub use mcp::McpServer;

pub type Result<T> = std::result::Result<T, Error>;

pub async fn serve(config: EngineConfig) -> Result<()> {
    let server = McpServer::new(config);
    server.run().await
}
