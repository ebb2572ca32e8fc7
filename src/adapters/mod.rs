pub mod codelldb;
pub mod logging;

pub use codelldb::CodeLldbAdapter;
pub use logging::DebugAdapterLogger;
