pub mod manager;
pub mod session;
pub mod state;

pub use manager::Debugger;
pub use session::DebugSession;
pub use state::{
    BreakpointDescriptor, BreakpointLocation, LaunchOutcome, LaunchRequest, SessionState,
    StopOutcome, VariableNode,
};
