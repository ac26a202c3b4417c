pub mod app;
pub mod session;

pub use app::{CounterApp, ErrorSink};
pub use session::{SessionOptions, SessionState, SubmissionContext, WalletSession};
