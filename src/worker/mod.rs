//! Concurrency model: one acceptor thread owns the readiness primitive, a fixed pool of worker
//! threads drains a shared work queue, and a return channel lets workers hand fds back to the
//! acceptor for re-arming (spec.md §4.5).

pub mod acceptor;
pub mod dispatch;
pub mod pool;

pub use acceptor::Acceptor;
pub use dispatch::ReturnEvent;
pub use pool::WorkQueue;
