//! Task abstraction
//!
//! A Task is the unit of work the dispatcher runs: a zero-argument closure,
//! invoked exactly once. The dispatcher owns it from submission until it is
//! popped, and tracks no identity or state for it.

/// A queued unit of work
pub type Task = Box<dyn FnOnce() + 'static>;

/// Box a closure into a [`Task`]
pub fn task<F>(f: F) -> Task
where
    F: FnOnce() + 'static,
{
    Box::new(f)
}
