//! Write primitive behind every sink

use super::{error::Result, fan_out::FanOut, log_event::LogEvent};
use std::sync::Arc;

/// A destination that writes finished events somewhere
///
/// Implementations only write. Thresholds, filters, closed-state checks and
/// error reporting are done by the [`Sink`](super::sink::Sink) wrapping them,
/// which also serializes calls so `&mut self` is never shared.
pub trait Appender: Send {
    fn append(&mut self, event: &LogEvent) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Open resources. A failure leaves the sink inactive.
    fn activate(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release resources; called at most once.
    fn close(&mut self) -> Result<()> {
        self.flush()
    }

    /// Sinks this appender forwards to, if it is a container.
    fn nested_sinks(&self) -> Option<Arc<FanOut>> {
        None
    }

    /// Threads that must not call this appender at all.
    ///
    /// The wrapping sink asks the gate before it takes its lock, so a refused
    /// thread never waits behind a caller that is itself waiting on it.
    fn thread_gate(&self) -> Option<Arc<dyn ThreadGate>> {
        None
    }
}

/// Decides whether the current thread may enter an appender
pub trait ThreadGate: Send + Sync {
    fn refuses_current_thread(&self) -> bool;
}

impl<A: Appender + ?Sized> Appender for Box<A> {
    fn append(&mut self, event: &LogEvent) -> Result<()> {
        (**self).append(event)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn activate(&mut self) -> Result<()> {
        (**self).activate()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn nested_sinks(&self) -> Option<Arc<FanOut>> {
        (**self).nested_sinks()
    }

    fn thread_gate(&self) -> Option<Arc<dyn ThreadGate>> {
        (**self).thread_gate()
    }
}
