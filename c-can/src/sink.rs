//! Delivery of received frames and error events out of interrupt context.
//!
//! The platform hands the interrupt dispatcher a [`FrameSink`]; everything
//! the dispatcher produces during one interrupt goes through it. Sinks that
//! protect their queues with a lock implement [`FrameSink::open`] and
//! [`FrameSink::close`]; the dispatcher takes the lock lazily, at most once
//! per interrupt, and always releases it before returning.

use crate::message::{ErrorEvent, Frame};

/// Consumer of frames and error events produced in interrupt context.
pub trait FrameSink {
    /// Hand over a received frame.
    fn deliver(&mut self, frame: Frame);

    /// Hand over an error event.
    fn deliver_error(&mut self, event: ErrorEvent);

    /// A locally transmitted frame is waiting to be echoed back to its
    /// sender.
    fn loopback_pending(&self) -> bool {
        false
    }

    /// Echo the pending frame back to its sender.
    fn do_loopback(&mut self) {}

    /// Called before the first delivery of an interrupt.
    fn open(&mut self) {}

    /// Called at the end of an interrupt during which [`FrameSink::open`]
    /// ran.
    fn close(&mut self) {}
}

/// Wraps a sink for the duration of one interrupt, opening it on first use
/// and closing it on drop.
pub(crate) struct SinkGuard<'a, S: FrameSink> {
    sink: &'a mut S,
    opened: bool,
}

impl<'a, S: FrameSink> SinkGuard<'a, S> {
    pub(crate) fn new(sink: &'a mut S) -> Self {
        Self {
            sink,
            opened: false,
        }
    }

    fn open(&mut self) {
        if !self.opened {
            self.opened = true;
            self.sink.open();
        }
    }

    pub(crate) fn deliver(&mut self, frame: Frame) {
        self.open();
        self.sink.deliver(frame);
    }

    pub(crate) fn deliver_error(&mut self, event: ErrorEvent) {
        self.open();
        self.sink.deliver_error(event);
    }

    pub(crate) fn loopback(&mut self) {
        if self.sink.loopback_pending() {
            self.open();
            self.sink.do_loopback();
        }
    }
}

impl<S: FrameSink> Drop for SinkGuard<'_, S> {
    fn drop(&mut self) {
        if self.opened {
            self.sink.close();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::BusError;

    #[derive(Default)]
    struct Recorder {
        opens: usize,
        closes: usize,
        frames: usize,
        errors: usize,
        loopbacks: usize,
        loopback_armed: bool,
    }

    impl FrameSink for Recorder {
        fn deliver(&mut self, _frame: Frame) {
            assert_eq!(self.opens, 1);
            self.frames += 1;
        }

        fn deliver_error(&mut self, _event: ErrorEvent) {
            assert_eq!(self.opens, 1);
            self.errors += 1;
        }

        fn loopback_pending(&self) -> bool {
            self.loopback_armed
        }

        fn do_loopback(&mut self) {
            self.loopbacks += 1;
        }

        fn open(&mut self) {
            self.opens += 1;
        }

        fn close(&mut self) {
            assert_eq!(self.opens, 1);
            self.closes += 1;
        }
    }

    fn frame() -> Frame {
        use embedded_can::{Frame as _, StandardId};
        Frame::new(StandardId::new(1).unwrap(), &[]).unwrap()
    }

    #[test]
    fn opens_once_and_closes_on_drop() {
        let mut sink = Recorder::default();
        {
            let mut guard = SinkGuard::new(&mut sink);
            guard.deliver(frame());
            guard.deliver(frame());
            guard.deliver_error(ErrorEvent::Bus(BusError::Acknowledge));
        }
        assert_eq!(sink.opens, 1);
        assert_eq!(sink.closes, 1);
        assert_eq!(sink.frames, 2);
        assert_eq!(sink.errors, 1);
    }

    #[test]
    fn untouched_sink_is_never_opened() {
        let mut sink = Recorder::default();
        drop(SinkGuard::new(&mut sink));
        assert_eq!(sink.opens, 0);
        assert_eq!(sink.closes, 0);
    }

    #[test]
    fn loopback_opens_only_when_pending() {
        let mut sink = Recorder::default();
        SinkGuard::new(&mut sink).loopback();
        assert_eq!(sink.opens, 0);
        assert_eq!(sink.loopbacks, 0);

        sink.loopback_armed = true;
        SinkGuard::new(&mut sink).loopback();
        assert_eq!(sink.opens, 1);
        assert_eq!(sink.closes, 1);
        assert_eq!(sink.loopbacks, 1);
    }
}
