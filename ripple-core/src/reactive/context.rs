//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! Each runtime owns a stack of frames. Running an effect pushes an
//! `Effect` frame; `Runtime::untrack` pushes an `Untracked` frame that
//! hides the effect below it. Reads register against the top frame only.
//!
//! Frames are pushed and popped by [`ReactiveContext`], a guard that pops
//! on drop, so the stack is restored even when a body returns an error
//! or panics. Nested effect creation pushes on top of the outer effect
//! and the outer frame becomes current again when the inner one drops.
//!
//! The stack also serves as the set of effects active on the call stack,
//! which is what cycle detection consults.

use smallvec::SmallVec;

use super::runtime::RuntimeInner;
use crate::graph::NodeId;

/// An entry in the tracking stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Frame {
    /// An effect body is running; reads subscribe this effect.
    Effect(NodeId),
    /// Reads are not tracked until this frame is popped.
    Untracked,
}

/// The tracking stack of a runtime.
#[derive(Debug, Default)]
pub(crate) struct TrackingStack {
    frames: SmallVec<[Frame; 8]>,
}

impl TrackingStack {
    pub(crate) fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Drop frames above `depth`.
    pub(crate) fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The effect that reads should be attributed to, if any.
    pub(crate) fn current_subscriber(&self) -> Option<NodeId> {
        match self.frames.last() {
            Some(Frame::Effect(id)) => Some(*id),
            _ => None,
        }
    }

    /// The innermost running effect, looking through untracked frames.
    ///
    /// Effects created while this effect runs become its children.
    pub(crate) fn owner(&self) -> Option<NodeId> {
        self.frames.iter().rev().find_map(|frame| match frame {
            Frame::Effect(id) => Some(*id),
            Frame::Untracked => None,
        })
    }

    pub(crate) fn is_tracking(&self) -> bool {
        self.current_subscriber().is_some()
    }

    /// Whether `effect` is running anywhere on the call stack.
    pub(crate) fn contains_effect(&self, effect: NodeId) -> bool {
        self.frames.contains(&Frame::Effect(effect))
    }

    /// Number of effects running on the call stack.
    pub(crate) fn effect_depth(&self) -> usize {
        self.frames
            .iter()
            .filter(|frame| matches!(frame, Frame::Effect(_)))
            .count()
    }
}

/// Guard that pops its frame when dropped.
pub(crate) struct ReactiveContext<'rt> {
    runtime: &'rt RuntimeInner,
    frame: Frame,
}

impl<'rt> ReactiveContext<'rt> {
    /// Push `frame` onto the runtime's tracking stack.
    ///
    /// The frame stays current until the returned guard is dropped.
    pub(crate) fn enter(runtime: &'rt RuntimeInner, frame: Frame) -> Self {
        runtime.with_state(|state| state.tracking.push(frame));
        Self { runtime, frame }
    }
}

impl Drop for ReactiveContext<'_> {
    fn drop(&mut self) {
        self.runtime.with_state(|state| {
            let popped = state.tracking.pop();

            // A mismatch means something pushed without popping. The
            // effect runner notices the depth change and reports it.
            if popped != Some(self.frame) {
                tracing::error!(
                    expected = ?self.frame,
                    found = ?popped,
                    "reactive context mismatch"
                );
            }

            if let Frame::Effect(id) = self.frame {
                state.finish_run(id);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    fn runtime() -> RuntimeInner {
        RuntimeInner::new(RuntimeConfig::default())
    }

    fn stack_depth(runtime: &RuntimeInner) -> usize {
        runtime.with_state(|state| state.tracking.depth())
    }

    fn current(runtime: &RuntimeInner) -> Option<NodeId> {
        runtime.with_state(|state| state.tracking.current_subscriber())
    }

    #[test]
    fn context_tracks_subscriber() {
        let runtime = runtime();
        let id = NodeId::new();

        assert_eq!(current(&runtime), None);

        {
            let _ctx = ReactiveContext::enter(&runtime, Frame::Effect(id));
            assert_eq!(current(&runtime), Some(id));
        }

        // Context should be cleaned up after drop
        assert_eq!(current(&runtime), None);
        assert_eq!(stack_depth(&runtime), 0);
    }

    #[test]
    fn nested_contexts() {
        let runtime = runtime();
        let id1 = NodeId::new();
        let id2 = NodeId::new();

        {
            let _ctx1 = ReactiveContext::enter(&runtime, Frame::Effect(id1));
            assert_eq!(current(&runtime), Some(id1));

            {
                let _ctx2 = ReactiveContext::enter(&runtime, Frame::Effect(id2));
                assert_eq!(current(&runtime), Some(id2));
            }

            // After inner context drops, outer should be current
            assert_eq!(current(&runtime), Some(id1));
        }

        assert_eq!(current(&runtime), None);
    }

    #[test]
    fn untracked_frame_hides_subscriber_but_not_owner() {
        let mut stack = TrackingStack::default();
        let id = NodeId::new();

        stack.push(Frame::Effect(id));
        stack.push(Frame::Untracked);

        assert!(!stack.is_tracking());
        assert_eq!(stack.current_subscriber(), None);
        assert_eq!(stack.owner(), Some(id));
        assert!(stack.contains_effect(id));
    }

    #[test]
    fn effect_depth_ignores_untracked_frames() {
        let mut stack = TrackingStack::default();
        stack.push(Frame::Effect(NodeId::new()));
        stack.push(Frame::Untracked);
        stack.push(Frame::Effect(NodeId::new()));

        assert_eq!(stack.depth(), 3);
        assert_eq!(stack.effect_depth(), 2);

        stack.truncate(1);
        assert_eq!(stack.effect_depth(), 1);
    }

    #[test]
    fn context_is_restored_after_panic() {
        let runtime = runtime();
        let id = NodeId::new();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ctx = ReactiveContext::enter(&runtime, Frame::Effect(id));
            panic!("body exploded");
        }));

        assert!(result.is_err());
        assert_eq!(stack_depth(&runtime), 0);
    }
}
