//! Fault collector
//!
//! Frame callbacks run inside `catch_unwind`, so their panics become
//! [`ErrorRecord`](framekeeper_core::ErrorRecord)s of the frame they ran in.
//! [`install_panic_hook`] adds source locations to those records and routes
//! panics raised outside a frame into the engine's error list. Panics from
//! collaborators (state accessor, surface, memory probe, overlay) are
//! contained by the engine and never reach the error list.

use crate::engine::FrameEngine;
use framekeeper_core::{panic_message, ErrorLocation};
use std::cell::{Cell, RefCell};

thread_local! {
    static IN_FRAME: Cell<bool> = const { Cell::new(false) };
    static IN_COLLABORATOR: Cell<bool> = const { Cell::new(false) };
    static LAST_LOCATION: RefCell<Option<ErrorLocation>> = const { RefCell::new(None) };
}

/// Marks the current thread as executing frame callbacks.
pub(crate) struct FrameGuard {
    previous: bool,
}

impl FrameGuard {
    pub(crate) fn enter() -> Self {
        let previous = IN_FRAME.with(|flag| flag.replace(true));
        LAST_LOCATION.with(|slot| slot.borrow_mut().take());
        Self { previous }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        IN_FRAME.with(|flag| flag.set(self.previous));
    }
}

/// Marks the current thread as calling into a collaborator.
pub(crate) struct CollaboratorGuard {
    previous: bool,
}

impl CollaboratorGuard {
    pub(crate) fn enter() -> Self {
        let previous = IN_COLLABORATOR.with(|flag| flag.replace(true));
        Self { previous }
    }
}

impl Drop for CollaboratorGuard {
    fn drop(&mut self) {
        IN_COLLABORATOR.with(|flag| flag.set(self.previous));
    }
}

fn in_collaborator() -> bool {
    IN_COLLABORATOR.try_with(Cell::get).unwrap_or(false)
}

/// Whether the current thread is running frame callbacks.
pub fn in_frame() -> bool {
    IN_FRAME.try_with(Cell::get).unwrap_or(false)
}

/// Location of the last panic caught inside a frame on this thread.
pub(crate) fn take_panic_location() -> Option<ErrorLocation> {
    LAST_LOCATION
        .try_with(|slot| slot.borrow_mut().take())
        .ok()
        .flatten()
}

/// Route panics into `engine`'s error list.
///
/// Inside a frame the hook only records the panic location; the frame
/// itself records the error once the callback unwinds. Outside a frame the
/// panic is reported against the open frame number and then handed to the
/// previously installed hook. Collaborator panics are left to the engine,
/// which degrades or drops their results. The hook holds the engine weakly.
pub fn install_panic_hook(engine: &FrameEngine) {
    let weak = engine.downgrade();
    let previous = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
        if in_collaborator() {
            return;
        }

        let location = info
            .location()
            .map(|l| ErrorLocation::new(l.file(), l.line(), l.column()));

        if in_frame() {
            let _ = LAST_LOCATION.try_with(|slot| *slot.borrow_mut() = location);
            return;
        }

        if let Some(engine) = FrameEngine::upgrade(&weak) {
            engine.try_report_error(panic_message(info.payload()), location);
        }
        previous(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_restores_flag() {
        assert!(!in_frame());
        {
            let _outer = FrameGuard::enter();
            assert!(in_frame());
            {
                let _inner = FrameGuard::enter();
                assert!(in_frame());
            }
            assert!(in_frame());
        }
        assert!(!in_frame());
    }

    #[test]
    fn test_collaborator_guard_nests() {
        assert!(!in_collaborator());
        {
            let _outer = CollaboratorGuard::enter();
            {
                let _inner = CollaboratorGuard::enter();
                assert!(in_collaborator());
            }
            assert!(in_collaborator());
        }
        assert!(!in_collaborator());
    }

    #[test]
    fn test_location_is_taken_once() {
        LAST_LOCATION.with(|slot| *slot.borrow_mut() = Some(ErrorLocation::new("app.rs", 4, 2)));
        assert_eq!(take_panic_location(), Some(ErrorLocation::new("app.rs", 4, 2)));
        assert_eq!(take_panic_location(), None);
    }
}
