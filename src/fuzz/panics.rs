/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Recording where a caught panic was raised.
//!
//! A process-wide panic hook is installed once. While a thread belongs to a capture session, the hook
//! records the site of the session's first panic instead of printing it, and defers to the previously
//! installed hook everywhere else. Work that a session hands to other threads (the signature checks of
//! [`SignatureCache::verify_aggregate`](crate::crypto::SignatureCache::verify_aggregate)) joins the
//! session with [`CaptureSession::enter`], so that a panic on a worker is reported at its own site.

use std::{
    any::Any,
    cell::Cell,
    collections::BTreeMap,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard, Once, PoisonError,
    },
};

thread_local! {
    static SESSION: Cell<Option<u64>> = Cell::new(None);
}

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);
static PANIC_SITES: Mutex<BTreeMap<u64, String>> = Mutex::new(BTreeMap::new());
static PANIC_HOOK: Once = Once::new();

/// The capture session of a thread, if it is in one.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CaptureSession(Option<u64>);

impl CaptureSession {
    pub(crate) fn current() -> Self {
        Self(SESSION.with(Cell::get))
    }

    /// Run `f` on the current thread as part of this session.
    pub(crate) fn enter<T>(self, f: impl FnOnce() -> T) -> T {
        let _restore = RestoreSession(SESSION.with(|session| session.replace(self.0)));
        f()
    }
}

/// Puts back the session a thread was in, also when unwinding.
struct RestoreSession(Option<u64>);

impl Drop for RestoreSession {
    fn drop(&mut self) {
        SESSION.with(|session| session.set(self.0));
    }
}

fn panic_sites() -> MutexGuard<'static, BTreeMap<u64, String>> {
    PANIC_SITES.lock().unwrap_or_else(PoisonError::into_inner)
}

fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| match SESSION.with(Cell::get) {
            Some(session) => {
                if let Some(location) = info.location() {
                    panic_sites()
                        .entry(session)
                        .or_insert_with(|| format!("{}:{}", location.file(), location.line()));
                }
            }
            None => previous(info),
        }));
    });
}

/// Run `f`, turning a panic into its site (`file:line`) and message.
pub(crate) fn catch_panic<T>(f: impl FnOnce() -> T) -> Result<T, (String, String)> {
    install_panic_hook();
    let session = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
    let outcome =
        CaptureSession(Some(session)).enter(|| panic::catch_unwind(AssertUnwindSafe(f)));
    let site = panic_sites().remove(&session);

    outcome.map_err(|payload| {
        (
            site.unwrap_or_else(|| String::from("unknown")),
            panic_message(payload.as_ref()),
        )
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        String::from(*message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}
