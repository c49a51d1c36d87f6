//! Panic containment for plugin hooks and step handlers.
//!
//! A panic caught here is an ordinary soft failure. The process panic hook
//! still runs at the panic site, so [`is_isolated`] lets it tell contained
//! panics apart from real crashes.

use futures_util::FutureExt;
use std::cell::Cell;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct Enter;

impl Enter {
    fn new() -> Self {
        DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }
}

impl Drop for Enter {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// True while the current thread is inside [`catch`] or polling a
/// [`catch_future`].
pub fn is_isolated() -> bool {
    DEPTH.with(|depth| depth.get() > 0)
}

pub fn catch<R>(f: impl FnOnce() -> R) -> std::thread::Result<R> {
    let _enter = Enter::new();
    catch_unwind(AssertUnwindSafe(f))
}

/// Await `future`, turning a panic into `Err`. The isolation mark is held
/// only while the future is being polled, never across its suspension
/// points, so unrelated tasks sharing the worker thread are not masked.
pub async fn catch_future<F: Future>(future: F) -> std::thread::Result<F::Output> {
    let mut caught = std::pin::pin!(AssertUnwindSafe(future).catch_unwind());
    std::future::poll_fn(|cx| {
        let _enter = Enter::new();
        caught.as_mut().poll(cx)
    })
    .await
}
