//! Bounded worker pool for per-line and per-order stage work.

use std::panic;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Apply `f` to every item on at most `workers` scoped threads.
///
/// Results come back in input order whatever order the workers finish in. A
/// panic in `f` is re-raised on the calling thread once all workers stop.
pub fn map_bounded<T, R, F>(items: &[T], workers: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = workers.clamp(1, items.len().max(1));
    if workers == 1 {
        return items.iter().map(&f).collect();
    }

    let next = &AtomicUsize::new(0);
    let f = &f;
    let mut indexed: Vec<(usize, R)> = Vec::with_capacity(items.len());

    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(move || {
                    let mut out = Vec::new();
                    loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        let Some(item) = items.get(i) else { break };
                        out.push((i, f(item)));
                    }
                    out
                })
            })
            .collect();

        let mut panicked = None;
        for handle in handles {
            match handle.join() {
                Ok(out) => indexed.extend(out),
                Err(payload) => panicked = Some(payload),
            }
        }
        if let Some(payload) = panicked {
            panic::resume_unwind(payload);
        }
    });

    indexed.sort_unstable_by_key(|(i, _)| *i);
    indexed.into_iter().map(|(_, r)| r).collect()
}
