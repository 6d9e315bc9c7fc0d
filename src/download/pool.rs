//! Fan-out worker pool over shared channels.
//!
//! A pool is a fixed set of threads pulling from one shared `Receiver`. Each
//! worker owns a clone of the output `Sender`, so the output channel
//! disconnects exactly when the last worker exits; joining the returned
//! handles is the pool's completion barrier. A failed item goes to the shared
//! error channel and the pool keeps going.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, select, unbounded};

/// One processing stage of the pipeline: turn an item into zero or more
/// outputs, or fail with an error that is isolated to that item.
pub(crate) trait Worker: Send + Sync + 'static {
    type Item: Send + 'static;
    type Output: Send + 'static;

    fn process(&self, item: Self::Item, out: &Sender<Self::Output>) -> anyhow::Result<()>;
}

/// Receive-process loop shared by pool threads and the crawler's seeking
/// thread once it demotes itself to a plain worker.
pub(crate) fn worker_loop<W: Worker>(
    worker: &W,
    rx: &Receiver<W::Item>,
    out: &Sender<W::Output>,
    err_tx: &Sender<anyhow::Error>,
) {
    for item in rx.iter() {
        if let Err(err) = worker.process(item, out) {
            let _ = err_tx.send(err);
        }
    }
}

/// Spawn `count` workers feeding an existing output sender.
pub(crate) fn spawn_workers<W: Worker>(
    worker: Arc<W>,
    count: usize,
    rx: Receiver<W::Item>,
    out: Sender<W::Output>,
    err_tx: Sender<anyhow::Error>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|_| {
            let worker = Arc::clone(&worker);
            let rx = rx.clone();
            let out = out.clone();
            let err_tx = err_tx.clone();
            thread::spawn(move || worker_loop(worker.as_ref(), &rx, &out, &err_tx))
        })
        .collect()
}

/// Spawn a pool and hand back its output channel plus the join handles.
///
/// A zero count would close the output before anything ran, so it is treated
/// as one worker.
pub(crate) fn run_pool<W: Worker>(
    worker: Arc<W>,
    count: usize,
    rx: Receiver<W::Item>,
    err_tx: Sender<anyhow::Error>,
) -> (Receiver<W::Output>, Vec<JoinHandle<()>>) {
    let (out_tx, out_rx) = unbounded();
    let handles = spawn_workers(worker, count.max(1), rx, out_tx, err_tx);
    (out_rx, handles)
}

/// Duplicate a stream to two consumers.
///
/// Each item reaches both outputs before the next one is taken; whichever
/// output is ready first is served first, so neither path is starved while
/// only one is momentarily ready. A disconnected output is skipped.
pub(crate) fn tee<T: Clone + Send + 'static>(
    rx: Receiver<T>,
    a: Sender<T>,
    b: Sender<T>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for item in rx.iter() {
            select! {
                send(a, item.clone()) -> first => {
                    let second = b.send(item);
                    if first.is_err() && second.is_err() {
                        return;
                    }
                }
                send(b, item.clone()) -> first => {
                    let second = a.send(item);
                    if first.is_err() && second.is_err() {
                        return;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;
    use crossbeam_channel::bounded;

    use super::*;

    struct Doubler;

    impl Worker for Doubler {
        type Item = u32;
        type Output = u32;

        fn process(&self, item: u32, out: &Sender<u32>) -> anyhow::Result<()> {
            if item % 10 == 7 {
                return Err(anyhow!("bad item {item}"));
            }
            out.send(item * 2)?;
            Ok(())
        }
    }

    #[test]
    fn pool_processes_everything_then_closes_output() {
        let (in_tx, in_rx) = unbounded();
        let (err_tx, err_rx) = unbounded();
        let (out_rx, handles) = run_pool(Arc::new(Doubler), 4, in_rx, err_tx);

        for i in 0..100u32 {
            if i % 10 == 7 {
                continue;
            }
            in_tx.send(i).unwrap();
        }
        drop(in_tx);

        let mut results: Vec<u32> = out_rx.iter().collect();
        results.sort_unstable();
        let mut expected: Vec<u32> = (0..100).filter(|i| i % 10 != 7).map(|i| i * 2).collect();
        expected.sort_unstable();
        assert_eq!(results, expected);
        assert!(err_rx.try_recv().is_err());

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn one_failure_does_not_stop_the_pool() {
        let (in_tx, in_rx) = unbounded();
        let (err_tx, err_rx) = unbounded();
        let (out_rx, handles) = run_pool(Arc::new(Doubler), 2, in_rx, err_tx);

        for i in [1u32, 7, 2, 17, 3] {
            in_tx.send(i).unwrap();
        }
        drop(in_tx);

        let mut results: Vec<u32> = out_rx.iter().collect();
        results.sort_unstable();
        assert_eq!(results, vec![2, 4, 6]);

        let errors: Vec<_> = err_rx.try_iter().collect();
        assert_eq!(errors.len(), 2);

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn zero_worker_pool_still_processes() {
        let (in_tx, in_rx) = unbounded();
        let (err_tx, err_rx) = unbounded();
        let (out_rx, handles) = run_pool(Arc::new(Doubler), 0, in_rx, err_tx);

        for i in [1u32, 2, 3] {
            in_tx.send(i).unwrap();
        }
        drop(in_tx);

        let mut results: Vec<u32> = out_rx.iter().collect();
        results.sort_unstable();
        assert_eq!(results, vec![2, 4, 6]);
        assert!(err_rx.try_recv().is_err());

        for handle in handles {
            handle.join().unwrap();
        }
    }

    struct Counter(AtomicUsize);

    impl Worker for Counter {
        type Item = ();
        type Output = ();

        fn process(&self, _item: (), _out: &Sender<()>) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn every_item_is_consumed_exactly_once() {
        let (in_tx, in_rx) = unbounded();
        let (err_tx, _err_rx) = unbounded();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let (_out_rx, handles) = run_pool(Arc::clone(&counter), 8, in_rx, err_tx);

        for _ in 0..500 {
            in_tx.send(()).unwrap();
        }
        drop(in_tx);
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.0.load(Ordering::SeqCst), 500);
    }

    #[test]
    fn tee_delivers_each_item_to_both_outputs() {
        let (in_tx, in_rx) = unbounded();
        let (a_tx, a_rx) = bounded(0);
        let (b_tx, b_rx) = bounded(0);
        let handle = tee(in_rx, a_tx, b_tx);

        let reader_a = thread::spawn(move || a_rx.iter().collect::<Vec<u32>>());
        let reader_b = thread::spawn(move || b_rx.iter().collect::<Vec<u32>>());

        for i in 0..200u32 {
            in_tx.send(i).unwrap();
        }
        drop(in_tx);
        handle.join().unwrap();

        let expected: Vec<u32> = (0..200).collect();
        assert_eq!(reader_a.join().unwrap(), expected);
        assert_eq!(reader_b.join().unwrap(), expected);
    }
}
