//! Unbounded order-preserving relay between two channels.
//!
//! The pagination frontier can grow much faster than a fixed worker pool can
//! drain it, and a bounded channel would deadlock the producer against slow
//! consumers. The relay accepts from the producer side without ever blocking
//! it, parks the overflow in a backlog deque, and forwards to the consumer
//! side in strict FIFO order. The backlog itself is owned by the relay thread
//! and never shared.

use std::collections::VecDeque;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, select};

/// Forwards every value from `rx` to `tx` in arrival order.
///
/// Terminates once `rx` disconnects and the backlog has drained; dropping the
/// `tx` end then signals completion downstream. If the consumer side
/// disconnects first, remaining values are discarded.
pub(crate) fn relay<T: Send + 'static>(rx: Receiver<T>, tx: Sender<T>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut backlog: VecDeque<T> = VecDeque::new();
        loop {
            if backlog.is_empty() {
                match rx.recv() {
                    Ok(value) => backlog.push_back(value),
                    Err(_) => return,
                }
            }
            // Race accepting a new value against delivering the oldest one,
            // whichever side is ready first.
            select! {
                recv(rx) -> msg => match msg {
                    Ok(value) => backlog.push_back(value),
                    Err(_) => break,
                },
                send(tx, backlog.pop_front().expect("backlog is non-empty")) -> res => {
                    if res.is_err() {
                        return;
                    }
                }
            }
        }
        for value in backlog {
            if tx.send(value).is_err() {
                return;
            }
        }
    })
}
