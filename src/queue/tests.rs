use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::BlockingQueue;
use crate::broker::message::Message;
use crate::utils::error::Error;

fn msg(id: &str) -> Message {
    Message::new(id, "test_topic", id.as_bytes().to_vec())
}

#[test]
fn test_push_pop_is_fifo() {
    let queue = BlockingQueue::new();
    for i in 0..100 {
        queue.push(msg(&format!("m{i}"))).unwrap();
    }
    assert_eq!(queue.len(), 100);

    for i in 0..100 {
        assert_eq!(queue.pop().unwrap().id, format!("m{i}"));
    }
    assert!(queue.is_empty());
}

#[test]
fn test_try_pop_on_empty_queue() {
    let queue = BlockingQueue::new();
    assert!(queue.try_pop().is_none());

    queue.push(msg("m1")).unwrap();
    assert_eq!(queue.try_pop().unwrap().id, "m1");
    assert!(queue.try_pop().is_none());
}

#[test]
fn test_push_after_close_is_rejected() {
    let queue = BlockingQueue::new();
    queue.close();
    assert!(matches!(queue.push(msg("m1")), Err(Error::QueueClosed)));
    assert_eq!(queue.len(), 0);
}

#[test]
fn test_pop_on_closed_empty_queue() {
    let queue = BlockingQueue::new();
    queue.close();
    assert!(matches!(queue.pop(), Err(Error::QueueClosed)));
}

#[test]
fn test_close_is_idempotent_and_drains() {
    let queue = BlockingQueue::new();
    queue.push(msg("m1")).unwrap();
    queue.close();
    queue.close();
    assert!(queue.is_closed());

    // buffered messages survive the close
    assert_eq!(queue.pop().unwrap().id, "m1");
    assert!(matches!(queue.pop(), Err(Error::QueueClosed)));
}

#[test]
fn test_pop_blocks_until_push() {
    let queue = Arc::new(BlockingQueue::new());
    let (tx, rx) = mpsc::channel();

    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || {
            let popped = queue.pop();
            tx.send(popped.map(|m| m.id)).unwrap();
        })
    };

    // nothing to pop yet
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

    queue.push(msg("late")).unwrap();
    let received = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(received.unwrap(), "late");
    consumer.join().unwrap();
}

#[test]
fn test_close_wakes_all_blocked_pops() {
    let queue = Arc::new(BlockingQueue::new());
    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let queue = queue.clone();
            thread::spawn(move || queue.pop())
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    queue.close();

    for waiter in waiters {
        assert!(matches!(waiter.join().unwrap(), Err(Error::QueueClosed)));
    }
}

#[test]
fn test_concurrent_producers_lose_nothing() {
    let queue = Arc::new(BlockingQueue::new());
    let producers: Vec<_> = (0..4)
        .map(|p| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..250 {
                    queue.push(msg(&format!("p{p}-{i}"))).unwrap();
                }
            })
        })
        .collect();

    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || (0..1000).map(|_| queue.pop().unwrap()).count())
    };

    for producer in producers {
        producer.join().unwrap();
    }
    assert_eq!(consumer.join().unwrap(), 1000);
    assert!(queue.is_empty());
}
