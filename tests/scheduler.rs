use std::{
    cell::{Cell, RefCell},
    os::fd::AsRawFd,
    rc::Rc,
    time::Duration,
};

use futures_concurrency::prelude::*;
use readyio::{
    request_read, request_write,
    sys::{self, PipeMode},
    yield_now, Error, Scheduler, TaskState,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn small_write_completes_without_suspending() {
    init();
    let (_rx, tx) = sys::pipe(PipeMode::Stream).unwrap();
    let ex = Scheduler::new();
    let fd = tx.as_raw_fd();

    let handle = ex.spawn(async move {
        let (res, buf) = request_write(fd, "AB").await;
        (res.unwrap(), buf)
    });

    assert_eq!(ex.task_state(handle.id()), TaskState::Completed);
    assert_eq!(handle.try_take(), Some((2, "AB")));
    assert!(ex.parked_descriptors().is_empty());
}

#[test]
fn read_suspends_until_data_arrives() {
    init();
    let (rx, tx) = sys::pipe(PipeMode::Stream).unwrap();
    let ex = Scheduler::new();
    let fd = rx.as_raw_fd();

    let handle = ex.spawn(async move { request_read(fd, Vec::<u8>::with_capacity(16)).await });
    assert_eq!(ex.task_state(handle.id()), TaskState::Suspended(Some(fd)));
    assert_eq!(ex.parked_descriptors(), [fd]);

    sys::write_raw(tx.as_raw_fd(), b"XY").unwrap();
    ex.pump_events().unwrap();

    let (res, buf) = handle.try_take().unwrap();
    assert_eq!(res.unwrap(), 2);
    assert_eq!(buf, b"XY");
    assert_eq!(ex.task_state(handle.id()), TaskState::Completed);
}

#[test]
fn pump_leaves_unready_requests_parked() {
    init();
    let (rx, _tx) = sys::pipe(PipeMode::Stream).unwrap();
    let timer = sys::timer(Duration::from_millis(1)).unwrap();
    let ex = Scheduler::new();
    let (fd, timer_fd) = (rx.as_raw_fd(), timer.as_raw_fd());

    let idle = ex.spawn(async move { request_read(fd, Vec::<u8>::with_capacity(4)).await.0 });
    let ticker = ex.spawn(async move { request_read(timer_fd, Vec::<u8>::with_capacity(8)).await.0 });

    ex.run_until(&ticker).unwrap().unwrap();
    assert!(!idle.is_finished());
    assert_eq!(ex.task_state(idle.id()), TaskState::Suspended(Some(fd)));
    assert_eq!(ex.parked_descriptors(), [fd]);
}

#[test]
fn one_parked_request_per_descriptor() {
    init();
    let (rx, tx) = sys::pipe(PipeMode::Stream).unwrap();
    let ex = Scheduler::new();
    let fd = rx.as_raw_fd();

    let first = ex.spawn(async move { request_read(fd, Vec::<u8>::with_capacity(4)).await.0 });
    let second = ex.spawn(async move { request_read(fd, Vec::<u8>::with_capacity(4)).await.0 });

    assert!(matches!(
        second.try_take(),
        Some(Err(Error::ConflictingRequest { .. }))
    ));
    assert_eq!(ex.parked_descriptors(), [fd]);

    sys::write_raw(tx.as_raw_fd(), b"1").unwrap();
    assert_eq!(ex.run_until(&first).unwrap().unwrap(), 1);
}

#[test]
fn completed_tasks_cannot_be_resumed() {
    init();
    let ex = Scheduler::new();
    let handle = ex.spawn(async { "done" });

    assert!(matches!(ex.resume(handle.id()), Err(Error::TaskCompleted(_))));
    assert_eq!(handle.try_take(), Some("done"));
}

#[test]
fn hangup_completes_a_parked_read_with_zero_bytes() {
    init();
    let (rx, tx) = sys::pipe(PipeMode::Stream).unwrap();
    let ex = Scheduler::new();
    let fd = rx.as_raw_fd();

    let handle = ex.spawn(async move { request_read(fd, Vec::<u8>::with_capacity(4)).await.0 });
    drop(tx);

    assert_eq!(ex.run_until(&handle).unwrap().unwrap(), 0);
}

#[test]
fn broken_pipe_is_returned_to_the_task() {
    init();
    let (rx, tx) = sys::pipe(PipeMode::Stream).unwrap();
    let ex = Scheduler::new();
    let fd = tx.as_raw_fd();
    let written = Rc::new(Cell::new(0));

    let total = written.clone();
    let handle = ex.spawn(async move {
        let mut chunk = vec![0u8; 4096];
        loop {
            let (res, buf) = request_write(fd, chunk).await;
            chunk = buf;
            match res {
                Ok(n) => total.set(total.get() + n),
                Err(err) => return err,
            }
        }
    });
    assert_eq!(ex.task_state(handle.id()), TaskState::Suspended(Some(fd)));
    assert!(written.get() > 0);

    drop(rx);
    let err = ex.run_until(&handle).unwrap();
    assert!(err.is_io());
    assert_eq!(err.raw_os_error(), Some(libc::EPIPE));
}

#[test]
fn tasks_resume_after_the_whole_scan() {
    init();
    let (a_rx, a_tx) = sys::pipe(PipeMode::Stream).unwrap();
    let (b_rx, b_tx) = sys::pipe(PipeMode::Stream).unwrap();
    let ex = Scheduler::new();
    let (a, b) = (a_rx.as_raw_fd(), b_rx.as_raw_fd());
    let order = Rc::new(RefCell::new(Vec::new()));

    for fd in [b, a] {
        let order = order.clone();
        ex.spawn(async move {
            request_read(fd, Vec::<u8>::with_capacity(4)).await.0.unwrap();
            order.borrow_mut().push(fd);
            // Parking again on the same descriptor right after being resumed is fine
            request_read(fd, Vec::<u8>::with_capacity(4)).await.0.unwrap();
        });
    }

    sys::write_raw(a_tx.as_raw_fd(), b"a").unwrap();
    sys::write_raw(b_tx.as_raw_fd(), b"b").unwrap();
    ex.pump_events().unwrap();

    assert_eq!(*order.borrow(), [a.min(b), a.max(b)]);
    assert_eq!(ex.parked_descriptors(), [a.min(b), a.max(b)]);
}

#[test]
fn tasks_join_other_tasks() {
    init();
    let (rx, tx) = sys::pipe(PipeMode::Stream).unwrap();
    let ex = Scheduler::new();
    let fd = rx.as_raw_fd();

    let reader = ex.spawn(async move { request_read(fd, Vec::<u8>::with_capacity(8)).await });
    let waiter = ex.spawn(async move {
        let (res, buf) = reader.await;
        res.map(|n| buf[..n].to_vec())
    });
    assert_eq!(ex.task_state(waiter.id()), TaskState::Suspended(None));

    sys::write_raw(tx.as_raw_fd(), b"hello").unwrap();
    assert_eq!(ex.run_until(&waiter).unwrap().unwrap(), b"hello");
}

#[test]
fn yield_gives_other_tasks_a_turn() {
    init();
    let ex = Scheduler::new();
    let turns = Rc::new(RefCell::new(Vec::new()));

    let handles: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|name| {
            let turns = turns.clone();
            ex.spawn(async move {
                for round in 0..2 {
                    turns.borrow_mut().push(format!("{}{}", name, round));
                    yield_now().await;
                }
            })
        })
        .collect();

    for handle in &handles {
        ex.run_until(handle).unwrap();
    }
    assert_eq!(*turns.borrow(), ["a0", "b0", "a1", "b1"]);
}

#[test]
fn requests_joined_inside_one_task() {
    init();
    let (a_rx, a_tx) = sys::pipe(PipeMode::Stream).unwrap();
    let (b_rx, b_tx) = sys::pipe(PipeMode::Stream).unwrap();
    let ex = Scheduler::new();
    let (a, b) = (a_rx.as_raw_fd(), b_rx.as_raw_fd());

    let handle = ex.spawn(async move {
        let ((ra, abuf), (rb, bbuf)) = (
            request_read(a, Vec::<u8>::with_capacity(4)),
            request_read(b, Vec::<u8>::with_capacity(4)),
        )
            .join()
            .await;
        ra.unwrap();
        rb.unwrap();
        (abuf, bbuf)
    });

    sys::write_raw(a_tx.as_raw_fd(), b"x").unwrap();
    sys::write_raw(b_tx.as_raw_fd(), b"y").unwrap();
    let (abuf, bbuf) = ex.run_until(&handle).unwrap();
    assert_eq!(abuf, b"x");
    assert_eq!(bbuf, b"y");
}
