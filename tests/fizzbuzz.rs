use std::{cell::RefCell, os::fd::AsRawFd, rc::Rc, time::Duration};

use readyio::{
    config::{DemoConfig, ProducerConfig},
    fizzbuzz::{self, consumer, producer, Source},
    sys::{self, PipeMode},
    Scheduler,
};

fn expected(tick: usize) -> String {
    match (tick % 3, tick % 5) {
        (0, 0) => "FizzBuzz".to_string(),
        (0, _) => "Fizz".to_string(),
        (_, 0) => "Buzz".to_string(),
        _ => tick.to_string(),
    }
}

#[test]
fn twenty_ticks_of_fizzbuzz() {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = DemoConfig {
        tick_interval: Duration::from_millis(5),
        ..DemoConfig::default()
    };
    assert_eq!(config.ticks, 20);

    let printed = Rc::new(RefCell::new(Vec::new()));
    let sink = printed.clone();
    let lines = fizzbuzz::run(&config, move |line| sink.borrow_mut().push(line.to_owned())).unwrap();

    let want: Vec<String> = (1..=20).map(expected).collect();
    assert_eq!(lines, want);
    assert_eq!(*printed.borrow(), want);
}

#[test]
fn custom_producers() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (rx, tx) = sys::pipe(PipeMode::Packet).unwrap();
    let timer = sys::timer(Duration::from_millis(2)).unwrap();
    let ex = Scheduler::new();

    let fd = tx.as_raw_fd();
    let writer = ex.spawn(producer(fd, ProducerConfig::new("-", "Ping", 2)));
    assert!(!writer.is_finished());
    assert_eq!(ex.parked_descriptors(), [fd]);

    let sources = vec![Source {
        fd: rx.as_raw_fd(),
        marker: "Ping".to_string(),
    }];
    let done = ex.spawn(consumer(timer.as_raw_fd(), sources, 6, |_| {}));

    let lines = ex.run_until(&done).unwrap().unwrap();
    assert_eq!(lines, ["1", "Ping", "3", "Ping", "5", "Ping"]);
}
