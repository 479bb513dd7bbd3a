// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

// Remote-object lifetimes over the in-process loopback: method dispatch,
// explicit destruction, lookup faults, client-affinity reaping, and
// destruction racing an in-flight call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, Once, OnceLock};
use std::thread;

use remote_call::loopback::Loopback;
use remote_call::{FaultKind, Transport};

remote_call::remote_interface! {
    pub interface ITest {
        fn Method1(&self);
        fn Method2(&self, s: &mut String, c: char) -> i32;
        fn Park(&self);
    }
}

struct CTest {
    counter: i32,
    dropped: Option<Arc<AtomicUsize>>,
    ready_tx: Option<mpsc::Sender<()>>,
    go_rx: Option<mpsc::Receiver<()>>,
}

impl CTest {
    fn fresh(dropped: Option<Arc<AtomicUsize>>) -> Self {
        Self {
            counter: 0,
            dropped,
            ready_tx: None,
            go_rx: None,
        }
    }
}

impl Drop for CTest {
    fn drop(&mut self) {
        if let Some(dropped) = &self.dropped {
            dropped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

remote_call::remote_class! {
    impl ITest for CTest {
        fn Method1(&mut self) {
            self.counter += 1;
        }

        fn Method2(&mut self, s: &mut String, c: char) -> i32 {
            s.push(c);
            self.counter += 1;

            self.counter
        }

        fn Park(&mut self) {
            if let Some(tx) = &self.ready_tx {
                tx.send(()).unwrap();
            }
            if let Some(rx) = &self.go_rx {
                rx.recv().unwrap();
            }
        }
    }
}

// Per-label destructor counters, so concurrently running tests can watch
// their own instances and nobody else's.
fn drop_counter(label: &str) -> Arc<AtomicUsize> {
    static COUNTERS: OnceLock<Mutex<HashMap<String, Arc<AtomicUsize>>>> = OnceLock::new();

    COUNTERS
        .get_or_init(Default::default)
        .lock()
        .unwrap()
        .entry(label.to_string())
        .or_default()
        .clone()
}

remote_call::remote_functions! {
    fn NewTest(label: String) -> ITest;
    fn NewOwnedTest(label: String) -> ITest;
    fn MaybeTest(want: bool) -> Option<ITest>;
    fn HandleId(h: ITest) -> String;
}

fn setup() {
    static ONCE: Once = Once::new();

    ONCE.call_once(|| {
        NewTest::register(|label| CTest::fresh(Some(drop_counter(&label))).export());

        NewOwnedTest::register(|label| {
            CTest::fresh(Some(drop_counter(&label))).export_reap_when_idle()
        });

        MaybeTest::register(|want| want.then(|| CTest::fresh(None).export()));

        HandleId::register(|h| h.instance_id().to_string());
    });
}

#[test]
fn methods_share_one_instance_state() {
    setup();

    let mut t = Loopback::new();

    let test = t.call(NewTest::args("s4".into())).unwrap();

    t.call(test.Method1()).unwrap();
    t.call(test.Method1()).unwrap();
    t.call(test.Method1()).unwrap();

    let mut s = String::from("abc");
    let count = t.call(test.Method2(&mut s, '!')).unwrap();

    assert_eq!(4, count);
    assert_eq!("abc!", s);

    t.call(test.destroy()).unwrap();
}

#[test]
fn fabricated_instance_identifier_is_a_fault() {
    setup();

    let mut t = Loopback::new();

    let bogus = ITest::from_instance_id("424242:424242".to_string());

    let mut s = String::new();
    let err = t.call(bogus.Method2(&mut s, '!')).unwrap_err();

    assert_eq!(Some(FaultKind::InvalidClassInstance), err.fault_kind());
}

#[test]
fn destroyed_instance_is_unknown_afterwards() {
    setup();

    let mut t = Loopback::new();

    let test = t.call(NewTest::args("destroy".into())).unwrap();
    let probe = test.clone();

    t.call(test.destroy()).unwrap();
    assert_eq!(1, drop_counter("destroy").load(Ordering::SeqCst));

    let err = t.call(probe.Method1()).unwrap_err();
    assert_eq!(Some(FaultKind::InvalidClassInstance), err.fault_kind());

    // Destroying twice is a fault too, not a double free.
    let err = t.call(probe.destroy()).unwrap_err();
    assert_eq!(Some(FaultKind::InvalidClassInstance), err.fault_kind());
}

// A client-side view of the interface with a method the class never
// implemented. The lookup failure must come back as an encoded fault.
mod wide {
    remote_call::remote_interface! {
        pub interface ITest {
            fn Nope(&self) -> i32;
        }
    }
}

#[test]
fn unknown_method_is_an_encoded_fault() {
    setup();

    let mut t = Loopback::new();

    let test = t.call(NewTest::args("widemethod".into())).unwrap();
    let view = wide::ITest::from_instance_id(test.instance_id().to_string());

    let err = t.call(view.Nope()).unwrap_err();

    let remote_call::Error::Fault(fault) = err else {
        panic!("expected a fault, got {err}");
    };
    assert_eq!(FaultKind::InvalidMethod, fault.kind());
    assert_eq!("Method CTest::Nope is not implemented.", fault.what());

    t.call(test.destroy()).unwrap();
}

#[test]
fn null_handles_decode_as_none() {
    setup();

    let mut t = Loopback::new();

    assert!(t.call(MaybeTest::args(false)).unwrap().is_none());

    let test = t.call(MaybeTest::args(true)).unwrap().expect("a handle");
    t.call(test.destroy()).unwrap();
}

#[test]
fn handles_can_travel_as_arguments() {
    setup();

    let mut t = Loopback::new();

    let test = t.call(NewTest::args("asarg".into())).unwrap();
    let id = t.call(HandleId::args(test.clone())).unwrap();

    assert_eq!(test.instance_id(), id);

    t.call(test.destroy()).unwrap();
}

#[test]
fn reaper_destroys_instances_of_departed_clients() {
    setup();

    let drops = drop_counter("reaped");

    // Client A creates a reap-when-idle instance. A's own frames carry a
    // liveness predicate that only ever judges A.
    let gone = Arc::new(AtomicUsize::new(0));
    let gone_for_a = gone.clone();
    let mut a = Loopback::with_client_id("client-a").with_liveness(Box::new(move |client| {
        client != "client-a" || gone_for_a.load(Ordering::SeqCst) == 0
    }));

    let test = a.call(NewOwnedTest::args("reaped".into())).unwrap();

    // While A is alive its instance serves calls and survives dispatches.
    a.call(test.Method1()).unwrap();
    assert_eq!(0, drops.load(Ordering::SeqCst));

    gone.store(1, Ordering::SeqCst);

    // The next frame from anyone runs the reaper before dispatching, so
    // B's call finds the instance already gone.
    let mut b = Loopback::with_client_id("client-b")
        .with_liveness(Box::new(|client| client != "client-a"));

    let err = b.call(test.Method1()).unwrap_err();

    assert_eq!(Some(FaultKind::InvalidClassInstance), err.fault_kind());
    assert_eq!(1, drops.load(Ordering::SeqCst));
}

#[test]
fn anonymous_clients_are_never_tracked() {
    setup();

    let drops = drop_counter("anon");

    // No client identifier on the transport, so even a reap-when-idle
    // instance belongs to nobody: the affinity table never learns about
    // it, and reap passes (enabled on every frame here) cannot find it.
    let mut t = Loopback::new().with_liveness(Box::new(|client| client != "ghost-client"));

    let test = t.call(NewOwnedTest::args("anon".into())).unwrap();

    t.call(test.Method1()).unwrap();
    assert_eq!(0, drops.load(Ordering::SeqCst));

    t.call(test.destroy()).unwrap();
    assert_eq!(1, drops.load(Ordering::SeqCst));
}

#[test]
fn destruction_waits_for_the_call_in_flight() {
    setup();

    let drops = drop_counter("inflight");
    let (ready_tx, ready_rx) = mpsc::channel();
    let (go_tx, go_rx) = mpsc::channel();

    let mut parked = CTest::fresh(Some(drops.clone()));
    parked.ready_tx = Some(ready_tx);
    parked.go_rx = Some(go_rx);

    let test = parked.export();

    let worker = thread::spawn({
        let test = test.clone();
        move || {
            let mut t = Loopback::new();
            t.call(test.Park()).unwrap();
        }
    });

    // The worker is now parked inside the method.
    ready_rx.recv().unwrap();

    // Destruction succeeds immediately at the protocol level, but the
    // object must stay alive until the parked call has exited.
    let mut t = Loopback::new();
    t.call(test.clone().destroy()).unwrap();
    assert_eq!(0, drops.load(Ordering::SeqCst));

    let err = t.call(test.Method1()).unwrap_err();
    assert_eq!(Some(FaultKind::InvalidClassInstance), err.fault_kind());

    go_tx.send(()).unwrap();
    worker.join().unwrap();

    assert_eq!(1, drops.load(Ordering::SeqCst));
}
