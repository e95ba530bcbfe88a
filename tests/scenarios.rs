//! End-to-end scenarios E1-E6 from SPEC_FULL.md §8.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use enforcerd::{Identity, Schedule, Task, VirtualClock};
use pretty_assertions::assert_eq;

fn identity(owner: &str) -> Identity {
    Identity::new("policy", "resign", owner)
}

/// E1: basic ordering.
#[test]
fn e1_pop_immediate_returns_earliest_due_first() {
    let clock = Arc::new(VirtualClock::new(200));
    let schedule = Schedule::new(clock);

    schedule.schedule(Task::new(identity("a"), 100)).unwrap();
    schedule.schedule(Task::new(identity("b"), 50)).unwrap();
    schedule.schedule(Task::new(identity("c"), 75)).unwrap();

    let order: Vec<String> = (0..3)
        .map(|_| schedule.pop_immediate().unwrap().identity().owner.clone())
        .collect();
    assert_eq!(order, vec!["b", "c", "a"]);
}

/// `pop_immediate` must remove and return the head even when its due date
/// is still in the future — it is the unconditional variant, unlike `pop`.
#[test]
fn pop_immediate_returns_future_dated_head_unconditionally() {
    let clock = Arc::new(VirtualClock::new(0));
    let schedule = Schedule::new(clock);

    schedule
        .schedule(Task::new(identity("not-yet-due"), 1_000_000))
        .unwrap();

    let task = schedule
        .pop_immediate()
        .expect("pop_immediate must not treat a future-dated head as an empty queue");
    assert_eq!(task.identity().owner, "not-yet-due");
    assert_eq!(schedule.taskcount(), 0);
}

/// E2: coalescing releases the stale context exactly once and keeps the
/// earlier due date.
#[test]
fn e2_schedule_coalesces_and_releases_stale_context() {
    let clock = Arc::new(VirtualClock::new(0));
    let schedule = Schedule::new(clock);
    let id = identity("example.com");

    let released = Arc::new(AtomicUsize::new(0));
    let released_hook = released.clone();
    schedule
        .schedule(Task::new(id.clone(), 500).with_context(
            Box::new("X"),
            Box::new(move |_| {
                released_hook.fetch_add(1, Ordering::SeqCst);
            }),
        ))
        .unwrap();

    schedule
        .schedule(Task::new(id.clone(), 300).with_context(Box::new("Y"), Box::new(|_| {})))
        .unwrap();

    assert_eq!(schedule.taskcount(), 1);
    assert_eq!(schedule.peek_first_time(), Some(300));
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

/// E3: flush makes every task immediately runnable and wakes a parked
/// worker without waiting for its original due time.
#[test]
fn e3_flush_all_wakes_parked_worker() {
    let clock = Arc::new(VirtualClock::new(0));
    let schedule = Arc::new(Schedule::new(clock));

    for i in 0..5 {
        schedule
            .schedule(Task::new(identity(&format!("z{i}")), 1_000_000))
            .unwrap();
    }

    let popper = {
        let schedule = schedule.clone();
        std::thread::spawn(move || schedule.pop())
    };

    // Give the worker a chance to park before flushing.
    std::thread::sleep(Duration::from_millis(50));
    schedule.flush_all();

    let popped = popper.join().unwrap();
    assert!(popped.is_some(), "parked worker should wake with a task");
    assert_eq!(schedule.peek_first_time(), Some(0));
    assert_eq!(schedule.taskcount(), 4);
}

/// E4: two tasks sharing an identity serialize through the per-identity
/// lock even when the second is scheduled from inside the first's body.
#[test]
fn e4_same_identity_executions_serialize() {
    let clock = Arc::new(VirtualClock::new(0));
    let schedule = Arc::new(Schedule::new(clock));
    let id = identity("shared");

    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    schedule.schedule(Task::new(id.clone(), 0)).unwrap();
    schedule.schedule(Task::new(id.clone(), 1)).unwrap();
    // Coalesced: only one entry remains (due_date = 0). Re-schedule a
    // second, distinct due date isn't representable for the same identity,
    // so instead model the two "workers" racing to pop and re-schedule the
    // same identity in sequence, which is the scenario the per-identity
    // lock actually guards.
    assert_eq!(schedule.taskcount(), 1);

    let first = schedule.pop_immediate().unwrap();
    let lock = first.lock().unwrap().clone();

    // Hold the identity lock before starting worker B, so B's attempt to
    // acquire the same lock is forced to wait regardless of how quickly it
    // schedules and pops its own copy of the identity.
    let guard = lock.lock();

    let schedule_b = schedule.clone();
    let id_b = id.clone();
    let order_b = order.clone();
    let lock_b = lock.clone();
    let worker_b = std::thread::spawn(move || {
        schedule_b.schedule(Task::new(id_b, 0)).unwrap();
        let popped = schedule_b.pop_immediate();
        if let Some(task) = popped {
            let _guard = lock_b.lock();
            order_b.lock().unwrap().push("b");
            drop(task);
        }
    });

    std::thread::sleep(Duration::from_millis(50));
    order.lock().unwrap().push("a");
    drop(guard);

    worker_b.join().unwrap();
    let recorded = order.lock().unwrap().clone();
    assert_eq!(recorded, vec!["a", "b"]);
}

/// E5: purge_owner removes only the matching identities and keeps their
/// locks registered.
#[test]
fn e5_purge_owner_removes_only_matches() {
    let clock = Arc::new(VirtualClock::new(0));
    let schedule = Schedule::new(clock);
    let id_ax = Identity::new("A", "t", "X");

    schedule.schedule(Task::new(id_ax.clone(), 10)).unwrap();
    schedule
        .schedule(Task::new(Identity::new("A", "t", "Y"), 10))
        .unwrap();
    schedule
        .schedule(Task::new(Identity::new("B", "t", "X"), 10))
        .unwrap();

    let lock_before = schedule
        .identity_lock(&id_ax)
        .expect("lock admitted on first schedule");

    let removed = schedule.purge_owner("A", "X");
    assert_eq!(removed, 1);
    assert_eq!(schedule.taskcount(), 2);

    let lock_after = schedule
        .identity_lock(&id_ax)
        .expect("purge_owner must retain the identity's lock entry");
    assert!(
        Arc::ptr_eq(&lock_before, &lock_after),
        "purge_owner must keep the same lock handle, not merely leave behind a fresh one"
    );
}

/// E6: release_all wakes parked workers even with nothing to do.
#[test]
fn e6_release_all_wakes_idle_workers() {
    let clock = Arc::new(VirtualClock::new(0));
    let schedule = Arc::new(Schedule::new(clock));

    let w1 = {
        let schedule = schedule.clone();
        std::thread::spawn(move || schedule.pop())
    };
    let w2 = {
        let schedule = schedule.clone();
        std::thread::spawn(move || schedule.pop())
    };

    std::thread::sleep(Duration::from_millis(50));
    schedule.release_all();

    assert!(w1.join().unwrap().is_none());
    assert!(w2.join().unwrap().is_none());
}
