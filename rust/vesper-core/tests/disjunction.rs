//! End-to-end disjunction scenarios.

use vesper_core::{
    default_executor, launch, make_ready_future, when_any, Future, WaitStatus, WhenAnyResult,
};
use std::time::Duration;

#[test]
fn disjunction_winner_matches_the_reported_index() {
    let executor = default_executor();
    let result = when_any((
        launch(&executor, || 2),
        launch(&executor, || 3),
        launch(&executor, || 4),
    ))
    .then(|index: usize, tasks: (Future<i32>, Future<i32>, Future<i32>)| {
        let winner = match index {
            0 => tasks.0.get().unwrap(),
            1 => tasks.1.get().unwrap(),
            2 => tasks.2.get().unwrap(),
            _ => panic!("index out of range"),
        };
        (index, winner * 3)
    })
    .unwrap();

    let (index, tripled) = result.get().unwrap();
    let expected = [6, 9, 12];
    assert_eq!(tripled, expected[index]);
}

#[test]
fn disjunction_winner_value_continuation() {
    let executor = default_executor();
    let tripled = when_any((
        launch(&executor, || 2),
        launch(&executor, || 3),
        launch(&executor, || 4),
    ))
    .then(|winner: i32| winner * 3)
    .unwrap();
    let value = tripled.get().unwrap();
    assert!([6, 9, 12].contains(&value), "unexpected value {value}");
}

#[test]
fn empty_disjunction_reports_the_sentinel() {
    let result = when_any(()).get().unwrap();
    assert_eq!(result.index, WhenAnyResult::<()>::NOT_FOUND);
}

#[test]
fn disjunction_is_ready_as_soon_as_one_child_is() {
    let executor = default_executor();
    let mut any = when_any((
        make_ready_future("instant"),
        launch(&executor, || {
            std::thread::sleep(Duration::from_millis(50));
            "slow"
        }),
    ));
    assert!(any.is_ready());
    assert_eq!(
        any.wait_timeout(Duration::from_secs(1)).unwrap(),
        WaitStatus::Ready
    );
    let result = any.get().unwrap();
    assert_eq!(result.index, 0);
    let (fast, slow) = result.tasks;
    assert_eq!(fast.get(), Ok("instant"));
    assert_eq!(slow.get(), Ok("slow"));
}

#[test]
fn disjunction_over_a_vector_reports_a_valid_winner() {
    let executor = default_executor();
    let children: Vec<_> = (0..4)
        .map(|i| {
            launch(&executor, move || {
                std::thread::sleep(Duration::from_millis(5 * i as u64));
                i * 10
            })
        })
        .collect();
    let result = when_any(children).get().unwrap();
    assert!(result.index < 4);
    assert!(result.tasks[result.index].is_ready());
    for task in result.tasks {
        task.get().unwrap();
    }
}

#[test]
fn disjunction_operator_builds_a_flat_proxy() {
    let executor = default_executor();
    let any = launch(&executor, || 'a') | launch(&executor, || 'b') | launch(&executor, || 'c');
    assert_eq!(any.len(), 3);
    let result = any.get().unwrap();
    assert!(result.index < 3);
}

#[test]
fn winner_future_continuation_for_same_typed_children() {
    let executor = default_executor();
    let doubled = when_any((launch(&executor, || 10), launch(&executor, || 20)))
        .then(|winner: Future<i32>| winner.get().unwrap() * 2)
        .unwrap();
    let value = doubled.get().unwrap();
    assert!(value == 20 || value == 40);
}
