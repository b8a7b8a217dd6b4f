// Given-When-Then tests for the teller pool as an agent on the event loop.

use bank_queue::{Event, Stats, TellerPool};
use des::Agent;

fn arrival(customer_id: usize) -> Event {
    Event::Arrival { customer_id }
}

fn end(customer_id: usize, teller_id: usize) -> Event {
    Event::ServiceEnd {
        customer_id,
        teller_id,
    }
}

#[test]
fn given_idle_teller_when_customer_arrives_then_service_starts_immediately() {
    // GIVEN: two idle tellers
    let mut pool = TellerPool::new(2).unwrap();

    // WHEN: customer 0 arrives at t=3.5
    let response = pool.act(3.5, &arrival(0));

    // THEN: service starts at the arrival time on the lowest teller
    assert_eq!(response.events.len(), 1, "Should emit exactly one event");
    assert_eq!(response.agents.len(), 0, "Should not spawn new agents");
    assert_eq!(
        response.events[0],
        (
            3.5,
            Event::ServiceStart {
                customer_id: 0,
                teller_id: 0
            }
        )
    );
    assert_eq!(pool.busy(), 1);
    assert_eq!(pool.queue_length(), 0);
}

#[test]
fn given_all_tellers_busy_when_customer_arrives_then_queued() {
    // GIVEN: one teller, already serving customer 0
    let mut pool = TellerPool::new(1).unwrap();
    pool.act(1.0, &arrival(0));

    // WHEN: customer 1 arrives
    let response = pool.act(2.0, &arrival(1));

    // THEN: nothing starts, customer 1 waits
    assert!(response.events.is_empty(), "Should not emit any events");
    assert_eq!(pool.queue_length(), 1);
    assert_eq!(pool.busy(), 1, "Busy count unchanged");
}

#[test]
fn given_queue_when_teller_freed_then_head_of_queue_takes_that_teller() {
    // GIVEN: two tellers busy, customers 2 and 3 waiting in that order
    let mut pool = TellerPool::new(2).unwrap();
    pool.act(0.0, &arrival(0));
    pool.act(0.5, &arrival(1));
    pool.act(1.0, &arrival(2));
    pool.act(1.5, &arrival(3));
    assert_eq!(pool.queue_length(), 2);

    // WHEN: teller 1 finishes with customer 1
    let response = pool.act(4.0, &end(1, 1));

    // THEN: customer 2 starts at once on teller 1
    assert_eq!(
        response.events,
        vec![(
            4.0,
            Event::ServiceStart {
                customer_id: 2,
                teller_id: 1
            }
        )]
    );
    assert_eq!(pool.busy(), 2, "Freed teller handed straight on");
    assert_eq!(pool.queue_length(), 1);

    // WHEN: teller 0 finishes
    let response = pool.act(5.0, &end(0, 0));

    // THEN: customer 3 is next
    assert_eq!(
        response.events,
        vec![(
            5.0,
            Event::ServiceStart {
                customer_id: 3,
                teller_id: 0
            }
        )]
    );
}

#[test]
fn given_no_queue_when_teller_freed_then_teller_goes_idle() {
    // GIVEN: one busy teller, nobody waiting
    let mut pool = TellerPool::new(1).unwrap();
    pool.act(0.0, &arrival(0));

    // WHEN: service ends
    let response = pool.act(2.0, &end(0, 0));

    // THEN: no grant, teller idle and available to the next arrival
    assert!(response.events.is_empty());
    assert_eq!(pool.busy(), 0);
    assert_eq!(pool.try_acquire(), Some(0));
}

#[test]
fn given_busy_day_when_stats_requested_then_peaks_and_totals_reported() {
    // GIVEN: one teller, three arrivals before any service ends
    let mut pool = TellerPool::new(1).unwrap();
    pool.act(0.0, &arrival(0));
    pool.act(1.0, &arrival(1));
    pool.act(2.0, &arrival(2));

    // WHEN: the first two services end
    pool.act(3.0, &end(0, 0));
    pool.act(4.0, &end(1, 0));

    // THEN
    match pool.stats() {
        Stats::Tellers(stats) => {
            assert_eq!(stats.capacity, 1);
            assert_eq!(stats.total_arrivals, 3);
            assert_eq!(stats.total_queued, 2);
            assert_eq!(stats.total_granted, 3);
            assert_eq!(stats.total_released, 2);
            assert_eq!(stats.peak_queue_length, 2);
            assert_eq!(stats.peak_busy, 1);
            assert!(stats.is_at_capacity());
            assert!(!stats.has_queue());
        }
        other => panic!("Expected teller stats, got {:?}", other),
    }
}

#[test]
#[should_panic(expected = "released while not serving anyone")]
fn given_idle_teller_when_released_then_panics() {
    let mut pool = TellerPool::new(2).unwrap();
    pool.act(0.0, &end(0, 1));
}
