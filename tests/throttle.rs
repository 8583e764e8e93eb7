use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use futures::future::join_all;
use rand::{prelude::Distribution, rngs::SmallRng, Rng, SeedableRng};
use statrs::distribution::{Erlang, Exp};

use task_throttle::Throttle;

const LIMIT: usize = 5;
const INTERVAL: Duration = Duration::from_millis(50);

struct Workload {
    /// Poisson process, exponential interarrival times.
    interarrival: Exp,

    latency: Erlang,

    /// Range: [0, 1)
    failure_rate: f64,
}

struct Tracker {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    start_order: Mutex<Vec<usize>>,
}

impl Workload {
    /// A workload submitting `rps` tasks per second on average.
    ///
    /// Task latency is calculated according to the number of steps each task
    /// performs and the average rate of completion of these steps (per
    /// second).
    fn new(rps: f64, steps: u64, step_rate: f64, failure_rate: f64) -> Self {
        assert!((0.0..1.0).contains(&failure_rate));
        Self {
            interarrival: Exp::new(rps).unwrap(),
            latency: Erlang::new(steps, step_rate).unwrap(),
            failure_rate,
        }
    }

    fn next_arrival_in(&self, rng: &mut SmallRng) -> Duration {
        Duration::from_secs_f64(self.interarrival.sample(rng))
    }

    fn next_latency(&self, rng: &mut SmallRng) -> Duration {
        Duration::from_secs_f64(self.latency.sample(rng))
    }

    fn next_succeeds(&self, rng: &mut SmallRng) -> bool {
        rng.gen_range(0.0..=1.0) > self.failure_rate
    }
}

#[tokio::test(start_paused = true)]
async fn randomized_load_respects_limit_and_ordering() {
    let seed = rand::random();
    let mut rng = SmallRng::seed_from_u64(seed);
    println!("Seed: {seed}");

    let workload = Workload::new(100.0, 2, 50.0, 0.05);
    let throttle = Throttle::new(LIMIT, INTERVAL).unwrap();

    let tracker = Arc::new(Tracker {
        in_flight: AtomicUsize::new(0),
        max_in_flight: AtomicUsize::new(0),
        start_order: Mutex::new(Vec::new()),
    });

    let mut expected = Vec::new();
    let mut submissions = Vec::new();

    for id in 0..200_usize {
        let latency = workload.next_latency(&mut rng);
        let succeeds = workload.next_succeeds(&mut rng);
        expected.push(if succeeds { Ok(id) } else { Err(id) });

        let tracker = Arc::clone(&tracker);
        submissions.push(throttle.submit(move || async move {
            tracker.start_order.lock().unwrap().push(id);
            let current = tracker.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            tracker.max_in_flight.fetch_max(current, Ordering::SeqCst);

            tokio::time::sleep(latency).await;

            tracker.in_flight.fetch_sub(1, Ordering::SeqCst);
            if succeeds {
                Ok(id)
            } else {
                Err(id)
            }
        }));

        tokio::time::sleep(workload.next_arrival_in(&mut rng)).await;
    }

    let results = join_all(submissions).await;

    assert_eq!(
        results, expected,
        "each submission observes only its own task's outcome"
    );
    assert!(
        tracker.max_in_flight.load(Ordering::SeqCst) <= LIMIT,
        "never more than {LIMIT} tasks in flight"
    );

    let start_order = tracker.start_order.lock().unwrap();
    let submitted_order: Vec<usize> = (0..start_order.len()).collect();
    assert_eq!(*start_order, submitted_order, "tasks start in submission order");

    let state = throttle.state();
    assert_eq!((state.active(), state.queued()), (0, 0));
    assert!(!state.is_ticking(), "ticker stops once drained");
}
