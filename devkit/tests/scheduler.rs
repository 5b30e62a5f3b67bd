use loginwatch_devkit::{Reply, TestHarness};
use loginwatch_kernel::scheduler::spawn_poller;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_first_cycle_runs_immediately() {
    let h = TestHarness::new(TestHarness::hosts(1));
    h.prober.set("srv-01", Reply::sessions(&["alice"]));

    let task = spawn_poller(h.watch.clone(), Duration::from_secs(15));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(h.watch.health().cycles_run, 1);
    assert_eq!(h.watch.states(TestHarness::at(0))[0].last_users, vec!["alice"]);
    task.abort();
}

#[tokio::test(start_paused = true)]
async fn test_slow_cycles_never_overlap() {
    let h = TestHarness::new(TestHarness::hosts(2));
    h.prober.set("srv-01", Reply::sessions(&["alice"]));
    h.prober.set("srv-02", Reply::sessions(&["bob"]));
    // 2 hôtes x 3s par sonde : chaque cycle dure plus que l'intervalle
    h.prober.set_delay(Duration::from_secs(3));

    let task = spawn_poller(h.watch.clone(), Duration::from_secs(1));
    tokio::time::sleep(Duration::from_secs(20)).await;
    task.abort();

    assert_eq!(h.prober.max_in_flight(), 1);
    let cycles = h.watch.health().cycles_run;
    assert!((2..=4).contains(&cycles), "unexpected cycle count {cycles}");
}
