//! End-to-end tests of the library against the bundled calculator worker.

use std::time::Duration;

use procvisor::{
    Event, EventKind, SlotStatus, StopCause, Supervisor, SupervisorConfig, WorkerCommand,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

fn calc_pool(pool_size: usize) -> SupervisorConfig {
    SupervisorConfig {
        pool_size,
        tick: Duration::from_millis(20),
        worker: WorkerCommand::program(env!("CARGO_BIN_EXE_procvisor")).arg("worker"),
        ..SupervisorConfig::default()
    }
}

async fn next_of(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
    loop {
        let ev = rx.recv().await.expect("bus closed");
        if ev.kind == kind {
            return ev;
        }
    }
}

#[tokio::test]
async fn crashed_slot_comes_back_with_a_new_pid() {
    let sup = Supervisor::builder(calc_pool(2)).build();
    let mut events = sup.bus().subscribe();
    let (mut input, input_rx) = tokio::io::duplex(1024);
    let (output_tx, output) = tokio::io::duplex(1024);
    let mut output = BufReader::new(output).lines();

    let session = async {
        let mut pids = [0u32; 2];
        for _ in 0..2 {
            let ev = next_of(&mut events, EventKind::WorkerSpawned).await;
            pids[ev.slot.unwrap()] = ev.pid.unwrap();
        }

        input.write_all(b"3 4 +\n").await.unwrap();
        assert_eq!(output.next_line().await.unwrap().as_deref(), Some("7"));

        input.write_all(b"10 0 /\n").await.unwrap();
        let exited = next_of(&mut events, EventKind::WorkerExited).await;
        assert_eq!(exited.slot, Some(1));
        assert_eq!(exited.reason.as_deref(), Some("killed by SIGABRT"));
        let restarted = next_of(&mut events, EventKind::WorkerRestarted).await;
        assert_eq!(restarted.slot, Some(1));
        assert_eq!(restarted.prev_pid, Some(pids[1]));
        assert_ne!(restarted.pid, Some(pids[1]));

        input.write_all(b"1 1 +\n").await.unwrap();
        assert_eq!(output.next_line().await.unwrap().as_deref(), Some("2"));
        input.write_all(b"2 3 *\n").await.unwrap();
        assert_eq!(output.next_line().await.unwrap().as_deref(), Some("6"));

        drop(input);
        assert_eq!(output.next_line().await.unwrap(), None);
        pids
    };

    let (report, pids) = tokio::time::timeout(Duration::from_secs(20), async {
        tokio::join!(
            sup.run(input_rx, output_tx, CancellationToken::new()),
            session
        )
    })
    .await
    .expect("session timed out");
    let report = report.unwrap();

    assert_eq!(report.cause, StopCause::InputClosed);
    assert_eq!(report.restarts, 1);
    assert_eq!(report.lines_relayed, 3);
    assert_eq!(report.slots[0].last_pid, Some(pids[0]));
    assert_eq!(report.slots[0].generation, 1);
    assert_eq!(report.slots[1].generation, 2);
    assert!(report.slots.iter().all(|s| s.status == SlotStatus::Terminated));
}

#[tokio::test]
async fn stack_overflow_exits_with_code_one() {
    let sup = Supervisor::builder(calc_pool(1)).build();
    let mut events = sup.bus().subscribe();
    let mut out = Vec::new();

    let report = tokio::time::timeout(
        Duration::from_secs(20),
        sup.run(
            &b"1 2 3 4 5 6 7 8 9 10 11\n"[..],
            &mut out,
            CancellationToken::new(),
        ),
    )
    .await
    .expect("run timed out")
    .unwrap();

    assert!(out.is_empty());
    assert_eq!(report.lines_dispatched, 1);
    let exited = next_of(&mut events, EventKind::WorkerExited).await;
    assert_eq!(exited.reason.as_deref(), Some("exited with code 1"));
}
