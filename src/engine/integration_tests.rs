// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::backends::{FlowGate, MemoryBroker};
use crate::engine::{
    Barrier, Broadcaster, Outcome, Payload, Queuer, QueuerConfig, QueuerMode, Registry, ResolverLogic, Route,
    SlicerLogic, TaskBox, Worker,
};
use crate::errors::WorkerError;
use crate::traits::{Broker, Throttle};
use crate::utils::ManualClock;

/// Integration tests wiring real workers, barriers and queues over the
/// in-memory broker
#[cfg(test)]
mod tests {
    use super::*;

    struct Harness {
        clock: Arc<ManualClock>,
        registry: Arc<Registry>,
        broker: Arc<MemoryBroker>,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new());
        Harness {
            registry: Registry::with_clock(clock.clone()),
            broker: Arc::new(MemoryBroker::new(clock.clone())),
            clock,
        }
    }

    impl Harness {
        fn queuer(&self, id: &str, config: QueuerConfig) -> Queuer {
            Queuer::build(Worker::builder(id), config, self.broker.clone(), &self.registry).unwrap()
        }

        fn resolver(&self, id: &str, name: &str, collect: bool) -> Arc<Worker> {
            Worker::builder(id)
                .name(name)
                .logic(ResolverLogic::new(collect))
                .build(&self.registry)
                .unwrap()
        }
    }

    /// Terminal worker forwarding everything that reaches it on either path.
    fn sink(registry: &Arc<Registry>, id: &str) -> (Arc<Worker>, mpsc::UnboundedReceiver<Outcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let on_err = tx.clone();
        let worker = Worker::builder(id)
            .decide_constant(true)
            .on_act(move |_, _, data| {
                let _ = tx.send(Ok(data));
                async { Ok::<(), WorkerError>(()) }
            })
            .on_err(move |_, _, error| {
                let _ = on_err.send(Err(error));
                async { Ok::<(), WorkerError>(()) }
            })
            .build(registry)
            .unwrap();
        (worker, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Outcome>) -> Outcome {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("outcome within timeout")
            .expect("sink still open")
    }

    fn task(queue: &str, result: &str) -> Value {
        json!({ "queue": queue, "result": result })
    }

    #[tokio::test]
    async fn test_slicer_resolver_reassembles_out_of_order() {
        let h = harness();
        let split = Worker::builder("split").logic(SlicerLogic::new()).build(&h.registry).unwrap();
        // Later slices finish first.
        let delay = Worker::builder("delay")
            .on_act(|worker, bx, data| async move {
                let wait = match data.value.as_i64() {
                    Some(10) => 30,
                    Some(20) => 15,
                    _ => 0,
                };
                tokio::time::sleep(Duration::from_millis(wait)).await;
                worker.pass(&bx, data, None).await;
                Ok::<(), WorkerError>(())
            })
            .build(&h.registry)
            .unwrap();
        let join = h.resolver("join", "split", true);
        let (out, mut rx) = sink(&h.registry, "out");

        split.connect(&delay).connect(&join).connect(&out);

        let bx = TaskBox::new();
        split.call(&bx, Payload::new(json!([10, 20, 30]))).await;

        let collected = next(&mut rx).await.unwrap();
        assert_eq!(collected.value, json!([10, 20, 30]));
        assert!(rx.try_recv().is_err(), "continuation fires exactly once");
        assert!(!bx.has_resolve("split"));
    }

    #[tokio::test]
    async fn test_slicer_continuation_fires_once_for_any_width() {
        for n in 1..=5usize {
            let h = harness();
            let split = Worker::builder("split").logic(SlicerLogic::new()).build(&h.registry).unwrap();
            let join = h.resolver("join", "split", true);
            let (out, mut rx) = sink(&h.registry, "out");
            split.connect(&join).connect(&out);

            let input: Vec<usize> = (0..n).collect();
            split.call(&TaskBox::new(), Payload::new(json!(input))).await;

            let collected = next(&mut rx).await.unwrap();
            assert_eq!(collected.value.as_array().unwrap().len(), n);
            assert_eq!(collected.value, json!(input));
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_slicer_empty_input_takes_bypass() {
        let h = harness();
        let split = Worker::builder("split").logic(SlicerLogic::new()).build(&h.registry).unwrap();
        let (side, mut rx) = sink(&h.registry, "side");
        split.set_bypass(Some(side));

        let bx = TaskBox::new();
        split.call(&bx, Payload::new(json!([]))).await;

        assert_eq!(next(&mut rx).await.unwrap().value, json!([]));
        assert!(!bx.has_resolve("split"));
    }

    #[tokio::test]
    async fn test_slicer_empty_input_without_bypass_is_absorbed() {
        let h = harness();
        let split = Worker::builder("split").logic(SlicerLogic::new()).build(&h.registry).unwrap();
        let join = h.resolver("join", "split", true);
        let (out, mut rx) = sink(&h.registry, "out");
        split.connect(&join).connect(&out);

        let bx = TaskBox::new();
        split.call(&bx, Payload::new(json!("not a list"))).await;

        assert!(rx.try_recv().is_err());
        assert!(!bx.has_resolve("split"));
    }

    #[tokio::test]
    async fn test_broadcaster_failure_resolves_once_with_error() {
        let h = harness();
        let fan = Broadcaster::build(Worker::builder("fan"), true, &h.registry).unwrap();
        let join = h.resolver("join", "fan", false);
        let (out, mut rx) = sink(&h.registry, "out");
        join.connect(&out);

        let left = Worker::builder("left").build(&h.registry).unwrap();
        let broken = Worker::builder("broken")
            .on_act(|_, _, _| async { Err::<(), _>(WorkerError::application("branch exploded")) })
            .build(&h.registry)
            .unwrap();
        let right = Worker::builder("right").build(&h.registry).unwrap();
        for branch in [&left, &broken, &right] {
            fan.attach(branch).connect(&join);
        }

        let bx = TaskBox::new();
        fan.worker().call(&bx, Payload::new(json!({ "n": 1 }))).await;

        let error = next(&mut rx).await.unwrap_err();
        assert_eq!(error.code(), 500);
        assert!(error.to_string().contains("branch exploded"));
        assert!(rx.try_recv().is_err(), "continuation fires exactly once");
        assert!(!bx.has_resolve("fan"));
    }

    #[tokio::test]
    async fn test_broadcaster_success_passes_original_data() {
        let h = harness();
        let fan = Broadcaster::build(Worker::builder("fan"), true, &h.registry).unwrap();
        let join = h.resolver("join", "fan", false);
        let (out, mut rx) = sink(&h.registry, "out");
        join.connect(&out);
        for id in ["a", "b"] {
            let branch = Worker::builder(id).build(&h.registry).unwrap();
            fan.attach(&branch).connect(&join);
        }

        fan.worker().call(&TaskBox::new(), Payload::new(json!("hello"))).await;

        assert_eq!(next(&mut rx).await.unwrap().value, json!("hello"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_duplicate_barrier_fails_the_box() {
        let h = harness();
        let split = Worker::builder("split").logic(SlicerLogic::new()).build(&h.registry).unwrap();
        let (out, mut rx) = sink(&h.registry, "out");
        split.connect(&out);

        let bx = TaskBox::new();
        bx.set_up_resolve("split", Barrier::count(json!(null), 2)).unwrap();
        split.call(&bx, Payload::new(json!([1, 2]))).await;

        let error = next(&mut rx).await.unwrap_err();
        assert_eq!(error, WorkerError::DuplicateResolve { name: "split".into() });
        assert_eq!(bx.tear_down_resolve("split").map(|b| b.total()), Some(2));
    }

    #[tokio::test]
    async fn test_push_without_consumer_is_404_with_no_writes() {
        let h = harness();
        let submit = h.queuer("submit", QueuerConfig::with_mode(QueuerMode::Pusher));
        let (out, mut rx) = sink(&h.registry, "out");
        submit.worker().connect(&out);

        submit.worker().call(&TaskBox::new(), Payload::new(task("q", "return"))).await;

        assert_eq!(next(&mut rx).await.unwrap_err().code(), 404);
        assert_eq!(h.broker.write_count(), 0);
        assert_eq!(submit.origin_count(), 0);
    }

    #[tokio::test]
    async fn test_backpressure_round_trip() {
        let h = harness();
        let config = QueuerConfig {
            high_water_mark: 2,
            ..QueuerConfig::with_mode(QueuerMode::Pusher)
        };
        let submit = h.queuer("submit", config);
        let (out, mut rx) = sink(&h.registry, "out");
        submit.worker().connect(&out);
        submit.start().await.unwrap();

        // Stand-in consumer so pushes are accepted before the handler runs.
        let _listener = h.broker.subscribe("resize").await.unwrap();

        let gate = FlowGate::new();
        let bx = TaskBox::new();
        bx.set_throttle("resize", gate.clone());

        for index in 0..2 {
            submit
                .push_task(&bx, &Payload::new(task("resize", "return")).with_index(index))
                .await
                .unwrap();
            assert!(!gate.is_paused());
        }
        submit
            .push_task(&bx, &Payload::new(task("resize", "return")).with_index(2))
            .await
            .unwrap();
        assert!(gate.is_paused());
        assert_eq!(submit.paused_count(), 1);
        assert_eq!(h.broker.queue_len("resize"), 3);

        let handler = h.queuer("resize", QueuerConfig::with_mode(QueuerMode::Handler));
        let done = h.resolver("done", "resize", false);
        handler.worker().connect(&done);

        // Consume one task; its result notification reopens the producer.
        handler.handle_task().await;
        tokio::time::timeout(Duration::from_secs(2), gate.wait_open())
            .await
            .expect("producer resumed");
        assert_eq!(submit.paused_count(), 0);

        let mut indexes = Vec::new();
        for _ in 0..3 {
            let result = next(&mut rx).await.unwrap();
            assert_eq!(result.last, Some(true));
            indexes.push(result.index.unwrap());
        }
        indexes.sort_unstable();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(submit.origin_count(), 0);
        submit.stop();
    }

    #[tokio::test]
    async fn test_broadcaster_error_reaches_one_terminal_point() {
        let h = harness();
        let head = Worker::builder("head").build(&h.registry).unwrap();
        let fan = Broadcaster::build(Worker::builder("fan"), true, &h.registry).unwrap();
        let join = h.resolver("join", "fan", false);
        let (out, mut rx) = sink(&h.registry, "out");
        head.connect(fan.worker());
        join.connect(&out);
        for id in ["a", "b", "c"] {
            let branch = Worker::builder(id).build(&h.registry).unwrap();
            fan.attach(&branch).connect(&join);
        }

        let bx = TaskBox::new();
        head.call_err(&bx, WorkerError::application("upstream timed out")).await;

        let error = next(&mut rx).await.unwrap_err();
        assert_eq!(error, WorkerError::application("upstream timed out"));
        assert!(rx.try_recv().is_err(), "one error in, one error out");
        assert!(!bx.has_resolve("fan"));
    }

    #[tokio::test]
    async fn test_fire_and_forget_broadcaster_forwards_error_once() {
        let h = harness();
        let fan = Broadcaster::build(Worker::builder("fan"), false, &h.registry).unwrap();
        let (out, mut rx) = sink(&h.registry, "out");
        let (branch_out, mut branch_rx) = sink(&h.registry, "branch-out");
        fan.worker().connect(&out);
        let branch = Worker::builder("branch").build(&h.registry).unwrap();
        fan.attach(&branch).connect(&branch_out);

        fan.worker().call_err(&TaskBox::new(), WorkerError::NotFound("q".into())).await;

        assert_eq!(next(&mut rx).await.unwrap_err().code(), 404);
        assert!(rx.try_recv().is_err());
        assert!(branch_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handler_pool_fills_to_concurrency_on_backlog() {
        let h = harness();
        let submit = h.queuer("submit", QueuerConfig::with_mode(QueuerMode::Pusher));
        let (out, mut rx) = sink(&h.registry, "out");
        submit.worker().connect(&out);
        submit.start().await.unwrap();

        // Backlog queued before any handler is running.
        let _listener = h.broker.subscribe("resize").await.unwrap();
        let bx = TaskBox::new();
        for index in 0..5 {
            submit
                .push_task(&bx, &Payload::new(task("resize", "return")).with_index(index))
                .await
                .unwrap();
        }
        assert_eq!(h.broker.queue_len("resize"), 5);

        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let work = {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            Worker::builder("work")
                .on_act(move |worker, bx, data| {
                    let in_flight = in_flight.clone();
                    let peak = peak.clone();
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        worker.pass(&bx, data, None).await;
                        Ok::<(), WorkerError>(())
                    }
                })
                .build(&h.registry)
                .unwrap()
        };
        let config = QueuerConfig {
            concurrency: 3,
            ..QueuerConfig::with_mode(QueuerMode::Handler)
        };
        let handler = h.queuer("resize", config);
        let done = h.resolver("done", "resize", false);
        handler.worker().connect(&work).connect(&done);
        handler.start().await.unwrap();

        // Two tasks wait for a free slot and still complete.
        for _ in 0..5 {
            next(&mut rx).await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(h.broker.queue_len("resize"), 0);
        assert_eq!(submit.origin_count(), 0);

        handler.stop();
        submit.stop();
    }

    #[tokio::test]
    async fn test_handler_and_pusher_round_trip() {
        let h = harness();
        let handler = h.queuer("resize", QueuerConfig::with_mode(QueuerMode::Handler));
        let work = Worker::builder("work")
            .on_act(|worker, bx, data| async move {
                let n = data.value["n"].as_i64().unwrap_or_default();
                worker.pass(&bx, Payload::new(json!({ "n": n * 2 })), None).await;
                Ok::<(), WorkerError>(())
            })
            .build(&h.registry)
            .unwrap();
        let done = h.resolver("done", "resize", false);
        handler.worker().connect(&work).connect(&done);

        let submit = h.queuer("submit", QueuerConfig::with_mode(QueuerMode::Pusher));
        let (out, mut rx) = sink(&h.registry, "out");
        submit.worker().connect(&out);

        handler.start().await.unwrap();
        submit.start().await.unwrap();

        let bx = TaskBox::with_rid("req-1");
        let mut data = task("resize", "return");
        data["n"] = json!(21);
        submit.worker().call(&bx, Payload::new(data)).await;
        assert!(submit.is_tracking(&bx.bid().unwrap()));

        let result = next(&mut rx).await.unwrap();
        assert_eq!(result.value, json!({ "n": 42 }));
        assert_eq!(result.last, Some(true));
        assert_eq!(submit.origin_count(), 0);

        handler.stop();
        submit.stop();
    }

    #[tokio::test]
    async fn test_remote_error_fails_the_origin_box() {
        let h = harness();
        let handler = h.queuer("resize", QueuerConfig::with_mode(QueuerMode::Handler));
        let broken = Worker::builder("broken")
            .on_act(|_, _, _| async {
                Err::<(), _>(WorkerError::Application {
                    code: 422,
                    kind: "Unprocessable".into(),
                    message: "bad image".into(),
                })
            })
            .build(&h.registry)
            .unwrap();
        let done = h.resolver("done", "resize", false);
        handler.worker().connect(&broken).connect(&done);

        let submit = h.queuer("submit", QueuerConfig::with_mode(QueuerMode::Pusher));
        let (out, mut rx) = sink(&h.registry, "out");
        submit.worker().connect(&out);
        handler.start().await.unwrap();
        submit.start().await.unwrap();

        submit.worker().call(&TaskBox::new(), Payload::new(task("resize", "return"))).await;

        let error = next(&mut rx).await.unwrap_err();
        assert_eq!(error.code(), 422);
        assert_eq!(error.kind(), "Unprocessable");
        assert_eq!(error.detail(), "bad image");
    }

    #[tokio::test]
    async fn test_result_expires_after_ttl() {
        let h = harness();
        let config = QueuerConfig {
            expire_ms: 1_000,
            ..QueuerConfig::with_mode(QueuerMode::Handler)
        };
        let handler = h.queuer("resize", config);
        let submit = h.queuer("submit", QueuerConfig::with_mode(QueuerMode::Pusher));
        let (out, mut rx) = sink(&h.registry, "out");
        submit.worker().connect(&out);
        let _listener = h.broker.subscribe("resize").await.unwrap();

        let bx = TaskBox::new();
        let data = task("resize", "return");
        submit.push_task(&bx, &Payload::new(data.clone())).await.unwrap();
        let bid = bx.bid().unwrap();
        let id = format!("{}:0", bid);

        let route = Route::from_data(&data).unwrap();
        handler
            .core()
            .push_result(handler.worker(), &bx.ids(), &route, None, Ok(Payload::new(json!("done"))))
            .await;
        assert!(h.broker.has_key(&id));

        h.clock.advance(Duration::from_millis(1_001));
        assert!(!h.broker.has_key(&id));
        assert_eq!(h.broker.get(&id).await.unwrap(), None);

        submit.handle_result(id.as_bytes()).await;
        assert_eq!(next(&mut rx).await.unwrap_err(), WorkerError::ResultExpired { id });
        assert!(!submit.is_tracking(&bid));
    }

    #[tokio::test]
    async fn test_result_read_within_ttl_is_deleted() {
        let h = harness();
        let handler = h.queuer("resize", QueuerConfig::with_mode(QueuerMode::Handler));
        let submit = h.queuer("submit", QueuerConfig::with_mode(QueuerMode::Pusher));
        let (out, mut rx) = sink(&h.registry, "out");
        submit.worker().connect(&out);
        let _listener = h.broker.subscribe("resize").await.unwrap();

        let bx = TaskBox::new();
        let data = task("resize", "return");
        submit.push_task(&bx, &Payload::new(data.clone())).await.unwrap();
        let id = format!("{}:0", bx.bid().unwrap());

        let route = Route::from_data(&data).unwrap();
        handler
            .core()
            .push_result(handler.worker(), &bx.ids(), &route, None, Ok(Payload::new(json!("done"))))
            .await;
        h.clock.advance(Duration::from_millis(999));

        submit.handle_result(id.as_bytes()).await;
        let result = next(&mut rx).await.unwrap();
        assert_eq!(result.value, json!("done"));
        assert_eq!(result.index, Some(0));
        assert!(!h.broker.has_key(&id));
    }

    #[tokio::test]
    async fn test_finalization_counts_each_queue_once() {
        let h = harness();
        let config = QueuerConfig {
            final_queues: vec!["a".into(), "b".into()],
            ..QueuerConfig::with_mode(QueuerMode::Handler)
        };
        let queuer = h.queuer("collector", config);

        assert!(!queuer.check_final("bid-1", "a").await.unwrap());
        assert!(!queuer.check_final("bid-1", "a").await.unwrap());
        assert!(!queuer.check_final("bid-1", "c").await.unwrap());
        assert!(queuer.check_final("bid-1", "b").await.unwrap());
        assert!(!queuer.check_final("bid-1", "a").await.unwrap());

        // Independent per bid.
        assert!(!queuer.check_final("bid-2", "b").await.unwrap());
    }

    #[tokio::test]
    async fn test_without_final_queues_every_result_is_final() {
        let h = harness();
        let queuer = h.queuer("collector", QueuerConfig::with_mode(QueuerMode::Handler));
        assert!(queuer.check_final("bid-1", "anything").await.unwrap());
        assert!(queuer.check_final("bid-1", "anything").await.unwrap());
    }

    #[tokio::test]
    async fn test_only_the_originating_queuer_releases_the_box() {
        let h = harness();
        let first = h.queuer("first", QueuerConfig::with_mode(QueuerMode::Pusher));
        let second = h.queuer("second", QueuerConfig::with_mode(QueuerMode::Pusher));
        let (first_out, mut first_rx) = sink(&h.registry, "first-out");
        let (second_out, mut second_rx) = sink(&h.registry, "second-out");
        first.worker().connect(&first_out);
        second.worker().connect(&second_out);
        let handler = h.queuer("resize", QueuerConfig::with_mode(QueuerMode::Handler));
        let _listener = h.broker.subscribe("resize").await.unwrap();

        let bx = TaskBox::new();
        let data = task("resize", "return");
        first.push_task(&bx, &Payload::new(data.clone())).await.unwrap();
        let bid = bx.bid().unwrap();

        let route = Route::from_data(&data).unwrap();
        handler
            .core()
            .push_result(handler.worker(), &bx.ids(), &route, None, Ok(Payload::new(json!(1))))
            .await;

        // Every pusher hears the notification on the shared channel.
        let message = format!("{}:0", bid);
        second.handle_result(message.as_bytes()).await;
        first.handle_result(message.as_bytes()).await;
        first.handle_result(message.as_bytes()).await;

        assert_eq!(next(&mut first_rx).await.unwrap().value, json!(1));
        assert!(first_rx.try_recv().is_err());
        assert!(second_rx.try_recv().is_err());
        assert!(!first.is_tracking(&bid));
        assert!(!second.is_tracking(&bid));
    }

    #[tokio::test]
    async fn test_origin_waits_for_every_result() {
        let h = harness();
        let submit = h.queuer("submit", QueuerConfig::with_mode(QueuerMode::Pusher));
        let (out, mut rx) = sink(&h.registry, "out");
        submit.worker().connect(&out);
        let handler = h.queuer("resize", QueuerConfig::with_mode(QueuerMode::Handler));
        let _listener = h.broker.subscribe("resize").await.unwrap();

        let bx = TaskBox::new();
        let data = task("resize", "return");
        for index in 0..2 {
            submit.push_task(&bx, &Payload::new(data.clone()).with_index(index)).await.unwrap();
        }
        let bid = bx.bid().unwrap();
        let route = Route::from_data(&data).unwrap();
        for index in 0..2 {
            handler
                .core()
                .push_result(handler.worker(), &bx.ids(), &route, Some(index), Ok(Payload::new(json!(index))))
                .await;
        }

        submit.handle_result(format!("{}:1", bid).as_bytes()).await;
        assert!(submit.is_tracking(&bid));
        submit.handle_result(format!("{}:0", bid).as_bytes()).await;
        assert!(!submit.is_tracking(&bid));

        assert_eq!(next(&mut rx).await.unwrap().index, Some(1));
        assert_eq!(next(&mut rx).await.unwrap().index, Some(0));
    }

    #[tokio::test]
    async fn test_streamer_tracks_by_stream_id() {
        let h = harness();
        let stream = h.queuer("stream", QueuerConfig::with_mode(QueuerMode::Streamer));
        let _listener = h.broker.subscribe("frames").await.unwrap();

        let bx = TaskBox::new();
        stream.push_task(&bx, &Payload::new(task("frames", "stream"))).await.unwrap();

        let sid = bx.sid().expect("stream id minted");
        assert!(stream.is_tracking(&sid));
        assert!(!stream.is_tracking(&bx.bid().unwrap()));
        assert!(stream.release(&sid));
        assert_eq!(stream.origin_count(), 0);
    }

    #[tokio::test]
    async fn test_untracked_push_expects_no_result() {
        let h = harness();
        let submit = h.queuer("submit", QueuerConfig::with_mode(QueuerMode::Pusher));
        let _listener = h.broker.subscribe("audit").await.unwrap();

        submit.push_task(&TaskBox::new(), &Payload::new(task("audit", "none"))).await.unwrap();

        assert_eq!(submit.origin_count(), 0);
        assert_eq!(h.broker.queue_len("audit"), 1);
    }

    #[tokio::test]
    async fn test_simple_mode_delivers_to_outlet() {
        let h = harness();
        let local = h.queuer("local", QueuerConfig::default());
        let work = Worker::builder("work")
            .on_act(|worker, bx, data| async move {
                let text = data.value.as_str().unwrap_or_default().to_uppercase();
                worker.pass(&bx, Payload::new(json!(text)), None).await;
                Ok::<(), WorkerError>(())
            })
            .build(&h.registry)
            .unwrap();
        let done = h.resolver("done", "local", false);
        local.worker().connect(&work).connect(&done);
        let (out, mut rx) = sink(&h.registry, "out");
        local.set_outlet(Some(out));

        let bx = TaskBox::new();
        local.worker().call(&bx, Payload::new(json!("hello"))).await;

        assert_eq!(next(&mut rx).await.unwrap().value, json!("HELLO"));
        assert!(!bx.has_resolve("local"));
        assert_eq!(h.broker.write_count(), 0);
    }

    #[tokio::test]
    async fn test_broker_failure_untracks_and_fails() {
        let h = harness();
        let submit = h.queuer("submit", QueuerConfig::with_mode(QueuerMode::Pusher));
        let (out, mut rx) = sink(&h.registry, "out");
        submit.worker().connect(&out);
        let _listener = h.broker.subscribe("resize").await.unwrap();
        h.broker.fail_next("connection reset");

        submit.worker().call(&TaskBox::new(), Payload::new(task("resize", "return"))).await;

        assert_eq!(next(&mut rx).await.unwrap_err().code(), 502);
        assert_eq!(submit.origin_count(), 0);
    }
}
