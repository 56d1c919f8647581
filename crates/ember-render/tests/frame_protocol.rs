// SPDX-License-Identifier: CEPL-1.0
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use ember_render::mock::{AcquireScript, Call, MockDevice, PresentScript};
use ember_render::{
    DeviceError, EngineState, Extent2D, FrameStatus, PresentConfig, PresentError,
    PresentationEngine,
};

const LATENCY: Duration = Duration::from_millis(4);

fn engine_with(
    device: MockDevice,
    config: PresentConfig,
) -> (PresentationEngine<MockDevice>, Rc<Cell<Extent2D>>) {
    let window = Rc::new(Cell::new(Extent2D::new(800, 600)));
    let source = Rc::clone(&window);
    let engine = PresentationEngine::init(device, window.get(), move || source.get(), config)
        .expect("engine init");
    (engine, window)
}

fn engine() -> (PresentationEngine<MockDevice>, Rc<Cell<Extent2D>>) {
    engine_with(
        MockDevice::default().with_gpu_latency(LATENCY),
        PresentConfig::default(),
    )
}

fn assert_clean_shutdown(engine: PresentationEngine<MockDevice>) {
    let device = engine.shutdown();
    assert!(device.violations().is_empty(), "{:#?}", device.violations());
    assert_eq!(device.live_objects(), 0, "objects leaked");
}

#[test]
fn ten_frames_two_in_flight() {
    let (mut engine, _window) = engine();
    assert_eq!(engine.frames_in_flight(), 2);
    assert_eq!(engine.image_count(), 3);

    for f in 0..10u64 {
        match engine.advance_frame().unwrap() {
            FrameStatus::Presented { frame, image_index } => {
                assert_eq!(frame, f);
                assert!((image_index as usize) < engine.image_count());
            }
            other => panic!("frame {f}: {other:?}"),
        }
        assert_eq!(engine.state(), EngineState::Idle);
    }
    assert_eq!(engine.frame_counter(), 10);

    let stats = engine.device().stats().clone();
    assert_eq!(stats.submits, 10);
    assert_eq!(stats.presents, 10);
    assert!(stats.max_outstanding <= 2, "outstanding {}", stats.max_outstanding);
    assert!(stats.max_block <= LATENCY, "blocked {:?}", stats.max_block);
    assert_clean_shutdown(engine);
}

#[test]
fn outstanding_work_bounded_by_slot_count() {
    for frames_in_flight in 1..=4 {
        let config = PresentConfig {
            frames_in_flight,
            ..PresentConfig::default()
        };
        let (mut engine, _window) = engine_with(MockDevice::default().with_gpu_latency(LATENCY), config);
        for _ in 0..12 {
            engine.advance_frame().unwrap();
        }
        let outstanding = engine.device().stats().max_outstanding;
        assert!(outstanding <= frames_in_flight, "F={frames_in_flight}: {outstanding}");
        assert_clean_shutdown(engine);
    }
}

#[test]
fn first_use_of_each_slot_does_not_block() {
    let (mut engine, _window) = engine();
    engine.advance_frame().unwrap();
    engine.advance_frame().unwrap();
    assert_eq!(engine.device().stats().total_block, Duration::ZERO);
    engine.advance_frame().unwrap();
    assert!(engine.device().stats().total_block > Duration::ZERO);
    assert_clean_shutdown(engine);
}

#[test]
fn out_of_date_acquire_recovers_without_skipping_a_frame() {
    let (mut engine, _window) = engine();
    engine.device_mut().script_acquire(AcquireScript::OutOfDate);

    assert_eq!(engine.advance_frame().unwrap(), FrameStatus::Recovered);
    assert_eq!(engine.frame_counter(), 0);
    assert_eq!(engine.recreations(), 1);

    match engine.advance_frame().unwrap() {
        FrameStatus::Presented { frame, .. } => assert_eq!(frame, 0),
        other => panic!("{other:?}"),
    }

    let requests = engine.device().swapchain_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].old_swapchain, None);
    assert!(requests[1].old_swapchain.is_some());
    assert_clean_shutdown(engine);
}

#[test]
fn stale_present_recovers_after_advancing() {
    let (mut engine, _window) = engine();
    engine.device_mut().script_present(PresentScript::OutOfDate);
    assert_eq!(engine.advance_frame().unwrap(), FrameStatus::Recovered);
    assert_eq!(engine.frame_counter(), 1);

    engine.device_mut().script_present(PresentScript::Suboptimal);
    assert_eq!(engine.advance_frame().unwrap(), FrameStatus::Recovered);
    assert_eq!(engine.frame_counter(), 2);
    assert_eq!(engine.recreations(), 2);

    assert!(matches!(
        engine.advance_frame().unwrap(),
        FrameStatus::Presented { frame: 2, .. }
    ));
    assert_clean_shutdown(engine);
}

#[test]
fn suboptimal_acquire_presents_then_rebuilds() {
    let (mut engine, _window) = engine();
    engine.device_mut().script_acquire(AcquireScript::Suboptimal);
    assert_eq!(engine.advance_frame().unwrap(), FrameStatus::Recovered);
    assert_eq!(engine.device().stats().presents, 1);
    assert_eq!(engine.recreations(), 1);
    assert_clean_shutdown(engine);
}

#[test]
fn persistent_staleness_is_fatal() {
    let (mut engine, _window) = engine();
    for _ in 0..10 {
        engine.device_mut().script_acquire(AcquireScript::OutOfDate);
    }
    for _ in 0..3 {
        assert_eq!(engine.advance_frame().unwrap(), FrameStatus::Recovered);
    }
    let err = engine.advance_frame().unwrap_err();
    assert!(matches!(err, PresentError::PersistentlyStale { attempts: 3 }), "{err:?}");
    assert!(!err.is_device_loss());
    assert_eq!(engine.frame_counter(), 0);
}

#[test]
fn successful_frame_resets_stale_budget() {
    let (mut engine, _window) = engine();
    for round in 0..3 {
        for _ in 0..3 {
            engine.device_mut().script_acquire(AcquireScript::OutOfDate);
        }
        for _ in 0..3 {
            assert_eq!(engine.advance_frame().unwrap(), FrameStatus::Recovered, "round {round}");
        }
        assert!(matches!(engine.advance_frame().unwrap(), FrameStatus::Presented { .. }));
    }
    assert_eq!(engine.recreations(), 9);
    assert_clean_shutdown(engine);
}

#[test]
fn hung_gpu_with_timeout_reports_fence_timeout() {
    let config = PresentConfig {
        fence_timeout: Some(Duration::from_millis(50)),
        ..PresentConfig::default()
    };
    let (mut engine, _window) = engine_with(MockDevice::default(), config);
    engine.device_mut().hang_gpu();

    engine.advance_frame().unwrap();
    engine.advance_frame().unwrap();
    let err = engine.advance_frame().unwrap_err();
    assert!(matches!(err, PresentError::FenceTimeout(d) if d == Duration::from_millis(50)));
    assert!(err.is_device_loss());
}

#[test]
fn hung_gpu_without_timeout_is_device_loss() {
    let (mut engine, _window) = engine();
    engine.device_mut().hang_gpu();
    engine.advance_frame().unwrap();
    engine.advance_frame().unwrap();
    let err = engine.advance_frame().unwrap_err();
    assert!(matches!(
        err,
        PresentError::Device {
            source: DeviceError::DeviceLost,
            ..
        }
    ));
    assert!(err.is_device_loss());
}

#[test]
fn acquire_failure_is_fatal() {
    let (mut engine, _window) = engine();
    engine
        .device_mut()
        .script_acquire(AcquireScript::Fail(DeviceError::SurfaceLost));
    let err = engine.advance_frame().unwrap_err();
    assert!(matches!(
        err,
        PresentError::Device {
            op: "acquire next image",
            source: DeviceError::SurfaceLost
        }
    ));
}

#[test]
fn camera_change_rerecords_every_image() {
    let (mut engine, _window) = engine();
    engine.advance_frame().unwrap();
    let before = engine.device().stats().recordings;

    let mut camera = ember_render::IDENTITY_TRANSFORM;
    camera[3][2] = -5.0;
    engine.set_camera(camera).unwrap();

    let stats = engine.device().stats();
    assert_eq!(stats.recordings - before, engine.image_count() as u64);
    assert_eq!(stats.last_camera, Some(camera));
    assert!(engine.device().calls().contains(&Call::WaitIdle));

    engine.advance_frame().unwrap();
    assert_clean_shutdown(engine);
}

#[test]
fn camera_change_during_pending_resize_is_recorded_by_rebuild() {
    let (mut engine, window) = engine();
    engine.advance_frame().unwrap();

    let resized = Extent2D::new(1024, 768);
    window.set(resized);
    engine.notify_resized(resized);
    engine.device_mut().clear_calls();
    let before = engine.device().stats().recordings;

    let mut camera = ember_render::IDENTITY_TRANSFORM;
    camera[3][2] = -3.0;
    engine.set_camera(camera).unwrap();
    assert_eq!(engine.device().stats().recordings, before);
    assert_eq!(
        engine
            .device()
            .count_calls(|c| matches!(c, Call::WaitIdle | Call::RecordDraw { .. })),
        0
    );

    assert!(matches!(engine.advance_frame().unwrap(), FrameStatus::Presented { .. }));
    assert_eq!(engine.extent(), Some(resized));
    let stats = engine.device().stats();
    assert_eq!(stats.recordings - before, engine.image_count() as u64);
    assert_eq!(stats.last_camera, Some(camera));
    assert_clean_shutdown(engine);
}
