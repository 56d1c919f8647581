// SPDX-License-Identifier: CEPL-1.0
use std::cell::Cell;
use std::rc::Rc;

use ember_render::mock::{Call, MockDevice, ObjectKind};
use ember_render::{
    EngineState, Extent2D, FrameStatus, PresentConfig, PresentError, PresentMode,
    PresentationEngine, QueueFamilyIndices, SharingMode, Swapchain, SwapchainDesc,
    SwapchainPolicy,
};

fn start(device: MockDevice) -> (PresentationEngine<MockDevice>, Rc<Cell<Extent2D>>) {
    let window = Rc::new(Cell::new(Extent2D::new(800, 600)));
    let source = Rc::clone(&window);
    let engine = PresentationEngine::init(
        device,
        window.get(),
        move || source.get(),
        PresentConfig::default(),
    )
    .expect("engine init");
    (engine, window)
}

fn resize(engine: &mut PresentationEngine<MockDevice>, window: &Cell<Extent2D>, extent: Extent2D) {
    window.set(extent);
    engine.notify_resized(extent);
}

fn without_hint(desc: SwapchainDesc) -> SwapchainDesc {
    SwapchainDesc {
        old_swapchain: None,
        ..desc
    }
}

#[test]
fn image_count_respects_surface_bounds() {
    for (min, max, expected) in [(2, 8, 3), (3, 3, 3), (2, 0, 3), (1, 2, 2)] {
        let mut device = MockDevice::default();
        device.support_mut().capabilities.min_image_count = min;
        device.support_mut().capabilities.max_image_count = max;
        let (engine, _window) = start(device);

        let chain = engine.swapchain().expect("chain");
        assert_eq!(chain.image_count(), expected, "min {min} max {max}");
        assert_eq!(chain.views().len(), chain.image_count());
        assert_eq!(chain.framebuffers().len(), chain.image_count());
        assert_eq!(engine.command_buffers().len(), chain.image_count());

        let device = engine.shutdown();
        assert_eq!(device.live_objects(), 0);
    }
}

#[test]
fn defaults_pick_srgb_bgra_and_fifo() {
    let (engine, _window) = start(MockDevice::default());
    let desc = engine.device().swapchain_requests()[0];
    assert_eq!(desc.surface_format, ember_render::SurfaceFormat::BGRA8_UNORM_SRGB);
    assert_eq!(desc.present_mode, PresentMode::Fifo);
    assert_eq!(desc.extent, Extent2D::new(800, 600));
    assert_eq!(desc.sharing, SharingMode::Exclusive);
    engine.shutdown();
}

#[test]
fn separate_present_family_shares_concurrently() {
    let mut device = MockDevice::default();
    device.set_queue_families(QueueFamilyIndices {
        graphics: Some(0),
        compute: Some(0),
        present: Some(1),
    });
    let (engine, _window) = start(device);
    let desc = engine.device().swapchain_requests()[0];
    assert_eq!(desc.sharing, SharingMode::Concurrent([0, 1]));
    engine.shutdown();
}

#[test]
fn no_present_family_fails_init() {
    let mut device = MockDevice::default();
    device.set_queue_families(QueueFamilyIndices {
        graphics: Some(0),
        compute: Some(0),
        present: None,
    });
    let err = PresentationEngine::init(
        device,
        Extent2D::new(640, 480),
        || Extent2D::new(640, 480),
        PresentConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PresentError::CapabilityNotFound(_)), "{err:?}");
}

#[test]
fn zero_extent_init_is_refused() {
    let err = PresentationEngine::init(
        MockDevice::default(),
        Extent2D::new(0, 600),
        || Extent2D::new(0, 600),
        PresentConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PresentError::ZeroExtent(_)));
}

#[test]
fn recreation_is_idempotent_for_equal_extents() {
    let (mut engine, window) = start(MockDevice::default());
    engine.advance_frame().unwrap();
    let baseline = engine.device().live_objects();

    let a = Extent2D::new(1024, 768);
    let b = Extent2D::new(640, 360);
    for extent in [a, b, a] {
        resize(&mut engine, &window, extent);
        assert!(matches!(engine.advance_frame().unwrap(), FrameStatus::Presented { .. }));
        assert_eq!(engine.extent(), Some(extent));
        assert_eq!(engine.device().live_objects(), baseline, "leak after resize to {extent}");
    }

    let requests = engine.device().swapchain_requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(without_hint(requests[1]), without_hint(requests[3]));
    assert!(requests[1..].iter().all(|d| d.old_swapchain.is_some()));

    let device = engine.shutdown();
    assert!(device.violations().is_empty(), "{:#?}", device.violations());
    assert_eq!(device.live_objects(), 0);
}

#[test]
fn same_size_notification_does_not_rebuild() {
    let (mut engine, _window) = start(MockDevice::default());
    engine.notify_resized(Extent2D::new(800, 600));
    engine.advance_frame().unwrap();
    assert_eq!(engine.recreations(), 0);
    engine.shutdown();
}

#[test]
fn minimized_window_pauses_without_teardown() {
    let (mut engine, window) = start(MockDevice::default());
    engine.advance_frame().unwrap();
    engine.device_mut().clear_calls();

    resize(&mut engine, &window, Extent2D::new(0, 0));
    assert_eq!(engine.state(), EngineState::Paused);
    for _ in 0..5 {
        assert_eq!(engine.advance_frame().unwrap(), FrameStatus::Paused);
    }
    assert_eq!(engine.frame_counter(), 1);

    let device = engine.device();
    assert_eq!(device.count_calls(|c| matches!(c, Call::CreateSwapchain(_))), 0);
    assert_eq!(device.count_calls(|c| matches!(c, Call::DestroySwapchain(_))), 0);
    assert_eq!(device.count_calls(|c| matches!(c, Call::Submit(_))), 0);
    assert_eq!(device.count_calls(|c| matches!(c, Call::Acquire(_))), 0);
    assert_eq!(device.live_count(ObjectKind::Swapchain), 1);

    resize(&mut engine, &window, Extent2D::new(1280, 720));
    assert!(matches!(
        engine.advance_frame().unwrap(),
        FrameStatus::Presented { frame: 1, .. }
    ));
    assert_eq!(engine.extent(), Some(Extent2D::new(1280, 720)));
    assert_eq!(engine.recreations(), 1);

    let device = engine.shutdown();
    assert!(device.violations().is_empty(), "{:#?}", device.violations());
    assert_eq!(device.live_objects(), 0);
}

#[test]
fn surface_resize_detected_at_acquire() {
    let (mut engine, window) = start(MockDevice::default());
    engine.advance_frame().unwrap();

    // The window system resized the surface before the app heard about it.
    window.set(Extent2D::new(1920, 1080));
    engine.device_mut().set_surface_extent(Extent2D::new(1920, 1080));

    assert_eq!(engine.advance_frame().unwrap(), FrameStatus::Recovered);
    assert_eq!(engine.extent(), Some(Extent2D::new(1920, 1080)));
    assert!(matches!(engine.advance_frame().unwrap(), FrameStatus::Presented { .. }));
    engine.shutdown();
}

#[test]
fn surface_reporting_zero_pauses() {
    let (mut engine, window) = start(MockDevice::default());
    engine.advance_frame().unwrap();

    engine.device_mut().set_surface_extent(Extent2D::new(0, 0));
    engine.device_mut().clear_calls();
    assert_eq!(engine.advance_frame().unwrap(), FrameStatus::Paused);
    assert_eq!(engine.state(), EngineState::Paused);
    // The chain survives the pause.
    assert_eq!(engine.image_count(), 3);
    assert_eq!(engine.device().live_count(ObjectKind::Swapchain), 1);
    assert_eq!(
        engine
            .device()
            .count_calls(|c| matches!(c, Call::DestroySwapchain(_) | Call::WaitIdle)),
        0
    );
    assert_eq!(engine.advance_frame().unwrap(), FrameStatus::Paused);

    engine.device_mut().set_surface_extent(Extent2D::new(300, 200));
    window.set(Extent2D::new(300, 200));
    assert!(matches!(engine.advance_frame().unwrap(), FrameStatus::Presented { .. }));
    assert_eq!(engine.extent(), Some(Extent2D::new(300, 200)));

    let device = engine.shutdown();
    assert_eq!(device.live_objects(), 0);
}

#[test]
fn failed_rebuild_leaves_nothing_behind() {
    let (mut engine, window) = start(MockDevice::default());
    engine.advance_frame().unwrap();

    engine.device_mut().fail_next_swapchains(1);
    resize(&mut engine, &window, Extent2D::new(500, 500));
    let err = engine.advance_frame().unwrap_err();
    assert!(matches!(err, PresentError::Construction { what: "swap chain", .. }));
    assert_eq!(engine.device().live_count(ObjectKind::Swapchain), 0);
    assert_eq!(engine.device().live_count(ObjectKind::Framebuffer), 0);

    // The next frame tries again.
    assert!(matches!(engine.advance_frame().unwrap(), FrameStatus::Presented { .. }));
    let device = engine.shutdown();
    assert_eq!(device.live_objects(), 0);
}

#[test]
fn failed_recording_after_rebuild_leaves_nothing_behind() {
    let (mut engine, window) = start(MockDevice::default());
    engine.advance_frame().unwrap();

    engine.device_mut().fail_next_command_buffers(1);
    resize(&mut engine, &window, Extent2D::new(640, 480));
    let err = engine.advance_frame().unwrap_err();
    assert!(matches!(err, PresentError::Construction { what: "command buffers", .. }));
    assert_eq!(engine.device().live_count(ObjectKind::Swapchain), 0);
    assert_eq!(engine.device().live_count(ObjectKind::ImageView), 0);
    assert_eq!(engine.device().live_count(ObjectKind::Framebuffer), 0);
    assert_eq!(engine.device().live_count(ObjectKind::CommandBuffer), 0);

    let device = engine.shutdown();
    assert!(device.violations().is_empty(), "{:#?}", device.violations());
    assert_eq!(device.live_objects(), 0);
}

#[test]
fn partial_chain_is_unwound() {
    let mut device = MockDevice::default();
    device.fail_next_framebuffers(1);
    let err = Swapchain::build(
        &mut device,
        &SwapchainPolicy::default(),
        Extent2D::new(800, 600),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, PresentError::Construction { what: "framebuffer", .. }));
    assert_eq!(device.live_objects(), 0);
}

#[test]
fn requested_mailbox_is_honoured_when_offered() {
    let window = Extent2D::new(800, 600);
    let config = PresentConfig {
        policy: SwapchainPolicy {
            present_mode: PresentMode::Mailbox,
            ..SwapchainPolicy::default()
        },
        ..PresentConfig::default()
    };
    let engine =
        PresentationEngine::init(MockDevice::default(), window, move || window, config).unwrap();
    assert_eq!(engine.present_mode(), Some(PresentMode::Mailbox));
    engine.shutdown();
}
