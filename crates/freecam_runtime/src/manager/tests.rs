// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;
use crate::events::{TimelineEvent, TimelineEventKind};
use crate::events::TimelineEventKind::{PlaybackCompleted, PlaybackStarted, PlaybackStopped};
use crate::host::{CameraState, FreeLookCamera, MessageBus};
use crate::sim::SimulatedHost;
use crate::state::{PlaybackOptions, RecordingOptions};
use freecam_sequencer::InterpolationMode;
use std::path::Path;
use std::sync::{mpsc, Arc, Weak};

const PLUGIN: PluginHandle = PluginHandle(7);
const OTHER: PluginHandle = PluginHandle(9);

fn setup() -> (Arc<SimulatedHost>, TimelineManager) {
    let host = Arc::new(SimulatedHost::new());
    host.set_delta(1.0);
    let manager = TimelineManager::new(FrameworkSettings::default(), host.services());
    manager.register_plugin(PLUGIN).unwrap();
    (host, manager)
}

fn linear(time: f32) -> Transition {
    Transition::at(time, InterpolationMode::Linear)
}

/// Straight line from the origin to (10, 0, 0) over `duration` seconds
fn line(manager: &TimelineManager, duration: f32) -> TimelineId {
    let id = manager.register_timeline(PLUGIN).unwrap();
    manager
        .add_translation_point(PLUGIN, id, linear(0.0), Point3::ZERO)
        .unwrap();
    manager
        .add_translation_point(PLUGIN, id, linear(duration), Point3::new(10.0, 0.0, 0.0))
        .unwrap();
    id
}

/// Constant zero rotation for `duration` seconds
fn still(manager: &TimelineManager, duration: f32) -> TimelineId {
    let id = manager.register_timeline(PLUGIN).unwrap();
    manager
        .add_rotation_point(PLUGIN, id, linear(0.0), Rotation::ZERO)
        .unwrap();
    manager
        .add_rotation_point(PLUGIN, id, linear(duration), Rotation::ZERO)
        .unwrap();
    id
}

fn kinds(host: &SimulatedHost) -> Vec<(TimelineEventKind, TimelineId)> {
    host.events().iter().map(|e| (e.kind, e.timeline)).collect()
}

fn camera_x(host: &SimulatedHost) -> f32 {
    host.free_look_camera().map(|c| c.translation.x).unwrap_or(f32::NAN)
}

fn camera_yaw(host: &SimulatedHost) -> f32 {
    host.free_look_camera().map(|c| c.rotation.yaw).unwrap_or(f32::NAN)
}

#[test]
fn test_play_to_end() {
    let (host, manager) = setup();
    let id = line(&manager, 2.0);
    assert_eq!(id, TimelineId(1));

    manager
        .start_playback(PLUGIN, id, PlaybackOptions::at_speed(1.0))
        .unwrap();
    assert_eq!(manager.active_timeline_id(), id);
    assert!(host.mode().is_free_look());
    assert!(!host.menus_shown());

    manager.update();
    assert!((camera_x(&host) - 5.0).abs() < 1e-4);
    assert!(manager.is_playback_running(PLUGIN, id).unwrap());

    manager.update();
    assert_eq!(manager.active_timeline_id(), TimelineId::NONE);
    assert!(!manager.is_playback_running(PLUGIN, id).unwrap());
    assert!(matches!(host.mode(), CameraState::ThirdPerson { .. }));
    assert!(host.menus_shown());
    assert_eq!(kinds(&host), vec![(PlaybackStarted, id), (PlaybackStopped, id)]);
}

#[test]
fn test_speed_and_duration() {
    let (host, manager) = setup();
    let id = line(&manager, 4.0);

    manager
        .start_playback(PLUGIN, id, PlaybackOptions::over_duration(2.0))
        .unwrap();
    manager.update();
    // 4s timeline squeezed into 2s: one tick covers half of it
    assert!((camera_x(&host) - 5.0).abs() < 1e-4);
    assert!((manager.playback_time(PLUGIN, id).unwrap() - 2.0).abs() < 1e-4);
}

#[test]
fn test_start_time_option() {
    let (host, manager) = setup();
    let id = line(&manager, 4.0);

    manager
        .start_playback(PLUGIN, id, PlaybackOptions::at_speed(1.0).starting_at(2.0))
        .unwrap();
    manager.update();
    assert!((camera_x(&host) - 7.5).abs() < 1e-4);
}

#[test]
fn test_single_active_timeline() {
    let (_host, manager) = setup();
    let a = line(&manager, 2.0);
    let b = line(&manager, 2.0);

    manager
        .start_playback(PLUGIN, a, PlaybackOptions::default())
        .unwrap();
    assert!(matches!(
        manager.start_playback(PLUGIN, b, PlaybackOptions::default()),
        Err(TimelineError::AlreadyActive(active)) if active == a
    ));
    assert!(matches!(
        manager.start_recording(PLUGIN, b, RecordingOptions::default()),
        Err(TimelineError::AlreadyActive(_))
    ));
    assert!(matches!(
        manager.stop_playback(PLUGIN, b),
        Err(TimelineError::NotPlaying(_))
    ));
    assert_eq!(manager.active_timeline_id(), a);
    assert!(manager.is_playback_running(PLUGIN, a).unwrap());
}

#[test]
fn test_single_active_across_owners() {
    let (host, manager) = setup();
    manager.register_plugin(OTHER).unwrap();
    let mine = line(&manager, 2.0);
    let theirs = manager.register_timeline(OTHER).unwrap();
    manager
        .add_translation_point(OTHER, theirs, linear(0.0), Point3::ZERO)
        .unwrap();
    manager
        .add_translation_point(OTHER, theirs, linear(1.0), Point3::new(0.0, 4.0, 0.0))
        .unwrap();

    manager
        .start_playback(PLUGIN, mine, PlaybackOptions::default())
        .unwrap();
    assert!(matches!(
        manager.start_playback(OTHER, theirs, PlaybackOptions::default()),
        Err(TimelineError::AlreadyActive(active)) if active == mine
    ));
    assert!(matches!(
        manager.start_recording(OTHER, theirs, RecordingOptions::default()),
        Err(TimelineError::AlreadyActive(active)) if active == mine
    ));
    assert!(matches!(
        manager.stop_playback(OTHER, mine),
        Err(TimelineError::NotOwned { .. })
    ));
    assert!(matches!(
        manager.switch_playback(OTHER, TimelineId::NONE, theirs),
        Err(TimelineError::NoActiveTimeline(OTHER))
    ));
    assert_eq!(manager.active_timeline_id(), mine);
    assert!(manager.is_playback_running(PLUGIN, mine).unwrap());

    manager.stop_playback(PLUGIN, mine).unwrap();
    manager
        .start_playback(OTHER, theirs, PlaybackOptions::default())
        .unwrap();
    assert_eq!(manager.active_timeline_id(), theirs);
    assert_eq!(
        kinds(&host),
        vec![
            (PlaybackStarted, mine),
            (PlaybackStopped, mine),
            (PlaybackStarted, theirs),
        ]
    );
}

#[test]
fn test_start_preconditions() {
    let (host, manager) = setup();
    let empty = manager.register_timeline(PLUGIN).unwrap();
    assert!(matches!(
        manager.start_playback(PLUGIN, empty, PlaybackOptions::default()),
        Err(TimelineError::NoPoints(_))
    ));

    let id = line(&manager, 2.0);
    host.set_camera_state(CameraState::FreeLook(FreeLookCamera::default()));
    assert!(matches!(
        manager.start_playback(PLUGIN, id, PlaybackOptions::default()),
        Err(TimelineError::AlreadyInFreeLook)
    ));

    host.set_camera_available(false);
    assert!(matches!(
        manager.start_playback(PLUGIN, id, PlaybackOptions::default()),
        Err(TimelineError::CameraUnavailable)
    ));
    assert_eq!(manager.active_timeline_id(), TimelineId::NONE);
}

#[test]
fn test_ownership_isolation() {
    let (_host, manager) = setup();
    manager.register_plugin(OTHER).unwrap();
    let id = line(&manager, 2.0);

    assert!(matches!(
        manager.translation_point_count(OTHER, id),
        Err(TimelineError::NotOwned { owner, .. }) if owner == PLUGIN
    ));
    assert!(matches!(
        manager.start_playback(OTHER, id, PlaybackOptions::default()),
        Err(TimelineError::NotOwned { .. })
    ));
    assert!(matches!(
        manager.remove_translation_point(OTHER, id, 0),
        Err(TimelineError::NotOwned { .. })
    ));
    assert_eq!(manager.translation_point_count(PLUGIN, id).unwrap(), 2);
    assert!(matches!(
        manager.register_timeline(PluginHandle(3)),
        Err(TimelineError::UnregisteredPlugin(_))
    ));
    assert!(matches!(
        manager.translation_point_count(PluginHandle::NONE, id),
        Err(TimelineError::InvalidHandle(_))
    ));
    assert!(matches!(
        manager.translation_point_count(PLUGIN, TimelineId::NONE),
        Err(TimelineError::InvalidTimelineId(_))
    ));
    assert!(matches!(
        manager.translation_point_count(PLUGIN, TimelineId(99)),
        Err(TimelineError::NotFound(_))
    ));

    manager.unregister_plugin(OTHER).unwrap();
    assert_eq!(manager.translation_point_count(PLUGIN, id).unwrap(), 2);
}

#[test]
fn test_plugin_reregistration_drops_timelines() {
    let (host, manager) = setup();
    let id = line(&manager, 2.0);
    manager
        .start_playback(PLUGIN, id, PlaybackOptions::default())
        .unwrap();

    manager.register_plugin(PLUGIN).unwrap();
    assert_eq!(manager.active_timeline_id(), TimelineId::NONE);
    assert!(matches!(
        manager.translation_point_count(PLUGIN, id),
        Err(TimelineError::NotFound(_))
    ));
    assert_eq!(kinds(&host), vec![(PlaybackStarted, id), (PlaybackStopped, id)]);

    // Ids are never reused
    assert_eq!(manager.register_timeline(PLUGIN).unwrap(), TimelineId(2));
}

#[test]
fn test_switch_playback_rotation_offset() {
    let (host, manager) = setup();
    let a = still(&manager, 10.0);
    let b = still(&manager, 10.0);
    let c = still(&manager, 10.0);
    manager.allow_user_rotation(PLUGIN, a, true).unwrap();
    manager.allow_user_rotation(PLUGIN, b, true).unwrap();

    manager
        .start_playback(PLUGIN, a, PlaybackOptions::default())
        .unwrap();
    host.move_free_look(FreeLookCamera {
        rotation: Rotation::pitch_yaw(0.0, 0.5),
        ..FreeLookCamera::default()
    });
    manager.set_user_turning(true);
    manager.update();
    manager.update();
    assert!((camera_yaw(&host) - 0.5).abs() < 1e-4);

    manager.switch_playback(PLUGIN, TimelineId::NONE, b).unwrap();
    assert_eq!(manager.active_timeline_id(), b);
    assert!(!manager.is_playback_running(PLUGIN, a).unwrap());
    assert!(manager.is_playback_running(PLUGIN, b).unwrap());
    manager.update();
    assert!((camera_yaw(&host) - 0.5).abs() < 1e-4);

    manager.switch_playback(PLUGIN, b, c).unwrap();
    manager.update();
    assert!(camera_yaw(&host).abs() < 1e-4);

    assert!(host.mode().is_free_look());
    assert_eq!(
        kinds(&host),
        vec![
            (PlaybackStarted, a),
            (PlaybackStopped, a),
            (PlaybackStarted, b),
            (PlaybackStopped, b),
            (PlaybackStarted, c),
        ]
    );
}

#[test]
fn test_switch_preconditions() {
    let (_host, manager) = setup();
    let a = line(&manager, 2.0);
    let b = line(&manager, 2.0);

    assert!(matches!(
        manager.switch_playback(PLUGIN, TimelineId::NONE, b),
        Err(TimelineError::NoActiveTimeline(_))
    ));
    assert!(matches!(
        manager.switch_playback(PLUGIN, a, b),
        Err(TimelineError::NotPlaying(_))
    ));

    let empty = manager.register_timeline(PLUGIN).unwrap();
    manager
        .start_playback(PLUGIN, a, PlaybackOptions::default())
        .unwrap();
    assert!(matches!(
        manager.switch_playback(PLUGIN, a, empty),
        Err(TimelineError::NoPoints(_))
    ));
    assert_eq!(manager.active_timeline_id(), a);
}

#[test]
fn test_wait_mode_completes_once() {
    let (host, manager) = setup();
    let id = line(&manager, 2.0);
    manager
        .set_playback_mode(PLUGIN, id, PlaybackMode::Wait, 0.0)
        .unwrap();

    manager
        .start_playback(PLUGIN, id, PlaybackOptions::default())
        .unwrap();
    for _ in 0..4 {
        manager.update();
    }
    assert_eq!(manager.active_timeline_id(), id);
    assert!((camera_x(&host) - 10.0).abs() < 1e-4);
    assert_eq!(kinds(&host), vec![(PlaybackStarted, id), (PlaybackCompleted, id)]);

    manager.stop_playback(PLUGIN, id).unwrap();
    assert_eq!(kinds(&host).last(), Some(&(PlaybackStopped, id)));
}

#[test]
fn test_loop_mode_keeps_playing() {
    let (host, manager) = setup();
    let id = line(&manager, 2.0);
    manager
        .set_playback_mode_raw(PLUGIN, id, 1, 1.0)
        .unwrap();
    assert_eq!(manager.playback_mode(PLUGIN, id).unwrap(), PlaybackMode::Loop);

    manager
        .start_playback(PLUGIN, id, PlaybackOptions::default())
        .unwrap();
    for _ in 0..5 {
        manager.update();
    }
    assert!(manager.is_playback_running(PLUGIN, id).unwrap());
    assert!(camera_x(&host) >= 5.0 - 1e-4);

    assert!(matches!(
        manager.set_playback_mode_raw(PLUGIN, id, 7, 0.0),
        Err(TimelineError::InvalidPlaybackMode(_))
    ));
}

#[test]
fn test_pause_and_resume() {
    let (host, manager) = setup();
    let id = line(&manager, 4.0);

    assert!(matches!(
        manager.pause_playback(PLUGIN, id),
        Err(TimelineError::NotPlaying(_))
    ));

    manager
        .start_playback(PLUGIN, id, PlaybackOptions::default())
        .unwrap();
    manager.pause_playback(PLUGIN, id).unwrap();
    assert!(manager.is_playback_paused(PLUGIN, id).unwrap());
    manager.update();
    assert_eq!(manager.playback_time(PLUGIN, id).unwrap(), 0.0);

    manager.resume_playback(PLUGIN, id).unwrap();
    manager.update();
    assert!((camera_x(&host) - 2.5).abs() < 1e-4);
}

#[test]
fn test_game_pause_holds_playback() {
    let (host, manager) = setup();
    let id = line(&manager, 4.0);
    manager
        .start_playback(PLUGIN, id, PlaybackOptions::default())
        .unwrap();
    assert!(!host.menus_shown());

    host.set_game_paused(true);
    manager.update();
    assert_eq!(manager.playback_time(PLUGIN, id).unwrap(), 0.0);
    assert!(host.menus_shown());

    host.set_game_paused(false);
    manager.update();
    assert!(!host.menus_shown());
    assert_eq!(manager.playback_time(PLUGIN, id).unwrap(), 1.0);
}

#[test]
fn test_ground_following() {
    let (host, manager) = setup();
    let id = line(&manager, 2.0);
    host.set_ground_height(Some(5.0));

    manager
        .start_playback(PLUGIN, id, PlaybackOptions::default().following_ground(10.0))
        .unwrap();
    manager.update();
    let z = host.free_look_camera().map(|c| c.translation.z);
    assert_eq!(z, Some(15.0));
    assert!(manager.is_ground_following_enabled(PLUGIN, id).unwrap());
}

#[test]
fn test_third_person_rotation_restored() {
    let (host, manager) = setup();
    let id = line(&manager, 1.0);
    host.set_camera_state(CameraState::ThirdPerson {
        free_rotation: [0.3, 0.4],
    });

    manager
        .start_playback(PLUGIN, id, PlaybackOptions::default())
        .unwrap();
    manager.stop_playback(PLUGIN, id).unwrap();
    assert_eq!(host.restored_rotation(), Some([0.3, 0.4]));
}

#[test]
fn test_camera_leaving_free_look_stops_playback() {
    let (host, manager) = setup();
    let id = line(&manager, 4.0);
    manager
        .start_playback(PLUGIN, id, PlaybackOptions::default())
        .unwrap();

    host.set_camera_state(CameraState::FirstPerson);
    manager.update();
    assert_eq!(manager.active_timeline_id(), TimelineId::NONE);
    assert_eq!(kinds(&host), vec![(PlaybackStarted, id), (PlaybackStopped, id)]);
}

#[test]
fn test_edit_stops_playback() {
    let (host, manager) = setup();
    let id = line(&manager, 2.0);
    manager
        .start_playback(PLUGIN, id, PlaybackOptions::default())
        .unwrap();

    let count = manager
        .add_fov_point(PLUGIN, id, linear(1.0), 60.0)
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(manager.active_timeline_id(), TimelineId::NONE);
    assert!(!host.mode().is_free_look());
    assert_eq!(kinds(&host), vec![(PlaybackStarted, id), (PlaybackStopped, id)]);
}

#[test]
fn test_point_editing() {
    let (_host, manager) = setup();
    let id = line(&manager, 2.0);

    assert!(matches!(
        manager.remove_translation_point(PLUGIN, id, 5),
        Err(TimelineError::IndexOutOfRange { len: 2, .. })
    ));
    assert!(matches!(
        manager.rotation_point(PLUGIN, id, 0),
        Err(TimelineError::IndexOutOfRange { len: 0, .. })
    ));

    manager.remove_translation_point(PLUGIN, id, 0).unwrap();
    assert_eq!(
        manager.translation_point(PLUGIN, id, 0).unwrap(),
        Point3::new(10.0, 0.0, 0.0)
    );

    manager.set_global_easing(PLUGIN, id, true, true).unwrap();
    manager.clear_timeline(PLUGIN, id).unwrap();
    assert_eq!(manager.translation_point_count(PLUGIN, id).unwrap(), 0);
    assert_eq!(manager.global_easing(PLUGIN, id).unwrap(), (false, false));
}

#[test]
fn test_camera_and_object_anchors() {
    let (host, manager) = setup();
    host.set_live_camera(FreeLookCamera {
        translation: Point3::new(1.0, 2.0, 3.0),
        rotation: Rotation::ZERO,
        fov: 70.0,
    });
    let object = host.add_object(
        0x0001_2345,
        Some("Chair"),
        None,
        Point3::new(100.0, 0.0, 0.0),
        Rotation::ZERO,
    );
    let id = manager.register_timeline(PLUGIN).unwrap();

    manager
        .add_translation_point_at_camera(PLUGIN, id, linear(0.0))
        .unwrap();
    manager.add_fov_point_at_camera(PLUGIN, id, linear(0.0)).unwrap();
    manager
        .add_translation_point_at_object(
            PLUGIN,
            id,
            linear(1.0),
            ObjectRef::new(object.form_id),
            AttachPoint::None,
            Point3::new(0.0, 0.0, 50.0),
            false,
        )
        .unwrap();

    assert_eq!(
        manager.translation_point(PLUGIN, id, 0).unwrap(),
        Point3::new(1.0, 2.0, 3.0)
    );
    assert_eq!(manager.fov_point(PLUGIN, id, 0).unwrap(), 70.0);
    assert_eq!(
        manager.translation_point(PLUGIN, id, 1).unwrap(),
        Point3::new(100.0, 0.0, 50.0)
    );

    assert!(matches!(
        manager.add_translation_point_at_object(
            PLUGIN,
            id,
            linear(2.0),
            ObjectRef::new(0xDEAD),
            AttachPoint::Head,
            Point3::ZERO,
            false,
        ),
        Err(TimelineError::ObjectNotFound(_))
    ));
}

#[test]
fn test_recording() {
    let (host, manager) = setup();
    host.set_delta(0.5);
    let id = manager.register_timeline(PLUGIN).unwrap();

    manager
        .start_recording(PLUGIN, id, RecordingOptions::default())
        .unwrap();
    assert!(manager.is_recording(PLUGIN, id).unwrap());
    assert!(host.mode().is_free_look());
    assert_eq!(manager.translation_point_count(PLUGIN, id).unwrap(), 1);
    assert!(matches!(
        manager.clear_timeline(PLUGIN, id),
        Err(TimelineError::RecordingInProgress(_))
    ));

    host.move_free_look(FreeLookCamera {
        translation: Point3::new(1.0, 0.0, 0.0),
        rotation: Rotation::ZERO,
        fov: 80.0,
    });
    manager.update();
    assert_eq!(manager.translation_point_count(PLUGIN, id).unwrap(), 1);
    manager.update();
    assert_eq!(manager.translation_point_count(PLUGIN, id).unwrap(), 2);
    manager.update();

    manager.stop_recording(PLUGIN, id).unwrap();
    assert!(!manager.is_recording(PLUGIN, id).unwrap());
    assert_eq!(manager.active_timeline_id(), TimelineId::NONE);
    assert!(matches!(host.mode(), CameraState::ThirdPerson { .. }));
    assert_eq!(manager.rotation_point_count(PLUGIN, id).unwrap(), 3);
    assert_eq!(manager.translation_point(PLUGIN, id, 0).unwrap(), Point3::ZERO);
    assert_eq!(
        manager.translation_point(PLUGIN, id, 2).unwrap(),
        Point3::new(1.0, 0.0, 0.0)
    );

    // Append after a gap
    let options = RecordingOptions {
        append: true,
        time_offset: 2.0,
        ..RecordingOptions::default()
    };
    manager.start_recording(PLUGIN, id, options).unwrap();
    manager.stop_recording(PLUGIN, id).unwrap();
    assert_eq!(manager.translation_point_count(PLUGIN, id).unwrap(), 5);
    let sample = manager.sample_timeline(PLUGIN, id, 10.0).unwrap();
    assert_eq!(sample.translation, Point3::ZERO);
    assert!(matches!(
        manager.stop_recording(PLUGIN, id),
        Err(TimelineError::NotRecording(_))
    ));
}

#[test]
fn test_save_releases_camera() {
    let (host, manager) = setup();
    let id = line(&manager, 10.0);
    manager
        .start_playback(PLUGIN, id, PlaybackOptions::default())
        .unwrap();

    manager.on_pre_save_game();
    assert!(!host.mode().is_free_look());
    host.set_saving(true);
    manager.update();
    assert_eq!(manager.playback_time(PLUGIN, id).unwrap(), 0.0);

    host.set_saving(false);
    manager.update();
    assert!(host.mode().is_free_look());
    assert_eq!(manager.playback_time(PLUGIN, id).unwrap(), 1.0);

    manager.on_pre_save_game();
    manager.on_post_save_game();
    assert!(host.mode().is_free_look());
    assert_eq!(manager.active_timeline_id(), id);
}

#[test]
fn test_unregister_and_shutdown() {
    let (host, manager) = setup();
    let a = line(&manager, 2.0);
    let b = line(&manager, 2.0);
    manager
        .start_playback(PLUGIN, a, PlaybackOptions::default())
        .unwrap();

    manager.unregister_timeline(PLUGIN, a).unwrap();
    assert_eq!(manager.active_timeline_id(), TimelineId::NONE);
    assert_eq!(kinds(&host), vec![(PlaybackStarted, a), (PlaybackStopped, a)]);

    manager
        .start_playback(PLUGIN, b, PlaybackOptions::default())
        .unwrap();
    manager.shutdown();
    assert_eq!(manager.active_timeline_id(), TimelineId::NONE);
    assert!(!host.mode().is_free_look());
    assert!(matches!(
        manager.register_timeline(PLUGIN),
        Err(TimelineError::UnregisteredPlugin(_))
    ));
}

#[test]
fn test_receivers_notified_in_order() {
    let (host, manager) = setup();
    let receiver = ReceiverHandle(0x42);
    manager.register_event_receiver(receiver);
    manager.register_event_receiver(receiver);
    let id = line(&manager, 2.0);

    manager
        .start_playback(PLUGIN, id, PlaybackOptions::default())
        .unwrap();
    manager.stop_playback(PLUGIN, id).unwrap();

    let names: Vec<_> = host
        .notifications()
        .into_iter()
        .map(|n| (n.receiver, n.event_name, n.timeline))
        .collect();
    assert_eq!(
        names,
        vec![
            (receiver, "OnTimelinePlaybackStarted".to_string(), id),
            (receiver, "OnTimelinePlaybackStopped".to_string(), id),
        ]
    );

    manager.unregister_event_receiver(receiver);
    manager
        .start_playback(PLUGIN, id, PlaybackOptions::default())
        .unwrap();
    assert_eq!(host.notifications().len(), 2);
}

/// Bus that queries the manager while handling an event
#[derive(Default)]
struct ReentrantBus {
    manager: parking_lot::Mutex<Weak<TimelineManager>>,
    seen: parking_lot::Mutex<Vec<(TimelineEvent, TimelineId)>>,
}

impl MessageBus for ReentrantBus {
    fn dispatch(&self, event: &TimelineEvent) {
        if let Some(manager) = self.manager.lock().upgrade() {
            self.seen.lock().push((*event, manager.active_timeline_id()));
        }
    }
}

#[test]
fn test_events_delivered_outside_lock() {
    let host = Arc::new(SimulatedHost::new());
    let bus = Arc::new(ReentrantBus::default());
    let services = HostServices {
        bus: bus.clone(),
        ..host.services()
    };
    let manager = Arc::new(TimelineManager::new(FrameworkSettings::default(), services));
    *bus.manager.lock() = Arc::downgrade(&manager);
    manager.register_plugin(PLUGIN).unwrap();
    let id = line(&manager, 2.0);

    manager
        .start_playback(PLUGIN, id, PlaybackOptions::default())
        .unwrap();
    manager.stop_playback(PLUGIN, id).unwrap();

    let seen = bus.seen.lock().clone();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0.kind, PlaybackStarted);
    assert_eq!(seen[0].1, id);
    assert_eq!(seen[1].1, TimelineId::NONE);
}

#[test]
fn test_export_and_import() {
    let dir = std::env::temp_dir().join(format!("freecam_manager_io_{}", std::process::id()));
    let host = Arc::new(SimulatedHost::new());
    let settings = FrameworkSettings {
        data_dir: dir.clone(),
        ..FrameworkSettings::default()
    };
    let manager = TimelineManager::new(settings, host.services());
    manager.register_plugin(PLUGIN).unwrap();

    let source = line(&manager, 2.0);
    manager
        .add_rotation_point(PLUGIN, source, linear(0.0), Rotation::pitch_yaw(0.1, 1.0))
        .unwrap();
    manager.set_follow_ground(PLUGIN, source, true, 30.0).unwrap();
    manager
        .set_playback_mode(PLUGIN, source, PlaybackMode::Loop, 0.5)
        .unwrap();
    let written = manager
        .export_timeline(PLUGIN, source, Path::new("flights/line.ron"))
        .unwrap();
    assert_eq!(written, dir.join("flights/line.ron"));

    let target = manager.register_timeline(PLUGIN).unwrap();
    let summary = manager
        .add_timeline_from_file(PLUGIN, target, Path::new("flights/line.ron"), 1.0)
        .unwrap();
    assert_eq!((summary.translation, summary.rotation, summary.fov), (2, 1, 0));
    assert_eq!(manager.playback_mode(PLUGIN, target).unwrap(), PlaybackMode::Loop);
    assert_eq!(manager.loop_time_offset(PLUGIN, target).unwrap(), 0.5);
    assert!(manager.is_ground_following_enabled(PLUGIN, target).unwrap());
    assert_eq!(manager.min_height_above_ground(PLUGIN, target).unwrap(), 30.0);

    let start = manager.sample_timeline(PLUGIN, target, 1.0).unwrap();
    let end = manager.sample_timeline(PLUGIN, target, 3.0).unwrap();
    assert!(start.translation.distance(Point3::ZERO) < 1e-4);
    assert!(end.translation.distance(Point3::new(10.0, 0.0, 0.0)) < 1e-4);
    assert!((start.rotation.yaw - 1.0).abs() < 1e-4);

    assert!(matches!(
        manager.add_timeline_from_file(PLUGIN, target, Path::new("missing.ron"), 0.0),
        Err(TimelineError::FileNotFound(_))
    ));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_user_rotation_ignored_when_disallowed() {
    let (host, manager) = setup();
    let id = still(&manager, 10.0);
    assert!(!manager.is_user_rotation_allowed(PLUGIN, id).unwrap());

    manager
        .start_playback(PLUGIN, id, PlaybackOptions::default())
        .unwrap();
    host.move_free_look(FreeLookCamera {
        rotation: Rotation::pitch_yaw(0.0, 0.5),
        ..FreeLookCamera::default()
    });
    manager.set_user_turning(true);
    manager.update();
    assert!(camera_yaw(&host).abs() < 1e-4);
    assert_eq!(
        manager.inner.lock().timelines[&id].rotation_offset(),
        Rotation::ZERO
    );

    manager.update();
    assert!(camera_yaw(&host).abs() < 1e-4);
    assert!(manager.is_playback_running(PLUGIN, id).unwrap());
}

#[test]
fn test_non_finite_times() {
    let (host, manager) = setup();
    let id = line(&manager, 2.0);

    let sample = manager.sample_timeline(PLUGIN, id, f32::NAN).unwrap();
    assert_eq!(sample.translation, Point3::ZERO);

    assert!(matches!(
        manager.add_translation_point(PLUGIN, id, linear(f32::NAN), Point3::ZERO),
        Err(TimelineError::InvalidArgument(_))
    ));
    assert!(matches!(
        manager.add_fov_point(PLUGIN, id, linear(f32::INFINITY), 70.0),
        Err(TimelineError::InvalidArgument(_))
    ));
    assert_eq!(manager.translation_point_count(PLUGIN, id).unwrap(), 2);
    assert_eq!(manager.fov_point_count(PLUGIN, id).unwrap(), 0);

    manager
        .set_playback_mode(PLUGIN, id, PlaybackMode::Loop, 0.0)
        .unwrap();
    assert!(matches!(
        manager.start_playback(PLUGIN, id, PlaybackOptions::at_speed(1.0).starting_at(f32::NAN)),
        Err(TimelineError::InvalidArgument(_))
    ));
    assert_eq!(manager.active_timeline_id(), TimelineId::NONE);
    assert!(!host.mode().is_free_look());
    assert!(host.events().is_empty());

    manager
        .start_playback(PLUGIN, id, PlaybackOptions::at_speed(f32::INFINITY))
        .unwrap();
    manager.update();
    assert!((camera_x(&host) - 5.0).abs() < 1e-4);
    manager.update();
    manager.update();
    assert!(camera_x(&host).is_finite());
    assert!(manager.is_playback_running(PLUGIN, id).unwrap());
}

#[test]
fn test_duration_request_on_zero_length_timeline() {
    let (_host, manager) = setup();
    let id = manager.register_timeline(PLUGIN).unwrap();
    manager
        .add_translation_point(PLUGIN, id, linear(0.0), Point3::new(3.0, 0.0, 0.0))
        .unwrap();

    manager
        .start_playback(PLUGIN, id, PlaybackOptions::over_duration(5.0))
        .unwrap();
    let inner = manager.inner.lock();
    let state = &inner.timelines[&id];
    assert_eq!(state.playback_speed(), 1.0);
    assert_eq!(state.playback_duration(), 0.0);
}

#[test]
fn test_rejected_edits_keep_playback_running() {
    let (host, manager) = setup();
    let id = line(&manager, 2.0);
    manager
        .start_playback(PLUGIN, id, PlaybackOptions::default())
        .unwrap();

    assert!(matches!(
        manager.remove_translation_point(PLUGIN, id, 5),
        Err(TimelineError::IndexOutOfRange { index: 5, len: 2, .. })
    ));
    assert!(matches!(
        manager.remove_rotation_point(PLUGIN, id, 0),
        Err(TimelineError::IndexOutOfRange { len: 0, .. })
    ));
    let missing = ObjectRef {
        form_id: 0xDEAD,
        editor_id: None,
        plugin: None,
    };
    assert!(matches!(
        manager.add_translation_point_at_object(
            PLUGIN,
            id,
            linear(1.0),
            missing,
            AttachPoint::None,
            Point3::ZERO,
            false
        ),
        Err(TimelineError::ObjectNotFound(_))
    ));
    assert!(matches!(
        manager.add_timeline_from_file(PLUGIN, id, Path::new("no_such_timeline.ron"), 0.0),
        Err(TimelineError::FileNotFound(_))
    ));

    assert!(manager.is_playback_running(PLUGIN, id).unwrap());
    assert_eq!(manager.active_timeline_id(), id);
    assert_eq!(kinds(&host), vec![(PlaybackStarted, id)]);

    manager.remove_translation_point(PLUGIN, id, 1).unwrap();
    assert!(!manager.is_playback_running(PLUGIN, id).unwrap());
}

/// Bus that holds the first start event until released
struct GatedBus {
    entered: parking_lot::Mutex<mpsc::Sender<()>>,
    release: parking_lot::Mutex<mpsc::Receiver<()>>,
    seen: parking_lot::Mutex<Vec<(TimelineEventKind, TimelineId)>>,
}

impl MessageBus for GatedBus {
    fn dispatch(&self, event: &TimelineEvent) {
        if event.kind == PlaybackStarted {
            let _ = self.entered.lock().send(());
            let _ = self.release.lock().recv();
        }
        self.seen.lock().push((event.kind, event.timeline));
    }
}

#[test]
fn test_event_order_across_threads() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let bus = Arc::new(GatedBus {
        entered: parking_lot::Mutex::new(entered_tx),
        release: parking_lot::Mutex::new(release_rx),
        seen: parking_lot::Mutex::new(Vec::new()),
    });
    let host = Arc::new(SimulatedHost::new());
    let services = HostServices {
        bus: bus.clone(),
        ..host.services()
    };
    let manager = TimelineManager::new(FrameworkSettings::default(), services);
    manager.register_plugin(PLUGIN).unwrap();
    let id = line(&manager, 2.0);

    std::thread::scope(|scope| {
        let player = scope.spawn(|| manager.start_playback(PLUGIN, id, PlaybackOptions::default()));
        // The start event is mid-delivery and the registry lock is free
        entered_rx.recv().unwrap();
        manager.stop_playback(PLUGIN, id).unwrap();
        assert!(!manager.is_playback_running(PLUGIN, id).unwrap());
        assert!(bus.seen.lock().is_empty());

        release_tx.send(()).unwrap();
        player.join().unwrap().unwrap();
    });

    assert_eq!(
        *bus.seen.lock(),
        vec![(PlaybackStarted, id), (PlaybackStopped, id)]
    );
}
