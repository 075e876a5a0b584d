use glam::{IVec3, Vec3};
use std::collections::HashSet;
use std::sync::Arc;
use viewsync_common::{CellCoord, EntityId, Placement};
use viewsync_kernel::{BlockState, SnapshotKind, Unbounded, World};
use viewsync_protocol::{
    BuiltinSynchronizer, ChannelSession, MemorySession, Message, decode_frame,
};
use viewsync_stream::{StreamConfig, ViewerHub, ViewerState, ViewerSync};

fn memory_viewer(
    world: &World,
    view: u32,
) -> (ViewerSync<BuiltinSynchronizer<Arc<MemorySession>>>, Arc<MemorySession>) {
    let session = Arc::new(MemorySession::new());
    let config = StreamConfig::default();
    let sync = BuiltinSynchronizer::new(Arc::clone(&session), config.snapshot_kind);
    let state = ViewerState::new(EntityId::new(), view).at(Placement::at(world.id(), Vec3::ZERO));
    (ViewerSync::new(config, state, sync).unwrap(), session)
}

fn cells_in(messages: &[Message]) -> Vec<CellCoord> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::CellData { coord, .. } => Some(*coord),
            _ => None,
        })
        .collect()
}

#[test]
fn first_message_is_world_change_then_cell_data() {
    let world = World::new("overworld", 42);
    let (mut sync, session) = memory_viewer(&world, 1);

    sync.finalize_tick(&world);
    sync.pre_snapshot(&world, &Unbounded).unwrap();
    sync.commit_snapshot();
    let messages = session.take();
    assert_eq!(messages.len(), 1);
    assert!(matches!(
        &messages[0],
        Message::WorldChanged { world: id, info, .. } if *id == world.id() && info.seed == 42
    ));

    sync.finalize_tick(&world);
    sync.pre_snapshot(&world, &Unbounded).unwrap();
    sync.commit_snapshot();
    let messages = session.take();
    assert_eq!(messages.len(), 3);
    assert_eq!(cells_in(&messages)[0], world.coord(IVec3::ZERO));
    if let Message::CellData { snapshot, .. } = &messages[0] {
        assert_eq!(snapshot.kind, SnapshotKind::Full);
        assert_eq!(snapshot.materials.len(), 16 * 16 * 16);
    }
}

#[test]
fn closed_session_stalls_but_recovers() {
    let world = World::new("overworld", 42);
    let (mut sync, session) = memory_viewer(&world, 1);
    sync.finalize_tick(&world);
    sync.pre_snapshot(&world, &Unbounded).unwrap();
    sync.commit_snapshot();

    session.close();
    sync.finalize_tick(&world);
    assert!(sync.pre_snapshot(&world, &Unbounded).is_err());
    sync.commit_snapshot();
    assert_eq!(sync.queues().priority.len(), 27);
    assert!(sync.active_cells().is_empty());

    session.reopen();
    for _ in 0..20 {
        sync.finalize_tick(&world);
        sync.pre_snapshot(&world, &Unbounded).unwrap();
        sync.commit_snapshot();
    }
    let sent = cells_in(&session.take());
    assert_eq!(sent.len(), 27);
    assert_eq!(sent.iter().collect::<HashSet<_>>().len(), 27);
}

#[test]
fn hub_streams_frames_and_block_updates_over_channels() {
    let world = World::new("overworld", 7);
    let mut hub = ViewerHub::new();
    let (session, frames) = ChannelSession::unbounded();
    let config = StreamConfig {
        snapshot_kind: SnapshotKind::Blocks,
        ..StreamConfig::default()
    };
    let sync = BuiltinSynchronizer::new(session, config.snapshot_kind);
    let state = ViewerState::new(EntityId::new(), 1).at(Placement::at(world.id(), Vec3::ZERO));
    let viewer = ViewerSync::new(config, state, sync).unwrap();
    let id = viewer.viewer();
    hub.attach(viewer);

    for _ in 0..12 {
        assert!(hub.tick(&world, &Unbounded).is_empty());
    }
    let change = world
        .set_block(IVec3::new(3, 4, 5), BlockState::new(11, 0))
        .unwrap();
    assert!(hub.broadcast_block_update(world.observers(), &change).is_empty());

    let messages: Vec<Message> = frames
        .try_iter()
        .map(|frame| decode_frame(&frame).unwrap().0)
        .collect();
    assert!(matches!(messages.first(), Some(Message::WorldChanged { .. })));
    assert_eq!(cells_in(&messages).len(), 27);
    assert!(matches!(
        messages.last(),
        Some(Message::BlockUpdate { x: 3, y: 4, z: 5, material: 11, .. })
    ));
    for message in &messages {
        if let Message::CellData { snapshot, .. } = message {
            assert!(snapshot.aux.is_none());
        }
    }

    hub.detach(id, &world);
    assert!(world.observers().is_empty());
    assert_eq!(world.unload_unobserved().len(), 27);
    assert_eq!(world.resident_count(), 0);
}
