//! Helpers shared by the scenario tests.

use std::sync::Arc;

use cmdframe::config::Config;
use cmdframe::demo::{Region, RegionStore, build_manager};
use cmdframe::test_utils::RecordingIssuer;
use cmdframe::{CommandManager, IssuerRef};

/// Demo manager over a store seeded with `spawn` (radius 32).
pub fn demo_manager() -> CommandManager {
    let store = RegionStore::new();
    store.save(Region {
        name: "spawn".to_string(),
        radius: 32,
        owner: "console".to_string(),
    });
    build_manager(&Config::default(), store).expect("demo manager builds")
}

/// Issuer handle plus the recording side for assertions.
pub fn issuer(name: &str, permissions: &[&str]) -> (IssuerRef, Arc<RecordingIssuer>) {
    let recording = RecordingIssuer::new(name).with_permissions(permissions.iter().copied());
    let handle: IssuerRef = recording.clone();
    (handle, recording)
}

pub fn player(name: &str, permissions: &[&str]) -> (IssuerRef, Arc<RecordingIssuer>) {
    let recording = RecordingIssuer::player(name).with_permissions(permissions.iter().copied());
    let handle: IssuerRef = recording.clone();
    (handle, recording)
}
