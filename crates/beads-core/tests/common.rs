//! Shared fixtures for store integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use beads_core::clock::{Clock, ManualClock};
use beads_core::model::{Item, NewItem, Status};
use beads_core::persist::MemorySnapshot;
use beads_core::IssueStore;
use chrono::{DateTime, Duration, TimeZone, Utc};

pub struct Fixture {
    pub store: IssueStore,
    pub sink: Arc<MemorySnapshot>,
    pub clock: Arc<ManualClock>,
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()
}

pub fn fixture() -> Fixture {
    let sink = Arc::new(MemorySnapshot::new());
    let clock = Arc::new(ManualClock::new(epoch()));
    let store = IssueStore::from_parts(Vec::new(), sink.clone(), "bd").with_clock(clock.clone());
    Fixture { store, sink, clock }
}

impl Fixture {
    /// Move the clock one minute forward.
    pub fn tick(&self) -> DateTime<Utc> {
        self.clock.advance(Duration::minutes(1));
        self.clock.now()
    }

    pub fn create(&self, title: &str) -> Item {
        self.tick();
        self.store.create(NewItem::titled(title)).unwrap()
    }

    pub fn child(&self, title: &str, parent: &str) -> Item {
        self.tick();
        self.store
            .create_with_parent(NewItem::titled(title), parent)
            .unwrap()
    }

    pub fn close(&self, id: &str) -> beads_core::Mutation {
        self.tick();
        self.store.close(id).unwrap()
    }

    pub fn status(&self, id: &str) -> Status {
        self.store.get(id).unwrap().status
    }
}
