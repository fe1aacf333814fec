//! Hospital manager - serializes removal requests

use std::collections::VecDeque;

use hecs::Entity;
use tracing::debug;

use crate::actions::Action;
use crate::messages::{Address, MessageBus, MessageContent};

/// First-come-first-served queue of patients waiting to be removed.
/// At most one removal is issued per tick.
#[derive(Debug, Default)]
pub struct HospitalManager {
    queue: VecDeque<Entity>,
}

impl HospitalManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move removal requests from the inbox onto the queue.
    pub fn collect_requests(&mut self, bus: &mut MessageBus) {
        let mut unhandled = Vec::new();
        for message in bus.take_inbox(Address::HospitalManager) {
            match (message.content, message.from) {
                (MessageContent::AgentRemovalRequest, Address::Patient(patient)) => {
                    if !self.queue.contains(&patient) {
                        debug!(?patient, "removal requested");
                        self.queue.push_back(patient);
                    }
                }
                _ => unhandled.push(message),
            }
        }
        bus.restore(Address::HospitalManager, unhandled);
    }

    pub fn next_removal(&mut self) -> Option<Action> {
        self.queue
            .pop_front()
            .map(|patient| Action::RemovePatient {
                patient: Some(patient),
            })
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
