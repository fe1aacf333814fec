//! Typed message passing between the participants of a tick.
//!
//! Messages sent during a tick are held in an outbox and delivered at the
//! start of the next tick. Receivers take their whole inbox, handle what
//! they understand and hand the rest back, so no inbox is mutated while it
//! is being iterated.

use std::collections::HashMap;

use hecs::Entity;
use serde::{Deserialize, Serialize};
use triage_logic::attributes::CareTier;

use crate::components::{DecisionMaker, Owner};

/// A participant that can send or receive messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    Patient(Entity),
    AllocationEngine,
    HospitalManager,
    Operator,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Binding triage decision.
    TriageDecision {
        decision: CareTier,
        triaged_by: DecisionMaker,
    },
    /// Restart the countdown at the given value.
    ResetCounter { counter_value: u32 },
    /// Hand the patient to a different owner.
    Reassign { assigned_to: Owner },
    /// Ask the hospital manager to remove the sender.
    AgentRemovalRequest,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Message {
    pub to: Address,
    pub from: Address,
    pub content: MessageContent,
}

#[derive(Debug, Default)]
pub struct MessageBus {
    outbox: Vec<Message>,
    inboxes: HashMap<Address, Vec<Message>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, to: Address, from: Address, content: MessageContent) {
        self.outbox.push(Message { to, from, content });
    }

    /// Move everything sent since the last delivery into the inboxes.
    pub fn deliver(&mut self) {
        for message in self.outbox.drain(..) {
            self.inboxes.entry(message.to).or_default().push(message);
        }
    }

    /// Take every message waiting for `address`.
    pub fn take_inbox(&mut self, address: Address) -> Vec<Message> {
        self.inboxes.remove(&address).unwrap_or_default()
    }

    /// Put unhandled messages back, ahead of anything delivered since.
    pub fn restore(&mut self, address: Address, mut unhandled: Vec<Message>) {
        if unhandled.is_empty() {
            return;
        }
        if let Some(newer) = self.inboxes.remove(&address) {
            unhandled.extend(newer);
        }
        self.inboxes.insert(address, unhandled);
    }

    /// Drop the inbox of a participant that no longer exists.
    pub fn discard(&mut self, address: Address) {
        self.inboxes.remove(&address);
    }

    /// Binding decisions for `tier` sent or delivered but not yet consumed.
    pub fn decisions_in_flight(&self, tier: CareTier) -> usize {
        self.outbox
            .iter()
            .chain(self.inboxes.values().flatten())
            .filter(|m| {
                matches!(
                    m.content,
                    MessageContent::TriageDecision { decision, .. } if decision == tier
                )
            })
            .count()
    }

    /// Whether a binding decision for `patient` is waiting to be consumed.
    pub fn has_decision_for(&self, patient: Entity) -> bool {
        self.outbox
            .iter()
            .chain(self.inboxes.values().flatten())
            .any(|m| {
                m.to == Address::Patient(patient)
                    && matches!(m.content, MessageContent::TriageDecision { .. })
            })
    }

    pub fn pending(&self) -> usize {
        self.outbox.len() + self.inboxes.values().map(Vec::len).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hecs::World;

    #[test]
    fn test_delivery_waits_for_next_tick() {
        let mut world = World::new();
        let patient = world.spawn(());
        let mut bus = MessageBus::new();

        bus.send(
            Address::Patient(patient),
            Address::AllocationEngine,
            MessageContent::ResetCounter { counter_value: 5 },
        );
        assert!(bus.take_inbox(Address::Patient(patient)).is_empty());

        bus.deliver();
        let inbox = bus.take_inbox(Address::Patient(patient));
        assert_eq!(inbox.len(), 1);
        assert!(bus.take_inbox(Address::Patient(patient)).is_empty());
    }

    #[test]
    fn test_restore_keeps_order() {
        let mut bus = MessageBus::new();
        let to = Address::HospitalManager;
        bus.send(to, Address::Operator, MessageContent::AgentRemovalRequest);
        bus.deliver();
        let first = bus.take_inbox(to);

        bus.send(
            to,
            Address::Operator,
            MessageContent::Reassign { assigned_to: Owner::Person },
        );
        bus.deliver();
        bus.restore(to, first);

        let inbox = bus.take_inbox(to);
        assert_eq!(inbox[0].content, MessageContent::AgentRemovalRequest);
        assert_eq!(inbox.len(), 2);
    }

    #[test]
    fn test_in_flight_decisions_counted_per_tier() {
        let mut world = World::new();
        let a = world.spawn(());
        let b = world.spawn(());
        let mut bus = MessageBus::new();
        let icu = MessageContent::TriageDecision {
            decision: CareTier::Icu,
            triaged_by: DecisionMaker::Human,
        };
        bus.send(Address::Patient(a), Address::Operator, icu);
        bus.deliver();
        bus.send(Address::Patient(b), Address::Operator, icu);

        assert_eq!(bus.decisions_in_flight(CareTier::Icu), 2);
        assert_eq!(bus.decisions_in_flight(CareTier::Ward), 0);
        assert!(bus.has_decision_for(a));

        bus.take_inbox(Address::Patient(a));
        assert_eq!(bus.decisions_in_flight(CareTier::Icu), 1);
        assert!(!bus.has_decision_for(a));
    }

    #[test]
    fn test_message_content_wire_shape() {
        let json = serde_json::to_string(&MessageContent::TriageDecision {
            decision: CareTier::Ward,
            triaged_by: DecisionMaker::Agent,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"triage_decision","decision":"ward","triaged_by":"agent"}"#);
    }
}
