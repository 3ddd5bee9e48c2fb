//! Typed in-process event bus decoupling UI, input and the state machine.
//!
//! Single-threaded by design: `publish` only queues, `pump` delivers. A
//! callback may publish or (un)subscribe while the pump runs; newly added
//! subscribers never see the event that created them, and events published
//! during delivery land later in the same pump.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::controller::input::ButtonEdge;
use crate::telemetry::TelemetrySnapshot;

/// Everything that travels on the bus. One exhaustive enum instead of
/// string-keyed topics; dispatchers match on it exhaustively.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Menu UI asked to start a session.
    StartRequested,
    /// Pause overlay's resume button.
    ResumeRequested,
    /// Pause overlay's quit-to-menu button.
    MenuRequested,
    /// Async session build finished (Err carries the user-visible message).
    LoadFinished(Result<(), String>),
    PointerLockChanged(bool),
    EscapePressed,
    CanvasClicked,
    /// One-shot arm/disarm/reset press from either input device.
    Button(ButtonEdge),
    /// The settings UI rewrote the configuration snapshot.
    ConfigChanged,
    Telemetry(TelemetrySnapshot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&AppEvent)>;

pub struct EventBus {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Callback)>,
    /// Ids unsubscribed while their callback list was checked out.
    tombstones: Vec<SubscriptionId>,
    queue: VecDeque<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            subscribers: Vec::new(),
            tombstones: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn subscribe(&mut self, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, callback));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|(sid, _)| *sid != id);
        // The callback may currently be checked out by a running pump
        self.tombstones.push(id);
    }

    pub fn publish(&mut self, event: AppEvent) {
        self.queue.push_back(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn pop(&mut self) -> Option<AppEvent> {
        self.queue.pop_front()
    }

    /// Drain the queue, delivering each event to the subscribers that
    /// existed when it is dispatched. Never called re-entrantly; callbacks
    /// get bus access because the borrow is released around each call.
    pub fn pump(bus: &Rc<RefCell<EventBus>>) {
        loop {
            let Some(event) = bus.borrow_mut().pop() else {
                break;
            };
            let mut checked_out = {
                let mut b = bus.borrow_mut();
                b.tombstones.clear();
                std::mem::take(&mut b.subscribers)
            };
            for (_, callback) in checked_out.iter_mut() {
                callback(&event);
            }
            let mut b = bus.borrow_mut();
            // Subscribers added during dispatch stay; tombstoned ones go
            let added = std::mem::take(&mut b.subscribers);
            checked_out.extend(added);
            let tombstones = std::mem::take(&mut b.tombstones);
            checked_out.retain(|(id, _)| !tombstones.contains(id));
            b.subscribers = checked_out;
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_then_pump_delivers_in_order() {
        let bus = EventBus::shared();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        bus.borrow_mut().subscribe(Box::new(move |ev| {
            if let AppEvent::PointerLockChanged(locked) = ev {
                seen2.borrow_mut().push(*locked);
            }
        }));
        bus.borrow_mut().publish(AppEvent::PointerLockChanged(true));
        bus.borrow_mut().publish(AppEvent::PointerLockChanged(false));
        EventBus::pump(&bus);
        assert_eq!(*seen.borrow(), vec![true, false]);
    }

    #[test]
    fn unsubscribe_during_dispatch_sticks() {
        let bus = EventBus::shared();
        let count = Rc::new(RefCell::new(0u32));

        let bus2 = bus.clone();
        let count2 = count.clone();
        let id_cell: Rc<RefCell<Option<SubscriptionId>>> = Rc::new(RefCell::new(None));
        let id_cell2 = id_cell.clone();
        let id = bus.borrow_mut().subscribe(Box::new(move |_| {
            *count2.borrow_mut() += 1;
            // Remove ourselves on first delivery
            if let Some(id) = id_cell2.borrow_mut().take() {
                bus2.borrow_mut().unsubscribe(id);
            }
        }));
        *id_cell.borrow_mut() = Some(id);

        bus.borrow_mut().publish(AppEvent::EscapePressed);
        bus.borrow_mut().publish(AppEvent::EscapePressed);
        EventBus::pump(&bus);
        assert_eq!(*count.borrow(), 1);
        assert_eq!(bus.borrow().subscriber_count(), 0);
    }

    #[test]
    fn subscriber_added_during_dispatch_misses_current_event() {
        let bus = EventBus::shared();
        let late_hits = Rc::new(RefCell::new(0u32));

        let bus2 = bus.clone();
        let late2 = late_hits.clone();
        bus.borrow_mut().subscribe(Box::new(move |_| {
            let late3 = late2.clone();
            bus2.borrow_mut().subscribe(Box::new(move |_| {
                *late3.borrow_mut() += 1;
            }));
        }));

        bus.borrow_mut().publish(AppEvent::CanvasClicked);
        EventBus::pump(&bus);
        assert_eq!(*late_hits.borrow(), 0);

        bus.borrow_mut().publish(AppEvent::CanvasClicked);
        EventBus::pump(&bus);
        // The subscriber from the first pump sees the second event
        assert!(*late_hits.borrow() >= 1);
    }

    #[test]
    fn event_published_from_callback_lands_in_same_pump() {
        let bus = EventBus::shared();
        let saw_follow_up = Rc::new(RefCell::new(false));

        let bus2 = bus.clone();
        let saw2 = saw_follow_up.clone();
        bus.borrow_mut().subscribe(Box::new(move |ev| match ev {
            AppEvent::StartRequested => bus2.borrow_mut().publish(AppEvent::CanvasClicked),
            AppEvent::CanvasClicked => *saw2.borrow_mut() = true,
            _ => {}
        }));

        bus.borrow_mut().publish(AppEvent::StartRequested);
        EventBus::pump(&bus);
        assert!(*saw_follow_up.borrow());
    }
}
