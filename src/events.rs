// ============================================================================
// EVENTS: change notifications from the core to its UI collaborator
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::mpsc;

use crate::document::NodeId;

/// Something the UI may want to redraw or rebuild for.
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentEvent {
    /// Nodes were added, removed, reordered or replaced.
    StructureChanged,
    /// Visibility, opacity, names or document size changed.
    ViewChanged,
    /// Pixels of a layer changed (`None` when several layers did).
    CanvasChanged(Option<NodeId>),
}

pub trait EventHandler {
    fn handle_event(&mut self, event: &DocumentEvent);
}

impl<F: FnMut(&DocumentEvent)> EventHandler for F {
    fn handle_event(&mut self, event: &DocumentEvent) {
        self(event)
    }
}

/// Broadcasts document events to registered handlers, in subscription order.
///
/// Handlers may subscribe or emit from inside their callback.  A nested event
/// is queued and delivered once the current one has reached every handler.
pub struct EventBus {
    handlers: RefCell<Vec<Box<dyn EventHandler>>>,
    queue: RefCell<VecDeque<DocumentEvent>>,
    dispatching: Cell<bool>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &format!("<{} handlers>", self.handlers.borrow().len()))
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(Vec::new()),
            queue: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
        }
    }

    pub fn subscribe(&self, handler: Box<dyn EventHandler>) {
        self.handlers.borrow_mut().push(handler);
    }

    /// Subscribe through a channel.  Events whose receiver has been dropped
    /// are discarded silently.
    pub fn channel(&self) -> mpsc::Receiver<DocumentEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribe(Box::new(move |event: &DocumentEvent| {
            let _ = tx.send(event.clone());
        }));
        rx
    }

    pub fn emit(&self, event: DocumentEvent) {
        self.queue.borrow_mut().push_back(event);
        if self.dispatching.replace(true) {
            return;
        }
        loop {
            let Some(event) = self.queue.borrow_mut().pop_front() else { break };
            // Handlers run outside the borrow so they can reach the bus.
            let mut running = std::mem::take(&mut *self.handlers.borrow_mut());
            for handler in running.iter_mut() {
                handler.handle_event(&event);
            }
            let mut handlers = self.handlers.borrow_mut();
            let added = std::mem::replace(&mut *handlers, running);
            handlers.extend(added);
        }
        self.dispatching.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn handlers_and_channels_both_receive() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(Box::new(move |e: &DocumentEvent| sink.borrow_mut().push(e.clone())));
        let rx = bus.channel();

        bus.emit(DocumentEvent::StructureChanged);
        bus.emit(DocumentEvent::ViewChanged);

        assert_eq!(
            *seen.borrow(),
            vec![DocumentEvent::StructureChanged, DocumentEvent::ViewChanged]
        );
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn handlers_may_emit_and_subscribe_while_running() {
        let bus = Rc::new(EventBus::new());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let inner_bus = Rc::downgrade(&bus);
        let sink = seen.clone();
        bus.subscribe(Box::new(move |e: &DocumentEvent| {
            sink.borrow_mut().push(e.clone());
            if *e == DocumentEvent::StructureChanged
                && let Some(bus) = inner_bus.upgrade()
            {
                bus.emit(DocumentEvent::ViewChanged);
                let late = Rc::new(Cell::new(0));
                bus.subscribe(Box::new(move |_: &DocumentEvent| late.set(late.get() + 1)));
            }
        }));

        bus.emit(DocumentEvent::StructureChanged);

        // the nested event arrives after the outer one, not in the middle
        assert_eq!(
            *seen.borrow(),
            vec![DocumentEvent::StructureChanged, DocumentEvent::ViewChanged]
        );
        assert_eq!(bus.handlers.borrow().len(), 2);
        assert!(!bus.dispatching.get());
    }
}
