use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent, KeyEventKind};

/// Terminal input plus a steady redraw tick. Ticks only drive rendering;
/// timer time is measured from the wall clock by the `Pacer`.
pub enum AppEvent {
    Key(KeyEvent),
    Tick,
    Resize,
}

pub struct EventSource {
    rx: mpsc::Receiver<AppEvent>,
}

impl EventSource {
    pub fn spawn(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            loop {
                let event = if event::poll(tick_rate).unwrap_or(false) {
                    match event::read() {
                        Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => AppEvent::Key(key),
                        Ok(Event::Resize(..)) => AppEvent::Resize,
                        _ => continue,
                    }
                } else {
                    AppEvent::Tick
                };
                if tx.send(event).is_err() {
                    return;
                }
            }
        });

        Self { rx }
    }

    pub fn next(&self) -> anyhow::Result<AppEvent> {
        Ok(self.rx.recv()?)
    }
}
