// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Scheduled gain automation.
//!
//! A [`GainParam`] is a value that changes over time according to a list of
//! scheduled events, evaluated against the audio context clock (in seconds).
//! The engine uses it for crossfades and the mixer evaluates it per frame.

use parking_lot::Mutex;

/// A single scheduled change.
#[derive(Debug, Clone, Copy, PartialEq)]
enum EventKind {
    /// Jump to the value at the given time.
    SetValue,
    /// Ramp linearly from the previous event to the value, arriving at the given time.
    LinearRamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Event {
    kind: EventKind,
    value: f32,
    time: f64,
}

/// A snapshot of an automation curve. Cheap to clone so the mixer can evaluate
/// a whole block without holding the parameter lock.
#[derive(Debug, Clone, PartialEq)]
pub struct Automation {
    /// Value before the first event.
    base_value: f32,
    /// The time the base value was established. Used as the start of a ramp
    /// that has no preceding event.
    base_time: f64,
    /// Events sorted by time.
    events: Vec<Event>,
}

impl Automation {
    fn new(value: f32) -> Automation {
        Automation {
            base_value: value,
            base_time: 0.0,
            events: Vec::new(),
        }
    }

    /// Evaluates the curve at time `t`.
    pub fn value_at(&self, t: f64) -> f32 {
        let mut prev_value = self.base_value;
        let mut prev_time = self.base_time;

        for event in self.events.iter() {
            if event.time <= t {
                prev_value = event.value;
                prev_time = event.time;
                continue;
            }

            return match event.kind {
                EventKind::SetValue => prev_value,
                EventKind::LinearRamp => {
                    let span = event.time - prev_time;
                    if span <= 0.0 {
                        event.value
                    } else {
                        let progress = ((t - prev_time) / span).clamp(0.0, 1.0) as f32;
                        prev_value + (event.value - prev_value) * progress
                    }
                }
            };
        }

        prev_value
    }

    /// Returns true if nothing is scheduled after `t`.
    pub fn is_settled(&self, t: f64) -> bool {
        self.events.last().map_or(true, |event| event.time <= t)
    }

    fn insert(&mut self, event: Event) {
        // Events at the same time keep insertion order.
        let index = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(index, event);
    }

    fn cancel_from(&mut self, t: f64) {
        self.events.retain(|event| event.time < t);
    }

    /// Folds events that can no longer affect values at or after `now` into the base value.
    fn prune(&mut self, now: f64) {
        while let Some(first) = self.events.first().copied() {
            if first.time > now {
                break;
            }
            // The first event is the start point of a ramp that's still running.
            if self
                .events
                .get(1)
                .is_some_and(|next| next.kind == EventKind::LinearRamp && next.time > now)
            {
                break;
            }
            self.base_value = first.value;
            self.base_time = first.time;
            self.events.remove(0);
        }
    }
}

/// A gain value with scheduled automation. Shared between the engine, which
/// schedules changes, and the mixer, which reads it.
#[derive(Debug)]
pub struct GainParam {
    automation: Mutex<Automation>,
}

impl GainParam {
    /// Creates a new parameter with the given initial value.
    pub fn new(value: f32) -> GainParam {
        GainParam {
            automation: Mutex::new(Automation::new(value)),
        }
    }

    /// The value at time `t`.
    pub fn value_at(&self, t: f64) -> f32 {
        self.automation.lock().value_at(t)
    }

    /// Cancels all scheduled events and sets the value immediately.
    pub fn set_value(&self, value: f32) {
        let mut automation = self.automation.lock();
        automation.events.clear();
        automation.base_value = value;
    }

    /// Removes every event scheduled at or after `t`.
    pub fn cancel_scheduled_values(&self, t: f64) {
        self.automation.lock().cancel_from(t);
    }

    /// Jumps to `value` at time `t`.
    pub fn set_value_at_time(&self, value: f32, t: f64) {
        self.automation.lock().insert(Event {
            kind: EventKind::SetValue,
            value,
            time: t,
        });
    }

    /// Ramps linearly from the previous event to `value`, arriving at time `t`.
    pub fn linear_ramp_to_value_at_time(&self, value: f32, t: f64) {
        self.automation.lock().insert(Event {
            kind: EventKind::LinearRamp,
            value,
            time: t,
        });
    }

    /// Schedules a fade from `from` at `start` to `to` at `start + duration`,
    /// replacing anything scheduled from `start` on.
    pub fn schedule_fade(&self, from: f32, to: f32, start: f64, duration: f64) {
        let mut automation = self.automation.lock();
        automation.cancel_from(start);
        automation.insert(Event {
            kind: EventKind::SetValue,
            value: from,
            time: start,
        });
        automation.insert(Event {
            kind: EventKind::LinearRamp,
            value: to,
            time: start + duration,
        });
    }

    /// Returns a copy of the current curve.
    pub fn snapshot(&self) -> Automation {
        self.automation.lock().clone()
    }

    /// Drops events that are entirely in the past.
    pub fn prune(&self, now: f64) {
        self.automation.lock().prune(now);
    }
}
