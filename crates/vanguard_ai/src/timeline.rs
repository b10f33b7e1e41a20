//! Simulation time: fixed-tick clock + scheduled-event queue.
//!
//! Все AI системы читают время из `SimClock` (а не из `Time<Fixed>` напрямую),
//! чтобы тесты могли прогонять `FixedUpdate` вручную с точным шагом.

use bevy::prelude::*;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Часы симуляции (секунды с начала + номер тика)
#[derive(Resource, Debug, Clone, Copy, Reflect)]
#[reflect(Resource)]
pub struct SimClock {
    /// Текущее время симуляции (секунды)
    pub now: f32,
    /// Длительность одного тика (секунды)
    pub dt: f32,
    /// Количество выполненных тиков
    pub tick: u64,
}

impl SimClock {
    pub fn new(hz: f32) -> Self {
        Self {
            now: 0.0,
            dt: 1.0 / hz,
            tick: 0,
        }
    }

    pub fn advance(&mut self) {
        self.tick += 1;
        self.now = self.tick as f32 * self.dt;
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(60.0)
    }
}

/// System: первый шаг каждого тика
pub fn tick_sim_clock(mut clock: ResMut<SimClock>) {
    clock.advance();
}

/// Запланированное событие (payload срабатывает в `at`)
#[derive(Debug, Clone)]
struct Scheduled<T> {
    at: f32,
    seq: u64,
    payload: T,
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Scheduled<T> {}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Scheduled<T> {
    // BinaryHeap: max-heap, поэтому сравнение перевёрнуто (раньше = "больше")
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .total_cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Очередь отложенных событий, ключ: время симуляции.
///
/// Заменяет "подвешенное" выполнение: событие кладётся в очередь и
/// забирается поллингом каждый тик. Одинаковое время → порядок вставки.
#[derive(Resource, Debug)]
pub struct ScheduledEvents<T: Send + Sync + 'static> {
    queue: BinaryHeap<Scheduled<T>>,
    next_seq: u64,
}

impl<T: Send + Sync + 'static> Default for ScheduledEvents<T> {
    fn default() -> Self {
        Self {
            queue: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<T: Send + Sync + 'static> ScheduledEvents<T> {
    pub fn schedule(&mut self, at: f32, payload: T) {
        self.queue.push(Scheduled {
            at,
            seq: self.next_seq,
            payload,
        });
        self.next_seq += 1;
    }

    /// Забрать все события с `at <= now` (в порядке времени)
    pub fn drain_due(&mut self, now: f32) -> Vec<T> {
        let mut due = Vec::new();
        while self.queue.peek().is_some_and(|next| next.at <= now) {
            if let Some(event) = self.queue.pop() {
                due.push(event.payload);
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Время ближайшего события
    pub fn next_due(&self) -> Option<f32> {
        self.queue.peek().map(|next| next.at)
    }
}
