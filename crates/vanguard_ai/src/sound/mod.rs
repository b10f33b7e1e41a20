//! Sound Propagation Service.
//!
//! Явно созданный ресурс (вставляется `SimulationPlugin`), никакого
//! глобального состояния. Слушатели регистрируются/снимаются между тиками,
//! despawned слушатели вычищаются во время broadcast.
//!
//! Эффекты на стороне слушателя (boost alertness): clamped additive, поэтому
//! порядок обхода слушателей не важен.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ai::Perception;


/// Звуковое событие (transient, не хранится)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoundEvent {
    pub origin: Vec3,
    /// Громкость [0, 1]
    pub intensity: f32,
    /// Радиус слышимости (метры)
    pub radius: f32,
    /// Кто издал звук (сам себя не слышит)
    #[serde(skip)]
    pub source: Option<Entity>,
}

impl SoundEvent {
    pub fn new(origin: Vec3, intensity: f32, radius: f32) -> Self {
        Self {
            origin,
            intensity: intensity.clamp(0.0, 1.0),
            radius,
            source: None,
        }
    }

    pub fn from_source(mut self, source: Entity) -> Self {
        self.source = Some(source);
        self
    }
}

/// Доступ сервиса к слушателям (адаптер над ECS query или тестовый mock)
pub trait ListenerAccess {
    /// Позиция приёмника; None: слушатель больше не существует
    fn receiver_position(&self, listener: Entity) -> Option<Vec3>;

    fn deliver(&mut self, listener: Entity, event: &SoundEvent, distance: f32);
}

/// Реестр слушателей + outbox для систем, которые не могут занять слушателей
#[derive(Resource, Debug, Default)]
pub struct SoundPropagation {
    listeners: Vec<Entity>,
    outbox: Vec<SoundEvent>,
}

impl SoundPropagation {
    pub fn register_listener(&mut self, listener: Entity) {
        if !self.listeners.contains(&listener) {
            self.listeners.push(listener);
        }
    }

    pub fn unregister_listener(&mut self, listener: Entity) {
        self.listeners.retain(|&l| l != listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_registered(&self, listener: Entity) -> bool {
        self.listeners.contains(&listener)
    }

    /// Синхронно доставить событие всем слушателям в радиусе.
    ///
    /// Возвращает количество слушателей, получивших звук.
    pub fn broadcast(&mut self, event: SoundEvent, access: &mut impl ListenerAccess) -> usize {
        let mut delivered = 0;

        self.listeners.retain(|&listener| {
            let Some(position) = access.receiver_position(listener) else {
                // Stale listener: sweep
                return false;
            };

            if event.source == Some(listener) {
                return true;
            }

            let distance = position.distance(event.origin);
            if distance <= event.radius {
                access.deliver(listener, &event, distance);
                delivered += 1;
            }
            true
        });

        delivered
    }

    /// Отложить событие до `flush` в конце тика
    pub fn emit(&mut self, event: SoundEvent) {
        self.outbox.push(event);
    }

    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    /// Доставить все отложенные события
    pub fn flush(&mut self, access: &mut impl ListenerAccess) -> usize {
        let events = std::mem::take(&mut self.outbox);
        events
            .into_iter()
            .map(|event| self.broadcast(event, access))
            .sum()
    }
}

type ListenerQuery<'w, 's> = Query<'w, 's, (&'static Transform, &'static mut Perception)>;

/// ECS адаптер: слушатель = entity с Transform + Perception
struct PerceptionListeners<'a, 'w, 's> {
    query: &'a mut ListenerQuery<'w, 's>,
}

impl ListenerAccess for PerceptionListeners<'_, '_, '_> {
    fn receiver_position(&self, listener: Entity) -> Option<Vec3> {
        self.query.get(listener).ok().map(|(t, _)| t.translation)
    }

    fn deliver(&mut self, listener: Entity, event: &SoundEvent, _distance: f32) {
        if let Ok((transform, mut perception)) = self.query.get_mut(listener) {
            let boost = perception.receive_sound(transform.translation, event.origin, event.intensity);
            if boost > 0.0 {
                crate::log(&format!(
                    "🔊 {:?} heard sound at {:?} (intensity {:.2}) → alertness +{:.2} = {:.2}",
                    listener,
                    event.origin,
                    event.intensity,
                    boost,
                    perception.alertness()
                ));
            }
        }
    }
}

/// System: доставка звуков этого тика (gunshots из weapon engagement)
pub fn propagate_sounds(
    mut service: ResMut<SoundPropagation>,
    mut listeners: ListenerQuery,
) {
    if service.pending() == 0 {
        return;
    }

    let mut access = PerceptionListeners { query: &mut listeners };
    service.flush(&mut access);
}
