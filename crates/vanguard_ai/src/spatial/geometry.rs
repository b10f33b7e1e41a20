//! Геометрия пространственных запросов: ray vs AABB, ray vs вертикальная капсула.

use bevy::prelude::*;

const EPSILON: f32 = 1e-6;

/// Ray vs AABB (slab test). Возвращает дистанцию входа в [0, max_distance].
///
/// Origin внутри бокса → 0.0 (луч сразу заблокирован).
pub fn ray_aabb(origin: Vec3, direction: Vec3, max_distance: f32, min: Vec3, max: Vec3) -> Option<f32> {
    let mut t_enter = 0.0_f32;
    let mut t_exit = max_distance;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        let (lo, hi) = (min[axis], max[axis]);

        if d.abs() < EPSILON {
            // Параллельно граням: либо внутри slab, либо промах
            if o < lo || o > hi {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut t1 = (lo - o) * inv;
        let mut t2 = (hi - o) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }

        t_enter = t_enter.max(t1);
        t_exit = t_exit.min(t2);
        if t_enter > t_exit {
            return None;
        }
    }

    Some(t_enter)
}

/// Ближайшие точки двух отрезков [p1, q1] и [p2, q2].
///
/// Возвращает (s, t): параметры на первом и втором отрезке в [0, 1].
pub fn closest_segment_params(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> (f32, f32) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.dot(d1);
    let e = d2.dot(d2);
    let f = d2.dot(r);

    if a <= EPSILON && e <= EPSILON {
        return (0.0, 0.0);
    }

    if a <= EPSILON {
        return (0.0, (f / e).clamp(0.0, 1.0));
    }

    let c = d1.dot(r);
    if e <= EPSILON {
        return ((-c / a).clamp(0.0, 1.0), 0.0);
    }

    let b = d1.dot(d2);
    let denom = a * e - b * b;
    let mut s = if denom.abs() > EPSILON {
        ((b * f - c * e) / denom).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let mut t = (b * s + f) / e;
    if t < 0.0 {
        t = 0.0;
        s = (-c / a).clamp(0.0, 1.0);
    } else if t > 1.0 {
        t = 1.0;
        s = ((b - c) / a).clamp(0.0, 1.0);
    }

    (s, t)
}

/// Ось вертикальной капсулы (base = точка на полу)
pub fn capsule_axis(base: Vec3, radius: f32, height: f32) -> (Vec3, Vec3) {
    let bottom = base + Vec3::Y * radius.min(height * 0.5);
    let top = base + Vec3::Y * (height - radius).max(height * 0.5);
    (bottom, top)
}

/// Ray vs вертикальная капсула. Возвращает приблизительную дистанцию входа.
pub fn ray_capsule(
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    base: Vec3,
    radius: f32,
    height: f32,
) -> Option<f32> {
    let (bottom, top) = capsule_axis(base, radius, height);
    let end = origin + direction * max_distance;
    let (s, t) = closest_segment_params(origin, end, bottom, top);

    let on_ray = origin + (end - origin) * s;
    let on_axis = bottom + (top - bottom) * t;
    let distance_sq = on_ray.distance_squared(on_axis);
    let radius_sq = radius * radius;
    if distance_sq > radius_sq {
        return None;
    }

    // Откатываемся от точки сближения к поверхности капсулы
    let along = s * max_distance;
    let back_off = (radius_sq - distance_sq).sqrt();
    Some((along - back_off).max(0.0))
}

/// Расстояние от точки до оси капсулы минус радиус (≤ 0 → внутри)
pub fn point_capsule_distance(point: Vec3, base: Vec3, radius: f32, height: f32) -> f32 {
    let (bottom, top) = capsule_axis(base, radius, height);
    let (_, t) = closest_segment_params(point, point, bottom, top);
    let on_axis = bottom + (top - bottom) * t;
    point.distance(on_axis) - radius
}
