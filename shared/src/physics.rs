//! Per-tick board physics.
//!
//! Bodies are circles falling under gravity inside an open-topped box.
//! Each tick integrates motion, resolves the walls and floor, then walks
//! every unordered pair once: overlapping equal-level pairs merge into the
//! next level, any other overlapping pair is pushed apart.

use crate::config::BoardConfig;
use crate::icons::{radius_for_level, score_for_level, MAX_LEVEL};
use crate::vec2::{add, distance, midpoint, normalize, scale, sub, Vec2};

/// A circular body on the board
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Body {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub level: u32,
    pub radius: f64,
    /// Ticks since the body appeared
    pub age: u32,
}

impl Body {
    /// A resting body of `level` at `pos`
    pub fn new(id: u32, level: u32, pos: Vec2) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            level,
            radius: radius_for_level(level),
            age: 0,
        }
    }

    /// Top edge of the circle
    pub fn top(&self) -> f64 {
        self.pos.y - self.radius
    }
}

/// Two bodies that became one
#[derive(Debug, Clone, PartialEq)]
pub struct MergeEvent {
    pub consumed: [u32; 2],
    pub merged_id: u32,
    pub level: u32,
    pub pos: Vec2,
    pub score: u32,
}

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub merges: Vec<MergeEvent>,
    pub score_delta: u32,
    /// A settled body is sticking out above the danger line
    pub overflow: bool,
}

/// Gravity, friction and wall/floor bounces for a single body.
pub fn integrate(body: &mut Body, config: &BoardConfig) {
    let r = body.radius;

    let mut y = body.pos.y + body.vel.y;
    let mut vy = body.vel.y + config.gravity;
    if y + r > config.height {
        y = config.height - r;
        vy = -vy * config.bounce_damping;
    }

    let mut x = body.pos.x + body.vel.x;
    let mut vx = body.vel.x * config.horizontal_friction;
    if x - r < 0.0 {
        x = r;
        vx = -vx * config.bounce_damping;
    }
    if x + r > config.width {
        x = config.width - r;
        vx = -vx * config.bounce_damping;
    }

    body.pos = Vec2::new(x, y);
    body.vel = Vec2::new(vx, vy);
    body.age = body.age.saturating_add(1);
}

/// Strict circle overlap (touching circles do not overlap)
pub fn overlaps(a: &Body, b: &Body) -> bool {
    distance(a.pos, b.pos) < a.radius + b.radius
}

pub fn can_merge(a: &Body, b: &Body) -> bool {
    a.level == b.level && a.level < MAX_LEVEL
}

/// Next-level body at the midpoint with the averaged velocity.
pub fn merge_bodies(a: &Body, b: &Body, id: u32) -> Body {
    let level = a.level + 1;
    Body {
        id,
        pos: midpoint(a.pos, b.pos),
        vel: midpoint(a.vel, b.vel),
        level,
        radius: radius_for_level(level),
        age: 0,
    }
}

/// Push two overlapping bodies apart along their center line and exchange
/// their (damped) velocities.
pub fn separate(a: &mut Body, b: &mut Body, damping: f64) {
    let delta = sub(b.pos, a.pos);
    let dist = distance(b.pos, a.pos);
    let overlap = a.radius + b.radius - dist;
    if overlap <= 0.0 {
        return;
    }

    // Coincident centers have no center line; normalize falls back to +x
    let push = scale(normalize(delta), overlap * 0.5);
    a.pos = sub(a.pos, push);
    b.pos = add(b.pos, push);

    let va = a.vel;
    a.vel = scale(b.vel, damping);
    b.vel = scale(va, damping);
}

/// Whether this body ends the game
pub fn is_overflowing(body: &Body, config: &BoardConfig) -> bool {
    body.age > config.danger_grace_ticks
        && body.top() < config.danger_line_y
        && body.vel.y.abs() < config.settle_speed
}

/// Advance all bodies by one tick.
///
/// `next_id` supplies ids for bodies created by merges.
pub fn step_bodies(bodies: &mut Vec<Body>, config: &BoardConfig, next_id: &mut u32) -> FrameReport {
    let mut report = FrameReport::default();

    for body in bodies.iter_mut() {
        integrate(body, config);
    }

    let n = bodies.len();
    let mut consumed = vec![false; n];
    let mut created = Vec::new();

    for i in 0..n {
        for j in (i + 1)..n {
            if consumed[i] || consumed[j] {
                continue;
            }
            let (left, right) = bodies.split_at_mut(j);
            let a = &mut left[i];
            let b = &mut right[0];
            if !overlaps(a, b) {
                continue;
            }

            if can_merge(a, b) {
                let id = *next_id;
                *next_id = next_id.wrapping_add(1);
                let merged = merge_bodies(a, b, id);
                let score = score_for_level(merged.level);
                report.score_delta += score;
                report.merges.push(MergeEvent {
                    consumed: [a.id, b.id],
                    merged_id: id,
                    level: merged.level,
                    pos: merged.pos,
                    score,
                });
                consumed[i] = true;
                consumed[j] = true;
                created.push(merged);
            } else {
                separate(a, b, config.bounce_damping);
            }
        }
    }

    if !created.is_empty() {
        let mut idx = 0;
        bodies.retain(|_| {
            let keep = !consumed[idx];
            idx += 1;
            keep
        });
        bodies.extend(created);
    }

    report.overflow = bodies.iter().any(|b| is_overflowing(b, config));
    report
}
