use crate::icons::{radius_for_level, MAX_SPAWN_LEVEL};

/// Viewports narrower than this get the compact mobile layout
pub const MOBILE_BREAKPOINT_PX: f64 = 768.0;

/// Board configuration.
/// Distances are pixels, speeds are pixels per tick (fixed 60 Hz).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct BoardConfig {
    pub width: f64,
    pub height: f64,
    pub gravity: f64,
    /// Fraction of speed kept after hitting a wall, the floor or another body
    pub bounce_damping: f64,
    /// Horizontal velocity multiplier applied every tick
    pub horizontal_friction: f64,
    pub drop_y: f64,
    pub danger_line_y: f64,
    /// A body slower than this (vertically) counts as settled
    pub settle_speed: f64,
    /// Fresh bodies are ignored by the danger check for this many ticks
    pub danger_grace_ticks: u32,
    /// Minimum ticks between two drops
    pub drop_cooldown_ticks: u32,
    pub quiz_interval_min: u32,
    pub quiz_interval_max: u32,
    /// Quiz reward = score of the merged level * this
    pub quiz_reward_multiplier: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            width: 400.0,
            height: 600.0,
            gravity: 0.5,
            bounce_damping: 0.8,
            horizontal_friction: 0.99,
            drop_y: 150.0,
            danger_line_y: 150.0,
            settle_speed: 0.1,
            danger_grace_ticks: 30,
            drop_cooldown_ticks: 18, // ~300ms
            quiz_interval_min: 10,
            quiz_interval_max: 20,
            quiz_reward_multiplier: 4,
        }
    }
}

impl BoardConfig {
    /// Compact layout for a phone-sized viewport. Physics parameters are kept.
    pub fn mobile_layout(&self, viewport_width: f64, viewport_height: f64) -> Self {
        let width = (viewport_width - 32.0).min(360.0);
        let height = (viewport_height - 300.0).min(500.0);
        Self {
            width,
            height,
            drop_y: height * 0.15,
            danger_line_y: height * 0.1,
            ..*self
        }
    }

    /// Pick the layout for a client viewport, falling back to `self`
    /// when the derived layout would be unplayable.
    pub fn for_viewport(&self, viewport_width: f64, viewport_height: f64) -> Self {
        if !viewport_width.is_finite() || viewport_width >= MOBILE_BREAKPOINT_PX {
            return *self;
        }
        let mobile = self.mobile_layout(viewport_width, viewport_height);
        if mobile.validate().is_ok() {
            mobile
        } else {
            *self
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.width.is_finite() || self.width <= 0.0 {
            return Err("width must be finite and > 0".to_string());
        }
        if !self.height.is_finite() || self.height <= 0.0 {
            return Err("height must be finite and > 0".to_string());
        }
        if self.width < 2.0 * radius_for_level(MAX_SPAWN_LEVEL) {
            return Err("width must fit the largest spawnable icon".to_string());
        }
        if !self.gravity.is_finite() || self.gravity < 0.0 {
            return Err("gravity must be finite and >= 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.bounce_damping) {
            return Err("bounce_damping must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.horizontal_friction) {
            return Err("horizontal_friction must be within [0, 1]".to_string());
        }
        if !self.drop_y.is_finite() || self.drop_y < 0.0 || self.drop_y >= self.height {
            return Err("drop_y must lie inside the board".to_string());
        }
        if !self.danger_line_y.is_finite()
            || self.danger_line_y < 0.0
            || self.danger_line_y >= self.height
        {
            return Err("danger_line_y must lie inside the board".to_string());
        }
        if !self.settle_speed.is_finite() || self.settle_speed < 0.0 {
            return Err("settle_speed must be finite and >= 0".to_string());
        }
        if self.quiz_interval_min == 0 {
            return Err("quiz_interval_min must be >= 1".to_string());
        }
        if self.quiz_interval_max < self.quiz_interval_min {
            return Err("quiz_interval_max must be >= quiz_interval_min".to_string());
        }
        Ok(())
    }
}
