//! Icon catalog: the merge tiers a body can reach.

/// Highest level a body can reach. Two max-level bodies never merge.
pub const MAX_LEVEL: u32 = 10;

/// Drops only ever spawn levels 1..=MAX_SPAWN_LEVEL.
pub const MAX_SPAWN_LEVEL: u32 = 3;

/// One merge tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconKind {
    pub level: u32,
    pub name: &'static str,
    /// Asset path served to the web client
    pub asset: &'static str,
    /// Points awarded when a merge produces this level
    pub score: u32,
    pub color: &'static str,
}

pub const ICONS: [IconKind; MAX_LEVEL as usize] = [
    IconKind { level: 1, name: "Microphone", asset: "/icons/microphone.png", score: 1, color: "#10b981" },
    IconKind { level: 2, name: "Camera", asset: "/icons/camera.png", score: 3, color: "#3b82f6" },
    IconKind { level: 3, name: "Pen", asset: "/icons/pen.png", score: 6, color: "#f59e0b" },
    IconKind { level: 4, name: "Social Media", asset: "/icons/social.png", score: 10, color: "#8b5cf6" },
    IconKind { level: 5, name: "Logo", asset: "/icons/logo.png", score: 15, color: "#ef4444" },
    IconKind { level: 6, name: "Project Folder", asset: "/icons/folder.png", score: 21, color: "#06b6d4" },
    IconKind { level: 7, name: "Meta Symbol", asset: "/icons/meta.png", score: 28, color: "#f97316" },
    IconKind { level: 8, name: "Computer", asset: "/icons/computer.png", score: 36, color: "#0891b2" },
    IconKind { level: 9, name: "Like", asset: "/icons/like.png", score: 45, color: "#ec4899" },
    IconKind { level: 10, name: "Coffee", asset: "/icons/coffee.png", score: 55, color: "#9333ea" },
];

/// Look up a tier by level (1-based)
pub fn icon(level: u32) -> Option<&'static IconKind> {
    if level == 0 {
        return None;
    }
    ICONS.get(level as usize - 1)
}

/// Body radius in pixels for a level
pub fn radius_for_level(level: u32) -> f64 {
    20.0 + level as f64 * 8.0
}

/// Points for producing `level` through a merge (0 for unknown levels)
pub fn score_for_level(level: u32) -> u32 {
    icon(level).map(|i| i.score).unwrap_or(0)
}
