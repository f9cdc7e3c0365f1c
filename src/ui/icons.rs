pub struct Icons;

impl Icons {
    pub const SHIELD: &str = "🛡️";
    pub const SEARCH: &str = "🔍";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const STATS: &str = "📊";
    pub const LINK: &str = "🔗";
    pub const EYE: &str = "👀";
    pub const FILE: &str = "📄";
    pub const DOWN: &str = "⬇️";
    pub const RIGHT: &str = "➡️";
    pub const DOT: &str = "•";
}
