// Foreground page logic — resource loading, projection, and the midnight
// rollover ticker.

pub mod session;
pub mod view;
