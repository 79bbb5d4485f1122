//! Shared UI icons and emojis.
//!
//! This module provides common emoji constants used across the UI components
//! for consistent visual styling.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static BLOCKER: Emoji<'_, '_> = Emoji("🚧 ", "[BLOCK]");

// Conversation indicators
pub static ROBOT: Emoji<'_, '_> = Emoji("🤖 ", "[AI]");
pub static PERSON: Emoji<'_, '_> = Emoji("🧑 ", "[YOU]");
