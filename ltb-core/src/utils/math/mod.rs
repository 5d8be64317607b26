//! Math utilities for the Line-Trace Bot.
//!
//! This module provides the steering law and wheel-speed allocation for
//! two-wheeled differential-drive motion.

pub mod drive;
pub mod steering;
