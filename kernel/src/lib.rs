// src/lib.rs
// Point d'entrée de la bibliothèque d'ordonnancement
#![cfg_attr(not(test), no_std)] // Pas de bibliothèque standard (sauf tests hôte)

//! Exo-OS scheduling core
//!
//! - `scheduler::fixed_point`: 17.14 fixed-point arithmetic
//! - `scheduler::thread`: thread control blocks, lifecycle, priority donation
//! - `scheduler::core`: strategy selector, MLFQS metrics, the scheduler
//! - `sync`: locks that donate priority while waiting
//! - `config` / `logger`: boot configuration and log backend

// Import de alloc pour les allocations dynamiques
extern crate alloc;

pub mod config;
pub mod logger;
pub mod scheduler;
pub mod sync;

pub use config::{ConfigError, SchedConfig};
pub use scheduler::{init, with_scheduler, FixedPoint, Scheduler, SchedulingStrategy};
