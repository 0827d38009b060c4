//! Docker engine adapter and conductor image builder.
//!
//! `conductor_engine` lets an orchestration tool drive a single Docker (or
//! Docker-compatible) engine through a small, uniform surface: stopping,
//! inspecting and deleting containers, resolving image identities, committing
//! filesystem layers, and building the conductor bootstrap image that runs the
//! orchestration logic inside a container.
//!
//! # Architecture
//!
//! The engine client is never a global. Every operation receives it through a
//! capability trait ([`engine::ImageBuilder`], [`engine::ImageLookup`],
//! [`engine::ContainerLifecycle`]) implemented for `bollard::Docker`, so tests
//! substitute mocks without a running daemon.
//!
//! # Modules
//!
//! - [`api`]: Command orchestration shared by the CLI and library embedders
//! - [`config`]: Configuration system with layered precedence (CLI > env > file > defaults)
//! - [`engine`]: Engine connection, build-context assembly, image builds and lookups
//! - [`error`]: Semantic error types for the crate

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
