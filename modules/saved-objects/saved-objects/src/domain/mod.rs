pub mod encryption;
pub mod error;
pub mod migration;
pub mod namespace;
pub mod preflight;
pub mod repository;
pub mod security;
pub mod serializer;
pub mod type_registry;
pub mod version;
