pub mod revocation_registry;
