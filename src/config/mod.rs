pub mod proc_loader;
pub mod proc_validator;
pub mod service_config;
pub mod settings;
