mod settings;

pub use settings::{
    AuthConfig, CacheConfig, JwtConfig, QueueConfig, ServerConfig, Settings,
};
