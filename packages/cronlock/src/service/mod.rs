//! Administrative services invoked through the admin endpoints.

mod seed;

pub use seed::SeedService;
