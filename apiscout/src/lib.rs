pub mod commands;
pub mod handlers;
pub mod server;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    load_urls_from_file, load_urls_from_source, parse_url_line, validate_domain,
};
pub use server::{ExtractResponse, ExtractState, extract_router};
