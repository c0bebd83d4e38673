pub mod app;
pub mod server;

pub use app::App;
pub use server::make_http_server;
