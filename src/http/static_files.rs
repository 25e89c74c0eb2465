//! Static asset handler for the local application.
//!
//! Files come from `static_files.root`; a miss answers 404 with the configured
//! not-found document, or an empty 404 when that document is absent too.

use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_status::SetStatus;

use crate::config::schema::StaticFilesConfig;

pub type StaticFiles = ServeDir<SetStatus<ServeFile>>;

pub fn service(config: &StaticFilesConfig) -> StaticFiles {
    ServeDir::new(&config.root).not_found_service(ServeFile::new(config.not_found_path()))
}
