use leptos::prelude::*;
use tracing::{error, info};

use mecha_lung::app::App;
use mecha_lung::{logging, ClientConfig};

fn main() {
    let (config, load_error) = match ClientConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (ClientConfig::embedded(), Some(e)),
    };

    logging::init(&config.log_level);
    if let Some(e) = load_error {
        error!("{}; using built-in defaults", e);
    }
    info!("MECHA-LUNG client starting");

    leptos::mount::mount_to_body(move || view! { <App config=config.clone() /> });
}
