use tracing::warn;

/// User-facing confirmation and notification surface.
pub trait Prompter {
    /// Ask a yes/no question. `false` means the user declined.
    fn confirm(&self, message: &str) -> bool;
    fn notify(&self, message: &str);
}

/// `window.confirm` / `window.alert`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserPrompter;

impl Prompter for BrowserPrompter {
    fn confirm(&self, message: &str) -> bool {
        let Some(window) = web_sys::window() else {
            return false;
        };
        window.confirm_with_message(message).unwrap_or_else(|e| {
            warn!("confirm() failed: {:?}", e);
            false
        })
    }

    fn notify(&self, message: &str) {
        if let Some(window) = web_sys::window() {
            if let Err(e) = window.alert_with_message(message) {
                warn!("alert() failed: {:?}", e);
            }
        }
    }
}
