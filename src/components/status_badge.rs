use leptos::prelude::*;

use crate::clinic::ServerHealth;

/// Liveness of the API as last probed.
#[component]
pub fn ServerBadge(#[prop(into)] health: Signal<ServerHealth>) -> impl IntoView {
    move || {
        let (icon, class, detail) = match health.get() {
            ServerHealth::Up(message) => ("\u{2713}", "status-badge status-pass", message),
            ServerHealth::Down(reason) => ("\u{2717}", "status-badge status-fail", reason),
            ServerHealth::Unknown => ("?", "status-badge status-unknown", "Checking...".to_string()),
        };

        view! {
            <div class="health-item">
                <span class=class>{icon}</span>
                <span class="health-name">"API"</span>
                <span class="health-detail">{detail}</span>
            </div>
        }
    }
}
