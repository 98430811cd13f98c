use leptos::prelude::*;

use crate::app::ClinicContext;
use crate::components::status_badge::ServerBadge;

#[component]
pub fn Sidebar() -> impl IntoView {
    let ctx = expect_context::<ClinicContext>();
    let snapshot = ctx.snapshot();

    let logout = move |_| ctx.act(|clinic| clinic.logout());

    view! {
        <nav class="sidebar">
            <div class="sidebar-header">
                <h1 class="sidebar-title">"MECHA-LUNG"</h1>
                <p class="sidebar-subtitle">"Lung Cancer Risk Assessment"</p>
            </div>
            <ServerBadge health=Signal::derive(move || snapshot.with(|s| s.server.clone())) />
            {move || {
                snapshot.with(|s| s.principal.clone()).map(|doctor| {
                    let since = doctor
                        .member_since()
                        .map(|d| format!("Member since {}", d.format("%b %Y")))
                        .unwrap_or_default();
                    view! {
                        <div class="sidebar-user">
                            <span class="user-name">{format!("Dr. {}", doctor.user_name)}</span>
                            <span class="user-detail">{since}</span>
                            <button class="btn btn-secondary" on:click=logout>"Logout"</button>
                        </div>
                    }
                })
            }}
        </nav>
    }
}
